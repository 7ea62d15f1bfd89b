/*! slotbound is a device and command abstraction layer for slot-binding graphics drivers.

Modern graphics APIs speak in descriptor heaps, descriptor tables, pipeline layouts, push
constants and monolithic pipeline objects.  Older drivers speak in per-stage slots: a handful of
shader-resource, sampler, constant-buffer and unordered-access registers per shader stage, plus
separate fixed-function state objects for blending, rasterization and depth-stencil.

slotbound exposes the first vocabulary and emulates it on top of the second.

| Concept            | What the caller sees                      | What the driver sees                              |
|--------------------|-------------------------------------------|---------------------------------------------------|
| Pipeline           | One handle                                | Input layout, shaders, blend/raster/depth objects |
| Descriptor heap    | Arena of tables                           | Nothing; host memory only                         |
| Descriptor table   | Typed slots, updated out of band          | Per-stage slot binds, issued on bind              |
| Pipeline layout    | Params resolving to base registers        | Nothing; metadata only                            |
| Push constants     | Words pushed at bind time                 | A discarded-and-rewritten dynamic constant buffer |
| Render pass        | Begin/end pair                            | Render targets bound on begin; nothing on end     |
| Barrier            | Explicit state transitions                | Nothing; the driver tracks hazards                |

# Shape of the API

* [`Device`] creates and destroys everything, and answers capability questions.  Objects are
  returned as opaque generational handles (see [`bindings::handles`]); a destroyed handle is
  detected rather than dereferenced.
* [`DeviceContext`] records commands through the [`CommandRecorder`] trait.  The immediate
  context executes as it records; deferred contexts produce [`CommandList`]s for it to replay.
* The driver itself sits behind the [`imp::NativeDevice`] and [`imp::NativeContext`] traits.
  The `software` feature (on by default) provides an in-memory driver, [`imp::software`], which
  executes clears, copies, maps and uploads and lets you inspect the bound state.

# Errors

Creation and query calls return [`Result`]s with [`Error`].  Recording calls do not: they expect
handles that were valid when checked, and a handle that went stale anyway binds null instead of
reaching the driver.  Misuse of the recording state machine (an unbalanced render pass, recording
into a finished command list) panics.

# Configuration

See [`Config`].  [`Config::from_env`] reads `SLOTBOUND_*` overrides, which is handy when debugging a
host application without rebuilding it.
*/

pub mod bindings;
pub mod command_list;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod imp;
pub mod pixel_formats;

pub use command_list::{CommandList, CommandRecorder, IndirectCommand};
pub use config::Config;
pub use context::DeviceContext;
pub use device::{Device, DeviceCaps, DeviceEvents, MappedSubresource};
pub use error::Error;
