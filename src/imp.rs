// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The native driver seam.

Everything above this module speaks in abstract handles and descriptions.  Everything below it is
a slot-binding driver: per-stage resource slots, monolithic fixed-function state objects, and
constant buffers.  The driver is reached through two traits:

* [`NativeDevice`] creates and releases native objects and performs the operations the driver
  runs on its own internal context (map, unmap, update-subresource, query readback).
* [`NativeContext`] records or executes commands.  A device has exactly one immediate context;
  deferred contexts record commands into native command lists.

Native objects are identified by opaque [`NativeObject`] ids issued by the driver.  Objects are
reference counted the way the driver counts them: [`NativeDevice::add_ref`] and
[`NativeDevice::release`] adjust the count and the driver frees the object when it reaches zero.
Slot arguments are `Option<NativeObject>`, where `None` unbinds the slot.

The `software` feature ships an in-memory implementation of both traits, used by the test suite.
*/

mod desc;
#[cfg(feature = "software")]
pub mod software;

pub use desc::*;

use crate::pixel_formats::Format;
use std::fmt::Debug;
use std::num::NonZeroU64;

/// Identifies one object owned by the native driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeObject(NonZeroU64);

impl NativeObject {
    /// Wraps a driver id; zero is reserved for "no object".
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(n) => Some(NativeObject(n)),
            None => None,
        }
    }

    pub const fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Failures reported by the native driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NativeError {
    #[error("the driver rejected an argument")]
    InvalidArg,
    #[error("the driver does not support format {0:?} here")]
    UnsupportedFormat(Format),
    #[error("the driver is out of memory")]
    OutOfMemory,
    #[error("the resource is still in use by the GPU")]
    WasStillDrawing,
    #[error("the driver does not support this operation")]
    Unsupported,
}

/// Shader stages with their own slot tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Vertex,
        Stage::Hull,
        Stage::Domain,
        Stage::Geometry,
        Stage::Pixel,
        Stage::Compute,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Slot counts the driver guarantees per stage.
pub mod limits {
    pub const SHADER_RESOURCE_SLOTS: u32 = 128;
    pub const SAMPLER_SLOTS: u32 = 16;
    pub const CONSTANT_BUFFER_SLOTS: u32 = 14;
    pub const UNORDERED_ACCESS_SLOTS: u32 = 64;
    pub const VERTEX_BUFFER_SLOTS: u32 = 32;
    pub const RENDER_TARGET_SLOTS: u32 = 8;
    pub const VIEWPORT_SLOTS: u32 = 16;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureLevel {
    L10_0,
    L10_1,
    L11_0,
    L11_1,
}

/// Optional driver features beyond the feature level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeOptions {
    pub output_merger_logic_op: bool,
    pub conservative_rasterization: bool,
    pub rasterizer_ordered_views: bool,
    pub dual_source_blending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Immediate,
    Deferred,
}

/// How a subresource is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapType {
    Read,
    Write,
    ReadWrite,
    WriteDiscard,
    WriteNoOverwrite,
}

/// A mapped subresource.
///
/// `data` is valid for `len` bytes until the subresource is unmapped or its resource released.
#[derive(Debug, Clone, Copy)]
pub struct Mapped {
    pub data: *mut u8,
    pub len: usize,
    pub row_pitch: u32,
    pub depth_pitch: u32,
}

/// The device half of the driver.
pub trait NativeDevice: Send + Sync + Debug {
    fn feature_level(&self) -> FeatureLevel;
    fn options(&self) -> NativeOptions;
    fn format_support(&self, format: Format) -> FormatSupport;
    fn supports_annotations(&self) -> bool;

    /// Takes the device's immediate context.
    ///
    /// Fails with [`NativeError::Unsupported`] if it was already taken.
    fn immediate_context(&self) -> Result<Box<dyn NativeContext>, NativeError>;
    fn create_deferred_context(&self) -> Result<Box<dyn NativeContext>, NativeError>;

    fn create_buffer(
        &self,
        desc: &BufferDesc,
        initial: Option<&SubresourceInit<'_>>,
    ) -> Result<NativeObject, NativeError>;
    fn create_texture_1d(
        &self,
        desc: &Texture1dDesc,
        initial: &[SubresourceInit<'_>],
    ) -> Result<NativeObject, NativeError>;
    fn create_texture_2d(
        &self,
        desc: &Texture2dDesc,
        initial: &[SubresourceInit<'_>],
    ) -> Result<NativeObject, NativeError>;
    fn create_texture_3d(
        &self,
        desc: &Texture3dDesc,
        initial: &[SubresourceInit<'_>],
    ) -> Result<NativeObject, NativeError>;

    fn create_shader_resource_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError>;
    fn create_unordered_access_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError>;
    fn create_render_target_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError>;
    fn create_depth_stencil_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError>;

    fn create_sampler(&self, desc: &SamplerStateDesc) -> Result<NativeObject, NativeError>;
    fn create_shader(&self, stage: Stage, bytecode: &[u8]) -> Result<NativeObject, NativeError>;
    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        vertex_bytecode: &[u8],
    ) -> Result<NativeObject, NativeError>;
    fn create_blend_state(&self, desc: &BlendStateDesc) -> Result<NativeObject, NativeError>;
    fn create_rasterizer_state(
        &self,
        desc: &RasterizerStateDesc,
    ) -> Result<NativeObject, NativeError>;
    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDesc,
    ) -> Result<NativeObject, NativeError>;
    fn create_query(&self, kind: QueryKind) -> Result<NativeObject, NativeError>;

    fn add_ref(&self, object: NativeObject);
    fn release(&self, object: NativeObject);
    /// Attaches a debug name to an object.
    fn set_private_name(&self, object: NativeObject, name: &str);

    fn map(
        &self,
        resource: NativeObject,
        subresource: u32,
        map_type: MapType,
    ) -> Result<Mapped, NativeError>;
    fn unmap(&self, resource: NativeObject, subresource: u32);
    fn update_subresource(
        &self,
        resource: NativeObject,
        subresource: u32,
        dst_box: Option<&NativeBox>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    );
    /// Copies the result of a finished query into `out`.
    ///
    /// Fails with [`NativeError::WasStillDrawing`] if the result is not available yet.
    fn get_query_data(&self, query: NativeObject, out: &mut [u8]) -> Result<(), NativeError>;
}

/// The context half of the driver.
///
/// Calls never fail; the driver ignores invalid arguments the way the hardware path does.
pub trait NativeContext: Send + Debug {
    fn kind(&self) -> ContextKind;

    fn ia_set_input_layout(&mut self, layout: Option<NativeObject>);
    fn ia_set_primitive_topology(&mut self, topology: u32);
    fn ia_set_vertex_buffers(
        &mut self,
        first: u32,
        buffers: &[Option<NativeObject>],
        strides: &[u32],
        offsets: &[u32],
    );
    fn ia_set_index_buffer(&mut self, buffer: Option<NativeObject>, format: Format, offset: u32);

    fn set_shader(&mut self, stage: Stage, shader: Option<NativeObject>);
    fn set_shader_resources(&mut self, stage: Stage, first: u32, views: &[Option<NativeObject>]);
    fn set_samplers(&mut self, stage: Stage, first: u32, samplers: &[Option<NativeObject>]);
    fn set_constant_buffers(
        &mut self,
        stage: Stage,
        first: u32,
        buffers: &[Option<NativeObject>],
    );
    /// Only the pixel and compute stages have unordered-access slots.
    fn set_unordered_access_views(
        &mut self,
        stage: Stage,
        first: u32,
        views: &[Option<NativeObject>],
    );

    fn rs_set_state(&mut self, state: Option<NativeObject>);
    fn rs_set_viewports(&mut self, viewports: &[Viewport]);
    fn rs_set_scissor_rects(&mut self, rects: &[Rect]);

    fn om_set_blend_state(
        &mut self,
        state: Option<NativeObject>,
        blend_factor: [f32; 4],
        sample_mask: u32,
    );
    fn om_set_depth_stencil_state(&mut self, state: Option<NativeObject>, stencil_ref: u32);
    fn om_set_render_targets(&mut self, rtvs: &[Option<NativeObject>], dsv: Option<NativeObject>);

    fn draw_instanced(
        &mut self,
        vertices: u32,
        instances: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    fn draw_indexed_instanced(
        &mut self,
        indices: u32,
        instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn draw_instanced_indirect(&mut self, buffer: NativeObject, offset: u32);
    fn draw_indexed_instanced_indirect(&mut self, buffer: NativeObject, offset: u32);
    fn dispatch_indirect(&mut self, buffer: NativeObject, offset: u32);

    fn copy_resource(&mut self, dst: NativeObject, src: NativeObject);
    #[allow(clippy::too_many_arguments)]
    fn copy_subresource_region(
        &mut self,
        dst: NativeObject,
        dst_subresource: u32,
        dst_offset: [u32; 3],
        src: NativeObject,
        src_subresource: u32,
        src_box: Option<&NativeBox>,
    );
    fn resolve_subresource(
        &mut self,
        dst: NativeObject,
        dst_subresource: u32,
        src: NativeObject,
        src_subresource: u32,
        format: Format,
    );
    fn update_subresource(
        &mut self,
        dst: NativeObject,
        dst_subresource: u32,
        dst_box: Option<&NativeBox>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    );
    fn generate_mips(&mut self, srv: NativeObject);

    /// Maps a dynamic resource through this context.
    ///
    /// Deferred contexts accept only [`MapType::WriteDiscard`]; the written contents take effect
    /// when the command list executes.
    fn map(
        &mut self,
        resource: NativeObject,
        subresource: u32,
        map_type: MapType,
    ) -> Result<Mapped, NativeError>;
    fn unmap(&mut self, resource: NativeObject, subresource: u32);

    fn clear_render_target_view(&mut self, rtv: NativeObject, color: [f32; 4]);
    fn clear_depth_stencil_view(
        &mut self,
        dsv: NativeObject,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    );
    fn clear_unordered_access_view_uint(&mut self, uav: NativeObject, values: [u32; 4]);
    fn clear_unordered_access_view_float(&mut self, uav: NativeObject, values: [f32; 4]);

    fn begin_query(&mut self, query: NativeObject);
    fn end_query(&mut self, query: NativeObject);

    fn begin_event(&mut self, label: &str);
    fn end_event(&mut self);
    fn set_marker(&mut self, label: &str);

    fn flush(&mut self);
    /// Closes a deferred context's recording into a command list object.
    fn finish_command_list(&mut self) -> Result<NativeObject, NativeError>;
    fn execute_command_list(&mut self, list: NativeObject);
}
