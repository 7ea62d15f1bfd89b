// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The device: creation and destruction authority for every object.

A [`Device`] wraps one native driver device.  Objects it creates are returned as opaque
handles; the handle-to-native mapping lives only in the device's trackers, so a stale handle is
detected rather than dereferenced.

The device is shared as `Arc<Device>` and may be used from any thread.  Recording happens on
[`crate::context::DeviceContext`]s obtained from [`Device::immediate_context`] and
[`Device::create_deferred_context`].

# Example

```
use slotbound::bindings::resource::ResourceDesc;
use slotbound::bindings::visible_to::{MemoryHeap, ResourceUsage};
use slotbound::imp::software::SoftwareDevice;
use slotbound::pixel_formats::Format;
use slotbound::{Config, Device};

let device = Device::new(Box::new(SoftwareDevice::new()), Config::default());
let desc = ResourceDesc::texture_2d(
    64,
    64,
    Format::R8G8B8A8Unorm,
    MemoryHeap::GpuOnly,
    ResourceUsage::SHADER_RESOURCE,
);
let texture = device.create_resource(&desc, &[], ResourceUsage::SHADER_RESOURCE).unwrap();
assert!(device.check_resource_handle_valid(texture));
device.destroy_resource(texture);
assert!(!device.check_resource_handle_valid(texture));
```
*/

pub(crate) mod convert;
mod descriptor;
mod events;
mod pipeline;
mod query;

pub use events::DeviceEvents;

pub(crate) use convert::ViewUsage;
pub(crate) use descriptor::{PipelineLayoutParam, TableLayout};
pub(crate) use pipeline::{OutputMergerState, PipelineObject};

use crate::bindings::handles::{
    DescriptorHeap, DescriptorTable, DescriptorTableLayout, Pipeline, PipelineLayout, QueryHeap,
    Resource, ResourceView, Sampler, ShaderModule,
};
use crate::bindings::resource::{ResourceDesc, ResourceViewDesc, SubresourceBox, SubresourceData};
use crate::bindings::resource_tracking::ObjectTracker;
use crate::bindings::sampler::SamplerDesc;
use crate::bindings::visible_to::{MapAccess, ResourceUsage};
use crate::config::Config;
use crate::context::DeviceContext;
use crate::error::Error;
use crate::imp::{
    FeatureLevel, FormatSupport, NativeBox, NativeDevice, NativeError, NativeObject,
    NativeResourceDesc, SubresourceInit, Usage,
};
use crate::pixel_formats::Format;
use logwise::privacy::LogIt;
use slotmap::Key;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Optional capabilities a caller can ask about before relying on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DeviceCaps {
    ComputeShader,
    GeometryShader,
    HullAndDomainShader,
    LogicOp,
    DualSourceBlend,
    IndependentBlend,
    FillModeNonSolid,
    ConservativeRasterization,
    BindRenderTargetsAndDepthStencil,
    MultiViewport,
    /// Pushing a sub-range of constants keeps the rest of the buffer.
    PartialPushConstantUpdates,
    PartialPushDescriptorUpdates,
    DrawInstanced,
    DrawOrDispatchIndirect,
    CopyBufferRegion,
    CopyBufferToTexture,
    /// Scaling blits.  Same-size blits always work.
    Blit,
    ResolveRegion,
    /// Immediate contexts only: results are read back on the host when the copy is recorded.
    CopyQueryResults,
    SamplerCompare,
    SamplerAnisotropic,
    SamplerWithResourceView,
    SharedResource,
    /// Descriptor heaps, tables and pipeline layouts.
    DescriptorTables,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ResourceRecord {
    pub native: NativeObject,
    pub desc: NativeResourceDesc,
    /// Kept for diagnostics; the driver tracks hazards itself.
    pub initial_state: ResourceUsage,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ViewRecord {
    pub native: NativeObject,
    pub resource: Resource,
    pub usage: ViewUsage,
}

/// A mapped subresource returned by [`Device::map_resource`].
///
/// The memory stays valid until [`Device::unmap_resource`] is called for the same subresource
/// or the resource is destroyed.
#[derive(Debug)]
pub struct MappedSubresource {
    data: *mut u8,
    len: usize,
    pub row_pitch: u32,
    pub slice_pitch: u32,
}

// The pointer is only dereferenced through the unsafe accessors.
unsafe impl Send for MappedSubresource {}

impl MappedSubresource {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.data
    }

    /// # Safety
    ///
    /// The subresource must still be mapped and no mutable view of it may be live.
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: the driver guarantees `len` readable bytes while mapped.
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    /// # Safety
    ///
    /// The subresource must still be mapped, for write access.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        // SAFETY: the driver guarantees `len` writable bytes while mapped.
        unsafe { std::slice::from_raw_parts_mut(self.data, self.len) }
    }
}

/// A device wrapping one native driver device.
pub struct Device {
    native: Box<dyn NativeDevice>,
    config: Config,
    events: Box<dyn DeviceEvents>,
    immediate_taken: AtomicBool,
    resources: ObjectTracker<Resource, ResourceRecord>,
    views: ObjectTracker<ResourceView, ViewRecord>,
    samplers: ObjectTracker<Sampler, NativeObject>,
    shader_modules: ObjectTracker<ShaderModule, pipeline::ShaderModuleRecord>,
    pipelines: ObjectTracker<Pipeline, PipelineObject>,
    pipeline_layouts: ObjectTracker<PipelineLayout, Arc<[PipelineLayoutParam]>>,
    table_layouts: ObjectTracker<DescriptorTableLayout, Arc<TableLayout>>,
    heaps: ObjectTracker<DescriptorHeap, descriptor::HeapRecord>,
    tables: ObjectTracker<DescriptorTable, descriptor::TableRecord>,
    query_heaps: ObjectTracker<QueryHeap, query::QueryHeapRecord>,
}

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("native", &self.native)
            .field("config", &self.config)
            .field("resources", &self.resources)
            .field("views", &self.views)
            .field("pipelines", &self.pipelines)
            .finish_non_exhaustive()
    }
}

impl Device {
    pub fn new(native: Box<dyn NativeDevice>, config: Config) -> Arc<Device> {
        Self::with_events(native, config, events::NoEvents)
    }

    /// Creates a device that reports object lifetimes to `events`.
    pub fn with_events(
        native: Box<dyn NativeDevice>,
        config: Config,
        events: impl DeviceEvents + 'static,
    ) -> Arc<Device> {
        logwise::info_sync!(
            "Creating device at feature level {level}",
            level = LogIt(&native.feature_level())
        );
        Arc::new(Device {
            native,
            config,
            events: Box::new(events),
            immediate_taken: AtomicBool::new(false),
            resources: ObjectTracker::new("resources"),
            views: ObjectTracker::new("resource views"),
            samplers: ObjectTracker::new("samplers"),
            shader_modules: ObjectTracker::new("shader modules"),
            pipelines: ObjectTracker::new("pipelines"),
            pipeline_layouts: ObjectTracker::new("pipeline layouts"),
            table_layouts: ObjectTracker::new("descriptor table layouts"),
            heaps: ObjectTracker::new("descriptor heaps"),
            tables: ObjectTracker::new("descriptor tables"),
            query_heaps: ObjectTracker::new("query heaps"),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn native(&self) -> &dyn NativeDevice {
        self.native.as_ref()
    }

    /// Takes the device's one immediate context.
    ///
    /// Fails while another immediate context for this device is alive.
    pub fn immediate_context(self: &Arc<Self>) -> Result<DeviceContext, Error> {
        if self.immediate_taken.swap(true, Ordering::AcqRel) {
            return Err(Error::UnsupportedFeature(
                "the device already has an immediate context",
            ));
        }
        match self.native.immediate_context() {
            Ok(native) => Ok(DeviceContext::new(self.clone(), native)),
            Err(e) => {
                self.immediate_taken.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    /// Called when the immediate context is dropped.
    pub(crate) fn return_immediate_context(&self) {
        self.immediate_taken.store(false, Ordering::Release);
    }

    pub fn create_deferred_context(self: &Arc<Self>) -> Result<DeviceContext, Error> {
        let native = self.native.create_deferred_context()?;
        Ok(DeviceContext::new(self.clone(), native))
    }

    pub fn check_capability(&self, capability: DeviceCaps) -> bool {
        let level = self.native.feature_level();
        let options = self.native.options();
        match capability {
            DeviceCaps::ComputeShader
            | DeviceCaps::HullAndDomainShader
            | DeviceCaps::DrawOrDispatchIndirect => level >= FeatureLevel::L11_0,
            DeviceCaps::LogicOp => options.output_merger_logic_op,
            DeviceCaps::ConservativeRasterization => options.conservative_rasterization,
            DeviceCaps::DualSourceBlend => {
                options.dual_source_blending || level >= FeatureLevel::L11_0
            }
            DeviceCaps::GeometryShader
            | DeviceCaps::IndependentBlend
            | DeviceCaps::FillModeNonSolid
            | DeviceCaps::BindRenderTargetsAndDepthStencil
            | DeviceCaps::MultiViewport
            | DeviceCaps::PartialPushDescriptorUpdates
            | DeviceCaps::DrawInstanced
            | DeviceCaps::CopyBufferRegion
            | DeviceCaps::CopyQueryResults
            | DeviceCaps::SamplerCompare
            | DeviceCaps::SamplerAnisotropic
            | DeviceCaps::SamplerWithResourceView
            | DeviceCaps::SharedResource
            | DeviceCaps::DescriptorTables => true,
            DeviceCaps::PartialPushConstantUpdates
            | DeviceCaps::CopyBufferToTexture
            | DeviceCaps::Blit
            | DeviceCaps::ResolveRegion => false,
        }
    }

    /// Whether `format` can be used for every usage in `usage`.
    pub fn check_format_support(&self, format: Format, usage: ResourceUsage) -> bool {
        let support = self.native.format_support(format);
        if support.is_empty() {
            return false;
        }
        let mut required = FormatSupport::empty();
        if usage.contains(ResourceUsage::RENDER_TARGET) {
            required |= FormatSupport::RENDER_TARGET;
        }
        if usage.intersects(ResourceUsage::DEPTH_STENCIL) {
            required |= FormatSupport::DEPTH_STENCIL;
        }
        if usage.intersects(ResourceUsage::UNORDERED_ACCESS) {
            required |= FormatSupport::TYPED_UNORDERED_ACCESS_VIEW;
        }
        if usage.intersects(ResourceUsage::RESOLVE_SOURCE | ResourceUsage::RESOLVE_DEST) {
            required |= FormatSupport::MULTISAMPLE_RESOLVE;
        }
        if usage.contains(ResourceUsage::VERTEX_BUFFER) {
            required |= FormatSupport::IA_VERTEX_BUFFER;
        }
        if usage.contains(ResourceUsage::INDEX_BUFFER) {
            required |= FormatSupport::IA_INDEX_BUFFER;
        }
        if !support.contains(required) {
            return false;
        }
        if usage.intersects(ResourceUsage::SHADER_RESOURCE) {
            // depth formats are sampled through their color-compatible view format
            let sampled = self.native.format_support(format.depth_to_shader_resource());
            return sampled.contains(FormatSupport::SHADER_LOAD);
        }
        true
    }

    pub fn check_resource_handle_valid(&self, resource: Resource) -> bool {
        self.resources.contains(resource)
    }

    pub fn check_resource_view_handle_valid(&self, view: ResourceView) -> bool {
        self.views.contains(view)
    }

    pub(crate) fn resource_record(&self, resource: Resource) -> Option<ResourceRecord> {
        self.resources.get(resource)
    }

    /// Native object for a handle on a bind path.  Null and stale handles bind nothing.
    pub(crate) fn resolve_resource(&self, resource: Resource) -> Option<NativeObject> {
        self.resolve(&self.resources, resource, |r| r.native)
    }

    pub(crate) fn resolve_view(&self, view: ResourceView) -> Option<NativeObject> {
        self.resolve(&self.views, view, |v| v.native)
    }

    /// Like [`Self::resolve_view`], but a view of another kind binds nothing.
    pub(crate) fn resolve_view_as(&self, view: ResourceView, usage: ViewUsage) -> Option<NativeObject> {
        let native = self.resolve_view(view)?;
        match self.views.with(view, |v| v.usage) {
            Some(actual) if actual == usage => Some(native),
            actual => {
                logwise::warn_sync!(
                    "View {view} is a {actual} view, expected {usage}; binding null",
                    view = LogIt(&view),
                    actual = LogIt(&actual),
                    usage = LogIt(&usage)
                );
                None
            }
        }
    }

    pub(crate) fn resolve_sampler(&self, sampler: Sampler) -> Option<NativeObject> {
        self.resolve(&self.samplers, sampler, |s| *s)
    }

    fn resolve<K: Key, V>(
        &self,
        tracker: &ObjectTracker<K, V>,
        key: K,
        native: impl FnOnce(&V) -> NativeObject,
    ) -> Option<NativeObject> {
        if key.is_null() {
            return None;
        }
        let found = tracker.with(key, native);
        if found.is_none() && self.config.validate_handles {
            logwise::warn_sync!(
                "Stale handle {handle} bound as null ({tracker})",
                handle = LogIt(&key),
                tracker = LogIt(tracker)
            );
        }
        found
    }

    pub fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler, Error> {
        let native = self
            .native
            .create_sampler(&convert::sampler_desc(desc))
            .map_err(|e| self.creation_failed("sampler", e))?;
        Ok(self.samplers.insert(native))
    }

    pub fn destroy_sampler(&self, sampler: Sampler) {
        if let Some(native) = self.samplers.remove(sampler) {
            self.native.release(native);
        }
    }

    /// Logs a driver refusal and maps it onto the public error.
    fn creation_failed(&self, what: &'static str, e: NativeError) -> Error {
        logwise::error_sync!(
            "The driver refused to create a {what}: {error}",
            what = what,
            error = LogIt(&e)
        );
        match e {
            NativeError::UnsupportedFormat(format) => Error::UnsupportedFormat(format),
            NativeError::InvalidArg => Error::InvalidDescriptor("the driver rejected the parameters"),
            other => Error::Native(other),
        }
    }

    /// Creates a buffer or texture.
    ///
    /// `initial_data` holds one entry per subresource (level-major within each layer) or is
    /// empty.  `initial_state` is recorded for diagnostics.
    pub fn create_resource(
        &self,
        desc: &ResourceDesc,
        initial_data: &[SubresourceData<'_>],
        initial_state: ResourceUsage,
    ) -> Result<Resource, Error> {
        let native_desc = convert::resource_desc(desc)?;
        if !matches!(native_desc, NativeResourceDesc::Buffer(_))
            && !self.check_format_support(desc.texture.format, desc.usage)
        {
            return Err(Error::UnsupportedFormat(desc.texture.format));
        }
        let initial: Vec<SubresourceInit<'_>> = initial_data
            .iter()
            .map(|d| SubresourceInit {
                data: d.data,
                row_pitch: d.row_pitch,
                slice_pitch: d.slice_pitch,
            })
            .collect();
        let created = match &native_desc {
            NativeResourceDesc::Buffer(d) => self.native.create_buffer(d, initial.first()),
            NativeResourceDesc::Texture1d(d) => self.native.create_texture_1d(d, &initial),
            NativeResourceDesc::Texture2d(d) => self.native.create_texture_2d(d, &initial),
            NativeResourceDesc::Texture3d(d) => self.native.create_texture_3d(d, &initial),
        };
        let native = created.map_err(|e| self.creation_failed("resource", e))?;
        let resource = self.resources.insert(ResourceRecord {
            native,
            desc: native_desc,
            initial_state,
        });
        logwise::info_sync!(
            "Created resource {resource} in state {state}",
            resource = LogIt(&resource),
            state = LogIt(&initial_state)
        );
        self.events.init_resource(self, desc, resource);
        Ok(resource)
    }

    /// Destroys a resource and every view onto it.  Stale handles are ignored.
    pub fn destroy_resource(&self, resource: Resource) {
        if !self.resources.contains(resource) {
            return;
        }
        let doomed = self.views.extract_if(|_, v| v.resource == resource);
        for (view, record) in doomed {
            self.events.destroy_resource_view(self, view);
            self.native.release(record.native);
        }
        self.events.destroy_resource(self, resource);
        if let Some(removed) = self.resources.remove(resource) {
            self.native.release(removed.native);
            let state = removed.initial_state;
            logwise::info_sync!(
                "Destroyed resource {resource} (created in state {state})",
                resource = LogIt(&resource),
                state = LogIt(&state)
            );
        }
    }

    /// Creates a view of `resource`.
    ///
    /// `usage_type` selects the view kind and must name exactly one of shader-resource,
    /// unordered-access, render-target or depth-stencil.
    pub fn create_resource_view(
        &self,
        resource: Resource,
        usage_type: ResourceUsage,
        desc: &ResourceViewDesc,
    ) -> Result<ResourceView, Error> {
        let record = self
            .resources
            .get(resource)
            .ok_or(Error::HandleInvalid("resource"))?;
        let usage = ViewUsage::from_usage(usage_type).ok_or(Error::InvalidDescriptor(
            "a view is exactly one of shader-resource, unordered-access, render-target or depth-stencil",
        ))?;
        let view_desc = convert::view_desc(&record.desc, usage, desc)?;
        let created = match usage {
            ViewUsage::ShaderResource => {
                self.native.create_shader_resource_view(record.native, &view_desc)
            }
            ViewUsage::UnorderedAccess => {
                self.native.create_unordered_access_view(record.native, &view_desc)
            }
            ViewUsage::RenderTarget => {
                self.native.create_render_target_view(record.native, &view_desc)
            }
            ViewUsage::DepthStencil => {
                self.native.create_depth_stencil_view(record.native, &view_desc)
            }
        };
        let native = created.map_err(|e| self.creation_failed("resource view", e))?;
        let view = self.views.insert(ViewRecord {
            native,
            resource,
            usage,
        });
        logwise::trace_sync!(
            "Created {usage} view {view} of {resource}",
            usage = LogIt(&usage),
            view = LogIt(&view),
            resource = LogIt(&resource)
        );
        self.events
            .init_resource_view(self, resource, usage_type, desc, view);
        Ok(view)
    }

    pub fn destroy_resource_view(&self, view: ResourceView) {
        if !self.views.contains(view) {
            return;
        }
        self.events.destroy_resource_view(self, view);
        if let Some(record) = self.views.remove(view) {
            self.native.release(record.native);
        }
    }

    pub fn get_resource_from_view(&self, view: ResourceView) -> Result<Resource, Error> {
        self.views
            .with(view, |v| v.resource)
            .ok_or(Error::HandleInvalid("resource view"))
    }

    /// The description of a live resource, translated back from its native parameters.
    pub fn get_resource_desc(&self, resource: Resource) -> Result<ResourceDesc, Error> {
        self.resources
            .with(resource, |r| convert::resource_desc_from_native(&r.desc))
            .ok_or(Error::HandleInvalid("resource"))
    }

    /// Maps one subresource for host access.  This is the one call that may stall.
    pub fn map_resource(
        &self,
        resource: Resource,
        subresource: u32,
        access: MapAccess,
    ) -> Result<MappedSubresource, Error> {
        let record = self
            .resources
            .get(resource)
            .ok_or(Error::HandleInvalid("resource"))?;
        let map_type = convert::map_type(access, convert::usage_of(&record.desc));
        match self.native.map(record.native, subresource, map_type) {
            Ok(mapped) => Ok(MappedSubresource {
                data: mapped.data,
                len: mapped.len,
                row_pitch: mapped.row_pitch,
                slice_pitch: mapped.depth_pitch,
            }),
            Err(e) => {
                logwise::warn_sync!(
                    "Map of {resource} subresource {subresource} refused: {error}",
                    resource = LogIt(&resource),
                    subresource = subresource,
                    error = LogIt(&e)
                );
                Err(Error::MapFailed)
            }
        }
    }

    pub fn unmap_resource(&self, resource: Resource, subresource: u32) {
        if let Some(native) = self.resources.with(resource, |r| r.native) {
            self.native.unmap(native, subresource);
        }
    }

    /// Writes `data[..size]` into a buffer at byte `offset`.
    pub fn upload_buffer_region(
        &self,
        data: &[u8],
        dst: Resource,
        offset: u64,
        size: u64,
    ) -> Result<(), Error> {
        let record = self
            .resources
            .get(dst)
            .ok_or(Error::HandleInvalid("resource"))?;
        let NativeResourceDesc::Buffer(buffer) = record.desc else {
            return Err(Error::InvalidDescriptor("buffer upload into a texture"));
        };
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= buffer.byte_width as u64 && size <= data.len() as u64)
            .ok_or(Error::InvalidDescriptor("upload exceeds the buffer or the source"))?;
        if buffer.usage != Usage::Default {
            return Err(Error::InvalidDescriptor(
                "uploads need a GPU-only buffer; map CPU-visible buffers instead",
            ));
        }
        let region = NativeBox {
            left: offset as u32,
            top: 0,
            front: 0,
            right: end as u32,
            bottom: 1,
            back: 1,
        };
        self.native.update_subresource(
            record.native,
            0,
            Some(&region),
            &data[..size as usize],
            0,
            0,
        );
        Ok(())
    }

    /// Writes one texture subresource, or a box of it.
    pub fn upload_texture_region(
        &self,
        data: &SubresourceData<'_>,
        dst: Resource,
        subresource: u32,
        dst_box: Option<&SubresourceBox>,
    ) -> Result<(), Error> {
        let record = self
            .resources
            .get(dst)
            .ok_or(Error::HandleInvalid("resource"))?;
        if matches!(record.desc, NativeResourceDesc::Buffer(_)) {
            return Err(Error::InvalidDescriptor("texture upload into a buffer"));
        }
        let (levels, layers) = convert::levels_and_layers(&record.desc);
        if subresource >= levels * layers {
            return Err(Error::InvalidDescriptor("subresource index out of range"));
        }
        let extent = convert::subresource_box(&record.desc, subresource);
        if let Some(b) = dst_box
            && (b.left >= b.right
                || b.top >= b.bottom
                || b.front >= b.back
                || b.right > extent.right
                || b.bottom > extent.bottom
                || b.back > extent.back)
        {
            return Err(Error::InvalidDescriptor("upload box is empty or exceeds the subresource"));
        }
        let region = dst_box.map(convert::native_box);
        self.native.update_subresource(
            record.native,
            subresource,
            region.as_ref(),
            data.data,
            data.row_pitch,
            data.slice_pitch,
        );
        Ok(())
    }

    /// Attaches a debug name to a resource.
    ///
    /// Does nothing when annotations are disabled or the driver has no annotation interface.
    pub fn set_debug_name(&self, resource: Resource, name: &str) {
        if !self.config.debug_annotations || !self.native.supports_annotations() {
            return;
        }
        if let Some(native) = self.resources.with(resource, |r| r.native) {
            self.native.set_private_name(native, name);
        }
    }

    /// Waits for the GPU to finish outstanding work.  The driver serializes for us.
    pub fn wait_idle(&self) {}
}

impl Drop for Device {
    fn drop(&mut self) {
        let mut released = 0;
        for (_, object) in self.pipelines.drain() {
            for native in object.native_objects() {
                self.native.release(native);
            }
            released += 1;
        }
        for (_, module) in self.shader_modules.drain() {
            self.native.release(module.native);
            released += 1;
        }
        for (_, heap) in self.query_heaps.drain() {
            for query in heap.queries {
                self.native.release(query);
            }
            released += 1;
        }
        for (_, sampler) in self.samplers.drain() {
            self.native.release(sampler);
            released += 1;
        }
        for (_, view) in self.views.drain() {
            self.native.release(view.native);
            released += 1;
        }
        for (_, resource) in self.resources.drain() {
            self.native.release(resource.native);
            released += 1;
        }
        if released > 0 {
            logwise::info_sync!(
                "Device dropped with {count} live objects; released them",
                count = released
            );
        }
    }
}

#[cfg(all(test, feature = "software"))]
mod tests {
    use super::*;
    use crate::imp::software::SoftwareDevice;

    fn device() -> (SoftwareDevice, Arc<Device>) {
        let probe = SoftwareDevice::new();
        let device = Device::new(Box::new(probe.clone()), Config::default());
        (probe, device)
    }

    #[test]
    fn capabilities_follow_feature_level() {
        let (_, device) = device();
        assert!(device.check_capability(DeviceCaps::ComputeShader));
        assert!(device.check_capability(DeviceCaps::DescriptorTables));
        assert!(!device.check_capability(DeviceCaps::PartialPushConstantUpdates));
        assert!(!device.check_capability(DeviceCaps::CopyBufferToTexture));
        assert!(!device.check_capability(DeviceCaps::LogicOp));

        let old = SoftwareDevice::with_features(FeatureLevel::L10_1, Default::default());
        let old = Device::new(Box::new(old), Config::default());
        assert!(!old.check_capability(DeviceCaps::ComputeShader));
        assert!(!old.check_capability(DeviceCaps::DrawOrDispatchIndirect));
    }

    #[test]
    fn sampled_depth_format_support() {
        let (_, device) = device();
        assert!(device.check_format_support(
            Format::D32Float,
            ResourceUsage::DEPTH_STENCIL | ResourceUsage::SHADER_RESOURCE
        ));
        assert!(!device.check_format_support(Format::R8G8B8A8Unorm, ResourceUsage::DEPTH_STENCIL));
        assert!(!device.check_format_support(Format::BC1Unorm, ResourceUsage::RENDER_TARGET));
    }

    #[test]
    fn formats_without_a_typeless_family_are_usable() {
        let (_, device) = device();
        for format in [
            Format::R16G16Float,
            Format::R32G32Float,
            Format::R8G8Unorm,
            Format::A8Unorm,
            Format::B8G8R8X8Unorm,
        ] {
            let usage = ResourceUsage::SHADER_RESOURCE | ResourceUsage::RENDER_TARGET;
            assert!(device.check_format_support(format, usage), "{format:?}");
            let desc = ResourceDesc::texture_2d(
                4,
                4,
                format,
                crate::bindings::visible_to::MemoryHeap::GpuOnly,
                usage,
            );
            let texture = device.create_resource(&desc, &[], usage).unwrap();
            assert!(device.check_resource_handle_valid(texture));
            device
                .create_resource_view(texture, ResourceUsage::SHADER_RESOURCE, &Default::default())
                .unwrap();
        }
        assert!(device.check_format_support(Format::R32G32B32Float, ResourceUsage::SHADER_RESOURCE));
        assert!(device.check_format_support(Format::R32G32Float, ResourceUsage::VERTEX_BUFFER));
        assert!(!device.check_format_support(Format::R8G8B8A8Typeless, ResourceUsage::RENDER_TARGET));
    }

    #[test]
    fn drop_releases_everything() {
        let (probe, device) = device();
        let desc = ResourceDesc::texture_2d(
            4,
            4,
            Format::R8G8B8A8Unorm,
            crate::bindings::visible_to::MemoryHeap::GpuOnly,
            ResourceUsage::SHADER_RESOURCE,
        );
        let texture = device
            .create_resource(&desc, &[], ResourceUsage::SHADER_RESOURCE)
            .unwrap();
        device
            .create_resource_view(texture, ResourceUsage::SHADER_RESOURCE, &Default::default())
            .unwrap();
        device.create_sampler(&SamplerDesc::default()).unwrap();
        assert_eq!(probe.live_objects(), 3);
        drop(device);
        assert_eq!(probe.live_objects(), 0);
    }

    #[test]
    fn unknown_resource_kind_is_invalid() {
        let (_, device) = device();
        assert!(matches!(
            device.create_resource(&ResourceDesc::default(), &[], ResourceUsage::GENERAL),
            Err(Error::InvalidDescriptor(_))
        ));
    }
}
