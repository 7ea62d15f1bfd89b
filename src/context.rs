// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Device contexts: where commands are recorded.

A [`DeviceContext`] wraps one native context and implements [`CommandRecorder`] on top of it.
Every call is translated into the driver's slot-binding vocabulary: pipelines are expanded
into their fragments, descriptor tables are flattened range by range, and push constants are
written into a constant buffer owned by the context.

There are two kinds of context.  The immediate context executes as it records and exists at
most once per device.  Deferred contexts record into a [`CommandList`], which is then executed
on the immediate context.

```
use slotbound::imp::software::SoftwareDevice;
use slotbound::{CommandRecorder, Config, Device};

let device = Device::new(Box::new(SoftwareDevice::new()), Config::default());
let mut deferred = device.create_deferred_context().unwrap();
deferred.draw(3, 1, 0, 0);
let list = deferred.finish_command_list().unwrap();

let mut immediate = device.immediate_context().unwrap();
immediate.execute_command_list(&list);
```

A context is `Send` but not `Sync`: record on one thread at a time.
*/

mod descriptor_binding;
mod push_constants;
mod render_pass;
mod transfer;

use crate::bindings::descriptor::{Descriptor, DescriptorType};
use crate::bindings::handles::{
    DescriptorHeap, DescriptorTable, Key, Pipeline, PipelineLayout, QueryHeap, Resource,
    ResourceView, Sampler,
};
use crate::bindings::pipeline::{DynamicState, PipelineType, unpack_color};
use crate::bindings::query::QueryType;
use crate::bindings::resource::SubresourceBox;
use crate::bindings::sampler::FilterMode;
use crate::bindings::visible_to::{ResourceUsage, ShaderStage};
use crate::command_list::{CommandList, CommandRecorder, IndirectCommand};
use crate::device::{Device, OutputMergerState, PipelineObject, ViewUsage, convert};
use crate::error::Error;
use crate::imp::{ContextKind, NativeContext, NativeObject, Rect, Stage, Viewport, limits};
use crate::pixel_formats::Format;
use logwise::privacy::LogIt;
use push_constants::PushConstantBuffer;
use std::sync::Arc;

/// A recording context on a [`Device`].
#[derive(Debug)]
pub struct DeviceContext {
    device: Arc<Device>,
    native: Box<dyn NativeContext>,
    kind: ContextKind,
    has_open_render_pass: bool,
    push_constants: PushConstantBuffer,
    om: OutputMergerState,
    viewports: Vec<Viewport>,
    scissor_rects: Vec<Rect>,
}

impl DeviceContext {
    pub(crate) fn new(device: Arc<Device>, native: Box<dyn NativeContext>) -> Self {
        let kind = native.kind();
        logwise::trace_sync!("Opened {kind} context", kind = LogIt(&kind));
        DeviceContext {
            device,
            native,
            kind,
            has_open_render_pass: false,
            push_constants: PushConstantBuffer::default(),
            om: OutputMergerState::default(),
            viewports: Vec::new(),
            scissor_rects: Vec::new(),
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn bind_samplers(&mut self, stages: ShaderStage, first: u32, samplers: &[Sampler]) {
        let natives: Vec<Option<NativeObject>> = samplers
            .iter()
            .map(|s| self.device.resolve_sampler(*s))
            .collect();
        for stage in convert::stages(stages) {
            self.native.set_samplers(stage, first, &natives);
        }
    }

    pub fn bind_shader_resource_views(
        &mut self,
        stages: ShaderStage,
        first: u32,
        views: &[ResourceView],
    ) {
        let natives = self.resolve_views_as(views, ViewUsage::ShaderResource);
        for stage in convert::stages(stages) {
            self.native.set_shader_resources(stage, first, &natives);
        }
    }

    /// Only the pixel and compute stages have unordered-access slots; other stages are skipped.
    pub fn bind_unordered_access_views(
        &mut self,
        stages: ShaderStage,
        first: u32,
        views: &[ResourceView],
    ) {
        let natives = self.resolve_views_as(views, ViewUsage::UnorderedAccess);
        for stage in convert::stages(stages) {
            if matches!(stage, Stage::Pixel | Stage::Compute) {
                self.native.set_unordered_access_views(stage, first, &natives);
            }
        }
    }

    pub fn bind_constant_buffers(&mut self, stages: ShaderStage, first: u32, buffers: &[Resource]) {
        let natives: Vec<Option<NativeObject>> = buffers
            .iter()
            .map(|b| self.device.resolve_resource(*b))
            .collect();
        for stage in convert::stages(stages) {
            self.native.set_constant_buffers(stage, first, &natives);
        }
    }

    fn resolve_views_as(&self, views: &[ResourceView], usage: ViewUsage) -> Vec<Option<NativeObject>> {
        views
            .iter()
            .map(|v| self.device.resolve_view_as(*v, usage))
            .collect()
    }

    /// Closes a deferred recording into a command list.
    pub fn finish_command_list(&mut self) -> Result<CommandList, Error> {
        if self.kind != ContextKind::Deferred {
            return Err(Error::UnsupportedFeature(
                "only deferred contexts produce command lists",
            ));
        }
        if self.has_open_render_pass {
            logwise::warn_sync!("Finishing a command list inside an open render pass");
            self.has_open_render_pass = false;
        }
        let native = self.native.finish_command_list()?;
        Ok(CommandList::new(self.device.clone(), native))
    }

    /// Replays a command list.  Immediate contexts only.
    pub fn execute_command_list(&mut self, list: &CommandList) {
        assert_eq!(
            self.kind,
            ContextKind::Immediate,
            "command lists are executed on the immediate context"
        );
        self.native.execute_command_list(list.native());
    }

    /// Submits work recorded so far on the immediate context.
    pub fn flush_immediate_command_list(&mut self) {
        if self.kind == ContextKind::Immediate {
            self.native.flush();
        } else {
            logwise::warn_sync!("Flush on a deferred context ignored");
        }
    }

    /// The immediate command list, which is the immediate context itself.
    pub fn get_immediate_command_list(&mut self) -> &mut Self {
        assert_eq!(
            self.kind,
            ContextKind::Immediate,
            "only the immediate context has an immediate command list"
        );
        self
    }

    fn annotations(&self) -> bool {
        self.device.config().debug_annotations && self.device.native().supports_annotations()
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        if self.has_open_render_pass {
            logwise::warn_sync!("Context dropped inside an open render pass");
        }
        self.push_constants.release(&self.device);
        if self.kind == ContextKind::Immediate {
            self.device.return_immediate_context();
        }
    }
}

impl CommandRecorder for DeviceContext {
    fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn insert_barrier(
        &mut self,
        resources: &[Resource],
        _old_states: &[ResourceUsage],
        _new_states: &[ResourceUsage],
    ) {
        logwise::trace_sync!(
            "Ignoring barrier on {count} resources",
            count = resources.len()
        );
    }

    fn begin_render_pass(&mut self, rtvs: &[ResourceView], dsv: ResourceView) {
        self.open_render_pass(rtvs, dsv);
    }

    fn end_render_pass(&mut self) {
        self.close_render_pass();
    }

    fn bind_render_targets_and_depth_stencil(&mut self, rtvs: &[ResourceView], dsv: ResourceView) {
        self.set_render_targets(rtvs, dsv);
    }

    fn bind_pipeline(&mut self, kind: PipelineType, pipeline: Pipeline) {
        if pipeline.is_null() {
            PipelineObject::unbind(kind, self.native.as_mut(), &mut self.om);
            return;
        }
        let Some(object) = self.device.pipeline_object(pipeline) else {
            return;
        };
        if !object.bind(kind, self.native.as_mut(), &mut self.om) {
            logwise::warn_sync!(
                "Pipeline {pipeline} has no {kind} fragment; nothing bound",
                pipeline = LogIt(&pipeline),
                kind = LogIt(&kind)
            );
        }
    }

    fn bind_pipeline_states(&mut self, states: &[(DynamicState, u32)]) {
        for (state, value) in states {
            match state {
                DynamicState::PrimitiveTopology => self.native.ia_set_primitive_topology(*value),
                DynamicState::BlendConstant => {
                    self.om.blend_constant = unpack_color(*value);
                    self.om.issue_blend(self.native.as_mut());
                }
                DynamicState::SampleMask => {
                    self.om.sample_mask = *value;
                    self.om.issue_blend(self.native.as_mut());
                }
                DynamicState::StencilReferenceValue => {
                    self.om.stencil_ref = *value;
                    self.om.issue_depth_stencil(self.native.as_mut());
                }
                other => {
                    if cfg!(debug_assertions) {
                        panic!("{other:?} is baked into pipeline state objects and cannot be set dynamically");
                    }
                    logwise::error_sync!(
                        "Skipping dynamic state {state}: baked into state objects",
                        state = LogIt(other)
                    );
                }
            }
        }
    }

    fn bind_viewports(&mut self, first: u32, viewports: &[f32]) {
        let new = convert::viewports(viewports);
        let first = first as usize;
        let end = (first + new.len()).min(limits::VIEWPORT_SLOTS as usize);
        if end <= first {
            return;
        }
        if self.viewports.len() < end {
            self.viewports.resize(end, Viewport::default());
        }
        self.viewports[first..end].copy_from_slice(&new[..end - first]);
        self.native.rs_set_viewports(&self.viewports);
    }

    fn bind_scissor_rects(&mut self, first: u32, rects: &[i32]) {
        let new = convert::rects(rects);
        let first = first as usize;
        let end = (first + new.len()).min(limits::VIEWPORT_SLOTS as usize);
        if end <= first {
            return;
        }
        if self.scissor_rects.len() < end {
            self.scissor_rects.resize(end, Rect::default());
        }
        self.scissor_rects[first..end].copy_from_slice(&new[..end - first]);
        self.native.rs_set_scissor_rects(&self.scissor_rects);
    }

    fn push_constants(
        &mut self,
        stages: ShaderStage,
        layout: PipelineLayout,
        layout_index: u32,
        first: u32,
        values: &[u32],
    ) {
        let register = if layout.is_null() {
            0
        } else {
            match self.layout_param(layout, layout_index) {
                Some(param) => {
                    if !param.visibility().contains(stages) {
                        logwise::warn_sync!(
                            "Pushing constants to {stages} outside the visibility of param {index}",
                            stages = LogIt(&stages),
                            index = layout_index
                        );
                    }
                    param.dx_register_index()
                }
                None => return,
            }
        };
        let Some(buffer) =
            self.push_constants
                .write(&self.device, self.native.as_mut(), first, values)
        else {
            return;
        };
        for stage in convert::stages(stages) {
            self.native.set_constant_buffers(stage, register, &[Some(buffer)]);
        }
    }

    fn push_descriptors(
        &mut self,
        stages: ShaderStage,
        layout: PipelineLayout,
        layout_index: u32,
        kind: DescriptorType,
        first: u32,
        descriptors: &[Descriptor],
    ) {
        let base = if layout.is_null() {
            0
        } else {
            match self.layout_param(layout, layout_index) {
                Some(param) => param.push_register(kind),
                None => return,
            }
        };
        self.bind_descriptors(stages, base + first, kind, descriptors);
    }

    fn bind_descriptor_heaps(&mut self, _heaps: &[DescriptorHeap]) {}

    fn bind_descriptor_tables(
        &mut self,
        kind: PipelineType,
        layout: PipelineLayout,
        first: u32,
        tables: &[DescriptorTable],
    ) {
        self.bind_tables(kind.stages(), layout, first, tables);
    }

    fn bind_index_buffer(&mut self, buffer: Resource, offset: u64, index_size: u32) {
        let native = self.device.resolve_resource(buffer);
        let (Some(format), Ok(offset)) = (convert::index_format(index_size), u32::try_from(offset))
        else {
            logwise::error_sync!(
                "Index buffer with {size}-byte indices at offset {offset} cannot be bound",
                size = index_size,
                offset = offset
            );
            return;
        };
        self.native.ia_set_index_buffer(native, format, offset);
    }

    fn bind_vertex_buffers(
        &mut self,
        first: u32,
        buffers: &[Resource],
        offsets: &[u64],
        strides: &[u32],
    ) {
        let natives: Vec<Option<NativeObject>> = buffers
            .iter()
            .map(|b| self.device.resolve_resource(*b))
            .collect();
        let offsets: Vec<u32> = offsets
            .iter()
            .map(|o| u32::try_from(*o).unwrap_or(u32::MAX))
            .collect();
        self.native
            .ia_set_vertex_buffers(first, &natives, strides, &offsets);
    }

    fn draw(&mut self, vertices: u32, instances: u32, first_vertex: u32, first_instance: u32) {
        self.native
            .draw_instanced(vertices, instances, first_vertex, first_instance);
    }

    fn draw_indexed(
        &mut self,
        indices: u32,
        instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.native
            .draw_indexed_instanced(indices, instances, first_index, vertex_offset, first_instance);
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.native.dispatch(x, y, z);
    }

    fn draw_or_dispatch_indirect(
        &mut self,
        kind: IndirectCommand,
        buffer: Resource,
        offset: u64,
        draw_count: u32,
        stride: u32,
    ) {
        let Some(native) = self.device.resolve_resource(buffer) else {
            return;
        };
        for i in 0..draw_count as u64 {
            let Ok(at) = u32::try_from(offset + i * stride as u64) else {
                logwise::error_sync!(
                    "Indirect command {index} lies past the driver's 32-bit offsets",
                    index = i
                );
                return;
            };
            match kind {
                IndirectCommand::Draw => self.native.draw_instanced_indirect(native, at),
                IndirectCommand::DrawIndexed => self.native.draw_indexed_instanced_indirect(native, at),
                IndirectCommand::Dispatch => self.native.dispatch_indirect(native, at),
            }
        }
    }

    fn copy_resource(&mut self, src: Resource, dst: Resource) {
        if let (Some(src), Some(dst)) = (
            self.device.resolve_resource(src),
            self.device.resolve_resource(dst),
        ) {
            self.native.copy_resource(dst, src);
        }
    }

    fn copy_buffer_region(
        &mut self,
        src: Resource,
        src_offset: u64,
        dst: Resource,
        dst_offset: u64,
        size: u64,
    ) {
        self.copy_buffer_bytes(src, src_offset, dst, dst_offset, size);
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: Resource,
        _src_offset: u64,
        _row_length: u32,
        _slice_height: u32,
        dst: Resource,
        _dst_subresource: u32,
        _dst_box: Option<&SubresourceBox>,
    ) {
        logwise::error_sync!(
            "Buffer-to-texture copy from {src} to {dst} is not supported by the driver",
            src = LogIt(&src),
            dst = LogIt(&dst)
        );
    }

    fn copy_texture_region(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_box: Option<&SubresourceBox>,
        _filter: FilterMode,
    ) {
        self.copy_texture_box(
            "Texture copy",
            src,
            src_subresource,
            src_box,
            dst,
            dst_subresource,
            dst_box,
        );
    }

    fn copy_texture_to_buffer(
        &mut self,
        src: Resource,
        _src_subresource: u32,
        _src_box: Option<&SubresourceBox>,
        dst: Resource,
        _dst_offset: u64,
        _row_length: u32,
        _slice_height: u32,
    ) {
        logwise::error_sync!(
            "Texture-to-buffer copy from {src} to {dst} is not supported by the driver",
            src = LogIt(&src),
            dst = LogIt(&dst)
        );
    }

    fn blit(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_box: Option<&SubresourceBox>,
        _filter: FilterMode,
    ) {
        self.copy_texture_box(
            "Blit",
            src,
            src_subresource,
            src_box,
            dst,
            dst_subresource,
            dst_box,
        );
    }

    fn resolve(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_offset: [u32; 3],
        format: Format,
    ) {
        self.resolve_texture(
            src,
            src_subresource,
            src_box,
            dst,
            dst_subresource,
            dst_offset,
            format,
        );
    }

    fn generate_mipmaps(&mut self, srv: ResourceView) {
        if let Some(native) = self.device.resolve_view_as(srv, ViewUsage::ShaderResource) {
            self.native.generate_mips(native);
        }
    }

    fn clear_depth_stencil_view(&mut self, dsv: ResourceView, depth: Option<f32>, stencil: Option<u8>) {
        self.clear_depth_stencil(dsv, depth, stencil);
    }

    fn clear_render_target_views(&mut self, rtvs: &[ResourceView], color: [f32; 4]) {
        self.clear_render_targets(rtvs, color);
    }

    fn clear_unordered_access_view_uint(&mut self, uav: ResourceView, values: [u32; 4]) {
        if let Some(native) = self.device.resolve_view_as(uav, ViewUsage::UnorderedAccess) {
            self.native.clear_unordered_access_view_uint(native, values);
        }
    }

    fn clear_unordered_access_view_float(&mut self, uav: ResourceView, values: [f32; 4]) {
        if let Some(native) = self.device.resolve_view_as(uav, ViewUsage::UnorderedAccess) {
            self.native.clear_unordered_access_view_float(native, values);
        }
    }

    fn begin_query(&mut self, heap: QueryHeap, kind: QueryType, index: u32) {
        // timestamps only have an end
        if kind == QueryType::Timestamp {
            return;
        }
        if let Some((_, query)) = self.device.query(heap, index) {
            self.native.begin_query(query);
        }
    }

    fn end_query(&mut self, heap: QueryHeap, _kind: QueryType, index: u32) {
        if let Some((_, query)) = self.device.query(heap, index) {
            self.native.end_query(query);
        }
    }

    fn copy_query_results(
        &mut self,
        heap: QueryHeap,
        kind: QueryType,
        first: u32,
        count: u32,
        dst: Resource,
        dst_offset: u64,
        stride: u32,
    ) {
        self.copy_query_results_via_host(heap, kind, first, count, dst, dst_offset, stride);
    }

    fn begin_debug_marker(&mut self, label: &str, _color: [f32; 4]) {
        if self.annotations() {
            self.native.begin_event(label);
        }
    }

    fn end_debug_marker(&mut self) {
        if self.annotations() {
            self.native.end_event();
        }
    }

    fn insert_debug_marker(&mut self, label: &str, _color: [f32; 4]) {
        if self.annotations() {
            self.native.set_marker(label);
        }
    }
}

#[cfg(all(test, feature = "software"))]
mod tests {
    use super::*;
    use crate::Config;
    use crate::imp::software::{Call, SoftwareDevice};

    fn device() -> (SoftwareDevice, Arc<Device>) {
        let probe = SoftwareDevice::new();
        let device = Device::new(Box::new(probe.clone()), Config::default());
        (probe, device)
    }

    #[test]
    fn viewports_merge_into_the_shadow() {
        let (probe, device) = device();
        let mut ctx = device.immediate_context().unwrap();
        ctx.bind_viewports(0, &[0.0, 0.0, 64.0, 64.0, 0.0, 1.0]);
        ctx.bind_viewports(1, &[0.0, 0.0, 32.0, 32.0, 0.0, 1.0]);
        let state = probe.pipeline_state();
        assert_eq!(state.viewports.len(), 2);
        assert_eq!(state.viewports[0].width, 64.0);
        assert_eq!(state.viewports[1].width, 32.0);
    }

    #[test]
    fn dynamic_blend_constant_keeps_the_bound_state() {
        let (probe, device) = device();
        let blend = device
            .create_pipeline(&crate::bindings::pipeline::PipelineDesc::BlendState(
                Default::default(),
            ))
            .unwrap();
        let mut ctx = device.immediate_context().unwrap();
        ctx.bind_pipeline(PipelineType::BlendState, blend);
        let bound = probe.pipeline_state().blend.state;
        assert!(bound.is_some());
        ctx.bind_pipeline_states(&[(DynamicState::BlendConstant, 0xFF00_00FF)]);
        let state = probe.pipeline_state();
        assert_eq!(state.blend.state, bound);
        assert_eq!(state.blend.blend_factor, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn indirect_draws_step_by_stride() {
        let (probe, device) = device();
        let args = device
            .create_resource(
                &crate::bindings::resource::ResourceDesc::buffer(
                    64,
                    crate::bindings::visible_to::MemoryHeap::GpuOnly,
                    ResourceUsage::INDIRECT_ARGUMENT,
                ),
                &[],
                ResourceUsage::INDIRECT_ARGUMENT,
            )
            .unwrap();
        let mut ctx = device.immediate_context().unwrap();
        probe.take_calls();
        ctx.draw_or_dispatch_indirect(IndirectCommand::Draw, args, 0, 3, 16);
        let offsets: Vec<u32> = probe
            .take_calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DrawInstancedIndirect(_, offset) => Some(offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 16, 32]);
    }

    #[test]
    fn command_lists_flow_from_deferred_to_immediate() {
        let (_, device) = device();
        let mut deferred = device.create_deferred_context().unwrap();
        assert_eq!(deferred.kind(), ContextKind::Deferred);
        let list = deferred.finish_command_list().unwrap();
        let mut immediate = device.immediate_context().unwrap();
        assert!(matches!(
            immediate.finish_command_list(),
            Err(Error::UnsupportedFeature(_))
        ));
        immediate.execute_command_list(&list);
    }

    #[test]
    #[should_panic(expected = "immediate command list")]
    fn deferred_context_has_no_immediate_command_list() {
        let (_, device) = device();
        let mut deferred = device.create_deferred_context().unwrap();
        deferred.get_immediate_command_list();
    }

    #[test]
    fn query_results_are_copied_only_on_the_immediate_context() {
        let (probe, device) = device();
        let heap = device.create_query_heap(QueryType::Timestamp, 1).unwrap();
        let dst = device
            .create_resource(
                &crate::bindings::resource::ResourceDesc::buffer(
                    8,
                    crate::bindings::visible_to::MemoryHeap::GpuOnly,
                    ResourceUsage::COPY_DEST,
                ),
                &[],
                ResourceUsage::COPY_DEST,
            )
            .unwrap();
        let uploads = |calls: Vec<Call>| {
            calls
                .iter()
                .filter(|c| matches!(c, Call::UpdateSubresource { .. }))
                .count()
        };
        let mut immediate = device.immediate_context().unwrap();
        immediate.end_query(heap, QueryType::Timestamp, 0);

        let mut deferred = device.create_deferred_context().unwrap();
        deferred.copy_query_results(heap, QueryType::Timestamp, 0, 1, dst, 0, 8);
        let list = deferred.finish_command_list().unwrap();
        probe.take_calls();
        immediate.execute_command_list(&list);
        assert_eq!(uploads(probe.take_calls()), 0);

        immediate.copy_query_results(heap, QueryType::Timestamp, 0, 1, dst, 0, 8);
        assert_eq!(uploads(probe.take_calls()), 1);
    }

    #[test]
    fn dropping_context_releases_push_buffer() {
        let (probe, device) = device();
        let mut ctx = device.immediate_context().unwrap();
        ctx.push_constants(ShaderStage::PIXEL, PipelineLayout::null(), 0, 0, &[1, 2, 3]);
        assert_eq!(probe.live_objects(), 1);
        drop(ctx);
        assert_eq!(probe.live_objects(), 0);
        assert!(device.immediate_context().is_ok());
    }
}
