// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The recording interface and the replay-only command list.

[`CommandRecorder`] is what callers record against.  It is implemented by
[`crate::context::DeviceContext`], which translates every call into native slot binds, and by
[`CommandList`], the finished product of a deferred context.  A command list can only be
replayed: every recording method on it panics.

Handles passed to recording methods are expected to be valid.  A stale handle binds null
(and is logged when [`crate::Config::validate_handles`] is set); it never reaches the driver.
*/

use crate::bindings::descriptor::{Descriptor, DescriptorType};
use crate::bindings::handles::{
    DescriptorHeap, DescriptorTable, Pipeline, PipelineLayout, QueryHeap, Resource, ResourceView,
};
use crate::bindings::pipeline::{DynamicState, PipelineType};
use crate::bindings::query::QueryType;
use crate::bindings::resource::SubresourceBox;
use crate::bindings::sampler::FilterMode;
use crate::bindings::visible_to::{ResourceUsage, ShaderStage};
use crate::device::Device;
use crate::imp::NativeObject;
use crate::pixel_formats::Format;
use logwise::privacy::LogIt;
use std::sync::Arc;

/// Which native call an indirect command becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndirectCommand {
    Draw,
    DrawIndexed,
    Dispatch,
}

/**
Records GPU work.

Viewports are flat runs of 6 floats (x, y, width, height, min depth, max depth) and scissor
rects flat runs of 4 ints (left, top, right, bottom).  Offsets are in bytes and subresource
indices are `level + layer * levels`.
*/
#[allow(clippy::too_many_arguments)]
pub trait CommandRecorder {
    fn device(&self) -> &Arc<Device>;

    /// The driver tracks hazards itself; recorders may ignore this.
    fn insert_barrier(
        &mut self,
        resources: &[Resource],
        old_states: &[ResourceUsage],
        new_states: &[ResourceUsage],
    );

    /// Binds render targets and opens a render pass.  Passes do not nest.
    fn begin_render_pass(&mut self, rtvs: &[ResourceView], dsv: ResourceView);
    fn end_render_pass(&mut self);
    fn bind_render_targets_and_depth_stencil(&mut self, rtvs: &[ResourceView], dsv: ResourceView);

    /// Binds the fragments of `pipeline` that `kind` selects; a null pipeline unbinds them.
    fn bind_pipeline(&mut self, kind: PipelineType, pipeline: Pipeline);
    fn bind_pipeline_states(&mut self, states: &[(DynamicState, u32)]);
    fn bind_viewports(&mut self, first: u32, viewports: &[f32]);
    fn bind_scissor_rects(&mut self, first: u32, rects: &[i32]);

    fn push_constants(
        &mut self,
        stages: ShaderStage,
        layout: PipelineLayout,
        layout_index: u32,
        first: u32,
        values: &[u32],
    );
    fn push_descriptors(
        &mut self,
        stages: ShaderStage,
        layout: PipelineLayout,
        layout_index: u32,
        kind: DescriptorType,
        first: u32,
        descriptors: &[Descriptor],
    );
    fn bind_descriptor_heaps(&mut self, heaps: &[DescriptorHeap]);
    fn bind_descriptor_tables(
        &mut self,
        kind: PipelineType,
        layout: PipelineLayout,
        first: u32,
        tables: &[DescriptorTable],
    );

    /// `index_size` is 2 or 4 bytes.
    fn bind_index_buffer(&mut self, buffer: Resource, offset: u64, index_size: u32);
    fn bind_vertex_buffers(
        &mut self,
        first: u32,
        buffers: &[Resource],
        offsets: &[u64],
        strides: &[u32],
    );

    fn draw(&mut self, vertices: u32, instances: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        indices: u32,
        instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    /// Issues `draw_count` indirect commands, `stride` bytes apart.
    fn draw_or_dispatch_indirect(
        &mut self,
        kind: IndirectCommand,
        buffer: Resource,
        offset: u64,
        draw_count: u32,
        stride: u32,
    );

    fn copy_resource(&mut self, src: Resource, dst: Resource);
    fn copy_buffer_region(
        &mut self,
        src: Resource,
        src_offset: u64,
        dst: Resource,
        dst_offset: u64,
        size: u64,
    );
    fn copy_buffer_to_texture(
        &mut self,
        src: Resource,
        src_offset: u64,
        row_length: u32,
        slice_height: u32,
        dst: Resource,
        dst_subresource: u32,
        dst_box: Option<&SubresourceBox>,
    );
    fn copy_texture_region(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_box: Option<&SubresourceBox>,
        filter: FilterMode,
    );
    fn copy_texture_to_buffer(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_offset: u64,
        row_length: u32,
        slice_height: u32,
    );
    /// Copies between subresources; the boxes must be the same size.
    fn blit(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_box: Option<&SubresourceBox>,
        filter: FilterMode,
    );
    fn resolve(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_offset: [u32; 3],
        format: Format,
    );
    fn generate_mipmaps(&mut self, srv: ResourceView);

    /// `None` leaves that aspect untouched.
    fn clear_depth_stencil_view(&mut self, dsv: ResourceView, depth: Option<f32>, stencil: Option<u8>);
    fn clear_render_target_views(&mut self, rtvs: &[ResourceView], color: [f32; 4]);
    fn clear_unordered_access_view_uint(&mut self, uav: ResourceView, values: [u32; 4]);
    fn clear_unordered_access_view_float(&mut self, uav: ResourceView, values: [f32; 4]);

    fn begin_query(&mut self, heap: QueryHeap, kind: QueryType, index: u32);
    fn end_query(&mut self, heap: QueryHeap, kind: QueryType, index: u32);
    /// Writes `count` results into `dst`, `stride` bytes apart.
    ///
    /// Only the immediate context copies; deferred contexts log an error and record nothing.
    fn copy_query_results(
        &mut self,
        heap: QueryHeap,
        kind: QueryType,
        first: u32,
        count: u32,
        dst: Resource,
        dst_offset: u64,
        stride: u32,
    );

    fn begin_debug_marker(&mut self, label: &str, color: [f32; 4]);
    fn end_debug_marker(&mut self);
    fn insert_debug_marker(&mut self, label: &str, color: [f32; 4]);
}

/**
A finished deferred recording.

Produced by [`crate::context::DeviceContext::finish_command_list`] and consumed by
[`crate::context::DeviceContext::execute_command_list`] on the immediate context.  It
implements [`CommandRecorder`] so it can be passed where a recorder is expected, but it is
closed: every recording method panics.
*/
#[derive(Debug)]
pub struct CommandList {
    device: Arc<Device>,
    native: NativeObject,
}

impl CommandList {
    pub(crate) fn new(device: Arc<Device>, native: NativeObject) -> Self {
        CommandList { device, native }
    }

    pub(crate) fn native(&self) -> NativeObject {
        self.native
    }

    #[track_caller]
    fn replay_only(&self, operation: &str) -> ! {
        panic!(
            "{operation} recorded on command list {native:?}; command lists can only be executed",
            native = self.native
        );
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        logwise::trace_sync!("Releasing command list {native}", native = LogIt(&self.native));
        self.device.native().release(self.native);
    }
}

impl CommandRecorder for CommandList {
    fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn insert_barrier(&mut self, _: &[Resource], _: &[ResourceUsage], _: &[ResourceUsage]) {
        self.replay_only("insert_barrier")
    }

    fn begin_render_pass(&mut self, _: &[ResourceView], _: ResourceView) {
        self.replay_only("begin_render_pass")
    }

    fn end_render_pass(&mut self) {
        self.replay_only("end_render_pass")
    }

    fn bind_render_targets_and_depth_stencil(&mut self, _: &[ResourceView], _: ResourceView) {
        self.replay_only("bind_render_targets_and_depth_stencil")
    }

    fn bind_pipeline(&mut self, _: PipelineType, _: Pipeline) {
        self.replay_only("bind_pipeline")
    }

    fn bind_pipeline_states(&mut self, _: &[(DynamicState, u32)]) {
        self.replay_only("bind_pipeline_states")
    }

    fn bind_viewports(&mut self, _: u32, _: &[f32]) {
        self.replay_only("bind_viewports")
    }

    fn bind_scissor_rects(&mut self, _: u32, _: &[i32]) {
        self.replay_only("bind_scissor_rects")
    }

    fn push_constants(&mut self, _: ShaderStage, _: PipelineLayout, _: u32, _: u32, _: &[u32]) {
        self.replay_only("push_constants")
    }

    fn push_descriptors(
        &mut self,
        _: ShaderStage,
        _: PipelineLayout,
        _: u32,
        _: DescriptorType,
        _: u32,
        _: &[Descriptor],
    ) {
        self.replay_only("push_descriptors")
    }

    fn bind_descriptor_heaps(&mut self, _: &[DescriptorHeap]) {
        self.replay_only("bind_descriptor_heaps")
    }

    fn bind_descriptor_tables(
        &mut self,
        _: PipelineType,
        _: PipelineLayout,
        _: u32,
        _: &[DescriptorTable],
    ) {
        self.replay_only("bind_descriptor_tables")
    }

    fn bind_index_buffer(&mut self, _: Resource, _: u64, _: u32) {
        self.replay_only("bind_index_buffer")
    }

    fn bind_vertex_buffers(&mut self, _: u32, _: &[Resource], _: &[u64], _: &[u32]) {
        self.replay_only("bind_vertex_buffers")
    }

    fn draw(&mut self, _: u32, _: u32, _: u32, _: u32) {
        self.replay_only("draw")
    }

    fn draw_indexed(&mut self, _: u32, _: u32, _: u32, _: i32, _: u32) {
        self.replay_only("draw_indexed")
    }

    fn dispatch(&mut self, _: u32, _: u32, _: u32) {
        self.replay_only("dispatch")
    }

    fn draw_or_dispatch_indirect(&mut self, _: IndirectCommand, _: Resource, _: u64, _: u32, _: u32) {
        self.replay_only("draw_or_dispatch_indirect")
    }

    fn copy_resource(&mut self, _: Resource, _: Resource) {
        self.replay_only("copy_resource")
    }

    fn copy_buffer_region(&mut self, _: Resource, _: u64, _: Resource, _: u64, _: u64) {
        self.replay_only("copy_buffer_region")
    }

    fn copy_buffer_to_texture(
        &mut self,
        _: Resource,
        _: u64,
        _: u32,
        _: u32,
        _: Resource,
        _: u32,
        _: Option<&SubresourceBox>,
    ) {
        self.replay_only("copy_buffer_to_texture")
    }

    fn copy_texture_region(
        &mut self,
        _: Resource,
        _: u32,
        _: Option<&SubresourceBox>,
        _: Resource,
        _: u32,
        _: Option<&SubresourceBox>,
        _: FilterMode,
    ) {
        self.replay_only("copy_texture_region")
    }

    fn copy_texture_to_buffer(
        &mut self,
        _: Resource,
        _: u32,
        _: Option<&SubresourceBox>,
        _: Resource,
        _: u64,
        _: u32,
        _: u32,
    ) {
        self.replay_only("copy_texture_to_buffer")
    }

    fn blit(
        &mut self,
        _: Resource,
        _: u32,
        _: Option<&SubresourceBox>,
        _: Resource,
        _: u32,
        _: Option<&SubresourceBox>,
        _: FilterMode,
    ) {
        self.replay_only("blit")
    }

    fn resolve(
        &mut self,
        _: Resource,
        _: u32,
        _: Option<&SubresourceBox>,
        _: Resource,
        _: u32,
        _: [u32; 3],
        _: Format,
    ) {
        self.replay_only("resolve")
    }

    fn generate_mipmaps(&mut self, _: ResourceView) {
        self.replay_only("generate_mipmaps")
    }

    fn clear_depth_stencil_view(&mut self, _: ResourceView, _: Option<f32>, _: Option<u8>) {
        self.replay_only("clear_depth_stencil_view")
    }

    fn clear_render_target_views(&mut self, _: &[ResourceView], _: [f32; 4]) {
        self.replay_only("clear_render_target_views")
    }

    fn clear_unordered_access_view_uint(&mut self, _: ResourceView, _: [u32; 4]) {
        self.replay_only("clear_unordered_access_view_uint")
    }

    fn clear_unordered_access_view_float(&mut self, _: ResourceView, _: [f32; 4]) {
        self.replay_only("clear_unordered_access_view_float")
    }

    fn begin_query(&mut self, _: QueryHeap, _: QueryType, _: u32) {
        self.replay_only("begin_query")
    }

    fn end_query(&mut self, _: QueryHeap, _: QueryType, _: u32) {
        self.replay_only("end_query")
    }

    fn copy_query_results(
        &mut self,
        _: QueryHeap,
        _: QueryType,
        _: u32,
        _: u32,
        _: Resource,
        _: u64,
        _: u32,
    ) {
        self.replay_only("copy_query_results")
    }

    fn begin_debug_marker(&mut self, _: &str, _: [f32; 4]) {
        self.replay_only("begin_debug_marker")
    }

    fn end_debug_marker(&mut self) {
        self.replay_only("end_debug_marker")
    }

    fn insert_debug_marker(&mut self, _: &str, _: [f32; 4]) {
        self.replay_only("insert_debug_marker")
    }
}
