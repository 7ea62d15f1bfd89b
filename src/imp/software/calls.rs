// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Recorded context calls.
//!
//! Every [`crate::imp::NativeContext`] call on a software context becomes one [`Call`].  The
//! immediate context executes and logs them; deferred contexts keep them for replay.

use crate::imp::{ClearFlags, NativeBox, NativeObject, Rect, Stage, Viewport};
use crate::pixel_formats::Format;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetInputLayout(Option<NativeObject>),
    SetPrimitiveTopology(u32),
    SetVertexBuffers {
        first: u32,
        buffers: Vec<Option<NativeObject>>,
        strides: Vec<u32>,
        offsets: Vec<u32>,
    },
    SetIndexBuffer {
        buffer: Option<NativeObject>,
        format: Format,
        offset: u32,
    },
    SetShader(Stage, Option<NativeObject>),
    SetShaderResources(Stage, u32, Vec<Option<NativeObject>>),
    SetSamplers(Stage, u32, Vec<Option<NativeObject>>),
    SetConstantBuffers(Stage, u32, Vec<Option<NativeObject>>),
    SetUnorderedAccessViews(Stage, u32, Vec<Option<NativeObject>>),
    SetRasterizerState(Option<NativeObject>),
    SetViewports(Vec<Viewport>),
    SetScissorRects(Vec<Rect>),
    SetBlendState {
        state: Option<NativeObject>,
        blend_factor: [f32; 4],
        sample_mask: u32,
    },
    SetDepthStencilState {
        state: Option<NativeObject>,
        stencil_ref: u32,
    },
    SetRenderTargets {
        rtvs: Vec<Option<NativeObject>>,
        dsv: Option<NativeObject>,
    },
    DrawInstanced {
        vertices: u32,
        instances: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexedInstanced {
        indices: u32,
        instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch(u32, u32, u32),
    DrawInstancedIndirect(NativeObject, u32),
    DrawIndexedInstancedIndirect(NativeObject, u32),
    DispatchIndirect(NativeObject, u32),
    CopyResource {
        dst: NativeObject,
        src: NativeObject,
    },
    CopySubresourceRegion {
        dst: NativeObject,
        dst_subresource: u32,
        dst_offset: [u32; 3],
        src: NativeObject,
        src_subresource: u32,
        src_box: Option<NativeBox>,
    },
    ResolveSubresource {
        dst: NativeObject,
        dst_subresource: u32,
        src: NativeObject,
        src_subresource: u32,
        format: Format,
    },
    UpdateSubresource {
        dst: NativeObject,
        dst_subresource: u32,
        dst_box: Option<NativeBox>,
        data: Vec<u8>,
        row_pitch: u32,
        depth_pitch: u32,
    },
    GenerateMips(NativeObject),
    ClearRenderTargetView(NativeObject, [f32; 4]),
    ClearDepthStencilView {
        dsv: NativeObject,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    },
    ClearUnorderedAccessViewUint(NativeObject, [u32; 4]),
    ClearUnorderedAccessViewFloat(NativeObject, [f32; 4]),
    BeginQuery(NativeObject),
    EndQuery(NativeObject),
    BeginEvent(String),
    EndEvent,
    SetMarker(String),
    Flush,
    ExecuteCommandList(NativeObject),
}

impl Call {
    /// Objects the call refers to.  A recorded call holds a reference on each of them.
    pub fn objects(&self) -> Vec<NativeObject> {
        match self {
            Call::SetInputLayout(object)
            | Call::SetShader(_, object)
            | Call::SetRasterizerState(object)
            | Call::SetIndexBuffer { buffer: object, .. }
            | Call::SetBlendState { state: object, .. }
            | Call::SetDepthStencilState { state: object, .. } => object.iter().copied().collect(),
            Call::SetVertexBuffers { buffers: slots, .. }
            | Call::SetShaderResources(_, _, slots)
            | Call::SetSamplers(_, _, slots)
            | Call::SetConstantBuffers(_, _, slots)
            | Call::SetUnorderedAccessViews(_, _, slots) => slots.iter().flatten().copied().collect(),
            Call::SetRenderTargets { rtvs, dsv } => rtvs.iter().flatten().chain(dsv).copied().collect(),
            Call::DrawInstancedIndirect(object, _)
            | Call::DrawIndexedInstancedIndirect(object, _)
            | Call::DispatchIndirect(object, _)
            | Call::GenerateMips(object)
            | Call::ClearRenderTargetView(object, _)
            | Call::ClearDepthStencilView { dsv: object, .. }
            | Call::ClearUnorderedAccessViewUint(object, _)
            | Call::ClearUnorderedAccessViewFloat(object, _)
            | Call::BeginQuery(object)
            | Call::EndQuery(object)
            | Call::ExecuteCommandList(object)
            | Call::UpdateSubresource { dst: object, .. } => vec![*object],
            Call::CopyResource { dst, src }
            | Call::CopySubresourceRegion { dst, src, .. }
            | Call::ResolveSubresource { dst, src, .. } => vec![*dst, *src],
            Call::SetPrimitiveTopology(_)
            | Call::SetViewports(_)
            | Call::SetScissorRects(_)
            | Call::DrawInstanced { .. }
            | Call::DrawIndexedInstanced { .. }
            | Call::Dispatch(..)
            | Call::BeginEvent(_)
            | Call::EndEvent
            | Call::SetMarker(_)
            | Call::Flush => Vec::new(),
        }
    }

    /// Whether the call changes bound state rather than doing work.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            Call::SetInputLayout(_)
                | Call::SetPrimitiveTopology(_)
                | Call::SetVertexBuffers { .. }
                | Call::SetIndexBuffer { .. }
                | Call::SetShader(..)
                | Call::SetShaderResources(..)
                | Call::SetSamplers(..)
                | Call::SetConstantBuffers(..)
                | Call::SetUnorderedAccessViews(..)
                | Call::SetRasterizerState(_)
                | Call::SetViewports(_)
                | Call::SetScissorRects(_)
                | Call::SetBlendState { .. }
                | Call::SetDepthStencilState { .. }
                | Call::SetRenderTargets { .. }
        )
    }
}
