// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render passes, render-target binding and clears.
//!
//! The driver has no render pass object.  A pass binds its targets when it begins and ends
//! without a native call; the open flag exists only to catch unbalanced use.

use crate::bindings::handles::ResourceView;
use crate::context::DeviceContext;
use crate::device::ViewUsage;
use crate::imp::{ClearFlags, NativeObject, limits};

impl DeviceContext {
    pub(super) fn open_render_pass(&mut self, rtvs: &[ResourceView], dsv: ResourceView) {
        assert!(
            !self.has_open_render_pass,
            "begin_render_pass called while a render pass is already open"
        );
        self.set_render_targets(rtvs, dsv);
        self.has_open_render_pass = true;
    }

    pub(super) fn close_render_pass(&mut self) {
        assert!(
            self.has_open_render_pass,
            "end_render_pass called without an open render pass"
        );
        self.has_open_render_pass = false;
    }

    pub(super) fn set_render_targets(&mut self, rtvs: &[ResourceView], dsv: ResourceView) {
        if rtvs.len() > limits::RENDER_TARGET_SLOTS as usize {
            logwise::warn_sync!(
                "Binding {count} render targets; only the first {max} are used",
                count = rtvs.len(),
                max = limits::RENDER_TARGET_SLOTS
            );
        }
        let targets: Vec<Option<NativeObject>> = rtvs
            .iter()
            .take(limits::RENDER_TARGET_SLOTS as usize)
            .map(|v| self.device.resolve_view_as(*v, ViewUsage::RenderTarget))
            .collect();
        let depth = self.device.resolve_view_as(dsv, ViewUsage::DepthStencil);
        self.native.om_set_render_targets(&targets, depth);
    }

    pub(super) fn clear_render_targets(&mut self, rtvs: &[ResourceView], color: [f32; 4]) {
        for rtv in rtvs {
            if let Some(native) = self.device.resolve_view_as(*rtv, ViewUsage::RenderTarget) {
                self.native.clear_render_target_view(native, color);
            }
        }
    }

    pub(super) fn clear_depth_stencil(
        &mut self,
        dsv: ResourceView,
        depth: Option<f32>,
        stencil: Option<u8>,
    ) {
        let mut flags = ClearFlags::empty();
        if depth.is_some() {
            flags |= ClearFlags::DEPTH;
        }
        if stencil.is_some() {
            flags |= ClearFlags::STENCIL;
        }
        if flags.is_empty() {
            return;
        }
        if let Some(native) = self.device.resolve_view_as(dsv, ViewUsage::DepthStencil) {
            self.native.clear_depth_stencil_view(
                native,
                flags,
                depth.unwrap_or(0.0),
                stencil.unwrap_or(0),
            );
        }
    }
}
