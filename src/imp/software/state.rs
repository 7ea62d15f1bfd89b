// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Bound state of one software context.

use crate::imp::{NativeObject, Rect, Stage, Viewport, limits};
use crate::pixel_formats::Format;

/// Slots of one shader stage.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StageSlots {
    pub shader: Option<NativeObject>,
    shader_resources: Vec<Option<NativeObject>>,
    samplers: Vec<Option<NativeObject>>,
    constant_buffers: Vec<Option<NativeObject>>,
    unordered_access_views: Vec<Option<NativeObject>>,
}

fn get(slots: &[Option<NativeObject>], slot: u32) -> Option<NativeObject> {
    slots.get(slot as usize).copied().flatten()
}

fn set(slots: &mut Vec<Option<NativeObject>>, limit: u32, first: u32, values: &[Option<NativeObject>]) {
    for (i, value) in values.iter().enumerate() {
        let slot = first as usize + i;
        if slot >= limit as usize {
            break;
        }
        if slots.len() <= slot {
            if value.is_none() {
                continue;
            }
            slots.resize(slot + 1, None);
        }
        slots[slot] = *value;
    }
    // unbinding the tail must compare equal to never binding it
    while slots.last().is_some_and(|v| v.is_none()) {
        slots.pop();
    }
}

impl StageSlots {
    pub fn shader_resource(&self, slot: u32) -> Option<NativeObject> {
        get(&self.shader_resources, slot)
    }

    pub fn sampler(&self, slot: u32) -> Option<NativeObject> {
        get(&self.samplers, slot)
    }

    pub fn constant_buffer(&self, slot: u32) -> Option<NativeObject> {
        get(&self.constant_buffers, slot)
    }

    pub fn unordered_access_view(&self, slot: u32) -> Option<NativeObject> {
        get(&self.unordered_access_views, slot)
    }

    pub fn set_shader_resources(&mut self, first: u32, views: &[Option<NativeObject>]) {
        set(&mut self.shader_resources, limits::SHADER_RESOURCE_SLOTS, first, views);
    }

    pub fn set_samplers(&mut self, first: u32, samplers: &[Option<NativeObject>]) {
        set(&mut self.samplers, limits::SAMPLER_SLOTS, first, samplers);
    }

    pub fn set_constant_buffers(&mut self, first: u32, buffers: &[Option<NativeObject>]) {
        set(&mut self.constant_buffers, limits::CONSTANT_BUFFER_SLOTS, first, buffers);
    }

    pub fn set_unordered_access_views(&mut self, first: u32, views: &[Option<NativeObject>]) {
        set(&mut self.unordered_access_views, limits::UNORDERED_ACCESS_SLOTS, first, views);
    }

    /// Drops every binding of `object`.
    fn unbind(&mut self, object: NativeObject) {
        if self.shader == Some(object) {
            self.shader = None;
        }
        for slots in [
            &mut self.shader_resources,
            &mut self.samplers,
            &mut self.constant_buffers,
            &mut self.unordered_access_views,
        ] {
            for slot in slots.iter_mut().filter(|s| **s == Some(object)) {
                *slot = None;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexBufferBinding {
    pub buffer: Option<NativeObject>,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferBinding {
    pub buffer: Option<NativeObject>,
    pub format: Format,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputMergerBlend {
    pub state: Option<NativeObject>,
    pub blend_factor: [f32; 4],
    pub sample_mask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMergerDepthStencil {
    pub state: Option<NativeObject>,
    pub stencil_ref: u32,
}

/// Everything a context has bound.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    stages: [StageSlots; 6],
    pub input_layout: Option<NativeObject>,
    pub topology: u32,
    pub vertex_buffers: Vec<VertexBufferBinding>,
    pub index_buffer: Option<IndexBufferBinding>,
    pub rasterizer: Option<NativeObject>,
    pub viewports: Vec<Viewport>,
    pub scissor_rects: Vec<Rect>,
    pub blend: OutputMergerBlend,
    pub depth_stencil: OutputMergerDepthStencil,
    pub render_targets: Vec<Option<NativeObject>>,
    pub depth_stencil_view: Option<NativeObject>,
}

impl Default for PipelineState {
    fn default() -> Self {
        PipelineState {
            stages: Default::default(),
            input_layout: None,
            topology: 0,
            vertex_buffers: Vec::new(),
            index_buffer: None,
            rasterizer: None,
            viewports: Vec::new(),
            scissor_rects: Vec::new(),
            blend: OutputMergerBlend {
                state: None,
                blend_factor: [1.0; 4],
                sample_mask: u32::MAX,
            },
            depth_stencil: OutputMergerDepthStencil {
                state: None,
                stencil_ref: 0,
            },
            render_targets: Vec::new(),
            depth_stencil_view: None,
        }
    }
}

impl PipelineState {
    pub fn stage(&self, stage: Stage) -> &StageSlots {
        &self.stages[stage.index()]
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageSlots {
        &mut self.stages[stage.index()]
    }

    pub fn set_vertex_buffers(
        &mut self,
        first: u32,
        buffers: &[Option<NativeObject>],
        strides: &[u32],
        offsets: &[u32],
    ) {
        for (i, buffer) in buffers.iter().enumerate() {
            let slot = first as usize + i;
            if slot >= limits::VERTEX_BUFFER_SLOTS as usize {
                break;
            }
            if self.vertex_buffers.len() <= slot {
                self.vertex_buffers.resize(slot + 1, VertexBufferBinding::default());
            }
            self.vertex_buffers[slot] = VertexBufferBinding {
                buffer: *buffer,
                stride: strides.get(i).copied().unwrap_or(0),
                offset: offsets.get(i).copied().unwrap_or(0),
            };
        }
    }

    pub fn set_render_targets(&mut self, rtvs: &[Option<NativeObject>], dsv: Option<NativeObject>) {
        self.render_targets = rtvs
            .iter()
            .take(limits::RENDER_TARGET_SLOTS as usize)
            .copied()
            .collect();
        self.depth_stencil_view = dsv;
    }

    /// Removes every reference to a released object, as the driver does on final release.
    pub fn forget(&mut self, object: NativeObject) {
        for stage in &mut self.stages {
            stage.unbind(object);
        }
        let some = Some(object);
        if self.input_layout == some {
            self.input_layout = None;
        }
        for vb in self.vertex_buffers.iter_mut().filter(|vb| vb.buffer == some) {
            vb.buffer = None;
        }
        if self.index_buffer.is_some_and(|ib| ib.buffer == some) {
            self.index_buffer = None;
        }
        if self.rasterizer == some {
            self.rasterizer = None;
        }
        if self.blend.state == some {
            self.blend.state = None;
        }
        if self.depth_stencil.state == some {
            self.depth_stencil.state = None;
        }
        for rtv in self.render_targets.iter_mut().filter(|r| **r == some) {
            *rtv = None;
        }
        if self.depth_stencil_view == some {
            self.depth_stencil_view = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(raw: u64) -> Option<NativeObject> {
        NativeObject::new(raw)
    }

    #[test]
    fn unbinding_matches_never_bound() {
        let mut slots = StageSlots::default();
        slots.set_shader_resources(3, &[obj(7), obj(8)]);
        assert_eq!(slots.shader_resource(4), obj(8));
        slots.set_shader_resources(3, &[None, None]);
        assert_eq!(slots, StageSlots::default());
    }

    #[test]
    fn slots_past_the_limit_are_ignored() {
        let mut slots = StageSlots::default();
        slots.set_samplers(limits::SAMPLER_SLOTS - 1, &[obj(1), obj(2)]);
        assert_eq!(slots.sampler(limits::SAMPLER_SLOTS - 1), obj(1));
        assert_eq!(slots.sampler(limits::SAMPLER_SLOTS), None);
    }

    #[test]
    fn forget_clears_every_reference() {
        let mut state = PipelineState::default();
        state.stage_mut(Stage::Pixel).set_constant_buffers(0, &[obj(5)]);
        state.set_render_targets(&[obj(5)], None);
        state.forget(NativeObject::new(5).unwrap());
        assert_eq!(state.stage(Stage::Pixel).constant_buffer(0), None);
        assert_eq!(state.render_targets, vec![None]);
    }
}
