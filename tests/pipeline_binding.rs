// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! A unified graphics pipeline binds to the same native state as its fragments.

use slotbound::bindings::handles::{Pipeline, ShaderModule};
use slotbound::bindings::pipeline::{
    BlendDesc, BlendFactor, ComputePipelineDesc, CullMode, DepthStencilDesc, DynamicState,
    GraphicsPipelineDesc, PipelineDesc, PipelineType, RasterizerDesc, RenderTargetBlend,
    ShaderFormat,
};
use slotbound::bindings::visible_to::ShaderStage;
use slotbound::imp::Stage;
use slotbound::imp::software::SoftwareDevice;
use slotbound::{CommandRecorder, Config, Device, DeviceCaps};
use std::sync::Arc;

fn device() -> (SoftwareDevice, Arc<Device>) {
    let probe = SoftwareDevice::new();
    let device = Device::new(Box::new(probe.clone()), Config::default());
    (probe, device)
}

fn module(device: &Device, stage: ShaderStage, code: &[u8]) -> ShaderModule {
    device
        .create_shader_module(stage, ShaderFormat::Dxbc, "main", code)
        .unwrap()
}

struct Fixture {
    graphics: Pipeline,
    fragments: Vec<(PipelineType, Pipeline)>,
}

fn fixture(device: &Device) -> Fixture {
    let vs = module(device, ShaderStage::VERTEX, b"DXBC vertex");
    let ps = module(device, ShaderStage::PIXEL, b"DXBC pixel");
    let mut blend = BlendDesc {
        blend_constant: [0.25, 0.5, 0.75, 1.0],
        ..Default::default()
    };
    blend.render_targets[0] = RenderTargetBlend {
        blend_enable: true,
        source_color: BlendFactor::SourceAlpha,
        dest_color: BlendFactor::OneMinusSourceAlpha,
        ..Default::default()
    };
    let rasterizer = RasterizerDesc {
        cull_mode: CullMode::None,
        scissor_enable: true,
        ..Default::default()
    };
    let depth_stencil = DepthStencilDesc {
        stencil_enable: true,
        stencil_reference_value: 7,
        ..Default::default()
    };
    let graphics = device
        .create_pipeline(&PipelineDesc::Graphics(GraphicsPipelineDesc {
            vertex_shader: vs,
            pixel_shader: ps,
            blend_state: blend,
            rasterizer_state: rasterizer,
            depth_stencil_state: depth_stencil,
            ..Default::default()
        }))
        .unwrap();
    let fragments = [
        PipelineDesc::BlendState(blend),
        PipelineDesc::RasterizerState(rasterizer),
        PipelineDesc::DepthStencilState(depth_stencil),
        PipelineDesc::Shader {
            stage: ShaderStage::VERTEX,
            module: vs,
        },
        PipelineDesc::Shader {
            stage: ShaderStage::PIXEL,
            module: ps,
        },
    ]
    .iter()
    .map(|desc| {
        (
            desc.pipeline_type().unwrap(),
            device.create_pipeline(desc).unwrap(),
        )
    })
    .collect();
    Fixture {
        graphics,
        fragments,
    }
}

/// Calls `visit` with every ordering of `items`.
fn permutations<T: Copy>(items: &mut Vec<T>, k: usize, visit: &mut impl FnMut(&[T])) {
    if k == items.len() {
        visit(items);
        return;
    }
    for i in k..items.len() {
        items.swap(k, i);
        permutations(items, k + 1, visit);
        items.swap(k, i);
    }
}

#[test]
fn fragments_in_any_order_match_the_unified_pipeline() {
    let (probe, device) = device();
    let Fixture {
        graphics,
        mut fragments,
    } = fixture(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.bind_pipeline(PipelineType::Graphics, graphics);
    let unified = probe.pipeline_state();
    assert!(unified.stage(Stage::Vertex).shader.is_some());
    assert!(unified.stage(Stage::Pixel).shader.is_some());
    assert_eq!(unified.blend.blend_factor, [0.25, 0.5, 0.75, 1.0]);
    assert_eq!(unified.depth_stencil.stencil_ref, 7);

    let mut orderings = 0;
    permutations(&mut fragments, 0, &mut |order| {
        ctx.bind_pipeline(PipelineType::Graphics, Pipeline::default());
        for (kind, fragment) in order {
            ctx.bind_pipeline(*kind, *fragment);
        }
        assert_eq!(probe.pipeline_state(), unified, "order {order:?}");
        orderings += 1;
    });
    assert_eq!(orderings, 120);
}

#[test]
fn a_graphics_pipeline_binds_one_fragment_on_request() {
    let (probe, device) = device();
    let fixture = fixture(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.bind_pipeline(PipelineType::BlendState, fixture.graphics);
    let state = probe.pipeline_state();
    assert!(state.blend.state.is_some());
    assert!(state.rasterizer.is_none());
    assert!(state.stage(Stage::Vertex).shader.is_none());

    ctx.bind_pipeline(PipelineType::PixelShader, fixture.graphics);
    let state = probe.pipeline_state();
    assert!(state.stage(Stage::Pixel).shader.is_some());
    assert!(state.stage(Stage::Vertex).shader.is_none());
}

#[test]
fn binding_a_missing_fragment_changes_nothing() {
    let (probe, device) = device();
    let fixture = fixture(&device);
    let (_, blend) = fixture.fragments[0];
    let mut ctx = device.immediate_context().unwrap();

    let before = probe.pipeline_state();
    ctx.bind_pipeline(PipelineType::RasterizerState, blend);
    assert_eq!(probe.pipeline_state(), before);
}

#[test]
fn a_null_pipeline_unbinds_its_kind() {
    let (probe, device) = device();
    let fixture = fixture(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.bind_pipeline(PipelineType::Graphics, fixture.graphics);
    ctx.bind_pipeline(PipelineType::PixelShader, Pipeline::default());
    let state = probe.pipeline_state();
    assert!(state.stage(Stage::Pixel).shader.is_none());
    assert!(state.stage(Stage::Vertex).shader.is_some());
}

#[test]
fn dynamic_stencil_reference_overrides_the_pipeline() {
    let (probe, device) = device();
    let fixture = fixture(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.bind_pipeline(PipelineType::Graphics, fixture.graphics);
    let bound = probe.pipeline_state().depth_stencil.state;
    ctx.bind_pipeline_states(&[(DynamicState::StencilReferenceValue, 3)]);
    let state = probe.pipeline_state();
    assert_eq!(state.depth_stencil.state, bound);
    assert_eq!(state.depth_stencil.stencil_ref, 3);
}

#[test]
fn compute_pipelines_bind_the_compute_stage() {
    let (probe, device) = device();
    assert!(device.check_capability(DeviceCaps::ComputeShader));
    let cs = module(&device, ShaderStage::COMPUTE, b"DXBC compute");
    let pipeline = device
        .create_pipeline(&PipelineDesc::Compute(ComputePipelineDesc {
            shader: cs,
            layout: Default::default(),
        }))
        .unwrap();
    let mut ctx = device.immediate_context().unwrap();

    ctx.bind_pipeline(PipelineType::Compute, pipeline);
    let state = probe.pipeline_state();
    assert!(state.stage(Stage::Compute).shader.is_some());
    assert!(state.stage(Stage::Pixel).shader.is_none());

    drop(ctx);
    device.destroy_pipeline(PipelineType::Compute, pipeline);
    device.destroy_shader_module(cs);
    assert_eq!(probe.live_objects(), 0);
}
