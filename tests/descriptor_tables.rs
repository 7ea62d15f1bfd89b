// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Descriptor tables are host memory until bound; binding flattens the latest writes into
//! per-stage slots.

use slotbound::bindings::descriptor::{
    ConstantRange, Descriptor, DescriptorHeapSize, DescriptorRange, DescriptorType,
    DescriptorUpdate,
};
use slotbound::bindings::handles::{DescriptorTableLayout, PipelineLayout, ResourceView, Sampler};
use slotbound::bindings::pipeline::PipelineType;
use slotbound::bindings::resource::{ResourceDesc, ResourceViewDesc};
use slotbound::bindings::sampler::SamplerDesc;
use slotbound::bindings::visible_to::{MemoryHeap, ResourceUsage, ShaderStage};
use slotbound::imp::software::{PipelineState, SoftwareDevice};
use slotbound::imp::{NativeObject, Stage};
use slotbound::pixel_formats::Format;
use slotbound::{CommandRecorder, Config, Device, Error};
use std::sync::Arc;

const SAMPLERS: u32 = 4;
const TEXTURES: u32 = 4;
const TEXTURE_REGISTER: u32 = 3;

fn device() -> (SoftwareDevice, Arc<Device>) {
    let probe = SoftwareDevice::new();
    let device = Device::new(Box::new(probe.clone()), Config::default());
    (probe, device)
}

/// Samplers at table slots 0..4 (s0..s3), textures at 4..8 (t3..t6).
fn table_layout(device: &Device) -> DescriptorTableLayout {
    device
        .create_descriptor_table_layout(
            &[
                DescriptorRange {
                    binding: 0,
                    dx_register_index: 0,
                    count: SAMPLERS,
                    kind: DescriptorType::Sampler,
                    visibility: ShaderStage::PIXEL,
                },
                DescriptorRange {
                    binding: SAMPLERS,
                    dx_register_index: TEXTURE_REGISTER,
                    count: TEXTURES,
                    kind: DescriptorType::ShaderResourceView,
                    visibility: ShaderStage::VERTEX | ShaderStage::PIXEL,
                },
            ],
            false,
        )
        .unwrap()
}

fn heap_sizes(tables: u32) -> [DescriptorHeapSize; 2] {
    [
        DescriptorHeapSize {
            kind: DescriptorType::Sampler,
            count: SAMPLERS * tables,
        },
        DescriptorHeapSize {
            kind: DescriptorType::ShaderResourceView,
            count: TEXTURES * tables,
        },
    ]
}

fn samplers(device: &Device, count: usize) -> Vec<Sampler> {
    (0..count)
        .map(|i| {
            device
                .create_sampler(&SamplerDesc {
                    mip_lod_bias: i as f32,
                    ..Default::default()
                })
                .unwrap()
        })
        .collect()
}

/// Shader-resource views of textures named `tex{i}`.
fn views(device: &Device, count: usize) -> Vec<ResourceView> {
    (0..count)
        .map(|i| {
            let texture = device
                .create_resource(
                    &ResourceDesc::texture_2d(
                        4,
                        4,
                        Format::R8G8B8A8Unorm,
                        MemoryHeap::GpuOnly,
                        ResourceUsage::SHADER_RESOURCE,
                    ),
                    &[],
                    ResourceUsage::SHADER_RESOURCE,
                )
                .unwrap();
            device.set_debug_name(texture, &format!("tex{i}"));
            device
                .create_resource_view(
                    texture,
                    ResourceUsage::SHADER_RESOURCE,
                    &ResourceViewDesc::default(),
                )
                .unwrap()
        })
        .collect()
}

fn bound_texture_name(probe: &SoftwareDevice, view: Option<NativeObject>) -> Option<String> {
    probe.debug_name(probe.view_resource(view?)?)
}

/// Minimal xorshift so the update sequence is long but reproducible.
struct Rng(u32);

impl Rng {
    fn below(&mut self, bound: u32) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0 % bound
    }
}

#[test]
fn bound_slots_match_the_last_write() {
    let (probe, device) = device();
    let layout = table_layout(&device);
    let heap = device.create_descriptor_heap(1, &heap_sizes(1)).unwrap();
    let table = device.create_descriptor_tables(heap, layout, 1).unwrap()[0];
    let samplers = samplers(&device, 6);
    let views = views(&device, 6);

    let mut expected_samplers = [Sampler::default(); SAMPLERS as usize];
    let mut expected_views: Vec<Option<String>> = vec![None; TEXTURES as usize];
    let mut rng = Rng(0x9E37_79B9);
    for _ in 0..200 {
        let offset = rng.below(SAMPLERS);
        let run = 1 + rng.below(SAMPLERS - offset);
        if rng.below(2) == 0 {
            let written: Vec<Sampler> = (0..run)
                .map(|_| samplers[rng.below(samplers.len() as u32) as usize])
                .collect();
            let descriptors: Vec<Descriptor> = written.iter().map(|s| Descriptor::Sampler(*s)).collect();
            device.update_descriptor_tables(&[DescriptorUpdate {
                table,
                binding: 0,
                array_offset: offset,
                kind: DescriptorType::Sampler,
                descriptors: &descriptors,
            }]);
            expected_samplers[offset as usize..(offset + run) as usize].copy_from_slice(&written);
        } else {
            let picked: Vec<usize> = (0..run)
                .map(|_| rng.below(views.len() as u32) as usize)
                .collect();
            let descriptors: Vec<Descriptor> = picked
                .iter()
                .map(|i| Descriptor::ShaderResourceView(views[*i]))
                .collect();
            device.update_descriptor_tables(&[DescriptorUpdate {
                table,
                binding: SAMPLERS,
                array_offset: offset,
                kind: DescriptorType::ShaderResourceView,
                descriptors: &descriptors,
            }]);
            for (slot, i) in picked.iter().enumerate() {
                expected_views[offset as usize + slot] = Some(format!("tex{i}"));
            }
        }
    }

    let mut ctx = device.immediate_context().unwrap();
    ctx.bind_descriptor_tables(PipelineType::Graphics, PipelineLayout::default(), 0, &[table]);
    let from_table = probe.pipeline_state();

    for (slot, expected) in expected_views.iter().enumerate() {
        for stage in [Stage::Vertex, Stage::Pixel] {
            let bound = from_table
                .stage(stage)
                .shader_resource(TEXTURE_REGISTER + slot as u32);
            assert_eq!(&bound_texture_name(&probe, bound), expected, "t{slot} in {stage:?}");
        }
    }
    // samplers are only visible to the pixel stage
    assert!(from_table.stage(Stage::Vertex).sampler(0).is_none());

    // the same samplers bound directly land on the same native objects
    ctx.bind_samplers(ShaderStage::PIXEL, 0, &[Sampler::default(); SAMPLERS as usize]);
    ctx.bind_samplers(ShaderStage::PIXEL, 0, &expected_samplers);
    assert_eq!(probe.pipeline_state(), from_table);
}

#[test]
fn updates_are_invisible_until_the_table_is_bound() {
    let (probe, device) = device();
    let layout = table_layout(&device);
    let heap = device.create_descriptor_heap(1, &heap_sizes(1)).unwrap();
    let table = device.create_descriptor_tables(heap, layout, 1).unwrap()[0];
    let views = views(&device, 2);
    let mut ctx = device.immediate_context().unwrap();

    let write = |view: ResourceView| {
        device.update_descriptor_tables(&[DescriptorUpdate {
            table,
            binding: SAMPLERS,
            array_offset: 0,
            kind: DescriptorType::ShaderResourceView,
            descriptors: &[Descriptor::ShaderResourceView(view)],
        }]);
    };
    write(views[0]);
    ctx.bind_descriptor_tables(PipelineType::PixelShader, PipelineLayout::default(), 0, &[table]);
    write(views[1]);

    let bound = probe
        .pipeline_state()
        .stage(Stage::Pixel)
        .shader_resource(TEXTURE_REGISTER);
    assert_eq!(bound_texture_name(&probe, bound).as_deref(), Some("tex0"));
    // a pixel-shader bind leaves the vertex stage alone
    assert!(
        probe
            .pipeline_state()
            .stage(Stage::Vertex)
            .shader_resource(TEXTURE_REGISTER)
            .is_none()
    );
}

#[test]
fn mismatched_updates_are_skipped() {
    let (probe, device) = device();
    let layout = table_layout(&device);
    let heap = device.create_descriptor_heap(1, &heap_sizes(1)).unwrap();
    let table = device.create_descriptor_tables(heap, layout, 1).unwrap()[0];
    let views = views(&device, 1);

    // a view written into the sampler range
    device.update_descriptor_tables(&[DescriptorUpdate {
        table,
        binding: 0,
        array_offset: 0,
        kind: DescriptorType::Sampler,
        descriptors: &[Descriptor::ShaderResourceView(views[0])],
    }]);
    // a run crossing from the sampler range into the texture range
    device.update_descriptor_tables(&[DescriptorUpdate {
        table,
        binding: 0,
        array_offset: SAMPLERS - 1,
        kind: DescriptorType::ShaderResourceView,
        descriptors: &[Descriptor::ShaderResourceView(views[0]); 2],
    }]);

    let mut ctx = device.immediate_context().unwrap();
    ctx.bind_descriptor_tables(PipelineType::Graphics, PipelineLayout::default(), 0, &[table]);
    let state = probe.pipeline_state();
    assert!(state.stage(Stage::Pixel).sampler(0).is_none());
    assert!(state.stage(Stage::Pixel).shader_resource(TEXTURE_REGISTER).is_none());
}

#[test]
fn table_allocation_is_all_or_nothing() {
    let (_, device) = device();
    let layout = table_layout(&device);
    let heap = device.create_descriptor_heap(3, &heap_sizes(3)).unwrap();

    assert!(matches!(
        device.create_descriptor_tables(heap, layout, 4),
        Err(Error::InvalidDescriptor(_))
    ));
    assert_eq!(device.create_descriptor_tables(heap, layout, 3).unwrap().len(), 3);
    assert!(device.create_descriptor_tables(heap, layout, 1).is_err());
}

#[test]
fn destroying_the_heap_invalidates_its_tables() {
    let (probe, device) = device();
    let layout = table_layout(&device);
    let heap = device.create_descriptor_heap(1, &heap_sizes(1)).unwrap();
    let table = device.create_descriptor_tables(heap, layout, 1).unwrap()[0];
    let views = views(&device, 1);
    device.update_descriptor_tables(&[DescriptorUpdate {
        table,
        binding: SAMPLERS,
        array_offset: 0,
        kind: DescriptorType::ShaderResourceView,
        descriptors: &[Descriptor::ShaderResourceView(views[0])],
    }]);
    device.destroy_descriptor_heap(heap);

    let mut ctx = device.immediate_context().unwrap();
    ctx.bind_descriptor_tables(PipelineType::Graphics, PipelineLayout::default(), 0, &[table]);
    assert_eq!(probe.pipeline_state(), PipelineState::default());
}

#[test]
fn tables_bound_at_a_push_constant_param_are_skipped() {
    let (probe, device) = device();
    let layout = table_layout(&device);
    let heap = device.create_descriptor_heap(1, &heap_sizes(1)).unwrap();
    let table = device.create_descriptor_tables(heap, layout, 1).unwrap()[0];
    let views = views(&device, 1);
    device.update_descriptor_tables(&[DescriptorUpdate {
        table,
        binding: SAMPLERS,
        array_offset: 0,
        kind: DescriptorType::ShaderResourceView,
        descriptors: &[Descriptor::ShaderResourceView(views[0])],
    }]);
    let constants_only = device
        .create_pipeline_layout(
            &[],
            &[ConstantRange {
                offset: 0,
                count: 4,
                dx_register_index: 0,
                visibility: ShaderStage::PIXEL,
            }],
        )
        .unwrap();

    let mut ctx = device.immediate_context().unwrap();
    ctx.bind_descriptor_tables(PipelineType::Graphics, constants_only, 0, &[table]);
    assert_eq!(probe.pipeline_state(), PipelineState::default());
}

#[test]
fn overlapping_ranges_are_rejected() {
    let (_, device) = device();
    let range = DescriptorRange {
        binding: 0,
        dx_register_index: 0,
        count: 2,
        kind: DescriptorType::ShaderResourceView,
        visibility: ShaderStage::PIXEL,
    };
    let overlapping = DescriptorRange {
        binding: 1,
        dx_register_index: 8,
        ..range
    };
    assert!(matches!(
        device.create_descriptor_table_layout(&[range, overlapping], false),
        Err(Error::InvalidDescriptor(_))
    ));
}

#[test]
fn pushed_descriptors_land_after_the_param_register() {
    let (probe, device) = device();
    let push_layout = device
        .create_descriptor_table_layout(
            &[DescriptorRange {
                binding: 0,
                dx_register_index: 4,
                count: 2,
                kind: DescriptorType::ShaderResourceView,
                visibility: ShaderStage::PIXEL,
            }],
            true,
        )
        .unwrap();
    let layout = device.create_pipeline_layout(&[push_layout], &[]).unwrap();
    let views = views(&device, 1);

    let mut ctx = device.immediate_context().unwrap();
    ctx.push_descriptors(
        ShaderStage::PIXEL,
        layout,
        0,
        DescriptorType::ShaderResourceView,
        1,
        &[Descriptor::ShaderResourceView(views[0])],
    );
    let slots = probe.pipeline_state();
    let pixel = slots.stage(Stage::Pixel);
    assert!(pixel.shader_resource(4).is_none());
    assert_eq!(
        bound_texture_name(&probe, pixel.shader_resource(5)).as_deref(),
        Some("tex0")
    );
}
