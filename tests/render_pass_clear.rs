// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render passes bind targets on begin, and cleared pixels read back through a staging copy.

use slotbound::bindings::handles::{Resource, ResourceView};
use slotbound::bindings::resource::{ResourceDesc, ResourceViewDesc};
use slotbound::bindings::visible_to::{MapAccess, MemoryHeap, ResourceUsage};
use slotbound::imp::software::SoftwareDevice;
use slotbound::pixel_formats::Format;
use slotbound::{CommandRecorder, Config, Device, DeviceContext};
use std::sync::Arc;

const SIZE: u32 = 256;

fn device() -> (SoftwareDevice, Arc<Device>) {
    let probe = SoftwareDevice::new();
    let device = Device::new(Box::new(probe.clone()), Config::default());
    (probe, device)
}

fn render_target(device: &Device) -> (Resource, ResourceView) {
    let texture = device
        .create_resource(
            &ResourceDesc::texture_2d(
                SIZE,
                SIZE,
                Format::R8G8B8A8Unorm,
                MemoryHeap::GpuOnly,
                ResourceUsage::RENDER_TARGET | ResourceUsage::COPY_SOURCE,
            ),
            &[],
            ResourceUsage::RENDER_TARGET,
        )
        .unwrap();
    let rtv = device
        .create_resource_view(
            texture,
            ResourceUsage::RENDER_TARGET,
            &ResourceViewDesc::with_format(Format::R8G8B8A8Unorm),
        )
        .unwrap();
    (texture, rtv)
}

fn read_back(device: &Device, ctx: &mut DeviceContext, texture: Resource) -> Vec<[u8; 4]> {
    let staging = device
        .create_resource(
            &ResourceDesc::texture_2d(
                SIZE,
                SIZE,
                Format::R8G8B8A8Unorm,
                MemoryHeap::GpuToCpu,
                ResourceUsage::COPY_DEST,
            ),
            &[],
            ResourceUsage::COPY_DEST,
        )
        .unwrap();
    ctx.copy_resource(texture, staging);

    let mapped = device.map_resource(staging, 0, MapAccess::ReadOnly).unwrap();
    let row_pitch = mapped.row_pitch as usize;
    assert!(row_pitch >= SIZE as usize * 4);
    // SAFETY: mapped until the unmap below; nothing writes to it meanwhile.
    let bytes = unsafe { mapped.as_slice() };
    let pixels = (0..SIZE as usize)
        .flat_map(|y| {
            bytes[y * row_pitch..y * row_pitch + SIZE as usize * 4]
                .chunks_exact(4)
                .map(|p| [p[0], p[1], p[2], p[3]])
        })
        .collect();
    device.unmap_resource(staging, 0);
    device.destroy_resource(staging);
    pixels
}

#[test]
fn cleared_target_reads_back_black() {
    let (_, device) = device();
    let (texture, rtv) = render_target(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.begin_render_pass(&[rtv], ResourceView::default());
    ctx.clear_render_target_views(&[rtv], [0.0, 0.0, 0.0, 1.0]);
    ctx.end_render_pass();

    let pixels = read_back(&device, &mut ctx, texture);
    assert_eq!(pixels.len(), (SIZE * SIZE) as usize);
    assert!(pixels.iter().all(|p| *p == [0, 0, 0, 255]));
}

#[test]
fn clear_color_is_quantized_per_channel() {
    let (_, device) = device();
    let (texture, rtv) = render_target(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.clear_render_target_views(&[rtv], [1.0, 0.0, 1.0, 0.0]);
    let pixels = read_back(&device, &mut ctx, texture);
    assert!(pixels.iter().all(|p| *p == [255, 0, 255, 0]));
}

#[test]
fn beginning_a_pass_binds_its_targets() {
    let (probe, device) = device();
    let (_, rtv) = render_target(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.begin_render_pass(&[rtv], ResourceView::default());
    let state = probe.pipeline_state();
    assert_eq!(state.render_targets.len(), 1);
    assert!(state.render_targets[0].is_some());
    assert!(state.depth_stencil_view.is_none());
    ctx.end_render_pass();

    // ending a pass leaves the targets bound
    assert_eq!(probe.pipeline_state().render_targets.len(), 1);
}

#[test]
fn a_destroyed_target_binds_null() {
    let (probe, device) = device();
    let (texture, rtv) = render_target(&device);
    device.destroy_resource(texture);
    let mut ctx = device.immediate_context().unwrap();

    ctx.bind_render_targets_and_depth_stencil(&[rtv], ResourceView::default());
    assert!(probe.pipeline_state().render_targets.iter().all(Option::is_none));
}

#[test]
#[should_panic(expected = "begin_render_pass called while a render pass is already open")]
fn render_passes_do_not_nest() {
    let (_, device) = device();
    let (_, rtv) = render_target(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.begin_render_pass(&[rtv], ResourceView::default());
    ctx.begin_render_pass(&[rtv], ResourceView::default());
}

#[test]
#[should_panic(expected = "end_render_pass called without an open render pass")]
fn ending_without_beginning_panics() {
    let (_, device) = device();
    let mut ctx = device.immediate_context().unwrap();
    ctx.end_render_pass();
}
