// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Push constants land in a per-context constant buffer at the layout's register.

use slotbound::bindings::descriptor::ConstantRange;
use slotbound::bindings::handles::PipelineLayout;
use slotbound::bindings::visible_to::ShaderStage;
use slotbound::imp::software::SoftwareDevice;
use slotbound::imp::{NativeObject, Stage};
use slotbound::{CommandRecorder, Config, Device, Error};
use std::sync::Arc;

const REGISTER: u32 = 2;

fn device() -> (SoftwareDevice, Arc<Device>) {
    let probe = SoftwareDevice::new();
    let device = Device::new(Box::new(probe.clone()), Config::default());
    (probe, device)
}

fn layout(device: &Device) -> PipelineLayout {
    device
        .create_pipeline_layout(
            &[],
            &[ConstantRange {
                offset: 0,
                count: 16,
                dx_register_index: REGISTER,
                visibility: ShaderStage::VERTEX | ShaderStage::PIXEL,
            }],
        )
        .unwrap()
}

fn words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect()
}

fn bound_buffer(probe: &SoftwareDevice, stage: Stage, register: u32) -> NativeObject {
    probe
        .pipeline_state()
        .stage(stage)
        .constant_buffer(register)
        .expect("push-constant buffer bound")
}

#[test]
fn pushes_are_idempotent() {
    let (probe, device) = device();
    let layout = layout(&device);
    let mut ctx = device.immediate_context().unwrap();
    let values = [1, 2, 3, 4, 5, 6];

    ctx.push_constants(ShaderStage::VERTEX, layout, 0, 2, &values);
    let buffer = bound_buffer(&probe, Stage::Vertex, REGISTER);
    let once = probe.contents(buffer, 0).unwrap();

    ctx.push_constants(ShaderStage::VERTEX, layout, 0, 2, &values);
    assert_eq!(bound_buffer(&probe, Stage::Vertex, REGISTER), buffer);
    assert_eq!(probe.contents(buffer, 0).unwrap(), once);

    let contents = words(&once);
    assert_eq!(&contents[..8], &[0, 0, 1, 2, 3, 4, 5, 6]);
    assert!(contents[8..].iter().all(|w| *w == 0));
}

#[test]
fn every_push_discards_the_previous_one() {
    let (probe, device) = device();
    let layout = layout(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.push_constants(ShaderStage::PIXEL, layout, 0, 0, &[7; 8]);
    ctx.push_constants(ShaderStage::PIXEL, layout, 0, 4, &[9]);
    let buffer = bound_buffer(&probe, Stage::Pixel, REGISTER);
    let contents = words(&probe.contents(buffer, 0).unwrap());
    assert_eq!(&contents[..5], &[0, 0, 0, 0, 9]);
}

#[test]
fn pushes_bind_only_the_requested_stages() {
    let (probe, device) = device();
    let layout = layout(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.push_constants(ShaderStage::PIXEL, layout, 0, 0, &[1]);
    let state = probe.pipeline_state();
    assert!(state.stage(Stage::Pixel).constant_buffer(REGISTER).is_some());
    assert!(state.stage(Stage::Vertex).constant_buffer(REGISTER).is_none());
}

#[test]
fn a_null_layout_pushes_to_register_zero() {
    let (probe, device) = device();
    let mut ctx = device.immediate_context().unwrap();

    ctx.push_constants(ShaderStage::VERTEX, PipelineLayout::default(), 0, 0, &[42]);
    let buffer = bound_buffer(&probe, Stage::Vertex, 0);
    assert_eq!(words(&probe.contents(buffer, 0).unwrap())[0], 42);
}

#[test]
fn the_buffer_grows_to_fit() {
    let (probe, device) = device();
    let layout = layout(&device);
    let mut ctx = device.immediate_context().unwrap();

    ctx.push_constants(ShaderStage::VERTEX, layout, 0, 0, &[1]);
    let small = probe.contents(bound_buffer(&probe, Stage::Vertex, REGISTER), 0).unwrap();
    assert_eq!(small.len(), 16);

    let values: Vec<u32> = (0..64).collect();
    ctx.push_constants(ShaderStage::VERTEX, layout, 0, 0, &values);
    let large = probe.contents(bound_buffer(&probe, Stage::Vertex, REGISTER), 0).unwrap();
    assert_eq!(words(&large), values);
}

#[test]
fn oversized_pushes_are_dropped() {
    let probe = SoftwareDevice::new();
    let device = Device::new(
        Box::new(probe.clone()),
        Config {
            max_push_constant_words: 8,
            ..Config::default()
        },
    );
    let mut ctx = device.immediate_context().unwrap();

    ctx.push_constants(ShaderStage::VERTEX, PipelineLayout::default(), 0, 4, &[1; 8]);
    assert!(probe.pipeline_state().stage(Stage::Vertex).constant_buffer(0).is_none());
}

#[test]
fn layouts_reject_ranges_beyond_the_limit() {
    let (_, device) = device();
    let result = device.create_pipeline_layout(
        &[],
        &[ConstantRange {
            offset: 4090,
            count: 16,
            dx_register_index: 0,
            visibility: ShaderStage::VERTEX,
        }],
    );
    assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
}

#[test]
fn deferred_pushes_replay_on_the_immediate_context() {
    let (probe, device) = device();
    let layout = layout(&device);
    let mut deferred = device.create_deferred_context().unwrap();
    deferred.push_constants(ShaderStage::VERTEX, layout, 0, 0, &[5, 6]);
    let list = deferred.finish_command_list().unwrap();

    let mut immediate = device.immediate_context().unwrap();
    immediate.execute_command_list(&list);
    let buffer = bound_buffer(&probe, Stage::Vertex, REGISTER);
    assert_eq!(&words(&probe.contents(buffer, 0).unwrap())[..2], &[5, 6]);
}

#[test]
fn lists_keep_pushed_constants_after_their_context_is_dropped() {
    let (probe, device) = device();
    let layout = layout(&device);
    let baseline = probe.live_objects();
    let mut deferred = device.create_deferred_context().unwrap();
    deferred.push_constants(ShaderStage::VERTEX, layout, 0, 0, &[5, 6]);
    let list = deferred.finish_command_list().unwrap();
    drop(deferred);

    let mut immediate = device.immediate_context().unwrap();
    immediate.execute_command_list(&list);
    let buffer = bound_buffer(&probe, Stage::Vertex, REGISTER);
    assert_eq!(&words(&probe.contents(buffer, 0).unwrap())[..2], &[5, 6]);

    drop(list);
    assert_eq!(probe.live_objects(), baseline);
}

#[test]
fn buffers_outgrown_while_recording_stay_alive_for_the_list() {
    let (probe, device) = device();
    let layout = layout(&device);
    let baseline = probe.live_objects();
    let mut deferred = device.create_deferred_context().unwrap();
    deferred.push_constants(ShaderStage::VERTEX, layout, 0, 0, &[7]);
    deferred.draw(3, 1, 0, 0);
    let values: Vec<u32> = (0..64).collect();
    deferred.push_constants(ShaderStage::VERTEX, layout, 0, 0, &values);
    let list = deferred.finish_command_list().unwrap();
    drop(deferred);
    // both the outgrown and the current buffer, plus the list itself
    assert_eq!(probe.live_objects(), baseline + 3);

    let mut immediate = device.immediate_context().unwrap();
    immediate.execute_command_list(&list);
    let buffer = bound_buffer(&probe, Stage::Vertex, REGISTER);
    assert_eq!(words(&probe.contents(buffer, 0).unwrap()), values);

    drop(list);
    assert_eq!(probe.live_objects(), baseline);
}
