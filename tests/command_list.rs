// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Finished command lists replay on the immediate context and refuse further recording.

use slotbound::bindings::handles::{Pipeline, Resource, ResourceView};
use slotbound::bindings::pipeline::PipelineType;
use slotbound::bindings::visible_to::ResourceUsage;
use slotbound::imp::software::{Call, SoftwareDevice};
use slotbound::{CommandList, CommandRecorder, Config, Device, Error};
use std::sync::Arc;

fn device() -> (SoftwareDevice, Arc<Device>) {
    let probe = SoftwareDevice::new();
    let device = Device::new(Box::new(probe.clone()), Config::default());
    (probe, device)
}

fn finished_list(device: &Arc<Device>) -> CommandList {
    let mut deferred = device.create_deferred_context().unwrap();
    deferred.draw(3, 1, 0, 0);
    deferred.finish_command_list().unwrap()
}

#[test]
fn lists_replay_their_recorded_calls() {
    let (probe, device) = device();
    let list = finished_list(&device);
    let mut immediate = device.immediate_context().unwrap();
    probe.take_calls();

    immediate.execute_command_list(&list);
    immediate.execute_command_list(&list);
    let draws = probe
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::DrawInstanced { .. }))
        .count();
    assert_eq!(draws, 2);
}

#[test]
fn dropping_a_list_releases_it() {
    let (probe, device) = device();
    let before = probe.live_objects();
    let list = finished_list(&device);
    assert_eq!(probe.live_objects(), before + 1);
    drop(list);
    assert_eq!(probe.live_objects(), before);
}

#[test]
fn the_immediate_context_cannot_finish_a_list() {
    let (_, device) = device();
    let mut immediate = device.immediate_context().unwrap();
    assert!(matches!(
        immediate.finish_command_list(),
        Err(Error::UnsupportedFeature(_))
    ));
}

#[test]
fn barriers_record_nothing() {
    let (probe, device) = device();
    let mut immediate = device.immediate_context().unwrap();
    probe.take_calls();
    immediate.insert_barrier(
        &[Resource::default()],
        &[ResourceUsage::RENDER_TARGET],
        &[ResourceUsage::SHADER_RESOURCE],
    );
    assert!(probe.calls().is_empty());
}

#[test]
#[should_panic(expected = "command lists can only be executed")]
fn barriers_on_a_list_panic() {
    let (_, device) = device();
    let mut list = finished_list(&device);
    list.insert_barrier(
        &[Resource::default()],
        &[ResourceUsage::RENDER_TARGET],
        &[ResourceUsage::SHADER_RESOURCE],
    );
}

#[test]
#[should_panic(expected = "draw recorded on command list")]
fn draws_on_a_list_panic() {
    let (_, device) = device();
    let mut list = finished_list(&device);
    list.draw(3, 1, 0, 0);
}

#[test]
#[should_panic(expected = "bind_pipeline recorded on command list")]
fn binds_on_a_list_panic() {
    let (_, device) = device();
    let mut list = finished_list(&device);
    list.bind_pipeline(PipelineType::Graphics, Pipeline::default());
}

#[test]
#[should_panic(expected = "begin_render_pass recorded on command list")]
fn render_passes_on_a_list_panic() {
    let (_, device) = device();
    let mut list = finished_list(&device);
    list.begin_render_pass(&[], ResourceView::default());
}

#[test]
fn a_list_still_knows_its_device() {
    let (_, device) = device();
    let list = finished_list(&device);
    assert!(Arc::ptr_eq(list.device(), &device));
}
