// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Handles stay valid from creation until destruction, and not a moment longer.

use slotbound::bindings::handles::{Resource, ResourceView};
use slotbound::bindings::resource::{ResourceDesc, ResourceViewDesc};
use slotbound::bindings::visible_to::{MemoryHeap, ResourceUsage};
use slotbound::imp::software::SoftwareDevice;
use slotbound::pixel_formats::Format;
use slotbound::{Config, Device, Error};
use std::sync::Arc;

fn device() -> (SoftwareDevice, Arc<Device>) {
    let probe = SoftwareDevice::new();
    let device = Device::new(Box::new(probe.clone()), Config::default());
    (probe, device)
}

fn texture(device: &Device) -> Resource {
    device
        .create_resource(
            &ResourceDesc::texture_2d(
                16,
                16,
                Format::R8G8B8A8Unorm,
                MemoryHeap::GpuOnly,
                ResourceUsage::SHADER_RESOURCE | ResourceUsage::RENDER_TARGET,
            ),
            &[],
            ResourceUsage::SHADER_RESOURCE,
        )
        .unwrap()
}

#[test]
fn created_handles_are_valid_until_destroyed() {
    let (probe, device) = device();
    let resource = texture(&device);
    assert!(device.check_resource_handle_valid(resource));

    device.destroy_resource(resource);
    assert!(!device.check_resource_handle_valid(resource));
    assert!(matches!(
        device.get_resource_desc(resource),
        Err(Error::HandleInvalid(_))
    ));
    assert_eq!(probe.live_objects(), 0);

    // destroying twice is ignored
    device.destroy_resource(resource);
}

#[test]
fn null_handles_are_never_valid() {
    let (_, device) = device();
    assert!(!device.check_resource_handle_valid(Resource::default()));
    assert!(!device.check_resource_view_handle_valid(ResourceView::default()));
}

#[test]
fn a_recycled_slot_does_not_revive_old_handles() {
    let (_, device) = device();
    let first = texture(&device);
    device.destroy_resource(first);
    let second = texture(&device);
    assert_ne!(first, second);
    assert!(!device.check_resource_handle_valid(first));
    assert!(device.check_resource_handle_valid(second));
}

#[test]
fn destroying_a_resource_invalidates_its_views() {
    let (probe, device) = device();
    let resource = texture(&device);
    let srv = device
        .create_resource_view(
            resource,
            ResourceUsage::SHADER_RESOURCE,
            &ResourceViewDesc::default(),
        )
        .unwrap();
    let rtv = device
        .create_resource_view(
            resource,
            ResourceUsage::RENDER_TARGET,
            &ResourceViewDesc::with_format(Format::R8G8B8A8Unorm),
        )
        .unwrap();
    assert_eq!(device.get_resource_from_view(srv).unwrap(), resource);

    device.destroy_resource(resource);
    assert!(!device.check_resource_view_handle_valid(srv));
    assert!(!device.check_resource_view_handle_valid(rtv));
    assert!(matches!(
        device.get_resource_from_view(srv),
        Err(Error::HandleInvalid(_))
    ));
    assert_eq!(probe.live_objects(), 0);
}

#[test]
fn destroying_a_view_keeps_the_resource() {
    let (_, device) = device();
    let resource = texture(&device);
    let srv = device
        .create_resource_view(
            resource,
            ResourceUsage::SHADER_RESOURCE,
            &ResourceViewDesc::default(),
        )
        .unwrap();
    device.destroy_resource_view(srv);
    assert!(!device.check_resource_view_handle_valid(srv));
    assert!(device.check_resource_handle_valid(resource));
    device.destroy_resource(resource);
}

#[test]
fn a_view_must_name_exactly_one_usage() {
    let (_, device) = device();
    let resource = texture(&device);
    let result = device.create_resource_view(
        resource,
        ResourceUsage::SHADER_RESOURCE | ResourceUsage::RENDER_TARGET,
        &ResourceViewDesc::default(),
    );
    assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
}

#[test]
fn only_one_immediate_context_at_a_time() {
    let (_, device) = device();
    let first = device.immediate_context().unwrap();
    assert!(matches!(
        device.immediate_context(),
        Err(Error::UnsupportedFeature(_))
    ));
    // deferred contexts are not limited
    let _deferred = device.create_deferred_context().unwrap();
    let _another = device.create_deferred_context().unwrap();

    drop(first);
    assert!(device.immediate_context().is_ok());
}

#[test]
fn cpu_readable_resources_cannot_be_render_targets() {
    let (_, device) = device();
    let result = device.create_resource(
        &ResourceDesc::texture_2d(
            16,
            16,
            Format::R8G8B8A8Unorm,
            MemoryHeap::GpuToCpu,
            ResourceUsage::RENDER_TARGET,
        ),
        &[],
        ResourceUsage::COPY_DEST,
    );
    assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
}
