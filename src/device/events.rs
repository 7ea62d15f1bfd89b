// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Object lifetime notifications.

use crate::bindings::handles::{Pipeline, Resource, ResourceView};
use crate::bindings::pipeline::PipelineDesc;
use crate::bindings::resource::{ResourceDesc, ResourceViewDesc};
use crate::bindings::visible_to::ResourceUsage;
use crate::device::Device;

/**
Observes creation and destruction of device objects.

Creation hooks run after the object is live; destruction hooks run while the handle is still
valid, before the native object is released.  Every method defaults to doing nothing.

Hooks run on the thread that created or destroyed the object, with no device locks held, so
they may call back into the device.
*/
pub trait DeviceEvents: Send + Sync {
    fn init_resource(&self, _device: &Device, _desc: &ResourceDesc, _resource: Resource) {}
    fn destroy_resource(&self, _device: &Device, _resource: Resource) {}
    fn init_resource_view(
        &self,
        _device: &Device,
        _resource: Resource,
        _usage_type: ResourceUsage,
        _desc: &ResourceViewDesc,
        _view: ResourceView,
    ) {
    }
    fn destroy_resource_view(&self, _device: &Device, _view: ResourceView) {}
    fn init_pipeline(&self, _device: &Device, _desc: &PipelineDesc, _pipeline: Pipeline) {}
    fn destroy_pipeline(&self, _device: &Device, _pipeline: Pipeline) {}
}

/// The observer used when none is installed.
#[derive(Debug)]
pub(crate) struct NoEvents;

impl DeviceEvents for NoEvents {}
