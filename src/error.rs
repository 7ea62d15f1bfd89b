// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::NativeError;
use crate::pixel_formats::Format;

/// Failure of a creation or query operation.
///
/// Bind, draw and copy operations do not return errors; they assume handles were validated
/// beforehand (see [`crate::device::Device::check_resource_handle_valid`]).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(&'static str),
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    #[error("format {0:?} is not supported for the requested usage")]
    UnsupportedFormat(Format),
    #[error("stale or destroyed handle: {0}")]
    HandleInvalid(&'static str),
    #[error("the driver refused to map the resource")]
    MapFailed,
    #[error("driver: {0}")]
    Native(#[from] NativeError),
}
