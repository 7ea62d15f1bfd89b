// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Opaque handles for every object the device issues.
//!
//! Handles are generational keys.  A handle never points at a native object; the mapping
//! to the driver lives exclusively in the device's trackers, so a destroyed handle can be
//! detected instead of dereferenced.  The default value of every handle is the null
//! handle, which is never valid.  It is spelled `Resource::null()` through the re-exported
//! [`Key`] trait.
//!
//! Handles can be converted to and from a `u64` for callers that need to stash them in
//! plain data (see [`Handle::as_raw`]).

pub use slotmap::Key;
use slotmap::KeyData;

slotmap::new_key_type! {
    /// A buffer or texture.
    pub struct Resource;
    /// A typed view onto a [`Resource`].
    pub struct ResourceView;
    /// A sampler state object.
    pub struct Sampler;
    /// A pipeline, either an aggregate or a single state fragment.
    pub struct Pipeline;
    /// A compiled shader stage.
    pub struct ShaderModule;
    /// Binding-shape metadata for a pipeline.
    pub struct PipelineLayout;
    /// Slot-shape metadata for a descriptor table.
    pub struct DescriptorTableLayout;
    /// Host-side descriptor storage.
    pub struct DescriptorHeap;
    /// A fixed-size window into a [`DescriptorHeap`].
    pub struct DescriptorTable;
    /// A pool of native query objects.
    pub struct QueryHeap;
}

/// Operations shared by every handle type.
pub trait Handle: Key {
    /// An opaque integer encoding of this handle.
    fn as_raw(&self) -> u64 {
        self.data().as_ffi()
    }
    /// Decodes a value produced by [`Handle::as_raw`].
    fn from_raw(raw: u64) -> Self {
        KeyData::from_ffi(raw).into()
    }
}

impl<K: Key> Handle for K {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip() {
        let mut map = slotmap::SlotMap::<Resource, ()>::with_key();
        let a = map.insert(());
        assert_eq!(Resource::from_raw(a.as_raw()), a);
        assert!(Resource::null().is_null());
        assert!(!a.is_null());
    }
}
