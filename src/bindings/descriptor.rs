// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Descriptor types used by tables, heaps and push descriptors.
//!
//! The slot-binding driver has no descriptor objects.  Everything here is host-side data:
//! a [`Descriptor`] names the object that should occupy a shader register, and a
//! [`DescriptorRange`] says which registers, of which kind, in which stages, a run of
//! table slots maps to.  Nothing reaches the driver until a table is bound.
//!
//! # Key Concepts
//!
//! - **Binding**: the slot index inside a table.  Ranges in one table layout must not
//!   overlap.
//! - **Register**: the native per-stage slot (`t#`, `s#`, `u#`, `b#`) the first slot of a
//!   range is bound to.
//! - **Visibility**: the shader stages the range is bound for.
//!
//! # Example
//!
//! ```
//! use slotbound::bindings::descriptor::{DescriptorRange, DescriptorType};
//! use slotbound::bindings::visible_to::ShaderStage;
//!
//! // t2..t5 in the pixel shader, fed from table slots 0..4
//! let textures = DescriptorRange {
//!     binding: 0,
//!     dx_register_index: 2,
//!     count: 4,
//!     kind: DescriptorType::ShaderResourceView,
//!     visibility: ShaderStage::PIXEL,
//! };
//! assert_eq!(textures.bindings(), 0..4);
//! ```

use crate::bindings::handles::{DescriptorTable, Resource, ResourceView, Sampler};
use crate::bindings::visible_to::ShaderStage;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    /// A sampler and a shader-resource view sharing one register index.
    SamplerWithResourceView,
    ShaderResourceView,
    UnorderedAccessView,
    ConstantBuffer,
}

/// A run of consecutive table slots of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorRange {
    /// First table slot of the range.
    pub binding: u32,
    /// Native register the first slot is bound to.
    pub dx_register_index: u32,
    pub count: u32,
    pub kind: DescriptorType,
    pub visibility: ShaderStage,
}

impl DescriptorRange {
    /// Table slots covered by this range.
    pub fn bindings(&self) -> Range<u32> {
        self.binding..self.binding + self.count
    }
}

/// A push-constant range of a pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantRange {
    /// Offset in 32-bit words.
    pub offset: u32,
    /// Size in 32-bit words.
    pub count: u32,
    /// Constant-buffer register the emulated push-constant buffer is bound to.
    pub dx_register_index: u32,
    pub visibility: ShaderStage,
}

/// Capacity request for one descriptor type in a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHeapSize {
    pub kind: DescriptorType,
    pub count: u32,
}

/// A byte range of a buffer used as a constant buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    pub buffer: Resource,
    pub offset: u64,
    /// `u64::MAX` means up to the end of the buffer.
    pub size: u64,
}

impl BufferRange {
    pub fn whole(buffer: Resource) -> Self {
        BufferRange {
            buffer,
            offset: 0,
            size: u64::MAX,
        }
    }
}

/// The content of one table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Descriptor {
    /// Binds null, which unbinds the register.
    #[default]
    Empty,
    Sampler(Sampler),
    SamplerWithResourceView {
        sampler: Sampler,
        view: ResourceView,
    },
    ShaderResourceView(ResourceView),
    UnorderedAccessView(ResourceView),
    ConstantBuffer(BufferRange),
}

impl Descriptor {
    /// The type of this descriptor; `None` for [`Descriptor::Empty`].
    pub fn kind(&self) -> Option<DescriptorType> {
        match self {
            Descriptor::Empty => None,
            Descriptor::Sampler(_) => Some(DescriptorType::Sampler),
            Descriptor::SamplerWithResourceView { .. } => {
                Some(DescriptorType::SamplerWithResourceView)
            }
            Descriptor::ShaderResourceView(_) => Some(DescriptorType::ShaderResourceView),
            Descriptor::UnorderedAccessView(_) => Some(DescriptorType::UnorderedAccessView),
            Descriptor::ConstantBuffer(_) => Some(DescriptorType::ConstantBuffer),
        }
    }

    /// Whether this descriptor may be stored in a slot of `kind`.
    ///
    /// Empty descriptors fit every slot.
    pub fn fits(&self, kind: DescriptorType) -> bool {
        self.kind().is_none_or(|k| k == kind)
    }
}

/// A write of consecutive descriptors into one table.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorUpdate<'a> {
    pub table: DescriptorTable,
    /// Table slot of the range being written.
    pub binding: u32,
    /// Offset from `binding` of the first slot written.
    pub array_offset: u32,
    pub kind: DescriptorType,
    pub descriptors: &'a [Descriptor],
}

impl DescriptorUpdate<'_> {
    /// Table slots written by this update, or `None` if they overflow the slot space.
    pub fn slots(&self) -> Option<Range<u32>> {
        let first = self.binding.checked_add(self.array_offset)?;
        let end = first.checked_add(u32::try_from(self.descriptors.len()).ok()?)?;
        Some(first..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::Key;

    #[test]
    fn empty_fits_every_kind() {
        assert!(Descriptor::Empty.fits(DescriptorType::ConstantBuffer));
        assert!(!Descriptor::Sampler(Sampler::null()).fits(DescriptorType::ShaderResourceView));
    }

    #[test]
    fn update_slots() {
        let descriptors = [Descriptor::Empty; 3];
        let update = DescriptorUpdate {
            table: DescriptorTable::null(),
            binding: 2,
            array_offset: 1,
            kind: DescriptorType::Sampler,
            descriptors: &descriptors,
        };
        assert_eq!(update.slots(), Some(3..6));

        let overflowing = DescriptorUpdate {
            binding: u32::MAX,
            array_offset: 1,
            ..update
        };
        assert_eq!(overflowing.slots(), None);
        let past_the_end = DescriptorUpdate {
            binding: u32::MAX - 1,
            array_offset: 0,
            ..update
        };
        assert_eq!(past_the_end.slots(), None);
    }
}
