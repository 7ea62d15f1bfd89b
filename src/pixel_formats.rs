// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel format definitions shared by the abstract API and the native driver.
//!
//! The abstract format numbering is identical to the slot-binding driver's own format
//! enumeration, so translation between the two layers is the identity.  What does need
//! translating is the *role* a format plays:
//!
//! - Depth formats that must also be sampled are created with their typeless family
//!   ([`Format::to_typeless`]) and viewed through a color-compatible format
//!   ([`Format::depth_to_shader_resource`]).
//! - Views that pass [`Format::Unknown`] inherit the format of their resource.
//!
//! # Examples
//!
//! ```
//! use slotbound::pixel_formats::Format;
//!
//! assert_eq!(Format::R8G8B8A8Unorm.bytes_per_block(), 4);
//! assert_eq!(Format::D32Float.to_typeless(), Format::R32Typeless);
//! assert_eq!(Format::D32Float.depth_to_shader_resource(), Format::R32Float);
//! ```

pub use half::f16;

/// A texel or element format.
///
/// Discriminants match the driver's numbering, see [`Format::raw`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Format {
    #[default]
    Unknown = 0,
    R32G32B32A32Typeless = 1,
    R32G32B32A32Float = 2,
    R32G32B32A32Uint = 3,
    R32G32B32A32Sint = 4,
    R32G32B32Float = 6,
    R16G16B16A16Typeless = 9,
    R16G16B16A16Float = 10,
    R16G16B16A16Unorm = 11,
    R16G16B16A16Uint = 12,
    R32G32Float = 16,
    R32G8X24Typeless = 19,
    D32FloatS8X24Uint = 20,
    R32FloatX8X24Typeless = 21,
    R10G10B10A2Typeless = 23,
    R10G10B10A2Unorm = 24,
    R8G8B8A8Typeless = 27,
    R8G8B8A8Unorm = 28,
    R8G8B8A8UnormSrgb = 29,
    R8G8B8A8Uint = 30,
    R16G16Float = 34,
    R32Typeless = 39,
    D32Float = 40,
    R32Float = 41,
    R32Uint = 42,
    R32Sint = 43,
    R24G8Typeless = 44,
    D24UnormS8Uint = 45,
    R24UnormX8Typeless = 46,
    R8G8Unorm = 49,
    R16Typeless = 53,
    R16Float = 54,
    D16Unorm = 55,
    R16Unorm = 56,
    R16Uint = 57,
    R8Typeless = 60,
    R8Unorm = 61,
    R8Uint = 62,
    A8Unorm = 65,
    BC1Unorm = 71,
    BC3Unorm = 77,
    B8G8R8A8Unorm = 87,
    B8G8R8X8Unorm = 88,
    B8G8R8A8Typeless = 90,
    B8G8R8A8UnormSrgb = 91,
}

const ALL: &[Format] = &[
    Format::Unknown,
    Format::R32G32B32A32Typeless,
    Format::R32G32B32A32Float,
    Format::R32G32B32A32Uint,
    Format::R32G32B32A32Sint,
    Format::R32G32B32Float,
    Format::R16G16B16A16Typeless,
    Format::R16G16B16A16Float,
    Format::R16G16B16A16Unorm,
    Format::R16G16B16A16Uint,
    Format::R32G32Float,
    Format::R32G8X24Typeless,
    Format::D32FloatS8X24Uint,
    Format::R32FloatX8X24Typeless,
    Format::R10G10B10A2Typeless,
    Format::R10G10B10A2Unorm,
    Format::R8G8B8A8Typeless,
    Format::R8G8B8A8Unorm,
    Format::R8G8B8A8UnormSrgb,
    Format::R8G8B8A8Uint,
    Format::R16G16Float,
    Format::R32Typeless,
    Format::D32Float,
    Format::R32Float,
    Format::R32Uint,
    Format::R32Sint,
    Format::R24G8Typeless,
    Format::D24UnormS8Uint,
    Format::R24UnormX8Typeless,
    Format::R8G8Unorm,
    Format::R16Typeless,
    Format::R16Float,
    Format::D16Unorm,
    Format::R16Unorm,
    Format::R16Uint,
    Format::R8Typeless,
    Format::R8Unorm,
    Format::R8Uint,
    Format::A8Unorm,
    Format::BC1Unorm,
    Format::BC3Unorm,
    Format::B8G8R8A8Unorm,
    Format::B8G8R8X8Unorm,
    Format::B8G8R8A8Typeless,
    Format::B8G8R8A8UnormSrgb,
];

impl Format {
    /// The driver's numeric value for this format.
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Looks up a format by the driver's numeric value.
    pub fn from_raw(raw: u32) -> Option<Format> {
        ALL.iter().copied().find(|f| f.raw() == raw)
    }

    /// Every format this crate knows about, in numeric order.
    pub fn all() -> &'static [Format] {
        ALL
    }

    /// Size in bytes of one texel, or of one 4x4 block for block-compressed formats.
    ///
    /// Returns 0 for [`Format::Unknown`].
    pub const fn bytes_per_block(self) -> u32 {
        use Format::*;
        match self {
            Unknown => 0,
            R32G32B32A32Typeless | R32G32B32A32Float | R32G32B32A32Uint | R32G32B32A32Sint => 16,
            R32G32B32Float => 12,
            R16G16B16A16Typeless | R16G16B16A16Float | R16G16B16A16Unorm | R16G16B16A16Uint
            | R32G32Float | R32G8X24Typeless | D32FloatS8X24Uint | R32FloatX8X24Typeless => 8,
            R10G10B10A2Typeless | R10G10B10A2Unorm | R8G8B8A8Typeless | R8G8B8A8Unorm
            | R8G8B8A8UnormSrgb | R8G8B8A8Uint | R16G16Float | R32Typeless | D32Float
            | R32Float | R32Uint | R32Sint | R24G8Typeless | D24UnormS8Uint
            | R24UnormX8Typeless | B8G8R8A8Unorm | B8G8R8X8Unorm | B8G8R8A8Typeless
            | B8G8R8A8UnormSrgb => 4,
            R8G8Unorm | R16Typeless | R16Float | D16Unorm | R16Unorm | R16Uint => 2,
            R8Typeless | R8Unorm | R8Uint | A8Unorm => 1,
            BC1Unorm => 8,
            BC3Unorm => 16,
        }
    }

    pub const fn is_compressed(self) -> bool {
        matches!(self, Format::BC1Unorm | Format::BC3Unorm)
    }

    pub const fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            Format::D32FloatS8X24Uint | Format::D32Float | Format::D24UnormS8Uint | Format::D16Unorm
        )
    }

    pub const fn has_stencil(self) -> bool {
        matches!(self, Format::D32FloatS8X24Uint | Format::D24UnormS8Uint)
    }

    pub const fn is_srgb(self) -> bool {
        matches!(self, Format::R8G8B8A8UnormSrgb | Format::B8G8R8A8UnormSrgb)
    }

    /// Whether this is the typeless root of a format family.
    ///
    /// The `X8Typeless` depth-plane formats are typed views and do not count.
    pub const fn is_typeless(self) -> bool {
        use Format::*;
        matches!(
            self,
            R32G32B32A32Typeless
                | R16G16B16A16Typeless
                | R32G8X24Typeless
                | R10G10B10A2Typeless
                | R8G8B8A8Typeless
                | R32Typeless
                | R24G8Typeless
                | R16Typeless
                | R8Typeless
                | B8G8R8A8Typeless
        )
    }

    /// The typeless member of this format's family.
    ///
    /// Formats without a typeless family are returned unchanged.
    pub const fn to_typeless(self) -> Format {
        use Format::*;
        match self {
            R32G32B32A32Float | R32G32B32A32Uint | R32G32B32A32Sint => R32G32B32A32Typeless,
            R16G16B16A16Float | R16G16B16A16Unorm | R16G16B16A16Uint => R16G16B16A16Typeless,
            D32FloatS8X24Uint | R32FloatX8X24Typeless => R32G8X24Typeless,
            R10G10B10A2Unorm => R10G10B10A2Typeless,
            R8G8B8A8Unorm | R8G8B8A8UnormSrgb | R8G8B8A8Uint => R8G8B8A8Typeless,
            D32Float | R32Float | R32Uint | R32Sint => R32Typeless,
            D24UnormS8Uint | R24UnormX8Typeless => R24G8Typeless,
            D16Unorm | R16Float | R16Unorm | R16Uint => R16Typeless,
            R8Unorm | R8Uint => R8Typeless,
            B8G8R8A8Unorm | B8G8R8A8UnormSrgb => B8G8R8A8Typeless,
            other => other,
        }
    }

    /// The depth-stencil format a typeless depth family is viewed through.
    pub const fn to_depth_stencil(self) -> Format {
        use Format::*;
        match self {
            R32G8X24Typeless | R32FloatX8X24Typeless => D32FloatS8X24Uint,
            R32Typeless | R32Float => D32Float,
            R24G8Typeless | R24UnormX8Typeless => D24UnormS8Uint,
            R16Typeless | R16Unorm => D16Unorm,
            other => other,
        }
    }

    /// The color format used to sample the depth plane of a depth format.
    pub const fn depth_to_shader_resource(self) -> Format {
        use Format::*;
        match self {
            D32FloatS8X24Uint | R32G8X24Typeless => R32FloatX8X24Typeless,
            D32Float | R32Typeless => R32Float,
            D24UnormS8Uint | R24G8Typeless => R24UnormX8Typeless,
            D16Unorm | R16Typeless => R16Unorm,
            other => other,
        }
    }

    /// Row pitch in bytes of a tightly packed row of `width` texels.
    pub const fn row_pitch(self, width: u32) -> u32 {
        if self.is_compressed() {
            width.div_ceil(4) * self.bytes_per_block()
        } else {
            width * self.bytes_per_block()
        }
    }

    /// Slice pitch in bytes of a tightly packed `width` x `height` slice.
    pub const fn slice_pitch(self, width: u32, height: u32) -> u32 {
        if self.is_compressed() {
            self.row_pitch(width) * height.div_ceil(4)
        } else {
            self.row_pitch(width) * height
        }
    }
}
