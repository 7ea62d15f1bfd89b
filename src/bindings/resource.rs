// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Abstract descriptions of resources and resource views.

use crate::bindings::visible_to::{MemoryHeap, ResourceUsage};
use crate::pixel_formats::Format;

/// The dimensionality of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    #[default]
    Unknown,
    Buffer,
    Texture1d,
    Texture2d,
    Texture3d,
}

bitflags::bitflags! {
    /// Optional behaviours of a resource.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        const SHARED = 1 << 0;
        const CUBE_COMPATIBLE = 1 << 1;
        const GENERATE_MIPMAPS = 1 << 2;
        /// Buffer holding fixed-stride structures; `stride` must be set.
        const STRUCTURED = 1 << 3;
        /// Buffer readable as raw 32-bit words.
        const RAW = 1 << 4;
    }
}

/// Buffer-specific sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferDesc {
    /// Size in bytes.
    pub size: u64,
    /// Element stride for structured buffers, in bytes.
    pub stride: u32,
}

/// Texture-specific sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, array layers otherwise.
    pub depth_or_layers: u16,
    /// Mip levels; 0 requests a full chain.
    pub levels: u16,
    pub format: Format,
    pub samples: u16,
}

impl Default for TextureDesc {
    fn default() -> Self {
        TextureDesc {
            width: 0,
            height: 0,
            depth_or_layers: 1,
            levels: 1,
            format: Format::Unknown,
            samples: 1,
        }
    }
}

/// Everything needed to create a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceDesc {
    pub kind: ResourceType,
    pub buffer: BufferDesc,
    pub texture: TextureDesc,
    pub heap: MemoryHeap,
    pub usage: ResourceUsage,
    pub flags: ResourceFlags,
}

impl ResourceDesc {
    /// Describes a buffer of `size` bytes.
    pub fn buffer(size: u64, heap: MemoryHeap, usage: ResourceUsage) -> Self {
        ResourceDesc {
            kind: ResourceType::Buffer,
            buffer: BufferDesc { size, stride: 0 },
            heap,
            usage,
            ..Default::default()
        }
    }

    /// Describes a single-level, single-sample 2D texture.
    pub fn texture_2d(
        width: u32,
        height: u32,
        format: Format,
        heap: MemoryHeap,
        usage: ResourceUsage,
    ) -> Self {
        ResourceDesc {
            kind: ResourceType::Texture2d,
            texture: TextureDesc {
                width,
                height,
                format,
                ..Default::default()
            },
            heap,
            usage,
            ..Default::default()
        }
    }

    /// Number of subresources (levels times layers); buffers have one.
    pub fn subresource_count(&self) -> u32 {
        match self.kind {
            ResourceType::Buffer | ResourceType::Unknown => 1,
            ResourceType::Texture3d => self.texture.levels.max(1) as u32,
            _ => self.texture.levels.max(1) as u32 * self.texture.depth_or_layers.max(1) as u32,
        }
    }
}

/// Initial contents of one subresource.
#[derive(Debug, Clone, Copy)]
pub struct SubresourceData<'a> {
    pub data: &'a [u8],
    /// Bytes between rows; ignored for buffers and 1D textures.
    pub row_pitch: u32,
    /// Bytes between depth slices; only used by 3D textures.
    pub slice_pitch: u32,
}

/// A region of a subresource: `[left, right) x [top, bottom) x [front, back)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SubresourceBox {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

impl SubresourceBox {
    pub const fn width(&self) -> u32 {
        self.right - self.left
    }
    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }
    pub const fn depth(&self) -> u32 {
        self.back - self.front
    }
}

/// The dimensionality of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceViewType {
    /// Inferred from the resource.
    #[default]
    Unknown,
    Buffer,
    Texture1d,
    Texture1dArray,
    Texture2d,
    Texture2dArray,
    Texture2dMultisample,
    Texture2dMultisampleArray,
    Texture3d,
    TextureCube,
    TextureCubeArray,
}

/// Everything needed to create a view.
///
/// For buffer views `first_level`/`levels` are unused and `offset`/`size` are measured in
/// elements of `format` (or of the structure stride for structured buffers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceViewDesc {
    pub kind: ResourceViewType,
    /// [`Format::Unknown`] inherits the resource's format.
    pub format: Format,
    pub first_level: u32,
    /// `u32::MAX` means all remaining levels.
    pub levels: u32,
    pub first_layer: u32,
    /// `u32::MAX` means all remaining layers.
    pub layers: u32,
    pub offset: u64,
    pub size: u64,
}

impl Default for ResourceViewDesc {
    fn default() -> Self {
        ResourceViewDesc {
            kind: ResourceViewType::Unknown,
            format: Format::Unknown,
            first_level: 0,
            levels: u32::MAX,
            first_layer: 0,
            layers: u32::MAX,
            offset: 0,
            size: u64::MAX,
        }
    }
}

impl ResourceViewDesc {
    /// A view of the whole resource in `format`.
    pub fn with_format(format: Format) -> Self {
        ResourceViewDesc {
            format,
            ..Default::default()
        }
    }
}
