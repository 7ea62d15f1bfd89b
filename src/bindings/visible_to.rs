// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Resource visibility and usage declarations.
//!
//! This module provides the flag types that describe how resources are accessed and which
//! shader stages can see a binding:
//!
//! - [`ShaderStage`] - the stages a binding or push is visible to
//! - [`ResourceUsage`] - how a resource is used by the pipeline; doubles as the state of a
//!   resource in barriers
//! - [`MemoryHeap`] - where a resource lives and how the CPU may touch it
//! - [`MapAccess`] - the access requested when mapping a resource
//!
//! # Examples
//!
//! ```
//! use slotbound::bindings::visible_to::{ResourceUsage, ShaderStage};
//!
//! let usage = ResourceUsage::RENDER_TARGET | ResourceUsage::SHADER_RESOURCE;
//! assert!(usage.intersects(ResourceUsage::SHADER_RESOURCE_PIXEL));
//! assert!(ShaderStage::ALL_GRAPHICS.contains(ShaderStage::PIXEL));
//! ```

bitflags::bitflags! {
    /// Shader stages a binding is visible to.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStage: u32 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;

        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::HULL.bits()
            | Self::DOMAIN.bits()
            | Self::GEOMETRY.bits()
            | Self::PIXEL.bits();
        const ALL = Self::ALL_GRAPHICS.bits() | Self::COMPUTE.bits();
    }
}

impl ShaderStage {
    /// Each single stage, in native bind order.
    pub const SINGLE: [ShaderStage; 6] = [
        ShaderStage::VERTEX,
        ShaderStage::HULL,
        ShaderStage::DOMAIN,
        ShaderStage::GEOMETRY,
        ShaderStage::PIXEL,
        ShaderStage::COMPUTE,
    ];

    /// Iterates the single stages contained in `self`.
    pub fn each(self) -> impl Iterator<Item = ShaderStage> {
        Self::SINGLE.into_iter().filter(move |s| self.contains(*s))
    }
}

bitflags::bitflags! {
    /// How a resource is used, or the state it is in.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ResourceUsage: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const RENDER_TARGET = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
        const DEPTH_STENCIL_WRITE = 1 << 4;
        const DEPTH_STENCIL_READ = 1 << 5;
        const SHADER_RESOURCE_NON_PIXEL = 1 << 6;
        const SHADER_RESOURCE_PIXEL = 1 << 7;
        const STREAM_OUTPUT = 1 << 8;
        const INDIRECT_ARGUMENT = 1 << 9;
        const COPY_DEST = 1 << 10;
        const COPY_SOURCE = 1 << 11;
        const RESOLVE_DEST = 1 << 12;
        const RESOLVE_SOURCE = 1 << 13;
        const CONSTANT_BUFFER = 1 << 15;

        const DEPTH_STENCIL = Self::DEPTH_STENCIL_WRITE.bits() | Self::DEPTH_STENCIL_READ.bits();
        const SHADER_RESOURCE = Self::SHADER_RESOURCE_NON_PIXEL.bits()
            | Self::SHADER_RESOURCE_PIXEL.bits();
        const GENERAL = 1 << 31;
    }
}

/// Where a resource's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryHeap {
    #[default]
    Unknown,
    /// Device-local; the CPU only reaches it through copies and uploads.
    GpuOnly,
    /// Written by the CPU, read by the GPU.
    CpuToGpu,
    /// Written by the GPU, read back by the CPU.
    GpuToCpu,
    /// Host memory the GPU only touches through copies.
    CpuOnly,
}

/// Access requested by [`crate::device::Device::map_resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    /// Write access where the previous contents are discarded.
    WriteDiscard,
}
