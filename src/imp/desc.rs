// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Native creation parameters.
//!
//! These mirror the driver's creation structures field for field, including its enum
//! numbering, so a hardware driver can pass them through without translation.

use crate::pixel_formats::Format;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Usage {
    #[default]
    Default,
    Immutable,
    Dynamic,
    Staging,
}

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 0x1;
        const INDEX_BUFFER = 0x2;
        const CONSTANT_BUFFER = 0x4;
        const SHADER_RESOURCE = 0x8;
        const STREAM_OUTPUT = 0x10;
        const RENDER_TARGET = 0x20;
        const DEPTH_STENCIL = 0x40;
        const UNORDERED_ACCESS = 0x80;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct CpuAccessFlags: u32 {
        const WRITE = 0x10000;
        const READ = 0x20000;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct MiscFlags: u32 {
        const GENERATE_MIPS = 0x1;
        const SHARED = 0x2;
        const TEXTURECUBE = 0x4;
        const DRAWINDIRECT_ARGS = 0x10;
        const BUFFER_ALLOW_RAW_VIEWS = 0x20;
        const BUFFER_STRUCTURED = 0x40;
    }
}

bitflags::bitflags! {
    /// Per-format capability bits.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct FormatSupport: u32 {
        const BUFFER = 0x1;
        const IA_VERTEX_BUFFER = 0x2;
        const IA_INDEX_BUFFER = 0x4;
        const SO_BUFFER = 0x8;
        const TEXTURE1D = 0x10;
        const TEXTURE2D = 0x20;
        const TEXTURE3D = 0x40;
        const TEXTURECUBE = 0x80;
        const SHADER_LOAD = 0x100;
        const SHADER_SAMPLE = 0x200;
        const MIP = 0x1000;
        const MIP_AUTOGEN = 0x2000;
        const RENDER_TARGET = 0x4000;
        const BLENDABLE = 0x8000;
        const DEPTH_STENCIL = 0x10000;
        const MULTISAMPLE_RESOLVE = 0x40000;
        const CPU_LOCKABLE = 0x20000;
        const MULTISAMPLE_RENDERTARGET = 0x200000;
        const TYPED_UNORDERED_ACCESS_VIEW = 0x400000;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        const DEPTH = 0x1;
        const STENCIL = 0x2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferDesc {
    pub byte_width: u32,
    pub usage: Usage,
    pub bind_flags: BindFlags,
    pub cpu_access_flags: CpuAccessFlags,
    pub misc_flags: MiscFlags,
    pub structure_byte_stride: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture1dDesc {
    pub width: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: Format,
    pub usage: Usage,
    pub bind_flags: BindFlags,
    pub cpu_access_flags: CpuAccessFlags,
    pub misc_flags: MiscFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture2dDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: Format,
    pub sample_count: u32,
    pub sample_quality: u32,
    pub usage: Usage,
    pub bind_flags: BindFlags,
    pub cpu_access_flags: CpuAccessFlags,
    pub misc_flags: MiscFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture3dDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub format: Format,
    pub usage: Usage,
    pub bind_flags: BindFlags,
    pub cpu_access_flags: CpuAccessFlags,
    pub misc_flags: MiscFlags,
}

/// The creation parameters of any native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeResourceDesc {
    Buffer(BufferDesc),
    Texture1d(Texture1dDesc),
    Texture2d(Texture2dDesc),
    Texture3d(Texture3dDesc),
}

impl NativeResourceDesc {
    pub fn bind_flags(&self) -> BindFlags {
        match self {
            NativeResourceDesc::Buffer(d) => d.bind_flags,
            NativeResourceDesc::Texture1d(d) => d.bind_flags,
            NativeResourceDesc::Texture2d(d) => d.bind_flags,
            NativeResourceDesc::Texture3d(d) => d.bind_flags,
        }
    }

    pub fn format(&self) -> Format {
        match self {
            NativeResourceDesc::Buffer(_) => Format::Unknown,
            NativeResourceDesc::Texture1d(d) => d.format,
            NativeResourceDesc::Texture2d(d) => d.format,
            NativeResourceDesc::Texture3d(d) => d.format,
        }
    }
}

/// Initial contents of one subresource.
#[derive(Debug, Clone, Copy)]
pub struct SubresourceInit<'a> {
    pub data: &'a [u8],
    pub row_pitch: u32,
    pub slice_pitch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewDimension {
    Buffer,
    Texture1d,
    Texture1dArray,
    Texture2d,
    Texture2dArray,
    Texture2dMs,
    Texture2dMsArray,
    Texture3d,
    TextureCube,
    TextureCubeArray,
}

/// Parameters shared by every view type.
///
/// Render-target, depth-stencil and unordered-access views address one mip level
/// (`first_level`) and ignore `levels`.  Buffer views use `first_element` and `elements`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewDesc {
    pub format: Format,
    pub dimension: ViewDimension,
    pub first_level: u32,
    pub levels: u32,
    pub first_layer: u32,
    pub layers: u32,
    pub first_element: u32,
    pub elements: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TextureAddressMode {
    Wrap = 1,
    Mirror = 2,
    Clamp = 3,
    Border = 4,
    MirrorOnce = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ComparisonFunc {
    Never = 1,
    Less = 2,
    Equal = 3,
    LessEqual = 4,
    Greater = 5,
    NotEqual = 6,
    GreaterEqual = 7,
    Always = 8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerStateDesc {
    /// Packed filter: `min << 4 | mag << 2 | mip`, `0x80` for comparison, `0x55` anisotropic.
    pub filter: u32,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub comparison_func: ComparisonFunc,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Blend {
    Zero = 1,
    One = 2,
    SrcColor = 3,
    InvSrcColor = 4,
    SrcAlpha = 5,
    InvSrcAlpha = 6,
    DestAlpha = 7,
    InvDestAlpha = 8,
    DestColor = 9,
    InvDestColor = 10,
    SrcAlphaSat = 11,
    BlendFactor = 14,
    InvBlendFactor = 15,
    Src1Color = 16,
    InvSrc1Color = 17,
    Src1Alpha = 18,
    InvSrc1Alpha = 19,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NativeBlendOp {
    Add = 1,
    Subtract = 2,
    RevSubtract = 3,
    Min = 4,
    Max = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NativeLogicOp {
    Clear = 0,
    Set = 1,
    Copy = 2,
    CopyInverted = 3,
    Noop = 4,
    Invert = 5,
    And = 6,
    Nand = 7,
    Or = 8,
    Nor = 9,
    Xor = 10,
    Equiv = 11,
    AndReverse = 12,
    AndInverted = 13,
    OrReverse = 14,
    OrInverted = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlendDesc {
    pub blend_enable: bool,
    pub logic_op_enable: bool,
    pub src_blend: Blend,
    pub dest_blend: Blend,
    pub blend_op: NativeBlendOp,
    pub src_blend_alpha: Blend,
    pub dest_blend_alpha: Blend,
    pub blend_op_alpha: NativeBlendOp,
    pub logic_op: NativeLogicOp,
    pub render_target_write_mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDesc {
    pub alpha_to_coverage_enable: bool,
    pub independent_blend_enable: bool,
    pub render_target: [RenderTargetBlendDesc; 8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NativeFillMode {
    Wireframe = 2,
    Solid = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NativeCullMode {
    None = 1,
    Front = 2,
    Back = 3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerStateDesc {
    pub fill_mode: NativeFillMode,
    pub cull_mode: NativeCullMode,
    pub front_counter_clockwise: bool,
    pub depth_bias: i32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub multisample_enable: bool,
    pub antialiased_line_enable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum NativeStencilOp {
    Keep = 1,
    Zero = 2,
    Replace = 3,
    IncrSat = 4,
    DecrSat = 5,
    Invert = 6,
    Incr = 7,
    Decr = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilOpDesc {
    pub stencil_fail_op: NativeStencilOp,
    pub stencil_depth_fail_op: NativeStencilOp,
    pub stencil_pass_op: NativeStencilOp,
    pub stencil_func: ComparisonFunc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilStateDesc {
    pub depth_enable: bool,
    /// `false` is the driver's zero write mask.
    pub depth_write_all: bool,
    pub depth_func: ComparisonFunc,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front_face: DepthStencilOpDesc,
    pub back_face: DepthStencilOpDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputClassification {
    PerVertex,
    PerInstance,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElementDesc {
    pub semantic_name: String,
    pub semantic_index: u32,
    pub format: Format,
    pub input_slot: u32,
    /// `u32::MAX` appends after the previous element.
    pub aligned_byte_offset: u32,
    pub input_slot_class: InputClassification,
    pub instance_data_step_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Event,
    Occlusion,
    Timestamp,
    TimestampDisjoint,
    PipelineStatistics,
    OcclusionPredicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// `[left, right) x [top, bottom) x [front, back)` in texels, or bytes for buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeBox {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}
