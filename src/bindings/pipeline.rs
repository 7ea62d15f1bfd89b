// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pipeline descriptions.
//!
//! A [`PipelineDesc`] describes either an aggregate pipeline (compute or graphics) or a
//! single fragment: a fixed-function state, one shader stage, or an input layout.  The driver has no aggregate pipeline object; the device
//! creates one native object per fragment and the context re-expands them on bind.

use crate::bindings::handles::{PipelineLayout, ShaderModule};
use crate::bindings::visible_to::ShaderStage;
use crate::pixel_formats::Format;

/// Selects what a pipeline handle is bound or destroyed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Compute,
    /// Every graphics fragment at once.
    Graphics,
    BlendState,
    RasterizerState,
    DepthStencilState,
    VertexShader,
    HullShader,
    DomainShader,
    GeometryShader,
    PixelShader,
    InputLayout,
}

/// Bytecode format of a shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderFormat {
    Dxbc,
    Dxil,
    SpirV,
}

/// Primitive assembly mode; values are the driver's topology numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    #[default]
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    LineListAdj,
    LineStripAdj,
    TriangleListAdj,
    TriangleStripAdj,
    /// Patch list with 1..=32 control points.
    PatchList(u8),
}

impl PrimitiveTopology {
    pub const fn raw(self) -> u32 {
        match self {
            PrimitiveTopology::Undefined => 0,
            PrimitiveTopology::PointList => 1,
            PrimitiveTopology::LineList => 2,
            PrimitiveTopology::LineStrip => 3,
            PrimitiveTopology::TriangleList => 4,
            PrimitiveTopology::TriangleStrip => 5,
            PrimitiveTopology::LineListAdj => 10,
            PrimitiveTopology::LineStripAdj => 11,
            PrimitiveTopology::TriangleListAdj => 12,
            PrimitiveTopology::TriangleStripAdj => 13,
            PrimitiveTopology::PatchList(n) => 32 + n as u32,
        }
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => PrimitiveTopology::Undefined,
            1 => PrimitiveTopology::PointList,
            2 => PrimitiveTopology::LineList,
            3 => PrimitiveTopology::LineStrip,
            4 => PrimitiveTopology::TriangleList,
            5 => PrimitiveTopology::TriangleStrip,
            10 => PrimitiveTopology::LineListAdj,
            11 => PrimitiveTopology::LineStripAdj,
            12 => PrimitiveTopology::TriangleListAdj,
            13 => PrimitiveTopology::TriangleStripAdj,
            33..=64 => PrimitiveTopology::PatchList((raw - 32) as u8),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SourceColor,
    OneMinusSourceColor,
    DestColor,
    OneMinusDestColor,
    SourceAlpha,
    OneMinusSourceAlpha,
    DestAlpha,
    OneMinusDestAlpha,
    ConstantColor,
    OneMinusConstantColor,
    SourceAlphaSaturate,
    Source1Color,
    OneMinusSource1Color,
    Source1Alpha,
    OneMinusSource1Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    Clear,
    And,
    AndReverse,
    Copy,
    AndInverted,
    Noop,
    Xor,
    Or,
    Nor,
    Equivalent,
    Invert,
    OrReverse,
    CopyInverted,
    OrInverted,
    Nand,
    Set,
}

bitflags::bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = 0xF;
    }
}

/// Blend configuration of one render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetBlend {
    pub blend_enable: bool,
    pub logic_op_enable: bool,
    pub source_color: BlendFactor,
    pub dest_color: BlendFactor,
    pub color_op: BlendOp,
    pub source_alpha: BlendFactor,
    pub dest_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    pub logic_op: LogicOp,
    pub write_mask: ColorWriteMask,
}

impl Default for RenderTargetBlend {
    fn default() -> Self {
        RenderTargetBlend {
            blend_enable: false,
            logic_op_enable: false,
            source_color: BlendFactor::One,
            dest_color: BlendFactor::Zero,
            color_op: BlendOp::Add,
            source_alpha: BlendFactor::One,
            dest_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
            logic_op: LogicOp::Noop,
            write_mask: ColorWriteMask::ALL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendDesc {
    pub alpha_to_coverage_enable: bool,
    pub render_targets: [RenderTargetBlend; 8],
    pub blend_constant: [f32; 4],
}

impl Default for BlendDesc {
    fn default() -> Self {
        BlendDesc {
            alpha_to_coverage_enable: false,
            render_targets: [RenderTargetBlend::default(); 8],
            blend_constant: [1.0; 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    Wireframe,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerDesc {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_counter_clockwise: bool,
    pub depth_bias: f32,
    pub depth_bias_clamp: f32,
    pub slope_scaled_depth_bias: f32,
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub multisample_enable: bool,
    pub antialiased_line_enable: bool,
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        RasterizerDesc {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: false,
            depth_bias: 0.0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_enable: false,
            multisample_enable: false,
            antialiased_line_enable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrementSaturate,
    DecrementSaturate,
    Invert,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFace {
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub func: crate::bindings::sampler::CompareOp,
}

impl Default for StencilFace {
    fn default() -> Self {
        StencilFace {
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            func: crate::bindings::sampler::CompareOp::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    pub depth_enable: bool,
    pub depth_write_enable: bool,
    pub depth_func: crate::bindings::sampler::CompareOp,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
    pub front: StencilFace,
    pub back: StencilFace,
    /// Applied when the fragment is bound; the driver keeps it outside the state object.
    pub stencil_reference_value: u32,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        DepthStencilDesc {
            depth_enable: true,
            depth_write_enable: true,
            depth_func: crate::bindings::sampler::CompareOp::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front: StencilFace::default(),
            back: StencilFace::default(),
            stencil_reference_value: 0,
        }
    }
}

/// One vertex attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic: String,
    pub semantic_index: u32,
    pub format: Format,
    /// Vertex buffer slot.
    pub buffer_binding: u32,
    /// Byte offset within a vertex; `u32::MAX` appends after the previous element.
    pub offset: u32,
    /// 0 for per-vertex data, otherwise instances per element step.
    pub instance_step_rate: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputePipelineDesc {
    pub shader: ShaderModule,
    pub layout: PipelineLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    pub layout: PipelineLayout,
    pub vertex_shader: ShaderModule,
    /// Null modules leave their stage unbound.
    pub hull_shader: ShaderModule,
    pub domain_shader: ShaderModule,
    pub geometry_shader: ShaderModule,
    pub pixel_shader: ShaderModule,
    pub input_layout: Vec<InputElement>,
    pub blend_state: BlendDesc,
    pub rasterizer_state: RasterizerDesc,
    pub depth_stencil_state: DepthStencilDesc,
    pub topology: PrimitiveTopology,
    pub sample_mask: u32,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        GraphicsPipelineDesc {
            layout: PipelineLayout::default(),
            vertex_shader: ShaderModule::default(),
            hull_shader: ShaderModule::default(),
            domain_shader: ShaderModule::default(),
            geometry_shader: ShaderModule::default(),
            pixel_shader: ShaderModule::default(),
            input_layout: Vec::new(),
            blend_state: BlendDesc::default(),
            rasterizer_state: RasterizerDesc::default(),
            depth_stencil_state: DepthStencilDesc::default(),
            topology: PrimitiveTopology::TriangleList,
            sample_mask: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineDesc {
    Compute(ComputePipelineDesc),
    Graphics(GraphicsPipelineDesc),
    BlendState(BlendDesc),
    RasterizerState(RasterizerDesc),
    DepthStencilState(DepthStencilDesc),
    /// One graphics shader stage; `stage` must be the module's stage.
    Shader {
        stage: ShaderStage,
        module: ShaderModule,
    },
    /// Vertex attributes, validated against the vertex shader's signature.
    InputLayout {
        vertex_shader: ShaderModule,
        elements: Vec<InputElement>,
    },
}

impl PipelineDesc {
    /// The type a pipeline created from this description is bound as.
    ///
    /// `None` for a shader fragment whose `stage` is not exactly one graphics stage.
    pub fn pipeline_type(&self) -> Option<PipelineType> {
        Some(match self {
            PipelineDesc::Compute(_) => PipelineType::Compute,
            PipelineDesc::Graphics(_) => PipelineType::Graphics,
            PipelineDesc::BlendState(_) => PipelineType::BlendState,
            PipelineDesc::RasterizerState(_) => PipelineType::RasterizerState,
            PipelineDesc::DepthStencilState(_) => PipelineType::DepthStencilState,
            PipelineDesc::Shader { stage, .. } => PipelineType::for_stage(*stage)?,
            PipelineDesc::InputLayout { .. } => PipelineType::InputLayout,
        })
    }
}

impl PipelineType {
    /// The shader-fragment type for exactly one stage.
    pub fn for_stage(stage: ShaderStage) -> Option<PipelineType> {
        Some(match stage {
            ShaderStage::VERTEX => PipelineType::VertexShader,
            ShaderStage::HULL => PipelineType::HullShader,
            ShaderStage::DOMAIN => PipelineType::DomainShader,
            ShaderStage::GEOMETRY => PipelineType::GeometryShader,
            ShaderStage::PIXEL => PipelineType::PixelShader,
            ShaderStage::COMPUTE => PipelineType::Compute,
            _ => return None,
        })
    }

    /// Stages whose descriptor slots a bind of this type addresses.
    pub fn stages(self) -> ShaderStage {
        match self {
            PipelineType::Compute => ShaderStage::COMPUTE,
            PipelineType::Graphics => ShaderStage::ALL_GRAPHICS,
            PipelineType::VertexShader => ShaderStage::VERTEX,
            PipelineType::HullShader => ShaderStage::HULL,
            PipelineType::DomainShader => ShaderStage::DOMAIN,
            PipelineType::GeometryShader => ShaderStage::GEOMETRY,
            PipelineType::PixelShader => ShaderStage::PIXEL,
            PipelineType::BlendState
            | PipelineType::RasterizerState
            | PipelineType::DepthStencilState
            | PipelineType::InputLayout => ShaderStage::empty(),
        }
    }
}

/// State that can be changed without rebinding a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DynamicState {
    /// Value is a [`PrimitiveTopology::raw`] number.
    PrimitiveTopology,
    /// Value is packed `0xAABBGGRR`.
    BlendConstant,
    SampleMask,
    StencilReferenceValue,
    StencilReadMask,
    StencilWriteMask,
    DepthBias,
    CullMode,
    FillMode,
}

/// Unpacks a `0xAABBGGRR` color into normalized floats.
pub fn unpack_color(packed: u32) -> [f32; 4] {
    [
        (packed & 0xFF) as f32 / 255.0,
        ((packed >> 8) & 0xFF) as f32 / 255.0,
        ((packed >> 16) & 0xFF) as f32 / 255.0,
        ((packed >> 24) & 0xFF) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_numbers() {
        assert_eq!(PrimitiveTopology::TriangleList.raw(), 4);
        assert_eq!(PrimitiveTopology::PatchList(3).raw(), 35);
        assert_eq!(
            PrimitiveTopology::from_raw(35),
            Some(PrimitiveTopology::PatchList(3))
        );
        assert_eq!(PrimitiveTopology::from_raw(6), None);
    }

    #[test]
    fn fragment_types() {
        assert_eq!(
            PipelineType::for_stage(ShaderStage::PIXEL),
            Some(PipelineType::PixelShader)
        );
        assert_eq!(PipelineType::for_stage(ShaderStage::ALL_GRAPHICS), None);
        assert!(PipelineType::Graphics.stages().contains(ShaderStage::HULL));
        assert!(PipelineType::BlendState.stages().is_empty());
    }

    #[test]
    fn packed_color() {
        assert_eq!(unpack_color(0xFF00_00FF), [1.0, 0.0, 0.0, 1.0]);
    }
}
