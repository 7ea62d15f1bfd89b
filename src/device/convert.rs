// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Translation between abstract descriptions and native creation parameters.
//!
//! Every function here is pure.  Forward translations that can fail return
//! [`Error::InvalidDescriptor`]; reverse translations are total.

use crate::bindings::pipeline::{
    BlendDesc, BlendFactor, BlendOp, CullMode, DepthStencilDesc, FillMode, InputElement, LogicOp,
    RasterizerDesc, StencilFace, StencilOp,
};
use crate::bindings::query::QueryType;
use crate::bindings::resource::{
    BufferDesc, ResourceDesc, ResourceFlags, ResourceType, ResourceViewDesc, ResourceViewType,
    SubresourceBox, TextureDesc,
};
use crate::bindings::sampler::{AddressMode, CompareOp, FilterMode, SamplerDesc};
use crate::bindings::visible_to::{MapAccess, MemoryHeap, ResourceUsage, ShaderStage};
use crate::error::Error;
use crate::imp::{
    self, BindFlags, Blend, BlendStateDesc, ComparisonFunc, CpuAccessFlags, DepthStencilOpDesc,
    DepthStencilStateDesc, InputClassification, InputElementDesc, MapType, MiscFlags, NativeBox,
    NativeBlendOp, NativeCullMode, NativeFillMode, NativeLogicOp, NativeResourceDesc,
    NativeStencilOp, QueryKind, RasterizerStateDesc, Rect, RenderTargetBlendDesc,
    SamplerStateDesc, Stage, TextureAddressMode, Texture1dDesc, Texture2dDesc, Texture3dDesc,
    Usage, ViewDesc, ViewDimension, Viewport,
};
use crate::pixel_formats::Format;

/// Floats per viewport in a flat viewport array.
pub(crate) const VIEWPORT_FLOATS: usize = 6;
/// Ints per rectangle in a flat scissor array.
pub(crate) const RECT_INTS: usize = 4;

pub(crate) fn stage(stage: ShaderStage) -> Option<Stage> {
    Some(match stage {
        ShaderStage::VERTEX => Stage::Vertex,
        ShaderStage::HULL => Stage::Hull,
        ShaderStage::DOMAIN => Stage::Domain,
        ShaderStage::GEOMETRY => Stage::Geometry,
        ShaderStage::PIXEL => Stage::Pixel,
        ShaderStage::COMPUTE => Stage::Compute,
        _ => return None,
    })
}

/// The native stages contained in `stages`, in bind order.
pub(crate) fn stages(stages: ShaderStage) -> impl Iterator<Item = Stage> {
    stages.each().filter_map(stage)
}

pub(crate) fn heap(heap: MemoryHeap, bind: BindFlags) -> Result<(Usage, CpuAccessFlags), Error> {
    Ok(match heap {
        MemoryHeap::Unknown | MemoryHeap::GpuOnly => (Usage::Default, CpuAccessFlags::empty()),
        MemoryHeap::CpuToGpu if bind.is_empty() => (Usage::Staging, CpuAccessFlags::WRITE),
        MemoryHeap::CpuToGpu => {
            if bind.intersects(
                BindFlags::RENDER_TARGET | BindFlags::DEPTH_STENCIL | BindFlags::UNORDERED_ACCESS,
            ) {
                return Err(Error::InvalidDescriptor(
                    "CPU-writable resources cannot be render targets, depth-stencil or unordered-access",
                ));
            }
            (Usage::Dynamic, CpuAccessFlags::WRITE)
        }
        MemoryHeap::GpuToCpu | MemoryHeap::CpuOnly if !bind.is_empty() => {
            return Err(Error::InvalidDescriptor(
                "CPU-readable resources cannot be bound to the pipeline",
            ));
        }
        MemoryHeap::GpuToCpu => (Usage::Staging, CpuAccessFlags::READ),
        MemoryHeap::CpuOnly => (Usage::Staging, CpuAccessFlags::READ | CpuAccessFlags::WRITE),
    })
}

pub(crate) fn heap_from_native(usage: Usage, cpu: CpuAccessFlags) -> MemoryHeap {
    match usage {
        Usage::Default | Usage::Immutable => MemoryHeap::GpuOnly,
        Usage::Dynamic => MemoryHeap::CpuToGpu,
        Usage::Staging if cpu.contains(CpuAccessFlags::READ | CpuAccessFlags::WRITE) => {
            MemoryHeap::CpuOnly
        }
        Usage::Staging if cpu.contains(CpuAccessFlags::READ) => MemoryHeap::GpuToCpu,
        Usage::Staging => MemoryHeap::CpuToGpu,
    }
}

pub(crate) fn bind_flags(usage: ResourceUsage) -> BindFlags {
    let mut bind = BindFlags::empty();
    for (from, to) in [
        (ResourceUsage::VERTEX_BUFFER, BindFlags::VERTEX_BUFFER),
        (ResourceUsage::INDEX_BUFFER, BindFlags::INDEX_BUFFER),
        (ResourceUsage::CONSTANT_BUFFER, BindFlags::CONSTANT_BUFFER),
        (ResourceUsage::STREAM_OUTPUT, BindFlags::STREAM_OUTPUT),
        (ResourceUsage::RENDER_TARGET, BindFlags::RENDER_TARGET),
        (ResourceUsage::DEPTH_STENCIL, BindFlags::DEPTH_STENCIL),
        (ResourceUsage::SHADER_RESOURCE, BindFlags::SHADER_RESOURCE),
        (ResourceUsage::UNORDERED_ACCESS, BindFlags::UNORDERED_ACCESS),
    ] {
        if usage.intersects(from) {
            bind |= to;
        }
    }
    bind
}

pub(crate) fn usage_from_native(bind: BindFlags, misc: MiscFlags) -> ResourceUsage {
    let mut usage = ResourceUsage::empty();
    for (from, to) in [
        (BindFlags::VERTEX_BUFFER, ResourceUsage::VERTEX_BUFFER),
        (BindFlags::INDEX_BUFFER, ResourceUsage::INDEX_BUFFER),
        (BindFlags::CONSTANT_BUFFER, ResourceUsage::CONSTANT_BUFFER),
        (BindFlags::STREAM_OUTPUT, ResourceUsage::STREAM_OUTPUT),
        (BindFlags::RENDER_TARGET, ResourceUsage::RENDER_TARGET),
        (BindFlags::DEPTH_STENCIL, ResourceUsage::DEPTH_STENCIL),
        (BindFlags::SHADER_RESOURCE, ResourceUsage::SHADER_RESOURCE),
        (BindFlags::UNORDERED_ACCESS, ResourceUsage::UNORDERED_ACCESS),
    ] {
        if bind.contains(from) {
            usage |= to;
        }
    }
    if misc.contains(MiscFlags::DRAWINDIRECT_ARGS) {
        usage |= ResourceUsage::INDIRECT_ARGUMENT;
    }
    usage
}

fn misc_flags(desc: &ResourceDesc, bind: BindFlags) -> Result<MiscFlags, Error> {
    let mut misc = MiscFlags::empty();
    if desc.flags.contains(ResourceFlags::SHARED) {
        misc |= MiscFlags::SHARED;
    }
    if desc.flags.contains(ResourceFlags::CUBE_COMPATIBLE) {
        if desc.kind != ResourceType::Texture2d || desc.texture.depth_or_layers % 6 != 0 {
            return Err(Error::InvalidDescriptor(
                "cube-compatible textures need a multiple of six 2D layers",
            ));
        }
        misc |= MiscFlags::TEXTURECUBE;
    }
    if desc.flags.contains(ResourceFlags::GENERATE_MIPMAPS) {
        if !bind.contains(BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE) {
            return Err(Error::InvalidDescriptor(
                "mipmap generation needs render-target and shader-resource usage",
            ));
        }
        misc |= MiscFlags::GENERATE_MIPS;
    }
    if desc.flags.contains(ResourceFlags::STRUCTURED) {
        if desc.buffer.stride == 0 {
            return Err(Error::InvalidDescriptor("structured buffers need a stride"));
        }
        misc |= MiscFlags::BUFFER_STRUCTURED;
    }
    if desc.flags.contains(ResourceFlags::RAW) {
        misc |= MiscFlags::BUFFER_ALLOW_RAW_VIEWS;
    }
    if desc.usage.contains(ResourceUsage::INDIRECT_ARGUMENT) {
        misc |= MiscFlags::DRAWINDIRECT_ARGS;
    }
    Ok(misc)
}

fn full_chain(extent: u32) -> u32 {
    u32::BITS - extent.max(1).leading_zeros()
}

fn is_typeless_depth_family(format: Format) -> bool {
    matches!(
        format,
        Format::R32G8X24Typeless | Format::R32Typeless | Format::R24G8Typeless | Format::R16Typeless
    )
}

/// The native format a texture is created with.
///
/// Depth textures that will also be sampled are created typeless so both view kinds can be
/// made from them.
pub(crate) fn texture_format(format: Format, usage: ResourceUsage) -> Format {
    if format.is_depth_stencil()
        && usage.intersects(ResourceUsage::DEPTH_STENCIL)
        && usage.intersects(ResourceUsage::SHADER_RESOURCE)
    {
        format.to_typeless()
    } else {
        format
    }
}

pub(crate) fn resource_desc(desc: &ResourceDesc) -> Result<NativeResourceDesc, Error> {
    let bind = bind_flags(desc.usage);
    let (usage, cpu_access_flags) = heap(desc.heap, bind)?;
    let misc_flags = misc_flags(desc, bind)?;
    let t = &desc.texture;
    let levels = match t.levels {
        0 => full_chain(t.width.max(t.height)),
        n => n as u32,
    };
    let format = texture_format(t.format, desc.usage);
    if desc.kind != ResourceType::Buffer && t.width == 0 {
        return Err(Error::InvalidDescriptor("texture width is zero"));
    }
    Ok(match desc.kind {
        ResourceType::Unknown => {
            return Err(Error::InvalidDescriptor("resource type is unknown"));
        }
        ResourceType::Buffer => {
            let mut size = desc.buffer.size;
            if bind.contains(BindFlags::CONSTANT_BUFFER) {
                size = size.next_multiple_of(16);
            }
            let byte_width = u32::try_from(size)
                .ok()
                .filter(|s| *s > 0)
                .ok_or(Error::InvalidDescriptor("buffer size must be in 1..=u32::MAX bytes"))?;
            NativeResourceDesc::Buffer(imp::BufferDesc {
                byte_width,
                usage,
                bind_flags: bind,
                cpu_access_flags,
                misc_flags,
                structure_byte_stride: desc.buffer.stride,
            })
        }
        ResourceType::Texture1d => NativeResourceDesc::Texture1d(Texture1dDesc {
            width: t.width,
            mip_levels: levels,
            array_size: t.depth_or_layers.max(1) as u32,
            format,
            usage,
            bind_flags: bind,
            cpu_access_flags,
            misc_flags,
        }),
        ResourceType::Texture2d => NativeResourceDesc::Texture2d(Texture2dDesc {
            width: t.width,
            height: t.height,
            mip_levels: levels,
            array_size: t.depth_or_layers.max(1) as u32,
            format,
            sample_count: t.samples.max(1) as u32,
            sample_quality: 0,
            usage,
            bind_flags: bind,
            cpu_access_flags,
            misc_flags,
        }),
        ResourceType::Texture3d => NativeResourceDesc::Texture3d(Texture3dDesc {
            width: t.width,
            height: t.height,
            depth: t.depth_or_layers.max(1) as u32,
            mip_levels: levels,
            format,
            usage,
            bind_flags: bind,
            cpu_access_flags,
            misc_flags,
        }),
    })
}

pub(crate) fn resource_desc_from_native(desc: &NativeResourceDesc) -> ResourceDesc {
    let format = |format: Format, bind: BindFlags| {
        if bind.contains(BindFlags::DEPTH_STENCIL) && is_typeless_depth_family(format) {
            format.to_depth_stencil()
        } else {
            format
        }
    };
    let flags = |misc: MiscFlags| {
        let mut flags = ResourceFlags::empty();
        for (from, to) in [
            (MiscFlags::SHARED, ResourceFlags::SHARED),
            (MiscFlags::TEXTURECUBE, ResourceFlags::CUBE_COMPATIBLE),
            (MiscFlags::GENERATE_MIPS, ResourceFlags::GENERATE_MIPMAPS),
            (MiscFlags::BUFFER_STRUCTURED, ResourceFlags::STRUCTURED),
            (MiscFlags::BUFFER_ALLOW_RAW_VIEWS, ResourceFlags::RAW),
        ] {
            if misc.contains(from) {
                flags |= to;
            }
        }
        flags
    };
    match *desc {
        NativeResourceDesc::Buffer(d) => ResourceDesc {
            kind: ResourceType::Buffer,
            buffer: BufferDesc {
                size: d.byte_width as u64,
                stride: d.structure_byte_stride,
            },
            texture: TextureDesc::default(),
            heap: heap_from_native(d.usage, d.cpu_access_flags),
            usage: usage_from_native(d.bind_flags, d.misc_flags),
            flags: flags(d.misc_flags),
        },
        NativeResourceDesc::Texture1d(d) => ResourceDesc {
            kind: ResourceType::Texture1d,
            buffer: BufferDesc::default(),
            texture: TextureDesc {
                width: d.width,
                height: 1,
                depth_or_layers: d.array_size as u16,
                levels: d.mip_levels as u16,
                format: format(d.format, d.bind_flags),
                samples: 1,
            },
            heap: heap_from_native(d.usage, d.cpu_access_flags),
            usage: usage_from_native(d.bind_flags, d.misc_flags),
            flags: flags(d.misc_flags),
        },
        NativeResourceDesc::Texture2d(d) => ResourceDesc {
            kind: ResourceType::Texture2d,
            buffer: BufferDesc::default(),
            texture: TextureDesc {
                width: d.width,
                height: d.height,
                depth_or_layers: d.array_size as u16,
                levels: d.mip_levels as u16,
                format: format(d.format, d.bind_flags),
                samples: d.sample_count as u16,
            },
            heap: heap_from_native(d.usage, d.cpu_access_flags),
            usage: usage_from_native(d.bind_flags, d.misc_flags),
            flags: flags(d.misc_flags),
        },
        NativeResourceDesc::Texture3d(d) => ResourceDesc {
            kind: ResourceType::Texture3d,
            buffer: BufferDesc::default(),
            texture: TextureDesc {
                width: d.width,
                height: d.height,
                depth_or_layers: d.depth as u16,
                levels: d.mip_levels as u16,
                format: format(d.format, d.bind_flags),
                samples: 1,
            },
            heap: heap_from_native(d.usage, d.cpu_access_flags),
            usage: usage_from_native(d.bind_flags, d.misc_flags),
            flags: flags(d.misc_flags),
        },
    }
}

pub(crate) fn usage_of(desc: &NativeResourceDesc) -> Usage {
    match desc {
        NativeResourceDesc::Buffer(d) => d.usage,
        NativeResourceDesc::Texture1d(d) => d.usage,
        NativeResourceDesc::Texture2d(d) => d.usage,
        NativeResourceDesc::Texture3d(d) => d.usage,
    }
}

/// Mip levels and array layers of a native resource; buffers have one of each.
pub(crate) fn levels_and_layers(desc: &NativeResourceDesc) -> (u32, u32) {
    match desc {
        NativeResourceDesc::Buffer(_) => (1, 1),
        NativeResourceDesc::Texture1d(d) => (d.mip_levels, d.array_size),
        NativeResourceDesc::Texture2d(d) => (d.mip_levels, d.array_size),
        NativeResourceDesc::Texture3d(d) => (d.mip_levels, 1),
    }
}

/// The full extent of one subresource as a box.
pub(crate) fn subresource_box(desc: &NativeResourceDesc, subresource: u32) -> NativeBox {
    let (levels, _) = levels_and_layers(desc);
    let level = subresource % levels.max(1);
    let (width, height, depth) = match desc {
        NativeResourceDesc::Buffer(d) => (d.byte_width, 1, 1),
        NativeResourceDesc::Texture1d(d) => (d.width, 1, 1),
        NativeResourceDesc::Texture2d(d) => (d.width, d.height, 1),
        NativeResourceDesc::Texture3d(d) => (d.width, d.height, d.depth),
    };
    NativeBox {
        left: 0,
        top: 0,
        front: 0,
        right: (width >> level).max(1),
        bottom: (height >> level).max(1),
        back: (depth >> level).max(1),
    }
}

/// Which view a usage type creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ViewUsage {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
}

impl ViewUsage {
    pub(crate) fn from_usage(usage: ResourceUsage) -> Option<ViewUsage> {
        if usage.is_empty() {
            return None;
        }
        if ResourceUsage::SHADER_RESOURCE.contains(usage) {
            Some(ViewUsage::ShaderResource)
        } else if ResourceUsage::DEPTH_STENCIL.contains(usage) {
            Some(ViewUsage::DepthStencil)
        } else if usage == ResourceUsage::UNORDERED_ACCESS {
            Some(ViewUsage::UnorderedAccess)
        } else if usage == ResourceUsage::RENDER_TARGET {
            Some(ViewUsage::RenderTarget)
        } else {
            None
        }
    }

    pub(crate) fn bind_flag(self) -> BindFlags {
        match self {
            ViewUsage::ShaderResource => BindFlags::SHADER_RESOURCE,
            ViewUsage::UnorderedAccess => BindFlags::UNORDERED_ACCESS,
            ViewUsage::RenderTarget => BindFlags::RENDER_TARGET,
            ViewUsage::DepthStencil => BindFlags::DEPTH_STENCIL,
        }
    }
}

fn view_dimension(kind: ResourceViewType) -> Option<ViewDimension> {
    Some(match kind {
        ResourceViewType::Unknown => return None,
        ResourceViewType::Buffer => ViewDimension::Buffer,
        ResourceViewType::Texture1d => ViewDimension::Texture1d,
        ResourceViewType::Texture1dArray => ViewDimension::Texture1dArray,
        ResourceViewType::Texture2d => ViewDimension::Texture2d,
        ResourceViewType::Texture2dArray => ViewDimension::Texture2dArray,
        ResourceViewType::Texture2dMultisample => ViewDimension::Texture2dMs,
        ResourceViewType::Texture2dMultisampleArray => ViewDimension::Texture2dMsArray,
        ResourceViewType::Texture3d => ViewDimension::Texture3d,
        ResourceViewType::TextureCube => ViewDimension::TextureCube,
        ResourceViewType::TextureCubeArray => ViewDimension::TextureCubeArray,
    })
}

fn default_dimension(resource: &NativeResourceDesc) -> ViewDimension {
    match resource {
        NativeResourceDesc::Buffer(_) => ViewDimension::Buffer,
        NativeResourceDesc::Texture1d(d) if d.array_size > 1 => ViewDimension::Texture1dArray,
        NativeResourceDesc::Texture1d(_) => ViewDimension::Texture1d,
        NativeResourceDesc::Texture2d(d) => match (d.sample_count > 1, d.array_size > 1) {
            (true, true) => ViewDimension::Texture2dMsArray,
            (true, false) => ViewDimension::Texture2dMs,
            (false, true) => ViewDimension::Texture2dArray,
            (false, false) => ViewDimension::Texture2d,
        },
        NativeResourceDesc::Texture3d(_) => ViewDimension::Texture3d,
    }
}

fn dimension_matches(resource: &NativeResourceDesc, dimension: ViewDimension) -> bool {
    use ViewDimension as D;
    match resource {
        NativeResourceDesc::Buffer(_) => dimension == D::Buffer,
        NativeResourceDesc::Texture1d(_) => matches!(dimension, D::Texture1d | D::Texture1dArray),
        NativeResourceDesc::Texture2d(_) => matches!(
            dimension,
            D::Texture2d
                | D::Texture2dArray
                | D::Texture2dMs
                | D::Texture2dMsArray
                | D::TextureCube
                | D::TextureCubeArray
        ),
        NativeResourceDesc::Texture3d(_) => dimension == D::Texture3d,
    }
}

/// Builds the native view parameters for `desc` on `resource`.
pub(crate) fn view_desc(
    resource: &NativeResourceDesc,
    usage: ViewUsage,
    desc: &ResourceViewDesc,
) -> Result<ViewDesc, Error> {
    if !resource.bind_flags().contains(usage.bind_flag()) {
        return Err(Error::InvalidDescriptor(
            "resource was not created with the usage the view needs",
        ));
    }
    let dimension = view_dimension(desc.kind).unwrap_or_else(|| default_dimension(resource));
    if !dimension_matches(resource, dimension) {
        return Err(Error::InvalidDescriptor("view type does not match the resource type"));
    }
    let resource_format = resource.format();
    let mut format = if desc.format == Format::Unknown {
        resource_format
    } else {
        desc.format
    };
    let depth_family = format.to_depth_stencil().is_depth_stencil()
        && resource.bind_flags().contains(BindFlags::DEPTH_STENCIL);
    match usage {
        ViewUsage::DepthStencil => format = format.to_depth_stencil(),
        ViewUsage::ShaderResource if depth_family => format = format.depth_to_shader_resource(),
        _ => {}
    }

    if let NativeResourceDesc::Buffer(b) = resource {
        let element = match format {
            Format::Unknown if b.structure_byte_stride != 0 => b.structure_byte_stride,
            Format::Unknown => 4,
            f => f.bytes_per_block(),
        };
        let total = b.byte_width / element;
        let first = u32::try_from(desc.offset)
            .map_err(|_| Error::InvalidDescriptor("buffer view offset out of range"))?;
        let elements = if desc.size == u64::MAX {
            total.saturating_sub(first)
        } else {
            u32::try_from(desc.size)
                .map_err(|_| Error::InvalidDescriptor("buffer view size out of range"))?
        };
        if elements == 0 || first.saturating_add(elements) > total {
            return Err(Error::InvalidDescriptor("buffer view exceeds the buffer"));
        }
        return Ok(ViewDesc {
            format,
            dimension,
            first_level: 0,
            levels: 1,
            first_layer: 0,
            layers: 1,
            first_element: first,
            elements,
        });
    }

    let (levels, layers) = levels_and_layers(resource);
    if desc.first_level >= levels || desc.first_layer >= layers {
        return Err(Error::InvalidDescriptor("view starts beyond the resource"));
    }
    let view_levels = match desc.levels {
        u32::MAX => levels - desc.first_level,
        n => n,
    };
    let view_layers = match desc.layers {
        u32::MAX => layers - desc.first_layer,
        n => n,
    };
    if view_levels == 0
        || view_layers == 0
        || desc.first_level + view_levels > levels
        || desc.first_layer + view_layers > layers
    {
        return Err(Error::InvalidDescriptor("view exceeds the resource"));
    }
    Ok(ViewDesc {
        format,
        dimension,
        first_level: desc.first_level,
        levels: view_levels,
        first_layer: desc.first_layer,
        layers: view_layers,
        first_element: 0,
        elements: 0,
    })
}

fn filter_bits(mode: FilterMode) -> u32 {
    match mode {
        FilterMode::Point => 0,
        FilterMode::Linear => 1,
    }
}

fn address(mode: AddressMode) -> TextureAddressMode {
    match mode {
        AddressMode::Wrap => TextureAddressMode::Wrap,
        AddressMode::Mirror => TextureAddressMode::Mirror,
        AddressMode::Clamp => TextureAddressMode::Clamp,
        AddressMode::Border => TextureAddressMode::Border,
        AddressMode::MirrorOnce => TextureAddressMode::MirrorOnce,
    }
}

pub(crate) fn compare_op(op: CompareOp) -> ComparisonFunc {
    match op {
        CompareOp::Never => ComparisonFunc::Never,
        CompareOp::Less => ComparisonFunc::Less,
        CompareOp::Equal => ComparisonFunc::Equal,
        CompareOp::LessEqual => ComparisonFunc::LessEqual,
        CompareOp::Greater => ComparisonFunc::Greater,
        CompareOp::NotEqual => ComparisonFunc::NotEqual,
        CompareOp::GreaterEqual => ComparisonFunc::GreaterEqual,
        CompareOp::Always => ComparisonFunc::Always,
    }
}

pub(crate) fn sampler_desc(desc: &SamplerDesc) -> SamplerStateDesc {
    let f = desc.filter;
    let mut filter = if f.anisotropic {
        0x55
    } else {
        filter_bits(f.min) << 4 | filter_bits(f.mag) << 2 | filter_bits(f.mip)
    };
    if f.comparison {
        filter |= 0x80;
    }
    SamplerStateDesc {
        filter,
        address_u: address(desc.address_u),
        address_v: address(desc.address_v),
        address_w: address(desc.address_w),
        mip_lod_bias: desc.mip_lod_bias,
        max_anisotropy: desc.max_anisotropy.clamp(1, 16),
        comparison_func: compare_op(desc.compare_op),
        border_color: desc.border_color,
        min_lod: desc.min_lod,
        max_lod: desc.max_lod,
    }
}

fn blend_factor(factor: BlendFactor) -> Blend {
    match factor {
        BlendFactor::Zero => Blend::Zero,
        BlendFactor::One => Blend::One,
        BlendFactor::SourceColor => Blend::SrcColor,
        BlendFactor::OneMinusSourceColor => Blend::InvSrcColor,
        BlendFactor::DestColor => Blend::DestColor,
        BlendFactor::OneMinusDestColor => Blend::InvDestColor,
        BlendFactor::SourceAlpha => Blend::SrcAlpha,
        BlendFactor::OneMinusSourceAlpha => Blend::InvSrcAlpha,
        BlendFactor::DestAlpha => Blend::DestAlpha,
        BlendFactor::OneMinusDestAlpha => Blend::InvDestAlpha,
        BlendFactor::ConstantColor => Blend::BlendFactor,
        BlendFactor::OneMinusConstantColor => Blend::InvBlendFactor,
        BlendFactor::SourceAlphaSaturate => Blend::SrcAlphaSat,
        BlendFactor::Source1Color => Blend::Src1Color,
        BlendFactor::OneMinusSource1Color => Blend::InvSrc1Color,
        BlendFactor::Source1Alpha => Blend::Src1Alpha,
        BlendFactor::OneMinusSource1Alpha => Blend::InvSrc1Alpha,
    }
}

fn blend_op(op: BlendOp) -> NativeBlendOp {
    match op {
        BlendOp::Add => NativeBlendOp::Add,
        BlendOp::Subtract => NativeBlendOp::Subtract,
        BlendOp::ReverseSubtract => NativeBlendOp::RevSubtract,
        BlendOp::Min => NativeBlendOp::Min,
        BlendOp::Max => NativeBlendOp::Max,
    }
}

fn logic_op(op: LogicOp) -> NativeLogicOp {
    match op {
        LogicOp::Clear => NativeLogicOp::Clear,
        LogicOp::And => NativeLogicOp::And,
        LogicOp::AndReverse => NativeLogicOp::AndReverse,
        LogicOp::Copy => NativeLogicOp::Copy,
        LogicOp::AndInverted => NativeLogicOp::AndInverted,
        LogicOp::Noop => NativeLogicOp::Noop,
        LogicOp::Xor => NativeLogicOp::Xor,
        LogicOp::Or => NativeLogicOp::Or,
        LogicOp::Nor => NativeLogicOp::Nor,
        LogicOp::Equivalent => NativeLogicOp::Equiv,
        LogicOp::Invert => NativeLogicOp::Invert,
        LogicOp::OrReverse => NativeLogicOp::OrReverse,
        LogicOp::CopyInverted => NativeLogicOp::CopyInverted,
        LogicOp::OrInverted => NativeLogicOp::OrInverted,
        LogicOp::Nand => NativeLogicOp::Nand,
        LogicOp::Set => NativeLogicOp::Set,
    }
}

pub(crate) fn blend_desc(desc: &BlendDesc) -> BlendStateDesc {
    let render_target = desc.render_targets.map(|rt| RenderTargetBlendDesc {
        blend_enable: rt.blend_enable,
        logic_op_enable: rt.logic_op_enable,
        src_blend: blend_factor(rt.source_color),
        dest_blend: blend_factor(rt.dest_color),
        blend_op: blend_op(rt.color_op),
        src_blend_alpha: blend_factor(rt.source_alpha),
        dest_blend_alpha: blend_factor(rt.dest_alpha),
        blend_op_alpha: blend_op(rt.alpha_op),
        logic_op: logic_op(rt.logic_op),
        render_target_write_mask: rt.write_mask.bits(),
    });
    BlendStateDesc {
        alpha_to_coverage_enable: desc.alpha_to_coverage_enable,
        independent_blend_enable: render_target.iter().any(|rt| *rt != render_target[0]),
        render_target,
    }
}

pub(crate) fn rasterizer_desc(desc: &RasterizerDesc) -> Result<RasterizerStateDesc, Error> {
    let fill_mode = match desc.fill_mode {
        FillMode::Solid => NativeFillMode::Solid,
        FillMode::Wireframe => NativeFillMode::Wireframe,
        FillMode::Point => return Err(Error::InvalidDescriptor("point fill mode")),
    };
    let cull_mode = match desc.cull_mode {
        CullMode::None => NativeCullMode::None,
        CullMode::Front => NativeCullMode::Front,
        CullMode::Back => NativeCullMode::Back,
        CullMode::FrontAndBack => {
            return Err(Error::InvalidDescriptor("culling both faces"));
        }
    };
    Ok(RasterizerStateDesc {
        fill_mode,
        cull_mode,
        front_counter_clockwise: desc.front_counter_clockwise,
        depth_bias: desc.depth_bias as i32,
        depth_bias_clamp: desc.depth_bias_clamp,
        slope_scaled_depth_bias: desc.slope_scaled_depth_bias,
        depth_clip_enable: desc.depth_clip_enable,
        scissor_enable: desc.scissor_enable,
        multisample_enable: desc.multisample_enable,
        antialiased_line_enable: desc.antialiased_line_enable,
    })
}

fn stencil_op(op: StencilOp) -> NativeStencilOp {
    match op {
        StencilOp::Keep => NativeStencilOp::Keep,
        StencilOp::Zero => NativeStencilOp::Zero,
        StencilOp::Replace => NativeStencilOp::Replace,
        StencilOp::IncrementSaturate => NativeStencilOp::IncrSat,
        StencilOp::DecrementSaturate => NativeStencilOp::DecrSat,
        StencilOp::Invert => NativeStencilOp::Invert,
        StencilOp::Increment => NativeStencilOp::Incr,
        StencilOp::Decrement => NativeStencilOp::Decr,
    }
}

fn stencil_face(face: &StencilFace) -> DepthStencilOpDesc {
    DepthStencilOpDesc {
        stencil_fail_op: stencil_op(face.fail_op),
        stencil_depth_fail_op: stencil_op(face.depth_fail_op),
        stencil_pass_op: stencil_op(face.pass_op),
        stencil_func: compare_op(face.func),
    }
}

pub(crate) fn depth_stencil_desc(desc: &DepthStencilDesc) -> DepthStencilStateDesc {
    DepthStencilStateDesc {
        depth_enable: desc.depth_enable,
        depth_write_all: desc.depth_write_enable,
        depth_func: compare_op(desc.depth_func),
        stencil_enable: desc.stencil_enable,
        stencil_read_mask: desc.stencil_read_mask,
        stencil_write_mask: desc.stencil_write_mask,
        front_face: stencil_face(&desc.front),
        back_face: stencil_face(&desc.back),
    }
}

pub(crate) fn input_layout(elements: &[InputElement]) -> Vec<InputElementDesc> {
    elements
        .iter()
        .map(|e| InputElementDesc {
            semantic_name: e.semantic.clone(),
            semantic_index: e.semantic_index,
            format: e.format,
            input_slot: e.buffer_binding,
            aligned_byte_offset: e.offset,
            input_slot_class: if e.instance_step_rate == 0 {
                InputClassification::PerVertex
            } else {
                InputClassification::PerInstance
            },
            instance_data_step_rate: e.instance_step_rate,
        })
        .collect()
}

pub(crate) fn query_kind(kind: QueryType) -> QueryKind {
    match kind {
        QueryType::Occlusion => QueryKind::Occlusion,
        QueryType::BinaryOcclusion => QueryKind::OcclusionPredicate,
        QueryType::Timestamp => QueryKind::Timestamp,
        QueryType::PipelineStatistics => QueryKind::PipelineStatistics,
    }
}

/// Bytes the driver writes for one result of `kind`.
pub(crate) fn native_result_size(kind: QueryType) -> usize {
    match kind {
        QueryType::BinaryOcclusion => 4,
        other => other.result_size() as usize,
    }
}

/// Dynamic resources cannot be mapped for plain writes; they are discarded instead.
pub(crate) fn map_type(access: MapAccess, usage: Usage) -> MapType {
    match access {
        MapAccess::ReadOnly => MapType::Read,
        MapAccess::WriteOnly if usage == Usage::Dynamic => MapType::WriteDiscard,
        MapAccess::WriteOnly => MapType::Write,
        MapAccess::ReadWrite => MapType::ReadWrite,
        MapAccess::WriteDiscard => MapType::WriteDiscard,
    }
}

pub(crate) fn index_format(index_size: u32) -> Option<Format> {
    match index_size {
        2 => Some(Format::R16Uint),
        4 => Some(Format::R32Uint),
        _ => None,
    }
}

pub(crate) fn viewports(floats: &[f32]) -> Vec<Viewport> {
    floats
        .chunks_exact(VIEWPORT_FLOATS)
        .map(|v| Viewport {
            top_left_x: v[0],
            top_left_y: v[1],
            width: v[2],
            height: v[3],
            min_depth: v[4],
            max_depth: v[5],
        })
        .collect()
}

pub(crate) fn rects(ints: &[i32]) -> Vec<Rect> {
    ints.chunks_exact(RECT_INTS)
        .map(|r| Rect {
            left: r[0],
            top: r[1],
            right: r[2],
            bottom: r[3],
        })
        .collect()
}

pub(crate) fn native_box(b: &SubresourceBox) -> NativeBox {
    NativeBox {
        left: b.left,
        top: b.top,
        front: b.front,
        right: b.right,
        bottom: b.bottom,
        back: b.back,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::pipeline::{ColorWriteMask, RenderTargetBlend};
    use crate::bindings::sampler::Filter;

    #[test]
    fn heap_mapping() {
        assert_eq!(
            heap(MemoryHeap::GpuOnly, BindFlags::SHADER_RESOURCE).unwrap(),
            (Usage::Default, CpuAccessFlags::empty())
        );
        assert_eq!(
            heap(MemoryHeap::CpuToGpu, BindFlags::CONSTANT_BUFFER).unwrap(),
            (Usage::Dynamic, CpuAccessFlags::WRITE)
        );
        assert_eq!(
            heap(MemoryHeap::CpuToGpu, BindFlags::empty()).unwrap(),
            (Usage::Staging, CpuAccessFlags::WRITE)
        );
        assert_eq!(
            heap(MemoryHeap::GpuToCpu, BindFlags::empty()).unwrap(),
            (Usage::Staging, CpuAccessFlags::READ)
        );
        assert!(heap(MemoryHeap::CpuToGpu, BindFlags::RENDER_TARGET).is_err());
        assert!(heap(MemoryHeap::GpuToCpu, BindFlags::SHADER_RESOURCE).is_err());
    }

    #[test]
    fn sampled_depth_is_typeless() {
        let desc = ResourceDesc::texture_2d(
            16,
            16,
            Format::D24UnormS8Uint,
            MemoryHeap::GpuOnly,
            ResourceUsage::DEPTH_STENCIL | ResourceUsage::SHADER_RESOURCE,
        );
        let native = resource_desc(&desc).unwrap();
        assert_eq!(native.format(), Format::R24G8Typeless);
        let back = resource_desc_from_native(&native);
        assert_eq!(back.texture.format, Format::D24UnormS8Uint);
        assert_eq!(back.usage, desc.usage);

        let srv = view_desc(&native, ViewUsage::ShaderResource, &ResourceViewDesc::default()).unwrap();
        assert_eq!(srv.format, Format::R24UnormX8Typeless);
        let dsv = view_desc(&native, ViewUsage::DepthStencil, &ResourceViewDesc::default()).unwrap();
        assert_eq!(dsv.format, Format::D24UnormS8Uint);
    }

    #[test]
    fn reverse_translation_keeps_shape() {
        let mut desc = ResourceDesc::texture_2d(
            64,
            32,
            Format::R8G8B8A8Unorm,
            MemoryHeap::GpuOnly,
            ResourceUsage::RENDER_TARGET | ResourceUsage::SHADER_RESOURCE,
        );
        desc.texture.levels = 0;
        desc.flags = ResourceFlags::GENERATE_MIPMAPS;
        let back = resource_desc_from_native(&resource_desc(&desc).unwrap());
        assert_eq!(back.kind, ResourceType::Texture2d);
        assert_eq!(back.texture.levels, 7);
        assert_eq!(back.heap, MemoryHeap::GpuOnly);
        assert_eq!(back.flags, ResourceFlags::GENERATE_MIPMAPS);
    }

    #[test]
    fn constant_buffers_round_up() {
        let desc = ResourceDesc::buffer(20, MemoryHeap::CpuToGpu, ResourceUsage::CONSTANT_BUFFER);
        let NativeResourceDesc::Buffer(b) = resource_desc(&desc).unwrap() else {
            panic!("expected a buffer");
        };
        assert_eq!(b.byte_width, 32);
    }

    #[test]
    fn view_needs_bind_flag_and_matching_dimension() {
        let desc = ResourceDesc::texture_2d(
            8,
            8,
            Format::R8G8B8A8Unorm,
            MemoryHeap::GpuOnly,
            ResourceUsage::SHADER_RESOURCE,
        );
        let native = resource_desc(&desc).unwrap();
        assert!(matches!(
            view_desc(&native, ViewUsage::RenderTarget, &ResourceViewDesc::default()),
            Err(Error::InvalidDescriptor(_))
        ));
        let buffer_view = ResourceViewDesc {
            kind: ResourceViewType::Buffer,
            ..Default::default()
        };
        assert!(view_desc(&native, ViewUsage::ShaderResource, &buffer_view).is_err());
        let whole = view_desc(&native, ViewUsage::ShaderResource, &ResourceViewDesc::default()).unwrap();
        assert_eq!(whole.dimension, ViewDimension::Texture2d);
        assert_eq!((whole.levels, whole.layers), (1, 1));
    }

    #[test]
    fn view_usage_must_be_one_kind() {
        assert_eq!(
            ViewUsage::from_usage(ResourceUsage::SHADER_RESOURCE_PIXEL),
            Some(ViewUsage::ShaderResource)
        );
        assert_eq!(
            ViewUsage::from_usage(ResourceUsage::DEPTH_STENCIL_READ),
            Some(ViewUsage::DepthStencil)
        );
        assert_eq!(
            ViewUsage::from_usage(ResourceUsage::RENDER_TARGET | ResourceUsage::SHADER_RESOURCE),
            None
        );
    }

    #[test]
    fn sampler_filter_packing() {
        let mut desc = SamplerDesc::default();
        desc.filter = Filter {
            min: FilterMode::Linear,
            mag: FilterMode::Point,
            mip: FilterMode::Linear,
            anisotropic: false,
            comparison: true,
        };
        assert_eq!(sampler_desc(&desc).filter, 0x80 | 0x10 | 0x01);
        desc.filter.anisotropic = true;
        desc.max_anisotropy = 64;
        let native = sampler_desc(&desc);
        assert_eq!(native.filter, 0xD5);
        assert_eq!(native.max_anisotropy, 16);
    }

    #[test]
    fn independent_blend_detected() {
        let mut desc = BlendDesc::default();
        assert!(!blend_desc(&desc).independent_blend_enable);
        desc.render_targets[3] = RenderTargetBlend {
            write_mask: ColorWriteMask::RED,
            ..Default::default()
        };
        let native = blend_desc(&desc);
        assert!(native.independent_blend_enable);
        assert_eq!(native.render_target[3].render_target_write_mask, 1);
    }

    #[test]
    fn flat_viewports_and_rects() {
        let v = viewports(&[0.0, 0.0, 256.0, 128.0, 0.0, 1.0, 9.0]);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].height, 128.0);
        let r = rects(&[1, 2, 3, 4]);
        assert_eq!(r[0].bottom, 4);
    }

    #[test]
    fn index_sizes() {
        assert_eq!(index_format(2), Some(Format::R16Uint));
        assert_eq!(index_format(4), Some(Format::R32Uint));
        assert_eq!(index_format(1), None);
    }

    #[test]
    fn dynamic_write_maps_discard() {
        assert_eq!(map_type(MapAccess::WriteOnly, Usage::Dynamic), MapType::WriteDiscard);
        assert_eq!(map_type(MapAccess::WriteOnly, Usage::Staging), MapType::Write);
    }
}
