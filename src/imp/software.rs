// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
An in-memory slot-binding driver.

[`SoftwareDevice`] implements [`NativeDevice`] on host memory.  It validates creation parameters
the way the hardware runtime does, executes clears, copies, maps and uploads, and keeps the
immediate context's bound state so it can be inspected.  It does not rasterize: draws and
dispatches are recorded and counted but write nothing.

`SoftwareDevice` is a cheap handle to shared state.  Keep a clone to inspect the driver after
handing a boxed copy to [`crate::device::Device::new`]:

```
use slotbound::imp::software::SoftwareDevice;
use slotbound::{Config, Device};

let probe = SoftwareDevice::new();
let device = Device::new(Box::new(probe.clone()), Config::default());
assert_eq!(probe.live_objects(), 0);
# drop(device);
```

Identical sampler, blend, rasterizer and depth-stencil descriptions share one native object,
as they do on hardware.
*/

mod calls;
mod memory;
mod state;
mod texels;

pub use calls::Call;
pub use state::{
    IndexBufferBinding, OutputMergerBlend, OutputMergerDepthStencil, PipelineState, StageSlots,
    VertexBufferBinding,
};

use crate::imp::{
    BindFlags, BlendStateDesc, BufferDesc, ClearFlags, ContextKind, CpuAccessFlags,
    DepthStencilStateDesc, FeatureLevel, FormatSupport, InputElementDesc, MapType, Mapped,
    NativeBox, NativeContext, NativeDevice, NativeError, NativeObject, NativeOptions,
    NativeResourceDesc, QueryKind, RasterizerStateDesc, Rect, SamplerStateDesc, Stage,
    SubresourceInit, Texture1dDesc, Texture2dDesc, Texture3dDesc, Usage, ViewDesc, ViewDimension,
    Viewport,
};
use crate::pixel_formats::Format;
use memory::Memory;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DXBC_MAGIC: &[u8; 4] = b"DXBC";
/// Largest resource the driver will allocate.
const MAX_RESOURCE_BYTES: usize = 1 << 31;
const TIMESTAMP_FREQUENCY: u64 = 1_000_000_000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ShaderResource,
    UnorderedAccess,
    RenderTarget,
    DepthStencil,
}

impl ViewKind {
    fn bind_flag(self) -> BindFlags {
        match self {
            ViewKind::ShaderResource => BindFlags::SHADER_RESOURCE,
            ViewKind::UnorderedAccess => BindFlags::UNORDERED_ACCESS,
            ViewKind::RenderTarget => BindFlags::RENDER_TARGET,
            ViewKind::DepthStencil => BindFlags::DEPTH_STENCIL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum QueryStatus {
    Idle,
    Running { vertices: u64 },
    Done([u64; 11]),
}

#[derive(Debug)]
enum Object {
    Resource(Memory),
    View {
        kind: ViewKind,
        resource: NativeObject,
        desc: ViewDesc,
    },
    Sampler(SamplerStateDesc),
    Shader {
        stage: Stage,
    },
    InputLayout(Vec<InputElementDesc>),
    BlendState(BlendStateDesc),
    RasterizerState(RasterizerStateDesc),
    DepthStencilState(DepthStencilStateDesc),
    Query {
        kind: QueryKind,
        status: QueryStatus,
    },
    /// Recorded calls, plus a reference on every object they use.
    CommandList {
        calls: Vec<Call>,
        held: Vec<NativeObject>,
    },
}

#[derive(Debug)]
struct Entry {
    refs: u32,
    name: Option<String>,
    object: Object,
}

#[derive(Debug)]
struct Shared {
    feature_level: FeatureLevel,
    options: NativeOptions,
    annotations: AtomicBool,
    next_id: AtomicU64,
    objects: Mutex<HashMap<NativeObject, Entry>>,
    immediate: Mutex<PipelineState>,
    immediate_taken: AtomicBool,
    calls: Mutex<Vec<Call>>,
    clock: AtomicU64,
    vertices: AtomicU64,
}

/// The software driver's device.  Clones share one driver.
#[derive(Debug, Clone)]
pub struct SoftwareDevice {
    shared: Arc<Shared>,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareDevice {
    /// A feature level 11.0 device with annotations and no optional features.
    pub fn new() -> Self {
        Self::with_features(FeatureLevel::L11_0, NativeOptions::default())
    }

    pub fn with_features(feature_level: FeatureLevel, options: NativeOptions) -> Self {
        SoftwareDevice {
            shared: Arc::new(Shared {
                feature_level,
                options,
                annotations: AtomicBool::new(true),
                next_id: AtomicU64::new(0),
                objects: Mutex::new(HashMap::new()),
                immediate: Mutex::new(PipelineState::default()),
                immediate_taken: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
                clock: AtomicU64::new(0),
                vertices: AtomicU64::new(0),
            }),
        }
    }

    /// Toggles the annotation interface.
    pub fn set_annotations(&self, enabled: bool) {
        self.shared.annotations.store(enabled, Ordering::Relaxed);
    }

    /// A snapshot of the immediate context's bound state.
    pub fn pipeline_state(&self) -> PipelineState {
        lock(&self.shared.immediate).clone()
    }

    /// Every call the immediate context has executed, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.shared.calls).clone()
    }

    /// Returns and forgets the executed calls.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *lock(&self.shared.calls))
    }

    /// The bytes of one subresource, tightly packed by row.
    pub fn contents(&self, resource: NativeObject, subresource: u32) -> Option<Vec<u8>> {
        let objects = lock(&self.shared.objects);
        let Object::Resource(memory) = &objects.get(&resource)?.object else {
            return None;
        };
        let surface = memory.surfaces.get(subresource as usize)?;
        Some(surface.read_region(memory.texel(), &surface.full_box()))
    }

    pub fn live_objects(&self) -> usize {
        lock(&self.shared.objects).len()
    }

    /// The object's reference count, or 0 once it was freed.
    pub fn ref_count(&self, object: NativeObject) -> u32 {
        lock(&self.shared.objects)
            .get(&object)
            .map_or(0, |e| e.refs)
    }

    pub fn debug_name(&self, object: NativeObject) -> Option<String> {
        lock(&self.shared.objects)
            .get(&object)
            .and_then(|e| e.name.clone())
    }

    /// The resource a view was created on.
    pub fn view_resource(&self, view: NativeObject) -> Option<NativeObject> {
        match lock(&self.shared.objects).get(&view)?.object {
            Object::View { resource, .. } => Some(resource),
            _ => None,
        }
    }

    pub fn blend_state_desc(&self, state: NativeObject) -> Option<BlendStateDesc> {
        match lock(&self.shared.objects).get(&state)?.object {
            Object::BlendState(desc) => Some(desc),
            _ => None,
        }
    }

    pub fn input_layout_elements(&self, layout: NativeObject) -> Option<Vec<InputElementDesc>> {
        match &lock(&self.shared.objects).get(&layout)?.object {
            Object::InputLayout(elements) => Some(elements.clone()),
            _ => None,
        }
    }

    pub fn shader_stage(&self, shader: NativeObject) -> Option<Stage> {
        match lock(&self.shared.objects).get(&shader)?.object {
            Object::Shader { stage } => Some(stage),
            _ => None,
        }
    }

    /// Adds a reference to a live object.  Returns false for unknown objects.
    fn retain(&self, object: NativeObject) -> bool {
        match lock(&self.shared.objects).get_mut(&object) {
            Some(entry) => {
                entry.refs += 1;
                true
            }
            None => false,
        }
    }

    fn insert(&self, object: Object) -> NativeObject {
        let raw = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let id = NativeObject(NonZeroU64::MIN.saturating_add(raw));
        lock(&self.shared.objects).insert(
            id,
            Entry {
                refs: 1,
                name: None,
                object,
            },
        );
        id
    }

    /// Returns an existing state object equal to `object`, or inserts it.
    fn insert_state(&self, object: Object, same: impl Fn(&Object) -> bool) -> NativeObject {
        {
            let mut objects = lock(&self.shared.objects);
            if let Some((id, entry)) = objects.iter_mut().find(|(_, e)| same(&e.object)) {
                entry.refs += 1;
                return *id;
            }
        }
        self.insert(object)
    }

    fn create_texture(
        &self,
        desc: NativeResourceDesc,
        initial: &[SubresourceInit<'_>],
    ) -> Result<NativeObject, NativeError> {
        let (format, usage, bind, cpu, dimension_bit) = match &desc {
            NativeResourceDesc::Texture1d(d) => {
                (d.format, d.usage, d.bind_flags, d.cpu_access_flags, FormatSupport::TEXTURE1D)
            }
            NativeResourceDesc::Texture2d(d) => {
                (d.format, d.usage, d.bind_flags, d.cpu_access_flags, FormatSupport::TEXTURE2D)
            }
            NativeResourceDesc::Texture3d(d) => {
                (d.format, d.usage, d.bind_flags, d.cpu_access_flags, FormatSupport::TEXTURE3D)
            }
            NativeResourceDesc::Buffer(_) => return Err(NativeError::InvalidArg),
        };
        let support = format_support(format);
        if !support.contains(dimension_bit) {
            return Err(NativeError::UnsupportedFormat(format));
        }
        let typeless = format.is_typeless();
        if bind.contains(BindFlags::RENDER_TARGET)
            && !(support.contains(FormatSupport::RENDER_TARGET) || typeless)
        {
            return Err(NativeError::UnsupportedFormat(format));
        }
        if bind.contains(BindFlags::DEPTH_STENCIL) && !format.to_depth_stencil().is_depth_stencil() {
            return Err(NativeError::UnsupportedFormat(format));
        }
        if bind.contains(BindFlags::UNORDERED_ACCESS)
            && !(support.contains(FormatSupport::TYPED_UNORDERED_ACCESS_VIEW) || typeless)
        {
            return Err(NativeError::UnsupportedFormat(format));
        }
        validate_usage(usage, bind, cpu, !initial.is_empty())?;
        let desc = with_full_mip_chain(desc)?;
        let mut memory = Memory::new(desc);
        if memory.surfaces.is_empty() {
            return Err(NativeError::InvalidArg);
        }
        if memory.byte_size() > MAX_RESOURCE_BYTES {
            return Err(NativeError::OutOfMemory);
        }
        if usage == Usage::Immutable && initial.len() < memory.surfaces.len() {
            return Err(NativeError::InvalidArg);
        }
        memory.initialize(initial);
        Ok(self.insert(Object::Resource(memory)))
    }

    fn create_view(
        &self,
        kind: ViewKind,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError> {
        let desc = {
            let objects = lock(&self.shared.objects);
            let Some(Entry {
                object: Object::Resource(memory),
                ..
            }) = objects.get(&resource)
            else {
                return Err(NativeError::InvalidArg);
            };
            validate_view(kind, memory, desc)?
        };
        self.add_ref(resource);
        Ok(self.insert(Object::View {
            kind,
            resource,
            desc,
        }))
    }
}

/// Checks a usage against its bind and CPU-access flags.
fn validate_usage(
    usage: Usage,
    bind: BindFlags,
    cpu: CpuAccessFlags,
    has_initial: bool,
) -> Result<(), NativeError> {
    let ok = match usage {
        Usage::Default => cpu.is_empty(),
        Usage::Immutable => {
            cpu.is_empty() && has_initial && !bind.contains(BindFlags::UNORDERED_ACCESS)
        }
        Usage::Dynamic => {
            cpu == CpuAccessFlags::WRITE
                && !bind.intersects(
                    BindFlags::UNORDERED_ACCESS | BindFlags::RENDER_TARGET | BindFlags::DEPTH_STENCIL,
                )
        }
        Usage::Staging => bind.is_empty() && !cpu.is_empty(),
    };
    if ok { Ok(()) } else { Err(NativeError::InvalidArg) }
}

fn full_chain(extent: u32) -> u32 {
    u32::BITS - extent.max(1).leading_zeros()
}

/// Replaces a zero mip count with the full chain and rejects zero extents.
fn with_full_mip_chain(desc: NativeResourceDesc) -> Result<NativeResourceDesc, NativeError> {
    Ok(match desc {
        NativeResourceDesc::Texture1d(mut d) => {
            if d.width == 0 || d.array_size == 0 {
                return Err(NativeError::InvalidArg);
            }
            if d.mip_levels == 0 {
                d.mip_levels = full_chain(d.width);
            }
            NativeResourceDesc::Texture1d(d)
        }
        NativeResourceDesc::Texture2d(mut d) => {
            if d.width == 0 || d.height == 0 || d.array_size == 0 || d.sample_count == 0 {
                return Err(NativeError::InvalidArg);
            }
            if d.mip_levels == 0 {
                d.mip_levels = full_chain(d.width.max(d.height));
            }
            if d.sample_count > 1 && d.mip_levels != 1 {
                return Err(NativeError::InvalidArg);
            }
            NativeResourceDesc::Texture2d(d)
        }
        NativeResourceDesc::Texture3d(mut d) => {
            if d.width == 0 || d.height == 0 || d.depth == 0 {
                return Err(NativeError::InvalidArg);
            }
            if d.mip_levels == 0 {
                d.mip_levels = full_chain(d.width.max(d.height).max(d.depth));
            }
            NativeResourceDesc::Texture3d(d)
        }
        other => other,
    })
}

fn validate_view(kind: ViewKind, memory: &Memory, desc: &ViewDesc) -> Result<ViewDesc, NativeError> {
    if !memory.desc.bind_flags().contains(kind.bind_flag()) {
        return Err(NativeError::InvalidArg);
    }
    let resource_format = memory.desc.format();
    let mut desc = *desc;
    if desc.format == Format::Unknown {
        // typeless resources need an explicit view format; raw buffer views keep Unknown
        if resource_format.is_typeless() {
            return Err(NativeError::InvalidArg);
        }
        desc.format = resource_format;
    }
    if resource_format != Format::Unknown
        && desc.format.to_typeless() != resource_format.to_typeless()
    {
        return Err(NativeError::UnsupportedFormat(desc.format));
    }
    if (kind == ViewKind::DepthStencil) != desc.format.is_depth_stencil() {
        return Err(NativeError::UnsupportedFormat(desc.format));
    }
    let dimension_ok = match memory.desc {
        NativeResourceDesc::Buffer(_) => desc.dimension == ViewDimension::Buffer,
        NativeResourceDesc::Texture1d(_) => matches!(
            desc.dimension,
            ViewDimension::Texture1d | ViewDimension::Texture1dArray
        ),
        NativeResourceDesc::Texture2d(d) => match desc.dimension {
            ViewDimension::Texture2d | ViewDimension::Texture2dArray => true,
            ViewDimension::Texture2dMs | ViewDimension::Texture2dMsArray => d.sample_count > 1,
            ViewDimension::TextureCube | ViewDimension::TextureCubeArray => {
                kind == ViewKind::ShaderResource && d.array_size % 6 == 0
            }
            _ => false,
        },
        NativeResourceDesc::Texture3d(_) => desc.dimension == ViewDimension::Texture3d,
    };
    if !dimension_ok {
        return Err(NativeError::InvalidArg);
    }
    if desc.dimension != ViewDimension::Buffer && desc.first_level >= memory.levels {
        return Err(NativeError::InvalidArg);
    }
    Ok(desc)
}

/// What the driver can do with each format.
fn format_support(format: Format) -> FormatSupport {
    use FormatSupport as S;
    if format == Format::Unknown {
        return S::BUFFER;
    }
    let textures = S::TEXTURE1D | S::TEXTURE2D | S::TEXTURE3D | S::TEXTURECUBE | S::MIP | S::CPU_LOCKABLE;
    if format.is_compressed() {
        return (textures - S::TEXTURE1D) | S::SHADER_LOAD | S::SHADER_SAMPLE;
    }
    if format.is_depth_stencil() {
        return S::TEXTURE2D | S::TEXTURECUBE | S::MIP | S::DEPTH_STENCIL;
    }
    if format.is_typeless() {
        return textures;
    }
    let mut support = textures | S::BUFFER | S::SHADER_LOAD | S::IA_VERTEX_BUFFER;
    if texels::encode_color(format, [0.0; 4]).is_some() {
        support |= S::SHADER_SAMPLE
            | S::RENDER_TARGET
            | S::BLENDABLE
            | S::MIP_AUTOGEN
            | S::MULTISAMPLE_RENDERTARGET
            | S::MULTISAMPLE_RESOLVE;
    }
    if matches!(format, Format::R16Uint | Format::R32Uint) {
        support |= S::IA_INDEX_BUFFER;
        support -= S::BLENDABLE;
    }
    if matches!(
        format,
        Format::R32Float | Format::R32Uint | Format::R32Sint | Format::R32G32B32A32Float
            | Format::R32G32B32A32Uint | Format::R16G16B16A16Float | Format::R8G8B8A8Unorm
    ) {
        support |= S::TYPED_UNORDERED_ACCESS_VIEW;
    }
    support
}

fn is_dxbc(bytecode: &[u8]) -> bool {
    bytecode.len() > DXBC_MAGIC.len() && bytecode.starts_with(DXBC_MAGIC)
}

impl NativeDevice for SoftwareDevice {
    fn feature_level(&self) -> FeatureLevel {
        self.shared.feature_level
    }

    fn options(&self) -> NativeOptions {
        self.shared.options
    }

    fn format_support(&self, format: Format) -> FormatSupport {
        format_support(format)
    }

    fn supports_annotations(&self) -> bool {
        self.shared.annotations.load(Ordering::Relaxed)
    }

    fn immediate_context(&self) -> Result<Box<dyn NativeContext>, NativeError> {
        if self.shared.immediate_taken.swap(true, Ordering::AcqRel) {
            return Err(NativeError::Unsupported);
        }
        Ok(Box::new(SoftwareContext {
            device: self.clone(),
            kind: ContextKind::Immediate,
            recorded: Vec::new(),
            held: Vec::new(),
            pending_maps: HashMap::new(),
        }))
    }

    fn create_deferred_context(&self) -> Result<Box<dyn NativeContext>, NativeError> {
        Ok(Box::new(SoftwareContext {
            device: self.clone(),
            kind: ContextKind::Deferred,
            recorded: Vec::new(),
            held: Vec::new(),
            pending_maps: HashMap::new(),
        }))
    }

    fn create_buffer(
        &self,
        desc: &BufferDesc,
        initial: Option<&SubresourceInit<'_>>,
    ) -> Result<NativeObject, NativeError> {
        if desc.byte_width == 0 {
            return Err(NativeError::InvalidArg);
        }
        if desc.byte_width as usize > MAX_RESOURCE_BYTES {
            return Err(NativeError::OutOfMemory);
        }
        validate_usage(desc.usage, desc.bind_flags, desc.cpu_access_flags, initial.is_some())?;
        if desc.bind_flags.contains(BindFlags::CONSTANT_BUFFER)
            && (desc.byte_width % 16 != 0 || desc.bind_flags != BindFlags::CONSTANT_BUFFER)
        {
            return Err(NativeError::InvalidArg);
        }
        if desc.misc_flags.contains(crate::imp::MiscFlags::BUFFER_STRUCTURED)
            && desc.structure_byte_stride == 0
        {
            return Err(NativeError::InvalidArg);
        }
        let mut memory = Memory::new(NativeResourceDesc::Buffer(*desc));
        if let Some(init) = initial {
            memory.initialize(std::slice::from_ref(init));
        }
        Ok(self.insert(Object::Resource(memory)))
    }

    fn create_texture_1d(
        &self,
        desc: &Texture1dDesc,
        initial: &[SubresourceInit<'_>],
    ) -> Result<NativeObject, NativeError> {
        self.create_texture(NativeResourceDesc::Texture1d(*desc), initial)
    }

    fn create_texture_2d(
        &self,
        desc: &Texture2dDesc,
        initial: &[SubresourceInit<'_>],
    ) -> Result<NativeObject, NativeError> {
        self.create_texture(NativeResourceDesc::Texture2d(*desc), initial)
    }

    fn create_texture_3d(
        &self,
        desc: &Texture3dDesc,
        initial: &[SubresourceInit<'_>],
    ) -> Result<NativeObject, NativeError> {
        self.create_texture(NativeResourceDesc::Texture3d(*desc), initial)
    }

    fn create_shader_resource_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError> {
        self.create_view(ViewKind::ShaderResource, resource, desc)
    }

    fn create_unordered_access_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError> {
        self.create_view(ViewKind::UnorderedAccess, resource, desc)
    }

    fn create_render_target_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError> {
        self.create_view(ViewKind::RenderTarget, resource, desc)
    }

    fn create_depth_stencil_view(
        &self,
        resource: NativeObject,
        desc: &ViewDesc,
    ) -> Result<NativeObject, NativeError> {
        self.create_view(ViewKind::DepthStencil, resource, desc)
    }

    fn create_sampler(&self, desc: &SamplerStateDesc) -> Result<NativeObject, NativeError> {
        if desc.max_anisotropy > 16 || desc.min_lod > desc.max_lod {
            return Err(NativeError::InvalidArg);
        }
        let desc = *desc;
        Ok(self.insert_state(Object::Sampler(desc), |o| {
            matches!(o, Object::Sampler(d) if *d == desc)
        }))
    }

    fn create_shader(&self, stage: Stage, bytecode: &[u8]) -> Result<NativeObject, NativeError> {
        if !is_dxbc(bytecode) {
            return Err(NativeError::InvalidArg);
        }
        Ok(self.insert(Object::Shader { stage }))
    }

    fn create_input_layout(
        &self,
        elements: &[InputElementDesc],
        vertex_bytecode: &[u8],
    ) -> Result<NativeObject, NativeError> {
        if elements.is_empty() || !is_dxbc(vertex_bytecode) {
            return Err(NativeError::InvalidArg);
        }
        if let Some(bad) = elements
            .iter()
            .find(|e| !format_support(e.format).contains(FormatSupport::IA_VERTEX_BUFFER))
        {
            return Err(NativeError::UnsupportedFormat(bad.format));
        }
        Ok(self.insert(Object::InputLayout(elements.to_vec())))
    }

    fn create_blend_state(&self, desc: &BlendStateDesc) -> Result<NativeObject, NativeError> {
        for rt in &desc.render_target {
            if rt.logic_op_enable && (rt.blend_enable || !self.shared.options.output_merger_logic_op) {
                return Err(NativeError::InvalidArg);
            }
        }
        let desc = *desc;
        Ok(self.insert_state(Object::BlendState(desc), |o| {
            matches!(o, Object::BlendState(d) if *d == desc)
        }))
    }

    fn create_rasterizer_state(
        &self,
        desc: &RasterizerStateDesc,
    ) -> Result<NativeObject, NativeError> {
        let desc = *desc;
        Ok(self.insert_state(Object::RasterizerState(desc), |o| {
            matches!(o, Object::RasterizerState(d) if *d == desc)
        }))
    }

    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilStateDesc,
    ) -> Result<NativeObject, NativeError> {
        let desc = *desc;
        Ok(self.insert_state(Object::DepthStencilState(desc), |o| {
            matches!(o, Object::DepthStencilState(d) if *d == desc)
        }))
    }

    fn create_query(&self, kind: QueryKind) -> Result<NativeObject, NativeError> {
        Ok(self.insert(Object::Query {
            kind,
            status: QueryStatus::Idle,
        }))
    }

    fn add_ref(&self, object: NativeObject) {
        self.retain(object);
    }

    fn release(&self, object: NativeObject) {
        let freed = {
            let mut objects = lock(&self.shared.objects);
            let Some(entry) = objects.get_mut(&object) else {
                logwise::warn_sync!(
                    "software driver: release of unknown object {id}",
                    id = object.raw()
                );
                return;
            };
            entry.refs -= 1;
            if entry.refs > 0 {
                return;
            }
            objects.remove(&object)
        };
        lock(&self.shared.immediate).forget(object);
        match freed.map(|entry| entry.object) {
            Some(Object::View { resource, .. }) => self.release(resource),
            Some(Object::CommandList { held, .. }) => {
                for object in held {
                    self.release(object);
                }
            }
            _ => {}
        }
    }

    fn set_private_name(&self, object: NativeObject, name: &str) {
        if let Some(entry) = lock(&self.shared.objects).get_mut(&object) {
            entry.name = Some(name.to_owned());
        }
    }

    fn map(
        &self,
        resource: NativeObject,
        subresource: u32,
        map_type: MapType,
    ) -> Result<Mapped, NativeError> {
        let mut objects = lock(&self.shared.objects);
        let Some(Entry {
            object: Object::Resource(memory),
            ..
        }) = objects.get_mut(&resource)
        else {
            return Err(NativeError::InvalidArg);
        };
        let (usage, cpu) = match memory.desc {
            NativeResourceDesc::Buffer(d) => (d.usage, d.cpu_access_flags),
            NativeResourceDesc::Texture1d(d) => (d.usage, d.cpu_access_flags),
            NativeResourceDesc::Texture2d(d) => (d.usage, d.cpu_access_flags),
            NativeResourceDesc::Texture3d(d) => (d.usage, d.cpu_access_flags),
        };
        let allowed = match map_type {
            MapType::Read => cpu.contains(CpuAccessFlags::READ) && usage == Usage::Staging,
            MapType::Write => cpu.contains(CpuAccessFlags::WRITE) && usage == Usage::Staging,
            MapType::ReadWrite => {
                cpu.contains(CpuAccessFlags::READ | CpuAccessFlags::WRITE) && usage == Usage::Staging
            }
            MapType::WriteDiscard | MapType::WriteNoOverwrite => usage == Usage::Dynamic,
        };
        if !allowed {
            return Err(NativeError::InvalidArg);
        }
        let Some(surface) = memory.surfaces.get_mut(subresource as usize) else {
            return Err(NativeError::InvalidArg);
        };
        if surface.mapped {
            return Err(NativeError::InvalidArg);
        }
        surface.mapped = true;
        Ok(Mapped {
            data: surface.data.as_mut_ptr(),
            len: surface.data.len(),
            row_pitch: surface.row_pitch,
            depth_pitch: surface.depth_pitch,
        })
    }

    fn unmap(&self, resource: NativeObject, subresource: u32) {
        let mut objects = lock(&self.shared.objects);
        if let Some(Entry {
            object: Object::Resource(memory),
            ..
        }) = objects.get_mut(&resource)
            && let Some(surface) = memory.surfaces.get_mut(subresource as usize)
        {
            surface.mapped = false;
        }
    }

    fn update_subresource(
        &self,
        resource: NativeObject,
        subresource: u32,
        dst_box: Option<&NativeBox>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    ) {
        self.shared.execute(Call::UpdateSubresource {
            dst: resource,
            dst_subresource: subresource,
            dst_box: dst_box.copied(),
            data: data.to_vec(),
            row_pitch,
            depth_pitch,
        });
    }

    fn get_query_data(&self, query: NativeObject, out: &mut [u8]) -> Result<(), NativeError> {
        let objects = lock(&self.shared.objects);
        let Some(Entry {
            object: Object::Query { kind, status },
            ..
        }) = objects.get(&query)
        else {
            return Err(NativeError::InvalidArg);
        };
        let QueryStatus::Done(words) = status else {
            return Err(NativeError::WasStillDrawing);
        };
        let size = match kind {
            QueryKind::Event | QueryKind::OcclusionPredicate => 4,
            QueryKind::Occlusion | QueryKind::Timestamp => 8,
            QueryKind::TimestampDisjoint => 16,
            QueryKind::PipelineStatistics => 88,
        };
        let bytes: &[u8] = bytemuck::cast_slice(words);
        match out.get_mut(..size) {
            Some(out) => {
                out.copy_from_slice(&bytes[..size]);
                Ok(())
            }
            None => Err(NativeError::InvalidArg),
        }
    }
}

impl Shared {
    fn execute(&self, call: Call) {
        if call.is_state() {
            self.apply_state(&call);
        } else {
            self.perform(&call);
        }
        let nested = match &call {
            Call::ExecuteCommandList(list) => match &lock(&self.objects).get(list).map(|e| &e.object)
            {
                Some(Object::CommandList { calls, .. }) => calls.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        lock(&self.calls).push(call);
        for call in nested {
            self.execute(call);
        }
    }

    fn apply_state(&self, call: &Call) {
        let mut state = lock(&self.immediate);
        match call {
            Call::SetInputLayout(layout) => state.input_layout = *layout,
            Call::SetPrimitiveTopology(topology) => state.topology = *topology,
            Call::SetVertexBuffers {
                first,
                buffers,
                strides,
                offsets,
            } => state.set_vertex_buffers(*first, buffers, strides, offsets),
            Call::SetIndexBuffer {
                buffer,
                format,
                offset,
            } => {
                state.index_buffer = Some(IndexBufferBinding {
                    buffer: *buffer,
                    format: *format,
                    offset: *offset,
                })
            }
            Call::SetShader(stage, shader) => state.stage_mut(*stage).shader = *shader,
            Call::SetShaderResources(stage, first, views) => {
                state.stage_mut(*stage).set_shader_resources(*first, views)
            }
            Call::SetSamplers(stage, first, samplers) => {
                state.stage_mut(*stage).set_samplers(*first, samplers)
            }
            Call::SetConstantBuffers(stage, first, buffers) => {
                state.stage_mut(*stage).set_constant_buffers(*first, buffers)
            }
            Call::SetUnorderedAccessViews(stage, first, views) => {
                if matches!(stage, Stage::Pixel | Stage::Compute) {
                    state.stage_mut(*stage).set_unordered_access_views(*first, views)
                }
            }
            Call::SetRasterizerState(rs) => state.rasterizer = *rs,
            Call::SetViewports(viewports) => state.viewports = viewports.clone(),
            Call::SetScissorRects(rects) => state.scissor_rects = rects.clone(),
            Call::SetBlendState {
                state: blend,
                blend_factor,
                sample_mask,
            } => {
                state.blend = OutputMergerBlend {
                    state: *blend,
                    blend_factor: *blend_factor,
                    sample_mask: *sample_mask,
                }
            }
            Call::SetDepthStencilState {
                state: ds,
                stencil_ref,
            } => {
                state.depth_stencil = OutputMergerDepthStencil {
                    state: *ds,
                    stencil_ref: *stencil_ref,
                }
            }
            Call::SetRenderTargets { rtvs, dsv } => state.set_render_targets(rtvs, *dsv),
            _ => {}
        }
    }

    fn perform(&self, call: &Call) {
        match call {
            Call::DrawInstanced {
                vertices, instances, ..
            } => {
                self.vertices
                    .fetch_add(*vertices as u64 * *instances as u64, Ordering::Relaxed);
            }
            Call::DrawIndexedInstanced {
                indices, instances, ..
            } => {
                self.vertices
                    .fetch_add(*indices as u64 * *instances as u64, Ordering::Relaxed);
            }
            Call::DrawInstancedIndirect(buffer, offset)
            | Call::DrawIndexedInstancedIndirect(buffer, offset) => {
                // both argument layouts start with a per-instance count and an instance count
                if let Some(args) = self.read_buffer(*buffer, *offset as usize, 8) {
                    let words: [u32; 2] = [
                        u32::from_le_bytes([args[0], args[1], args[2], args[3]]),
                        u32::from_le_bytes([args[4], args[5], args[6], args[7]]),
                    ];
                    self.vertices
                        .fetch_add(words[0] as u64 * words[1] as u64, Ordering::Relaxed);
                }
            }
            Call::CopyResource { dst, src } => self.copy_resource(*dst, *src),
            Call::CopySubresourceRegion {
                dst,
                dst_subresource,
                dst_offset,
                src,
                src_subresource,
                src_box,
            } => self.copy_region(
                *dst,
                *dst_subresource,
                *dst_offset,
                *src,
                *src_subresource,
                src_box.as_ref(),
            ),
            Call::ResolveSubresource {
                dst,
                dst_subresource,
                src,
                src_subresource,
                ..
            } => self.copy_region(*dst, *dst_subresource, [0; 3], *src, *src_subresource, None),
            Call::UpdateSubresource {
                dst,
                dst_subresource,
                dst_box,
                data,
                row_pitch,
                depth_pitch,
            } => {
                let mut objects = lock(&self.objects);
                if let Some(Entry {
                    object: Object::Resource(memory),
                    ..
                }) = objects.get_mut(dst)
                {
                    let texel = memory.texel();
                    if let Some(surface) = memory.surfaces.get_mut(*dst_subresource as usize) {
                        let region = dst_box.unwrap_or_else(|| surface.full_box());
                        let row_pitch = if *row_pitch == 0 { data.len() as u32 } else { *row_pitch };
                        surface.write_region(texel, &region, data, row_pitch, *depth_pitch);
                    }
                }
            }
            Call::GenerateMips(srv) => self.generate_mips(*srv),
            Call::ClearRenderTargetView(rtv, color) => {
                self.clear_view(*rtv, ViewKind::RenderTarget, |format| {
                    texels::encode_color(format, *color).map(|p| (p, None))
                })
            }
            Call::ClearDepthStencilView {
                dsv,
                flags,
                depth,
                stencil,
            } => self.clear_view(*dsv, ViewKind::DepthStencil, |format| {
                texels::encode_depth_stencil(
                    format,
                    flags.contains(ClearFlags::DEPTH).then_some(*depth),
                    flags.contains(ClearFlags::STENCIL).then_some(*stencil),
                )
                .map(|(p, m)| (p, Some(m)))
            }),
            Call::ClearUnorderedAccessViewUint(uav, values) => {
                self.clear_view(*uav, ViewKind::UnorderedAccess, |format| {
                    if format == Format::Unknown {
                        Some((values[0].to_le_bytes().to_vec(), None))
                    } else {
                        texels::encode_uint(format, *values).map(|p| (p, None))
                    }
                })
            }
            Call::ClearUnorderedAccessViewFloat(uav, values) => {
                self.clear_view(*uav, ViewKind::UnorderedAccess, |format| {
                    texels::encode_color(format, *values).map(|p| (p, None))
                })
            }
            Call::BeginQuery(query) => {
                let vertices = self.vertices.load(Ordering::Relaxed);
                if let Some(Entry {
                    object: Object::Query { kind, status },
                    ..
                }) = lock(&self.objects).get_mut(query)
                {
                    if matches!(kind, QueryKind::Timestamp) {
                        logwise::warn_sync!("software driver: begin on a timestamp query");
                    } else {
                        *status = QueryStatus::Running { vertices };
                    }
                }
            }
            Call::EndQuery(query) => {
                let vertices = self.vertices.load(Ordering::Relaxed);
                let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(Entry {
                    object: Object::Query { kind, status },
                    ..
                }) = lock(&self.objects).get_mut(query)
                {
                    let mut words = [0u64; 11];
                    match (kind, *status) {
                        (QueryKind::Timestamp, _) => words[0] = tick,
                        (QueryKind::Event, _) => words[0] = 1,
                        (QueryKind::TimestampDisjoint, QueryStatus::Running { .. }) => {
                            words[0] = TIMESTAMP_FREQUENCY;
                        }
                        (QueryKind::PipelineStatistics, QueryStatus::Running { vertices: start }) => {
                            // input-assembler vertices and vertex shader invocations
                            words[0] = vertices - start;
                            words[2] = vertices - start;
                        }
                        (QueryKind::Occlusion | QueryKind::OcclusionPredicate, QueryStatus::Running { .. }) => {}
                        _ => {
                            logwise::warn_sync!("software driver: end without begin");
                            return;
                        }
                    }
                    *status = QueryStatus::Done(words);
                }
            }
            _ => {}
        }
    }

    fn read_buffer(&self, buffer: NativeObject, offset: usize, len: usize) -> Option<Vec<u8>> {
        let objects = lock(&self.objects);
        let Object::Resource(memory) = &objects.get(&buffer)?.object else {
            return None;
        };
        memory.surfaces.first()?.data.get(offset..offset + len).map(<[u8]>::to_vec)
    }

    fn copy_resource(&self, dst: NativeObject, src: NativeObject) {
        let mut objects = lock(&self.objects);
        let source = match objects.get(&src).map(|e| &e.object) {
            Some(Object::Resource(memory)) => memory.clone(),
            _ => return,
        };
        if let Some(Entry {
            object: Object::Resource(target),
            ..
        }) = objects.get_mut(&dst)
        {
            if !target.same_shape(&source) {
                logwise::warn_sync!("software driver: copy_resource between mismatched resources");
                return;
            }
            for (d, s) in target.surfaces.iter_mut().zip(source.surfaces) {
                d.data = s.data;
            }
        }
    }

    fn copy_region(
        &self,
        dst: NativeObject,
        dst_subresource: u32,
        dst_offset: [u32; 3],
        src: NativeObject,
        src_subresource: u32,
        src_box: Option<&NativeBox>,
    ) {
        let mut objects = lock(&self.objects);
        let (texel, region, bytes) = match objects.get(&src).map(|e| &e.object) {
            Some(Object::Resource(memory)) => {
                let Some(surface) = memory.surfaces.get(src_subresource as usize) else {
                    return;
                };
                let region = src_box.copied().unwrap_or_else(|| surface.full_box());
                if region.right > surface.width
                    || region.bottom > surface.height
                    || region.back > surface.depth
                {
                    logwise::warn_sync!("software driver: copy source box out of bounds");
                    return;
                }
                (memory.texel(), region, surface.read_region(memory.texel(), &region))
            }
            _ => return,
        };
        let Some(Entry {
            object: Object::Resource(target),
            ..
        }) = objects.get_mut(&dst)
        else {
            return;
        };
        if target.texel() != texel {
            logwise::warn_sync!("software driver: copy between incompatible formats");
            return;
        }
        let Some(surface) = target.surfaces.get_mut(dst_subresource as usize) else {
            return;
        };
        let [x, y, z] = dst_offset;
        let dst_box = NativeBox {
            left: x,
            top: y,
            front: z,
            right: x + (region.right - region.left),
            bottom: y + (region.bottom - region.top),
            back: z + (region.back - region.front),
        };
        if dst_box.right > surface.width || dst_box.bottom > surface.height || dst_box.back > surface.depth {
            logwise::warn_sync!("software driver: copy destination out of bounds");
            return;
        }
        let row_pitch = (region.right - region.left).div_ceil(texel.block) * texel.bytes;
        let depth_pitch = row_pitch * (region.bottom - region.top).div_ceil(texel.block);
        surface.write_region(texel, &dst_box, &bytes, row_pitch, depth_pitch);
    }

    fn generate_mips(&self, srv: NativeObject) {
        let mut objects = lock(&self.objects);
        let (resource, desc) = match objects.get(&srv).map(|e| &e.object) {
            Some(Object::View {
                kind: ViewKind::ShaderResource,
                resource,
                desc,
            }) => (*resource, *desc),
            _ => return,
        };
        let Some(Entry {
            object: Object::Resource(memory),
            ..
        }) = objects.get_mut(&resource)
        else {
            return;
        };
        let levels = memory.levels;
        let layers = memory.surfaces.len() as u32 / levels.max(1);
        let last_level = desc.first_level.saturating_add(desc.levels).min(levels);
        let last_layer = desc.first_layer.saturating_add(desc.layers).min(layers);
        for layer in desc.first_layer..last_layer {
            for level in desc.first_level + 1..last_level {
                memory.downsample((level + layer * levels) as usize);
            }
        }
    }

    /// Fills every subresource a view covers with the pattern `encode` returns for its format.
    fn clear_view(
        &self,
        view: NativeObject,
        expected: ViewKind,
        encode: impl FnOnce(Format) -> Option<(Vec<u8>, Option<Vec<bool>>)>,
    ) {
        let mut objects = lock(&self.objects);
        let (resource, desc) = match objects.get(&view).map(|e| &e.object) {
            Some(Object::View {
                kind,
                resource,
                desc,
            }) if *kind == expected => (*resource, *desc),
            _ => {
                logwise::warn_sync!("software driver: clear through a view of the wrong kind");
                return;
            }
        };
        let Some((pattern, mask)) = encode(desc.format) else {
            logwise::warn_sync!(
                "software driver: cannot clear format {format}",
                format = logwise::privacy::LogIt(&desc.format)
            );
            return;
        };
        let Some(Entry {
            object: Object::Resource(memory),
            ..
        }) = objects.get_mut(&resource)
        else {
            return;
        };
        if desc.dimension == ViewDimension::Buffer {
            let start = desc.first_element as usize * pattern.len();
            let end = start + desc.elements as usize * pattern.len();
            if let Some(bytes) = memory.surfaces[0].data.get_mut(start..end) {
                for element in bytes.chunks_exact_mut(pattern.len()) {
                    element.copy_from_slice(&pattern);
                }
            }
            return;
        }
        let levels = memory.levels;
        let layers = memory.surfaces.len() as u32 / levels.max(1);
        let last_layer = desc.first_layer.saturating_add(desc.layers).min(layers);
        for layer in desc.first_layer..last_layer {
            if let Some(surface) = memory
                .surfaces
                .get_mut((desc.first_level + layer * levels) as usize)
            {
                surface.fill(&pattern, mask.as_deref());
            }
        }
    }
}

/// A software context.  The immediate context executes calls as they arrive; deferred contexts
/// record them into command lists.
#[derive(Debug)]
pub struct SoftwareContext {
    device: SoftwareDevice,
    kind: ContextKind,
    recorded: Vec<Call>,
    /// References taken by recorded calls; they move to the command list on finish.
    held: Vec<NativeObject>,
    /// Deferred maps; their contents are recorded as uploads on unmap.
    pending_maps: HashMap<(NativeObject, u32), Vec<u8>>,
}

impl SoftwareContext {
    fn submit(&mut self, call: Call) {
        match self.kind {
            ContextKind::Immediate => self.device.shared.execute(call),
            ContextKind::Deferred => {
                for object in call.objects() {
                    if self.device.retain(object) {
                        self.held.push(object);
                    }
                }
                self.recorded.push(call);
            }
        }
    }

    fn annotations(&self) -> bool {
        self.device.shared.annotations.load(Ordering::Relaxed)
    }
}

impl Drop for SoftwareContext {
    fn drop(&mut self) {
        for object in std::mem::take(&mut self.held) {
            self.device.release(object);
        }
        if self.kind == ContextKind::Immediate {
            self.device.shared.immediate_taken.store(false, Ordering::Release);
        }
    }
}

impl NativeContext for SoftwareContext {
    fn kind(&self) -> ContextKind {
        self.kind
    }

    fn ia_set_input_layout(&mut self, layout: Option<NativeObject>) {
        self.submit(Call::SetInputLayout(layout));
    }

    fn ia_set_primitive_topology(&mut self, topology: u32) {
        self.submit(Call::SetPrimitiveTopology(topology));
    }

    fn ia_set_vertex_buffers(
        &mut self,
        first: u32,
        buffers: &[Option<NativeObject>],
        strides: &[u32],
        offsets: &[u32],
    ) {
        self.submit(Call::SetVertexBuffers {
            first,
            buffers: buffers.to_vec(),
            strides: strides.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn ia_set_index_buffer(&mut self, buffer: Option<NativeObject>, format: Format, offset: u32) {
        self.submit(Call::SetIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    fn set_shader(&mut self, stage: Stage, shader: Option<NativeObject>) {
        self.submit(Call::SetShader(stage, shader));
    }

    fn set_shader_resources(&mut self, stage: Stage, first: u32, views: &[Option<NativeObject>]) {
        self.submit(Call::SetShaderResources(stage, first, views.to_vec()));
    }

    fn set_samplers(&mut self, stage: Stage, first: u32, samplers: &[Option<NativeObject>]) {
        self.submit(Call::SetSamplers(stage, first, samplers.to_vec()));
    }

    fn set_constant_buffers(&mut self, stage: Stage, first: u32, buffers: &[Option<NativeObject>]) {
        self.submit(Call::SetConstantBuffers(stage, first, buffers.to_vec()));
    }

    fn set_unordered_access_views(
        &mut self,
        stage: Stage,
        first: u32,
        views: &[Option<NativeObject>],
    ) {
        self.submit(Call::SetUnorderedAccessViews(stage, first, views.to_vec()));
    }

    fn rs_set_state(&mut self, state: Option<NativeObject>) {
        self.submit(Call::SetRasterizerState(state));
    }

    fn rs_set_viewports(&mut self, viewports: &[Viewport]) {
        self.submit(Call::SetViewports(viewports.to_vec()));
    }

    fn rs_set_scissor_rects(&mut self, rects: &[Rect]) {
        self.submit(Call::SetScissorRects(rects.to_vec()));
    }

    fn om_set_blend_state(
        &mut self,
        state: Option<NativeObject>,
        blend_factor: [f32; 4],
        sample_mask: u32,
    ) {
        self.submit(Call::SetBlendState {
            state,
            blend_factor,
            sample_mask,
        });
    }

    fn om_set_depth_stencil_state(&mut self, state: Option<NativeObject>, stencil_ref: u32) {
        self.submit(Call::SetDepthStencilState { state, stencil_ref });
    }

    fn om_set_render_targets(&mut self, rtvs: &[Option<NativeObject>], dsv: Option<NativeObject>) {
        self.submit(Call::SetRenderTargets {
            rtvs: rtvs.to_vec(),
            dsv,
        });
    }

    fn draw_instanced(
        &mut self,
        vertices: u32,
        instances: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.submit(Call::DrawInstanced {
            vertices,
            instances,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed_instanced(
        &mut self,
        indices: u32,
        instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.submit(Call::DrawIndexedInstanced {
            indices,
            instances,
            first_index,
            vertex_offset,
            first_instance,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.submit(Call::Dispatch(x, y, z));
    }

    fn draw_instanced_indirect(&mut self, buffer: NativeObject, offset: u32) {
        self.submit(Call::DrawInstancedIndirect(buffer, offset));
    }

    fn draw_indexed_instanced_indirect(&mut self, buffer: NativeObject, offset: u32) {
        self.submit(Call::DrawIndexedInstancedIndirect(buffer, offset));
    }

    fn dispatch_indirect(&mut self, buffer: NativeObject, offset: u32) {
        self.submit(Call::DispatchIndirect(buffer, offset));
    }

    fn copy_resource(&mut self, dst: NativeObject, src: NativeObject) {
        self.submit(Call::CopyResource { dst, src });
    }

    fn copy_subresource_region(
        &mut self,
        dst: NativeObject,
        dst_subresource: u32,
        dst_offset: [u32; 3],
        src: NativeObject,
        src_subresource: u32,
        src_box: Option<&NativeBox>,
    ) {
        self.submit(Call::CopySubresourceRegion {
            dst,
            dst_subresource,
            dst_offset,
            src,
            src_subresource,
            src_box: src_box.copied(),
        });
    }

    fn resolve_subresource(
        &mut self,
        dst: NativeObject,
        dst_subresource: u32,
        src: NativeObject,
        src_subresource: u32,
        format: Format,
    ) {
        self.submit(Call::ResolveSubresource {
            dst,
            dst_subresource,
            src,
            src_subresource,
            format,
        });
    }

    fn update_subresource(
        &mut self,
        dst: NativeObject,
        dst_subresource: u32,
        dst_box: Option<&NativeBox>,
        data: &[u8],
        row_pitch: u32,
        depth_pitch: u32,
    ) {
        self.submit(Call::UpdateSubresource {
            dst,
            dst_subresource,
            dst_box: dst_box.copied(),
            data: data.to_vec(),
            row_pitch,
            depth_pitch,
        });
    }

    fn generate_mips(&mut self, srv: NativeObject) {
        self.submit(Call::GenerateMips(srv));
    }

    fn map(
        &mut self,
        resource: NativeObject,
        subresource: u32,
        map_type: MapType,
    ) -> Result<Mapped, NativeError> {
        if self.kind == ContextKind::Immediate {
            return self.device.map(resource, subresource, map_type);
        }
        if map_type != MapType::WriteDiscard {
            return Err(NativeError::InvalidArg);
        }
        let (len, row_pitch, depth_pitch) = {
            let objects = lock(&self.device.shared.objects);
            match objects.get(&resource).map(|e| &e.object) {
                Some(Object::Resource(memory)) => {
                    let surface = memory
                        .surfaces
                        .get(subresource as usize)
                        .ok_or(NativeError::InvalidArg)?;
                    (surface.data.len(), surface.row_pitch, surface.depth_pitch)
                }
                _ => return Err(NativeError::InvalidArg),
            }
        };
        let scratch = self
            .pending_maps
            .entry((resource, subresource))
            .or_insert_with(|| vec![0; len]);
        Ok(Mapped {
            data: scratch.as_mut_ptr(),
            len,
            row_pitch,
            depth_pitch,
        })
    }

    fn unmap(&mut self, resource: NativeObject, subresource: u32) {
        if self.kind == ContextKind::Immediate {
            self.device.unmap(resource, subresource);
            return;
        }
        if let Some(data) = self.pending_maps.remove(&(resource, subresource)) {
            self.submit(Call::UpdateSubresource {
                dst: resource,
                dst_subresource: subresource,
                dst_box: None,
                row_pitch: data.len() as u32,
                depth_pitch: data.len() as u32,
                data,
            });
        }
    }

    fn clear_render_target_view(&mut self, rtv: NativeObject, color: [f32; 4]) {
        self.submit(Call::ClearRenderTargetView(rtv, color));
    }

    fn clear_depth_stencil_view(
        &mut self,
        dsv: NativeObject,
        flags: ClearFlags,
        depth: f32,
        stencil: u8,
    ) {
        self.submit(Call::ClearDepthStencilView {
            dsv,
            flags,
            depth,
            stencil,
        });
    }

    fn clear_unordered_access_view_uint(&mut self, uav: NativeObject, values: [u32; 4]) {
        self.submit(Call::ClearUnorderedAccessViewUint(uav, values));
    }

    fn clear_unordered_access_view_float(&mut self, uav: NativeObject, values: [f32; 4]) {
        self.submit(Call::ClearUnorderedAccessViewFloat(uav, values));
    }

    fn begin_query(&mut self, query: NativeObject) {
        self.submit(Call::BeginQuery(query));
    }

    fn end_query(&mut self, query: NativeObject) {
        self.submit(Call::EndQuery(query));
    }

    fn begin_event(&mut self, label: &str) {
        if self.annotations() {
            self.submit(Call::BeginEvent(label.to_owned()));
        }
    }

    fn end_event(&mut self) {
        if self.annotations() {
            self.submit(Call::EndEvent);
        }
    }

    fn set_marker(&mut self, label: &str) {
        if self.annotations() {
            self.submit(Call::SetMarker(label.to_owned()));
        }
    }

    fn flush(&mut self) {
        self.submit(Call::Flush);
    }

    fn finish_command_list(&mut self) -> Result<NativeObject, NativeError> {
        if self.kind != ContextKind::Deferred {
            return Err(NativeError::Unsupported);
        }
        let calls = std::mem::take(&mut self.recorded);
        let held = std::mem::take(&mut self.held);
        Ok(self.device.insert(Object::CommandList { calls, held }))
    }

    fn execute_command_list(&mut self, list: NativeObject) {
        self.submit(Call::ExecuteCommandList(list));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::MiscFlags;

    fn render_target(device: &SoftwareDevice, width: u32, height: u32) -> NativeObject {
        device
            .create_texture_2d(
                &Texture2dDesc {
                    width,
                    height,
                    mip_levels: 1,
                    array_size: 1,
                    format: Format::R8G8B8A8Unorm,
                    sample_count: 1,
                    sample_quality: 0,
                    usage: Usage::Default,
                    bind_flags: BindFlags::RENDER_TARGET | BindFlags::SHADER_RESOURCE,
                    cpu_access_flags: CpuAccessFlags::empty(),
                    misc_flags: MiscFlags::empty(),
                },
                &[],
            )
            .unwrap()
    }

    fn view_desc(format: Format) -> ViewDesc {
        ViewDesc {
            format,
            dimension: ViewDimension::Texture2d,
            first_level: 0,
            levels: 1,
            first_layer: 0,
            layers: 1,
            first_element: 0,
            elements: 0,
        }
    }

    #[test]
    fn clear_writes_every_texel() {
        let device = SoftwareDevice::new();
        let texture = render_target(&device, 4, 4);
        let rtv = device
            .create_render_target_view(texture, &view_desc(Format::Unknown))
            .unwrap();
        let mut context = device.immediate_context().unwrap();
        context.clear_render_target_view(rtv, [1.0, 0.0, 0.0, 1.0]);
        let contents = device.contents(texture, 0).unwrap();
        assert!(contents.chunks(4).all(|t| t == [255, 0, 0, 255]));
    }

    #[test]
    fn only_one_immediate_context_at_a_time() {
        let device = SoftwareDevice::new();
        let first = device.immediate_context().unwrap();
        assert_eq!(device.immediate_context().unwrap_err(), NativeError::Unsupported);
        drop(first);
        assert!(device.immediate_context().is_ok());
    }

    #[test]
    fn views_keep_their_resource_alive() {
        let device = SoftwareDevice::new();
        let texture = render_target(&device, 2, 2);
        let srv = device
            .create_shader_resource_view(texture, &view_desc(Format::Unknown))
            .unwrap();
        device.release(texture);
        assert_eq!(device.ref_count(texture), 1);
        device.release(srv);
        assert_eq!(device.live_objects(), 0);
    }

    #[test]
    fn state_objects_are_shared() {
        let device = SoftwareDevice::new();
        let desc = RasterizerStateDesc {
            fill_mode: crate::imp::NativeFillMode::Solid,
            cull_mode: crate::imp::NativeCullMode::Back,
            front_counter_clockwise: false,
            depth_bias: 0,
            depth_bias_clamp: 0.0,
            slope_scaled_depth_bias: 0.0,
            depth_clip_enable: true,
            scissor_enable: false,
            multisample_enable: false,
            antialiased_line_enable: false,
        };
        let a = device.create_rasterizer_state(&desc).unwrap();
        let b = device.create_rasterizer_state(&desc).unwrap();
        assert_eq!(a, b);
        assert_eq!(device.ref_count(a), 2);
    }

    #[test]
    fn deferred_calls_run_on_execute() {
        let device = SoftwareDevice::new();
        let mut immediate = device.immediate_context().unwrap();
        let mut deferred = device.create_deferred_context().unwrap();
        deferred.ia_set_primitive_topology(4);
        let list = deferred.finish_command_list().unwrap();
        assert_eq!(device.pipeline_state().topology, 0);
        immediate.execute_command_list(list);
        assert_eq!(device.pipeline_state().topology, 4);
    }

    #[test]
    fn staging_maps_only_for_the_cpu() {
        let device = SoftwareDevice::new();
        let texture = render_target(&device, 1, 1);
        assert_eq!(
            device.map(texture, 0, MapType::Read).unwrap_err(),
            NativeError::InvalidArg
        );
    }

    #[test]
    fn timestamps_increase() {
        let device = SoftwareDevice::new();
        let mut context = device.immediate_context().unwrap();
        let a = device.create_query(QueryKind::Timestamp).unwrap();
        let b = device.create_query(QueryKind::Timestamp).unwrap();
        let mut out = [0u8; 8];
        assert_eq!(device.get_query_data(a, &mut out), Err(NativeError::WasStillDrawing));
        context.end_query(a);
        context.end_query(b);
        device.get_query_data(a, &mut out).unwrap();
        let first = u64::from_le_bytes(out);
        device.get_query_data(b, &mut out).unwrap();
        assert!(u64::from_le_bytes(out) > first);
    }
}
