// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Shader modules and pipelines.

The driver has no pipeline object.  A graphics pipeline is stored as the set of native
objects it was decomposed into (input layout, shader stages, rasterizer, blend and
depth-stencil states) and re-expanded into one native bind per fragment when it is bound.
Creation is all-or-nothing: if any fragment fails, the ones already created are released.

Fragment pipelines (a lone blend state, a lone pixel shader, ...) are the same thing with a
single populated fragment, so binding fragments one by one reaches the same native state as
binding the aggregate.
*/

use crate::bindings::handles::{Pipeline, PipelineLayout, ShaderModule};
use crate::bindings::pipeline::{
    BlendDesc, ComputePipelineDesc, DepthStencilDesc, GraphicsPipelineDesc, InputElement,
    PipelineDesc, PipelineType, PrimitiveTopology, RasterizerDesc, ShaderFormat,
};
use crate::bindings::visible_to::ShaderStage;
use crate::device::{Device, DeviceCaps, convert};
use crate::error::Error;
use crate::imp::{NativeContext, NativeDevice, NativeObject, Stage};
use logwise::privacy::LogIt;
use slotmap::Key;
use std::sync::Arc;

const GRAPHICS_STAGES: [Stage; 5] = [
    Stage::Vertex,
    Stage::Hull,
    Stage::Domain,
    Stage::Geometry,
    Stage::Pixel,
];

#[derive(Debug, Clone)]
pub(crate) struct ShaderModuleRecord {
    pub native: NativeObject,
    pub stage: Stage,
    /// Vertex shaders keep their bytecode; input layouts are validated against it.
    pub bytecode: Option<Arc<[u8]>>,
}

/// The output-merger state a context last issued.
///
/// Blend factor and sample mask travel with the blend state, and the stencil reference with
/// the depth-stencil state, so overriding one of them re-issues the whole call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OutputMergerState {
    pub blend: Option<NativeObject>,
    pub blend_constant: [f32; 4],
    pub sample_mask: u32,
    pub depth_stencil: Option<NativeObject>,
    pub stencil_ref: u32,
}

impl Default for OutputMergerState {
    fn default() -> Self {
        OutputMergerState {
            blend: None,
            blend_constant: [1.0; 4],
            sample_mask: u32::MAX,
            depth_stencil: None,
            stencil_ref: 0,
        }
    }
}

impl OutputMergerState {
    pub fn issue_blend(&self, ctx: &mut dyn NativeContext) {
        ctx.om_set_blend_state(self.blend, self.blend_constant, self.sample_mask);
    }

    pub fn issue_depth_stencil(&self, ctx: &mut dyn NativeContext) {
        ctx.om_set_depth_stencil_state(self.depth_stencil, self.stencil_ref);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BlendFragment {
    pub state: NativeObject,
    pub blend_constant: [f32; 4],
    pub sample_mask: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DepthStencilFragment {
    pub state: NativeObject,
    pub stencil_ref: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GraphicsPipeline {
    pub input_layout: Option<NativeObject>,
    pub topology: PrimitiveTopology,
    /// Indexed by [`Stage::index`].
    pub shaders: [Option<NativeObject>; 5],
    pub rasterizer: NativeObject,
    pub blend: BlendFragment,
    pub depth_stencil: DepthStencilFragment,
}

/// What a pipeline handle holds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PipelineObject {
    Compute(NativeObject),
    Graphics(GraphicsPipeline),
    Blend(BlendFragment),
    Rasterizer(NativeObject),
    DepthStencil(DepthStencilFragment),
    Shader { stage: Stage, shader: NativeObject },
    InputLayout(NativeObject),
}

fn fragment_stage(kind: PipelineType) -> Option<Stage> {
    Some(match kind {
        PipelineType::VertexShader => Stage::Vertex,
        PipelineType::HullShader => Stage::Hull,
        PipelineType::DomainShader => Stage::Domain,
        PipelineType::GeometryShader => Stage::Geometry,
        PipelineType::PixelShader => Stage::Pixel,
        _ => return None,
    })
}

impl PipelineObject {
    /// Every native object this pipeline holds a reference on.
    pub fn native_objects(&self) -> Vec<NativeObject> {
        match self {
            PipelineObject::Compute(shader) => vec![*shader],
            PipelineObject::Graphics(g) => {
                let mut objects: Vec<NativeObject> =
                    g.input_layout.into_iter().chain(g.shaders.into_iter().flatten()).collect();
                objects.extend([g.rasterizer, g.blend.state, g.depth_stencil.state]);
                objects
            }
            PipelineObject::Blend(b) => vec![b.state],
            PipelineObject::Rasterizer(r) => vec![*r],
            PipelineObject::DepthStencil(d) => vec![d.state],
            PipelineObject::Shader { shader, .. } => vec![*shader],
            PipelineObject::InputLayout(layout) => vec![*layout],
        }
    }

    /// Issues the native binds `kind` selects from this pipeline.
    ///
    /// Returns false, binding nothing, when the pipeline has no fragment of that type.
    pub fn bind(
        &self,
        kind: PipelineType,
        ctx: &mut dyn NativeContext,
        om: &mut OutputMergerState,
    ) -> bool {
        match (self, kind) {
            (PipelineObject::Compute(shader), PipelineType::Compute) => {
                ctx.set_shader(Stage::Compute, Some(*shader));
            }
            (PipelineObject::Graphics(g), PipelineType::Graphics) => {
                ctx.ia_set_input_layout(g.input_layout);
                ctx.ia_set_primitive_topology(g.topology.raw());
                for stage in GRAPHICS_STAGES {
                    if stage == Stage::Pixel {
                        ctx.rs_set_state(Some(g.rasterizer));
                    }
                    ctx.set_shader(stage, g.shaders[stage.index()]);
                }
                bind_blend(&g.blend, ctx, om);
                bind_depth_stencil(&g.depth_stencil, ctx, om);
            }
            (PipelineObject::Graphics(g), PipelineType::InputLayout) => {
                ctx.ia_set_input_layout(g.input_layout);
                ctx.ia_set_primitive_topology(g.topology.raw());
            }
            (PipelineObject::Graphics(g), PipelineType::RasterizerState) => {
                ctx.rs_set_state(Some(g.rasterizer));
            }
            (PipelineObject::Graphics(g), PipelineType::BlendState) => bind_blend(&g.blend, ctx, om),
            (PipelineObject::Graphics(g), PipelineType::DepthStencilState) => {
                bind_depth_stencil(&g.depth_stencil, ctx, om);
            }
            (PipelineObject::Graphics(g), kind) => match fragment_stage(kind) {
                Some(stage) => ctx.set_shader(stage, g.shaders[stage.index()]),
                None => return false,
            },
            (PipelineObject::Blend(b), PipelineType::BlendState | PipelineType::Graphics) => {
                bind_blend(b, ctx, om);
            }
            (
                PipelineObject::Rasterizer(r),
                PipelineType::RasterizerState | PipelineType::Graphics,
            ) => ctx.rs_set_state(Some(*r)),
            (
                PipelineObject::DepthStencil(d),
                PipelineType::DepthStencilState | PipelineType::Graphics,
            ) => bind_depth_stencil(d, ctx, om),
            (PipelineObject::Shader { stage, shader }, kind)
                if kind == PipelineType::Graphics || fragment_stage(kind) == Some(*stage) =>
            {
                ctx.set_shader(*stage, Some(*shader));
            }
            (
                PipelineObject::InputLayout(layout),
                PipelineType::InputLayout | PipelineType::Graphics,
            ) => ctx.ia_set_input_layout(Some(*layout)),
            _ => return false,
        }
        true
    }

    /// Unbinds whatever a null pipeline of type `kind` stands for.
    pub fn unbind(kind: PipelineType, ctx: &mut dyn NativeContext, om: &mut OutputMergerState) {
        match kind {
            PipelineType::Compute => ctx.set_shader(Stage::Compute, None),
            PipelineType::Graphics => {
                ctx.ia_set_input_layout(None);
                for stage in GRAPHICS_STAGES {
                    ctx.set_shader(stage, None);
                }
                ctx.rs_set_state(None);
                om.blend = None;
                om.depth_stencil = None;
                om.issue_blend(ctx);
                om.issue_depth_stencil(ctx);
            }
            PipelineType::InputLayout => ctx.ia_set_input_layout(None),
            PipelineType::RasterizerState => ctx.rs_set_state(None),
            PipelineType::BlendState => {
                om.blend = None;
                om.issue_blend(ctx);
            }
            PipelineType::DepthStencilState => {
                om.depth_stencil = None;
                om.issue_depth_stencil(ctx);
            }
            shader => {
                if let Some(stage) = fragment_stage(shader) {
                    ctx.set_shader(stage, None);
                }
            }
        }
    }
}

fn bind_blend(b: &BlendFragment, ctx: &mut dyn NativeContext, om: &mut OutputMergerState) {
    om.blend = Some(b.state);
    om.blend_constant = b.blend_constant;
    om.sample_mask = b.sample_mask;
    om.issue_blend(ctx);
}

fn bind_depth_stencil(
    d: &DepthStencilFragment,
    ctx: &mut dyn NativeContext,
    om: &mut OutputMergerState,
) {
    om.depth_stencil = Some(d.state);
    om.stencil_ref = d.stencil_ref;
    om.issue_depth_stencil(ctx);
}

/// Native objects created so far for one pipeline; released on drop unless kept.
struct Fragments<'a> {
    native: &'a dyn NativeDevice,
    objects: Vec<NativeObject>,
}

impl<'a> Fragments<'a> {
    fn new(native: &'a dyn NativeDevice) -> Self {
        Fragments {
            native,
            objects: Vec::new(),
        }
    }

    fn push(&mut self, object: NativeObject) -> NativeObject {
        self.objects.push(object);
        object
    }

    /// Hands ownership of every object to the pipeline.
    fn keep(mut self) {
        self.objects.clear();
    }
}

impl Drop for Fragments<'_> {
    fn drop(&mut self) {
        for object in self.objects.drain(..) {
            self.native.release(object);
        }
    }
}

impl Device {
    /// Creates a shader module from DXBC bytecode.
    ///
    /// `stage` must be exactly one stage.  DXBC containers hold a single entry point, so
    /// `entry_point` is informational.
    pub fn create_shader_module(
        &self,
        stage: ShaderStage,
        format: ShaderFormat,
        entry_point: &str,
        code: &[u8],
    ) -> Result<ShaderModule, Error> {
        if format != ShaderFormat::Dxbc {
            return Err(Error::UnsupportedFeature("only DXBC bytecode can be loaded"));
        }
        let native_stage = convert::stage(stage)
            .ok_or(Error::InvalidDescriptor("a shader module has exactly one stage"))?;
        match native_stage {
            Stage::Compute if !self.check_capability(DeviceCaps::ComputeShader) => {
                return Err(Error::UnsupportedFeature("compute shaders"));
            }
            Stage::Hull | Stage::Domain
                if !self.check_capability(DeviceCaps::HullAndDomainShader) =>
            {
                return Err(Error::UnsupportedFeature("tessellation shaders"));
            }
            _ => {}
        }
        let native = self
            .native
            .create_shader(native_stage, code)
            .map_err(|e| self.creation_failed("shader", e))?;
        let module = self.shader_modules.insert(ShaderModuleRecord {
            native,
            stage: native_stage,
            bytecode: (native_stage == Stage::Vertex).then(|| Arc::from(code)),
        });
        logwise::trace_sync!(
            "Created {stage} shader module {module} ({entry_point})",
            stage = LogIt(&native_stage),
            module = LogIt(&module),
            entry_point = entry_point
        );
        Ok(module)
    }

    pub fn destroy_shader_module(&self, module: ShaderModule) {
        if let Some(record) = self.shader_modules.remove(module) {
            self.native.release(record.native);
        }
    }

    /// Looks up a module and checks its stage, taking a reference on its shader.
    fn retain_shader(
        &self,
        module: ShaderModule,
        stage: Stage,
        fragments: &mut Fragments<'_>,
    ) -> Result<Option<NativeObject>, Error> {
        if module.is_null() {
            return Ok(None);
        }
        let record = self
            .shader_modules
            .get(module)
            .ok_or(Error::HandleInvalid("shader module"))?;
        if record.stage != stage {
            return Err(Error::InvalidDescriptor("shader module used for the wrong stage"));
        }
        self.native.add_ref(record.native);
        Ok(Some(fragments.push(record.native)))
    }

    fn check_layout(&self, layout: PipelineLayout) -> Result<(), Error> {
        if layout.is_null() || self.pipeline_layouts.contains(layout) {
            Ok(())
        } else {
            Err(Error::HandleInvalid("pipeline layout"))
        }
    }

    /// Creates a pipeline from `desc`.
    ///
    /// Graphics pipelines are decomposed into independently created fragments; failure of
    /// any fragment fails the call and leaves no native objects behind.
    pub fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Pipeline, Error> {
        let mut fragments = Fragments::new(self.native.as_ref());
        let object = match desc {
            PipelineDesc::Compute(d) => self.create_pipeline_compute(d, &mut fragments)?,
            PipelineDesc::Graphics(d) => self.create_pipeline_graphics_all(d, &mut fragments)?,
            PipelineDesc::BlendState(d) => PipelineObject::Blend(
                self.create_pipeline_graphics_blend_state(d, u32::MAX, &mut fragments)?,
            ),
            PipelineDesc::RasterizerState(d) => PipelineObject::Rasterizer(
                self.create_pipeline_graphics_rasterizer_state(d, &mut fragments)?,
            ),
            PipelineDesc::DepthStencilState(d) => PipelineObject::DepthStencil(
                self.create_pipeline_graphics_depth_stencil_state(d, &mut fragments)?,
            ),
            PipelineDesc::Shader { stage, module } => {
                let native_stage = convert::stage(*stage)
                    .filter(|s| *s != Stage::Compute)
                    .ok_or(Error::InvalidDescriptor(
                        "a shader fragment has exactly one graphics stage",
                    ))?;
                let shader = self
                    .retain_shader(*module, native_stage, &mut fragments)?
                    .ok_or(Error::InvalidDescriptor("a shader fragment needs a module"))?;
                PipelineObject::Shader {
                    stage: native_stage,
                    shader,
                }
            }
            PipelineDesc::InputLayout {
                vertex_shader,
                elements,
            } => PipelineObject::InputLayout(
                self.create_pipeline_graphics_input_layout(*vertex_shader, elements, &mut fragments)?
                    .ok_or(Error::InvalidDescriptor("an input-layout fragment needs elements"))?,
            ),
        };
        fragments.keep();
        let pipeline = self.pipelines.insert(object);
        logwise::info_sync!(
            "Created {kind} pipeline {pipeline}",
            kind = LogIt(&desc.pipeline_type()),
            pipeline = LogIt(&pipeline)
        );
        self.events.init_pipeline(self, desc, pipeline);
        Ok(pipeline)
    }

    fn create_pipeline_compute(
        &self,
        desc: &ComputePipelineDesc,
        fragments: &mut Fragments<'_>,
    ) -> Result<PipelineObject, Error> {
        self.check_layout(desc.layout)?;
        let shader = self
            .retain_shader(desc.shader, Stage::Compute, fragments)?
            .ok_or(Error::InvalidDescriptor("a compute pipeline needs a compute shader"))?;
        Ok(PipelineObject::Compute(shader))
    }

    fn create_pipeline_graphics_all(
        &self,
        desc: &GraphicsPipelineDesc,
        fragments: &mut Fragments<'_>,
    ) -> Result<PipelineObject, Error> {
        self.check_layout(desc.layout)?;
        if matches!(desc.topology, PrimitiveTopology::PatchList(n) if !(1..=32).contains(&n)) {
            return Err(Error::InvalidDescriptor("patch lists have 1 to 32 control points"));
        }
        let blend =
            self.create_pipeline_graphics_blend_state(&desc.blend_state, desc.sample_mask, fragments)?;
        let rasterizer =
            self.create_pipeline_graphics_rasterizer_state(&desc.rasterizer_state, fragments)?;
        let depth_stencil =
            self.create_pipeline_graphics_depth_stencil_state(&desc.depth_stencil_state, fragments)?;
        let mut shaders = [None; 5];
        for (stage, module) in [
            (Stage::Vertex, desc.vertex_shader),
            (Stage::Hull, desc.hull_shader),
            (Stage::Domain, desc.domain_shader),
            (Stage::Geometry, desc.geometry_shader),
            (Stage::Pixel, desc.pixel_shader),
        ] {
            shaders[stage.index()] = self.retain_shader(module, stage, fragments)?;
        }
        let input_layout =
            self.create_pipeline_graphics_input_layout(desc.vertex_shader, &desc.input_layout, fragments)?;
        Ok(PipelineObject::Graphics(GraphicsPipeline {
            input_layout,
            topology: desc.topology,
            shaders,
            rasterizer,
            blend,
            depth_stencil,
        }))
    }

    fn create_pipeline_graphics_blend_state(
        &self,
        desc: &BlendDesc,
        sample_mask: u32,
        fragments: &mut Fragments<'_>,
    ) -> Result<BlendFragment, Error> {
        if desc.render_targets.iter().any(|rt| rt.logic_op_enable)
            && !self.check_capability(DeviceCaps::LogicOp)
        {
            return Err(Error::UnsupportedFeature("output-merger logic ops"));
        }
        let state = self
            .native
            .create_blend_state(&convert::blend_desc(desc))
            .map_err(|e| self.creation_failed("blend state", e))?;
        Ok(BlendFragment {
            state: fragments.push(state),
            blend_constant: desc.blend_constant,
            sample_mask,
        })
    }

    fn create_pipeline_graphics_rasterizer_state(
        &self,
        desc: &RasterizerDesc,
        fragments: &mut Fragments<'_>,
    ) -> Result<NativeObject, Error> {
        let native_desc = convert::rasterizer_desc(desc)?;
        let state = self
            .native
            .create_rasterizer_state(&native_desc)
            .map_err(|e| self.creation_failed("rasterizer state", e))?;
        Ok(fragments.push(state))
    }

    fn create_pipeline_graphics_depth_stencil_state(
        &self,
        desc: &DepthStencilDesc,
        fragments: &mut Fragments<'_>,
    ) -> Result<DepthStencilFragment, Error> {
        let state = self
            .native
            .create_depth_stencil_state(&convert::depth_stencil_desc(desc))
            .map_err(|e| self.creation_failed("depth-stencil state", e))?;
        Ok(DepthStencilFragment {
            state: fragments.push(state),
            stencil_ref: desc.stencil_reference_value,
        })
    }

    /// `None` when there are no elements.
    fn create_pipeline_graphics_input_layout(
        &self,
        vertex_shader: ShaderModule,
        elements: &[InputElement],
        fragments: &mut Fragments<'_>,
    ) -> Result<Option<NativeObject>, Error> {
        if elements.is_empty() {
            return Ok(None);
        }
        let bytecode = self
            .shader_modules
            .with(vertex_shader, |m| m.bytecode.clone())
            .ok_or(Error::InvalidDescriptor("an input layout needs a vertex shader"))?
            .ok_or(Error::InvalidDescriptor("input layout paired with a non-vertex shader"))?;
        let layout = self
            .native
            .create_input_layout(&convert::input_layout(elements), &bytecode)
            .map_err(|e| self.creation_failed("input layout", e))?;
        Ok(Some(fragments.push(layout)))
    }

    /// Releases every fragment of `pipeline`.  Stale handles are ignored.
    pub fn destroy_pipeline(&self, kind: PipelineType, pipeline: Pipeline) {
        if !self.pipelines.contains(pipeline) {
            return;
        }
        self.events.destroy_pipeline(self, pipeline);
        if let Some(object) = self.pipelines.remove(pipeline) {
            for native in object.native_objects() {
                self.native.release(native);
            }
            logwise::info_sync!(
                "Destroyed {kind} pipeline {pipeline}",
                kind = LogIt(&kind),
                pipeline = LogIt(&pipeline)
            );
        }
    }

    pub(crate) fn pipeline_object(&self, pipeline: Pipeline) -> Option<PipelineObject> {
        let object = self.pipelines.get(pipeline);
        if object.is_none() && self.config.validate_handles {
            logwise::warn_sync!("Stale pipeline {pipeline} not bound", pipeline = LogIt(&pipeline));
        }
        object
    }
}
