// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Flattening descriptors into per-stage slot binds.

use crate::bindings::descriptor::{Descriptor, DescriptorType};
use crate::bindings::handles::{DescriptorTable, Key, PipelineLayout};
use crate::bindings::visible_to::ShaderStage;
use crate::context::DeviceContext;
use crate::device::convert::{self, ViewUsage};
use crate::device::PipelineLayoutParam;
use crate::imp::{NativeObject, Stage};
use logwise::privacy::LogIt;
use std::sync::Arc;

impl DeviceContext {
    /// Binds a run of descriptors of one type at `register` in each stage of `stages`.
    ///
    /// Empty descriptors, descriptors of another type and stale handles bind null.
    pub(super) fn bind_descriptors(
        &mut self,
        stages: ShaderStage,
        register: u32,
        kind: DescriptorType,
        descriptors: &[Descriptor],
    ) {
        let device = self.device.clone();
        match kind {
            DescriptorType::Sampler | DescriptorType::SamplerWithResourceView => {
                let samplers: Vec<Option<NativeObject>> = descriptors
                    .iter()
                    .map(|d| match d {
                        Descriptor::Sampler(s) | Descriptor::SamplerWithResourceView { sampler: s, .. } => {
                            device.resolve_sampler(*s)
                        }
                        _ => None,
                    })
                    .collect();
                for stage in convert::stages(stages) {
                    self.native.set_samplers(stage, register, &samplers);
                }
                if kind == DescriptorType::SamplerWithResourceView {
                    let views = self.resolve_views(descriptors, ViewUsage::ShaderResource);
                    for stage in convert::stages(stages) {
                        self.native.set_shader_resources(stage, register, &views);
                    }
                }
            }
            DescriptorType::ShaderResourceView => {
                let views = self.resolve_views(descriptors, ViewUsage::ShaderResource);
                for stage in convert::stages(stages) {
                    self.native.set_shader_resources(stage, register, &views);
                }
            }
            DescriptorType::UnorderedAccessView => {
                let views = self.resolve_views(descriptors, ViewUsage::UnorderedAccess);
                for stage in convert::stages(stages) {
                    if matches!(stage, Stage::Pixel | Stage::Compute) {
                        self.native.set_unordered_access_views(stage, register, &views);
                    }
                }
            }
            DescriptorType::ConstantBuffer => {
                let buffers: Vec<Option<NativeObject>> = descriptors
                    .iter()
                    .map(|d| match d {
                        Descriptor::ConstantBuffer(range) => {
                            if range.offset != 0 {
                                logwise::warn_sync!(
                                    "Constant buffer {buffer} bound from offset {offset}; the driver binds whole buffers",
                                    buffer = LogIt(&range.buffer),
                                    offset = range.offset
                                );
                            }
                            device.resolve_resource(range.buffer)
                        }
                        _ => None,
                    })
                    .collect();
                for stage in convert::stages(stages) {
                    self.native.set_constant_buffers(stage, register, &buffers);
                }
            }
        }
    }

    fn resolve_views(&self, descriptors: &[Descriptor], usage: ViewUsage) -> Vec<Option<NativeObject>> {
        descriptors
            .iter()
            .map(|d| match (d, usage) {
                (
                    Descriptor::ShaderResourceView(view)
                    | Descriptor::SamplerWithResourceView { view, .. },
                    ViewUsage::ShaderResource,
                )
                | (Descriptor::UnorderedAccessView(view), ViewUsage::UnorderedAccess) => {
                    self.device.resolve_view_as(*view, usage)
                }
                _ => None,
            })
            .collect()
    }

    /// Param `index` of `layout`, or `None` (logged) when either does not exist.
    pub(super) fn layout_param(
        &self,
        layout: PipelineLayout,
        index: u32,
    ) -> Option<PipelineLayoutParam> {
        let param = self
            .device
            .pipeline_layout_params(layout)
            .and_then(|params| params.get(index as usize).cloned());
        if param.is_none() {
            logwise::warn_sync!(
                "Pipeline layout {layout} has no param {index}",
                layout = LogIt(&layout),
                index = index
            );
        }
        param
    }

    /// Binds each table range by range, for the stages in `stages`.
    ///
    /// Table `i` is matched against param `first + i` of `layout` when a layout is given.
    pub(super) fn bind_tables(
        &mut self,
        stages: ShaderStage,
        layout: PipelineLayout,
        first: u32,
        tables: &[DescriptorTable],
    ) {
        for (i, table) in tables.iter().enumerate() {
            let Some((table_layout, slots)) = self.device.table_contents(*table) else {
                if !table.is_null() && self.device.config().validate_handles {
                    logwise::warn_sync!("Stale descriptor table {table} not bound", table = LogIt(table));
                }
                continue;
            };
            if !layout.is_null() {
                match self.layout_param(layout, first + i as u32) {
                    Some(PipelineLayoutParam::DescriptorTable {
                        layout: expected,
                        ranges,
                    }) => {
                        if !Arc::ptr_eq(&ranges, &table_layout) && *ranges != *table_layout {
                            logwise::warn_sync!(
                                "Table {table} was not allocated with layout {expected}",
                                table = LogIt(table),
                                expected = LogIt(&expected)
                            );
                        }
                    }
                    Some(PipelineLayoutParam::PushConstants(_)) => {
                        let index = first as usize + i;
                        logwise::warn_sync!(
                            "Param {index} of {layout} is a push-constant range; table {table} not bound",
                            index = index,
                            layout = LogIt(&layout),
                            table = LogIt(table)
                        );
                        continue;
                    }
                    None => continue,
                }
            }
            for range in &table_layout.ranges {
                let start = range.binding as usize;
                let Some(descriptors) = slots.get(start..start + range.count as usize) else {
                    continue;
                };
                logwise::trace_sync!(
                    "Binding {count} {kind} descriptors of {table} at register {register}",
                    count = range.count,
                    kind = LogIt(&range.kind),
                    table = LogIt(table),
                    register = range.dx_register_index
                );
                self.bind_descriptors(
                    range.visibility & stages,
                    range.dx_register_index,
                    range.kind,
                    descriptors,
                );
            }
        }
    }
}
