// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Descriptor heaps, tables and pipeline layouts.

None of these have a native counterpart.  A heap is a host-side arena of [`Descriptor`]
slots; a table is a fixed-size window into it whose shape is given by its layout.  Updates
only write host memory.  The native binds happen when a context binds a table, see
`crate::context::descriptor_binding`.
*/

use crate::bindings::descriptor::{
    ConstantRange, Descriptor, DescriptorHeapSize, DescriptorRange, DescriptorType,
    DescriptorUpdate,
};
use crate::bindings::handles::{DescriptorHeap, DescriptorTable, DescriptorTableLayout, PipelineLayout};
use crate::bindings::visible_to::ShaderStage;
use crate::device::Device;
use crate::error::Error;
use crate::imp::limits;
use logwise::privacy::LogIt;
use std::sync::Arc;

/// Shape of a descriptor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableLayout {
    pub ranges: Vec<DescriptorRange>,
    pub push_descriptors: bool,
    /// Slots one table occupies: one past the highest binding.
    pub slot_count: u32,
}

impl TableLayout {
    fn new(ranges: &[DescriptorRange], push_descriptors: bool) -> Result<Self, Error> {
        for (i, range) in ranges.iter().enumerate() {
            if range.count == 0 {
                return Err(Error::InvalidDescriptor("descriptor range with zero count"));
            }
            range
                .binding
                .checked_add(range.count)
                .ok_or(Error::InvalidDescriptor("descriptor range binding overflows"))?;
            let end = range
                .dx_register_index
                .checked_add(range.count)
                .ok_or(Error::InvalidDescriptor("descriptor range register overflows"))?;
            if end > register_limit(range.kind) {
                return Err(Error::InvalidDescriptor(
                    "descriptor range exceeds the driver's slots for its type",
                ));
            }
            let b = range.bindings();
            if ranges[..i]
                .iter()
                .any(|other| other.bindings().start < b.end && b.start < other.bindings().end)
            {
                return Err(Error::InvalidDescriptor("descriptor ranges overlap"));
            }
        }
        let slot_count = ranges.iter().map(|r| r.binding + r.count).max().unwrap_or(0);
        Ok(TableLayout {
            ranges: ranges.to_vec(),
            push_descriptors,
            slot_count,
        })
    }

    /// The range covering table slot `slot`.
    pub fn range_for_slot(&self, slot: u32) -> Option<&DescriptorRange> {
        self.ranges.iter().find(|r| r.bindings().contains(&slot))
    }

    fn base_register(&self) -> u32 {
        self.ranges
            .iter()
            .map(|r| r.dx_register_index)
            .min()
            .unwrap_or(0)
    }

    fn visibility(&self) -> ShaderStage {
        self.ranges
            .iter()
            .fold(ShaderStage::empty(), |acc, r| acc | r.visibility)
    }
}

/// Native slots per stage for a descriptor type.
fn register_limit(kind: DescriptorType) -> u32 {
    match kind {
        DescriptorType::Sampler => limits::SAMPLER_SLOTS,
        DescriptorType::SamplerWithResourceView => {
            limits::SAMPLER_SLOTS.min(limits::SHADER_RESOURCE_SLOTS)
        }
        DescriptorType::ShaderResourceView => limits::SHADER_RESOURCE_SLOTS,
        DescriptorType::UnorderedAccessView => limits::UNORDERED_ACCESS_SLOTS,
        DescriptorType::ConstantBuffer => limits::CONSTANT_BUFFER_SLOTS,
    }
}

/// One entry of a pipeline layout.
#[derive(Debug, Clone)]
pub(crate) enum PipelineLayoutParam {
    DescriptorTable {
        layout: DescriptorTableLayout,
        ranges: Arc<TableLayout>,
    },
    PushConstants(ConstantRange),
}

impl PipelineLayoutParam {
    /// Register the param's first binding lands on.
    pub fn dx_register_index(&self) -> u32 {
        match self {
            PipelineLayoutParam::DescriptorTable { ranges, .. } => ranges.base_register(),
            PipelineLayoutParam::PushConstants(range) => range.dx_register_index,
        }
    }

    pub fn visibility(&self) -> ShaderStage {
        match self {
            PipelineLayoutParam::DescriptorTable { ranges, .. } => ranges.visibility(),
            PipelineLayoutParam::PushConstants(range) => range.visibility,
        }
    }

    /// Register pushed descriptors of `kind` start at.
    pub fn push_register(&self, kind: DescriptorType) -> u32 {
        match self {
            PipelineLayoutParam::DescriptorTable { ranges, .. } => ranges
                .ranges
                .iter()
                .find(|r| r.kind == kind)
                .map_or_else(|| ranges.base_register(), |r| r.dx_register_index),
            PipelineLayoutParam::PushConstants(range) => range.dx_register_index,
        }
    }
}

#[derive(Debug)]
pub(crate) struct HeapRecord {
    slots: Vec<Descriptor>,
    max_tables: u32,
    tables_allocated: u32,
    /// Tables are carved front to back and only reclaimed with the heap.
    next_offset: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct TableRecord {
    heap: DescriptorHeap,
    offset: usize,
    layout: Arc<TableLayout>,
}

impl Device {
    /// Records the shape of a descriptor table.
    ///
    /// Ranges must have a nonzero count, must not overlap in binding space and must fit the
    /// driver's register file for their type.
    pub fn create_descriptor_table_layout(
        &self,
        ranges: &[DescriptorRange],
        push_descriptors: bool,
    ) -> Result<DescriptorTableLayout, Error> {
        let layout = TableLayout::new(ranges, push_descriptors)?;
        let slots = layout.slot_count;
        let handle = self.table_layouts.insert(Arc::new(layout));
        logwise::trace_sync!(
            "Created descriptor table layout {handle} with {slots} slots",
            handle = LogIt(&handle),
            slots = slots
        );
        Ok(handle)
    }

    pub fn destroy_descriptor_table_layout(&self, layout: DescriptorTableLayout) {
        self.table_layouts.remove(layout);
    }

    /// Builds a pipeline layout: one param per table layout, then one per constant range.
    ///
    /// `layout_index` arguments elsewhere index this combined list.
    pub fn create_pipeline_layout(
        &self,
        table_layouts: &[DescriptorTableLayout],
        constant_ranges: &[ConstantRange],
    ) -> Result<PipelineLayout, Error> {
        let mut params = Vec::with_capacity(table_layouts.len() + constant_ranges.len());
        for layout in table_layouts {
            let ranges = self
                .table_layouts
                .get(*layout)
                .ok_or(Error::HandleInvalid("descriptor table layout"))?;
            params.push(PipelineLayoutParam::DescriptorTable {
                layout: *layout,
                ranges,
            });
        }
        for range in constant_ranges {
            if range.count == 0 {
                return Err(Error::InvalidDescriptor("push-constant range with zero count"));
            }
            if range.offset.saturating_add(range.count) > self.config.max_push_constant_words {
                return Err(Error::InvalidDescriptor(
                    "push-constant range exceeds the constant buffer limit",
                ));
            }
            if range.dx_register_index >= limits::CONSTANT_BUFFER_SLOTS {
                return Err(Error::InvalidDescriptor(
                    "push-constant register exceeds the driver's constant buffer slots",
                ));
            }
            params.push(PipelineLayoutParam::PushConstants(*range));
        }
        let layout = self.pipeline_layouts.insert(params.into());
        logwise::info_sync!("Created pipeline layout {layout}", layout = LogIt(&layout));
        Ok(layout)
    }

    pub fn destroy_pipeline_layout(&self, layout: PipelineLayout) {
        self.pipeline_layouts.remove(layout);
    }

    pub(crate) fn pipeline_layout_params(
        &self,
        layout: PipelineLayout,
    ) -> Option<Arc<[PipelineLayoutParam]>> {
        self.pipeline_layouts.get(layout)
    }

    /// Allocates host storage for `Σ sizes.count` descriptors, shared by at most `max_tables`
    /// tables.
    pub fn create_descriptor_heap(
        &self,
        max_tables: u32,
        sizes: &[DescriptorHeapSize],
    ) -> Result<DescriptorHeap, Error> {
        let total = sizes
            .iter()
            .try_fold(0u32, |acc, s| acc.checked_add(s.count))
            .ok_or(Error::InvalidDescriptor("descriptor heap size overflows"))?;
        if max_tables == 0 {
            return Err(Error::InvalidDescriptor("descriptor heap with no tables"));
        }
        let heap = self.heaps.insert(HeapRecord {
            slots: vec![Descriptor::Empty; total as usize],
            max_tables,
            tables_allocated: 0,
            next_offset: 0,
        });
        logwise::info_sync!(
            "Created descriptor heap {heap} ({total} slots, {max_tables} tables)",
            heap = LogIt(&heap),
            total = total,
            max_tables = max_tables
        );
        Ok(heap)
    }

    /// Frees the heap and every table carved from it.
    pub fn destroy_descriptor_heap(&self, heap: DescriptorHeap) {
        if self.heaps.remove(heap).is_none() {
            return;
        }
        let tables = self.tables.extract_if(|_, t| t.heap == heap);
        logwise::info_sync!(
            "Destroyed descriptor heap {heap} with {count} tables",
            heap = LogIt(&heap),
            count = tables.len()
        );
    }

    /// Carves `count` tables of `layout` out of `heap`.  Either all are allocated or none.
    pub fn create_descriptor_tables(
        &self,
        heap: DescriptorHeap,
        layout: DescriptorTableLayout,
        count: u32,
    ) -> Result<Vec<DescriptorTable>, Error> {
        let layout = self
            .table_layouts
            .get(layout)
            .ok_or(Error::HandleInvalid("descriptor table layout"))?;
        if layout.push_descriptors {
            return Err(Error::InvalidDescriptor(
                "push-descriptor layouts are not allocated from heaps",
            ));
        }
        let stride = layout.slot_count as usize;
        let first = self
            .heaps
            .with_mut(heap, |h| {
                let tables = h.tables_allocated.checked_add(count)?;
                let end = h.next_offset.checked_add(stride.checked_mul(count as usize)?)?;
                if tables > h.max_tables || end > h.slots.len() {
                    return None;
                }
                let first = h.next_offset;
                h.tables_allocated = tables;
                h.next_offset = end;
                Some(first)
            })
            .ok_or(Error::HandleInvalid("descriptor heap"))?
            .ok_or(Error::InvalidDescriptor("descriptor heap is full"))?;
        let tables = (0..count as usize)
            .map(|i| {
                self.tables.insert(TableRecord {
                    heap,
                    offset: first + i * stride,
                    layout: layout.clone(),
                })
            })
            .collect();
        Ok(tables)
    }

    /// Forgets tables.  Their heap slots are reclaimed when the heap is destroyed.
    pub fn free_descriptor_tables(&self, tables: &[DescriptorTable]) {
        for table in tables {
            self.tables.remove(*table);
        }
    }

    /// Writes descriptors into table slots.
    ///
    /// Host-only; nothing reaches the driver until a table is bound.  Updates naming a stale
    /// table, or whose type does not match the ranges they cover, are skipped.
    pub fn update_descriptor_tables(&self, updates: &[DescriptorUpdate<'_>]) {
        for update in updates {
            let Some(table) = self.tables.get(update.table) else {
                logwise::warn_sync!(
                    "Skipping update of stale descriptor table {table}",
                    table = LogIt(&update.table)
                );
                continue;
            };
            let Some(slots) = update.slots() else {
                logwise::error_sync!(
                    "Descriptor update at slot {binding} + {offset} of {table} is out of range",
                    binding = update.binding,
                    offset = update.array_offset,
                    table = LogIt(&update.table)
                );
                continue;
            };
            let covered = slots.clone().all(|slot| {
                table
                    .layout
                    .range_for_slot(slot)
                    .is_some_and(|r| r.kind == update.kind)
            });
            if !covered || !update.descriptors.iter().all(|d| d.fits(update.kind)) {
                logwise::error_sync!(
                    "Descriptor update of {kind} into slots {slots} of {table} does not match its layout",
                    kind = LogIt(&update.kind),
                    slots = LogIt(&slots),
                    table = LogIt(&update.table)
                );
                continue;
            }
            let start = table.offset + slots.start as usize;
            self.heaps.with_mut(table.heap, |h| {
                h.slots[start..start + update.descriptors.len()]
                    .copy_from_slice(update.descriptors);
            });
        }
    }

    /// A copy of a table's layout and slots, for binding.
    pub(crate) fn table_contents(
        &self,
        table: DescriptorTable,
    ) -> Option<(Arc<TableLayout>, Vec<Descriptor>)> {
        let record = self.tables.get(table)?;
        let len = record.layout.slot_count as usize;
        let slots = self.heaps.with(record.heap, |h| {
            h.slots[record.offset..record.offset + len].to_vec()
        })?;
        Some((record.layout, slots))
    }
}

#[cfg(all(test, feature = "software"))]
mod tests {
    use super::*;
    use crate::Config;
    use crate::bindings::handles::Sampler;
    use crate::imp::software::SoftwareDevice;
    use slotmap::Key;

    fn device() -> Arc<Device> {
        Device::new(Box::new(SoftwareDevice::new()), Config::default())
    }

    fn range(binding: u32, count: u32, kind: DescriptorType) -> DescriptorRange {
        DescriptorRange {
            binding,
            dx_register_index: 0,
            count,
            kind,
            visibility: ShaderStage::PIXEL,
        }
    }

    #[test]
    fn layout_validation() {
        let device = device();
        assert!(matches!(
            device.create_descriptor_table_layout(&[range(0, 0, DescriptorType::Sampler)], false),
            Err(Error::InvalidDescriptor(_))
        ));
        assert!(matches!(
            device.create_descriptor_table_layout(
                &[
                    range(0, 4, DescriptorType::ShaderResourceView),
                    range(3, 1, DescriptorType::Sampler)
                ],
                false
            ),
            Err(Error::InvalidDescriptor(_))
        ));
        assert!(matches!(
            device.create_descriptor_table_layout(&[range(0, 17, DescriptorType::Sampler)], false),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn slot_count_spans_gaps() {
        let layout = TableLayout::new(
            &[
                range(4, 2, DescriptorType::ShaderResourceView),
                range(0, 1, DescriptorType::Sampler),
            ],
            false,
        )
        .unwrap();
        assert_eq!(layout.slot_count, 6);
        assert_eq!(layout.range_for_slot(2), None);
        assert_eq!(layout.range_for_slot(5).map(|r| r.binding), Some(4));
    }

    #[test]
    fn pipeline_layout_puts_tables_first() {
        let device = device();
        let table = device
            .create_descriptor_table_layout(&[range(0, 1, DescriptorType::Sampler)], false)
            .unwrap();
        let constants = ConstantRange {
            offset: 0,
            count: 4,
            dx_register_index: 3,
            visibility: ShaderStage::VERTEX,
        };
        let layout = device.create_pipeline_layout(&[table], &[constants]).unwrap();
        let params = device.pipeline_layout_params(layout).unwrap();
        assert!(matches!(params[0], PipelineLayoutParam::DescriptorTable { .. }));
        assert_eq!(params[1].dx_register_index(), 3);
        assert_eq!(params[1].visibility(), ShaderStage::VERTEX);
    }

    #[test]
    fn table_allocation_is_all_or_nothing() {
        let device = device();
        let layout = device
            .create_descriptor_table_layout(&[range(0, 4, DescriptorType::Sampler)], false)
            .unwrap();
        let heap = device
            .create_descriptor_heap(
                4,
                &[DescriptorHeapSize {
                    kind: DescriptorType::Sampler,
                    count: 10,
                }],
            )
            .unwrap();
        assert!(matches!(
            device.create_descriptor_tables(heap, layout, 3),
            Err(Error::InvalidDescriptor(_))
        ));
        assert_eq!(device.tables.len(), 0);
        assert_eq!(device.create_descriptor_tables(heap, layout, 2).unwrap().len(), 2);
    }

    #[test]
    fn mismatched_update_is_skipped() {
        let device = device();
        let layout = device
            .create_descriptor_table_layout(&[range(0, 2, DescriptorType::Sampler)], false)
            .unwrap();
        let heap = device
            .create_descriptor_heap(
                1,
                &[DescriptorHeapSize {
                    kind: DescriptorType::Sampler,
                    count: 2,
                }],
            )
            .unwrap();
        let table = device.create_descriptor_tables(heap, layout, 1).unwrap()[0];
        let sampler = device.create_sampler(&Default::default()).unwrap();
        let written = [Descriptor::Sampler(sampler)];
        device.update_descriptor_tables(&[
            DescriptorUpdate {
                table,
                binding: 0,
                array_offset: 1,
                kind: DescriptorType::Sampler,
                descriptors: &written,
            },
            DescriptorUpdate {
                table,
                binding: 0,
                array_offset: 0,
                kind: DescriptorType::ShaderResourceView,
                descriptors: &[Descriptor::Empty],
            },
            DescriptorUpdate {
                table,
                binding: 1,
                array_offset: 0,
                kind: DescriptorType::Sampler,
                descriptors: &[Descriptor::Sampler(Sampler::null()), Descriptor::Empty],
            },
        ]);
        let (_, slots) = device.table_contents(table).unwrap();
        assert_eq!(slots, vec![Descriptor::Empty, Descriptor::Sampler(sampler)]);
    }

    #[test]
    fn overflowing_update_is_skipped() {
        let device = device();
        let layout = device
            .create_descriptor_table_layout(&[range(0, 2, DescriptorType::Sampler)], false)
            .unwrap();
        let heap = device
            .create_descriptor_heap(
                1,
                &[DescriptorHeapSize {
                    kind: DescriptorType::Sampler,
                    count: 2,
                }],
            )
            .unwrap();
        let table = device.create_descriptor_tables(heap, layout, 1).unwrap()[0];
        let sampler = device.create_sampler(&Default::default()).unwrap();
        device.update_descriptor_tables(&[
            DescriptorUpdate {
                table,
                binding: u32::MAX,
                array_offset: 1,
                kind: DescriptorType::Sampler,
                descriptors: &[Descriptor::Sampler(sampler)],
            },
            DescriptorUpdate {
                table,
                binding: 0,
                array_offset: 0,
                kind: DescriptorType::Sampler,
                descriptors: &[Descriptor::Sampler(sampler)],
            },
        ]);
        let (_, slots) = device.table_contents(table).unwrap();
        assert_eq!(slots, vec![Descriptor::Sampler(sampler), Descriptor::Empty]);
    }

    #[test]
    fn destroying_heap_frees_tables() {
        let device = device();
        let layout = device
            .create_descriptor_table_layout(&[range(0, 1, DescriptorType::ConstantBuffer)], false)
            .unwrap();
        let heap = device
            .create_descriptor_heap(
                2,
                &[DescriptorHeapSize {
                    kind: DescriptorType::ConstantBuffer,
                    count: 2,
                }],
            )
            .unwrap();
        let tables = device.create_descriptor_tables(heap, layout, 2).unwrap();
        device.destroy_descriptor_heap(heap);
        assert!(tables.iter().all(|t| device.table_contents(*t).is_none()));
        device.destroy_descriptor_heap(heap);
    }
}
