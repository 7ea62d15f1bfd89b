// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Copies, resolves and query readback.

use crate::bindings::handles::{QueryHeap, Resource};
use crate::bindings::query::QueryType;
use crate::bindings::resource::SubresourceBox;
use crate::context::DeviceContext;
use crate::device::convert;
use crate::imp::{ContextKind, NativeBox, NativeResourceDesc, Usage};
use crate::pixel_formats::Format;
use logwise::privacy::LogIt;

/// A one-row box covering bytes `[offset, offset + size)` of a buffer.
fn byte_range(offset: u64, size: u64) -> Option<NativeBox> {
    let left = u32::try_from(offset).ok()?;
    let right = u32::try_from(offset.checked_add(size)?).ok()?;
    Some(NativeBox {
        left,
        top: 0,
        front: 0,
        right,
        bottom: 1,
        back: 1,
    })
}

impl DeviceContext {
    pub(super) fn copy_buffer_bytes(
        &mut self,
        src: Resource,
        src_offset: u64,
        dst: Resource,
        dst_offset: u64,
        size: u64,
    ) {
        let (Some(src_native), Some(dst_native)) = (
            self.device.resolve_resource(src),
            self.device.resolve_resource(dst),
        ) else {
            return;
        };
        let (Some(region), Ok(dst_offset)) = (byte_range(src_offset, size), u32::try_from(dst_offset))
        else {
            logwise::error_sync!(
                "Buffer copy of {size} bytes from {src_offset} exceeds the driver's 32-bit offsets",
                size = size,
                src_offset = src_offset
            );
            return;
        };
        self.native
            .copy_subresource_region(dst_native, 0, [dst_offset, 0, 0], src_native, 0, Some(&region));
    }

    /// Copies a texture region.  Boxes of different sizes would need scaling, which the
    /// driver cannot do.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn copy_texture_box(
        &mut self,
        operation: &str,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_box: Option<&SubresourceBox>,
    ) {
        if let (Some(s), Some(d)) = (src_box, dst_box)
            && (s.width(), s.height(), s.depth()) != (d.width(), d.height(), d.depth())
        {
            logwise::error_sync!(
                "{operation} from {src} to {dst} would scale; the driver only copies same-size regions",
                operation = operation,
                src = LogIt(&src),
                dst = LogIt(&dst)
            );
            return;
        }
        let (Some(src_native), Some(dst_native)) = (
            self.device.resolve_resource(src),
            self.device.resolve_resource(dst),
        ) else {
            return;
        };
        let dst_offset = dst_box.map_or([0; 3], |d| [d.left, d.top, d.front]);
        let region = src_box.map(convert::native_box);
        self.native.copy_subresource_region(
            dst_native,
            dst_subresource,
            dst_offset,
            src_native,
            src_subresource,
            region.as_ref(),
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn resolve_texture(
        &mut self,
        src: Resource,
        src_subresource: u32,
        src_box: Option<&SubresourceBox>,
        dst: Resource,
        dst_subresource: u32,
        dst_offset: [u32; 3],
        format: Format,
    ) {
        if src_box.is_some() || dst_offset != [0; 3] {
            logwise::error_sync!(
                "Resolve of a region of {src}; the driver resolves whole subresources",
                src = LogIt(&src)
            );
            return;
        }
        let (Some(src_native), Some(dst_native)) = (
            self.device.resolve_resource(src),
            self.device.resolve_resource(dst),
        ) else {
            return;
        };
        self.native
            .resolve_subresource(dst_native, dst_subresource, src_native, src_subresource, format);
    }

    /// Reads results on the host and records them as an upload into `dst`.
    ///
    /// Results must already be available; unfinished queries copy nothing.  Deferred contexts
    /// refuse the copy, since a replayed upload would carry results from recording time.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn copy_query_results_via_host(
        &mut self,
        heap: QueryHeap,
        kind: QueryType,
        first: u32,
        count: u32,
        dst: Resource,
        dst_offset: u64,
        stride: u32,
    ) {
        if self.kind == ContextKind::Deferred {
            logwise::error_sync!(
                "Query results of {heap} cannot be copied on a deferred context",
                heap = LogIt(&heap)
            );
            return;
        }
        if count == 0 {
            return;
        }
        let len = (count as u64 - 1) * stride as u64 + kind.result_size() as u64;
        let mut results = vec![0u8; len as usize];
        if let Err(e) = self
            .device
            .get_query_results(heap, first, count, &mut results, stride)
        {
            logwise::warn_sync!(
                "Query results of {heap} not copied: {error}",
                heap = LogIt(&heap),
                error = LogIt(&e)
            );
            return;
        }
        let Some(record) = self.device.resource_record(dst) else {
            return;
        };
        let NativeResourceDesc::Buffer(buffer) = record.desc else {
            logwise::error_sync!("Query results copied into texture {dst}", dst = LogIt(&dst));
            return;
        };
        let region = byte_range(dst_offset, len).filter(|r| r.right <= buffer.byte_width);
        match region {
            Some(region) if buffer.usage == Usage::Default => {
                self.native
                    .update_subresource(record.native, 0, Some(&region), &results, 0, 0);
            }
            _ => logwise::error_sync!(
                "Query results do not fit GPU-only buffer {dst} at {offset}",
                dst = LogIt(&dst),
                offset = dst_offset
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_ranges_stay_in_32_bits() {
        assert_eq!(byte_range(16, 8).map(|b| (b.left, b.right)), Some((16, 24)));
        assert!(byte_range(u32::MAX as u64, 1).is_none());
    }
}
