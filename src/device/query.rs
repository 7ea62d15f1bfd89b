// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Query heaps: arrays of native query objects.

use crate::bindings::handles::QueryHeap;
use crate::bindings::query::QueryType;
use crate::device::{Device, convert};
use crate::error::Error;
use crate::imp::{NativeError, NativeObject};
use logwise::privacy::LogIt;

#[derive(Debug, Clone)]
pub(crate) struct QueryHeapRecord {
    pub kind: QueryType,
    pub queries: Vec<NativeObject>,
}

impl Device {
    /// Creates `count` native queries of one type.
    pub fn create_query_heap(&self, kind: QueryType, count: u32) -> Result<QueryHeap, Error> {
        if count == 0 {
            return Err(Error::InvalidDescriptor("query heap with no queries"));
        }
        let mut queries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.native.create_query(convert::query_kind(kind)) {
                Ok(query) => queries.push(query),
                Err(e) => {
                    for query in queries {
                        self.native.release(query);
                    }
                    return Err(self.creation_failed("query", e));
                }
            }
        }
        let heap = self.query_heaps.insert(QueryHeapRecord { kind, queries });
        logwise::info_sync!(
            "Created {kind} query heap {heap} with {count} queries",
            kind = LogIt(&kind),
            heap = LogIt(&heap),
            count = count
        );
        Ok(heap)
    }

    pub fn destroy_query_heap(&self, heap: QueryHeap) {
        if let Some(record) = self.query_heaps.remove(heap) {
            for query in record.queries {
                self.native.release(query);
            }
        }
    }

    /// Native query `index` of `heap`, with the heap's type.
    pub(crate) fn query(&self, heap: QueryHeap, index: u32) -> Option<(QueryType, NativeObject)> {
        let found = self
            .query_heaps
            .with(heap, |h| {
                h.queries.get(index as usize).map(|q| (h.kind, *q))
            })
            .flatten();
        if found.is_none() && self.config.validate_handles {
            logwise::warn_sync!(
                "Query {index} of {heap} does not exist",
                index = index,
                heap = LogIt(&heap)
            );
        }
        found
    }

    /// Reads `count` results starting at query `first` into `results`, `stride` bytes apart.
    ///
    /// Each result is [`QueryType::result_size`] bytes.  Binary occlusion results are widened
    /// to `u64`.  Fails without blocking if any result is not available yet.
    pub fn get_query_results(
        &self,
        heap: QueryHeap,
        first: u32,
        count: u32,
        results: &mut [u8],
        stride: u32,
    ) -> Result<(), Error> {
        let record = self
            .query_heaps
            .get(heap)
            .ok_or(Error::HandleInvalid("query heap"))?;
        let size = record.kind.result_size() as usize;
        let stride = stride as usize;
        if count == 0 {
            return Ok(());
        }
        if stride < size {
            return Err(Error::InvalidDescriptor("query result stride smaller than a result"));
        }
        let queries = first
            .checked_add(count)
            .and_then(|end| record.queries.get(first as usize..end as usize))
            .ok_or(Error::InvalidDescriptor("query range exceeds the heap"))?;
        if results.len() < (count as usize - 1) * stride + size {
            return Err(Error::InvalidDescriptor("query results buffer too small"));
        }
        let mut native = vec![0u8; convert::native_result_size(record.kind)];
        for (i, query) in queries.iter().enumerate() {
            match self.native.get_query_data(*query, &mut native) {
                Ok(()) => {}
                Err(NativeError::WasStillDrawing) => {
                    return Err(Error::Native(NativeError::WasStillDrawing));
                }
                Err(e) => {
                    let index = first as usize + i;
                    logwise::warn_sync!(
                        "Reading query {index} of {heap} failed: {error}",
                        index = index,
                        heap = LogIt(&heap),
                        error = LogIt(&e)
                    );
                    return Err(e.into());
                }
            }
            let out = &mut results[i * stride..i * stride + size];
            if record.kind == QueryType::BinaryOcclusion {
                let flag: u32 = bytemuck::pod_read_unaligned(&native[..4]);
                out.copy_from_slice(bytemuck::bytes_of(&u64::from(flag != 0)));
            } else {
                out.copy_from_slice(&native);
            }
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "software"))]
mod tests {
    use super::*;
    use crate::Config;
    use crate::imp::software::SoftwareDevice;
    use std::sync::Arc;

    fn device() -> (SoftwareDevice, Arc<Device>) {
        let probe = SoftwareDevice::new();
        let device = Device::new(Box::new(probe.clone()), Config::default());
        (probe, device)
    }

    #[test]
    fn unfinished_query_does_not_block() {
        let (_, device) = device();
        let heap = device.create_query_heap(QueryType::Occlusion, 2).unwrap();
        let mut results = [0u8; 16];
        assert!(matches!(
            device.get_query_results(heap, 0, 2, &mut results, 8),
            Err(Error::Native(NativeError::WasStillDrawing))
        ));
    }

    #[test]
    fn range_and_stride_are_checked() {
        let (_, device) = device();
        let heap = device.create_query_heap(QueryType::Timestamp, 2).unwrap();
        let mut results = [0u8; 32];
        assert!(matches!(
            device.get_query_results(heap, 1, 2, &mut results, 8),
            Err(Error::InvalidDescriptor(_))
        ));
        assert!(matches!(
            device.get_query_results(heap, 0, 2, &mut results, 4),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn destroy_releases_queries() {
        let (probe, device) = device();
        let heap = device.create_query_heap(QueryType::PipelineStatistics, 4).unwrap();
        assert_eq!(probe.live_objects(), 4);
        device.destroy_query_heap(heap);
        assert_eq!(probe.live_objects(), 0);
        assert!(device.query(heap, 0).is_none());
    }
}
