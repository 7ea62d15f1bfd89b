// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Occlusion,
    BinaryOcclusion,
    Timestamp,
    PipelineStatistics,
}

impl QueryType {
    /// Size in bytes of one result as written by `get_query_results`.
    pub const fn result_size(self) -> u32 {
        match self {
            QueryType::Occlusion | QueryType::BinaryOcclusion | QueryType::Timestamp => 8,
            //eleven 64-bit counters
            QueryType::PipelineStatistics => 88,
        }
    }
}
