/*! Abstract binding types: handles, descriptions and descriptors */

pub mod handles;
pub mod visible_to;
pub mod resource;
pub mod sampler;
pub mod pipeline;
pub mod descriptor;
pub mod query;
pub(crate) mod resource_tracking;

pub use handles::{
    DescriptorHeap, DescriptorTable, DescriptorTableLayout, Handle, Key, Pipeline,
    PipelineLayout, QueryHeap, Resource, ResourceView, Sampler, ShaderModule,
};
