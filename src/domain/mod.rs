//! Domain models for databuild
//!
//! Dependency descriptors, build edges and the ninja text format. No I/O
//! happens here.

mod descriptor;
mod graph;
pub mod ninja;

pub use descriptor::{DependencyInfo, DescriptorError};
pub use graph::{BuildEdge, EdgeGraph, GraphError};
pub use ninja::{NinjaWriter, Rule};
