//! Property graph over a wide-column store
//!
//! This module implements the graph data model with:
//! - Typed nodes, one row per node in a column family named after the type
//! - Typed, directed relationships stored as column groups under both endpoints
//! - An existence index answering "are these two nodes related?" in one read
//! - Reference nodes indexing every node of a type

pub mod node;
pub mod nodes;
pub mod property;
pub mod reference;
pub mod relationship;
pub mod relationships;
pub mod store;
pub mod types;

// Re-export main types
pub use node::Node;
pub use property::{AttributeMap, Value};
pub use relationship::Relationship;
pub use store::{GraphError, GraphResult, GraphStore};
pub use types::{Direction, NodeIdentity};
