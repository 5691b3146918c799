//! widegraph
//!
//! A property-graph layer over a wide-column store: typed nodes and typed,
//! directed relationships with attributes, mapped onto rows, column families
//! and nested column groups.
//!
//! # Architecture
//!
//! - `backend`: the wide-column substrate contract, with in-memory and
//!   RocksDB implementations
//! - `codec`: the typed-value column encoding
//! - `graph`: nodes, relationships, the existence index and reference nodes
//! - `config`: backend selection from settings maps or YAML
//!
//! ## Example Usage
//!
//! ```rust
//! use widegraph::attrs;
//! use widegraph::backend::MemoryBackend;
//! use widegraph::graph::GraphStore;
//!
//! let store = GraphStore::new(MemoryBackend::new());
//!
//! let alice = store.create_node("person", "alice", attrs! { "age" => 30 }).unwrap();
//! let bob = store.create_node("person", "bob", attrs! {}).unwrap();
//! store
//!     .create_relationship("knows", &alice, &bob, None, attrs! { "since" => 2020 })
//!     .unwrap();
//!
//! let knows = store.get_outgoing_by_type(&alice, "knows", 100).unwrap();
//! assert_eq!(knows.len(), 1);
//! assert_eq!(knows[0].target.key(), "bob");
//! assert_eq!(store.has_relationship(&bob, "alice", "knows").unwrap().len(), 1);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod codec;
pub mod config;
pub mod graph;

// Re-export main types for convenience
pub use backend::{
    AnyBackend, Backend, Cell, ColumnFamilyKind, MemoryBackend, RocksBackend, Row, RowQuery,
    StorageError, StorageResult,
};

pub use codec::{CodecError, CodecResult};

pub use config::{BackendConfig, ConfigError, ConfigResult, GraphConfig};

pub use graph::{
    AttributeMap, Direction, GraphError, GraphResult, GraphStore, Node, NodeIdentity,
    Relationship, Value,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
