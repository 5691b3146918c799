//! Identity types and the reserved storage layout
//!
//! Row keys and nested-group keys are length-prefixed so that no node type,
//! node key or relationship type can produce a key that collides with another
//! one, whatever characters it contains.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Family holding each relationship record under its source endpoint row
pub const OUTBOUND_RELATIONSHIP_CF: &str = "outbound";
/// Family holding each relationship record under its target endpoint row
pub const INBOUND_RELATIONSHIP_CF: &str = "inbound";
/// Family recording which node pairs are related, by type and direction
pub const RELATIONSHIP_INDEX_CF: &str = "relationship_index";

/// Node type of every reference (index root) node
pub const REFERENCE_TYPE: &str = "reference";
/// Key of the reference node that indexes all other reference nodes
pub const ROOT_REFERENCE: &str = "reference";
/// Relationship type linking a reference node to what it indexes
pub const INSTANCE_RELATIONSHIP: &str = "instance";

pub const REL_TYPE_COLUMN: &str = "rel_type";
pub const REL_KEY_COLUMN: &str = "rel_key";
pub const SOURCE_PREFIX: &str = "source__";
pub const TARGET_PREFIX: &str = "target__";
/// Suffix of an embedded endpoint's type column, after the prefix
pub const ENDPOINT_TYPE: &str = "type";
/// Suffix of an embedded endpoint's key column, after the prefix
pub const ENDPOINT_KEY: &str = "key";

pub const OUTGOING_MARKER: &str = "__outgoing";
pub const INCOMING_MARKER: &str = "__incoming";

/// Column families that node types may not use
pub const RESERVED_COLUMN_FAMILIES: [&str; 3] = [
    OUTBOUND_RELATIONSHIP_CF,
    INBOUND_RELATIONSHIP_CF,
    RELATIONSHIP_INDEX_CF,
];

/// Identity of a node: unique `(node_type, key)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeIdentity {
    pub node_type: String,
    pub key: String,
}

impl NodeIdentity {
    pub fn new(node_type: impl Into<String>, key: impl Into<String>) -> Self {
        NodeIdentity {
            node_type: node_type.into(),
            key: key.into(),
        }
    }

    /// Row key for this node in the relationship families
    pub fn endpoint_key(&self) -> String {
        endpoint_key(&self.node_type, &self.key)
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{})", self.node_type, self.key)
    }
}

/// Which endpoint row a relationship record was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn column_family(self) -> &'static str {
        match self {
            Direction::Outgoing => OUTBOUND_RELATIONSHIP_CF,
            Direction::Incoming => INBOUND_RELATIONSHIP_CF,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Direction::Outgoing => OUTGOING_MARKER,
            Direction::Incoming => INCOMING_MARKER,
        }
    }

    /// Prefix of the embedded copy of the *other* endpoint
    pub fn other_prefix(self) -> &'static str {
        match self {
            Direction::Outgoing => TARGET_PREFIX,
            Direction::Incoming => SOURCE_PREFIX,
        }
    }
}

/// `"<len(node_type)>:<node_type>:<key>"`
pub fn endpoint_key(node_type: &str, key: &str) -> String {
    format!("{}:{}:{}", node_type.len(), node_type, key)
}

/// Nested-group key of a relationship record: `"<len(rel_type)>:<rel_type>_<id>"`
pub fn record_key(rel_type: &str, id: &str) -> String {
    format!("{}_{}", type_prefix(rel_type), id)
}

fn type_prefix(rel_type: &str) -> String {
    format!("{}:{}", rel_type.len(), rel_type)
}

/// Inclusive column range selecting exactly the records of one relationship type.
///
/// Every record key of the type starts with `<len>:<rel_type>_`, and `` ` `` is
/// the byte right after `_`, so the range holds those keys and nothing else.
/// The length prefix keeps a type from being a prefix of another type's keys.
pub fn type_scan_bounds(rel_type: &str) -> (String, String) {
    let prefix = type_prefix(rel_type);
    (format!("{}_", prefix), format!("{}`", prefix))
}

/// Existence-index column value for a record
pub fn index_marker(record_key: &str, direction: Direction) -> String {
    format!("{}{}", record_key, direction.marker())
}

/// Split an existence-index value into record key and direction
pub fn parse_index_marker(marker: &str) -> Option<(&str, Direction)> {
    if let Some(record) = marker.strip_suffix(OUTGOING_MARKER) {
        Some((record, Direction::Outgoing))
    } else {
        marker
            .strip_suffix(INCOMING_MARKER)
            .map(|record| (record, Direction::Incoming))
    }
}

/// Whether a caller-supplied relationship attribute would shadow a record column
pub fn is_reserved_relationship_attribute(name: &str) -> bool {
    name == REL_TYPE_COLUMN
        || name == REL_KEY_COLUMN
        || name.starts_with(SOURCE_PREFIX)
        || name.starts_with(TARGET_PREFIX)
}

/// Whether a node attribute would shadow an embedded identity column
pub fn is_reserved_node_attribute(name: &str) -> bool {
    name == ENDPOINT_TYPE || name == ENDPOINT_KEY
}

/// Whether a node type, node key, relationship type or relationship id would
/// read back as a tagged value once stored in an identity column
pub fn is_reserved_identity(name: &str) -> bool {
    name.starts_with('$')
}
