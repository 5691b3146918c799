//! Relationship value object and its on-disk record
//!
//! A relationship is stored as one nested column group, written twice: under
//! the source's row in the outbound family and under the target's row in the
//! inbound family. Besides the caller's attributes the group carries a copy
//! of both endpoints:
//!
//! ```text
//! rel_type, rel_key, <attributes...>,
//! source__type, source__key, source__<attr>...,
//! target__type, target__key, target__<attr>...
//! ```

use super::node::Node;
use super::property::{AttributeMap, Value};
use super::types::{
    record_key, Direction, ENDPOINT_KEY, ENDPOINT_TYPE, REL_KEY_COLUMN, REL_TYPE_COLUMN,
    SOURCE_PREFIX, TARGET_PREFIX,
};
use super::store::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};

/// A directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Caller-supplied or generated id, unique within `rel_type`
    pub key: String,

    pub rel_type: String,

    /// Node the relationship goes FROM
    pub source: Node,

    /// Node the relationship goes TO
    pub target: Node,

    /// Caller attributes; never includes the embedded endpoint copies
    pub attributes: AttributeMap,
}

impl Relationship {
    /// Nested-group key this relationship is stored under
    pub fn record_key(&self) -> String {
        record_key(&self.rel_type, &self.key)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Build the full record written to both relationship families
    pub(crate) fn to_record(&self) -> AttributeMap {
        let mut record = self.attributes.clone();
        record.insert(REL_TYPE_COLUMN.to_string(), Value::from(self.rel_type.as_str()));
        record.insert(REL_KEY_COLUMN.to_string(), Value::from(self.key.as_str()));
        record.extend(embedded_copy(SOURCE_PREFIX, &self.source));
        record.extend(embedded_copy(TARGET_PREFIX, &self.target));
        record
    }

    /// Rebuild a relationship from a record read under `owner`'s row.
    ///
    /// `owner` is the caller's view of the node whose row was read; the other
    /// endpoint comes from the record's embedded copy.
    pub(crate) fn from_record(
        record_key: &str,
        record: &AttributeMap,
        direction: Direction,
        owner: &Node,
    ) -> GraphResult<Self> {
        let rel_type = required_str(record_key, record, REL_TYPE_COLUMN)?;
        let key = required_str(record_key, record, REL_KEY_COLUMN)?;
        let other = embedded_node(record_key, record, direction.other_prefix())?;

        let attributes = record
            .iter()
            .filter(|(name, _)| {
                name.as_str() != REL_TYPE_COLUMN
                    && name.as_str() != REL_KEY_COLUMN
                    && !name.starts_with(SOURCE_PREFIX)
                    && !name.starts_with(TARGET_PREFIX)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let (source, target) = match direction {
            Direction::Outgoing => (owner.clone(), other),
            Direction::Incoming => (other, owner.clone()),
        };

        Ok(Relationship {
            key,
            rel_type,
            source,
            target,
            attributes,
        })
    }
}

/// `prefix`-qualified columns describing `node`
pub(crate) fn embedded_copy(prefix: &str, node: &Node) -> AttributeMap {
    let mut columns = AttributeMap::new();
    columns.insert(format!("{}{}", prefix, ENDPOINT_TYPE), Value::from(node.node_type()));
    columns.insert(format!("{}{}", prefix, ENDPOINT_KEY), Value::from(node.key()));
    for (name, value) in &node.attributes {
        columns.insert(format!("{}{}", prefix, name), value.clone());
    }
    columns
}

/// Type and key of the endpoint embedded under `prefix`
pub(crate) fn embedded_identity(
    record_key: &str,
    record: &AttributeMap,
    prefix: &str,
) -> GraphResult<(String, String)> {
    let node_type = required_str(record_key, record, &format!("{}{}", prefix, ENDPOINT_TYPE))?;
    let key = required_str(record_key, record, &format!("{}{}", prefix, ENDPOINT_KEY))?;
    Ok((node_type, key))
}

fn embedded_node(record_key: &str, record: &AttributeMap, prefix: &str) -> GraphResult<Node> {
    let (node_type, key) = embedded_identity(record_key, record, prefix)?;
    let type_column = format!("{}{}", prefix, ENDPOINT_TYPE);
    let key_column = format!("{}{}", prefix, ENDPOINT_KEY);
    let attributes = record
        .iter()
        .filter(|(name, _)| **name != type_column && **name != key_column)
        .filter_map(|(name, value)| {
            name.strip_prefix(prefix)
                .map(|attribute| (attribute.to_string(), value.clone()))
        })
        .collect();
    Ok(Node::new(node_type, key, attributes))
}

pub(crate) fn required_str(record_key: &str, record: &AttributeMap, column: &str) -> GraphResult<String> {
    match record.get(column) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(GraphError::MalformedRecord(format!(
            "{} is missing {}",
            record_key, column
        ))),
    }
}
