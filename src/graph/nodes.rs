//! Node operations
//!
//! A node lives in the column family named after its type, one row per key.
//! The row always carries a `key` column holding the node key, so a node
//! with no attributes still has a row. Every relationship record embeds a
//! copy of both endpoints, so saving or deleting a node has to visit each
//! record it appears in.

use super::node::Node;
use super::property::{AttributeMap, Value};
use super::relationship::{embedded_copy, embedded_identity, required_str};
use super::relationships::StoredRelationship;
use super::store::{check_attributes, check_identity, found, GraphError, GraphResult, GraphStore};
use super::types::{
    is_reserved_node_attribute, Direction, NodeIdentity, ENDPOINT_KEY, RESERVED_COLUMN_FAMILIES,
    REL_KEY_COLUMN, REL_TYPE_COLUMN, SOURCE_PREFIX, TARGET_PREFIX,
};
use crate::backend::{Backend, ColumnFamilyKind, RowQuery};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Relationship records touching one node, keyed by record key
type RecordSet = BTreeMap<String, AttributeMap>;

fn check_node(node_type: &str, key: &str) -> GraphResult<()> {
    if RESERVED_COLUMN_FAMILIES.contains(&node_type) {
        return Err(GraphError::ReservedName(node_type.to_string()));
    }
    check_identity(&[node_type, key])
}

/// Columns written to the node row: the attributes plus the key column
fn node_row(key: &str, attributes: &AttributeMap) -> AttributeMap {
    let mut row = attributes.clone();
    row.insert(ENDPOINT_KEY.to_string(), Value::from(key));
    row
}

/// Column names that will actually be stored for `attributes`
fn stored_names(attributes: &AttributeMap) -> BTreeSet<String> {
    attributes
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, _)| name.clone())
        .collect()
}

/// Swap the embedded copy under `prefix` for `node`'s current attributes.
/// Returns the columns that were dropped from the record.
fn refresh_copy(record: &mut AttributeMap, prefix: &str, node: &Node) -> Vec<String> {
    let old: Vec<String> = record
        .keys()
        .filter(|name| name.starts_with(prefix))
        .cloned()
        .collect();
    for name in &old {
        record.remove(name);
    }
    let copy = embedded_copy(prefix, node);
    let live = stored_names(&copy);
    record.extend(copy);
    old.into_iter().filter(|name| !live.contains(name)).collect()
}

impl<B: Backend> GraphStore<B> {
    /// Create a node and register it with its type's reference node
    pub fn create_node(&self, node_type: &str, key: &str, attributes: AttributeMap) -> GraphResult<Node> {
        self.batch(|store| {
            let node = store.insert_node(node_type, key, attributes)?;
            let reference = store.reference_node(node_type)?;
            store.instance(&reference, &node, key)?;
            Ok(node)
        })
    }

    /// Create a node without indexing it under a reference node
    pub fn create_reference_node(
        &self,
        node_type: &str,
        key: &str,
        attributes: AttributeMap,
    ) -> GraphResult<Node> {
        self.insert_node(node_type, key, attributes)
    }

    fn insert_node(&self, node_type: &str, key: &str, attributes: AttributeMap) -> GraphResult<Node> {
        check_node(node_type, key)?;
        check_attributes(&attributes, is_reserved_node_attribute)?;
        debug!("Creating node {}", NodeIdentity::new(node_type, key));
        self.insert(node_type, key, &node_row(key, &attributes), None, ColumnFamilyKind::Standard)?;
        Ok(Node::new(node_type, key, attributes))
    }

    /// Fetch a node by type and key
    pub fn get_node(&self, node_type: &str, key: &str) -> GraphResult<Node> {
        check_node(node_type, key)?;
        match found(self.get(node_type, key, &RowQuery::new()))? {
            Some(mut attributes) => {
                attributes.remove(ENDPOINT_KEY);
                Ok(Node::new(node_type, key, attributes))
            }
            None => Err(GraphError::NodeNotFound {
                node_type: node_type.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Persist `node`'s attributes and refresh every embedded copy of it.
    ///
    /// Attributes removed from the snapshot are removed from the node row and
    /// from the records as well.
    pub fn save_node(&self, node: &Node) -> GraphResult<()> {
        check_node(node.node_type(), node.key())?;
        check_attributes(&node.attributes, is_reserved_node_attribute)?;

        let prior = found(self.get(node.node_type(), node.key(), &RowQuery::new()))?;
        let records = self.node_records(node)?;
        debug!(
            "Saving node {} across {} relationship records",
            node.identity(),
            records.len()
        );

        self.batch(|store| {
            for (record_key, mut record) in records {
                let source = embedded_identity(&record_key, &record, SOURCE_PREFIX)?;
                let target = embedded_identity(&record_key, &record, TARGET_PREFIX)?;

                let mut stale = Vec::new();
                if node.is(&source.0, &source.1) {
                    stale.extend(refresh_copy(&mut record, SOURCE_PREFIX, node));
                }
                if node.is(&target.0, &target.1) {
                    stale.extend(refresh_copy(&mut record, TARGET_PREFIX, node));
                }

                let endpoints = [
                    (Direction::Outgoing, NodeIdentity::new(source.0, source.1)),
                    (Direction::Incoming, NodeIdentity::new(target.0, target.1)),
                ];
                for (direction, endpoint) in &endpoints {
                    let row_key = endpoint.endpoint_key();
                    if !stale.is_empty() {
                        store.delete(direction.column_family(), &row_key, Some(&record_key), Some(stale.as_slice()))?;
                    }
                    store.insert(
                        direction.column_family(),
                        &row_key,
                        &record,
                        Some(&record_key),
                        ColumnFamilyKind::Super,
                    )?;
                }
            }

            let row = node_row(node.key(), &node.attributes);
            if let Some(prior) = prior {
                let live = stored_names(&row);
                let removed: Vec<String> = prior
                    .into_keys()
                    .filter(|name| !live.contains(name))
                    .collect();
                if !removed.is_empty() {
                    store.delete(node.node_type(), node.key(), None, Some(removed.as_slice()))?;
                }
            }
            store.insert(node.node_type(), node.key(), &row, None, ColumnFamilyKind::Standard)
        })
    }

    /// Delete a node and every relationship it takes part in
    pub fn delete_node(&self, node: &Node) -> GraphResult<()> {
        let records = self.node_records(node)?;
        debug!(
            "Deleting node {} and {} relationships",
            node.identity(),
            records.len()
        );

        let doomed = records
            .iter()
            .map(|(record_key, record)| -> GraphResult<StoredRelationship> {
                let (source_type, source_key) = embedded_identity(record_key, record, SOURCE_PREFIX)?;
                let (target_type, target_key) = embedded_identity(record_key, record, TARGET_PREFIX)?;
                Ok(StoredRelationship::new(
                    &required_str(record_key, record, REL_TYPE_COLUMN)?,
                    &required_str(record_key, record, REL_KEY_COLUMN)?,
                    NodeIdentity::new(source_type, source_key),
                    NodeIdentity::new(target_type, target_key),
                ))
            })
            .collect::<GraphResult<Vec<_>>>()?;

        self.batch(|store| {
            store.delete_stored(&doomed)?;
            store.delete(node.node_type(), node.key(), None, None)
        })
    }

    /// Every outbound and inbound record of `node`, uncapped, each once
    fn node_records(&self, node: &Node) -> GraphResult<RecordSet> {
        let mut records = RecordSet::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for (record_key, record) in self.read_records(direction, &node.endpoint_key(), &RowQuery::new())? {
                records.entry(record_key).or_insert(record);
            }
        }
        Ok(records)
    }
}
