//! Relationship operations
//!
//! Creating a relationship writes four things in one batch: the record under
//! the source row of `outbound`, the same record under the target row of
//! `inbound`, and an existence-index column on each endpoint's row of
//! `relationship_index`.
//!
//! An index column `(row A, group B.key, column rel_type)` exists exactly when
//! at least one relationship of that type joins A and B, in either direction.
//! All such relationships share the column, which names only one of them:
//! creation overwrites it with the newest. Deletion recomputes it from the
//! records left on A's rows and drops it only when none are left.

use super::node::Node;
use super::property::{AttributeMap, Value};
use super::relationship::{embedded_identity, Relationship};
use super::store::{check_attributes, check_identity, found, GraphError, GraphResult, GraphStore};
use super::types::{
    index_marker, is_reserved_relationship_attribute, parse_index_marker, record_key, type_scan_bounds,
    Direction, NodeIdentity, RELATIONSHIP_INDEX_CF,
};
use crate::backend::{Backend, ColumnFamilyKind, RowQuery};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

/// A relationship as laid out in storage, enough to remove it
#[derive(Debug, Clone)]
pub(crate) struct StoredRelationship {
    rel_type: String,
    record_key: String,
    source: NodeIdentity,
    target: NodeIdentity,
}

impl StoredRelationship {
    pub(crate) fn new(rel_type: &str, rel_id: &str, source: NodeIdentity, target: NodeIdentity) -> Self {
        StoredRelationship {
            rel_type: rel_type.to_string(),
            record_key: record_key(rel_type, rel_id),
            source,
            target,
        }
    }
}

/// One existence-index column: endpoint row, other endpoint's key, type
type IndexSlot = (String, String, String);

impl<B: Backend> GraphStore<B> {
    /// Create a relationship from `source` to `target`.
    ///
    /// `key` defaults to a random UUID. The endpoint snapshots are embedded
    /// as given, so pass nodes that reflect what is stored.
    pub fn create_relationship(
        &self,
        rel_type: &str,
        source: &Node,
        target: &Node,
        key: Option<&str>,
        attributes: AttributeMap,
    ) -> GraphResult<Relationship> {
        check_identity(&[rel_type, source.node_type(), source.key(), target.node_type(), target.key()])?;
        if let Some(key) = key {
            check_identity(&[key])?;
        }
        check_attributes(&attributes, is_reserved_relationship_attribute)?;
        let relationship = Relationship {
            key: key.map_or_else(|| Uuid::new_v4().to_string(), str::to_string),
            rel_type: rel_type.to_string(),
            source: source.clone(),
            target: target.clone(),
            attributes,
        };
        let record_key = relationship.record_key();
        let record = relationship.to_record();
        let source_row = source.endpoint_key();
        let target_row = target.endpoint_key();

        debug!(
            "Creating relationship {} {} -> {}",
            record_key,
            source.identity(),
            target.identity()
        );

        self.batch(|store| {
            for (direction, row_key) in [
                (Direction::Outgoing, &source_row),
                (Direction::Incoming, &target_row),
            ] {
                store.insert(
                    direction.column_family(),
                    row_key,
                    &record,
                    Some(&record_key),
                    ColumnFamilyKind::Super,
                )?;
            }
            store.insert(
                RELATIONSHIP_INDEX_CF,
                &source_row,
                &crate::attrs! { rel_type => index_marker(&record_key, Direction::Outgoing) },
                Some(target.key()),
                ColumnFamilyKind::Super,
            )?;
            store.insert(
                RELATIONSHIP_INDEX_CF,
                &target_row,
                &crate::attrs! { rel_type => index_marker(&record_key, Direction::Incoming) },
                Some(source.key()),
                ColumnFamilyKind::Super,
            )
        })?;

        Ok(relationship)
    }

    /// Relationships leaving `node`, any type, at most `count`
    pub fn get_outgoing(&self, node: &Node, count: usize) -> GraphResult<Vec<Relationship>> {
        self.relationships(node, Direction::Outgoing, RowQuery::new().count(count))
    }

    /// Relationships arriving at `node`, any type, at most `count`
    pub fn get_incoming(&self, node: &Node, count: usize) -> GraphResult<Vec<Relationship>> {
        self.relationships(node, Direction::Incoming, RowQuery::new().count(count))
    }

    /// Relationships leaving `node`, capped at the configured default count
    pub fn get_all_outgoing(&self, node: &Node) -> GraphResult<Vec<Relationship>> {
        self.get_outgoing(node, self.config().default_count)
    }

    /// Relationships arriving at `node`, capped at the configured default count
    pub fn get_all_incoming(&self, node: &Node) -> GraphResult<Vec<Relationship>> {
        self.get_incoming(node, self.config().default_count)
    }

    pub fn get_outgoing_by_type(
        &self,
        node: &Node,
        rel_type: &str,
        count: usize,
    ) -> GraphResult<Vec<Relationship>> {
        let (start, finish) = type_scan_bounds(rel_type);
        self.relationships(
            node,
            Direction::Outgoing,
            RowQuery::new().range(start, finish).count(count),
        )
    }

    pub fn get_incoming_by_type(
        &self,
        node: &Node,
        rel_type: &str,
        count: usize,
    ) -> GraphResult<Vec<Relationship>> {
        let (start, finish) = type_scan_bounds(rel_type);
        self.relationships(
            node,
            Direction::Incoming,
            RowQuery::new().range(start, finish).count(count),
        )
    }

    /// Relationships of `rel_type` between `node_a` and the node keyed
    /// `node_b_key`, in either direction, as seen from `node_a`.
    ///
    /// Matches on the other node's key only, not its type. When several such
    /// relationships exist the index names one of them, so the list holds one.
    pub fn has_relationship(
        &self,
        node_a: &Node,
        node_b_key: &str,
        rel_type: &str,
    ) -> GraphResult<Vec<Relationship>> {
        let row_key = node_a.endpoint_key();
        let query = RowQuery::new().super_column(node_b_key).columns([rel_type]);
        let entry = match found(self.get(RELATIONSHIP_INDEX_CF, &row_key, &query))? {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };

        let mut relationships = Vec::new();
        for marker in entry.values().filter_map(Value::as_str) {
            let (record_key, direction) = match parse_index_marker(marker) {
                Some(parsed) => parsed,
                None => continue,
            };
            let query = RowQuery::new().super_column(record_key);
            if let Some(record) = found(self.get(direction.column_family(), &row_key, &query))? {
                relationships.push(Relationship::from_record(record_key, &record, direction, node_a)?);
            }
        }
        Ok(relationships)
    }

    /// Remove one relationship: both records, and its share of both index
    /// columns.
    ///
    /// `rel_id` is the relationship key, not the stored record key. An index
    /// column that other relationships between the same endpoints still rely
    /// on is repointed at one of them instead of removed.
    pub fn delete_relationship(
        &self,
        rel_type: &str,
        rel_id: &str,
        source_type: &str,
        source_key: &str,
        target_type: &str,
        target_key: &str,
    ) -> GraphResult<()> {
        self.delete_stored(&[StoredRelationship::new(
            rel_type,
            rel_id,
            NodeIdentity::new(source_type, source_key),
            NodeIdentity::new(target_type, target_key),
        )])
    }

    /// Delete a fetched relationship
    pub fn remove_relationship(&self, relationship: &Relationship) -> GraphResult<()> {
        self.delete_relationship(
            &relationship.rel_type,
            &relationship.key,
            relationship.source.node_type(),
            relationship.source.key(),
            relationship.target.node_type(),
            relationship.target.key(),
        )
    }

    /// Delete several relationships in one batch.
    ///
    /// Index columns are recomputed against the committed records minus the
    /// whole set, since reads inside the batch do not see its deletes.
    pub(crate) fn delete_stored(&self, doomed: &[StoredRelationship]) -> GraphResult<()> {
        let removed: BTreeSet<&str> = doomed.iter().map(|r| r.record_key.as_str()).collect();

        let mut index: BTreeMap<IndexSlot, Option<String>> = BTreeMap::new();
        for rel in doomed {
            for (endpoint, other) in [(&rel.source, &rel.target), (&rel.target, &rel.source)] {
                let slot = (endpoint.endpoint_key(), other.key.clone(), rel.rel_type.clone());
                if index.contains_key(&slot) {
                    continue;
                }
                let marker = self.surviving_marker(&slot.0, &slot.1, &slot.2, &removed)?;
                index.insert(slot, marker);
            }
        }

        self.batch(|store| {
            for rel in doomed {
                debug!(
                    "Deleting relationship {} {} -> {}",
                    rel.record_key, rel.source, rel.target
                );
                store.delete(
                    Direction::Incoming.column_family(),
                    &rel.target.endpoint_key(),
                    Some(rel.record_key.as_str()),
                    None,
                )?;
                store.delete(
                    Direction::Outgoing.column_family(),
                    &rel.source.endpoint_key(),
                    Some(rel.record_key.as_str()),
                    None,
                )?;
            }
            for ((row_key, other_key, rel_type), marker) in &index {
                match marker {
                    Some(marker) => store.insert(
                        RELATIONSHIP_INDEX_CF,
                        row_key,
                        &crate::attrs! { rel_type => marker.as_str() },
                        Some(other_key.as_str()),
                        ColumnFamilyKind::Super,
                    )?,
                    None => store.delete(
                        RELATIONSHIP_INDEX_CF,
                        row_key,
                        Some(other_key.as_str()),
                        Some(&[rel_type.clone()][..]),
                    )?,
                }
            }
            Ok(())
        })
    }

    /// Index value for the column `(row_key, other_key, rel_type)` once the
    /// records in `removed` are gone, or `None` if nothing would be left.
    ///
    /// Keeps the current value while it names a surviving record.
    fn surviving_marker(
        &self,
        row_key: &str,
        other_key: &str,
        rel_type: &str,
        removed: &BTreeSet<&str>,
    ) -> GraphResult<Option<String>> {
        let query = RowQuery::new().super_column(other_key).columns([rel_type]);
        if let Some(entry) = found(self.get(RELATIONSHIP_INDEX_CF, row_key, &query))? {
            let current = entry.get(rel_type).and_then(Value::as_str);
            if let Some((record_key, direction)) = current.and_then(parse_index_marker) {
                let query = RowQuery::new().super_column(record_key);
                if !removed.contains(record_key)
                    && found(self.get(direction.column_family(), row_key, &query))?.is_some()
                {
                    return Ok(Some(index_marker(record_key, direction)));
                }
            }
        }

        let (start, finish) = type_scan_bounds(rel_type);
        for direction in [Direction::Outgoing, Direction::Incoming] {
            let query = RowQuery::new().range(start.clone(), finish.clone());
            for (record_key, record) in self.read_records(direction, row_key, &query)? {
                if removed.contains(record_key.as_str()) {
                    continue;
                }
                let (_, key) = embedded_identity(&record_key, &record, direction.other_prefix())?;
                if key == other_key {
                    return Ok(Some(index_marker(&record_key, direction)));
                }
            }
        }
        Ok(None)
    }

    fn relationships(&self, node: &Node, direction: Direction, query: RowQuery) -> GraphResult<Vec<Relationship>> {
        self.read_records(direction, &node.endpoint_key(), &query)?
            .into_iter()
            .map(|(record_key, record)| Relationship::from_record(&record_key, &record, direction, node))
            .collect()
    }

    /// Raw relationship records under one endpoint row, in record-key order
    pub(crate) fn read_records(
        &self,
        direction: Direction,
        row_key: &str,
        query: &RowQuery,
    ) -> GraphResult<Vec<(String, AttributeMap)>> {
        let row = match found(self.get(direction.column_family(), row_key, query))? {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };
        row.into_iter()
            .map(|(record_key, value)| match value {
                Value::Map(record) => Ok((record_key, record)),
                _ => Err(GraphError::MalformedRecord(format!(
                    "{} in {} is not a column group",
                    record_key,
                    direction.column_family()
                ))),
            })
            .collect()
    }
}
