//! Graph facade over a wide-column backend
//!
//! `GraphStore` owns nothing but a backend handle and its configuration.
//! Node, relationship and reference-index operations live in sibling modules
//! as further `impl` blocks; this module holds the shared plumbing: grouped
//! writes, codec-aware row helpers, and the error type.

use crate::backend::{Backend, ColumnFamilyKind, RowQuery, StorageError};
use crate::codec::{self, CodecError};
use crate::config::GraphConfig;
use super::property::{AttributeMap, Value};
use super::types::is_reserved_identity;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during graph operations
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node {node_type}:{key} not found")]
    NodeNotFound { node_type: String, key: String },

    /// Name collides with part of the storage layout
    #[error("Reserved name: {0}")]
    ReservedName(String),

    /// Stored relationship record is missing structural columns
    #[error("Malformed relationship record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Turn "nothing stored" into `None`, keep every other failure
pub(crate) fn found<T>(result: GraphResult<T>) -> GraphResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(GraphError::Storage(e)) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Reject attribute names that would shadow layout columns, and values that
/// cannot sit in a single column.
pub(crate) fn check_attributes(attributes: &AttributeMap, reserved: fn(&str) -> bool) -> GraphResult<()> {
    for (name, value) in attributes {
        if reserved(name) {
            return Err(GraphError::ReservedName(name.clone()));
        }
        if let Value::Map(_) = value {
            return Err(CodecError::UnsupportedValueType(value.type_name()).into());
        }
    }
    Ok(())
}

/// Reject node types, node keys, relationship types and ids that start with
/// the codec's tag character.
pub(crate) fn check_identity(names: &[&str]) -> GraphResult<()> {
    match names.iter().find(|name| is_reserved_identity(name)) {
        Some(name) => Err(GraphError::ReservedName(name.to_string())),
        None => Ok(()),
    }
}

/// Property-graph view of a wide-column backend
pub struct GraphStore<B: Backend> {
    backend: B,
    config: GraphConfig,
}

impl<B: Backend> GraphStore<B> {
    /// Wrap a backend with the default configuration
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, GraphConfig::default())
    }

    pub fn with_config(backend: B, config: GraphConfig) -> Self {
        GraphStore { backend, config }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Direct access to backend-specific operations
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Run `f` as one grouped write.
    ///
    /// Writes issued inside are submitted together when the outermost scope
    /// returns `Ok`. On `Err` the scope's queued writes are dropped and the
    /// error is returned. Reads inside the scope do not see queued writes.
    /// The bundle is best-effort: a backend failure while applying it can
    /// leave some rows written.
    pub fn batch<T, F>(&self, f: F) -> GraphResult<T>
    where
        F: FnOnce(&Self) -> GraphResult<T>,
    {
        self.backend.begin_batch()?;
        match f(self) {
            Ok(value) => {
                self.backend.commit_batch()?;
                Ok(value)
            }
            Err(e) => {
                self.backend.abort_batch()?;
                Err(e)
            }
        }
    }

    /// Read and decode a row (or one group of it)
    pub fn get(&self, column_family: &str, row_key: &str, query: &RowQuery) -> GraphResult<AttributeMap> {
        let row = self.backend.get_row(column_family, row_key, query)?;
        Ok(codec::decode_all(&row)?)
    }

    /// Encode and upsert columns, creating the family on first use.
    ///
    /// `Map` values become nested groups, so a super family takes a map of
    /// group key to group columns, or plain columns with `super_column` set.
    pub fn insert(
        &self,
        column_family: &str,
        row_key: &str,
        columns: &AttributeMap,
        super_column: Option<&str>,
        kind: ColumnFamilyKind,
    ) -> GraphResult<()> {
        if !self.backend.column_family_exists(column_family)? {
            debug!("Creating {:?} column family {}", kind, column_family);
            self.backend.create_column_family(column_family, kind)?;
        }
        let encoded = codec::encode_all(columns)?;
        self.backend
            .insert_row(column_family, row_key, encoded, super_column)?;
        Ok(())
    }

    pub fn delete(
        &self,
        column_family: &str,
        row_key: &str,
        super_column: Option<&str>,
        columns: Option<&[String]>,
    ) -> GraphResult<()> {
        self.backend
            .delete_row(column_family, row_key, super_column, columns)?;
        Ok(())
    }
}
