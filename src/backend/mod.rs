//! Storage substrate contract
//!
//! The graph layer only ever talks to a wide-column store through the
//! [`Backend`] trait: rows grouped into column families, where a row is a
//! sorted set of columns, and in a `Super` family each top-level column is
//! itself a sorted group of columns.
//!
//! Two implementations ship with the crate:
//! - [`MemoryBackend`] for tests and development
//! - [`RocksBackend`] persisting each family as a RocksDB column family

pub mod memory;
pub mod rocks;

pub use memory::MemoryBackend;
pub use rocks::RocksBackend;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Row (or the requested group inside it) does not exist, or the slice is empty
    #[error("Row not found: {column_family}/{row_key}")]
    RowNotFound {
        column_family: String,
        row_key: String,
    },

    /// Column family has never been created
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Cell shape does not match the column family kind
    #[error("Invalid column for {column_family}: {reason}")]
    InvalidColumn {
        column_family: String,
        reason: String,
    },

    /// Key cannot be represented by the backend
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// A lock guarding backend state was poisoned by a panicking writer
    #[error("Backend lock poisoned")]
    LockPoisoned,

    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    pub(crate) fn row_not_found(column_family: &str, row_key: &str) -> Self {
        StorageError::RowNotFound {
            column_family: column_family.to_string(),
            row_key: row_key.to_string(),
        }
    }

    /// True for the "nothing stored here" family of errors
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::RowNotFound { .. } | StorageError::ColumnFamilyNotFound(_)
        )
    }
}

/// Shape of a column family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnFamilyKind {
    /// Row -> column -> value
    Standard,
    /// Row -> super column -> column -> value
    Super,
}

/// A single column as stored: either a plain value or a nested group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Value(String),
    Group(BTreeMap<String, String>),
}

impl Cell {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Cell::Group(g) => Some(g),
            Cell::Value(_) => None,
        }
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Value(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Value(v.to_string())
    }
}

/// Columns of one row (or one group of a row), sorted by column name
pub type Row = BTreeMap<String, Cell>;

/// Default cap on returned columns, matching the usual wide-column client default
pub const DEFAULT_COLUMN_COUNT: usize = 100;

/// Options for [`Backend::get_row`]
///
/// The slice applies to whichever level is addressed: the row itself, or the
/// single group named by `super_column`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowQuery {
    pub super_column: Option<String>,
    pub columns: Option<Vec<String>>,
    /// Inclusive lower bound on column name
    pub column_start: Option<String>,
    /// Inclusive upper bound on column name
    pub column_finish: Option<String>,
    /// `None` means unbounded
    pub column_count: Option<usize>,
}

impl RowQuery {
    /// Whole row, no cap
    pub fn new() -> Self {
        Self::default()
    }

    pub fn super_column(mut self, key: impl Into<String>) -> Self {
        self.super_column = Some(key.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn range(mut self, start: impl Into<String>, finish: impl Into<String>) -> Self {
        self.column_start = Some(start.into());
        self.column_finish = Some(finish.into());
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.column_count = Some(count);
        self
    }

    /// Whether `name` lies past the finish bound
    pub(crate) fn is_past_finish(&self, name: &str) -> bool {
        self.column_finish
            .as_deref()
            .is_some_and(|finish| name > finish)
    }

    /// Apply range, allow-list and count to one sorted level of a row.
    pub(crate) fn slice<'a, I>(&self, level: I) -> Row
    where
        I: IntoIterator<Item = (&'a String, &'a Cell)>,
    {
        let limit = self.column_count.unwrap_or(usize::MAX);
        level
            .into_iter()
            .filter(|(name, _)| {
                self.column_start
                    .as_deref()
                    .map_or(true, |start| name.as_str() >= start)
            })
            .take_while(|(name, _)| !self.is_past_finish(name))
            .filter(|(name, _)| {
                self.columns
                    .as_ref()
                    .map_or(true, |allowed| allowed.iter().any(|c| c == *name))
            })
            .take(limit)
            .map(|(name, cell)| (name.clone(), cell.clone()))
            .collect()
    }

    /// Lower bound for a `BTreeMap::range` over one level
    pub(crate) fn lower_bound(&self) -> Bound<&str> {
        match self.column_start.as_deref() {
            Some(start) => Bound::Included(start),
            None => Bound::Unbounded,
        }
    }
}

/// A buffered write
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        column_family: String,
        row_key: String,
        columns: Row,
        super_column: Option<String>,
    },
    Delete {
        column_family: String,
        row_key: String,
        super_column: Option<String>,
        columns: Option<Vec<String>>,
    },
}

/// Grouped-write state shared by the bundled backends.
///
/// Scopes nest: only the outermost commit hands the mutations back for
/// submission. An abort at any depth discards everything queued so far.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    depth: usize,
    pending: Vec<Mutation>,
}

impl BatchBuffer {
    pub fn begin(&mut self) {
        self.depth += 1;
    }

    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.pending.push(mutation);
    }

    /// Close one scope. Returns the queued mutations when the outermost scope closes.
    pub fn commit(&mut self) -> Option<Vec<Mutation>> {
        match self.depth {
            0 => None,
            1 => {
                self.depth = 0;
                Some(std::mem::take(&mut self.pending))
            }
            _ => {
                self.depth -= 1;
                None
            }
        }
    }

    /// Close one scope and drop everything queued so far.
    pub fn abort(&mut self) -> usize {
        self.depth = self.depth.saturating_sub(1);
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Check that an insert matches the family's shape.
pub(crate) fn validate_insert(
    column_family: &str,
    kind: ColumnFamilyKind,
    columns: &Row,
    super_column: Option<&str>,
) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidColumn {
        column_family: column_family.to_string(),
        reason: reason.to_string(),
    };
    match (kind, super_column) {
        (ColumnFamilyKind::Standard, Some(_)) => {
            Err(invalid("super column given for a standard family"))
        }
        (ColumnFamilyKind::Standard, None) | (ColumnFamilyKind::Super, Some(_)) => {
            if columns.values().any(|c| matches!(c, Cell::Group(_))) {
                Err(invalid("nested group below the top level"))
            } else {
                Ok(())
            }
        }
        (ColumnFamilyKind::Super, None) => {
            if columns.values().any(|c| matches!(c, Cell::Value(_))) {
                Err(invalid("plain value at the top level of a super family"))
            } else {
                Ok(())
            }
        }
    }
}

/// Minimal operations a wide-column substrate must provide.
///
/// Every method takes `&self`; implementations guard their own state.
/// Inserts and deletes issued between `begin_batch` and the matching
/// outermost `commit_batch` are submitted together. Reads never observe
/// buffered writes.
pub trait Backend: Send + Sync {
    fn column_family_exists(&self, name: &str) -> StorageResult<bool>;

    fn create_column_family(&self, name: &str, kind: ColumnFamilyKind) -> StorageResult<()>;

    /// Shape of an existing family; `ColumnFamilyNotFound` otherwise
    fn column_family(&self, name: &str) -> StorageResult<ColumnFamilyKind>;

    /// Fails with `RowNotFound` when the row, the requested group, or the
    /// resulting slice is empty.
    fn get_row(&self, column_family: &str, row_key: &str, query: &RowQuery) -> StorageResult<Row>;

    /// Upsert columns. Existing columns not named in `columns` are kept.
    fn insert_row(
        &self,
        column_family: &str,
        row_key: &str,
        columns: Row,
        super_column: Option<&str>,
    ) -> StorageResult<()>;

    /// Remove the row, one group of it, or the named columns of either.
    fn delete_row(
        &self,
        column_family: &str,
        row_key: &str,
        super_column: Option<&str>,
        columns: Option<&[String]>,
    ) -> StorageResult<()>;

    fn begin_batch(&self) -> StorageResult<()>;

    fn commit_batch(&self) -> StorageResult<()>;

    /// Close the current scope without submitting what it queued.
    fn abort_batch(&self) -> StorageResult<()>;
}

/// Backend chosen at runtime by configuration
pub enum AnyBackend {
    Memory(MemoryBackend),
    Rocks(RocksBackend),
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $call:expr) => {
        match $self {
            AnyBackend::Memory($b) => $call,
            AnyBackend::Rocks($b) => $call,
        }
    };
}

impl Backend for AnyBackend {
    fn column_family_exists(&self, name: &str) -> StorageResult<bool> {
        dispatch!(self, b => b.column_family_exists(name))
    }

    fn create_column_family(&self, name: &str, kind: ColumnFamilyKind) -> StorageResult<()> {
        dispatch!(self, b => b.create_column_family(name, kind))
    }

    fn column_family(&self, name: &str) -> StorageResult<ColumnFamilyKind> {
        dispatch!(self, b => b.column_family(name))
    }

    fn get_row(&self, column_family: &str, row_key: &str, query: &RowQuery) -> StorageResult<Row> {
        dispatch!(self, b => b.get_row(column_family, row_key, query))
    }

    fn insert_row(
        &self,
        column_family: &str,
        row_key: &str,
        columns: Row,
        super_column: Option<&str>,
    ) -> StorageResult<()> {
        dispatch!(self, b => b.insert_row(column_family, row_key, columns, super_column))
    }

    fn delete_row(
        &self,
        column_family: &str,
        row_key: &str,
        super_column: Option<&str>,
        columns: Option<&[String]>,
    ) -> StorageResult<()> {
        dispatch!(self, b => b.delete_row(column_family, row_key, super_column, columns))
    }

    fn begin_batch(&self) -> StorageResult<()> {
        dispatch!(self, b => b.begin_batch())
    }

    fn commit_batch(&self) -> StorageResult<()> {
        dispatch!(self, b => b.commit_batch())
    }

    fn abort_batch(&self) -> StorageResult<()> {
        dispatch!(self, b => b.abort_batch())
    }
}
