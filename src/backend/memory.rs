//! In-memory wide-column store
//!
//! Families, rows and groups are nested `BTreeMap`s so column order matches
//! the lexical order a real wide-column store gives range scans.

use super::{
    validate_insert, Backend, BatchBuffer, Cell, ColumnFamilyKind, Mutation, Row, RowQuery,
    StorageError, StorageResult,
};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug)]
struct ColumnFamilyData {
    kind: ColumnFamilyKind,
    rows: BTreeMap<String, Row>,
}

/// Volatile backend for tests and development
#[derive(Debug, Default)]
pub struct MemoryBackend {
    families: RwLock<HashMap<String, ColumnFamilyData>>,
    batch: Mutex<BatchBuffer>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored in a family
    pub fn row_count(&self, column_family: &str) -> StorageResult<usize> {
        let families = self.families.read().map_err(|_| StorageError::LockPoisoned)?;
        families
            .get(column_family)
            .map(|cf| cf.rows.len())
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(column_family.to_string()))
    }

    fn apply(&self, mutations: Vec<Mutation>) -> StorageResult<()> {
        let mut families = self.families.write().map_err(|_| StorageError::LockPoisoned)?;
        for mutation in mutations {
            match mutation {
                Mutation::Insert {
                    column_family,
                    row_key,
                    columns,
                    super_column,
                } => {
                    let cf = families
                        .get_mut(&column_family)
                        .ok_or_else(|| StorageError::ColumnFamilyNotFound(column_family.clone()))?;
                    let row = cf.rows.entry(row_key).or_default();
                    match super_column {
                        Some(group) => merge_group(row, group, columns),
                        None => {
                            for (name, cell) in columns {
                                match cell {
                                    Cell::Group(values) => merge_group(
                                        row,
                                        name,
                                        values.into_iter().map(|(k, v)| (k, Cell::Value(v))).collect(),
                                    ),
                                    value => {
                                        row.insert(name, value);
                                    }
                                }
                            }
                        }
                    }
                }
                Mutation::Delete {
                    column_family,
                    row_key,
                    super_column,
                    columns,
                } => {
                    // Deleting from a family that was never created is a no-op
                    let Some(cf) = families.get_mut(&column_family) else {
                        continue;
                    };
                    remove_cells(&mut cf.rows, &row_key, super_column.as_deref(), columns.as_deref());
                }
            }
        }
        Ok(())
    }

    fn submit(&self, mutation: Mutation) -> StorageResult<()> {
        {
            let mut batch = self.batch.lock().map_err(|_| StorageError::LockPoisoned)?;
            if batch.is_active() {
                batch.push(mutation);
                return Ok(());
            }
        }
        self.apply(vec![mutation])
    }
}

fn merge_group(row: &mut Row, group: String, columns: Row) {
    let entry = row
        .entry(group)
        .or_insert_with(|| Cell::Group(BTreeMap::new()));
    if let Cell::Group(values) = entry {
        for (name, cell) in columns {
            if let Cell::Value(v) = cell {
                values.insert(name, v);
            }
        }
    }
}

fn remove_cells(
    rows: &mut BTreeMap<String, Row>,
    row_key: &str,
    super_column: Option<&str>,
    columns: Option<&[String]>,
) {
    let Some(row) = rows.get_mut(row_key) else {
        return;
    };
    match (super_column, columns) {
        (None, None) => row.clear(),
        (None, Some(names)) => {
            for name in names {
                row.remove(name);
            }
        }
        (Some(group), None) => {
            row.remove(group);
        }
        (Some(group), Some(names)) => {
            if let Some(Cell::Group(values)) = row.get_mut(group) {
                for name in names {
                    values.remove(name);
                }
                if values.is_empty() {
                    row.remove(group);
                }
            }
        }
    }
    if row.is_empty() {
        rows.remove(row_key);
    }
}

impl Backend for MemoryBackend {
    fn column_family_exists(&self, name: &str) -> StorageResult<bool> {
        let families = self.families.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(families.contains_key(name))
    }

    fn create_column_family(&self, name: &str, kind: ColumnFamilyKind) -> StorageResult<()> {
        let mut families = self.families.write().map_err(|_| StorageError::LockPoisoned)?;
        families.entry(name.to_string()).or_insert_with(|| {
            info!("Created {:?} column family {}", kind, name);
            ColumnFamilyData {
                kind,
                rows: BTreeMap::new(),
            }
        });
        Ok(())
    }

    fn column_family(&self, name: &str) -> StorageResult<ColumnFamilyKind> {
        let families = self.families.read().map_err(|_| StorageError::LockPoisoned)?;
        families
            .get(name)
            .map(|cf| cf.kind)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn get_row(&self, column_family: &str, row_key: &str, query: &RowQuery) -> StorageResult<Row> {
        let families = self.families.read().map_err(|_| StorageError::LockPoisoned)?;
        let cf = families
            .get(column_family)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(column_family.to_string()))?;
        let row = cf
            .rows
            .get(row_key)
            .ok_or_else(|| StorageError::row_not_found(column_family, row_key))?;

        let sliced = match query.super_column.as_deref() {
            Some(group) => {
                let values = row
                    .get(group)
                    .and_then(Cell::as_group)
                    .ok_or_else(|| StorageError::row_not_found(column_family, row_key))?;
                let level: Row = values
                    .iter()
                    .map(|(k, v)| (k.clone(), Cell::Value(v.clone())))
                    .collect();
                query.slice(&level)
            }
            None => query.slice(row.range::<str, _>((query.lower_bound(), Bound::Unbounded))),
        };

        if sliced.is_empty() {
            return Err(StorageError::row_not_found(column_family, row_key));
        }
        Ok(sliced)
    }

    fn insert_row(
        &self,
        column_family: &str,
        row_key: &str,
        columns: Row,
        super_column: Option<&str>,
    ) -> StorageResult<()> {
        let kind = self.column_family(column_family)?;
        validate_insert(column_family, kind, &columns, super_column)?;
        debug!("insert {}/{} ({} columns)", column_family, row_key, columns.len());
        self.submit(Mutation::Insert {
            column_family: column_family.to_string(),
            row_key: row_key.to_string(),
            columns,
            super_column: super_column.map(str::to_string),
        })
    }

    fn delete_row(
        &self,
        column_family: &str,
        row_key: &str,
        super_column: Option<&str>,
        columns: Option<&[String]>,
    ) -> StorageResult<()> {
        debug!("delete {}/{}", column_family, row_key);
        self.submit(Mutation::Delete {
            column_family: column_family.to_string(),
            row_key: row_key.to_string(),
            super_column: super_column.map(str::to_string),
            columns: columns.map(<[String]>::to_vec),
        })
    }

    fn begin_batch(&self) -> StorageResult<()> {
        self.batch
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .begin();
        Ok(())
    }

    fn commit_batch(&self) -> StorageResult<()> {
        let flushed = self
            .batch
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .commit();
        match flushed {
            Some(mutations) => {
                debug!("Committing batch of {} mutations", mutations.len());
                self.apply(mutations)
            }
            None => Ok(()),
        }
    }

    fn abort_batch(&self) -> StorageResult<()> {
        let dropped = self
            .batch
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .abort();
        debug!("Aborted batch, dropped {} mutations", dropped);
        Ok(())
    }
}
