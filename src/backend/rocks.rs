//! RocksDB storage backend
//!
//! Each logical column family becomes a RocksDB column family named
//! `cf:<name>`, created on first use. Every column is its own RocksDB key so
//! RocksDB's byte ordering gives the lexical column order range scans rely on:
//!
//! - standard family: `row \0 column`
//! - super family:    `row \0 group \0 column`
//!
//! Family kinds are recorded in the default column family so a reopened
//! database knows which layout each family uses.

use super::{
    validate_insert, Backend, BatchBuffer, Cell, ColumnFamilyKind, Mutation, Row, RowQuery,
    StorageError, StorageResult,
};
use rocksdb::{
    ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options,
    WriteBatch,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

type Db = DBWithThreadMode<MultiThreaded>;

const KIND_KEY_PREFIX: &str = "cf_kind:";
const SEPARATOR: u8 = 0;

/// RocksDB-backed wide-column store
pub struct RocksBackend {
    db: Arc<Db>,
    path: String,
    kinds: RwLock<HashMap<String, ColumnFamilyKind>>,
    batch: Mutex<BatchBuffer>,
}

impl RocksBackend {
    /// Open or create a database at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path_str = path.as_ref().to_string_lossy().into_owned();

        info!("Opening RocksDB backend at: {}", path_str);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(64 * 1024 * 1024); // 64 MB
        opts.set_max_write_buffer_number(3);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_wal_recovery_mode(rocksdb::DBRecoveryMode::PointInTime);

        // A fresh directory has no families to list yet
        let existing = Db::list_cf(&opts, path.as_ref()).unwrap_or_else(|_| vec!["default".to_string()]);
        let descriptors: Vec<ColumnFamilyDescriptor> = existing
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(name.as_str(), Self::cf_options()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, path.as_ref(), descriptors)?;
        let kinds = Self::load_kinds(&db)?;

        info!("RocksDB backend opened with {} column families", kinds.len());

        Ok(Self {
            db: Arc::new(db),
            path: path_str,
            kinds: RwLock::new(kinds),
            batch: Mutex::new(BatchBuffer::default()),
        })
    }

    /// Column family options shared by every graph family
    fn cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn load_kinds(db: &Db) -> StorageResult<HashMap<String, ColumnFamilyKind>> {
        let mut kinds = HashMap::new();
        let prefix = KIND_KEY_PREFIX.as_bytes();
        for item in db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item?;
            let Some(name) = key.strip_prefix(prefix) else {
                break;
            };
            let name = String::from_utf8_lossy(name).into_owned();
            let kind: ColumnFamilyKind = bincode::deserialize(&value)?;
            kinds.insert(name, kind);
        }
        Ok(kinds)
    }

    /// Directory this database lives in
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        debug!("Flushed RocksDB backend to disk");
        Ok(())
    }

    fn physical_name(name: &str) -> String {
        format!("cf:{}", name)
    }

    fn kind_of(&self, name: &str) -> StorageResult<Option<ColumnFamilyKind>> {
        let kinds = self.kinds.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(kinds.get(name).copied())
    }

    fn write(&self, mutations: Vec<Mutation>) -> StorageResult<()> {
        let mut batch = WriteBatch::default();
        for mutation in mutations {
            match mutation {
                Mutation::Insert {
                    column_family,
                    row_key,
                    columns,
                    super_column,
                } => {
                    let handle = self
                        .db
                        .cf_handle(&Self::physical_name(&column_family))
                        .ok_or_else(|| StorageError::ColumnFamilyNotFound(column_family.clone()))?;
                    let mut prefix = key_part(&row_key)?;
                    if let Some(group) = &super_column {
                        prefix.extend(key_part(group)?);
                    }
                    for (name, cell) in columns {
                        match cell {
                            Cell::Value(value) => {
                                batch.put_cf(&handle, join(&prefix, &name), value.as_bytes());
                            }
                            Cell::Group(values) => {
                                let mut group_prefix = prefix.clone();
                                group_prefix.extend(key_part(&name)?);
                                for (column, value) in values {
                                    batch.put_cf(&handle, join(&group_prefix, &column), value.as_bytes());
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
                    let Some(kind) = self.kind_of(&column_family)? else {
                        continue;
                    };
                    let Some(handle) = self.db.cf_handle(&Self::physical_name(&column_family)) else {
                        continue;
                    };
                    let mut prefix = key_part(&row_key)?;
                    if let Some(group) = &super_column {
                        prefix.extend(key_part(group)?);
                    }
                    match columns {
                        None => batch.delete_range_cf(&handle, prefix.as_slice(), prefix_end(&prefix).as_slice()),
                        Some(names) => {
                            for name in names {
                                if kind == ColumnFamilyKind::Super && super_column.is_none() {
                                    // Naming a whole group at the top level of a super family
                                    let mut group_prefix = prefix.clone();
                                    group_prefix.extend(key_part(&name)?);
                                    batch.delete_range_cf(
                                        &handle,
                                        group_prefix.as_slice(),
                                        prefix_end(&group_prefix).as_slice(),
                                    );
                                } else {
                                    batch.delete_cf(&handle, join(&prefix, &name));
                                }
                            }
                        }
                    }
                }
            }
        }
        self.db.write(batch)?;
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
        self.write(vec![mutation])
    }
}

/// `name` followed by the separator byte
fn key_part(name: &str) -> StorageResult<Vec<u8>> {
    check_name(name)?;
    let mut part = Vec::with_capacity(name.len() + 1);
    part.extend_from_slice(name.as_bytes());
    part.push(SEPARATOR);
    Ok(part)
}

fn check_name(name: &str) -> StorageResult<()> {
    if name.as_bytes().contains(&SEPARATOR) {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    Ok(())
}

fn join(prefix: &[u8], column: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + column.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(column.as_bytes());
    key
}

/// Exclusive end of the key range sharing `prefix` (which ends in the separator)
fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    if let Some(last) = end.last_mut() {
        *last = SEPARATOR + 1;
    }
    end
}

fn utf8(bytes: &[u8]) -> StorageResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| StorageError::InvalidKey(String::from_utf8_lossy(e.as_bytes()).into_owned()))
}

impl Backend for RocksBackend {
    fn column_family_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.kind_of(name)?.is_some())
    }

    fn create_column_family(&self, name: &str, kind: ColumnFamilyKind) -> StorageResult<()> {
        check_name(name)?;
        let mut kinds = self.kinds.write().map_err(|_| StorageError::LockPoisoned)?;
        if kinds.contains_key(name) {
            return Ok(());
        }
        let physical = Self::physical_name(name);
        if self.db.cf_handle(&physical).is_none() {
            self.db.create_cf(&physical, &Self::cf_options())?;
        }
        let kind_key = format!("{}{}", KIND_KEY_PREFIX, name);
        self.db.put(kind_key.as_bytes(), bincode::serialize(&kind)?)?;
        kinds.insert(name.to_string(), kind);

        info!("Created {:?} column family {}", kind, name);
        Ok(())
    }

    fn column_family(&self, name: &str) -> StorageResult<ColumnFamilyKind> {
        self.kind_of(name)?
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn get_row(&self, column_family: &str, row_key: &str, query: &RowQuery) -> StorageResult<Row> {
        let kind = self.column_family(column_family)?;
        let handle = self
            .db
            .cf_handle(&Self::physical_name(column_family))
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(column_family.to_string()))?;

        let mut prefix = key_part(row_key)?;
        let grouped = match (kind, query.super_column.as_deref()) {
            (ColumnFamilyKind::Super, Some(group)) => {
                prefix.extend(key_part(group)?);
                false
            }
            (ColumnFamilyKind::Super, None) => true,
            (ColumnFamilyKind::Standard, Some(_)) => {
                return Err(StorageError::InvalidColumn {
                    column_family: column_family.to_string(),
                    reason: "super column requested from a standard family".to_string(),
                })
            }
            (ColumnFamilyKind::Standard, None) => false,
        };

        let seek = match query.column_start.as_deref() {
            Some(start) => join(&prefix, start),
            None => prefix.clone(),
        };
        // Stop early on the count only when no allow-list can drop entries later
        let early_limit = match query.columns {
            None => query.column_count,
            Some(_) => None,
        };

        let mut level = Row::new();
        for item in self.db.iterator_cf(&handle, IteratorMode::From(&seek, Direction::Forward)) {
            let (key, value) = item?;
            let Some(rest) = key.strip_prefix(prefix.as_slice()) else {
                break;
            };
            let value = utf8(&value)?;
            let (name, column) = if grouped {
                let split = rest
                    .iter()
                    .position(|b| *b == SEPARATOR)
                    .ok_or_else(|| StorageError::InvalidKey(String::from_utf8_lossy(rest).into_owned()))?;
                (utf8(&rest[..split])?, Some(utf8(&rest[split + 1..])?))
            } else {
                (utf8(rest)?, None)
            };

            if query.is_past_finish(&name) {
                break;
            }
            if !level.contains_key(&name) && early_limit.is_some_and(|limit| level.len() >= limit) {
                break;
            }

            match column {
                Some(column) => {
                    if let Cell::Group(values) = level
                        .entry(name)
                        .or_insert_with(|| Cell::Group(BTreeMap::new()))
                    {
                        values.insert(column, value);
                    }
                }
                None => {
                    level.insert(name, Cell::Value(value));
                }
            }
        }

        let sliced = query.slice(&level);
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
        check_name(row_key)?;
        if let Some(group) = super_column {
            check_name(group)?;
        }
        for (name, cell) in &columns {
            check_name(name)?;
            if let Cell::Group(values) = cell {
                values.keys().try_for_each(|column| check_name(column))?;
            }
        }

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
                debug!("Writing batch of {} mutations", mutations.len());
                self.write(mutations)
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
