//! Record store backing the participant and asset registries

use crate::error::{LedgerError, Result};
use parking_lot::RwLock;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Fully qualified type plus identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub record_type: String,
    pub id: String,
}

impl RecordKey {
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        RecordKey {
            record_type: record_type.into(),
            id: id.into(),
        }
    }

    pub fn to_uri(&self) -> String {
        format!("resource:{}#{}", self.record_type, self.id)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

/// A serialized record and the number of writes it has seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub data: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    /// Create a record; fails if the key exists
    Insert { key: RecordKey, data: String },
    /// Replace a record read at `expected_version`
    Update {
        key: RecordKey,
        data: String,
        expected_version: u64,
    },
}

impl Write {
    pub fn key(&self) -> &RecordKey {
        match self {
            Write::Insert { key, .. } | Write::Update { key, .. } => key,
        }
    }
}

/// Ordered set of writes applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Write> {
        self.writes.iter()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Abstraction for record store backends. `apply` must commit every write
/// of a batch or none of them.
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>>;
    fn list(&self, record_type: &str) -> Result<Vec<(String, StoredRecord)>>;
    fn apply(&self, batch: &WriteBatch) -> Result<()>;
}

/// SQLite-backed record store
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                record_type TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                version INTEGER NOT NULL,
                PRIMARY KEY (record_type, id)
            )",
            [],
        )
        .map_err(|e| {
            LedgerError::DatabaseError(format!("Failed to create records table: {}", e))
        })?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::DatabaseError("Mutex poisoned".to_string()))
    }
}

impl RecordStore for Database {
    fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT data, version FROM records WHERE record_type = ?1 AND id = ?2",
                params![key.record_type, key.id],
                |row| {
                    let data: String = row.get(0)?;
                    let version: i64 = row.get(1)?;
                    Ok(StoredRecord {
                        data,
                        version: version as u64,
                    })
                },
            )
            .optional()
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to read {}: {}", key, e)))?;

        Ok(row)
    }

    fn list(&self, record_type: &str) -> Result<Vec<(String, StoredRecord)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, data, version FROM records WHERE record_type = ?1 ORDER BY id ASC")
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![record_type], |row| {
                let id: String = row.get(0)?;
                let data: String = row.get(1)?;
                let version: i64 = row.get(2)?;
                Ok((
                    id,
                    StoredRecord {
                        data,
                        version: version as u64,
                    },
                ))
            })
            .map_err(|e| LedgerError::DatabaseError(format!("Failed to query records: {}", e)))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(
                row.map_err(|e| LedgerError::DatabaseError(format!("Failed to read row: {}", e)))?,
            );
        }
        Ok(records)
    }

    fn apply(&self, batch: &WriteBatch) -> Result<()> {
        let mut conn = self.lock()?;
        // Dropping the transaction without commit rolls every write back
        let tx = conn.transaction().map_err(|e| {
            LedgerError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        for write in batch.iter() {
            match write {
                Write::Insert { key, data } => {
                    let exists: bool = tx.query_row(
                        "SELECT EXISTS(SELECT 1 FROM records WHERE record_type = ?1 AND id = ?2)",
                        params![key.record_type, key.id],
                        |row| row.get(0),
                    )?;
                    if exists {
                        return Err(LedgerError::DuplicateKey(key.to_uri()));
                    }

                    tx.execute(
                        "INSERT INTO records (record_type, id, data, version) VALUES (?1, ?2, ?3, 1)",
                        params![key.record_type, key.id, data],
                    )
                    .map_err(|e| {
                        LedgerError::DatabaseError(format!("Failed to insert {}: {}", key, e))
                    })?;
                }
                Write::Update {
                    key,
                    data,
                    expected_version,
                } => {
                    let changed = tx
                        .execute(
                            "UPDATE records SET data = ?3, version = version + 1
                             WHERE record_type = ?1 AND id = ?2 AND version = ?4",
                            params![key.record_type, key.id, data, *expected_version as i64],
                        )
                        .map_err(|e| {
                            LedgerError::DatabaseError(format!("Failed to update {}: {}", key, e))
                        })?;

                    if changed == 0 {
                        let current: Option<i64> = tx
                            .query_row(
                                "SELECT version FROM records WHERE record_type = ?1 AND id = ?2",
                                params![key.record_type, key.id],
                                |row| row.get(0),
                            )
                            .optional()?;
                        return Err(match current {
                            None => LedgerError::PersistenceError(format!(
                                "{} does not exist",
                                key
                            )),
                            Some(_) => LedgerError::VersionConflict(key.to_uri()),
                        });
                    }
                }
            }
        }

        tx.commit().map_err(|e| {
            LedgerError::DatabaseError(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }
}

/// In-memory record store useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<BTreeMap<RecordKey, StoredRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for InMemoryStore {
    fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn list(&self, record_type: &str) -> Result<Vec<(String, StoredRecord)>> {
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|(key, _)| key.record_type == record_type)
            .map(|(key, record)| (key.id.clone(), record.clone()))
            .collect())
    }

    fn apply(&self, batch: &WriteBatch) -> Result<()> {
        let mut records = self.records.write();
        let mut pending: BTreeMap<RecordKey, StoredRecord> = BTreeMap::new();

        for write in batch.iter() {
            let current = pending
                .get(write.key())
                .or_else(|| records.get(write.key()))
                .cloned();

            match write {
                Write::Insert { key, data } => {
                    if current.is_some() {
                        return Err(LedgerError::DuplicateKey(key.to_uri()));
                    }
                    pending.insert(
                        key.clone(),
                        StoredRecord {
                            data: data.clone(),
                            version: 1,
                        },
                    );
                }
                Write::Update {
                    key,
                    data,
                    expected_version,
                } => {
                    let current = current.ok_or_else(|| {
                        LedgerError::PersistenceError(format!("{} does not exist", key))
                    })?;
                    if current.version != *expected_version {
                        return Err(LedgerError::VersionConflict(key.to_uri()));
                    }
                    pending.insert(
                        key.clone(),
                        StoredRecord {
                            data: data.clone(),
                            version: current.version + 1,
                        },
                    );
                }
            }
        }

        records.extend(pending);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> RecordKey {
        RecordKey::new("org.viridian.UserContact", id)
    }

    fn insert(id: &str, data: &str) -> Write {
        Write::Insert {
            key: key(id),
            data: data.to_string(),
        }
    }

    fn batch(writes: Vec<Write>) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for write in writes {
            batch.push(write);
        }
        batch
    }

    fn stores() -> Vec<Box<dyn RecordStore>> {
        vec![
            Box::new(InMemoryStore::new()),
            Box::new(Database::open_in_memory().unwrap()),
        ]
    }

    #[test]
    fn test_database_open() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_insert_then_get() {
        for store in stores() {
            store.apply(&batch(vec![insert("c1", "{}")])).unwrap();
            let record = store.get(&key("c1")).unwrap().unwrap();
            assert_eq!(record.data, "{}");
            assert_eq!(record.version, 1);
            assert!(store.get(&key("c2")).unwrap().is_none());
        }
    }

    #[test]
    fn test_duplicate_insert_rolls_back_whole_batch() {
        for store in stores() {
            store.apply(&batch(vec![insert("c1", "{}")])).unwrap();

            let err = store
                .apply(&batch(vec![insert("c2", "{}"), insert("c1", "{}")]))
                .unwrap_err();
            assert_eq!(
                err,
                LedgerError::DuplicateKey("resource:org.viridian.UserContact#c1".to_string())
            );
            assert!(store.get(&key("c2")).unwrap().is_none());
        }
    }

    #[test]
    fn test_update_checks_version() {
        for store in stores() {
            store.apply(&batch(vec![insert("c1", "a")])).unwrap();

            let update = |data: &str, expected_version| Write::Update {
                key: key("c1"),
                data: data.to_string(),
                expected_version,
            };

            store.apply(&batch(vec![update("b", 1)])).unwrap();
            let record = store.get(&key("c1")).unwrap().unwrap();
            assert_eq!(record.data, "b");
            assert_eq!(record.version, 2);

            let err = store.apply(&batch(vec![update("c", 1)])).unwrap_err();
            assert!(matches!(err, LedgerError::VersionConflict(_)));
            assert_eq!(store.get(&key("c1")).unwrap().unwrap().data, "b");
        }
    }

    #[test]
    fn test_update_of_missing_record_fails() {
        for store in stores() {
            let err = store
                .apply(&batch(vec![Write::Update {
                    key: key("ghost"),
                    data: "x".to_string(),
                    expected_version: 1,
                }]))
                .unwrap_err();
            assert!(matches!(err, LedgerError::PersistenceError(_)));
        }
    }

    #[test]
    fn test_list_filters_by_type() {
        for store in stores() {
            store
                .apply(&batch(vec![
                    insert("c2", "two"),
                    insert("c1", "one"),
                    Write::Insert {
                        key: RecordKey::new("org.viridian.UserSecret", "s1"),
                        data: "secret".to_string(),
                    },
                ]))
                .unwrap();

            let ids: Vec<String> = store
                .list("org.viridian.UserContact")
                .unwrap()
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);
        }
    }

    #[test]
    fn test_database_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::open(path).unwrap();
            db.apply(&batch(vec![insert("c1", "persisted")])).unwrap();
        }

        let db = Database::open(path).unwrap();
        assert_eq!(db.get(&key("c1")).unwrap().unwrap().data, "persisted");
    }
}
