//! Per-transaction staged view of the record store and typed registries
//!
//! Handlers never touch the store directly. Reads go through [`Staging`],
//! which layers the transaction's own pending writes over the committed
//! records, and writes are collected into a [`WriteBatch`] that the runtime
//! applies atomically once the handler returns.

use crate::error::{LedgerError, Result};
use crate::model::{Relationship, Resource};
use crate::persistence::{RecordKey, RecordStore, Write, WriteBatch};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
enum Pending {
    Insert { data: String },
    Update { data: String, expected_version: u64 },
}

pub struct Staging {
    store: Arc<dyn RecordStore>,
    pending: HashMap<RecordKey, Pending>,
    order: Vec<RecordKey>,
    // Versions observed on first read; updates are checked against them at commit
    read_versions: HashMap<RecordKey, u64>,
}

impl Staging {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Staging {
            store,
            pending: HashMap::new(),
            order: Vec::new(),
            read_versions: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: &RecordKey) -> Result<Option<String>> {
        if let Some(pending) = self.pending.get(key) {
            return Ok(Some(match pending {
                Pending::Insert { data } | Pending::Update { data, .. } => data.clone(),
            }));
        }

        match self.store.get(key)? {
            Some(record) => {
                self.read_versions.entry(key.clone()).or_insert(record.version);
                Ok(Some(record.data))
            }
            None => Ok(None),
        }
    }

    pub fn exists(&mut self, key: &RecordKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn insert(&mut self, key: RecordKey, data: String) -> Result<()> {
        if self.exists(&key)? {
            return Err(LedgerError::DuplicateKey(key.to_uri()));
        }
        debug!(record = %key, "staged insert");
        self.order.push(key.clone());
        self.pending.insert(key, Pending::Insert { data });
        Ok(())
    }

    pub fn update(&mut self, key: RecordKey, data: String) -> Result<()> {
        if let Some(pending) = self.pending.get_mut(&key) {
            match pending {
                Pending::Insert { data: staged } | Pending::Update { data: staged, .. } => {
                    *staged = data
                }
            }
            return Ok(());
        }

        let expected_version = match self.read_versions.get(&key) {
            Some(version) => *version,
            None => self
                .store
                .get(&key)?
                .map(|record| record.version)
                .ok_or_else(|| LedgerError::PersistenceError(format!("{} does not exist", key)))?,
        };

        debug!(record = %key, expected_version, "staged update");
        self.order.push(key.clone());
        self.pending.insert(
            key,
            Pending::Update {
                data,
                expected_version,
            },
        );
        Ok(())
    }

    /// URIs of records this transaction creates, in creation order
    pub fn created(&self) -> Vec<String> {
        self.keys_where(|p| matches!(p, Pending::Insert { .. }))
    }

    /// URIs of existing records this transaction modifies
    pub fn updated(&self) -> Vec<String> {
        self.keys_where(|p| matches!(p, Pending::Update { .. }))
    }

    fn keys_where(&self, pred: impl Fn(&Pending) -> bool) -> Vec<String> {
        self.order
            .iter()
            .filter(|key| self.pending.get(*key).is_some_and(&pred))
            .map(RecordKey::to_uri)
            .collect()
    }

    pub fn into_batch(mut self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for key in self.order {
            match self.pending.remove(&key) {
                Some(Pending::Insert { data }) => batch.push(Write::Insert { key, data }),
                Some(Pending::Update {
                    data,
                    expected_version,
                }) => batch.push(Write::Update {
                    key,
                    data,
                    expected_version,
                }),
                None => {}
            }
        }
        batch
    }
}

/// Typed access to the records of one type
pub struct Registry<'a, R: Resource> {
    staging: &'a mut Staging,
    record_type: String,
    _marker: PhantomData<R>,
}

impl<'a, R: Resource> Registry<'a, R> {
    pub fn new(staging: &'a mut Staging, record_type: String) -> Self {
        Registry {
            staging,
            record_type,
            _marker: PhantomData,
        }
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    fn key(&self, id: &str) -> RecordKey {
        RecordKey::new(self.record_type.clone(), id)
    }

    pub fn find(&mut self, id: &str) -> Result<Option<R>> {
        let key = self.key(id);
        match self.staging.get(&key)? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    pub fn get(&mut self, id: &str) -> Result<R> {
        self.find(id)?.ok_or_else(|| {
            LedgerError::ReferenceResolutionError(format!("{} not found", self.key(id)))
        })
    }

    pub fn exists(&mut self, id: &str) -> Result<bool> {
        let key = self.key(id);
        self.staging.exists(&key)
    }

    /// Follow a relationship into this registry
    pub fn resolve(&mut self, rel: &Relationship) -> Result<R> {
        if rel.fully_qualified_type() != self.record_type {
            return Err(LedgerError::ReferenceResolutionError(format!(
                "{} does not point into registry {}",
                rel, self.record_type
            )));
        }
        self.get(rel.id())
    }

    pub fn add(&mut self, record: &R) -> Result<()> {
        let key = self.key(record.identifier());
        let data = serde_json::to_string(record)?;
        self.staging.insert(key, data)
    }

    pub fn update(&mut self, record: &R) -> Result<()> {
        let key = self.key(record.identifier());
        let data = serde_json::to_string(record)?;
        self.staging.update(key, data)
    }
}
