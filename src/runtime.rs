//! Executes validated transactions against a record store
//!
//! One submission is one atomic unit: the handler stages its reads and
//! writes in an [`ExecutionContext`], the runtime appends a
//! [`HistorianRecord`], and the whole batch is applied in a single
//! [`RecordStore::apply`]. Any error discards the staged writes.

use crate::config::Config;
use crate::context::ExecutionContext;
use crate::error::{LedgerError, Result};
use crate::factory::Factory;
use crate::handlers::{
    ContactRegistrationHandler, ContactVerificationHandler, OrganizationUpdateHandler,
    PersonUpdateHandler, TransactionHandler,
};
use crate::model::{HistorianRecord, Participant, Resource};
use crate::persistence::{Database, RecordKey, RecordStore, Write, WriteBatch};
use crate::secret::{DerivedSecretProvider, SecretProvider};
use crate::transaction::{Transaction, TransactionPayload};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_id: String,
    pub transaction_type: String,
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

pub struct Runtime {
    store: Arc<dyn RecordStore>,
    factory: Factory,
    person_updates: PersonUpdateHandler,
    organization_updates: OrganizationUpdateHandler,
    contact_registration: ContactRegistrationHandler,
    contact_verification: ContactVerificationHandler,
}

impl Runtime {
    pub fn new(
        store: Arc<dyn RecordStore>,
        factory: Factory,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Runtime {
            store,
            factory,
            person_updates: PersonUpdateHandler,
            organization_updates: OrganizationUpdateHandler,
            contact_registration: ContactRegistrationHandler::new(secrets),
            contact_verification: ContactVerificationHandler,
        }
    }

    /// Open the configured SQLite database and derive secrets from the
    /// configured network key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::IoError(format!("Failed to create data dir {:?}: {}", parent, e))
                })?;
            }
        }

        let store = Database::open(&config.database.path)?;
        let secrets = DerivedSecretProvider::new(
            config.secrets.network_key.as_bytes(),
            config.secrets.length,
        )?;

        Ok(Runtime::new(
            Arc::new(store),
            Factory::new(config.network.namespace.clone()),
            Arc::new(secrets),
        ))
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Validate, execute and commit one transaction
    pub fn submit(&self, tx: &Transaction) -> Result<Receipt> {
        let result = tx
            .validate(self.factory.namespace())
            .and_then(|()| self.execute(tx));

        match &result {
            Ok(receipt) => info!(
                transaction = %receipt.transaction_id,
                kind = %receipt.transaction_type,
                created = receipt.created.len(),
                updated = receipt.updated.len(),
                "transaction committed"
            ),
            Err(e) => warn!(
                transaction = %tx.transaction_id,
                kind = tx.payload.type_name(),
                persistence = e.is_persistence(),
                error = %e,
                "transaction rejected"
            ),
        }
        result
    }

    fn execute(&self, tx: &Transaction) -> Result<Receipt> {
        let historian_key = RecordKey::new(
            self.factory.qualified_type::<HistorianRecord>(),
            tx.transaction_id.clone(),
        );
        if self.store.get(&historian_key)?.is_some() {
            return Err(already_submitted(tx));
        }

        let mut ctx = ExecutionContext::new(self.store.clone(), &self.factory, tx);
        match &tx.payload {
            TransactionPayload::UpdatePersonData(p) => self.person_updates.execute(&mut ctx, p)?,
            TransactionPayload::UpdateOrganizationData(p) => {
                self.organization_updates.execute(&mut ctx, p)?
            }
            TransactionPayload::CreateUserContact(p) => {
                self.contact_registration.execute(&mut ctx, p)?
            }
            TransactionPayload::VerifyUserContact(p) => {
                self.contact_verification.execute(&mut ctx, p)?
            }
        }

        let mut staging = ctx.into_staging();
        let record = HistorianRecord {
            transaction_id: tx.transaction_id.clone(),
            transaction_type: tx.payload.type_name().to_string(),
            timestamp: tx.timestamp,
            created: staging.created(),
            updated: staging.updated(),
        };
        let historian_uri = historian_key.to_uri();
        staging.insert(historian_key, serde_json::to_string(&record)?)?;

        // A racing submission of the same id loses on the historian insert
        self.store
            .apply(&staging.into_batch())
            .map_err(|e| historian_conflict(e, &historian_uri, tx))?;

        Ok(Receipt {
            transaction_id: record.transaction_id,
            transaction_type: record.transaction_type,
            created: record.created,
            updated: record.updated,
        })
    }

    /// Bootstrap a participant outside of any transaction
    pub fn add_participant<R: Participant>(&self, record: &R) -> Result<()> {
        add_participant(self.store.as_ref(), &self.factory, record)
    }

    /// Committed state of one record
    pub fn get<R: Resource>(&self, id: &str) -> Result<Option<R>> {
        let key = RecordKey::new(self.factory.qualified_type::<R>(), id);
        match self.store.get(&key)? {
            Some(record) => Ok(Some(serde_json::from_str(&record.data)?)),
            None => Ok(None),
        }
    }

    /// Committed transactions, ordered by timestamp
    pub fn history(&self) -> Result<Vec<HistorianRecord>> {
        load_history(self.store.as_ref(), &self.factory)
    }
}

/// Insert a participant directly into `store`
pub fn add_participant<R: Participant>(
    store: &dyn RecordStore,
    factory: &Factory,
    record: &R,
) -> Result<()> {
    let mut batch = WriteBatch::new();
    batch.push(Write::Insert {
        key: RecordKey::new(factory.qualified_type::<R>(), record.identifier()),
        data: serde_json::to_string(record)?,
    });
    store.apply(&batch)?;
    info!(kind = R::TYPE, id = record.identifier(), "participant added");
    Ok(())
}

/// Historian records of a store, ordered by timestamp
pub fn load_history(store: &dyn RecordStore, factory: &Factory) -> Result<Vec<HistorianRecord>> {
    let mut records = store
        .list(&factory.qualified_type::<HistorianRecord>())?
        .into_iter()
        .map(|(_, record)| serde_json::from_str::<HistorianRecord>(&record.data))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    records.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.transaction_id.cmp(&b.transaction_id))
    });
    Ok(records)
}

fn historian_conflict(err: LedgerError, historian_uri: &str, tx: &Transaction) -> LedgerError {
    match err {
        LedgerError::DuplicateKey(ref key) if key == historian_uri => already_submitted(tx),
        other => other,
    }
}

fn already_submitted(tx: &Transaction) -> LedgerError {
    LedgerError::DuplicateKey(format!(
        "transaction {} was already submitted",
        tx.transaction_id
    ))
}
