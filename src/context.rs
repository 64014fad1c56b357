//! What a handler is given to work with: registries, a factory and the
//! metadata of the transaction being executed.

use crate::error::{LedgerError, Result};
use crate::factory::Factory;
use crate::model::{Asset, Organization, Participant, Person, Relationship, Resource, User};
use crate::persistence::RecordStore;
use crate::registry::{Registry, Staging};
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct ExecutionContext<'a> {
    factory: &'a Factory,
    transaction_id: &'a str,
    timestamp: DateTime<Utc>,
    staging: Staging,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(store: Arc<dyn RecordStore>, factory: &'a Factory, tx: &'a Transaction) -> Self {
        ExecutionContext {
            factory,
            transaction_id: &tx.transaction_id,
            timestamp: tx.timestamp,
            staging: Staging::new(store),
        }
    }

    pub fn factory(&self) -> &'a Factory {
        self.factory
    }

    pub fn transaction_id(&self) -> &'a str {
        self.transaction_id
    }

    /// Transaction timestamp; handlers use it instead of the local clock
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn participant_registry<R: Participant>(&mut self) -> Registry<'_, R> {
        let record_type = self.factory.qualified_type::<R>();
        Registry::new(&mut self.staging, record_type)
    }

    pub fn asset_registry<R: Asset>(&mut self) -> Registry<'_, R> {
        let record_type = self.factory.qualified_type::<R>();
        Registry::new(&mut self.staging, record_type)
    }

    /// Check that `rel` names an existing user of any kind
    pub fn resolve_user(&mut self, rel: &Relationship) -> Result<()> {
        match rel.type_name() {
            t if t == User::TYPE => self.participant_registry::<User>().resolve(rel).map(drop),
            t if t == Person::TYPE => self.participant_registry::<Person>().resolve(rel).map(drop),
            t if t == Organization::TYPE => self
                .participant_registry::<Organization>()
                .resolve(rel)
                .map(drop),
            _ => Err(LedgerError::ReferenceResolutionError(format!(
                "{} is not a user",
                rel
            ))),
        }
    }

    pub fn into_staging(self) -> Staging {
        self.staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;
    use crate::transaction::{TransactionPayload, VerifyUserContact};
    use chrono::TimeZone;

    fn tx() -> Transaction {
        Transaction::new(
            "tx-ctx",
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            TransactionPayload::VerifyUserContact(VerifyUserContact {
                secret: Relationship::new("org.viridian", "UserSecret", "s1"),
                value: "x".to_string(),
            }),
        )
    }

    #[test]
    fn test_resolves_users_of_every_kind() {
        let factory = Factory::default();
        let tx = tx();
        let mut ctx = ExecutionContext::new(Arc::new(InMemoryStore::new()), &factory, &tx);

        let ts = ctx.timestamp();
        ctx.participant_registry::<Organization>()
            .add(&Organization::new("acme", ts))
            .unwrap();
        ctx.participant_registry::<User>()
            .add(&User::new("plain", ts))
            .unwrap();

        ctx.resolve_user(&factory.new_relationship::<Organization>("acme"))
            .unwrap();
        ctx.resolve_user(&factory.new_relationship::<User>("plain"))
            .unwrap();
        assert!(ctx
            .resolve_user(&factory.new_relationship::<Person>("acme"))
            .is_err());
        assert!(ctx
            .resolve_user(&factory.new_relationship::<crate::model::UserContact>("c1"))
            .is_err());
    }

    #[test]
    fn test_exposes_transaction_metadata() {
        let factory = Factory::default();
        let tx = tx();
        let ctx = ExecutionContext::new(Arc::new(InMemoryStore::new()), &factory, &tx);
        assert_eq!(ctx.transaction_id(), "tx-ctx");
        assert_eq!(ctx.timestamp(), tx.timestamp);
        assert_eq!(ctx.factory().namespace(), "org.viridian");
    }
}
