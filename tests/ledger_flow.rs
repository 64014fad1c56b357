//! Integration tests running transactions against an on-disk ledger

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use viridian::config::Config;
use viridian::error::LedgerError;
use viridian::model::{Organization, Person, UserContact, UserSecret};
use viridian::notify::{LogNotifier, VerificationDispatcher};
use viridian::runtime::Runtime;
use viridian::transaction::{
    CreateUserContact, Transaction, TransactionPayload, UpdateOrganizationData,
    UpdatePersonData, VerifyUserContact,
};

/// Helper to build a runtime over a fresh SQLite file
fn open_runtime(dir: &TempDir, key: &str) -> Result<Runtime, Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.database.path = dir
        .path()
        .join("data")
        .join("ledger.db")
        .to_string_lossy()
        .into_owned();
    config.secrets.network_key = key.to_string();
    Ok(Runtime::from_config(&config)?)
}

fn at(minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
}

fn seed(runtime: &Runtime) -> Result<(), Box<dyn std::error::Error>> {
    let mut alice = Person::new("alice", at(0));
    alice.user.avatar_url = Some("old.png".to_string());
    alice.user.bio = Some("old bio".to_string());
    runtime.add_participant(&alice)?;

    let mut acme = Organization::new("acme", at(0));
    acme.org_name = Some("Acme Ltd".to_string());
    runtime.add_participant(&acme)?;
    Ok(())
}

fn register(runtime: &Runtime, tx_id: &str, contact_id: &str, secret_id: &str) -> Transaction {
    Transaction::new(
        tx_id,
        at(5),
        TransactionPayload::CreateUserContact(CreateUserContact {
            contact_id: contact_id.to_string(),
            secret_id: secret_id.to_string(),
            user: runtime.factory().new_relationship::<Person>("alice"),
            email: "a@b.com".to_string(),
        }),
    )
}

#[test]
fn test_person_update_merges_fields() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let runtime = open_runtime(&dir, "network-key")?;
    seed(&runtime)?;

    let mut update = UpdatePersonData::new(runtime.factory().new_relationship::<Person>("alice"));
    update.bio = Some("new bio".to_string());
    runtime.submit(&Transaction::new(
        "tx-1",
        at(1),
        TransactionPayload::UpdatePersonData(update),
    ))?;

    let alice = runtime.get::<Person>("alice")?.ok_or("alice missing")?;
    assert_eq!(alice.user.avatar_url.as_deref(), Some("old.png"));
    assert_eq!(alice.user.bio.as_deref(), Some("new bio"));
    Ok(())
}

#[test]
fn test_organization_update_from_json() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let runtime = open_runtime(&dir, "network-key")?;
    seed(&runtime)?;

    let tx: Transaction = serde_json::from_str(
        r#"{
            "$class": "UpdateOrganizationData",
            "transactionId": "tx-org",
            "timestamp": "2024-03-01T12:02:00Z",
            "organization": "resource:org.viridian.Organization#acme",
            "url": "https://acme.example",
            "orgName": ""
        }"#,
    )?;
    let receipt = runtime.submit(&tx)?;
    assert_eq!(
        receipt.updated,
        vec!["resource:org.viridian.Organization#acme".to_string()]
    );

    let acme = runtime.get::<Organization>("acme")?.ok_or("acme missing")?;
    assert_eq!(acme.url.as_deref(), Some("https://acme.example"));
    assert_eq!(acme.org_name.as_deref(), Some("Acme Ltd"));

    // Same target, empty payload: nothing changes
    let untouched = UpdateOrganizationData::new(
        runtime.factory().new_relationship::<Organization>("acme"),
    );
    runtime.submit(&Transaction::new(
        "tx-org-2",
        at(3),
        TransactionPayload::UpdateOrganizationData(untouched),
    ))?;
    assert_eq!(runtime.get::<Organization>("acme")?, Some(acme));
    Ok(())
}

#[test]
fn test_contact_registration_example() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let runtime = open_runtime(&dir, "network-key")?;
    seed(&runtime)?;

    runtime.submit(&register(&runtime, "tx-1", "c1", "s1"))?;

    let contact = runtime.get::<UserContact>("c1")?.ok_or("contact missing")?;
    assert_eq!(contact.user.to_uri(), "resource:org.viridian.Person#alice");
    assert_eq!(contact.email, "a@b.com");
    assert_eq!(contact.timestamp, at(5));
    assert!(!contact.verified);

    let secret = runtime.get::<UserSecret>("s1")?.ok_or("secret missing")?;
    assert_eq!(secret.contact.to_uri(), "resource:org.viridian.UserContact#c1");
    assert_eq!(secret.secret.len(), 32);
    Ok(())
}

#[test]
fn test_duplicate_contact_creates_neither_record() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let runtime = open_runtime(&dir, "network-key")?;
    seed(&runtime)?;
    runtime.submit(&register(&runtime, "tx-1", "c1", "s1"))?;

    let err = runtime
        .submit(&register(&runtime, "tx-2", "c1", "s2"))
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateKey(_)));
    assert!(runtime.get::<UserSecret>("s2")?.is_none());
    assert_eq!(runtime.history()?.len(), 1);
    Ok(())
}

#[test]
fn test_replicas_commit_identical_records() -> Result<(), Box<dyn std::error::Error>> {
    let mut secrets = Vec::new();
    for _ in 0..2 {
        let dir = TempDir::new()?;
        let runtime = open_runtime(&dir, "shared-key")?;
        seed(&runtime)?;
        runtime.submit(&register(&runtime, "tx-1", "c1", "s1"))?;
        secrets.push((
            runtime.get::<UserContact>("c1")?,
            runtime.get::<UserSecret>("s1")?.map(|s| s.secret),
        ));
    }
    assert_eq!(secrets[0], secrets[1]);
    Ok(())
}

#[test]
fn test_register_notify_verify() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let runtime = open_runtime(&dir, "network-key")?;
    seed(&runtime)?;
    runtime.submit(&register(&runtime, "tx-1", "c1", "s1"))?;

    let dispatcher = VerificationDispatcher::new(
        runtime.store(),
        runtime.factory().clone(),
        Arc::new(LogNotifier::new("noreply@viridian.org")),
    );
    assert_eq!(dispatcher.dispatch_pending(at(6))?.sent, 1);
    assert_eq!(dispatcher.dispatch_pending(at(7))?.sent, 0);

    let secret = runtime.get::<UserSecret>("s1")?.ok_or("secret missing")?;
    runtime.submit(&Transaction::new(
        "tx-2",
        at(10),
        TransactionPayload::VerifyUserContact(VerifyUserContact {
            secret: runtime.factory().new_relationship::<UserSecret>("s1"),
            value: secret.secret,
        }),
    ))?;

    assert!(runtime.get::<UserContact>("c1")?.ok_or("contact missing")?.verified);
    let kinds: Vec<String> = runtime
        .history()?
        .into_iter()
        .map(|r| r.transaction_type)
        .collect();
    assert_eq!(kinds, vec!["CreateUserContact", "VerifyUserContact"]);
    Ok(())
}

#[test]
fn test_missing_network_key_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = dir.path().join("ledger.db").to_string_lossy().into_owned();
    assert!(matches!(
        Runtime::from_config(&config),
        Err(LedgerError::ConfigError(_))
    ));
}
