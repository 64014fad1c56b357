//! Verification emails for newly registered contacts
//!
//! Handlers run on every replica, so they cannot send mail. Instead a
//! [`VerificationDispatcher`] scans committed contacts after the fact and
//! hands each pending one to a [`Notifier`]. Before sending, the dispatcher
//! claims the contact by inserting a [`NoticeDelivery`] with a unique key;
//! a second dispatcher racing on the same contact loses that insert and
//! sends nothing. A failed send marks the claim failed so the next run can
//! reclaim it. Notifiers receive an idempotency key so the mail backend can
//! drop a resend.

use crate::error::{LedgerError, Result};
use crate::factory::Factory;
use crate::model::{Relationship, Resource, UserContact, UserSecret};
use crate::persistence::{RecordKey, RecordStore, Write, WriteBatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone, PartialEq, Eq)]
pub struct VerificationNotice {
    pub contact: Relationship,
    pub user: Relationship,
    pub email: String,
    pub secret_id: String,
    pub secret: String,
    pub idempotency_key: String,
}

impl fmt::Debug for VerificationNotice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VerificationNotice")
            .field("contact", &self.contact)
            .field("user", &self.user)
            .field("email", &self.email)
            .field("secret_id", &self.secret_id)
            .field("idempotency_key", &self.idempotency_key)
            .finish_non_exhaustive()
    }
}

pub trait Notifier: Send + Sync {
    fn send_verification(&self, notice: &VerificationNotice) -> Result<()>;
}

/// Writes notices to the log instead of sending mail
pub struct LogNotifier {
    sender: String,
}

impl LogNotifier {
    pub fn new(sender: impl Into<String>) -> Self {
        LogNotifier {
            sender: sender.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn send_verification(&self, notice: &VerificationNotice) -> Result<()> {
        info!(
            from = %self.sender,
            to = %notice.email,
            contact = %notice.contact,
            secret_id = %notice.secret_id,
            key = %notice.idempotency_key,
            "verification email"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryState {
    /// A dispatcher owns the contact and is sending
    Claimed,
    Delivered,
    /// The last send failed; any dispatcher may reclaim
    Failed,
}

/// Per-contact claim on the verification email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeDelivery {
    pub contact_id: String,
    pub idempotency_key: String,
    pub state: DeliveryState,
    pub updated_at: DateTime<Utc>,
}

impl Resource for NoticeDelivery {
    const TYPE: &'static str = "NoticeDelivery";

    fn identifier(&self) -> &str {
        &self.contact_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct VerificationDispatcher {
    store: Arc<dyn RecordStore>,
    factory: Factory,
    notifier: Arc<dyn Notifier>,
}

impl VerificationDispatcher {
    pub fn new(store: Arc<dyn RecordStore>, factory: Factory, notifier: Arc<dyn Notifier>) -> Self {
        VerificationDispatcher {
            store,
            factory,
            notifier,
        }
    }

    /// Send one notice for every unverified contact that has none yet
    pub fn dispatch_pending(&self, now: DateTime<Utc>) -> Result<DispatchReport> {
        let secrets = self.secrets_by_contact()?;
        let delivery_type = self.factory.qualified_type::<NoticeDelivery>();
        let mut report = DispatchReport::default();

        for (_, record) in self.store.list(&self.factory.qualified_type::<UserContact>())? {
            let contact: UserContact = serde_json::from_str(&record.data)?;
            if contact.verified {
                report.skipped += 1;
                continue;
            }

            let contact_rel = self.factory.new_relationship::<UserContact>(contact.id.clone());
            let Some(secret) = secrets.get(&contact_rel) else {
                warn!(contact = %contact_rel, "contact has no secret; not notifying");
                report.failed += 1;
                continue;
            };

            let notice = VerificationNotice {
                idempotency_key: idempotency_key(&contact_rel),
                contact: contact_rel,
                user: contact.user.clone(),
                email: contact.email.clone(),
                secret_id: secret.id.clone(),
                secret: secret.secret.clone(),
            };

            let key = RecordKey::new(delivery_type.clone(), contact.id.clone());
            let Some(claim_version) = self.claim(&key, &contact.id, &notice, now)? else {
                report.skipped += 1;
                continue;
            };

            match self.notifier.send_verification(&notice) {
                Ok(()) => {
                    self.settle(
                        key,
                        &contact.id,
                        &notice,
                        DeliveryState::Delivered,
                        claim_version,
                        now,
                    )?;
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(contact = %notice.contact, error = %e, "verification email failed");
                    self.settle(
                        key,
                        &contact.id,
                        &notice,
                        DeliveryState::Failed,
                        claim_version,
                        now,
                    )?;
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Take ownership of a contact's notice. Returns the version of the
    /// claim record, or `None` if another dispatcher owns or finished it.
    fn claim(
        &self,
        key: &RecordKey,
        contact_id: &str,
        notice: &VerificationNotice,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        let data = delivery_json(contact_id, notice, DeliveryState::Claimed, now)?;
        let (write, version) = match self.store.get(key)? {
            None => (
                Write::Insert {
                    key: key.clone(),
                    data,
                },
                1,
            ),
            Some(existing) => {
                let delivery: NoticeDelivery = serde_json::from_str(&existing.data)?;
                if delivery.state != DeliveryState::Failed {
                    return Ok(None);
                }
                (
                    Write::Update {
                        key: key.clone(),
                        data,
                        expected_version: existing.version,
                    },
                    existing.version + 1,
                )
            }
        };

        let mut batch = WriteBatch::new();
        batch.push(write);
        match self.store.apply(&batch) {
            Ok(()) => Ok(Some(version)),
            Err(LedgerError::DuplicateKey(_)) | Err(LedgerError::VersionConflict(_)) => {
                info!(contact = %notice.contact, "notice claimed by another dispatcher");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn settle(
        &self,
        key: RecordKey,
        contact_id: &str,
        notice: &VerificationNotice,
        state: DeliveryState,
        claim_version: u64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.push(Write::Update {
            key,
            data: delivery_json(contact_id, notice, state, now)?,
            expected_version: claim_version,
        });
        self.store.apply(&batch)
    }

    fn secrets_by_contact(&self) -> Result<HashMap<Relationship, UserSecret>> {
        let mut secrets = HashMap::new();
        for (_, record) in self.store.list(&self.factory.qualified_type::<UserSecret>())? {
            let secret: UserSecret = serde_json::from_str(&record.data)?;
            secrets.insert(secret.contact.clone(), secret);
        }
        Ok(secrets)
    }
}

fn delivery_json(
    contact_id: &str,
    notice: &VerificationNotice,
    state: DeliveryState,
    now: DateTime<Utc>,
) -> Result<String> {
    Ok(serde_json::to_string(&NoticeDelivery {
        contact_id: contact_id.to_string(),
        idempotency_key: notice.idempotency_key.clone(),
        state,
        updated_at: now,
    })?)
}

fn idempotency_key(contact: &Relationship) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"viridian-verification-notice");
    hasher.update(contact.to_uri().as_bytes());
    hex::encode(hasher.finalize())
}
