//! Contact verification, the process outside registration that flips
//! `UserContact::verified`. The registration and profile handlers never
//! update a contact once it is created; this handler is the only writer.

use super::TransactionHandler;
use crate::context::ExecutionContext;
use crate::error::{LedgerError, Result};
use crate::model::{UserContact, UserSecret};
use crate::transaction::VerifyUserContact;
use tracing::{debug, info};

/// Marks a contact verified once its owner presents the matching secret.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContactVerificationHandler;

impl TransactionHandler for ContactVerificationHandler {
    type Payload = VerifyUserContact;

    fn execute(&self, ctx: &mut ExecutionContext<'_>, tx: &VerifyUserContact) -> Result<()> {
        let secret = ctx.asset_registry::<UserSecret>().resolve(&tx.secret)?;

        if !constant_time_eq(secret.secret.as_bytes(), tx.value.as_bytes()) {
            return Err(LedgerError::ValidationError(format!(
                "secret {} does not match",
                secret.id
            )));
        }

        let mut contacts = ctx.asset_registry::<UserContact>();
        let mut contact = contacts.resolve(&secret.contact)?;
        if contact.verified {
            debug!(contact = %contact.id, "contact already verified");
            return Ok(());
        }

        contact.verified = true;
        contacts.update(&contact)?;
        info!(contact = %contact.id, "verified user contact");
        Ok(())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
