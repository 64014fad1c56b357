use super::TransactionHandler;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::model::{UserContact, UserSecret};
use crate::secret::{SecretContext, SecretProvider};
use crate::transaction::CreateUserContact;
use std::sync::Arc;
use tracing::info;

/// Registers an email address for a user together with the secret that
/// later proves ownership of it.
///
/// The contact is always staged before its secret. Sending the
/// verification email is left to
/// [`VerificationDispatcher`](crate::notify::VerificationDispatcher), which
/// observes committed contacts; the handler itself has no outbound effects.
pub struct ContactRegistrationHandler {
    secrets: Arc<dyn SecretProvider>,
}

impl ContactRegistrationHandler {
    pub fn new(secrets: Arc<dyn SecretProvider>) -> Self {
        ContactRegistrationHandler { secrets }
    }
}

impl TransactionHandler for ContactRegistrationHandler {
    type Payload = CreateUserContact;

    fn execute(&self, ctx: &mut ExecutionContext<'_>, tx: &CreateUserContact) -> Result<()> {
        ctx.resolve_user(&tx.user)?;

        let factory = ctx.factory();
        let contact =
            factory.new_user_contact(&tx.contact_id, tx.user.clone(), &tx.email, ctx.timestamp());
        ctx.asset_registry::<UserContact>().add(&contact)?;

        let value = self.secrets.produce(&SecretContext {
            transaction_id: ctx.transaction_id(),
            timestamp: ctx.timestamp(),
            contact_id: &contact.id,
            secret_id: &tx.secret_id,
        })?;
        let secret = factory.new_user_secret(&tx.secret_id, &contact, value);
        ctx.asset_registry::<UserSecret>().add(&secret)?;

        info!(contact = %contact.id, user = %tx.user, "registered user contact");
        Ok(())
    }
}
