use super::TransactionHandler;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::model::Person;
use crate::patch::apply_field;
use crate::transaction::UpdatePersonData;
use tracing::debug;

/// Lets a personal user update their own profile data
#[derive(Debug, Default, Clone, Copy)]
pub struct PersonUpdateHandler;

impl TransactionHandler for PersonUpdateHandler {
    type Payload = UpdatePersonData;

    fn execute(&self, ctx: &mut ExecutionContext<'_>, tx: &UpdatePersonData) -> Result<()> {
        let mut registry = ctx.participant_registry::<Person>();
        let mut person = registry.resolve(&tx.person)?;

        let patched: Vec<&str> = [
            ("avatarUrl", &mut person.user.avatar_url, &tx.avatar_url),
            ("publicEmail", &mut person.user.public_email, &tx.public_email),
            ("bio", &mut person.user.bio, &tx.bio),
            ("realName", &mut person.real_name, &tx.real_name),
            ("url", &mut person.url, &tx.url),
            ("location", &mut person.location, &tx.location),
        ]
        .into_iter()
        .filter_map(|(name, target, incoming)| apply_field(target, incoming.as_ref()).then_some(name))
        .collect();

        debug!(person = %tx.person, fields = ?patched, "updating person");
        registry.update(&person)
    }
}
