use super::TransactionHandler;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::model::Organization;
use crate::patch::apply_field;
use crate::transaction::UpdateOrganizationData;
use tracing::debug;

/// Lets an organizational user update their own profile data
#[derive(Debug, Default, Clone, Copy)]
pub struct OrganizationUpdateHandler;

impl TransactionHandler for OrganizationUpdateHandler {
    type Payload = UpdateOrganizationData;

    fn execute(&self, ctx: &mut ExecutionContext<'_>, tx: &UpdateOrganizationData) -> Result<()> {
        let mut registry = ctx.participant_registry::<Organization>();
        let mut org = registry.resolve(&tx.organization)?;

        let patched: Vec<&str> = [
            ("avatarUrl", &mut org.user.avatar_url, &tx.avatar_url),
            ("publicEmail", &mut org.user.public_email, &tx.public_email),
            ("bio", &mut org.user.bio, &tx.bio),
            ("orgName", &mut org.org_name, &tx.org_name),
            ("url", &mut org.url, &tx.url),
            ("country", &mut org.country, &tx.country),
            ("address", &mut org.address, &tx.address),
        ]
        .into_iter()
        .filter_map(|(name, target, incoming)| apply_field(target, incoming.as_ref()).then_some(name))
        .collect();

        debug!(organization = %tx.organization, fields = ?patched, "updating organization");
        registry.update(&org)
    }
}
