//! Transaction processor functions, one handler per transaction type.
//!
//! Handlers receive their collaborators explicitly: registries and the
//! factory through the [`ExecutionContext`], anything else (such as the
//! secret provider) through their constructor.

pub mod contact;
pub mod organization;
pub mod person;
pub mod verification;

pub use contact::ContactRegistrationHandler;
pub use organization::OrganizationUpdateHandler;
pub use person::PersonUpdateHandler;
pub use verification::ContactVerificationHandler;

use crate::context::ExecutionContext;
use crate::error::Result;

pub trait TransactionHandler {
    type Payload;

    /// Stage the record changes for one transaction. Any error aborts the
    /// whole transaction.
    fn execute(&self, ctx: &mut ExecutionContext<'_>, tx: &Self::Payload) -> Result<()>;
}
