//! Transaction types for the Viridian business network
use crate::error::{LedgerError, Result};
use crate::model::{Organization, Person, Relationship, Resource, User, UserSecret};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

const MAX_FIELD_LENGTH: usize = 2048;
const MAX_EMAIL_LENGTH: usize = 254;

/// A submitted unit of work. `transaction_id` and `timestamp` are assigned
/// by the submitter and are identical on every replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: TransactionPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$class")]
pub enum TransactionPayload {
    UpdatePersonData(UpdatePersonData),
    UpdateOrganizationData(UpdateOrganizationData),
    CreateUserContact(CreateUserContact),
    VerifyUserContact(VerifyUserContact),
}

impl TransactionPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            TransactionPayload::UpdatePersonData(_) => "UpdatePersonData",
            TransactionPayload::UpdateOrganizationData(_) => "UpdateOrganizationData",
            TransactionPayload::CreateUserContact(_) => "CreateUserContact",
            TransactionPayload::VerifyUserContact(_) => "VerifyUserContact",
        }
    }
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: TransactionPayload,
    ) -> Self {
        Transaction {
            transaction_id: transaction_id.into(),
            timestamp,
            payload,
        }
    }

    /// Schema checks run before any handler sees the transaction
    pub fn validate(&self, namespace: &str) -> Result<()> {
        validate_identifier("transactionId", &self.transaction_id)?;
        self.validate_size()?;

        match &self.payload {
            TransactionPayload::UpdatePersonData(tx) => {
                expect_reference::<Person>("person", &tx.person, namespace)?;
                for (name, value) in tx.fields() {
                    validate_optional(name, value)?;
                }
            }
            TransactionPayload::UpdateOrganizationData(tx) => {
                expect_reference::<Organization>("organization", &tx.organization, namespace)?;
                for (name, value) in tx.fields() {
                    validate_optional(name, value)?;
                }
            }
            TransactionPayload::CreateUserContact(tx) => {
                validate_identifier("contactId", &tx.contact_id)?;
                validate_identifier("secretId", &tx.secret_id)?;
                expect_user_reference(&tx.user, namespace)?;
                validate_email(&tx.email)?;
            }
            TransactionPayload::VerifyUserContact(tx) => {
                expect_reference::<UserSecret>("secret", &tx.secret, namespace)?;
                if tx.value.is_empty() {
                    return Err(LedgerError::ValidationError(
                        "value must not be empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<()> {
        let serialized = serde_json::to_vec(self)?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(LedgerError::ValidationError(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}

/// Let a personal user update their own profile data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePersonData {
    pub person: Relationship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UpdatePersonData {
    pub fn new(person: Relationship) -> Self {
        UpdatePersonData {
            person,
            avatar_url: None,
            public_email: None,
            bio: None,
            real_name: None,
            url: None,
            location: None,
        }
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 6] {
        [
            ("avatarUrl", &self.avatar_url),
            ("publicEmail", &self.public_email),
            ("bio", &self.bio),
            ("realName", &self.real_name),
            ("url", &self.url),
            ("location", &self.location),
        ]
    }
}

/// Let an organizational user update their own profile data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationData {
    pub organization: Relationship,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UpdateOrganizationData {
    pub fn new(organization: Relationship) -> Self {
        UpdateOrganizationData {
            organization,
            avatar_url: None,
            public_email: None,
            bio: None,
            org_name: None,
            url: None,
            country: None,
            address: None,
        }
    }

    fn fields(&self) -> [(&'static str, &Option<String>); 7] {
        [
            ("avatarUrl", &self.avatar_url),
            ("publicEmail", &self.public_email),
            ("bio", &self.bio),
            ("orgName", &self.org_name),
            ("url", &self.url),
            ("country", &self.country),
            ("address", &self.address),
        ]
    }
}

/// Register an email address for a user, with a secret for verifying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserContact {
    pub contact_id: String,
    pub secret_id: String,
    pub user: Relationship,
    pub email: String,
}

/// Prove ownership of a contact by presenting its secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyUserContact {
    pub secret: Relationship,
    pub value: String,
}

fn validate_identifier(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::ValidationError(format!(
            "{} must not be empty",
            field
        )));
    }
    if id.contains('#') {
        return Err(LedgerError::ValidationError(format!(
            "{} must not contain '#'",
            field
        )));
    }
    if id.len() > MAX_FIELD_LENGTH {
        return Err(LedgerError::ValidationError(format!(
            "{} too long (max {} characters)",
            field, MAX_FIELD_LENGTH
        )));
    }
    Ok(())
}

fn validate_optional(field: &str, value: &Option<String>) -> Result<()> {
    match value {
        Some(v) if v.len() > MAX_FIELD_LENGTH => Err(LedgerError::ValidationError(format!(
            "{} too long (max {} characters)",
            field, MAX_FIELD_LENGTH
        ))),
        _ => Ok(()),
    }
}

fn validate_email(email: &str) -> Result<()> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(LedgerError::ValidationError(format!(
            "email too long (max {} characters)",
            MAX_EMAIL_LENGTH
        )));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(LedgerError::ValidationError(
            "email must not contain whitespace".to_string(),
        ));
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(LedgerError::ValidationError(format!(
            "'{}' is not an email address",
            email
        ))),
    }
}

fn expect_reference<R: Resource>(field: &str, rel: &Relationship, namespace: &str) -> Result<()> {
    if rel.namespace() != namespace || !rel.targets::<R>() {
        return Err(LedgerError::ValidationError(format!(
            "{} must reference a {}.{}, got {}",
            field,
            namespace,
            R::TYPE,
            rel
        )));
    }
    Ok(())
}

fn expect_user_reference(rel: &Relationship, namespace: &str) -> Result<()> {
    let is_user = rel.targets::<User>() || rel.targets::<Person>() || rel.targets::<Organization>();
    if rel.namespace() != namespace || !is_user {
        return Err(LedgerError::ValidationError(format!(
            "user must reference a {} participant, got {}",
            namespace, rel
        )));
    }
    Ok(())
}
