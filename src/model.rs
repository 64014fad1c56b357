//! Record types of the Viridian business network
//!
//! Participants (`User`, `Person`, `Organization`) and assets (`UserContact`,
//! `UserSecret`) are stored as JSON documents keyed by their fully qualified
//! type and identifier. References between records are [`Relationship`]s,
//! which serialize as `resource:<namespace>.<Type>#<id>` URIs.

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Default namespace of the business network
pub const DEFAULT_NAMESPACE: &str = "org.viridian";

const RESOURCE_SCHEME: &str = "resource:";

/// A record that can live in a registry.
pub trait Resource: Serialize + DeserializeOwned + Clone + fmt::Debug {
    /// Short type name, e.g. `Person`
    const TYPE: &'static str;

    /// Identifier, unique within the type
    fn identifier(&self) -> &str;
}

/// Marker for records kept in participant registries.
pub trait Participant: Resource {}

/// Marker for records kept in asset registries.
pub trait Asset: Resource {}

/// Non-owning reference to another record, resolved by identifier lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    namespace: String,
    type_name: String,
    id: String,
}

impl Relationship {
    pub fn new(
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Relationship {
            namespace: namespace.into(),
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Parse a `resource:<namespace>.<Type>#<id>` URI
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri.strip_prefix(RESOURCE_SCHEME).ok_or_else(|| {
            LedgerError::ValidationError(format!("Relationship '{}' lacks the resource: scheme", uri))
        })?;
        let (qualified, id) = rest.split_once('#').ok_or_else(|| {
            LedgerError::ValidationError(format!("Relationship '{}' has no identifier", uri))
        })?;
        let (namespace, type_name) = qualified.rsplit_once('.').ok_or_else(|| {
            LedgerError::ValidationError(format!("Relationship '{}' has no namespace", uri))
        })?;

        if namespace.is_empty() || type_name.is_empty() || id.is_empty() {
            return Err(LedgerError::ValidationError(format!(
                "Relationship '{}' is incomplete",
                uri
            )));
        }

        Ok(Relationship::new(namespace, type_name, id))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fully_qualified_type(&self) -> String {
        format!("{}.{}", self.namespace, self.type_name)
    }

    pub fn to_uri(&self) -> String {
        format!("{}{}#{}", RESOURCE_SCHEME, self.fully_qualified_type(), self.id)
    }

    /// True if this reference points at records of type `R`
    pub fn targets<R: Resource>(&self) -> bool {
        self.type_name == R::TYPE
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl Serialize for Relationship {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_uri())
    }
}

impl<'de> Deserialize<'de> for Relationship {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        Relationship::parse(&uri).map_err(serde::de::Error::custom)
    }
}

/// A network user. Person and Organization extend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reputation: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_comment_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_comment_deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl User {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        User {
            name: name.into(),
            created_at,
            reputation: 0,
            last_comment_at: None,
            last_comment_deleted_at: None,
            avatar_url: None,
            public_email: None,
            bio: None,
        }
    }
}

impl Resource for User {
    const TYPE: &'static str = "User";

    fn identifier(&self) -> &str {
        &self.name
    }
}

impl Participant for User {}

/// A personal user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(flatten)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_nr_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Person {
            user: User::new(name, created_at),
            country: None,
            passport_nr_hash: None,
            real_name: None,
            url: None,
            location: None,
        }
    }
}

impl Resource for Person {
    const TYPE: &'static str = "Person";

    fn identifier(&self) -> &str {
        &self.user.name
    }
}

impl Participant for Person {}

/// An organizational user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(flatten)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Organization {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Organization {
            user: User::new(name, created_at),
            org_name: None,
            url: None,
            country: None,
            address: None,
        }
    }
}

impl Resource for Organization {
    const TYPE: &'static str = "Organization";

    fn identifier(&self) -> &str {
        &self.user.name
    }
}

impl Participant for Organization {}

/// An email address claimed by a user. Pending until `verified` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContact {
    pub id: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub verified: bool,
    pub user: Relationship,
}

impl Resource for UserContact {
    const TYPE: &'static str = "UserContact";

    fn identifier(&self) -> &str {
        &self.id
    }
}

impl Asset for UserContact {}

/// Verification token for a [`UserContact`]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSecret {
    pub id: String,
    pub secret: String,
    pub contact: Relationship,
}

// Keep the secret value out of logs.
impl fmt::Debug for UserSecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UserSecret")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("contact", &self.contact)
            .finish()
    }
}

impl Resource for UserSecret {
    const TYPE: &'static str = "UserSecret";

    fn identifier(&self) -> &str {
        &self.id
    }
}

impl Asset for UserSecret {}

/// Record of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorianRecord {
    pub transaction_id: String,
    pub transaction_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub created: Vec<String>,
    #[serde(default)]
    pub updated: Vec<String>,
}

impl Resource for HistorianRecord {
    const TYPE: &'static str = "HistorianRecord";

    fn identifier(&self) -> &str {
        &self.transaction_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_relationship_uri_round_trip() {
        let rel = Relationship::new("org.viridian", "Person", "alice");
        assert_eq!(rel.to_uri(), "resource:org.viridian.Person#alice");

        let parsed = Relationship::parse("resource:org.viridian.Person#alice").unwrap();
        assert_eq!(parsed, rel);
        assert!(parsed.targets::<Person>());
        assert!(!parsed.targets::<Organization>());
    }

    #[test]
    fn test_relationship_rejects_malformed_uris() {
        assert!(Relationship::parse("org.viridian.Person#alice").is_err());
        assert!(Relationship::parse("resource:org.viridian.Person").is_err());
        assert!(Relationship::parse("resource:Person#alice").is_err());
        assert!(Relationship::parse("resource:org.viridian.Person#").is_err());
    }

    #[test]
    fn test_person_json_is_flat_camel_case() {
        let mut person = Person::new("alice", ts());
        person.real_name = Some("Alice Liddell".to_string());
        person.user.avatar_url = Some("old.png".to_string());

        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(json["name"], "alice");
        assert_eq!(json["realName"], "Alice Liddell");
        assert_eq!(json["avatarUrl"], "old.png");
        assert!(json.get("location").is_none());

        let back: Person = serde_json::from_value(json).unwrap();
        assert_eq!(back, person);
    }

    #[test]
    fn test_contact_references_user_by_uri() {
        let contact = UserContact {
            id: "c1".to_string(),
            email: "a@b.com".to_string(),
            timestamp: ts(),
            verified: false,
            user: Relationship::new("org.viridian", "Person", "U1"),
        };
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["user"], "resource:org.viridian.Person#U1");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = UserSecret {
            id: "s1".to_string(),
            secret: "hunter2".to_string(),
            contact: Relationship::new("org.viridian", "UserContact", "c1"),
        };
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }
}
