//! Construction of new resources and relationships within one namespace

use crate::model::{Relationship, Resource, UserContact, UserSecret, DEFAULT_NAMESPACE};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factory {
    namespace: String,
}

impl Factory {
    pub fn new(namespace: impl Into<String>) -> Self {
        Factory {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified type name of `R`, e.g. `org.viridian.Person`
    pub fn qualified_type<R: Resource>(&self) -> String {
        format!("{}.{}", self.namespace, R::TYPE)
    }

    pub fn new_relationship<R: Resource>(&self, id: impl Into<String>) -> Relationship {
        Relationship::new(self.namespace.clone(), R::TYPE, id)
    }

    /// A pending contact owned by `user`
    pub fn new_user_contact(
        &self,
        id: impl Into<String>,
        user: Relationship,
        email: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> UserContact {
        UserContact {
            id: id.into(),
            email: email.into(),
            timestamp,
            verified: false,
            user,
        }
    }

    pub fn new_user_secret(
        &self,
        id: impl Into<String>,
        contact: &UserContact,
        secret: String,
    ) -> UserSecret {
        UserSecret {
            id: id.into(),
            secret,
            contact: self.new_relationship::<UserContact>(contact.id.clone()),
        }
    }
}

impl Default for Factory {
    fn default() -> Self {
        Factory::new(DEFAULT_NAMESPACE)
    }
}
