//! Configured users and their attributes
//!
//! Users are emitted verbatim into the output and drive role restrictions and
//! capability grants. Attribute rows are `(userid, name, val)` triples; the
//! `role` attribute names a role, and a value of the form `?true` marks a
//! capability.

use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute name holding a user's role
pub const ROLE_ATTRIBUTE: &str = "role";

/// A configured user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier
    pub userid: UserId,
    /// MQTT client identifier
    #[serde(default)]
    pub clientid: String,
    /// Login name
    pub username: String,
    /// Password, stored as configured
    #[serde(default)]
    pub password: String,
}

/// A single attribute row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AttributeRow", into = "AttributeRow")]
pub struct UserAttribute {
    /// Owning user
    pub userid: UserId,
    /// Attribute name
    pub name: String,
    /// Attribute value
    pub val: String,
}

/// Accepts both `[1, "role", "intern"]` and `{"userid": 1, ...}` rows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AttributeRow {
    Tuple(UserId, String, String),
    Record { userid: UserId, name: String, val: String },
}

impl From<AttributeRow> for UserAttribute {
    fn from(row: AttributeRow) -> Self {
        match row {
            AttributeRow::Tuple(userid, name, val) | AttributeRow::Record { userid, name, val } => {
                Self { userid, name, val }
            }
        }
    }
}

impl From<UserAttribute> for AttributeRow {
    fn from(attribute: UserAttribute) -> Self {
        AttributeRow::Tuple(attribute.userid, attribute.name, attribute.val)
    }
}

impl UserAttribute {
    /// Whether the value marks a capability (`?true`)
    pub fn is_capability(&self) -> bool {
        self.val.starts_with('?') && self.val.contains("true")
    }

    /// Whether this row assigns a role
    pub fn is_role(&self) -> bool {
        self.name == ROLE_ATTRIBUTE
    }
}

/// Users and attributes with lookup helpers
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<User>,
    attributes: Vec<UserAttribute>,
    /// Quick lookup map from user ID to index
    user_index: HashMap<UserId, usize>,
}

impl UserDirectory {
    /// Create a directory from configured users and attribute rows
    pub fn new(users: Vec<User>, attributes: Vec<UserAttribute>) -> Self {
        let user_index = users.iter().enumerate().map(|(idx, user)| (user.userid, idx)).collect();
        Self { users, attributes, user_index }
    }

    /// All users in configured order
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// All attribute rows in configured order
    pub fn attributes(&self) -> &[UserAttribute] {
        &self.attributes
    }

    /// Get a user by ID
    pub fn get(&self, userid: UserId) -> Option<&User> {
        self.user_index.get(&userid).and_then(|&idx| self.users.get(idx))
    }

    /// Find a user by login name
    pub fn find_by_username(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|user| user.username == username)
    }

    /// Attribute rows belonging to a user
    pub fn attributes_of(&self, userid: UserId) -> impl Iterator<Item = &UserAttribute> {
        self.attributes.iter().filter(move |attr| attr.userid == userid)
    }

    /// Roles assigned to a user
    pub fn roles_of(&self, userid: UserId) -> impl Iterator<Item = &str> {
        self.attributes_of(userid).filter(|attr| attr.is_role()).map(|attr| attr.val.as_str())
    }

    /// Capability attribute names held by a user
    pub fn capabilities_of(&self, userid: UserId) -> impl Iterator<Item = &str> {
        self.attributes_of(userid)
            .filter(|attr| attr.is_capability())
            .map(|attr| attr.name.as_str())
    }

    /// Whether a user holds the given role
    pub fn has_role(&self, userid: UserId, role: &str) -> bool {
        self.roles_of(userid).any(|r| r == role)
    }

    /// Whether a user holds the given capability
    pub fn has_capability(&self, userid: UserId, name: &str) -> bool {
        self.capabilities_of(userid).any(|c| c == name)
    }

    /// User IDs that own attribute rows, in order of first appearance
    pub fn attribute_owners(&self) -> Vec<UserId> {
        let mut owners: Vec<UserId> = Vec::new();
        for attr in &self.attributes {
            if !owners.contains(&attr.userid) {
                owners.push(attr.userid);
            }
        }
        owners
    }
}
