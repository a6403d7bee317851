//! # Core Type Definitions
//!
//! This module contains the directory-agnostic types shared by every part of
//! the reconciliation pipeline:
//! - Role classification (`RoleKind`)
//! - Property and credential values (`RoleValue`)
//! - Parsed intent for one role (`RoleDescriptor`)
//! - Error types (`SyncError`)
//!
//! ## Determinism Guarantees
//!
//! Property and credential maps use `BTreeMap` so that iteration order, and
//! therefore the order of directory writes, is stable across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ROLE KIND
// =============================================================================

/// The two kinds of role a directory knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    /// A user: carries properties and credentials.
    User,
    /// A group: carries properties and member edges, never credentials.
    Group,
}

impl RoleKind {
    /// Element tag used for this kind in role documents.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }

    /// Resolve a document element tag to a kind.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// ROLE VALUE
// =============================================================================

/// A property or credential value.
///
/// Documents mark binary values with `type="byte[]"`; everything else is text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoleValue {
    /// Plain text value.
    Text(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl RoleValue {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Create a binary value.
    #[must_use]
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Binary(bytes.into())
    }

    /// The text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    /// The raw bytes of this value, regardless of variant.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// Whether this value was declared binary.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

impl From<&str> for RoleValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RoleValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for RoleValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

/// Property or credential dictionary.
pub type Dictionary = BTreeMap<String, RoleValue>;

// =============================================================================
// ROLE DESCRIPTOR
// =============================================================================

/// Parsed, directory-agnostic intent for one user or group.
///
/// Applying a descriptor replaces the role's properties, credentials and
/// group memberships wholesale; nothing from the previous state survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// Role name, unique within one document.
    pub name: String,
    /// User or group.
    pub kind: RoleKind,
    /// Properties to install.
    pub properties: Dictionary,
    /// Credentials to install. Ignored for groups.
    pub credentials: Dictionary,
    /// Groups this role belongs to, in document order.
    pub member_of: Vec<String>,
}

impl RoleDescriptor {
    /// Create a descriptor with no properties, credentials or memberships.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RoleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: Dictionary::new(),
            credentials: Dictionary::new(),
            member_of: Vec::new(),
        }
    }

    /// Shorthand for `RoleDescriptor::new(name, RoleKind::User)`.
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, RoleKind::User)
    }

    /// Shorthand for `RoleDescriptor::new(name, RoleKind::Group)`.
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, RoleKind::Group)
    }

    /// Builder: add a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<RoleValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builder: add a credential.
    #[must_use]
    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<RoleValue>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    /// Builder: append a group membership.
    #[must_use]
    pub fn member_of(mut self, group: impl Into<String>) -> Self {
        self.member_of.push(group.into());
        self
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while parsing documents or reconciling a directory.
///
/// Non-fatal issues (a membership that cannot be linked) are not errors;
/// they go to the [`WarningSink`](crate::warning::WarningSink).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The document is malformed or does not follow the role schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A directory is already attached; only one is supported at a time.
    #[error("A role directory is already attached")]
    AlreadyAttached,

    /// The handle being detached is not the attached directory.
    #[error("The given role directory is not attached")]
    NotAttached,

    /// A directory operation named a role that does not exist.
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// A membership operation targeted a role that is not a group.
    #[error("Role {0} is not a group")]
    NotAGroup(String),

    /// A credential operation targeted a role that is not a user.
    #[error("Role {0} is not a user")]
    NotAUser(String),

    /// A resource name could not be resolved.
    #[error("Resource error: {0}")]
    Resource(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<quick_xml::Error> for SyncError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_kind_tags_round_trip() {
        assert_eq!(RoleKind::from_tag("user"), Some(RoleKind::User));
        assert_eq!(RoleKind::from_tag("group"), Some(RoleKind::Group));
        assert_eq!(RoleKind::from_tag("Group"), None);
        assert_eq!(RoleKind::Group.to_string(), "group");
    }

    #[test]
    fn role_value_bytes() {
        assert_eq!(RoleValue::text("abc").as_bytes(), b"abc");
        assert_eq!(RoleValue::binary(vec![1, 2]).as_bytes(), &[1, 2]);
        assert!(RoleValue::binary(Vec::new()).is_binary());
        assert_eq!(RoleValue::binary(b"x".to_vec()).as_text(), None);
    }

    #[test]
    fn descriptor_builder() {
        let d = RoleDescriptor::user("alice")
            .with_property("email", "a@x")
            .with_credential("password", "secret")
            .member_of("admins")
            .member_of("staff");

        assert_eq!(d.kind, RoleKind::User);
        assert_eq!(d.properties.get("email"), Some(&RoleValue::text("a@x")));
        assert_eq!(d.credentials.len(), 1);
        assert_eq!(d.member_of, vec!["admins", "staff"]);
    }
}
