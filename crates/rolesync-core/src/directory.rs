//! # Role Directory
//!
//! The `Directory` trait is the only surface the reconciliation engine uses
//! to read and mutate a live role store. `MemoryDirectory` is the in-memory
//! implementation; `RedbDirectory` (see `storage`) persists to disk.
//!
//! Roles are addressed by name on every call. The engine never keeps a role
//! object between calls, so implementations are free to hand out copies.

use crate::{Dictionary, RoleKind, RoleValue, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

// =============================================================================
// DIRECTORY TRAIT
// =============================================================================

/// A directory handle shared between the engine and its owner.
pub type SharedDirectory = Arc<dyn Directory>;

/// Capability set of a mutable role directory.
///
/// All methods take `&self`: a directory is a shared resource and does its
/// own interior locking. The engine additionally serializes every mutation
/// behind its directory lock.
pub trait Directory: Send + Sync {
    /// Kind of the named role, or `None` if it does not exist.
    fn role_kind(&self, name: &str) -> Result<Option<RoleKind>, SyncError>;

    /// Create an empty role. Returns `false` if the name is already taken.
    fn create_role(&self, name: &str, kind: RoleKind) -> Result<bool, SyncError>;

    /// Remove a role and every membership edge that references it.
    /// Returns `false` if the role did not exist.
    fn remove_role(&self, name: &str) -> Result<bool, SyncError>;

    /// Every role, ordered by name.
    fn list_roles(&self) -> Result<Vec<(String, RoleKind)>, SyncError>;

    /// Properties of the named role.
    fn properties(&self, name: &str) -> Result<Dictionary, SyncError>;

    /// Remove every property of the named role.
    fn clear_properties(&self, name: &str) -> Result<(), SyncError>;

    /// Insert or overwrite one property.
    fn set_property(&self, name: &str, key: &str, value: RoleValue) -> Result<(), SyncError>;

    /// Credentials of the named role. Groups have none.
    fn credentials(&self, name: &str) -> Result<Dictionary, SyncError>;

    /// Remove every credential of the named role.
    fn clear_credentials(&self, name: &str) -> Result<(), SyncError>;

    /// Insert or overwrite one credential. Fails with `NotAUser` on groups.
    fn set_credential(&self, name: &str, key: &str, value: RoleValue) -> Result<(), SyncError>;

    /// Add `member` to `group`. Returns `false` if already a member.
    fn add_member(&self, group: &str, member: &str) -> Result<bool, SyncError>;

    /// Remove `member` from `group`. Returns `false` if it was not a member.
    fn remove_member(&self, group: &str, member: &str) -> Result<bool, SyncError>;

    /// Members of a group, ordered by name.
    fn members(&self, group: &str) -> Result<Vec<String>, SyncError>;

    /// Groups that list `member` as a member, ordered by name.
    fn groups_containing(&self, member: &str) -> Result<Vec<String>, SyncError>;

    /// Full state of one role, or `None` if it does not exist.
    fn record(&self, name: &str) -> Result<Option<RoleRecord>, SyncError> {
        let Some(kind) = self.role_kind(name)? else {
            return Ok(None);
        };
        let members = match kind {
            RoleKind::Group => self.members(name)?.into_iter().collect(),
            RoleKind::User => BTreeSet::new(),
        };
        Ok(Some(RoleRecord {
            kind,
            properties: self.properties(name)?,
            credentials: self.credentials(name)?,
            members,
        }))
    }
}

/// Stored state of one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub kind: RoleKind,
    pub properties: Dictionary,
    pub credentials: Dictionary,
    pub members: BTreeSet<String>,
}

impl RoleRecord {
    /// An empty role of the given kind.
    #[must_use]
    pub fn new(kind: RoleKind) -> Self {
        Self {
            kind,
            properties: Dictionary::new(),
            credentials: Dictionary::new(),
            members: BTreeSet::new(),
        }
    }
}

/// Capture the full state of a directory, keyed by role name.
pub fn snapshot(directory: &dyn Directory) -> Result<BTreeMap<String, RoleRecord>, SyncError> {
    let mut out = BTreeMap::new();
    for (name, _) in directory.list_roles()? {
        if let Some(record) = directory.record(&name)? {
            out.insert(name, record);
        }
    }
    Ok(out)
}

// =============================================================================
// IN-MEMORY DIRECTORY
// =============================================================================

/// In-memory role directory.
///
/// Uses `BTreeMap` so listings are ordered by name.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    roles: RwLock<BTreeMap<String, RoleRecord>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty directory already wrapped for sharing.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read(|roles| roles.len())
    }

    /// Whether the directory holds no roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&BTreeMap<String, RoleRecord>) -> T) -> T {
        f(&self.roles.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut BTreeMap<String, RoleRecord>) -> T) -> T {
        f(&mut self.roles.write().unwrap_or_else(PoisonError::into_inner))
    }

    fn with_role<T>(&self, name: &str, f: impl FnOnce(&RoleRecord) -> T) -> Result<T, SyncError> {
        self.read(|roles| {
            roles
                .get(name)
                .map(f)
                .ok_or_else(|| SyncError::RoleNotFound(name.to_string()))
        })
    }

    fn with_role_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut RoleRecord) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        self.write(|roles| {
            roles
                .get_mut(name)
                .ok_or_else(|| SyncError::RoleNotFound(name.to_string()))
                .and_then(f)
        })
    }
}

impl Directory for MemoryDirectory {
    fn role_kind(&self, name: &str) -> Result<Option<RoleKind>, SyncError> {
        Ok(self.read(|roles| roles.get(name).map(|r| r.kind)))
    }

    fn create_role(&self, name: &str, kind: RoleKind) -> Result<bool, SyncError> {
        Ok(self.write(|roles| {
            if roles.contains_key(name) {
                false
            } else {
                roles.insert(name.to_string(), RoleRecord::new(kind));
                true
            }
        }))
    }

    fn remove_role(&self, name: &str) -> Result<bool, SyncError> {
        Ok(self.write(|roles| {
            if roles.remove(name).is_none() {
                return false;
            }
            for record in roles.values_mut() {
                record.members.remove(name);
            }
            true
        }))
    }

    fn list_roles(&self) -> Result<Vec<(String, RoleKind)>, SyncError> {
        Ok(self.read(|roles| {
            roles
                .iter()
                .map(|(name, record)| (name.clone(), record.kind))
                .collect()
        }))
    }

    fn properties(&self, name: &str) -> Result<Dictionary, SyncError> {
        self.with_role(name, |r| r.properties.clone())
    }

    fn clear_properties(&self, name: &str) -> Result<(), SyncError> {
        self.with_role_mut(name, |r| {
            r.properties.clear();
            Ok(())
        })
    }

    fn set_property(&self, name: &str, key: &str, value: RoleValue) -> Result<(), SyncError> {
        self.with_role_mut(name, |r| {
            r.properties.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn credentials(&self, name: &str) -> Result<Dictionary, SyncError> {
        self.with_role(name, |r| r.credentials.clone())
    }

    fn clear_credentials(&self, name: &str) -> Result<(), SyncError> {
        self.with_role_mut(name, |r| {
            r.credentials.clear();
            Ok(())
        })
    }

    fn set_credential(&self, name: &str, key: &str, value: RoleValue) -> Result<(), SyncError> {
        self.with_role_mut(name, |r| {
            if r.kind != RoleKind::User {
                return Err(SyncError::NotAUser(name.to_string()));
            }
            r.credentials.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn add_member(&self, group: &str, member: &str) -> Result<bool, SyncError> {
        self.write(|roles| {
            if !roles.contains_key(member) {
                return Err(SyncError::RoleNotFound(member.to_string()));
            }
            let record = roles
                .get_mut(group)
                .ok_or_else(|| SyncError::RoleNotFound(group.to_string()))?;
            if record.kind != RoleKind::Group {
                return Err(SyncError::NotAGroup(group.to_string()));
            }
            Ok(record.members.insert(member.to_string()))
        })
    }

    fn remove_member(&self, group: &str, member: &str) -> Result<bool, SyncError> {
        self.with_role_mut(group, |r| {
            if r.kind != RoleKind::Group {
                return Err(SyncError::NotAGroup(group.to_string()));
            }
            Ok(r.members.remove(member))
        })
    }

    fn members(&self, group: &str) -> Result<Vec<String>, SyncError> {
        self.with_role(group, |r| r.members.iter().cloned().collect())
    }

    fn groups_containing(&self, member: &str) -> Result<Vec<String>, SyncError> {
        Ok(self.read(|roles| {
            roles
                .iter()
                .filter(|(_, r)| r.kind == RoleKind::Group && r.members.contains(member))
                .map(|(name, _)| name.clone())
                .collect()
        }))
    }
}

// =============================================================================
// TESTS
// =============================================================================
