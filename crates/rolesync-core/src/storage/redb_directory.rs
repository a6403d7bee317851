//! # redb-backed Role Directory
//!
//! A disk-backed `Directory` using the redb embedded database.
//!
//! One table maps role name to a postcard-encoded `RoleRecord`. Membership
//! edges live on the group record, so removing a role rewrites every group
//! that listed it. Each trait call is one write (or read) transaction; a
//! failed call leaves the database as it was.

use crate::directory::{Directory, RoleRecord};
use crate::{Dictionary, RoleKind, RoleValue, SyncError};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use std::path::{Path, PathBuf};

/// Table for roles: name -> serialized RoleRecord bytes
const ROLES: TableDefinition<&str, &[u8]> = TableDefinition::new("roles");

type RoleTable<'txn> = Table<'txn, &'static str, &'static [u8]>;

fn io(e: impl std::fmt::Display) -> SyncError {
    SyncError::Io(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<RoleRecord, SyncError> {
    postcard::from_bytes(bytes).map_err(|e| SyncError::Serialization(e.to_string()))
}

fn get_record(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    name: &str,
) -> Result<Option<RoleRecord>, SyncError> {
    match table.get(name).map_err(io)? {
        Some(guard) => decode(guard.value()).map(Some),
        None => Ok(None),
    }
}

fn put_record(table: &mut RoleTable<'_>, name: &str, record: &RoleRecord) -> Result<(), SyncError> {
    let bytes =
        postcard::to_allocvec(record).map_err(|e| SyncError::Serialization(e.to_string()))?;
    table.insert(name, bytes.as_slice()).map_err(io)?;
    Ok(())
}

fn all_records(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
) -> Result<Vec<(String, RoleRecord)>, SyncError> {
    let mut out = Vec::new();
    for entry in table.iter().map_err(io)? {
        let (key, value) = entry.map_err(io)?;
        out.push((key.value().to_string(), decode(value.value())?));
    }
    Ok(out)
}

/// A role directory persisted with redb.
pub struct RedbDirectory {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDirectory")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RedbDirectory {
    /// Open or create a directory database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path).map_err(io)?;

        // Initialize the table if it doesn't exist
        let write_txn = db.begin_write().map_err(io)?;
        let _ = write_txn.open_table(ROLES).map_err(io)?;
        write_txn.commit().map_err(io)?;

        tracing::debug!(path = %path.display(), "opened role database");
        Ok(Self { db, path })
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored roles.
    pub fn len(&self) -> Result<u64, SyncError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ROLES).map_err(io)?;
        table.len().map_err(io)
    }

    /// Whether no roles are stored.
    pub fn is_empty(&self) -> Result<bool, SyncError> {
        Ok(self.len()? == 0)
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), SyncError> {
        self.db.compact().map_err(io)?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<RoleRecord>, SyncError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ROLES).map_err(io)?;
        get_record(&table, name)
    }

    fn load_existing(&self, name: &str) -> Result<RoleRecord, SyncError> {
        self.load(name)?
            .ok_or_else(|| SyncError::RoleNotFound(name.to_string()))
    }

    /// Run `f` in one write transaction. The transaction commits only if `f`
    /// succeeds; on error it is dropped and aborts.
    fn update<T>(
        &self,
        f: impl FnOnce(&mut RoleTable<'_>) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let write_txn = self.db.begin_write().map_err(io)?;
        let out = {
            let mut table = write_txn.open_table(ROLES).map_err(io)?;
            f(&mut table)?
        };
        write_txn.commit().map_err(io)?;
        Ok(out)
    }

    /// Load, modify and store one existing role in a single transaction.
    fn update_role<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut RoleRecord) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        self.update(|table| {
            let mut record = get_record(&*table, name)?
                .ok_or_else(|| SyncError::RoleNotFound(name.to_string()))?;
            let out = f(&mut record)?;
            put_record(table, name, &record)?;
            Ok(out)
        })
    }
}

impl Directory for RedbDirectory {
    fn role_kind(&self, name: &str) -> Result<Option<RoleKind>, SyncError> {
        Ok(self.load(name)?.map(|r| r.kind))
    }

    fn create_role(&self, name: &str, kind: RoleKind) -> Result<bool, SyncError> {
        self.update(|table| {
            if get_record(&*table, name)?.is_some() {
                return Ok(false);
            }
            put_record(table, name, &RoleRecord::new(kind))?;
            Ok(true)
        })
    }

    fn remove_role(&self, name: &str) -> Result<bool, SyncError> {
        self.update(|table| {
            if table.remove(name).map_err(io)?.is_none() {
                return Ok(false);
            }
            let stale: Vec<_> = all_records(&*table)?
                .into_iter()
                .filter(|(_, r)| r.members.contains(name))
                .collect();
            for (group, mut record) in stale {
                record.members.remove(name);
                put_record(table, &group, &record)?;
            }
            Ok(true)
        })
    }

    fn list_roles(&self) -> Result<Vec<(String, RoleKind)>, SyncError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ROLES).map_err(io)?;
        Ok(all_records(&table)?
            .into_iter()
            .map(|(name, record)| (name, record.kind))
            .collect())
    }

    fn properties(&self, name: &str) -> Result<Dictionary, SyncError> {
        Ok(self.load_existing(name)?.properties)
    }

    fn clear_properties(&self, name: &str) -> Result<(), SyncError> {
        self.update_role(name, |r| {
            r.properties.clear();
            Ok(())
        })
    }

    fn set_property(&self, name: &str, key: &str, value: RoleValue) -> Result<(), SyncError> {
        self.update_role(name, |r| {
            r.properties.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn credentials(&self, name: &str) -> Result<Dictionary, SyncError> {
        Ok(self.load_existing(name)?.credentials)
    }

    fn clear_credentials(&self, name: &str) -> Result<(), SyncError> {
        self.update_role(name, |r| {
            r.credentials.clear();
            Ok(())
        })
    }

    fn set_credential(&self, name: &str, key: &str, value: RoleValue) -> Result<(), SyncError> {
        self.update_role(name, |r| {
            if r.kind != RoleKind::User {
                return Err(SyncError::NotAUser(name.to_string()));
            }
            r.credentials.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn add_member(&self, group: &str, member: &str) -> Result<bool, SyncError> {
        self.update(|table| {
            if get_record(&*table, member)?.is_none() {
                return Err(SyncError::RoleNotFound(member.to_string()));
            }
            let mut record = get_record(&*table, group)?
                .ok_or_else(|| SyncError::RoleNotFound(group.to_string()))?;
            if record.kind != RoleKind::Group {
                return Err(SyncError::NotAGroup(group.to_string()));
            }
            let added = record.members.insert(member.to_string());
            if added {
                put_record(table, group, &record)?;
            }
            Ok(added)
        })
    }

    fn remove_member(&self, group: &str, member: &str) -> Result<bool, SyncError> {
        self.update_role(group, |r| {
            if r.kind != RoleKind::Group {
                return Err(SyncError::NotAGroup(group.to_string()));
            }
            Ok(r.members.remove(member))
        })
    }

    fn members(&self, group: &str) -> Result<Vec<String>, SyncError> {
        Ok(self.load_existing(group)?.members.into_iter().collect())
    }

    fn groups_containing(&self, member: &str) -> Result<Vec<String>, SyncError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(ROLES).map_err(io)?;
        Ok(all_records(&table)?
            .into_iter()
            .filter(|(_, r)| r.kind == RoleKind::Group && r.members.contains(member))
            .map(|(name, _)| name)
            .collect())
    }

    fn record(&self, name: &str) -> Result<Option<RoleRecord>, SyncError> {
        self.load(name)
    }
}

// =============================================================================
// TESTS
// =============================================================================
