//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every reconciling command opens the redb directory, attaches it to a fresh
//! `RoleSync`, runs one operation and detaches again.

use crate::config::Settings;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rolesync_core::{
    Dictionary, Directory, DirectoryResources, DrainOutcome, ReconcileReport, RedbDirectory,
    RoleKind, RoleRecord, RoleSync, RoleValue, SharedDirectory, SyncError,
};
use serde_json::{Value, json};
use std::sync::Arc;

// =============================================================================
// OPERATIONS
// =============================================================================

/// Reconciling operation selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
    SetUsers,
}

impl Operation {
    /// Command name, as typed.
    pub fn name(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::SetUsers => "set-users",
        }
    }

    fn run(
        self,
        sync: &RoleSync,
        resources: &DirectoryResources,
        resource: &str,
    ) -> Result<DrainOutcome, SyncError> {
        match self {
            Self::Install => sync.install_resource(resources, resource),
            Self::Uninstall => sync.uninstall_resource(resources, resource),
            Self::SetUsers => sync.set_users_resource(resources, resource),
        }
    }
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Check that a document parses without touching the directory.
pub fn cmd_validate(settings: &Settings, json_mode: bool, resource: &str) -> Result<(), SyncError> {
    let resources = DirectoryResources::new(&settings.documents);
    RoleSync::new().validate_resource(&resources, resource)?;

    if json_mode {
        print_json(&json!({ "resource": resource, "valid": true }));
    } else {
        println!("{} is a valid role document", resource);
    }
    Ok(())
}

// =============================================================================
// RECONCILE COMMANDS
// =============================================================================

/// Run `install`, `uninstall` or `set-users` against the database.
pub fn cmd_reconcile(
    settings: &Settings,
    json_mode: bool,
    operation: Operation,
    resource: &str,
) -> Result<(), SyncError> {
    let report = reconcile(settings, operation, resource)?;

    if json_mode {
        print_json(&report_json(operation, resource, &report));
        return Ok(());
    }

    println!("{} {}", operation.name(), resource);
    println!("  Installed: {}", report.installed.len());
    for name in &report.installed {
        println!("    + {}", name);
    }
    println!("  Removed:   {}", report.removed.len());
    for name in &report.removed {
        println!("    - {}", name);
    }
    Ok(())
}

/// Apply one operation to the configured database and return what changed.
pub fn reconcile(
    settings: &Settings,
    operation: Operation,
    resource: &str,
) -> Result<ReconcileReport, SyncError> {
    let resources = DirectoryResources::new(&settings.documents);
    let directory: SharedDirectory = Arc::new(RedbDirectory::open(&settings.database)?);
    let sync = RoleSync::new();

    // A fresh engine has nothing staged, so this drain is empty.
    sync.on_directory_available(Arc::clone(&directory))?;
    let outcome = operation.run(&sync, &resources, resource);
    sync.on_directory_unavailable(&directory)?;

    match outcome? {
        DrainOutcome::Applied(report) => Ok(report),
        DrainOutcome::Deferred => Err(SyncError::NotAttached),
    }
}

/// JSON summary of one reconciliation.
pub fn report_json(operation: Operation, resource: &str, report: &ReconcileReport) -> Value {
    json!({
        "operation": operation.name(),
        "resource": resource,
        "full_replace": report.full_replace,
        "installed": report.installed,
        "removed": report.removed,
    })
}

// =============================================================================
// ROLES COMMAND
// =============================================================================

/// List every role in the database.
pub fn cmd_roles(settings: &Settings, json_mode: bool) -> Result<(), SyncError> {
    let directory = RedbDirectory::open(&settings.database)?;
    let mut rows = Vec::new();
    for (name, kind) in directory.list_roles()? {
        let members = match kind {
            RoleKind::Group => directory.members(&name)?.len(),
            RoleKind::User => 0,
        };
        rows.push((name, kind, members));
    }

    if json_mode {
        let output: Vec<Value> = rows
            .iter()
            .map(|(name, kind, members)| {
                json!({ "name": name, "kind": kind.tag(), "members": members })
            })
            .collect();
        print_json(&Value::Array(output));
        return Ok(());
    }

    println!("Roles in {}", settings.database.display());
    println!("==================");
    for (name, kind, members) in &rows {
        match kind {
            RoleKind::Group => println!("  {:<6} {} ({} members)", kind.tag(), name, members),
            RoleKind::User => println!("  {:<6} {}", kind.tag(), name),
        }
    }
    println!();
    println!("Total: {}", rows.len());
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show properties, credential keys and memberships of one role.
pub fn cmd_show(settings: &Settings, json_mode: bool, name: &str) -> Result<(), SyncError> {
    let directory = RedbDirectory::open(&settings.database)?;
    let record = directory
        .record(name)?
        .ok_or_else(|| SyncError::RoleNotFound(name.to_string()))?;
    let groups = directory.groups_containing(name)?;

    if json_mode {
        print_json(&role_json(name, &record, &groups));
        return Ok(());
    }

    println!("{} {}", record.kind, name);
    println!("  Properties:");
    for (key, value) in &record.properties {
        println!("    {} = {}", key, value_text(value));
    }
    if record.kind == RoleKind::User {
        println!("  Credentials:");
        for key in record.credentials.keys() {
            println!("    {} = ********", key);
        }
    } else {
        println!("  Members: {}", join(record.members.iter()));
    }
    println!("  Member of: {}", join(groups.iter()));
    Ok(())
}

/// JSON view of one role. Credential values are left out.
pub fn role_json(name: &str, record: &RoleRecord, groups: &[String]) -> Value {
    json!({
        "name": name,
        "kind": record.kind.tag(),
        "properties": dictionary_json(&record.properties),
        "credentials": record.credentials.keys().collect::<Vec<_>>(),
        "members": record.members,
        "member_of": groups,
    })
}

fn dictionary_json(dictionary: &Dictionary) -> Value {
    let map = dictionary
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                RoleValue::Text(text) => Value::String(text.clone()),
                RoleValue::Binary(bytes) => json!({ "base64": STANDARD.encode(bytes) }),
            };
            (key.clone(), rendered)
        })
        .collect();
    Value::Object(map)
}

fn value_text(value: &RoleValue) -> String {
    match value {
        RoleValue::Text(text) => text.clone(),
        RoleValue::Binary(bytes) => format!("base64:{}", STANDARD.encode(bytes)),
    }
}

fn join<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let names: Vec<&str> = names.map(String::as_str).collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), SyncError> {
    let db_path = &settings.database;
    if db_path.exists() {
        if !force {
            return Err(SyncError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| SyncError::Io(format!("remove {}: {}", db_path.display(), e)))?;
    }

    let _directory = RedbDirectory::open(db_path)?;
    tracing::info!(path = %db_path.display(), "initialized role database");
    println!("Initialized new role database at {:?}", db_path);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
