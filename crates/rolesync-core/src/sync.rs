//! # Reconciliation Engine
//!
//! `RoleSync` stages intent from role documents and drains it into the
//! attached directory.
//!
//! ## Modes
//!
//! - Incremental (`install`, `uninstall`): only staged installs and removals
//!   are applied; every other role is left alone.
//! - Full replace (`set_users`): after the staged installs are applied, every
//!   directory role that was not installed is removed.
//!
//! ## Locking
//!
//! Two locks: the pending store and the directory handle. They are always
//! taken store first, directory second, and only in `with_locks`. Detach
//! takes the directory lock alone, so it waits for any drain in flight.
//!
//! ## Lifecycle
//!
//! At most one directory is attached. Staged changes survive detach and are
//! applied on the next attach.

use crate::directory::{Directory, SharedDirectory};
use crate::document::DocumentParser;
use crate::pending::PendingChanges;
use crate::resource::ResourceSource;
use crate::updater::RoleUpdater;
use crate::warning::{TracingWarnings, WarningSink};
use crate::{RoleDescriptor, SyncError};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Roles touched by one drain, in the order the directory saw them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Roles created or updated.
    pub installed: Vec<String>,
    /// Roles removed.
    pub removed: Vec<String>,
    /// Whether the drain ran in full-replace mode.
    pub full_replace: bool,
}

/// What happened to staged changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No directory is attached; changes stay staged.
    Deferred,
    /// Changes were applied to the attached directory.
    Applied(ReconcileReport),
}

impl DrainOutcome {
    /// The report, if the drain ran.
    #[must_use]
    pub fn report(&self) -> Option<&ReconcileReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Deferred => None,
        }
    }
}

/// Counts of staged, not yet applied changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSummary {
    pub installs: usize,
    pub removals: usize,
    pub full_replace: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn same_directory(a: &SharedDirectory, b: &SharedDirectory) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Declarative synchronizer between role documents and one role directory.
pub struct RoleSync {
    /// Store lock. Always acquired before `directory`.
    pending: Mutex<PendingChanges>,
    /// Directory lock. Serializes every directory mutation.
    directory: Mutex<Option<SharedDirectory>>,
    warnings: Arc<dyn WarningSink>,
}

impl Default for RoleSync {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RoleSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleSync")
            .field("pending", &self.pending_summary())
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl RoleSync {
    /// Create a detached synchronizer that logs warnings through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_warnings(Arc::new(TracingWarnings))
    }

    /// Create a detached synchronizer reporting warnings to `warnings`.
    #[must_use]
    pub fn with_warnings(warnings: Arc<dyn WarningSink>) -> Self {
        Self {
            pending: Mutex::new(PendingChanges::new()),
            directory: Mutex::new(None),
            warnings,
        }
    }

    // =========================================================================
    // DOCUMENT OPERATIONS
    // =========================================================================

    /// Check that a document parses. Touches neither the store nor the directory.
    pub fn validate(&self, document: impl Read) -> Result<(), SyncError> {
        DocumentParser::validate(document)
    }

    /// Install or update every role of a document.
    pub fn install(&self, document: impl Read) -> Result<DrainOutcome, SyncError> {
        let roles = DocumentParser::parse(document)?;
        self.install_roles(roles)
    }

    /// Remove every role of a document, last declared first.
    pub fn uninstall(&self, document: impl Read) -> Result<DrainOutcome, SyncError> {
        let roles = DocumentParser::parse(document)?;
        self.uninstall_roles(roles)
    }

    /// Make the directory hold exactly the roles of a document.
    pub fn set_users(&self, document: impl Read) -> Result<DrainOutcome, SyncError> {
        let roles = DocumentParser::parse(document)?;
        self.set_users_roles(roles)
    }

    /// Check the named resource.
    pub fn validate_resource(
        &self,
        resources: &dyn ResourceSource,
        name: &str,
    ) -> Result<(), SyncError> {
        self.validate(resources.open(name)?)
    }

    /// Install the roles of the named resource.
    pub fn install_resource(
        &self,
        resources: &dyn ResourceSource,
        name: &str,
    ) -> Result<DrainOutcome, SyncError> {
        self.install(resources.open(name)?)
    }

    /// Uninstall the roles of the named resource.
    pub fn uninstall_resource(
        &self,
        resources: &dyn ResourceSource,
        name: &str,
    ) -> Result<DrainOutcome, SyncError> {
        self.uninstall(resources.open(name)?)
    }

    /// Replace the directory contents with the roles of the named resource.
    pub fn set_users_resource(
        &self,
        resources: &dyn ResourceSource,
        name: &str,
    ) -> Result<DrainOutcome, SyncError> {
        self.set_users(resources.open(name)?)
    }

    // =========================================================================
    // DESCRIPTOR OPERATIONS
    // =========================================================================

    /// Stage descriptors for install and drain.
    pub fn install_roles(&self, roles: Vec<RoleDescriptor>) -> Result<DrainOutcome, SyncError> {
        tracing::debug!(roles = roles.len(), "staging installs");
        self.stage_and_drain(|pending| pending.stage_install(roles))
    }

    /// Stage descriptors for removal (reversed) and drain.
    pub fn uninstall_roles(&self, roles: Vec<RoleDescriptor>) -> Result<DrainOutcome, SyncError> {
        tracing::debug!(roles = roles.len(), "staging removals");
        self.stage_and_drain(|pending| pending.stage_remove(roles))
    }

    /// Stage a full replace with the given descriptors and drain.
    pub fn set_users_roles(&self, roles: Vec<RoleDescriptor>) -> Result<DrainOutcome, SyncError> {
        tracing::debug!(roles = roles.len(), "staging full replace");
        self.stage_and_drain(|pending| pending.stage_full_replace(roles))
    }

    /// Apply whatever is staged to the attached directory, if any.
    pub fn drain(&self) -> Result<DrainOutcome, SyncError> {
        self.stage_and_drain(|_| {})
    }

    /// Counts of staged changes.
    #[must_use]
    pub fn pending_summary(&self) -> PendingSummary {
        let pending = lock(&self.pending);
        PendingSummary {
            installs: pending.pending_installs().count(),
            removals: pending.pending_removals().count(),
            full_replace: pending.is_full_replace(),
        }
    }

    // =========================================================================
    // DIRECTORY LIFECYCLE
    // =========================================================================

    /// Attach a directory and apply everything staged so far.
    ///
    /// # Errors
    /// `SyncError::AlreadyAttached` if a directory is held; it stays attached.
    /// Otherwise any error from the drain that follows the attach.
    pub fn on_directory_available(
        &self,
        directory: SharedDirectory,
    ) -> Result<DrainOutcome, SyncError> {
        self.with_locks(|pending, handle| {
            if handle.is_some() {
                return Err(SyncError::AlreadyAttached);
            }
            *handle = Some(directory);
            tracing::info!("role directory attached");
            self.drain_locked(pending, handle.as_deref())
        })
    }

    /// Detach the directory, returning the handle.
    ///
    /// # Errors
    /// `SyncError::NotAttached` if `directory` is not the attached handle.
    pub fn on_directory_unavailable(
        &self,
        directory: &SharedDirectory,
    ) -> Result<SharedDirectory, SyncError> {
        let mut handle = lock(&self.directory);
        let attached = handle
            .as_ref()
            .is_some_and(|current| same_directory(current, directory));
        if !attached {
            return Err(SyncError::NotAttached);
        }
        tracing::info!("role directory detached");
        handle.take().ok_or(SyncError::NotAttached)
    }

    /// Whether a directory is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        lock(&self.directory).is_some()
    }

    // =========================================================================
    // DRAIN
    // =========================================================================

    /// The only place both locks are held. Store lock first, then directory.
    fn with_locks<T>(
        &self,
        f: impl FnOnce(&mut PendingChanges, &mut Option<SharedDirectory>) -> T,
    ) -> T {
        let mut pending = lock(&self.pending);
        let mut directory = lock(&self.directory);
        f(&mut pending, &mut directory)
    }

    fn stage_and_drain(
        &self,
        stage: impl FnOnce(&mut PendingChanges),
    ) -> Result<DrainOutcome, SyncError> {
        self.with_locks(|pending, handle| {
            stage(pending);
            self.drain_locked(pending, handle.as_deref())
        })
    }

    fn drain_locked(
        &self,
        pending: &mut PendingChanges,
        directory: Option<&dyn Directory>,
    ) -> Result<DrainOutcome, SyncError> {
        let Some(directory) = directory else {
            tracing::debug!("no role directory attached, keeping staged changes");
            return Ok(DrainOutcome::Deferred);
        };

        let mut report = ReconcileReport {
            full_replace: pending.is_full_replace(),
            ..ReconcileReport::default()
        };

        while let Some(role) = pending.next_install() {
            if let Err(e) = RoleUpdater::apply(&role, directory, self.warnings.as_ref()) {
                tracing::error!(role = %role.name, error = %e, "failed to apply role");
                pending.retry_install(role);
                return Err(e);
            }
            pending.mark_installed(&role.name);
            report.installed.push(role.name);
        }

        if pending.is_full_replace() {
            let roles = directory.list_roles().unwrap_or_else(|e| {
                tracing::error!(error = %e, "listing roles failed, nothing to remove");
                Vec::new()
            });
            for (name, _) in roles {
                if pending.survives_replace(&name) {
                    continue;
                }
                if directory.remove_role(&name)? {
                    report.removed.push(name);
                }
            }
            pending.finish_full_replace();
        } else {
            while let Some(role) = pending.next_removal() {
                match directory.remove_role(&role.name) {
                    Ok(true) => report.removed.push(role.name),
                    Ok(false) => {}
                    Err(e) => {
                        pending.retry_removal(role);
                        return Err(e);
                    }
                }
            }
        }

        tracing::info!(
            installed = report.installed.len(),
            removed = report.removed.len(),
            full_replace = report.full_replace,
            "reconciled role directory"
        );
        Ok(DrainOutcome::Applied(report))
    }
}

// =============================================================================
// TESTS
// =============================================================================
