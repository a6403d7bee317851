//! # rolesync-core
//!
//! The declarative role-directory synchronizer - THE LOGIC.
//!
//! A role document declares users and groups with their properties,
//! credentials and group memberships. This crate parses such documents,
//! stages the requested changes and reconciles them into a live role
//! directory whenever one is attached.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async, NO network dependencies (pure Rust)
//! - Only talks to a directory through the `Directory` trait
//! - Keeps staged intent across directory outages
//! - Applies installs in document order and removals in reverse
//! - Takes the pending store lock before the directory lock, always

// =============================================================================
// MODULES
// =============================================================================

pub mod directory;
pub mod document;
pub mod pending;
pub mod primitives;
pub mod resource;
pub mod storage;
pub mod sync;
pub mod types;
pub mod updater;
pub mod warning;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Dictionary, RoleDescriptor, RoleKind, RoleValue, SyncError};

// =============================================================================
// RE-EXPORTS: Reconciliation
// =============================================================================

pub use directory::{Directory, MemoryDirectory, RoleRecord, SharedDirectory, snapshot};
pub use document::DocumentParser;
pub use pending::PendingChanges;
pub use resource::{DirectoryResources, ResourceSource};
pub use storage::RedbDirectory;
pub use sync::{DrainOutcome, PendingSummary, ReconcileReport, RoleSync};
pub use updater::RoleUpdater;
pub use warning::{CollectingWarnings, SyncWarning, TracingWarnings, WarningSink};
