//! # Warning Channel
//!
//! Non-fatal reconciliation issues. A warning never stops a drain; the role
//! it concerns is still applied with everything that could be applied.

use crate::RoleKind;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A non-fatal issue found while applying a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// `member_of` named a group that does not exist.
    MissingGroup { role: String, group: String },
    /// `member_of` named a role that exists but is a user.
    NotAGroup { role: String, group: String },
    /// `member_of` named the role itself.
    SelfMembership { role: String },
    /// The directory held the role with a different kind; it was recreated.
    KindChanged {
        role: String,
        from: RoleKind,
        to: RoleKind,
    },
}

impl SyncWarning {
    /// Name of the role the warning is about.
    #[must_use]
    pub fn role(&self) -> &str {
        match self {
            Self::MissingGroup { role, .. }
            | Self::NotAGroup { role, .. }
            | Self::SelfMembership { role }
            | Self::KindChanged { role, .. } => role,
        }
    }
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingGroup { role, group } => write!(
                f,
                "Cannot add {} to group {}, because the group does not exist",
                role, group
            ),
            Self::NotAGroup { role, group } => write!(
                f,
                "Cannot add {} to {}, because {} is not a group",
                role, group, group
            ),
            Self::SelfMembership { role } => write!(f, "Cannot add {} to itself", role),
            Self::KindChanged { role, from, to } => write!(
                f,
                "Role {} was a {} and has been recreated as a {}",
                role, from, to
            ),
        }
    }
}

/// Receiver for non-fatal warnings.
///
/// Implementations must be cheap: they are called while the reconciliation
/// locks are held.
pub trait WarningSink: Send + Sync {
    /// Report one warning.
    fn warn(&self, warning: &SyncWarning);
}

/// Default sink: emits a `tracing` warning event with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarnings;

impl WarningSink for TracingWarnings {
    fn warn(&self, warning: &SyncWarning) {
        match warning {
            SyncWarning::MissingGroup { role, group } | SyncWarning::NotAGroup { role, group } => {
                tracing::warn!(role = %role, group = %group, "{}", warning);
            }
            SyncWarning::SelfMembership { role } | SyncWarning::KindChanged { role, .. } => {
                tracing::warn!(role = %role, "{}", warning);
            }
        }
    }
}

/// Sink that keeps every warning in memory, and forwards it to tracing.
#[derive(Debug, Default)]
pub struct CollectingWarnings {
    warnings: Mutex<Vec<SyncWarning>>,
}

impl CollectingWarnings {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings collected so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SyncWarning> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the collected warnings.
    pub fn take(&self) -> Vec<SyncWarning> {
        std::mem::take(&mut *self.warnings.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl WarningSink for CollectingWarnings {
    fn warn(&self, warning: &SyncWarning) {
        TracingWarnings.warn(warning);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(warning.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_group_message_names_both_roles() {
        let w = SyncWarning::MissingGroup {
            role: "alice".to_string(),
            group: "admins".to_string(),
        };
        let text = w.to_string();
        assert!(text.contains("alice"));
        assert!(text.contains("admins"));
        assert_eq!(w.role(), "alice");
    }

    #[test]
    fn collector_keeps_order_and_drains() {
        let sink = CollectingWarnings::new();
        sink.warn(&SyncWarning::SelfMembership {
            role: "a".to_string(),
        });
        sink.warn(&SyncWarning::SelfMembership {
            role: "b".to_string(),
        });

        let seen: Vec<_> = sink
            .snapshot()
            .iter()
            .map(|w| w.role().to_string())
            .collect();
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.snapshot().is_empty());
    }
}
