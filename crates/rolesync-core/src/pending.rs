//! # Pending Change Store
//!
//! Intent that has been staged but not yet applied to a directory.
//!
//! The store itself is plain data; `RoleSync` owns it behind the store lock
//! and is the only caller of the staging methods.
//!
//! Removals are staged in reverse of declaration order, so that tearing a
//! document down undoes its installation last-in-first-out.

use crate::RoleDescriptor;
use std::collections::{BTreeSet, VecDeque};

/// Staged installs and removals plus the one-shot full-replace flag.
#[derive(Debug, Default)]
pub struct PendingChanges {
    to_install: VecDeque<RoleDescriptor>,
    to_remove: VecDeque<RoleDescriptor>,
    full_replace: bool,
    /// Names installed since the full replace was requested; these survive it.
    replaced: BTreeSet<String>,
}

impl PendingChanges {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue descriptors for install, keeping their order.
    pub fn stage_install(&mut self, roles: impl IntoIterator<Item = RoleDescriptor>) {
        self.to_install.extend(roles);
    }

    /// Queue descriptors for removal, in reverse of the given order.
    pub fn stage_remove(&mut self, roles: impl IntoIterator<Item = RoleDescriptor>) {
        let mut roles: Vec<_> = roles.into_iter().collect();
        roles.reverse();
        self.to_remove.extend(roles);
    }

    /// Discard everything staged, queue `roles` for install and request a
    /// full replace on the next drain.
    pub fn stage_full_replace(&mut self, roles: impl IntoIterator<Item = RoleDescriptor>) {
        self.to_install.clear();
        self.to_remove.clear();
        self.to_install.extend(roles);
        self.full_replace = true;
        self.replaced.clear();
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty() && !self.full_replace
    }

    /// Queued installs, head first.
    pub fn pending_installs(&self) -> impl Iterator<Item = &RoleDescriptor> {
        self.to_install.iter()
    }

    /// Queued removals, in the order they will be applied.
    pub fn pending_removals(&self) -> impl Iterator<Item = &RoleDescriptor> {
        self.to_remove.iter()
    }

    /// Whether the next drain runs in full-replace mode.
    #[must_use]
    pub fn is_full_replace(&self) -> bool {
        self.full_replace
    }

    // =========================================================================
    // DRAIN SUPPORT (crate-internal)
    // =========================================================================

    pub(crate) fn next_install(&mut self) -> Option<RoleDescriptor> {
        self.to_install.pop_front()
    }

    /// Record a successful install; it is kept by a pending full replace.
    pub(crate) fn mark_installed(&mut self, name: &str) {
        if self.full_replace {
            self.replaced.insert(name.to_string());
        }
    }

    /// Whether a pending full replace must keep the named role.
    pub(crate) fn survives_replace(&self, name: &str) -> bool {
        self.replaced.contains(name)
    }

    pub(crate) fn retry_install(&mut self, role: RoleDescriptor) {
        self.to_install.push_front(role);
    }

    pub(crate) fn next_removal(&mut self) -> Option<RoleDescriptor> {
        self.to_remove.pop_front()
    }

    pub(crate) fn retry_removal(&mut self, role: RoleDescriptor) {
        self.to_remove.push_front(role);
    }

    /// Consume the full-replace request. Queued removals are superseded by it.
    pub(crate) fn finish_full_replace(&mut self) {
        self.full_replace = false;
        self.to_remove.clear();
        self.replaced.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(roles: impl Iterator<Item = &'a RoleDescriptor>) -> Vec<&'a str> {
        roles.map(|r| r.name.as_str()).collect()
    }

    fn users(names: &[&str]) -> Vec<RoleDescriptor> {
        names.iter().map(|n| RoleDescriptor::user(*n)).collect()
    }

    #[test]
    fn installs_keep_document_order() {
        let mut pending = PendingChanges::new();
        pending.stage_install(users(&["a", "b"]));
        pending.stage_install(users(&["c"]));

        assert_eq!(names(pending.pending_installs()), vec!["a", "b", "c"]);
    }

    #[test]
    fn removals_are_reversed_per_batch() {
        let mut pending = PendingChanges::new();
        pending.stage_remove(users(&["a", "b", "c"]));
        pending.stage_remove(users(&["d", "e"]));

        assert_eq!(
            names(pending.pending_removals()),
            vec!["c", "b", "a", "e", "d"]
        );
    }

    #[test]
    fn single_removal_is_kept() {
        let mut pending = PendingChanges::new();
        pending.stage_remove(users(&["only"]));

        assert_eq!(names(pending.pending_removals()), vec!["only"]);
    }

    #[test]
    fn full_replace_discards_earlier_staging() {
        let mut pending = PendingChanges::new();
        pending.stage_install(users(&["old"]));
        pending.stage_remove(users(&["gone"]));

        pending.stage_full_replace(users(&["new"]));

        assert!(pending.is_full_replace());
        assert_eq!(names(pending.pending_installs()), vec!["new"]);
        assert_eq!(pending.pending_removals().count(), 0);
    }

    #[test]
    fn empty_full_replace_is_still_pending() {
        let mut pending = PendingChanges::new();
        assert!(pending.is_empty());

        pending.stage_full_replace(Vec::new());
        assert!(!pending.is_empty());

        pending.finish_full_replace();
        assert!(pending.is_empty());
    }

    #[test]
    fn installs_are_remembered_only_during_full_replace() {
        let mut pending = PendingChanges::new();
        pending.mark_installed("early");
        assert!(!pending.survives_replace("early"));

        pending.stage_full_replace(users(&["kept"]));
        pending.mark_installed("kept");
        assert!(pending.survives_replace("kept"));

        pending.finish_full_replace();
        assert!(!pending.survives_replace("kept"));
    }

    #[test]
    fn retry_puts_role_back_at_head() {
        let mut pending = PendingChanges::new();
        pending.stage_install(users(&["a", "b"]));

        let head = pending.next_install().expect("head");
        pending.retry_install(head);

        assert_eq!(names(pending.pending_installs()), vec!["a", "b"]);
    }
}
