//! # Role Updater
//!
//! Applies one [`RoleDescriptor`] to a live directory.
//!
//! Everything the descriptor declares replaces what the directory holds:
//! - properties are cleared, then rewritten
//! - credentials are cleared, then rewritten (users only)
//! - membership edges are dropped, then rebuilt from `member_of`
//!
//! A membership that cannot be linked is reported to the warning sink and
//! skipped. There is no rollback; directory errors propagate as they happen.

use crate::directory::Directory;
use crate::warning::{SyncWarning, WarningSink};
use crate::{RoleDescriptor, RoleKind, SyncError};

/// Applies descriptors to a directory.
pub struct RoleUpdater;

impl RoleUpdater {
    /// Create or update the role named by `role` so that it matches it.
    pub fn apply(
        role: &RoleDescriptor,
        directory: &dyn Directory,
        warnings: &dyn WarningSink,
    ) -> Result<(), SyncError> {
        Self::ensure_role(role, directory, warnings)?;
        Self::replace_properties(role, directory)?;
        if role.kind == RoleKind::User {
            Self::replace_credentials(role, directory)?;
        }
        Self::replace_memberships(role, directory, warnings)
    }

    /// Reuse the existing role when its kind matches, otherwise (re)create it.
    fn ensure_role(
        role: &RoleDescriptor,
        directory: &dyn Directory,
        warnings: &dyn WarningSink,
    ) -> Result<(), SyncError> {
        match directory.role_kind(&role.name)? {
            Some(kind) if kind == role.kind => return Ok(()),
            Some(kind) => {
                warnings.warn(&SyncWarning::KindChanged {
                    role: role.name.clone(),
                    from: kind,
                    to: role.kind,
                });
                directory.remove_role(&role.name)?;
            }
            None => {}
        }
        directory.create_role(&role.name, role.kind)?;
        tracing::debug!(role = %role.name, kind = %role.kind, "created role");
        Ok(())
    }

    fn replace_properties(
        role: &RoleDescriptor,
        directory: &dyn Directory,
    ) -> Result<(), SyncError> {
        directory.clear_properties(&role.name)?;
        for (key, value) in &role.properties {
            directory.set_property(&role.name, key, value.clone())?;
        }
        Ok(())
    }

    fn replace_credentials(
        role: &RoleDescriptor,
        directory: &dyn Directory,
    ) -> Result<(), SyncError> {
        directory.clear_credentials(&role.name)?;
        for (key, value) in &role.credentials {
            directory.set_credential(&role.name, key, value.clone())?;
        }
        Ok(())
    }

    fn replace_memberships(
        role: &RoleDescriptor,
        directory: &dyn Directory,
        warnings: &dyn WarningSink,
    ) -> Result<(), SyncError> {
        for group in directory.groups_containing(&role.name)? {
            directory.remove_member(&group, &role.name)?;
        }

        for group in &role.member_of {
            if *group == role.name {
                warnings.warn(&SyncWarning::SelfMembership {
                    role: role.name.clone(),
                });
                continue;
            }
            match directory.role_kind(group)? {
                Some(RoleKind::Group) => {
                    directory.add_member(group, &role.name)?;
                }
                Some(RoleKind::User) => warnings.warn(&SyncWarning::NotAGroup {
                    role: role.name.clone(),
                    group: group.clone(),
                }),
                None => warnings.warn(&SyncWarning::MissingGroup {
                    role: role.name.clone(),
                    group: group.clone(),
                }),
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoleValue;
    use crate::directory::MemoryDirectory;
    use crate::warning::CollectingWarnings;

    #[test]
    fn creates_missing_role() {
        let dir = MemoryDirectory::new();
        let sink = CollectingWarnings::new();
        let alice = RoleDescriptor::user("alice").with_property("email", "a@x");

        RoleUpdater::apply(&alice, &dir, &sink).expect("apply");

        assert_eq!(dir.role_kind("alice").expect("kind"), Some(RoleKind::User));
        assert_eq!(
            dir.properties("alice").expect("props").get("email"),
            Some(&RoleValue::text("a@x"))
        );
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn replaces_properties_and_credentials_wholesale() {
        let dir = MemoryDirectory::new();
        let sink = CollectingWarnings::new();
        let before = RoleDescriptor::user("alice")
            .with_property("email", "a@x")
            .with_property("phone", "123")
            .with_credential("password", "old");
        RoleUpdater::apply(&before, &dir, &sink).expect("apply");

        let after = RoleDescriptor::user("alice")
            .with_property("email", "alice@x")
            .with_credential("token", "t");
        RoleUpdater::apply(&after, &dir, &sink).expect("apply");

        let props = dir.properties("alice").expect("props");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("email"), Some(&RoleValue::text("alice@x")));
        let creds = dir.credentials("alice").expect("creds");
        assert_eq!(creds.len(), 1);
        assert!(creds.contains_key("token"));
    }

    #[test]
    fn group_credentials_are_ignored() {
        let dir = MemoryDirectory::new();
        let sink = CollectingWarnings::new();
        let admins = RoleDescriptor::group("admins").with_credential("password", "x");

        RoleUpdater::apply(&admins, &dir, &sink).expect("apply");

        assert!(dir.credentials("admins").expect("creds").is_empty());
        assert!(sink.snapshot().is_empty());
    }

    #[test]
    fn memberships_are_recomputed() {
        let dir = MemoryDirectory::new();
        let sink = CollectingWarnings::new();
        for g in ["a", "b"] {
            RoleUpdater::apply(&RoleDescriptor::group(g), &dir, &sink).expect("group");
        }

        RoleUpdater::apply(&RoleDescriptor::user("u").member_of("a"), &dir, &sink).expect("u");
        assert_eq!(dir.groups_containing("u").expect("groups"), vec!["a"]);

        RoleUpdater::apply(&RoleDescriptor::user("u").member_of("b"), &dir, &sink).expect("u");
        assert_eq!(dir.groups_containing("u").expect("groups"), vec!["b"]);
    }

    #[test]
    fn missing_group_warns_and_applies_the_rest() {
        let dir = MemoryDirectory::new();
        let sink = CollectingWarnings::new();
        RoleUpdater::apply(&RoleDescriptor::group("staff"), &dir, &sink).expect("group");

        let alice = RoleDescriptor::user("alice")
            .with_property("email", "a@x")
            .with_credential("password", "pw")
            .member_of("admins")
            .member_of("staff")
            .member_of("ops");
        RoleUpdater::apply(&alice, &dir, &sink).expect("apply");

        assert_eq!(
            dir.groups_containing("alice").expect("groups"),
            vec!["staff"]
        );
        assert_eq!(dir.properties("alice").expect("props").len(), 1);
        assert_eq!(dir.credentials("alice").expect("creds").len(), 1);
        assert_eq!(
            sink.snapshot(),
            vec![
                SyncWarning::MissingGroup {
                    role: "alice".to_string(),
                    group: "admins".to_string()
                },
                SyncWarning::MissingGroup {
                    role: "alice".to_string(),
                    group: "ops".to_string()
                },
            ]
        );
    }

    #[test]
    fn user_target_and_self_membership_are_skipped() {
        let dir = MemoryDirectory::new();
        let sink = CollectingWarnings::new();
        RoleUpdater::apply(&RoleDescriptor::user("bob"), &dir, &sink).expect("bob");

        let g = RoleDescriptor::group("g").member_of("bob").member_of("g");
        RoleUpdater::apply(&g, &dir, &sink).expect("g");

        assert!(dir.groups_containing("g").expect("groups").is_empty());
        let warnings = sink.snapshot();
        assert!(matches!(warnings[0], SyncWarning::NotAGroup { .. }));
        assert!(matches!(warnings[1], SyncWarning::SelfMembership { .. }));
    }

    #[test]
    fn kind_change_recreates_role() {
        let dir = MemoryDirectory::new();
        let sink = CollectingWarnings::new();
        let user = RoleDescriptor::user("x").with_credential("pw", "1");
        RoleUpdater::apply(&user, &dir, &sink).expect("user");

        RoleUpdater::apply(&RoleDescriptor::group("x"), &dir, &sink).expect("group");

        assert_eq!(dir.role_kind("x").expect("kind"), Some(RoleKind::Group));
        assert!(dir.credentials("x").expect("creds").is_empty());
        assert!(matches!(
            sink.snapshot()[0],
            SyncWarning::KindChanged {
                from: RoleKind::User,
                to: RoleKind::Group,
                ..
            }
        ));
    }
}
