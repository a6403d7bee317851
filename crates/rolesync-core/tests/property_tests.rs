//! # Property-Based Tests
//!
//! Ordering and exactness invariants of parsing and reconciliation.

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;
use rolesync_core::{
    Directory, DocumentParser, MemoryDirectory, PendingChanges, RoleDescriptor, RoleKind,
    RoleSync, snapshot,
};
use std::collections::BTreeSet;

// =============================================================================
// STRATEGIES
// =============================================================================

fn role_names() -> impl Strategy<Value = BTreeSet<String>> {
    btree_set("[a-z][a-z0-9]{0,7}", 0..12)
}

/// Users and groups with arbitrary memberships among `names`.
fn descriptors(names: &BTreeSet<String>, seed: &[bool]) -> Vec<RoleDescriptor> {
    let all: Vec<&String> = names.iter().collect();
    all.iter()
        .enumerate()
        .map(|(i, name)| {
            let is_group = seed.get(i).copied().unwrap_or(false);
            let mut role = if is_group {
                RoleDescriptor::group(name.as_str())
            } else {
                RoleDescriptor::user(name.as_str()).with_credential("password", format!("pw{i}"))
            };
            role = role.with_property("index", i.to_string());
            // Link to the previous role; it may or may not be a group.
            if i > 0 {
                role = role.member_of(all[i - 1].as_str());
            }
            role
        })
        .collect()
}

fn to_document(roles: &[RoleDescriptor]) -> String {
    let mut doc = String::from("<roles>");
    for role in roles {
        doc.push_str(&format!(r#"<{} name="{}">"#, role.kind.tag(), role.name));
        for group in &role.member_of {
            doc.push_str(&format!("<memberof>{group}</memberof>"));
        }
        doc.push_str(&format!("</{}>", role.kind.tag()));
    }
    doc.push_str("</roles>");
    doc
}

fn directory_names(directory: &dyn Directory) -> BTreeSet<String> {
    directory
        .list_roles()
        .expect("list")
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Installing then uninstalling the same batch restores the directory.
    #[test]
    fn install_then_uninstall_round_trips(
        names in role_names(),
        seed in vec(any::<bool>(), 12),
    ) {
        let sync = RoleSync::new();
        let dir = MemoryDirectory::shared();
        dir.create_role("pre-existing", RoleKind::User).expect("create");
        sync.on_directory_available(dir.clone()).expect("attach");
        let before = snapshot(dir.as_ref()).expect("snapshot");

        let roles = descriptors(&names, &seed);
        sync.install_roles(roles.clone()).expect("install");
        sync.uninstall_roles(roles).expect("uninstall");

        prop_assert_eq!(snapshot(dir.as_ref()).expect("snapshot"), before);
    }

    /// After two full replaces only the second batch remains.
    #[test]
    fn set_users_is_exact(
        first in role_names(),
        second in role_names(),
        seed in vec(any::<bool>(), 12),
    ) {
        let sync = RoleSync::new();
        let dir = MemoryDirectory::shared();
        sync.on_directory_available(dir.clone()).expect("attach");

        sync.set_users_roles(descriptors(&first, &seed)).expect("first");
        sync.set_users_roles(descriptors(&second, &seed)).expect("second");

        prop_assert_eq!(directory_names(dir.as_ref()), second);
    }

    /// Full replace gives the same result whether staged before or after attach.
    #[test]
    fn set_users_is_independent_of_attach_time(
        names in role_names(),
        seed in vec(any::<bool>(), 12),
    ) {
        let roles = descriptors(&names, &seed);

        let eager = RoleSync::new();
        let eager_dir = MemoryDirectory::shared();
        eager.on_directory_available(eager_dir.clone()).expect("attach");
        eager.set_users_roles(roles.clone()).expect("set users");

        let lazy = RoleSync::new();
        let lazy_dir = MemoryDirectory::shared();
        lazy.set_users_roles(roles).expect("set users");
        lazy.on_directory_available(lazy_dir.clone()).expect("attach");

        prop_assert_eq!(
            snapshot(eager_dir.as_ref()).expect("snapshot"),
            snapshot(lazy_dir.as_ref()).expect("snapshot")
        );
    }

    /// Removals are staged in exact reverse of the given order.
    #[test]
    fn removals_are_staged_in_reverse(names in vec("[a-z]{1,6}", 0..20)) {
        let mut pending = PendingChanges::new();
        pending.stage_remove(names.iter().map(|n| RoleDescriptor::user(n.as_str())));

        let staged: Vec<&str> = pending.pending_removals().map(|r| r.name.as_str()).collect();
        let mut expected: Vec<&str> = names.iter().map(String::as_str).collect();
        expected.reverse();
        prop_assert_eq!(staged, expected);
    }

    /// Parsing preserves declaration order, kinds and memberships.
    #[test]
    fn parse_preserves_document_order(
        names in role_names(),
        seed in vec(any::<bool>(), 12),
    ) {
        let roles = descriptors(&names, &seed);
        let parsed = DocumentParser::parse_str(&to_document(&roles)).expect("parse");

        prop_assert_eq!(parsed.len(), roles.len());
        for (got, want) in parsed.iter().zip(&roles) {
            prop_assert_eq!(&got.name, &want.name);
            prop_assert_eq!(got.kind, want.kind);
            prop_assert_eq!(&got.member_of, &want.member_of);
        }
    }
}
