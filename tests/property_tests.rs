//! Property-based tests for application discovery.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated identifiers, namespaces and package trees.

use std::collections::BTreeSet;

use proptest::prelude::*;

use flask_cli::app::{App, Application, SharedApp};
use flask_cli::locate::{
    find_best_app, prepare_exec_for_file, Identifier, NoAppError, Namespace, Registry,
    WELL_KNOWN_NAMES,
};

/// Strategy for dotted module names (never containing a colon).
fn module_name() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z_][a-z0-9_]{0,8}", 1..4).prop_map(|parts| parts.join("."))
}

/// Strategy for sets of binding names that avoid the well-known names.
fn binding_names(max: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z]{3,8}", 0..max).prop_map(|names| {
        names
            .into_iter()
            .filter(|n| !WELL_KNOWN_NAMES.contains(&n.as_str()))
            .collect()
    })
}

fn app(name: &str) -> SharedApp {
    App::builder(name).build()
}

proptest! {
    /// The first colon separates module and attribute; later colons stay
    /// in the attribute.
    #[test]
    fn identifier_splits_on_first_colon(
        module in module_name(),
        attribute in "[a-zA-Z0-9_:]{0,12}",
    ) {
        let id = Identifier::new(format!("{module}:{attribute}"));
        prop_assert_eq!(id.module(), module.as_str());
        prop_assert_eq!(id.attribute(), Some(attribute.as_str()));

        let bare = Identifier::new(module.clone());
        prop_assert_eq!(bare.module(), module.as_str());
        prop_assert_eq!(bare.attribute(), None);
    }

    /// The scan succeeds exactly when one application is bound.
    #[test]
    fn scan_requires_exactly_one_app(
        apps in binding_names(4),
        values in binding_names(4),
    ) {
        let mut ns = Namespace::new("m");
        for name in &values {
            ns = ns.value(name.clone(), name.clone());
        }
        for name in &apps {
            ns = ns.app(name.clone(), app(name));
        }

        let app_count = ns.bindings().filter(|(_, b)| b.as_app().is_some()).count();
        match find_best_app(&ns) {
            Ok(found) => {
                prop_assert_eq!(app_count, 1);
                let name = found.import_name().to_string();
                prop_assert!(apps.contains(&name));
            }
            Err(err) => {
                prop_assert_ne!(app_count, 1);
                prop_assert!(matches!(err, NoAppError::NotFound { .. }), "unexpected error kind");
            }
        }
    }

    /// A well-known name wins regardless of how many other apps exist.
    #[test]
    fn well_known_name_beats_scan(others in binding_names(5), use_application in any::<bool>()) {
        let well_known = if use_application { "application" } else { "app" };
        let mut ns = Namespace::new("m");
        for name in &others {
            ns = ns.app(name.clone(), app(name));
        }
        ns = ns.app(well_known, app("chosen"));

        let found = find_best_app(&ns).unwrap();
        prop_assert_eq!(found.import_name(), "chosen");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A file nested in packages maps to the dotted package path, and the
    /// directory above the outermost package lands on the search path.
    #[test]
    fn nested_file_maps_to_dotted_path(
        packages in prop::collection::vec("[a-z][a-z0-9]{0,5}", 0..4),
        stem in "[a-z][a-z0-9]{0,5}",
    ) {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let mut dir = root.clone();
        for package in &packages {
            dir = dir.join(package);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("__init__.py"), "").unwrap();
        }
        let file = dir.join(format!("{stem}.py"));
        std::fs::write(&file, "").unwrap();

        let registry = Registry::new();
        let id = prepare_exec_for_file(&registry, &file).unwrap();

        let mut expected = packages.clone();
        expected.push(stem.clone());
        prop_assert_eq!(id.as_str(), expected.join("."));
        let search_path = registry.search_path();
        prop_assert_eq!(search_path.first(), Some(&root));
    }
}
