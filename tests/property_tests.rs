//! Property-based tests for name validation, registry parsing and the
//! bottle store.

mod common;

use common::Harness;
use proptest::prelude::*;
use winecellar::models::validate_bottle_name;
use winecellar::services::RegistryFile;
use winecellar::ui::parse_command;

proptest! {
    #[test]
    fn names_with_separators_are_rejected(
        head in "[A-Za-z0-9 ]{0,8}",
        sep in prop::sample::select(vec!['/', '\\']),
        tail in "[A-Za-z0-9 ]{0,8}",
    ) {
        let name = format!("{}{}{}", head, sep, tail);
        prop_assert!(validate_bottle_name(&name).is_err());
    }

    #[test]
    fn plain_names_are_accepted(name in "[A-Za-z0-9][A-Za-z0-9 _.-]{0,30}[A-Za-z0-9]") {
        prop_assert!(validate_bottle_name(&name).is_ok());
    }

    #[test]
    fn padded_names_are_rejected(name in "[A-Za-z0-9]{1,12}", pad in "[ \t]{1,3}") {
        let padded_front = format!("{}{}", pad, name);
        let padded_back = format!("{}{}", name, pad);
        prop_assert!(validate_bottle_name(&padded_front).is_err());
        prop_assert!(validate_bottle_name(&padded_back).is_err());
    }

    #[test]
    fn registry_values_are_found_under_their_key(
        segments in prop::collection::vec("[A-Za-z][A-Za-z0-9]{0,8}", 1..4),
        name in "[A-Za-z][A-Za-z0-9]{0,8}",
        value in "[A-Za-z0-9 .=-]{0,16}",
    ) {
        let on_disk = segments.join("\\\\");
        let content = format!(
            "WINE REGISTRY Version 2\n\n[{}] 1700000000\n\"{}\"=\"{}\"\n",
            on_disk, name, value
        );

        let registry = RegistryFile::parse(&content);

        let key = segments.join("\\");
        prop_assert!(registry.has_key(&key));
        prop_assert_eq!(
            registry.value(&key.to_uppercase(), &name.to_lowercase()),
            Some(value.as_str())
        );
    }

    #[test]
    fn registry_parse_never_panics(content in "\\PC{0,200}") {
        let _ = RegistryFile::parse(&content);
    }

    #[test]
    fn console_parser_never_panics(line in "\\PC{0,80}") {
        let _ = parse_command(&line, None, false);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn create_adds_exactly_one_record(
        names in prop::collection::btree_set("[A-Za-z][A-Za-z0-9]{0,10}", 1..4),
    ) {
        let mut h = Harness::new();
        for (created, name) in names.iter().enumerate() {
            prop_assert_eq!(h.manager.bottles().len(), created);
            prop_assert!(h.create(name).is_ok());
            prop_assert_eq!(h.manager.bottles().len(), created + 1);
        }

        let mut expected: Vec<String> = names.into_iter().collect();
        expected.sort();
        prop_assert_eq!(h.names(), expected);
    }
}
