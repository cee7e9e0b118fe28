//! Property tests for the pure shaping and validation layers.

use droidpilot::response::truncate_output;
use droidpilot::validate;
use proptest::prelude::*;

proptest! {
    #[test]
    fn truncate_never_exceeds_cap_and_is_idempotent(s in ".*", cap in 0usize..64) {
        let (out, truncated) = truncate_output(&s, cap);
        prop_assert!(out.len() <= cap);

        let (again, again_truncated) = truncate_output(out, cap);
        prop_assert_eq!(again, out);
        prop_assert!(!again_truncated);

        if !truncated {
            prop_assert_eq!(out, s.as_str());
        }
    }

    #[test]
    fn validators_never_panic(s in ".*") {
        let _ = validate::validate_absolute_path(&s, "Path");
        let _ = validate::validate_package_name(&s);
        let _ = validate::validate_safe_name(&s, "Name");
        let _ = validate::validate_sdk_package(&s);
        let _ = validate::validate_shell_command(&s);
    }

    #[test]
    fn well_formed_package_names_are_returned_unchanged(
        a in "[a-z][a-zA-Z0-9_]{0,8}",
        b in "[a-z][a-zA-Z0-9_]{0,8}",
        c in "[a-z][a-zA-Z0-9_]{0,8}",
    ) {
        let name = format!("{a}.{b}.{c}");
        prop_assert_eq!(validate::validate_package_name(&name).unwrap(), name);
    }

    #[test]
    fn validated_absolute_paths_stay_absolute(rest in "[a-z0-9/._-]{0,32}") {
        let input = format!("/{rest}");
        if let Ok(normalized) = validate::validate_absolute_path(&input, "Path") {
            prop_assert!(normalized.is_absolute());
        }
    }
}
