//! CLI surface tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn tools_subcommand_prints_the_catalog() {
    Command::cargo_bin("droidpilot")
        .unwrap()
        .arg("tools")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("gradle_build")
                .and(predicate::str::contains("device_shell"))
                .and(predicate::str::contains("sdk_install")),
        );
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("droidpilot")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve").and(predicate::str::contains("tools")));
}
