//! Boundary tests for the dispatch layer.
//!
//! Every invocation must resolve to exactly one envelope: input faults are
//! reported verbatim before anything spawns, execution outcomes are shaped,
//! and unknown operations never escape as raised errors.

use camino::Utf8PathBuf;
use droidpilot::paths::Toolchain;
use droidpilot::server;
use serde_json::{Value, json};

/// A toolchain whose programs do not exist; validation-level tests never
/// reach a spawn, and spawn-level tests want the failure.
fn fake_toolchain() -> Toolchain {
    Toolchain {
        sdk_root: Utf8PathBuf::from("/nonexistent/sdk"),
        adb: Utf8PathBuf::from("/nonexistent/sdk/platform-tools/adb"),
        emulator: Utf8PathBuf::from("/nonexistent/sdk/emulator/emulator"),
        avdmanager: Utf8PathBuf::from("/nonexistent/sdk/cmdline-tools/latest/bin/avdmanager"),
        sdkmanager: Utf8PathBuf::from("/nonexistent/sdk/cmdline-tools/latest/bin/sdkmanager"),
        java_home: None,
    }
}

/// A toolchain whose adb is a local script, so handlers can be driven end to
/// end against scripted output.
#[cfg(unix)]
fn scripted_toolchain(dir: &std::path::Path, adb_script: &str) -> Toolchain {
    use std::os::unix::fs::PermissionsExt;

    let adb_path = dir.join("adb");
    std::fs::write(&adb_path, adb_script).unwrap();
    std::fs::set_permissions(&adb_path, std::fs::Permissions::from_mode(0o755)).unwrap();

    Toolchain {
        adb: Utf8PathBuf::from_path_buf(adb_path).unwrap(),
        ..fake_toolchain()
    }
}

#[tokio::test]
async fn build_without_wrapper_reports_before_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let resp = server::dispatch(
        &fake_toolchain(),
        "gradle_build",
        json!({"projectDir": dir.path().to_str().unwrap()}),
    )
    .await;

    assert!(resp.is_error);
    let text = resp.first_text().unwrap();
    assert!(text.contains("No Gradle wrapper found"));
}

#[tokio::test]
async fn validation_fault_text_is_reported_verbatim() {
    let resp = server::dispatch(
        &fake_toolchain(),
        "gradle_build",
        json!({"projectDir": "relative/path"}),
    )
    .await;

    assert!(resp.is_error);
    assert_eq!(
        resp.first_text(),
        Some("Project directory must be an absolute path. Got: relative/path")
    );
}

#[tokio::test]
async fn package_name_fault_is_complete_and_verbatim() {
    let resp = server::dispatch(
        &fake_toolchain(),
        "app_stop",
        json!({"packageName": "example"}),
    )
    .await;

    assert!(resp.is_error);
    let text = resp.first_text().unwrap();
    assert!(text.starts_with("Invalid Android package name: \"example\"."));
    assert!(text.contains("com.example.myapp"));
}

#[tokio::test]
async fn oversized_shell_command_is_rejected() {
    let resp = server::dispatch(
        &fake_toolchain(),
        "device_shell",
        json!({"command": "x".repeat(5000)}),
    )
    .await;

    assert!(resp.is_error);
    assert_eq!(
        resp.first_text(),
        Some("Shell command must be 1-4096 characters.")
    );
}

#[tokio::test]
async fn malformed_argument_shape_is_an_input_fault() {
    let resp = server::dispatch(
        &fake_toolchain(),
        "sdk_install",
        json!({"packages": "not-an-array"}),
    )
    .await;

    assert!(resp.is_error);
    assert!(resp.first_text().unwrap().starts_with("Invalid arguments:"));
}

#[tokio::test]
async fn unknown_operation_yields_an_envelope() {
    let resp = server::dispatch(&fake_toolchain(), "warp_drive", Value::Null).await;
    assert!(resp.is_error);
    assert_eq!(resp.first_text(), Some("Unknown tool: \"warp_drive\""));
}

#[tokio::test]
async fn spawn_failure_is_shaped_not_raised() {
    let resp = server::dispatch(&fake_toolchain(), "device_list", Value::Null).await;
    assert!(resp.is_error);
    let text = resp.first_text().unwrap();
    assert!(text.contains("Failed to list devices"));
    assert!(text.contains("Failed to spawn process"));
}

#[cfg(unix)]
#[tokio::test]
async fn logcat_grep_filters_case_insensitively_preserving_order() {
    let dir = tempfile::tempdir().unwrap();
    let tc = scripted_toolchain(
        dir.path(),
        "#!/bin/sh\nprintf 'a error x\\nb ok\\nc Error y\\n'\n",
    );

    let resp = server::dispatch(&tc, "logcat_read", json!({"grep": "error"})).await;
    assert!(!resp.is_error);
    assert_eq!(resp.first_text(), Some("a error x\nc Error y"));
}

#[cfg(unix)]
#[tokio::test]
async fn logcat_failure_carries_tool_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let tc = scripted_toolchain(
        dir.path(),
        "#!/bin/sh\necho 'adb: no devices found' >&2\nexit 1\n",
    );

    let resp = server::dispatch(&tc, "logcat_read", Value::Null).await;
    assert!(resp.is_error);
    let text = resp.first_text().unwrap();
    assert!(text.contains("Failed to read logcat"));
    assert!(text.contains("no devices found"));
}

#[cfg(unix)]
#[tokio::test]
async fn device_shell_passes_the_command_as_one_argv_element() {
    // The script prints its argument count and last argument; a pipe-laden
    // command must arrive as exactly one element after "shell".
    let dir = tempfile::tempdir().unwrap();
    let tc = scripted_toolchain(
        dir.path(),
        "#!/bin/sh\nprintf '%s %s' \"$#\" \"$2\"\n",
    );

    let resp = server::dispatch(
        &tc,
        "device_shell",
        json!({"command": "dumpsys activity | grep -i focus"}),
    )
    .await;
    assert!(!resp.is_error);
    assert_eq!(
        resp.first_text(),
        Some("2 dumpsys activity | grep -i focus")
    );
}

#[tokio::test]
async fn sdk_install_rejects_hostile_specs_before_spawning() {
    let resp = server::dispatch(
        &fake_toolchain(),
        "sdk_install",
        json!({"packages": ["platforms;android-35", "oops`whoami`"]}),
    )
    .await;

    assert!(resp.is_error);
    assert!(
        resp.first_text()
            .unwrap()
            .starts_with("Invalid SDK package name:")
    );
}
