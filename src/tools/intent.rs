//! Intent operations: activity starts, broadcasts, and deep link tests.

use super::adb_command;
use crate::error::ToolError;
use crate::paths::Toolchain;
use crate::response::{ToolResponse, error_response, text_response};
use crate::runner::{self, CommandSpec, ExecOptions};
use crate::validate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const INTENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Append `--es key value` pairs for string extras, in stable key order.
fn push_extras(mut spec: CommandSpec, extras: Option<&BTreeMap<String, String>>) -> CommandSpec {
    if let Some(extras) = extras {
        for (key, value) in extras {
            spec = spec.arg("--es").arg(key).arg(value);
        }
    }
    spec
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSendArgs {
    pub action: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub extras: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub flags: Option<Vec<String>>,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn intent_send(tc: &Toolchain, args: IntentSendArgs) -> Result<ToolResponse, ToolError> {
    let mut spec = adb_command(tc, args.device_id.as_deref())
        .args(["shell", "am", "start", "-a"])
        .arg(&args.action);

    if let Some(data) = &args.data {
        spec = spec.arg("-d").arg(data);
    }
    if let Some(component) = &args.component {
        spec = spec.arg("-n").arg(component);
    }
    spec = push_extras(spec, args.extras.as_ref());
    if let Some(flags) = &args.flags {
        for flag in flags {
            spec = spec.arg("-f").arg(flag);
        }
    }

    let result = runner::run(&spec, &ExecOptions::with_timeout(INTENT_TIMEOUT)).await;
    if !result.success {
        return Ok(error_response(format!(
            "Failed to send intent.\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response(format!(
        "Intent sent: {}\n\n{}",
        args.action, result.stdout
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSendArgs {
    pub action: String,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub extras: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn broadcast_send(
    tc: &Toolchain,
    args: BroadcastSendArgs,
) -> Result<ToolResponse, ToolError> {
    let mut spec = adb_command(tc, args.device_id.as_deref())
        .args(["shell", "am", "broadcast", "-a"])
        .arg(&args.action);

    if let Some(component) = &args.component {
        spec = spec.arg("-n").arg(component);
    }
    spec = push_extras(spec, args.extras.as_ref());

    let result = runner::run(&spec, &ExecOptions::with_timeout(INTENT_TIMEOUT)).await;
    if !result.success {
        return Ok(error_response(format!(
            "Failed to send broadcast.\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response(format!(
        "Broadcast sent: {}\n\n{}",
        args.action, result.stdout
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeeplinkTestArgs {
    pub uri: String,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn deeplink_test(
    tc: &Toolchain,
    args: DeeplinkTestArgs,
) -> Result<ToolResponse, ToolError> {
    if let Some(package_name) = &args.package_name {
        validate::validate_package_name(package_name)?;
    }

    let mut spec = adb_command(tc, args.device_id.as_deref())
        .args(["shell", "am", "start", "-a", "android.intent.action.VIEW", "-d"])
        .arg(&args.uri);
    if let Some(package_name) = &args.package_name {
        spec = spec.arg("-p").arg(package_name);
    }

    let result = runner::run(&spec, &ExecOptions::with_timeout(INTENT_TIMEOUT)).await;
    // `am start` reports resolution failures on stdout with a zero exit.
    if !result.success || result.stdout.contains("Error") {
        return Ok(error_response(format!(
            "Deep link failed for: {}\n\n{}\n{}",
            args.uri, result.stdout, result.stderr
        )));
    }

    let scoped = args
        .package_name
        .map_or_else(String::new, |p| format!(" (in {p})"));
    Ok(text_response(format!(
        "Deep link opened: {}{scoped}\n\n{}",
        args.uri, result.stdout
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn extras_are_discrete_argv_elements_in_stable_order() {
        let mut extras = BTreeMap::new();
        extras.insert("user".to_string(), "alice; rm -rf /".to_string());
        extras.insert("id".to_string(), "42".to_string());

        let spec = push_extras(CommandSpec::new("adb"), Some(&extras));
        let args: Vec<OsString> = spec.args;
        assert_eq!(
            args,
            vec![
                OsString::from("--es"),
                OsString::from("id"),
                OsString::from("42"),
                OsString::from("--es"),
                OsString::from("user"),
                OsString::from("alice; rm -rf /"),
            ]
        );
    }

    #[tokio::test]
    async fn deeplink_validates_optional_package_name() {
        let tc = Toolchain::unresolvable();
        let err = deeplink_test(
            &tc,
            DeeplinkTestArgs {
                uri: "myapp://profile/123".to_string(),
                package_name: Some("bad name".to_string()),
                device_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid Android package name"));
    }
}
