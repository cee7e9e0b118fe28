//! Debugging and inspection operations: logcat, screenshots, UI dumps,
//! device properties, and the (intentionally permissive) device shell.

use super::adb_command;
use crate::error::ToolError;
use crate::paths::Toolchain;
use crate::response::{
    Content, OUTPUT_LIMITS, ToolResponse, error_response, image_response, text_response,
    truncate_output,
};
use crate::runner::{self, ExecOptions};
use crate::validate;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

static BATTERY_LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"level:\s*(\d+)").unwrap());
static PHYSICAL_SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Physical size:\s*([\dx]+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Priority {
    V,
    D,
    I,
    W,
    E,
    F,
}

impl Priority {
    fn as_str(self) -> &'static str {
        match self {
            Self::V => "V",
            Self::D => "D",
            Self::I => "I",
            Self::W => "W",
            Self::E => "E",
            Self::F => "F",
        }
    }
}

fn default_lines() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogcatReadArgs {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub grep: Option<String>,
    #[serde(default = "default_lines")]
    pub lines: u32,
    #[serde(default)]
    pub since: Option<String>,
}

/// Compose the logcat argument vector for a read request.
fn logcat_args(args: &LogcatReadArgs) -> Vec<String> {
    let mut out = vec!["logcat".to_string(), "-d".to_string()];

    if let Some(since) = &args.since {
        out.push("-T".to_string());
        out.push(since.clone());
    } else {
        out.push("-t".to_string());
        out.push(args.lines.to_string());
    }

    match (&args.tag, args.priority) {
        (Some(tag), Some(priority)) => {
            out.push(format!("{tag}:{}", priority.as_str()));
            out.push("*:S".to_string());
        }
        (Some(tag), None) => {
            out.push(format!("{tag}:V"));
            out.push("*:S".to_string());
        }
        (None, Some(priority)) => {
            out.push(format!("*:{}", priority.as_str()));
        }
        (None, None) => {}
    }
    out
}

/// Keep only lines containing `needle`, case-insensitively, preserving the
/// original order and casing.
fn filter_lines(text: &str, needle: &str) -> String {
    let needle = needle.to_lowercase();
    text.lines()
        .filter(|line| line.to_lowercase().contains(&needle))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn logcat_read(tc: &Toolchain, args: LogcatReadArgs) -> Result<ToolResponse, ToolError> {
    let spec = adb_command(tc, args.device_id.as_deref()).args(logcat_args(&args));
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(15))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to read logcat.\n\n{}",
            result.stderr
        )));
    }

    let output = match &args.grep {
        Some(needle) => filter_lines(&result.stdout, needle),
        None => result.stdout,
    };
    let output = output.trim();
    if output.is_empty() {
        return Ok(text_response("No matching log entries found."));
    }
    Ok(text_response(output))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogcatClearArgs {
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn logcat_clear(
    tc: &Toolchain,
    args: LogcatClearArgs,
) -> Result<ToolResponse, ToolError> {
    let spec = adb_command(tc, args.device_id.as_deref()).args(["logcat", "-c"]);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to clear logcat.\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response("Logcat buffer cleared."))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotArgs {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub save_path: Option<String>,
}

/// Screenshots can be large; give the raw capture extra headroom.
const SCREENSHOT_CAP: usize = 20 * 1024 * 1024;

pub async fn device_screenshot(
    tc: &Toolchain,
    args: ScreenshotArgs,
) -> Result<ToolResponse, ToolError> {
    let save_path = match &args.save_path {
        Some(path) => Some(validate::validate_absolute_path(path, "Save path")?),
        None => None,
    };

    let spec = adb_command(tc, args.device_id.as_deref()).args(["exec-out", "screencap", "-p"]);
    let raw = runner::run_raw(
        &spec,
        &ExecOptions {
            timeout: Duration::from_secs(15),
            output_cap: SCREENSHOT_CAP,
        },
    )
    .await;

    if !raw.success() {
        return Ok(error_response(format!(
            "Screenshot failed: {}",
            raw.stderr_string().trim()
        )));
    }
    if raw.stdout.is_empty() {
        return Ok(error_response(
            "Screenshot failed. Device may be locked or not fully booted.",
        ));
    }

    if let Some(path) = &save_path {
        if let Err(e) = std::fs::write(path, &raw.stdout) {
            return Ok(error_response(format!("Screenshot failed: {e}")));
        }
    }

    let encoded = BASE64.encode(&raw.stdout);
    Ok(image_response(
        encoded,
        "image/png",
        save_path.map(|p| format!("Screenshot saved to: {p}")),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfoArgs {
    #[serde(default)]
    pub device_id: Option<String>,
}

const DEVICE_PROPERTIES: &[(&str, &str)] = &[
    ("ro.product.model", "Model"),
    ("ro.product.manufacturer", "Manufacturer"),
    ("ro.build.version.release", "Android Version"),
    ("ro.build.version.sdk", "API Level"),
    ("ro.product.cpu.abi", "CPU ABI"),
    ("ro.sf.lcd_density", "Screen Density"),
    ("ro.build.display.id", "Build ID"),
    ("ro.build.type", "Build Type"),
    ("ro.hardware", "Hardware"),
    ("dalvik.vm.heapsize", "Heap Size"),
];

pub async fn device_info(tc: &Toolchain, args: DeviceInfoArgs) -> Result<ToolResponse, ToolError> {
    let device_id = args.device_id.as_deref();
    let mut lines = Vec::with_capacity(DEVICE_PROPERTIES.len() + 2);

    for &(prop, label) in DEVICE_PROPERTIES {
        let spec = adb_command(tc, device_id).args(["shell", "getprop", prop]);
        let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(5))).await;
        let value = if result.success {
            result.stdout.trim().to_string()
        } else {
            "N/A".to_string()
        };
        lines.push(format!("{label}: {value}"));
    }

    let battery_spec = adb_command(tc, device_id).args(["shell", "dumpsys", "battery"]);
    let battery = runner::run(&battery_spec, &ExecOptions::with_timeout(Duration::from_secs(5))).await;
    if battery.success {
        if let Some(level) = BATTERY_LEVEL_RE
            .captures(&battery.stdout)
            .and_then(|c| c.get(1))
        {
            lines.push(format!("Battery Level: {}%", level.as_str()));
        }
    }

    let wm_spec = adb_command(tc, device_id).args(["shell", "wm", "size"]);
    let wm = runner::run(&wm_spec, &ExecOptions::with_timeout(Duration::from_secs(5))).await;
    if wm.success {
        if let Some(size) = PHYSICAL_SIZE_RE.captures(&wm.stdout).and_then(|c| c.get(1)) {
            lines.push(format!("Screen Resolution: {}", size.as_str()));
        }
    }

    Ok(text_response(lines.join("\n")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceShellArgs {
    pub command: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Execute an arbitrary shell command on the device.
///
/// This is the one deliberately permissive entry point: the command string is
/// validated only for length and NUL bytes, because the tool's purpose is to
/// run whatever the operator asks on the target device. It still reaches adb
/// as a single argv element; the host shell is never involved.
pub async fn device_shell(tc: &Toolchain, args: DeviceShellArgs) -> Result<ToolResponse, ToolError> {
    let command = validate::validate_shell_command(&args.command)?;

    let spec = adb_command(tc, args.device_id.as_deref())
        .arg("shell")
        .arg(&command);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(30))).await;

    let (output, truncated) = truncate_output(&result.stdout, OUTPUT_LIMITS.shell_output);

    let mut text = String::new();
    if !result.success {
        let code = result
            .exit_code
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        text.push_str(&format!("[Exit code: {code}]\n"));
    }
    text.push_str(output);
    if truncated {
        text.push_str("\n\n[Output truncated at 10KB]");
    }
    if !result.stderr.is_empty() {
        text.push_str(&format!("\n\nSTDERR:\n{}", result.stderr));
    }

    if text.is_empty() {
        text = "(no output)".to_string();
    }
    Ok(ToolResponse {
        content: vec![Content::Text { text }],
        is_error: !result.success,
    })
}

fn default_compressed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiDumpArgs {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "default_compressed")]
    pub compressed: bool,
}

const UI_DUMP_REMOTE_PATH: &str = "/sdcard/window_dump.xml";

pub async fn ui_dump(tc: &Toolchain, args: UiDumpArgs) -> Result<ToolResponse, ToolError> {
    let device_id = args.device_id.as_deref();

    let mut dump_spec = adb_command(tc, device_id).args(["shell", "uiautomator", "dump"]);
    if args.compressed {
        dump_spec = dump_spec.arg("--compressed");
    }
    dump_spec = dump_spec.arg(UI_DUMP_REMOTE_PATH);
    let dump_result = runner::run(&dump_spec, &ExecOptions::with_timeout(Duration::from_secs(15))).await;

    if !dump_result.success {
        return Ok(error_response(format!(
            "Failed to dump UI hierarchy.\n\n{}",
            dump_result.stderr
        )));
    }

    let cat_spec = adb_command(tc, device_id).args(["shell", "cat", UI_DUMP_REMOTE_PATH]);
    let cat_result = runner::run(&cat_spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;

    let rm_spec = adb_command(tc, device_id).args(["shell", "rm", UI_DUMP_REMOTE_PATH]);
    let _ = runner::run(&rm_spec, &ExecOptions::with_timeout(Duration::from_secs(5))).await;

    if !cat_result.success {
        return Ok(error_response(format!(
            "UI dump created but failed to read.\n\n{}",
            cat_result.stderr
        )));
    }

    let (output, truncated) = truncate_output(&cat_result.stdout, OUTPUT_LIMITS.ui_dump);
    let truncation_note = if truncated {
        "\n\n[Truncated at 50KB, use compressed=true for smaller output]"
    } else {
        ""
    };
    Ok(text_response(format!(
        "UI Hierarchy:\n\n{output}{truncation_note}"
    )))
}

fn default_duration() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenRecordArgs {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "default_duration")]
    pub duration: u32,
    pub save_path: String,
}

const RECORD_REMOTE_PATH: &str = "/sdcard/screen_recording.mp4";

pub async fn screen_record(
    tc: &Toolchain,
    args: ScreenRecordArgs,
) -> Result<ToolResponse, ToolError> {
    let save_path = validate::validate_absolute_path(&args.save_path, "Save path")?;
    let device_id = args.device_id.as_deref();

    // screenrecord blocks for the requested duration; the deadline adds slack.
    let record_spec = adb_command(tc, device_id)
        .args(["shell", "screenrecord", "--time-limit"])
        .arg(args.duration.to_string())
        .arg(RECORD_REMOTE_PATH);
    let record_result = runner::run(
        &record_spec,
        &ExecOptions::with_timeout(Duration::from_secs(u64::from(args.duration) + 10)),
    )
    .await;

    if !record_result.success {
        return Ok(error_response(format!(
            "Screen recording failed.\n\n{}",
            record_result.stderr
        )));
    }

    let pull_spec = adb_command(tc, device_id)
        .arg("pull")
        .arg(RECORD_REMOTE_PATH)
        .arg(save_path.as_str());
    let pull_result = runner::run(&pull_spec, &ExecOptions::with_timeout(Duration::from_secs(30))).await;

    let rm_spec = adb_command(tc, device_id).args(["shell", "rm", RECORD_REMOTE_PATH]);
    let _ = runner::run(&rm_spec, &ExecOptions::with_timeout(Duration::from_secs(5))).await;

    if !pull_result.success {
        return Ok(error_response(format!(
            "Recording completed but failed to pull file.\n\n{}",
            pull_result.stderr
        )));
    }

    Ok(text_response(format!(
        "Screen recording saved to: {save_path}\nDuration: {} seconds\n\n{}",
        args.duration, pull_result.stdout
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_args() -> LogcatReadArgs {
        LogcatReadArgs {
            device_id: None,
            tag: None,
            priority: None,
            grep: None,
            lines: 100,
            since: None,
        }
    }

    #[test]
    fn logcat_defaults_to_recent_line_window() {
        assert_eq!(logcat_args(&read_args()), vec!["logcat", "-d", "-t", "100"]);
    }

    #[test]
    fn logcat_since_replaces_line_window() {
        let args = LogcatReadArgs {
            since: Some("2024-01-01 12:00:00.000".to_string()),
            ..read_args()
        };
        assert_eq!(
            logcat_args(&args),
            vec!["logcat", "-d", "-T", "2024-01-01 12:00:00.000"]
        );
    }

    #[test]
    fn logcat_tag_and_priority_silence_other_tags() {
        let args = LogcatReadArgs {
            tag: Some("MyApp".to_string()),
            priority: Some(Priority::E),
            ..read_args()
        };
        assert_eq!(
            logcat_args(&args),
            vec!["logcat", "-d", "-t", "100", "MyApp:E", "*:S"]
        );

        let tag_only = LogcatReadArgs {
            tag: Some("MyApp".to_string()),
            ..read_args()
        };
        assert_eq!(
            logcat_args(&tag_only),
            vec!["logcat", "-d", "-t", "100", "MyApp:V", "*:S"]
        );

        let priority_only = LogcatReadArgs {
            priority: Some(Priority::W),
            ..read_args()
        };
        assert_eq!(
            logcat_args(&priority_only),
            vec!["logcat", "-d", "-t", "100", "*:W"]
        );
    }

    #[test]
    fn filter_is_case_insensitive_and_order_preserving() {
        let text = "a error x\nb ok\nc Error y";
        assert_eq!(filter_lines(text, "error"), "a error x\nc Error y");
        assert_eq!(filter_lines(text, "ERROR"), "a error x\nc Error y");
        assert_eq!(filter_lines(text, "missing"), "");
    }

    #[tokio::test]
    async fn device_shell_rejects_oversized_commands() {
        let tc = Toolchain::unresolvable();
        let err = device_shell(
            &tc,
            DeviceShellArgs {
                command: "x".repeat(5000),
                device_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("1-4096"));
    }

    #[tokio::test]
    async fn screenshot_rejects_relative_save_path() {
        let tc = Toolchain::unresolvable();
        let err = device_screenshot(
            &tc,
            ScreenshotArgs {
                device_id: None,
                save_path: Some("relative.png".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("absolute path"));
    }
}
