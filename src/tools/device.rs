//! Device and emulator control operations.

use super::adb_command;
use crate::error::ToolError;
use crate::paths::Toolchain;
use crate::response::{ToolResponse, error_response, text_response};
use crate::runner::{self, CommandSpec, ExecOptions};
use crate::validate;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

static ROUTE_SRC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"src\s+([\d.]+)").unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListArgs {}

#[derive(Debug)]
struct DeviceEntry {
    serial: String,
    state: String,
    model: String,
    product: String,
}

/// Parse `adb devices -l` output (header line first, `key:value` props after
/// the serial and state columns).
fn parse_device_list(stdout: &str) -> Vec<DeviceEntry> {
    stdout
        .trim()
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next().unwrap_or_default().to_string();
            let state = parts.next().unwrap_or_default().to_string();
            let mut model = "unknown".to_string();
            let mut product = "unknown".to_string();
            for part in parts {
                if let Some((key, value)) = part.split_once(':') {
                    match key {
                        "model" => model = value.to_string(),
                        "product" => product = value.to_string(),
                        _ => {}
                    }
                }
            }
            DeviceEntry {
                serial,
                state,
                model,
                product,
            }
        })
        .collect()
}

pub async fn device_list(tc: &Toolchain, _args: DeviceListArgs) -> Result<ToolResponse, ToolError> {
    let spec = adb_command(tc, None).args(["devices", "-l"]);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to list devices.\n\n{}",
            result.stderr
        )));
    }

    let devices = parse_device_list(&result.stdout);
    if devices.is_empty() {
        return Ok(text_response("No devices connected."));
    }
    let listing = devices
        .iter()
        .map(|d| {
            format!(
                "- {} ({}) model:{} product:{}",
                d.serial, d.state, d.model, d.product
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text_response(format!(
        "Found {} device(s):\n\n{listing}",
        devices.len()
    )))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvdListArgs {}

pub async fn avd_list(tc: &Toolchain, _args: AvdListArgs) -> Result<ToolResponse, ToolError> {
    let spec = CommandSpec::new(tc.avdmanager.as_str()).args(["list", "avd"]);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(15))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to list AVDs.\n\n{}",
            result.stderr
        )));
    }
    if result.stdout.is_empty() {
        return Ok(text_response("No AVDs found."));
    }
    Ok(text_response(result.stdout))
}

fn default_device_profile() -> String {
    "pixel_6".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAvdArgs {
    pub name: String,
    pub package: String,
    #[serde(default = "default_device_profile")]
    pub device: String,
    #[serde(default)]
    pub force: bool,
}

pub async fn avd_create(tc: &Toolchain, args: CreateAvdArgs) -> Result<ToolResponse, ToolError> {
    let name = validate::validate_safe_name(&args.name, "AVD name")?;
    let package = validate::validate_sdk_package(&args.package)?;
    let device = validate::validate_safe_name(&args.device, "Device profile")?;

    let mut spec = CommandSpec::new(tc.avdmanager.as_str())
        .args(["create", "avd", "-n"])
        .arg(&name)
        .arg("-k")
        .arg(&package)
        .arg("-d")
        .arg(&device);
    if args.force {
        spec = spec.arg("--force");
    }

    // "no" skips the custom hardware profile prompt.
    let result = runner::run_with_stdin(
        &spec,
        "no\n",
        &ExecOptions::with_timeout(Duration::from_secs(30)),
    )
    .await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to create AVD \"{name}\".\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response(format!(
        "AVD \"{name}\" created successfully.\n\n{}",
        result.stdout
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEmulatorArgs {
    pub avd_name: String,
    #[serde(default)]
    pub cold_boot: bool,
    #[serde(default)]
    pub no_window: bool,
    #[serde(default)]
    pub wipe_data: bool,
}

const BOOT_MAX_WAIT: Duration = Duration::from_secs(120);
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(3);

pub async fn emulator_start(
    tc: &Toolchain,
    args: StartEmulatorArgs,
) -> Result<ToolResponse, ToolError> {
    let avd_name = validate::validate_safe_name(&args.avd_name, "AVD name")?;

    let mut spec = CommandSpec::new(tc.emulator.as_str()).arg("-avd").arg(&avd_name);
    if args.cold_boot {
        spec = spec.arg("-no-snapshot-load");
    }
    if args.no_window {
        spec = spec.arg("-no-window");
    }
    if args.wipe_data {
        spec = spec.arg("-wipe-data");
    }

    let pid = match runner::spawn_detached(&spec) {
        Ok(pid) => pid,
        Err(e) => {
            return Ok(error_response(format!(
                "Failed to start emulator \"{avd_name}\": {e}"
            )));
        }
    };

    // The emulator reports readiness through adb, not through its own exit;
    // poll the boot property until it flips or the wait window closes.
    let started = Instant::now();
    while started.elapsed() < BOOT_MAX_WAIT {
        tokio::time::sleep(BOOT_POLL_INTERVAL).await;

        let check_spec = adb_command(tc, None).args(["shell", "getprop", "sys.boot_completed"]);
        let check = runner::run(&check_spec, &ExecOptions::with_timeout(Duration::from_secs(5))).await;
        if check.success && check.stdout.trim() == "1" {
            let devices_spec = adb_command(tc, None).arg("devices");
            let devices =
                runner::run(&devices_spec, &ExecOptions::with_timeout(Duration::from_secs(5))).await;
            let serials = devices
                .stdout
                .lines()
                .filter(|line| line.contains("emulator"))
                .filter_map(|line| line.split('\t').next())
                .collect::<Vec<_>>()
                .join(", ");
            let serials = if serials.is_empty() { "unknown".to_string() } else { serials };
            return Ok(text_response(format!(
                "Emulator \"{avd_name}\" booted successfully (PID: {pid}).\nDevice serial(s): {serials}"
            )));
        }
    }

    Ok(error_response(format!(
        "Emulator \"{avd_name}\" started (PID: {pid}) but did not finish booting within {} seconds. \
         It may still be booting.",
        BOOT_MAX_WAIT.as_secs()
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEmulatorArgs {
    pub device_id: String,
}

pub async fn emulator_stop(
    tc: &Toolchain,
    args: StopEmulatorArgs,
) -> Result<ToolResponse, ToolError> {
    let spec = adb_command(tc, Some(&args.device_id)).args(["emu", "kill"]);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(15))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to stop emulator {}.\n\n{}",
            args.device_id, result.stderr
        )));
    }
    Ok(text_response(format!(
        "Emulator {} stopped.\n\n{}",
        args.device_id, result.stdout
    )))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallApkArgs {
    pub apk_path: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub reinstall: bool,
    #[serde(default = "default_true")]
    pub grant_permissions: bool,
}

pub async fn apk_install(tc: &Toolchain, args: InstallApkArgs) -> Result<ToolResponse, ToolError> {
    let apk_path = validate::validate_absolute_path(&args.apk_path, "APK path")?;

    if !apk_path.exists() {
        return Ok(error_response(format!("APK not found at: {apk_path}")));
    }

    let mut spec = adb_command(tc, args.device_id.as_deref()).arg("install");
    if args.reinstall {
        spec = spec.arg("-r");
    }
    if args.grant_permissions {
        spec = spec.arg("-g");
    }
    spec = spec.arg(apk_path.as_str());

    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(60))).await;

    // `adb install` can report failure on stdout while exiting zero.
    if !result.success || result.stdout.contains("Failure") {
        return Ok(error_response(format!(
            "Failed to install APK.\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
            result.stdout, result.stderr
        )));
    }
    Ok(text_response(format!(
        "APK installed successfully.\n\n{}",
        result.stdout
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchAppArgs {
    pub package_name: String,
    #[serde(default)]
    pub activity_name: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn app_launch(tc: &Toolchain, args: LaunchAppArgs) -> Result<ToolResponse, ToolError> {
    let package_name = validate::validate_package_name(&args.package_name)?;

    let spec = match &args.activity_name {
        Some(activity) => adb_command(tc, args.device_id.as_deref())
            .args(["shell", "am", "start", "-n"])
            .arg(format!("{package_name}/{activity}")),
        None => adb_command(tc, args.device_id.as_deref())
            .args(["shell", "monkey", "-p"])
            .arg(&package_name)
            .args(["-c", "android.intent.category.LAUNCHER", "1"]),
    };

    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(15))).await;
    if !result.success {
        return Ok(error_response(format!(
            "Failed to launch {package_name}.\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response(format!(
        "Launched {package_name}.\n\n{}",
        result.stdout
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopAppArgs {
    pub package_name: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn app_stop(tc: &Toolchain, args: StopAppArgs) -> Result<ToolResponse, ToolError> {
    let package_name = validate::validate_package_name(&args.package_name)?;

    let spec = adb_command(tc, args.device_id.as_deref())
        .args(["shell", "am", "force-stop"])
        .arg(&package_name);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to stop {package_name}.\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response(format!("Force-stopped {package_name}.")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppClearDataArgs {
    pub package_name: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn app_clear_data(
    tc: &Toolchain,
    args: AppClearDataArgs,
) -> Result<ToolResponse, ToolError> {
    let package_name = validate::validate_package_name(&args.package_name)?;

    let spec = adb_command(tc, args.device_id.as_deref())
        .args(["shell", "pm", "clear"])
        .arg(&package_name);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(15))).await;

    if !result.success || result.stdout.trim() == "Failed" {
        return Ok(error_response(format!(
            "Failed to clear data for {package_name}.\n\n{}\n{}",
            result.stdout, result.stderr
        )));
    }
    Ok(text_response(format!("App data cleared for {package_name}.")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Grant,
    Revoke,
}

impl PermissionAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Grant => "granted",
            Self::Revoke => "revoked",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPermissionArgs {
    pub package_name: String,
    pub permission: String,
    pub action: PermissionAction,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn app_permission(
    tc: &Toolchain,
    args: AppPermissionArgs,
) -> Result<ToolResponse, ToolError> {
    let package_name = validate::validate_package_name(&args.package_name)?;

    let spec = adb_command(tc, args.device_id.as_deref())
        .args(["shell", "pm", args.action.verb()])
        .arg(&package_name)
        .arg(&args.permission);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to {} permission {} for {package_name}.\n\n{}",
            args.action.verb(),
            args.permission,
            result.stderr
        )));
    }
    Ok(text_response(format!(
        "Permission {}: {} for {package_name}",
        args.action.past_tense(),
        args.permission
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAppPermissionsArgs {
    pub package_name: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Extract the permission-relevant lines from `dumpsys package` output.
fn extract_permission_lines(stdout: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for line in stdout.lines() {
        if line.contains("granted=true") || line.contains("granted=false") {
            lines.push(line.trim().to_string());
        }
        if line.contains("install permissions:") || line.contains("runtime permissions:") {
            lines.push(format!("\n{}", line.trim()));
        }
    }
    lines
}

pub async fn app_permissions_list(
    tc: &Toolchain,
    args: ListAppPermissionsArgs,
) -> Result<ToolResponse, ToolError> {
    let package_name = validate::validate_package_name(&args.package_name)?;

    let spec = adb_command(tc, args.device_id.as_deref())
        .args(["shell", "dumpsys", "package"])
        .arg(&package_name);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(15))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to list permissions for {package_name}.\n\n{}",
            result.stderr
        )));
    }

    let perm_lines = extract_permission_lines(&result.stdout);
    if perm_lines.is_empty() {
        return Ok(text_response(format!(
            "No permission info found for {package_name}."
        )));
    }
    Ok(text_response(format!(
        "Permissions for {package_name}:\n\n{}",
        perm_lines.join("\n")
    )))
}

fn default_wifi_port() -> u16 {
    5555
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiConnectArgs {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "default_wifi_port")]
    pub port: u16,
}

const TCPIP_SETTLE_DELAY: Duration = Duration::from_secs(2);

pub async fn adb_wifi_connect(
    tc: &Toolchain,
    args: WifiConnectArgs,
) -> Result<ToolResponse, ToolError> {
    let port = args.port;
    let device_id = args.device_id.as_deref();

    let tcp_spec = adb_command(tc, device_id)
        .arg("tcpip")
        .arg(port.to_string());
    let tcp_result = runner::run(&tcp_spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;
    if !tcp_result.success {
        return Ok(error_response(format!(
            "Failed to switch to TCP/IP mode.\n\n{}",
            tcp_result.stderr
        )));
    }

    // The adb daemon on the device restarts; give it a moment.
    tokio::time::sleep(TCPIP_SETTLE_DELAY).await;

    let ip_spec = adb_command(tc, device_id).args(["shell", "ip", "route", "get", "1"]);
    let ip_result = runner::run(&ip_spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;
    if !ip_result.success {
        return Ok(text_response(format!(
            "TCP/IP mode enabled on port {port}, but failed to get device IP.\n\
             Use 'adb connect <ip>:{port}' manually.\n\n{}",
            ip_result.stderr
        )));
    }

    let Some(device_ip) = ROUTE_SRC_RE
        .captures(&ip_result.stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
    else {
        return Ok(text_response(format!(
            "TCP/IP mode enabled on port {port}, but could not parse device IP from:\n{}\n\
             Use 'adb connect <ip>:{port}' manually.",
            ip_result.stdout
        )));
    };

    let connect_spec = adb_command(tc, None)
        .arg("connect")
        .arg(format!("{device_ip}:{port}"));
    let connect_result =
        runner::run(&connect_spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;

    if !connect_result.success || connect_result.stdout.contains("failed") {
        return Ok(error_response(format!(
            "TCP/IP enabled but WiFi connection failed.\nDevice IP: {device_ip}:{port}\n\n{}\n{}",
            connect_result.stdout, connect_result.stderr
        )));
    }

    Ok(text_response(format!(
        "WiFi ADB connected to {device_ip}:{port}\nYou can now disconnect the USB cable.\n\n{}",
        connect_result.stdout
    )))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiDisconnectArgs {
    #[serde(default)]
    pub address: Option<String>,
}

pub async fn adb_wifi_disconnect(
    tc: &Toolchain,
    args: WifiDisconnectArgs,
) -> Result<ToolResponse, ToolError> {
    let mut spec = adb_command(tc, None).arg("disconnect");
    if let Some(address) = &args.address {
        spec = spec.arg(address);
    }
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(10))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Disconnect failed.\n\n{}",
            result.stderr
        )));
    }
    let target = args
        .address
        .map_or_else(|| " all WiFi devices".to_string(), |a| format!(" from {a}"));
    Ok(text_response(format!(
        "Disconnected{target}.\n\n{}",
        result.stdout
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePushArgs {
    pub local_path: String,
    pub remote_path: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn file_push(tc: &Toolchain, args: FilePushArgs) -> Result<ToolResponse, ToolError> {
    let local_path = validate::validate_absolute_path(&args.local_path, "Local path")?;

    if !local_path.exists() {
        return Ok(error_response(format!("Local file not found: {local_path}")));
    }

    let spec = adb_command(tc, args.device_id.as_deref())
        .arg("push")
        .arg(local_path.as_str())
        .arg(&args.remote_path);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(60))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to push file.\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response(format!(
        "File pushed: {local_path} → {}\n\n{}",
        args.remote_path, result.stdout
    )))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePullArgs {
    pub remote_path: String,
    pub local_path: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn file_pull(tc: &Toolchain, args: FilePullArgs) -> Result<ToolResponse, ToolError> {
    let local_path = validate::validate_absolute_path(&args.local_path, "Local path")?;

    let spec = adb_command(tc, args.device_id.as_deref())
        .arg("pull")
        .arg(&args.remote_path)
        .arg(local_path.as_str());
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(60))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to pull file.\n\n{}",
            result.stderr
        )));
    }
    Ok(text_response(format!(
        "File pulled: {} → {local_path}\n\n{}",
        args.remote_path, result.stdout
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_listing_with_props() {
        let stdout = "List of devices attached\n\
                      emulator-5554          device product:sdk_gphone64_arm64 model:sdk_gphone64_arm64 device:emu64a\n\
                      R58M123ABC             unauthorized usb:1-1\n";
        let devices = parse_device_list(stdout);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert_eq!(devices[0].state, "device");
        assert_eq!(devices[0].model, "sdk_gphone64_arm64");
        assert_eq!(devices[1].serial, "R58M123ABC");
        assert_eq!(devices[1].model, "unknown");
    }

    #[test]
    fn empty_device_listing() {
        assert!(parse_device_list("List of devices attached\n").is_empty());
    }

    #[test]
    fn extracts_permission_lines_preserving_sections() {
        let dump = "Packages:\n\
                    \x20 install permissions:\n\
                    \x20   android.permission.INTERNET: granted=true\n\
                    \x20 runtime permissions:\n\
                    \x20   android.permission.CAMERA: granted=false\n\
                    unrelated line\n";
        let lines = extract_permission_lines(dump);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with('\n'));
        assert!(lines[1].contains("granted=true"));
        assert!(lines[3].contains("granted=false"));
    }

    #[test]
    fn route_regex_extracts_source_ip() {
        let stdout = "1.0.0.0 via 10.0.2.2 dev radio0 table 1002 src 10.0.2.16 uid 0";
        let ip = ROUTE_SRC_RE
            .captures(stdout)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        assert_eq!(ip, Some("10.0.2.16"));
    }

    #[tokio::test]
    async fn app_stop_rejects_invalid_package_name() {
        let tc = Toolchain::unresolvable();
        let err = app_stop(
            &tc,
            StopAppArgs {
                package_name: "not a package".to_string(),
                device_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid Android package name"));
    }

    #[tokio::test]
    async fn avd_create_rejects_hostile_sdk_spec() {
        let tc = Toolchain::unresolvable();
        let err = avd_create(
            &tc,
            CreateAvdArgs {
                name: "test_avd".to_string(),
                package: "system-images;android-35;$(rm -rf /)".to_string(),
                device: "pixel_6".to_string(),
                force: false,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid SDK package name"));
    }
}
