//! APK inspection via apkanalyzer.

use crate::error::ToolError;
use crate::paths::Toolchain;
use crate::response::{ToolResponse, error_response, text_response};
use crate::runner::{self, CommandSpec, ExecOptions, ExecResult};
use crate::validate;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

const APKANALYZER_TIMEOUT: Duration = Duration::from_secs(30);

static MIN_SDK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"android:minSdkVersion.*?="(\d+)""#).unwrap());
static TARGET_SDK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"android:targetSdkVersion.*?="(\d+)""#).unwrap());
static VERSION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"android:versionName.*?="([^"]+)""#).unwrap());
static VERSION_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"android:versionCode.*?="(\d+)""#).unwrap());
static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"package="([^"]+)""#).unwrap());

fn capture<'a>(re: &Regex, haystack: &'a str) -> Option<&'a str> {
    re.captures(haystack).and_then(|c| c.get(1)).map(|m| m.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    #[default]
    Summary,
    Full,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkAnalyzeArgs {
    pub apk_path: String,
    #[serde(default)]
    pub detail: Detail,
}

async fn apkanalyzer_run(tc: &Toolchain, args: &[&str]) -> ExecResult {
    let spec = CommandSpec::new(tc.apkanalyzer().as_str()).args(args.iter().copied());
    runner::run(&spec, &ExecOptions::with_timeout(APKANALYZER_TIMEOUT)).await
}

pub async fn apk_analyze(tc: &Toolchain, args: ApkAnalyzeArgs) -> Result<ToolResponse, ToolError> {
    let apk_path = validate::validate_absolute_path(&args.apk_path, "APK path")?;

    if !apk_path.exists() {
        return Ok(error_response(format!("APK not found at: {apk_path}")));
    }
    let apk = apk_path.as_str();

    let mut sections = Vec::new();

    let file_size = apkanalyzer_run(tc, &["apk", "file-size", apk]).await;
    if file_size.success {
        sections.push(format!("APK File Size: {} bytes", file_size.stdout.trim()));
    }

    let download_size = apkanalyzer_run(tc, &["apk", "download-size", apk]).await;
    if download_size.success {
        sections.push(format!("Download Size: {} bytes", download_size.stdout.trim()));
    }

    let manifest = apkanalyzer_run(tc, &["manifest", "print", apk]).await;
    if manifest.success {
        if let Some(package) = capture(&PACKAGE_RE, &manifest.stdout) {
            sections.push(format!("Package: {package}"));
        }
        if let Some(version) = capture(&VERSION_NAME_RE, &manifest.stdout) {
            sections.push(format!("Version: {version}"));
        }
        if let Some(code) = capture(&VERSION_CODE_RE, &manifest.stdout) {
            sections.push(format!("Version Code: {code}"));
        }
        if let Some(min_sdk) = capture(&MIN_SDK_RE, &manifest.stdout) {
            sections.push(format!("Min SDK: {min_sdk}"));
        }
        if let Some(target_sdk) = capture(&TARGET_SDK_RE, &manifest.stdout) {
            sections.push(format!("Target SDK: {target_sdk}"));
        }
    }

    let dex_refs = apkanalyzer_run(tc, &["dex", "references", apk]).await;
    if dex_refs.success {
        sections.push(format!("\nDEX References:\n{}", dex_refs.stdout.trim()));
    }

    if args.detail == Detail::Full {
        let files = apkanalyzer_run(tc, &["files", "list", apk]).await;
        if files.success {
            let listing: Vec<&str> = files.stdout.trim().lines().collect();
            let shown = listing.iter().take(50).copied().collect::<Vec<_>>().join("\n");
            let more = if listing.len() > 50 {
                format!("\n... and {} more", listing.len() - 50)
            } else {
                String::new()
            };
            sections.push(format!("\nFiles ({} total):\n{shown}{more}", listing.len()));
        }

        if manifest.success {
            sections.push(format!("\nFull Manifest:\n{}", manifest.stdout));
        }
    }

    if sections.is_empty() {
        return Ok(error_response(format!(
            "Failed to analyze APK. Ensure apkanalyzer is available at: {}",
            tc.apkanalyzer()
        )));
    }
    Ok(text_response(sections.join("\n")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApkPermissionsArgs {
    pub apk_path: String,
}

pub async fn apk_permissions(
    tc: &Toolchain,
    args: ApkPermissionsArgs,
) -> Result<ToolResponse, ToolError> {
    let apk_path = validate::validate_absolute_path(&args.apk_path, "APK path")?;

    if !apk_path.exists() {
        return Ok(error_response(format!("APK not found at: {apk_path}")));
    }

    let result = apkanalyzer_run(tc, &["manifest", "permissions", apk_path.as_str()]).await;
    if !result.success {
        return Ok(error_response(format!(
            "Failed to read APK permissions.\n\n{}",
            result.stderr
        )));
    }

    let permissions: Vec<&str> = result
        .stdout
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if permissions.is_empty() {
        return Ok(text_response("No permissions declared in the APK."));
    }
    let listing = permissions
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text_response(format!(
        "Permissions ({}):\n\n{listing}",
        permissions.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_field_extraction() {
        let manifest = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.myapp"
    android:versionCode="42"
    android:versionName="1.2.3">
    <uses-sdk
        android:minSdkVersion="24"
        android:targetSdkVersion="35" />
</manifest>"#;
        assert_eq!(capture(&PACKAGE_RE, manifest), Some("com.example.myapp"));
        assert_eq!(capture(&VERSION_CODE_RE, manifest), Some("42"));
        assert_eq!(capture(&VERSION_NAME_RE, manifest), Some("1.2.3"));
        assert_eq!(capture(&MIN_SDK_RE, manifest), Some("24"));
        assert_eq!(capture(&TARGET_SDK_RE, manifest), Some("35"));
    }

    #[tokio::test]
    async fn missing_apk_is_reported_without_spawning() {
        let tc = Toolchain::unresolvable();
        let resp = apk_permissions(
            &tc,
            ApkPermissionsArgs {
                apk_path: "/nonexistent/app.apk".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(resp.is_error);
        assert!(resp.first_text().unwrap().contains("APK not found"));
    }
}
