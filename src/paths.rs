//! Android SDK toolchain resolution.
//!
//! Resolved once at startup and consumed read-only by every handler. Tool
//! paths are derived from the SDK root by probing the usual install
//! locations; a missing tool resolves to its expected location (or PATH) with
//! a warning, so the eventual spawn failure carries a useful path.

use crate::error::ToolchainError;
use camino::Utf8PathBuf;
use tracing::{info, warn};

/// Resolved locations of the external tools this server drives.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub sdk_root: Utf8PathBuf,
    pub adb: Utf8PathBuf,
    pub emulator: Utf8PathBuf,
    pub avdmanager: Utf8PathBuf,
    pub sdkmanager: Utf8PathBuf,
    pub java_home: Option<Utf8PathBuf>,
}

impl Toolchain {
    /// Detect the SDK root and derive tool paths.
    ///
    /// Checks `ANDROID_HOME`, then `ANDROID_SDK_ROOT`, then the platform's
    /// default install location. Fails only when no SDK directory exists;
    /// individual missing tools fall back with a warning.
    pub fn detect() -> Result<Self, ToolchainError> {
        let fallback = default_sdk_root();
        let sdk_root = std::env::var("ANDROID_HOME")
            .ok()
            .or_else(|| std::env::var("ANDROID_SDK_ROOT").ok())
            .map(Utf8PathBuf::from)
            .or_else(|| fallback.clone())
            .ok_or_else(|| ToolchainError::SdkNotFound {
                fallback: fallback
                    .as_ref()
                    .map_or_else(|| "the platform default location".to_string(), ToString::to_string),
            })?;

        if !sdk_root.is_dir() {
            return Err(ToolchainError::SdkNotFound {
                fallback: sdk_root.to_string(),
            });
        }

        let adb = resolve_tool(&sdk_root, &["platform-tools/adb"], "adb");
        let emulator = resolve_tool(&sdk_root, &["emulator/emulator"], "emulator");
        let avdmanager = resolve_tool(
            &sdk_root,
            &[
                "cmdline-tools/latest/bin/avdmanager",
                "cmdline-tools/bin/avdmanager",
                "tools/bin/avdmanager",
            ],
            "avdmanager",
        );
        let sdkmanager = resolve_tool(
            &sdk_root,
            &[
                "cmdline-tools/latest/bin/sdkmanager",
                "cmdline-tools/bin/sdkmanager",
                "tools/bin/sdkmanager",
            ],
            "sdkmanager",
        );
        let java_home = std::env::var("JAVA_HOME").ok().map(Utf8PathBuf::from);

        info!(
            sdk_root = %sdk_root,
            adb = %adb,
            emulator = %emulator,
            avdmanager = %avdmanager,
            sdkmanager = %sdkmanager,
            "toolchain resolved"
        );

        Ok(Self {
            sdk_root,
            adb,
            emulator,
            avdmanager,
            sdkmanager,
            java_home,
        })
    }

    /// Expected location of the APK inspection tool.
    #[must_use]
    pub fn apkanalyzer(&self) -> Utf8PathBuf {
        self.sdk_root.join("cmdline-tools/latest/bin/apkanalyzer")
    }
}

/// Platform default SDK install location under the user's home directory.
fn default_sdk_root() -> Option<Utf8PathBuf> {
    let home = dirs::home_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok())?;
    let root = if cfg!(target_os = "macos") {
        home.join("Library/Android/sdk")
    } else if cfg!(windows) {
        home.join("AppData/Local/Android/Sdk")
    } else {
        home.join("Android/Sdk")
    };
    Some(root)
}

/// Probe candidate locations under the SDK root, then PATH, then fall back.
fn resolve_tool(sdk_root: &Utf8PathBuf, candidates: &[&str], tool: &str) -> Utf8PathBuf {
    for rel in candidates {
        let abs = sdk_root.join(rel);
        if abs.exists() {
            return abs;
        }
    }
    if let Ok(found) = which::which(tool) {
        if let Ok(found) = Utf8PathBuf::from_path_buf(found) {
            return found;
        }
    }
    let fallback = sdk_root.join(candidates[0]);
    warn!(tool, path = %fallback, "tool not found, will use fallback");
    fallback
}

impl Toolchain {
    /// A toolchain pointing at nonexistent programs; validation-level tests
    /// never reach a spawn, and spawn-level tests want the failure.
    #[cfg(test)]
    pub(crate) fn unresolvable() -> Self {
        Self {
            sdk_root: Utf8PathBuf::from("/nonexistent/sdk"),
            adb: Utf8PathBuf::from("/nonexistent/sdk/platform-tools/adb"),
            emulator: Utf8PathBuf::from("/nonexistent/sdk/emulator/emulator"),
            avdmanager: Utf8PathBuf::from("/nonexistent/sdk/cmdline-tools/latest/bin/avdmanager"),
            sdkmanager: Utf8PathBuf::from("/nonexistent/sdk/cmdline-tools/latest/bin/sdkmanager"),
            java_home: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_tool_prefers_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("cmdline-tools/bin")).unwrap();
        std::fs::write(root.join("cmdline-tools/bin/avdmanager"), "").unwrap();

        let resolved = resolve_tool(
            &root,
            &[
                "cmdline-tools/latest/bin/avdmanager",
                "cmdline-tools/bin/avdmanager",
            ],
            "avdmanager-that-does-not-exist",
        );
        assert_eq!(resolved, root.join("cmdline-tools/bin/avdmanager"));
    }

    #[test]
    fn resolve_tool_falls_back_to_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let resolved = resolve_tool(
            &root,
            &["platform-tools/some-tool-that-does-not-exist"],
            "some-tool-that-does-not-exist",
        );
        assert_eq!(resolved, root.join("platform-tools/some-tool-that-does-not-exist"));
    }

    #[test]
    fn apkanalyzer_is_derived_from_sdk_root() {
        let tc = Toolchain::unresolvable();
        assert_eq!(
            tc.apkanalyzer(),
            Utf8PathBuf::from("/nonexistent/sdk/cmdline-tools/latest/bin/apkanalyzer")
        );
    }
}
