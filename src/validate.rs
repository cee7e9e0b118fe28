//! Input validation for untrusted caller-supplied strings.
//!
//! Every string that ends up in an argument vector passes through one of
//! these validators first. On success the sanitized value is returned so the
//! caller can use it directly as an argv element; on failure a
//! [`ValidationError`] carries the complete caller-safe message.
//!
//! All validators are deny-by-default except [`validate_shell_command`],
//! which is the documented trust boundary for the device shell tool.

use crate::error::ValidationError;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::sync::LazyLock;

static PACKAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*(\.[a-zA-Z][a-zA-Z0-9_]*)+$").unwrap()
});

static SAFE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").unwrap());

static SDK_PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.;-]+$").unwrap());

/// Maximum accepted length for a device shell command.
pub const SHELL_COMMAND_MAX_LENGTH: usize = 4096;

/// Validate that `path` is a non-empty, NUL-free absolute path.
///
/// Returns the lexically normalized path (`.` removed, `..` resolved against
/// the path itself, never against the filesystem). Existence is deliberately
/// not checked here; that is a handler-level concern.
pub fn validate_absolute_path(path: &str, label: &str) -> Result<Utf8PathBuf, ValidationError> {
    if path.is_empty() {
        return Err(ValidationError::EmptyPath {
            label: label.to_string(),
        });
    }
    if path.contains('\0') {
        return Err(ValidationError::PathNulByte {
            label: label.to_string(),
        });
    }
    let path = Utf8Path::new(path);
    if !path.is_absolute() {
        return Err(ValidationError::RelativePath {
            label: label.to_string(),
            path: path.to_string(),
        });
    }
    Ok(normalize_lexically(path))
}

/// Validate an Android application package name (`com.example.myapp`).
pub fn validate_package_name(name: &str) -> Result<String, ValidationError> {
    if !PACKAGE_NAME_RE.is_match(name) {
        return Err(ValidationError::PackageNameFormat {
            name: name.to_string(),
        });
    }
    if name.len() > 255 {
        return Err(ValidationError::PackageNameTooLong { length: name.len() });
    }
    Ok(name.to_string())
}

/// Validate a short identifier (AVD name, device profile, class name).
pub fn validate_safe_name(name: &str, label: &str) -> Result<String, ValidationError> {
    if name.is_empty() || name.len() > 128 {
        return Err(ValidationError::NameLength {
            label: label.to_string(),
        });
    }
    if !SAFE_NAME_RE.is_match(name) {
        return Err(ValidationError::NameChars {
            label: label.to_string(),
            name: name.to_string(),
        });
    }
    Ok(name.to_string())
}

/// Validate an SDK package spec (`system-images;android-35;google_apis;arm64-v8a`).
///
/// The semicolon-delimited component grammar is distinct from application
/// package names.
pub fn validate_sdk_package(spec: &str) -> Result<String, ValidationError> {
    if spec.is_empty() || !SDK_PACKAGE_RE.is_match(spec) {
        return Err(ValidationError::SdkPackage {
            spec: spec.to_string(),
        });
    }
    Ok(spec.to_string())
}

/// Validate a device shell command.
///
/// This validator intentionally does NOT reject shell metacharacters: the
/// device shell tool exists to run an arbitrary command on the target device,
/// so only length and NUL-byte checks apply. The command is still passed to
/// adb as a single discrete argv element, never through a host shell.
pub fn validate_shell_command(command: &str) -> Result<String, ValidationError> {
    if command.is_empty() || command.len() > SHELL_COMMAND_MAX_LENGTH {
        return Err(ValidationError::ShellCommandLength);
    }
    if command.contains('\0') {
        return Err(ValidationError::ShellCommandNul);
    }
    Ok(command.to_string())
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Prefix(_) | Utf8Component::RootDir | Utf8Component::Normal(_) => {
                out.push(component.as_str());
            }
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                // Popping past the root is a no-op; "/.." normalizes to "/".
                out.pop();
            }
        }
    }
    out
}
