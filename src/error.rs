//! Error types shared across the tool server.
//!
//! Two fault families cross module boundaries:
//!
//! - [`ValidationError`]: malformed caller input, rejected before any
//!   process spawns. The `Display` text of every variant is the complete,
//!   caller-safe explanation and is reported verbatim.
//! - [`ToolError`]: the error side of a tool handler. The dispatch boundary
//!   shapes it into an error envelope; nothing else is allowed to escape.
//!
//! Execution outcomes (nonzero exit, spawn failure, timeout) are NOT errors:
//! the runner encodes them in [`crate::runner::ExecResult`] and never fails.

use thiserror::Error;

/// Input validation faults.
///
/// Raised by the validators in [`crate::validate`] before an argument reaches
/// an argument vector. Messages carry no internal cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{label} must be a non-empty string.")]
    EmptyPath { label: String },

    #[error("{label} must be an absolute path. Got: {path}")]
    RelativePath { label: String, path: String },

    #[error("{label} contains invalid characters.")]
    PathNulByte { label: String },

    #[error(
        "Invalid Android package name: \"{name}\". Expected format: com.example.myapp \
         (2+ dot-separated segments, each starting with a letter, containing \
         letters/digits/underscores)."
    )]
    PackageNameFormat { name: String },

    #[error("Package name is too long ({length} chars, max 255).")]
    PackageNameTooLong { length: usize },

    #[error("{label} must be 1-128 characters.")]
    NameLength { label: String },

    #[error(
        "{label} contains invalid characters: \"{name}\". Only letters, digits, \
         underscores, and hyphens are allowed."
    )]
    NameChars { label: String, name: String },

    #[error(
        "Invalid SDK package name: \"{spec}\". Only alphanumeric, dots, underscores, \
         hyphens, and semicolons are allowed."
    )]
    SdkPackage { spec: String },

    #[error("Shell command must be 1-4096 characters.")]
    ShellCommandLength,

    #[error("Shell command contains invalid null bytes.")]
    ShellCommandNul,
}

/// Failure side of a tool handler.
///
/// `Invalid` and `Args` are input faults whose message is safe to report
/// verbatim. `Internal` is anything unexpected; the boundary logs it and
/// reports only a generic prefix plus the fault's own message, never a trace.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Args(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.into())
    }
}

/// Startup toolchain resolution faults.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error(
        "Android SDK not found. Checked ANDROID_HOME, ANDROID_SDK_ROOT, and {fallback}. \
         Set ANDROID_HOME to your SDK installation path."
    )]
    SdkNotFound { fallback: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_complete_sentences() {
        let err = ValidationError::RelativePath {
            label: "Project directory".to_string(),
            path: "relative/path".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Project directory must be an absolute path. Got: relative/path"
        );
    }

    #[test]
    fn tool_error_passes_validation_text_through() {
        let err = ToolError::from(ValidationError::ShellCommandNul);
        assert_eq!(err.to_string(), "Shell command contains invalid null bytes.");
    }
}
