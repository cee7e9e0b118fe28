//! Response envelope shaping.
//!
//! Every operation, success or failure, text or image, returns exactly one
//! [`ToolResponse`]: a non-empty sequence of content items plus an error
//! flag. Content is a closed two-variant union so the contract stays exact
//! and exhaustively matchable.

use crate::runner::ExecResult;
use serde::{Deserialize, Serialize};

/// One content item in a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        /// Base64-encoded payload.
        data: String,
        #[serde(rename = "mediaType")]
        media_type: String,
    },
}

/// The uniform response envelope every operation returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<Content>,
    #[serde(
        default,
        rename = "isError",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_error: bool,
}

impl ToolResponse {
    /// First text item, if any. Convenience for tests and callers.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|item| match item {
            Content::Text { text } => Some(text.as_str()),
            Content::Image { .. } => None,
        })
    }
}

/// Named output caps applied when shaping responses for presentation.
///
/// These bound what is echoed back to the caller; they are independent of the
/// runner's capture cap, which bounds memory.
#[derive(Debug, Clone, Copy)]
pub struct OutputLimits {
    pub shell_output: usize,
    pub ui_dump: usize,
    pub build_output: usize,
    pub general: usize,
}

/// The shared, read-only output limit table.
pub const OUTPUT_LIMITS: OutputLimits = OutputLimits {
    shell_output: 10 * 1024,
    ui_dump: 50 * 1024,
    build_output: 100 * 1024,
    general: 50 * 1024,
};

/// A single-text success envelope.
#[must_use]
pub fn text_response(text: impl Into<String>) -> ToolResponse {
    ToolResponse {
        content: vec![Content::Text { text: text.into() }],
        is_error: false,
    }
}

/// A single-text error envelope.
#[must_use]
pub fn error_response(text: impl Into<String>) -> ToolResponse {
    ToolResponse {
        content: vec![Content::Text { text: text.into() }],
        is_error: true,
    }
}

/// An image envelope with an optional trailing caption.
#[must_use]
pub fn image_response(
    base64_data: impl Into<String>,
    media_type: impl Into<String>,
    caption: Option<String>,
) -> ToolResponse {
    let mut content = vec![Content::Image {
        data: base64_data.into(),
        media_type: media_type.into(),
    }];
    if let Some(text) = caption {
        content.push(Content::Text { text });
    }
    ToolResponse {
        content,
        is_error: false,
    }
}

/// Truncate `text` to at most `max_bytes`, reporting whether anything was cut.
///
/// Pure and idempotent: re-truncating the output at the same cap is a no-op.
/// The cut is floored to a char boundary; no attempt is made to preserve word
/// or line boundaries.
#[must_use]
pub fn truncate_output(text: &str, max_bytes: usize) -> (&str, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

/// Render a byte count for humans: `512B`, `2KB`, `1.5MB`.
#[must_use]
pub fn format_bytes(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1}MB", bytes as f64 / 1024.0 / 1024.0)
    } else if bytes >= 1024 {
        format!("{:.0}KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes}B")
    }
}

/// Shaping options for [`exec_result_response`].
#[derive(Debug, Clone)]
pub struct ShapeOptions<'a> {
    pub success_prefix: &'a str,
    pub failure_prefix: &'a str,
    pub include_stderr_on_success: bool,
    /// Presentation cap for stdout on success; `None` means no truncation.
    pub max_output_bytes: Option<usize>,
}

impl Default for ShapeOptions<'_> {
    fn default() -> Self {
        Self {
            success_prefix: "Command completed",
            failure_prefix: "Command failed",
            include_stderr_on_success: false,
            max_output_bytes: None,
        }
    }
}

/// Shape an execution outcome into the uniform envelope.
///
/// Success: label + stdout (optionally truncated with a size note) + stderr
/// block when requested. Failure: label + exit-code annotation (when known) +
/// `[TIMED OUT]` annotation (when applicable) + STDOUT/STDERR blocks when
/// non-empty, with the error flag set.
#[must_use]
pub fn exec_result_response(result: &ExecResult, opts: &ShapeOptions<'_>) -> ToolResponse {
    if result.success {
        let (output, truncated) = match opts.max_output_bytes {
            Some(cap) => truncate_output(&result.stdout, cap),
            None => (result.stdout.as_str(), false),
        };
        let mut text = format!("{}.", opts.success_prefix);
        if !output.is_empty() {
            text.push_str("\n\n");
            text.push_str(output);
        }
        if truncated {
            // max_output_bytes is present whenever truncation happened.
            let cap = opts.max_output_bytes.unwrap_or_default();
            text.push_str(&format!("\n\n[Output truncated at {}]", format_bytes(cap)));
        }
        if opts.include_stderr_on_success && !result.stderr.is_empty() {
            text.push_str(&format!("\n\nSTDERR:\n{}", result.stderr));
        }
        return text_response(text);
    }

    let exit_label = match result.exit_code {
        Some(code) => format!(" (exit code: {code})"),
        None => String::new(),
    };
    let timed_out_label = if result.timed_out { " [TIMED OUT]" } else { "" };
    let mut text = format!("{}{}{}.", opts.failure_prefix, exit_label, timed_out_label);
    if !result.stdout.is_empty() {
        text.push_str(&format!("\n\nSTDOUT:\n{}", result.stdout));
    }
    if !result.stderr.is_empty() {
        text.push_str(&format!("\n\nSTDERR:\n{}", result.stderr));
    }
    error_response(text)
}
