//! droidpilot - Android development tool server
//!
//! droidpilot exposes a fixed catalog of Android development operations
//! (Gradle builds, device control, debugging, scaffolding, APK inspection,
//! intents, SDK management) to an automated caller over stdio. Each operation
//! is implemented by invoking an external command-line tool (adb, sdkmanager,
//! avdmanager, the emulator launcher, a project's Gradle wrapper, apkanalyzer)
//! and reshaping its output into one uniform response envelope.
//!
//! # Architecture
//!
//! The execution core underneath every operation:
//!
//! - [`validate`] - deny-by-default validation of untrusted strings before
//!   they become argument-vector elements
//! - [`runner`] - argv-style process execution under hard timeouts with
//!   per-stream output caps; every outcome is a value, never a raised fault
//! - [`response`] - the `{content, isError}` envelope and output shaping
//! - [`server`] - the catalog, the dispatch error boundary, and the stdio loop
//!
//! # Security Model
//!
//! All process execution goes through [`runner::CommandSpec`] to ensure
//! argv-style invocation. Arguments cross trust boundaries as discrete
//! elements; no host shell ever evaluates caller data. The single deliberate
//! exception to deny-by-default input validation is the device shell tool,
//! whose purpose is running an operator-supplied command on the target
//! device.

pub mod buffer;
pub mod cli;
pub mod error;
pub mod logging;
pub mod paths;
pub mod response;
pub mod runner;
pub mod server;
pub mod tools;
pub mod validate;

pub use error::{ToolError, ToolchainError, ValidationError};
pub use paths::Toolchain;
pub use response::{Content, ToolResponse};
pub use runner::{CommandSpec, ExecOptions, ExecResult};
