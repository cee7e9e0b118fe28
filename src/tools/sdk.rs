//! SDK package management via sdkmanager.

use crate::error::ToolError;
use crate::paths::Toolchain;
use crate::response::{ToolResponse, error_response, text_response};
use crate::runner::{self, CommandSpec, ExecOptions};
use crate::validate;
use serde::Deserialize;
use std::time::Duration;

fn default_installed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkListArgs {
    #[serde(default = "default_installed")]
    pub installed: bool,
}

pub async fn sdk_list(tc: &Toolchain, args: SdkListArgs) -> Result<ToolResponse, ToolError> {
    let flag = if args.installed {
        "--list_installed"
    } else {
        "--list"
    };
    let spec = CommandSpec::new(tc.sdkmanager.as_str()).arg(flag);
    let result = runner::run(&spec, &ExecOptions::with_timeout(Duration::from_secs(30))).await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to list SDK packages.\n\n{}",
            result.stderr
        )));
    }
    let heading = if args.installed {
        "Installed SDK packages"
    } else {
        "Available SDK packages"
    };
    Ok(text_response(format!("{heading}:\n\n{}", result.stdout)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkInstallArgs {
    pub packages: Vec<String>,
}

pub async fn sdk_install(tc: &Toolchain, args: SdkInstallArgs) -> Result<ToolResponse, ToolError> {
    let packages = args
        .packages
        .iter()
        .map(|p| validate::validate_sdk_package(p))
        .collect::<Result<Vec<_>, _>>()?;

    let spec = CommandSpec::new(tc.sdkmanager.as_str()).args(&packages);

    // sdkmanager prompts per license; feed enough confirmations for all of
    // them and close stdin.
    let result = runner::run_with_stdin(
        &spec,
        &"y\n".repeat(100),
        &ExecOptions::with_timeout(Duration::from_secs(300)),
    )
    .await;

    if !result.success {
        return Ok(error_response(format!(
            "Failed to install SDK package(s).\n\nSTDOUT:\n{}\n\nSTDERR:\n{}",
            result.stdout, result.stderr
        )));
    }
    Ok(text_response(format!(
        "SDK package(s) installed: {}\n\n{}",
        packages.join(", "),
        result.stdout
    )))
}
