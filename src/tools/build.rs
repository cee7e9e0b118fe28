//! Gradle build operations.
//!
//! All of these drive the project-local wrapper script (`<projectDir>/gradlew`)
//! rather than a global Gradle install; a project without the wrapper is
//! rejected before anything spawns.

use crate::error::ToolError;
use crate::paths::Toolchain;
use crate::response::{
    OUTPUT_LIMITS, ShapeOptions, ToolResponse, error_response, exec_result_response, format_bytes,
    text_response, truncate_output,
};
use crate::runner::{self, CommandSpec, ExecOptions};
use crate::validate;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Long-running Gradle work (assemble, lint, arbitrary tasks).
const BUILD_TIMEOUT: Duration = Duration::from_secs(300);
/// Quick Gradle queries (clean, task listing, dependency tree).
const QUERY_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Debug,
    Release,
}

impl Variant {
    fn capitalized(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }
}

fn default_app_module() -> String {
    ":app".to_string()
}

/// Resolve the wrapper script, or `None` if the project lacks one.
fn gradle_wrapper(project_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let gradlew = project_dir.join("gradlew");
    gradlew.exists().then_some(gradlew)
}

fn missing_wrapper(project_dir: &Utf8Path) -> ToolResponse {
    error_response(format!(
        "No Gradle wrapper found at: {}\nEnsure this is an Android project root directory.",
        project_dir.join("gradlew")
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradleBuildArgs {
    pub project_dir: String,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub stacktrace: bool,
}

/// Compose the assemble task name for a variant, optionally module-scoped.
fn assemble_task(module: Option<&str>, variant: Variant) -> String {
    match module {
        Some(module) => format!("{module}:assemble{}", variant.capitalized()),
        None => format!("assemble{}", variant.capitalized()),
    }
}

pub async fn gradle_build(
    _tc: &Toolchain,
    args: GradleBuildArgs,
) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let Some(gradlew) = gradle_wrapper(&project_dir) else {
        return Ok(missing_wrapper(&project_dir));
    };

    let task = assemble_task(args.module.as_deref(), args.variant);
    let mut spec = CommandSpec::new(gradlew.as_str())
        .arg(&task)
        .cwd(project_dir.as_std_path());
    if args.stacktrace {
        spec = spec.arg("--stacktrace");
    }

    let result = runner::run(&spec, &ExecOptions::with_timeout(BUILD_TIMEOUT)).await;
    Ok(exec_result_response(
        &result,
        &ShapeOptions {
            success_prefix: "Build succeeded",
            failure_prefix: "Build failed",
            max_output_bytes: Some(OUTPUT_LIMITS.build_output),
            ..Default::default()
        },
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradleTaskArgs {
    pub project_dir: String,
    pub task: String,
    #[serde(default)]
    pub args: Option<Vec<String>>,
}

pub async fn gradle_task(_tc: &Toolchain, args: GradleTaskArgs) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let Some(gradlew) = gradle_wrapper(&project_dir) else {
        return Ok(missing_wrapper(&project_dir));
    };

    let spec = CommandSpec::new(gradlew.as_str())
        .arg(&args.task)
        .args(args.args.as_deref().unwrap_or_default())
        .cwd(project_dir.as_std_path());

    let result = runner::run(&spec, &ExecOptions::with_timeout(BUILD_TIMEOUT)).await;
    let success_prefix = format!("Task '{}' completed", args.task);
    let failure_prefix = format!("Task '{}' failed", args.task);
    Ok(exec_result_response(
        &result,
        &ShapeOptions {
            success_prefix: &success_prefix,
            failure_prefix: &failure_prefix,
            max_output_bytes: Some(OUTPUT_LIMITS.build_output),
            ..Default::default()
        },
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksArgs {
    pub project_dir: String,
    #[serde(default)]
    pub module: Option<String>,
}

pub async fn gradle_list_tasks(
    _tc: &Toolchain,
    args: ListTasksArgs,
) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let Some(gradlew) = gradle_wrapper(&project_dir) else {
        return Ok(missing_wrapper(&project_dir));
    };

    let task = match &args.module {
        Some(module) => format!("{module}:tasks"),
        None => "tasks".to_string(),
    };
    let spec = CommandSpec::new(gradlew.as_str())
        .args([task.as_str(), "--all"])
        .cwd(project_dir.as_std_path());

    let result = runner::run(&spec, &ExecOptions::with_timeout(QUERY_TIMEOUT)).await;
    if result.success {
        Ok(capped_text(&result.stdout))
    } else {
        Ok(error_response(format!(
            "Failed to list tasks.\n\nSTDERR:\n{}",
            result.stderr
        )))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanProjectArgs {
    pub project_dir: String,
}

pub async fn gradle_clean(
    _tc: &Toolchain,
    args: CleanProjectArgs,
) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let Some(gradlew) = gradle_wrapper(&project_dir) else {
        return Ok(missing_wrapper(&project_dir));
    };

    let spec = CommandSpec::new(gradlew.as_str())
        .arg("clean")
        .cwd(project_dir.as_std_path());

    let result = runner::run(&spec, &ExecOptions::with_timeout(QUERY_TIMEOUT)).await;
    Ok(exec_result_response(
        &result,
        &ShapeOptions {
            success_prefix: "Project cleaned successfully",
            failure_prefix: "Clean failed",
            ..Default::default()
        },
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesArgs {
    pub project_dir: String,
    #[serde(default = "default_app_module")]
    pub module: String,
    #[serde(default)]
    pub configuration: Option<String>,
}

pub async fn gradle_dependencies(
    _tc: &Toolchain,
    args: DependenciesArgs,
) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let Some(gradlew) = gradle_wrapper(&project_dir) else {
        return Ok(missing_wrapper(&project_dir));
    };

    let mut spec = CommandSpec::new(gradlew.as_str())
        .arg(format!("{}:dependencies", args.module))
        .cwd(project_dir.as_std_path());
    if let Some(configuration) = &args.configuration {
        spec = spec.args(["--configuration", configuration]);
    }

    let result = runner::run(&spec, &ExecOptions::with_timeout(QUERY_TIMEOUT)).await;
    if result.success {
        Ok(capped_text(&result.stdout))
    } else {
        Ok(error_response(format!(
            "Failed to get dependencies.\n\nSTDERR:\n{}",
            result.stderr
        )))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintRunArgs {
    pub project_dir: String,
    #[serde(default = "default_app_module")]
    pub module: String,
    #[serde(default)]
    pub fatal: bool,
}

pub async fn lint_run(_tc: &Toolchain, args: LintRunArgs) -> Result<ToolResponse, ToolError> {
    let project_dir = validate::validate_absolute_path(&args.project_dir, "Project directory")?;
    let Some(gradlew) = gradle_wrapper(&project_dir) else {
        return Ok(missing_wrapper(&project_dir));
    };

    let task = format!("{}:lint", args.module);
    let spec = CommandSpec::new(gradlew.as_str())
        .arg(&task)
        .cwd(project_dir.as_std_path());
    let result = runner::run(&spec, &ExecOptions::with_timeout(BUILD_TIMEOUT)).await;

    // Lint writes its text report under the module's build directory.
    let module_dir = args.module.replace(':', "");
    let report_paths = [
        project_dir.join(&module_dir).join("build/reports/lint-results.txt"),
        project_dir
            .join(&module_dir)
            .join("build/reports/lint-results-debug.txt"),
    ];
    let report = report_paths
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok());

    let headline = if result.success {
        "Lint completed.".to_string()
    } else {
        let code = result
            .exit_code
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        format!("Lint finished with issues (exit code: {code}).")
    };

    let mut output = vec![headline, String::new(), result.stdout.clone()];
    if let Some(report) = report {
        output.push("\n--- Lint Report ---\n".to_string());
        output.push(report);
    }
    if !result.stderr.is_empty() && !result.success {
        output.push("\nSTDERR:\n".to_string());
        output.push(result.stderr.clone());
    }

    let has_fatal_issues =
        !result.success && (result.stdout.contains("Error:") || result.stderr.contains("Error:"));

    let text = output.join("\n");
    if args.fatal && has_fatal_issues {
        Ok(error_response(text))
    } else {
        Ok(text_response(text))
    }
}

/// Success text capped at the general presentation limit.
fn capped_text(stdout: &str) -> ToolResponse {
    let (output, truncated) = truncate_output(stdout, OUTPUT_LIMITS.general);
    let mut text = output.to_string();
    if truncated {
        text.push_str(&format!(
            "\n\n[Output truncated at {}]",
            format_bytes(OUTPUT_LIMITS.general)
        ));
    }
    text_response(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_task_names() {
        assert_eq!(assemble_task(None, Variant::Debug), "assembleDebug");
        assert_eq!(assemble_task(None, Variant::Release), "assembleRelease");
        assert_eq!(assemble_task(Some(":app"), Variant::Debug), ":app:assembleDebug");
    }

    #[tokio::test]
    async fn build_rejects_relative_project_dir() {
        let tc = Toolchain::unresolvable();
        let err = gradle_build(
            &tc,
            GradleBuildArgs {
                project_dir: "relative/path".to_string(),
                variant: Variant::Debug,
                module: None,
                stacktrace: false,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("absolute path"));
    }

    #[tokio::test]
    async fn build_reports_missing_wrapper_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let tc = Toolchain::unresolvable();
        let resp = gradle_build(
            &tc,
            GradleBuildArgs {
                project_dir: dir.path().to_str().unwrap().to_string(),
                variant: Variant::Debug,
                module: None,
                stacktrace: false,
            },
        )
        .await
        .unwrap();
        assert!(resp.is_error);
        assert!(resp.first_text().unwrap().contains("No Gradle wrapper found"));
    }
}
