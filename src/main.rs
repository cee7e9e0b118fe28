//! droidpilot binary entrypoint.
//!
//! All logic lives in the library; main only maps the CLI result to a
//! process exit code.

fn main() -> std::process::ExitCode {
    droidpilot::cli::run()
}
