//! Operation handlers.
//!
//! Each handler validates its inputs, composes an argument vector, invokes a
//! runner, and shapes the outcome into a response envelope. Handlers never
//! overlap their invocations: within one call every external process runs to
//! completion (or forced termination) before the next begins.

pub mod analyze;
pub mod build;
pub mod debug;
pub mod device;
pub mod intent;
pub mod scaffold;
pub mod sdk;

use crate::paths::Toolchain;
use crate::runner::CommandSpec;

/// Base adb invocation, targeting a specific device when a serial is given.
pub(crate) fn adb_command(tc: &Toolchain, device_id: Option<&str>) -> CommandSpec {
    let mut spec = CommandSpec::new(tc.adb.as_str());
    if let Some(id) = device_id {
        spec = spec.args(["-s", id]);
    }
    spec
}
