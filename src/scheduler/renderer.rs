use std::path::Path;

use tokio::process::{Child, Command};

use crate::types::{OrderId, Params};

/// Exit code that maps to `RENDER_FAILED`, passed to the renderer so it can
/// self-report the same failure code the scheduler will interpret.
pub const RENDER_FAILED_CODE: u16 = 500;

/// Builds the renderer's argv: a fixed sequence of short flags, each a
/// single argv entry with the value concatenated directly onto the flag
/// letter (`-x30.0`, not `-x 30.0`).
pub fn build_args(
    base_url: &str,
    order_id: OrderId,
    params: &Params,
    shared_memory_id: &str,
) -> Vec<String> {
    vec![
        format!("-u{base_url}"),
        format!("-o{order_id}"),
        format!("-x{}", params.get("lon").unwrap_or("")),
        format!("-y{}", params.get("lat").unwrap_or("")),
        format!("-s{}", params.get("scale").unwrap_or("")),
        format!("-w{}", params.get("w").unwrap_or("")),
        format!("-h{}", params.get("h").unwrap_or("")),
        format!("-f{}", params.get("format").unwrap_or("")),
        format!("-e{RENDER_FAILED_CODE}"),
        format!("-d{shared_memory_id}"),
    ]
}

/// Spawns the renderer child process for `order_id`. Spawn failure (e.g. the
/// renderer binary is missing because `GIS_ROOT` was misconfigured) is
/// reported to the caller rather than aborting the scheduler, and treated
/// as an ordinary render failure for that one order.
pub fn spawn(renderer_path: &Path, args: &[String]) -> std::io::Result<Child> {
    Command::new(renderer_path)
        .args(args)
        .kill_on_drop(true)
        .spawn()
}
