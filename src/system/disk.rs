//! Free space checks ahead of package transactions, via `df`.

use super::command::{CommandRunner, CommandSpec, QUICK_TIMEOUT};
use crate::error::AppError;

/// Space the kernel transaction needs on `/` and `/boot`.
pub const KERNEL_REQUIRED_GB: f64 = 1.0;
pub const MESA_REQUIRED_GB: f64 = 0.5;

/// Parse `df -BG --output=avail` output (header line, then e.g. `42G`).
pub fn parse_df_gigabytes(stdout: &str) -> Option<f64> {
    let value = stdout.lines().nth(1)?.trim();
    if let Some(gb) = value.strip_suffix('G') {
        gb.trim().parse().ok()
    } else if let Some(mb) = value.strip_suffix('M') {
        mb.trim().parse::<f64>().ok().map(|mb| mb / 1024.0)
    } else {
        value.parse().ok()
    }
}

/// Parse `df --output=avail` output, given in KiB, into GiB.
pub fn parse_df_kilobytes(stdout: &str) -> Option<f64> {
    let kb: f64 = stdout.lines().nth(1)?.trim().parse().ok()?;
    Some(kb / (1024.0 * 1024.0))
}

/// Available space in GB on the filesystem holding `path`.
pub async fn available_gb(runner: &dyn CommandRunner, path: &str) -> Result<f64, AppError> {
    let spec = CommandSpec::new("df")
        .args(["-BG", "--output=avail", path])
        .timeout(QUICK_TIMEOUT)
        .c_locale();
    if let Ok(output) = runner.run(spec).await {
        if output.success() {
            if let Some(gb) = parse_df_gigabytes(&output.stdout) {
                return Ok(gb);
            }
        }
    }

    let spec = CommandSpec::new("df")
        .args(["--output=avail", path])
        .timeout(QUICK_TIMEOUT)
        .c_locale();
    let output = runner.run(spec).await?;
    if !output.success() {
        return Err(AppError::OsCommand {
            cmd: format!("df {}", path),
            reason: output.stderr_tail(1),
        });
    }
    parse_df_kilobytes(&output.stdout)
        .ok_or_else(|| AppError::Parse(format!("Unexpected df output for {}", path)))
}

/// Fail on the first path with less than `required_gb` available.
pub async fn check_disk_space(
    runner: &dyn CommandRunner,
    paths: &[&str],
    required_gb: f64,
) -> Result<(), AppError> {
    for path in paths {
        let available = available_gb(runner, path).await?;
        log::debug!("[Disk] {} has {:.1}GB available", path, available);
        if available < required_gb {
            return Err(AppError::InsufficientDiskSpace {
                path: path.to_string(),
                available_gb: available,
                required_gb,
            });
        }
    }
    Ok(())
}
