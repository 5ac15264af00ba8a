//! Formatted output helpers for CLI commands.
//!
//! Provides human-readable state labels, timestamps, and byte counts.

use chrono::DateTime;
use conman_runtime::api::CriState;

/// Lower-case label for a container state.
#[must_use]
pub const fn state_label(state: CriState) -> &'static str {
    match state {
        CriState::Created => "created",
        CriState::Running => "running",
        CriState::Exited => "exited",
        CriState::Unknown => "unknown",
    }
}

/// Formats unix seconds as a UTC timestamp, or `-` when unknown.
#[must_use]
pub fn format_created(secs: i64) -> String {
    if secs <= 0 {
        return "-".to_string();
    }
    DateTime::from_timestamp(secs, 0)
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Formats a byte count into a human-readable string (e.g., "128 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
