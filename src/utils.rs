//! # Utility Functions and Helper Module
//!
//! Small helpers shared by the driver, the local substrate and the report
//! writer.
//!
//! ## Key Functionality Categories
//!
//! - **Formatting**: Human-readable durations for log lines and the fixed
//!   nanosecond-precision seconds used in result lines
//! - **System Information**: CPU detection and optional core pinning
//! - **Header Helpers**: Grouping ranks by the host they run on
//!
//! ## Usage Examples
//!
//! ```rust
//! use ring_latency::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(format_seconds(0.000_001_5), "0.000001500");
//! ```

use std::time::Duration;
use tracing::debug;

/// Format a duration in a human-readable way
///
/// Converts a Duration to a human-readable string, automatically selecting
/// the most appropriate unit based on the magnitude.
///
/// ## Examples
///
/// ```rust
/// # use ring_latency::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_nanos(1250)), "1.25μs");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a value in seconds with nanosecond precision
///
/// Every timing column in the result lines uses this format so the output
/// stays aligned and diffable across runs.
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.9}", seconds)
}

/// Get the number of CPU cores available to this process
///
/// Used as the default rank count of the local substrate and reported in the
/// system information block of the JSON report.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Pin the calling thread to `core`
///
/// Returns `false` when the platform does not expose core ids or the core
/// does not exist; the thread then keeps running unpinned.
pub fn pin_current_thread(core: usize) -> bool {
    let Some(core_ids) = core_affinity::get_core_ids() else {
        debug!("Core affinity not supported on this platform");
        return false;
    };

    match core_ids.into_iter().find(|id| id.id == core) {
        Some(id) => {
            let pinned = core_affinity::set_for_current(id);
            debug!("Pinned thread to core {}: {}", core, pinned);
            pinned
        }
        None => {
            debug!("Core {} not available for pinning", core);
            false
        }
    }
}

/// Group rank indices by processor name
///
/// Hosts are listed in order of their first rank, and the ranks of each host
/// are ascending. This is the layout of the host lines in the run header.
///
/// ## Examples
///
/// ```rust
/// # use ring_latency::utils::group_ranks_by_host;
/// let names = vec!["a".to_string(), "b".to_string(), "a".to_string()];
/// let groups = group_ranks_by_host(&names);
/// assert_eq!(groups, vec![("a".to_string(), vec![0, 2]), ("b".to_string(), vec![1])]);
/// ```
pub fn group_ranks_by_host(names: &[String]) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (rank, name) in names.iter().enumerate() {
        match groups.iter_mut().find(|(host, _)| host == name) {
            Some((_, ranks)) => ranks.push(rank),
            None => groups.push((name.clone(), vec![rank])),
        }
    }
    groups
}
