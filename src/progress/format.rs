//! ETA and size formatting

use std::time::Duration;

/// Estimate remaining time from throughput so far
///
/// Returns `unknown` until both elapsed time and processed bytes are non-zero.
pub fn estimate_eta(elapsed: Duration, processed: u64, total: u64) -> String {
    let elapsed_ms = elapsed.as_millis();
    if processed == 0 || elapsed_ms == 0 {
        return "unknown".to_string();
    }

    let remaining = total.saturating_sub(processed) as u128;
    let eta_ms = remaining * elapsed_ms / processed as u128;

    if eta_ms < 1_000 {
        "< 1s".to_string()
    } else if eta_ms < 60_000 {
        format!("{}s", eta_ms / 1_000)
    } else {
        format!("{}m {}s", eta_ms / 60_000, (eta_ms % 60_000) / 1_000)
    }
}

/// Percentage of `total`, capped below 100 until completion
pub fn percent_of(processed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = processed as f64 / total as f64 * 100.0;
    percent.clamp(0.0, PROGRESS_CEILING)
}

/// Highest percent a non-terminal event may report
pub const PROGRESS_CEILING: f64 = 99.9;

/// Human-readable byte count (`1.5 MB`)
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let value = bytes as f64;
    if value < KB {
        format!("{} B", bytes)
    } else if value < MB {
        format!("{:.1} KB", value / KB)
    } else if value < GB {
        format!("{:.1} MB", value / MB)
    } else {
        format!("{:.2} GB", value / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_unknown_without_throughput() {
        assert_eq!(estimate_eta(Duration::ZERO, 10, 100), "unknown");
        assert_eq!(estimate_eta(Duration::from_secs(3), 0, 100), "unknown");
    }

    #[test]
    fn test_eta_formats() {
        // 10 bytes per second
        assert_eq!(estimate_eta(Duration::from_secs(1), 10, 15), "< 1s");
        assert_eq!(estimate_eta(Duration::from_secs(1), 10, 100), "9s");
        assert_eq!(estimate_eta(Duration::from_secs(1), 10, 1_260), "2m 5s");
        assert_eq!(estimate_eta(Duration::from_secs(1), 100, 100), "< 1s");
    }

    #[test]
    fn test_percent_is_capped() {
        assert_eq!(percent_of(0, 0), 0.0);
        assert_eq!(percent_of(50, 200), 25.0);
        assert_eq!(percent_of(200, 200), PROGRESS_CEILING);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024 / 2), "1.50 GB");
    }
}
