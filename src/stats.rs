use crate::models::{EventRecord, Timestamp, WindowStats};
use chrono::Duration;

/// Rolling windows shown on every tile, labelled the way the page prints them.
pub const STAT_WINDOWS: [(&str, i64); 2] = [("24h", 24 * 60 * 60), ("7d", 7 * 24 * 60 * 60)];

pub fn windowed_stats(history: &[EventRecord], now: Timestamp, window_secs: i64) -> WindowStats {
    let mut timestamps: Vec<Timestamp> = history
        .iter()
        .map(|record| record.created_at)
        .filter(|created_at| now.saturating_sub(*created_at) < window_secs)
        .collect();
    timestamps.sort_unstable();

    WindowStats {
        count: timestamps.len(),
        median_interval: median_interval(&timestamps),
    }
}

/// Lower median of the gaps between neighbouring timestamps (`sorted[n / 2]`).
fn median_interval(sorted_timestamps: &[Timestamp]) -> Option<i64> {
    if sorted_timestamps.len() < 2 {
        return None;
    }
    let mut gaps: Vec<i64> = sorted_timestamps
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0]))
        .collect();
    gaps.sort_unstable();
    gaps.get(gaps.len() / 2).copied()
}

pub fn status_text(last_seen: Option<Timestamp>, now: Timestamp) -> String {
    let Some(last_seen) = last_seen else {
        return "never".to_string();
    };
    let secs = now.saturating_sub(last_seen);
    if secs < 60 {
        return "just now".to_string();
    }
    let elapsed = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
    format!("{} ago", compact_duration(elapsed))
}

/// Largest whole unit, e.g. `3d`, `1h`, `12m`.
pub fn compact_duration(elapsed: Duration) -> String {
    if elapsed.num_days() > 0 {
        format!("{}d", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h", elapsed.num_hours())
    } else {
        format!("{}m", elapsed.num_minutes())
    }
}
