use std::time::Duration;

use tailor::units::hours_to_duration;

pub fn human_size(size: u64) -> String {
    if size < 2048 {
        format!("{size} B")
    } else if size < 2 * 1024 * 1024 {
        format!("{:.2} KiB", size as f64 / 1024.0)
    } else if size < 2 * 1024 * 1024 * 1024 {
        format!("{:.2} MiB", size as f64 / (1024 * 1024) as f64)
    } else {
        format!("{:.2} GiB", size as f64 / (1024 * 1024 * 1024) as f64)
    }
}

/// Formats fractional hours, truncated to whole seconds.
pub fn human_hours(hours: f64) -> String {
    let duration = Duration::from_secs(hours_to_duration(hours).as_secs());
    if duration.is_zero() {
        "0s".to_string()
    } else {
        humantime::format_duration(duration).to_string()
    }
}

pub fn human_gb(gb: f64) -> String {
    if gb.fract() == 0.0 {
        format!("{gb:.0} GiB")
    } else {
        format!("{gb:.2} GiB")
    }
}

pub fn human_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(ratio) => format!("{:.1} %", ratio * 100.0),
        None => "N/A".to_string(),
    }
}
