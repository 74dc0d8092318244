use std::time::Duration;

/// Sizes are expressed in binary gigabytes everywhere in the engine.
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

#[inline]
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB as f64
}

/// Converts a (possibly fractional) number of GB to bytes, saturating on overflow.
/// Negative or NaN inputs produce zero.
pub fn gb_to_bytes(gb: f64) -> u64 {
    let bytes = (sanitize(gb) * BYTES_PER_GB as f64).round();
    if bytes >= u64::MAX as f64 {
        u64::MAX
    } else {
        bytes as u64
    }
}

/// Treats negative, NaN and infinite values as zero.
#[inline]
pub(crate) fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Clamps `value` into `[floor, ceiling]`. A NaN value ends at the floor.
#[inline]
pub(crate) fn clamp_value(value: f64, floor: f64, ceiling: f64) -> f64 {
    if value.is_nan() {
        floor.min(ceiling)
    } else {
        value.max(floor).min(ceiling)
    }
}

/// Rounds hours up to whole minutes.
#[inline]
pub(crate) fn ceil_to_minutes(hours: f64) -> f64 {
    (hours * 60.0).ceil() / 60.0
}

pub fn hours_to_duration(hours: f64) -> Duration {
    Duration::try_from_secs_f64(sanitize(hours) * 3600.0).unwrap_or(Duration::MAX)
}

/// Format hours as a scheduler time string, e.g. 01:05:02
pub fn format_walltime(hours: f64) -> String {
    let mut seconds = hours_to_duration(hours).as_secs_f64().round() as u64;
    let hours = seconds / 3600;
    seconds %= 3600;
    let minutes = seconds / 60;
    seconds %= 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
