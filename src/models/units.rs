// Truncation and byte/MB conversion shared by the probe, the fold and the reader.

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Relative slack, in ULPs, for the representation error of scaling by 100.
const FLOOR_SLACK_ULPS: f64 = 4.0;

/// Floors `value` to two decimals. Non-finite input reads as 0.
///
/// Exact two-decimal inputs (0.29 scales to 28.999999999999996) survive the floor; values
/// genuinely below the next hundredth do not round up.
pub fn truncate_2dp(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scaled = value * 100.0;
    (scaled + scaled.abs() * FLOOR_SLACK_ULPS * f64::EPSILON).floor() / 100.0
}

/// Bytes to megabytes (MiB), floored to two decimals.
pub fn bytes_to_mb(bytes: f64) -> f64 {
    truncate_2dp(bytes / BYTES_PER_MB)
}

/// Percentage of `part` in `whole`, floored to two decimals; 0 when `whole` is 0.
pub fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    truncate_2dp(part as f64 / whole as f64 * 100.0)
}
