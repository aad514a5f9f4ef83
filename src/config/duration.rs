// src/config/duration.rs

use std::time::Duration;

/// Parse a duration such as `"250ms"`, `"1.5s"`, `"2m"` or `"1h"`.
///
/// A bare number is rejected; the unit is mandatory.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| format!("duration '{s}' is missing a unit (ms, s, m or h)"))?;
    let (number, unit) = s.split_at(split);

    let millis_per_unit: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => {
            return Err(format!(
                "unsupported duration unit '{other}'; expected ms, s, m or h"
            ));
        }
    };

    if let Ok(whole) = number.parse::<u64>() {
        return Ok(Duration::from_millis(whole.saturating_mul(millis_per_unit)));
    }

    let value: f64 = number
        .parse()
        .map_err(|e| format!("invalid duration number '{number}': {e}"))?;
    Duration::try_from_secs_f64(value * millis_per_unit as f64 / 1_000.0)
        .map_err(|e| format!("duration '{s}' out of range: {e}"))
}
