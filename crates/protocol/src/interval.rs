//! Next-check interval hints: `"90m"`, `"2 hours"`, `"1 day"`, `"3600"`.

use std::time::Duration;

/// Parse a human interval. Bare numbers are seconds; `a`/`an` count as one.
pub fn parse_interval(text: &str) -> Result<Duration, String> {
    let lowered = text.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return Err("empty interval".into());
    }

    let split = lowered
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(lowered.len());
    let (number, unit) = lowered.split_at(split);
    let unit = unit.trim();

    let amount: f64 = match number {
        "" => match unit.split_once(char::is_whitespace) {
            Some(("a" | "an", _)) => 1.0,
            _ => return Err(format!("no amount in '{text}'")),
        },
        n => n.parse().map_err(|_| format!("invalid amount '{n}'"))?,
    };
    let unit = match unit.split_once(char::is_whitespace) {
        Some(("a" | "an", rest)) if number.is_empty() => rest.trim(),
        _ => unit,
    };

    let seconds_per_unit = match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        "d" | "day" | "days" => 86_400.0,
        "w" | "week" | "weeks" => 604_800.0,
        other => return Err(format!("unknown unit '{other}'")),
    };

    let seconds = amount * seconds_per_unit;
    if !seconds.is_finite() || seconds > u64::MAX as f64 {
        return Err(format!("interval '{text}' is out of range"));
    }
    Ok(Duration::from_secs(seconds.round() as u64))
}
