use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

/// Resolves heterogeneous time inputs into a concrete UTC window.
///
/// Priority order:
/// 1. explicit `start` + `end` when both parse,
/// 2. `duration` relative to now,
/// 3. `(now - default_hours, now)`.
///
/// Unparsable inputs never fail the call; they fall through to the next rule.
pub fn resolve_time_range(
    start: Option<&str>,
    end: Option<&str>,
    duration: Option<&str>,
    default_hours: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();

    if let (Some(start), Some(end)) = (start, end) {
        if let (Some(start_dt), Some(end_dt)) = (parse_time(start), parse_time(end)) {
            return (start_dt, end_dt);
        }
    }

    if let Some(duration) = duration {
        if let Some(ms) = parse_duration_ms(duration) {
            return (now - Duration::milliseconds(ms), now);
        }
    }

    (now - Duration::hours(default_hours), now)
}

/// Parses a time string in RFC3339, `now`, or `now-<N><unit>` form into a UTC
/// instant. Naive datetimes (no offset) are treated as UTC.
pub fn parse_time(time_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = time_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_ascii_lowercase();
    if lowered.starts_with("now") {
        let delta = lowered
            .strip_prefix("now-")
            .and_then(parse_relative_offset)
            .unwrap_or_else(Duration::zero);
        return Some(Utc::now() - delta);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = trimmed.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    if let Ok(date) = trimmed.parse::<NaiveDate>() {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    debug!(input = %time_str, "failed to parse time string");
    None
}

/// Parses a duration string like `2h` or `90m` into milliseconds. Bare
/// integers are interpreted as minutes.
pub fn parse_duration_ms(duration_str: &str) -> Option<i64> {
    let lowered = duration_str.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }

    if let Some((digits, unit)) = split_unit_suffix(&lowered) {
        if let Ok(value) = digits.parse::<i64>() {
            let ms = match unit {
                's' => value.checked_mul(1_000),
                'm' => value.checked_mul(60_000),
                'h' => value.checked_mul(3_600_000),
                'd' => value.checked_mul(86_400_000),
                _ => None,
            };
            if let Some(ms) = ms {
                return Some(ms);
            }
        }
    }

    lowered.parse::<i64>().ok().and_then(|v| v.checked_mul(60_000))
}

fn parse_relative_offset(offset: &str) -> Option<Duration> {
    let (digits, unit) = split_unit_suffix(offset)?;
    let value: i64 = digits.parse().ok()?;
    match unit {
        's' => Some(Duration::seconds(value)),
        'm' => Some(Duration::minutes(value)),
        'h' => Some(Duration::hours(value)),
        'd' => Some(Duration::days(value)),
        // Unrecognized unit means zero offset from now.
        _ => Some(Duration::zero()),
    }
}

/// Splits `<digits><unit-char>`; None unless the prefix is all digits.
fn split_unit_suffix(input: &str) -> Option<(&str, char)> {
    let unit = input.chars().last()?;
    let digits = &input[..input.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits, unit))
}
