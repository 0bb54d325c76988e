use chrono::{DateTime, Local, Utc};

/// Parses an RFC 3339 timestamp as sent by the backend.
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// `12s ago`, `5m ago`, `3h ago`, `2d ago`, or `-` when unknown.
pub fn time_ago(raw: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(time) = raw.and_then(parse_time) else {
        return "-".to_string();
    };
    let secs = (now - time).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s ago", s),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86400),
    }
}

/// Idle tag of a worker: `Active` while it runs jobs, `New` if it never ran
/// one, otherwise minutes since its last task.
pub fn idle_tag(current_jobs: u32, last_task_time: Option<&str>, now: DateTime<Utc>) -> String {
    if current_jobs > 0 {
        return "Active".to_string();
    }
    match last_task_time.and_then(parse_time) {
        Some(last) => format!("{}m idle", (now - last).num_minutes().max(0)),
        None => "New".to_string(),
    }
}

/// Local `YYYY-MM-DD HH:MM:SS`, or the raw value when it does not parse.
pub fn local_time(raw: Option<&str>) -> String {
    match raw {
        Some(raw) => parse_time(raw)
            .map(|t| {
                t.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| raw.to_string()),
        None => "-".to_string(),
    }
}

/// Local date only.
pub fn local_date(raw: Option<&str>) -> String {
    match raw.and_then(parse_time) {
        Some(t) => t.with_timezone(&Local).format("%Y-%m-%d").to_string(),
        None => "-".to_string(),
    }
}

/// Milliseconds as seconds with two decimals, `-` when absent or zero.
pub fn millis(ms: Option<u64>) -> String {
    match ms {
        Some(ms) if ms > 0 => format!("{:.2}s", ms as f64 / 1000.0),
        _ => "-".to_string(),
    }
}

/// Seconds as `1h 02m`, `3m 04s` or `5s`.
pub fn duration_secs(secs: f64) -> String {
    let secs = secs.max(0.0).round() as u64;
    match secs {
        s if s >= 3600 => format!("{}h {:02}m", s / 3600, (s % 3600) / 60),
        s if s >= 60 => format!("{}m {:02}s", s / 60, s % 60),
        s => format!("{}s", s),
    }
}

/// Keeps the first `max` characters, marking the cut with `…`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        parse_time("2025-03-01T12:00:00Z").unwrap()
    }

    #[test]
    fn test_time_ago() {
        assert_eq!(time_ago(Some("2025-03-01T11:59:48Z"), now()), "12s ago");
        assert_eq!(time_ago(Some("2025-03-01T11:55:00Z"), now()), "5m ago");
        assert_eq!(time_ago(Some("2025-03-01T09:00:00Z"), now()), "3h ago");
        assert_eq!(time_ago(Some("2025-02-27T12:00:00Z"), now()), "2d ago");
        // clock skew never shows negative ages
        assert_eq!(time_ago(Some("2025-03-01T12:00:30Z"), now()), "0s ago");
        assert_eq!(time_ago(Some("garbage"), now()), "-");
        assert_eq!(time_ago(None, now()), "-");
    }

    #[test]
    fn test_idle_tag() {
        assert_eq!(idle_tag(2, None, now()), "Active");
        assert_eq!(idle_tag(0, None, now()), "New");
        assert_eq!(idle_tag(0, Some("2025-03-01T11:53:00Z"), now()), "7m idle");
    }

    #[test]
    fn test_formatting() {
        assert_eq!(millis(Some(3400)), "3.40s");
        assert_eq!(millis(Some(0)), "-");
        assert_eq!(millis(None), "-");
        assert_eq!(duration_secs(3725.0), "1h 02m");
        assert_eq!(duration_secs(184.0), "3m 04s");
        assert_eq!(duration_secs(5.4), "5s");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
        assert_eq!(local_time(Some("not a date")), "not a date");
    }
}
