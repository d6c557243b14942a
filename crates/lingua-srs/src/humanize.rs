use chrono::{DateTime, Utc};

/// Coarse, human wording for the wait from `now` until `at`.
pub fn humanize_until(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let delta = at - now;
    let minutes = delta.num_minutes();
    if minutes < 60 {
        return plural(minutes.max(1), "minute");
    }
    let hours = delta.num_hours();
    if hours < 24 {
        return plural(hours, "hour");
    }
    let days = delta.num_days();
    match days {
        1 => "tomorrow".to_string(),
        2..=6 => plural(days, "day"),
        7..=29 => plural(days / 7, "week"),
        _ => plural(days / 30, "month"),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn wait(d: Duration) -> String {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        humanize_until(now, now + d)
    }

    #[test]
    fn buckets() {
        assert_eq!(wait(Duration::seconds(20)), "1 minute");
        assert_eq!(wait(Duration::minutes(45)), "45 minutes");
        assert_eq!(wait(Duration::minutes(60)), "1 hour");
        assert_eq!(wait(Duration::hours(5)), "5 hours");
        assert_eq!(wait(Duration::hours(30)), "tomorrow");
        assert_eq!(wait(Duration::days(3)), "3 days");
        assert_eq!(wait(Duration::days(14)), "2 weeks");
        assert_eq!(wait(Duration::days(65)), "2 months");
    }

    #[test]
    fn past_times_read_as_a_minute() {
        assert_eq!(wait(Duration::minutes(-5)), "1 minute");
    }
}
