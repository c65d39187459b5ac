use super::types::TimerSpec;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rand::Rng;

/// Next eligible run of `spec`, given the previous run and the current time.
///
/// The interval candidate counts forward from `last_run` (or `now`) in whole
/// intervals until it is strictly after `now`, so a long outage yields one
/// catch-up run instead of a burst. The daily candidate is today's clock time
/// in `now`'s timezone, or tomorrow's if that has already passed. Jitter is
/// sampled independently for each candidate and the earlier one wins.
pub fn next_run_at<Tz, R>(
    spec: &TimerSpec,
    last_run: Option<DateTime<Utc>>,
    now: &DateTime<Tz>,
    rng: &mut R,
) -> Option<DateTime<Utc>>
where
    Tz: TimeZone,
    R: Rng + ?Sized,
{
    let now_utc = now.with_timezone(&Utc);
    let mut candidates = Vec::with_capacity(2);

    if let Some(interval) = spec.interval
        && let Some(next) = interval_candidate(interval, last_run.unwrap_or(now_utc), now_utc)
    {
        candidates.push(with_jitter(next, spec.jitter_secs, rng));
    }

    if let Some(clock) = spec.daily_clock
        && let Some(next) = daily_candidate(clock.hour, clock.minute, clock.second, now)
    {
        candidates.push(with_jitter(next, spec.jitter_secs, rng));
    }

    candidates.into_iter().min()
}

fn interval_candidate(
    interval: std::time::Duration,
    base: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let step = TimeDelta::from_std(interval).ok()?;
    if step <= TimeDelta::zero() {
        return None;
    }

    let mut next = base.checked_add_signed(step)?;
    if next <= now {
        let behind = total_nanos(now - next);
        let steps = behind / total_nanos(step) + 1;
        next = next.checked_add_signed(delta_from_nanos(steps * total_nanos(step))?)?;
    }
    while next <= now {
        next = next.checked_add_signed(step)?;
    }
    Some(next)
}

fn daily_candidate<Tz: TimeZone>(
    hour: u32,
    minute: u32,
    second: u32,
    now: &DateTime<Tz>,
) -> Option<DateTime<Utc>> {
    let tz = now.timezone();
    let naive = now.date_naive().and_hms_opt(hour, minute, second)?;
    // A clock time inside a DST gap does not exist; take the first instant after it.
    let today = tz
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + TimeDelta::hours(1)))
                .earliest()
        })?
        .with_timezone(&Utc);

    let now_utc = now.with_timezone(&Utc);
    if today > now_utc {
        Some(today)
    } else {
        today.checked_add_signed(TimeDelta::days(1))
    }
}

fn with_jitter<R: Rng + ?Sized>(at: DateTime<Utc>, max_secs: u32, rng: &mut R) -> DateTime<Utc> {
    if max_secs == 0 {
        return at;
    }
    let delay = rng.random_range(0..=max_secs);
    at + TimeDelta::seconds(i64::from(delay))
}

fn total_nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * 1_000_000_000 + i128::from(delta.subsec_nanos())
}

fn delta_from_nanos(nanos: i128) -> Option<TimeDelta> {
    let secs = i64::try_from(nanos.div_euclid(1_000_000_000)).ok()?;
    let sub = u32::try_from(nanos.rem_euclid(1_000_000_000)).ok()?;
    TimeDelta::new(secs, sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::scheduler::types::DailyClock;
    use chrono::FixedOffset;
    use std::time::Duration;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn interval_spec(secs: u64, jitter_secs: u32) -> TimerSpec {
        TimerSpec {
            interval: Some(Duration::from_secs(secs)),
            daily_clock: None,
            jitter_secs,
        }
    }

    fn daily_spec(hour: u32) -> TimerSpec {
        TimerSpec {
            interval: None,
            daily_clock: Some(DailyClock {
                hour,
                minute: 0,
                second: 0,
            }),
            jitter_secs: 0,
        }
    }

    #[test]
    fn interval_without_history_starts_from_now() {
        let now = at("2026-03-01T10:00:00Z");
        let next = next_run_at(&interval_spec(300, 0), None, &now, &mut rand::rng());
        assert_eq!(next, Some(at("2026-03-01T10:05:00Z")));
    }

    #[test]
    fn interval_catches_up_with_a_single_future_run() {
        let last = at("2026-03-01T00:00:00Z");
        let now = at("2026-03-01T10:02:30Z");
        let next = next_run_at(&interval_spec(600, 0), Some(last), &now, &mut rand::rng());
        assert_eq!(next, Some(at("2026-03-01T10:10:00Z")));
    }

    #[test]
    fn interval_landing_exactly_on_now_moves_forward() {
        let last = at("2026-03-01T10:00:00Z");
        let now = at("2026-03-01T10:10:00Z");
        let next = next_run_at(&interval_spec(600, 0), Some(last), &now, &mut rand::rng());
        assert_eq!(next, Some(at("2026-03-01T10:20:00Z")));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let now = at("2026-03-01T10:00:00Z");
        let mut rng = rand::rng();
        for _ in 0..200 {
            let next = next_run_at(&interval_spec(60, 30), None, &now, &mut rng).unwrap();
            let offset = (next - now).num_seconds();
            assert!((60..=90).contains(&offset), "offset {offset} out of range");
        }
    }

    #[test]
    fn daily_clock_later_today() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let next = next_run_at(&daily_spec(21), None, &now, &mut rand::rng()).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2026, 3, 1, 21, 0, 0).unwrap());
    }

    #[test]
    fn daily_clock_already_passed_rolls_to_tomorrow() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let next = next_run_at(&daily_spec(21), None, &now, &mut rand::rng()).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap());
    }

    #[test]
    fn daily_clock_equal_to_now_rolls_to_tomorrow() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 1, 21, 0, 0).unwrap();
        let next = next_run_at(&daily_spec(21), None, &now, &mut rand::rng()).unwrap();
        assert_eq!(next, tz.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap());
    }

    #[test]
    fn earlier_candidate_wins() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let now = tz.with_ymd_and_hms(2026, 3, 1, 20, 59, 0).unwrap();
        let spec = TimerSpec {
            interval: Some(Duration::from_secs(3600)),
            ..daily_spec(21)
        };
        let next = next_run_at(&spec, None, &now, &mut rand::rng()).unwrap();
        assert_eq!(next, at("2026-03-01T21:00:00Z"));
    }

    #[test]
    fn empty_spec_has_no_next_run() {
        let now = at("2026-03-01T10:00:00Z");
        assert!(next_run_at(&TimerSpec::default(), None, &now, &mut rand::rng()).is_none());
    }
}
