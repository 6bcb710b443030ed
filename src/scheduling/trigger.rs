use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};

/// Next instant strictly after `now` at which a daily trigger for `fire_at` goes off,
/// in the time zone of `now`.
///
/// When `fire_at` falls into a DST gap on the candidate day the trigger is shifted
/// forward by the size of a typical gap (one hour). On a DST overlap the earlier
/// instant wins.
pub fn next_fire_at<Tz: TimeZone>(fire_at: NaiveTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    let timezone = now.timezone();
    let today = now.date_naive();

    for days in 0..=2 {
        let Some(date) = today.checked_add_days(Days::new(days)) else {
            break;
        };

        if let Some(candidate) = resolve_local(&timezone, date, fire_at) {
            if candidate > *now {
                return candidate;
            }
        }
    }

    log::warn!(
        "Could not resolve next trigger, falling back to one day from now. [fire_at = {}]",
        fire_at
    );
    now.clone() + TimeDelta::days(1)
}

/// Trigger that follows one which went off at `previous`. Days missed while
/// the clock jumped past `previous` (host suspend) are skipped rather than
/// replayed.
pub fn following_fire_at<Tz: TimeZone>(
    fire_at: NaiveTime,
    previous: &DateTime<Tz>,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let from = if now > previous { now } else { previous };
    next_fire_at(fire_at, from)
}

/// How long to sleep from `now` until `target`. Targets in the past yield zero.
pub fn delay_until<Tz: TimeZone>(target: &DateTime<Tz>, now: &DateTime<Utc>) -> std::time::Duration {
    (target.with_timezone(&Utc) - *now)
        .to_std()
        .unwrap_or_default()
}

fn resolve_local<Tz: TimeZone>(timezone: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    let local = NaiveDateTime::new(date, time);

    timezone.from_local_datetime(&local).earliest().or_else(|| {
        let shifted = local.checked_add_signed(TimeDelta::hours(1))?;
        timezone.from_local_datetime(&shifted).earliest()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, Timelike};
    use chrono_tz::{America::New_York, Europe::Moscow};
    use proptest::prelude::*;
    use proptest_arbitrary_interop::arb;

    fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap();
        DateTime::from_naive_utc_and_offset(naive, Utc)
    }

    #[test]
    pub fn when_firing_time_is_yet_to_come_trigger_is_today() {
        let now = utc(2025, 5, 31, 12, 0);
        let fire_at = NaiveTime::from_hms_opt(13, 0, 0).unwrap();

        let next = next_fire_at(fire_at, &now);

        assert_eq!(next, utc(2025, 5, 31, 13, 0));
        assert_eq!(delay_until(&next, &now).as_secs(), 3600);
    }

    #[test]
    pub fn when_firing_time_is_passed_trigger_is_tomorrow() {
        let now = utc(2025, 5, 31, 12, 0);
        let fire_at = NaiveTime::from_hms_opt(11, 0, 0).unwrap();

        let next = next_fire_at(fire_at, &now);

        assert_eq!(next, utc(2025, 6, 1, 11, 0));
        assert_eq!((next - now).num_hours(), 23);
    }

    #[test]
    pub fn when_firing_time_is_now_trigger_is_tomorrow() {
        let now = utc(2025, 5, 31, 12, 0);
        let fire_at = NaiveTime::from_hms_opt(12, 0, 0).unwrap();

        let next = next_fire_at(fire_at, &now);

        assert_eq!(next, utc(2025, 6, 1, 12, 0));
    }

    #[test]
    pub fn trigger_uses_local_wall_clock() {
        // 21:30 UTC is already 00:30 on the next day in Moscow.
        let now = utc(2025, 5, 31, 21, 30).with_timezone(&Moscow);
        let fire_at = NaiveTime::from_hms_opt(7, 0, 0).unwrap();

        let next = next_fire_at(fire_at, &now);

        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(next.time(), fire_at);
        assert_eq!(next.with_timezone(&Utc), utc(2025, 6, 1, 4, 0));
    }

    #[test]
    pub fn trigger_in_dst_gap_is_shifted_forward() {
        // 2025-03-09 02:30 does not exist in New York.
        let now = New_York.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap();
        let fire_at = NaiveTime::from_hms_opt(2, 30, 0).unwrap();

        let next = next_fire_at(fire_at, &now);

        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
        assert_eq!(next.time(), NaiveTime::from_hms_opt(3, 30, 0).unwrap());
    }

    #[test]
    pub fn past_target_has_zero_delay() {
        let now = utc(2025, 5, 31, 12, 0);

        assert!(delay_until(&utc(2025, 5, 31, 11, 0), &now).is_zero());
    }

    #[test]
    pub fn missed_days_are_not_replayed() {
        let previous = utc(2025, 5, 28, 7, 0);
        let now = utc(2025, 5, 31, 9, 15);
        let fire_at = NaiveTime::from_hms_opt(7, 0, 0).unwrap();

        let next = following_fire_at(fire_at, &previous, &now);

        assert_eq!(next, utc(2025, 6, 1, 7, 0));
    }

    #[test]
    pub fn following_trigger_is_a_day_later_when_clock_lags() {
        let previous = utc(2025, 5, 31, 7, 0);
        let now = utc(2025, 5, 31, 6, 59);
        let fire_at = NaiveTime::from_hms_opt(7, 0, 0).unwrap();

        let next = following_fire_at(fire_at, &previous, &now);

        assert_eq!(next, utc(2025, 6, 1, 7, 0));
    }

    fn now_strategy() -> impl Strategy<Value = DateTime<Utc>> {
        (0i64..4_102_444_800).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap())
    }

    proptest! {
        #[test]
        fn test_next_fire_at(
            now in now_strategy(),
            fire_at in arb::<NaiveTime>()
        ) {
            let fire_at = fire_at.with_nanosecond(0).unwrap();
            let next = next_fire_at(fire_at, &now);

            prop_assert!(next > now, "Trigger should always be in the future");
            prop_assert_eq!(next.time(), fire_at);
            prop_assert!((next - now) <= TimeDelta::days(1), "Trigger should be at most a day away. next = {:?}, now = {:?}", next, now);
        }
    }
}
