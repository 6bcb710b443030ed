use std::fmt;

use chrono::NaiveTime;

use crate::scheduling::NotificationHandle;
use crate::settings::{NotificationSound, VibrationPattern};

pub const MAX_LABEL_LENGTH: usize = 30;

const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmId(String);

impl AlarmId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AlarmId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AlarmId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock time of day an alarm fires at, in the device's local time zone.
///
/// Field order matters: the derived `Ord` compares hour first, then minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AlarmTime {
    hour: u32,
    minute: u32,
}

impl AlarmTime {
    /// Builds a time from possibly out-of-range components. Hour and minute
    /// are wrapped independently, so `(25, -1)` becomes `01:59`.
    pub fn normalized(hour: i64, minute: i64) -> Self {
        Self {
            hour: hour.rem_euclid(24) as u32,
            minute: minute.rem_euclid(60) as u32,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Moves the time forward by `minutes`, carrying into the hour and wrapping
    /// around midnight.
    pub fn add_minutes(self, minutes: i64) -> Self {
        let minutes = minutes.rem_euclid(MINUTES_PER_DAY);
        let total = (self.hour as i64 * 60 + self.minute as i64 + minutes) % MINUTES_PER_DAY;
        Self {
            hour: (total / 60) as u32,
            minute: (total % 60) as u32,
        }
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or_default()
    }

    /// `7:05 AM`, `12:00 PM`, `12:30 AM`.
    pub fn to_12_hour_string(&self) -> String {
        let period = if self.hour >= 12 { "PM" } else { "AM" };
        let hour = match self.hour % 12 {
            0 => 12,
            hour => hour,
        };
        format!("{}:{:02} {}", hour, self.minute, period)
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmLabel(String);

impl AlarmLabel {
    /// Trims surrounding whitespace and keeps at most [`MAX_LABEL_LENGTH`] characters.
    pub fn new(label: impl AsRef<str>) -> Self {
        let label = label
            .as_ref()
            .trim()
            .chars()
            .take(MAX_LABEL_LENGTH)
            .collect::<String>();

        Self(label.trim_end().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AlarmLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scheduling dimension of an alarm.
///
/// A handle can only exist while the alarm is enabled, so a disabled alarm
/// holding a live notification is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleState {
    Disabled,
    Scheduled(NotificationHandle),
    /// Enabled by the user, but the last scheduling attempt produced no notification.
    EnabledDegraded,
}

impl ScheduleState {
    pub fn enabled(handle: Option<NotificationHandle>) -> Self {
        match handle {
            Some(handle) => ScheduleState::Scheduled(handle),
            None => ScheduleState::EnabledDegraded,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, ScheduleState::Disabled)
    }

    pub fn handle(&self) -> Option<&NotificationHandle> {
        match self {
            ScheduleState::Scheduled(handle) => Some(handle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: AlarmId,
    pub time: AlarmTime,
    pub label: AlarmLabel,
    pub schedule: ScheduleState,
    /// Unix milliseconds. Only used to order alarms sharing the same time.
    pub created_at: i64,
    pub sound: Option<NotificationSound>,
    pub vibration_pattern: Option<VibrationPattern>,
}

impl Alarm {
    pub fn is_enabled(&self) -> bool {
        self.schedule.is_enabled()
    }

    pub fn handle(&self) -> Option<&NotificationHandle> {
        self.schedule.handle()
    }

    pub fn sort_key(&self) -> (AlarmTime, i64) {
        (self.time, self.created_at)
    }
}

pub fn sort_alarms(alarms: &mut [Alarm]) {
    alarms.sort_by_key(Alarm::sort_key);
}

pub fn is_sorted(alarms: &[Alarm]) -> bool {
    alarms.windows(2).all(|pair| pair[0].sort_key() <= pair[1].sort_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalized_wraps_each_component_independently() {
        let time = AlarmTime::normalized(25, -1);

        assert_eq!(time.hour(), 1);
        assert_eq!(time.minute(), 59);
    }

    #[test]
    fn add_minutes_carries_into_next_day() {
        let time = AlarmTime::normalized(23, 50).add_minutes(30);

        assert_eq!(time, AlarmTime::normalized(0, 20));
    }

    #[test]
    fn add_minutes_handles_extreme_offsets() {
        let start = AlarmTime::normalized(0, 30);

        // i64::MAX is 1087 and i64::MIN is 352 modulo minutes per day.
        assert_eq!(start.add_minutes(i64::MAX), AlarmTime::normalized(18, 37));
        assert_eq!(start.add_minutes(i64::MIN), AlarmTime::normalized(6, 22));
    }

    #[test]
    fn twelve_hour_format() {
        assert_eq!(AlarmTime::normalized(0, 30).to_12_hour_string(), "12:30 AM");
        assert_eq!(AlarmTime::normalized(7, 5).to_12_hour_string(), "7:05 AM");
        assert_eq!(AlarmTime::normalized(12, 0).to_12_hour_string(), "12:00 PM");
        assert_eq!(AlarmTime::normalized(23, 59).to_12_hour_string(), "11:59 PM");
    }

    #[test]
    fn label_is_trimmed_and_bounded() {
        let label = AlarmLabel::new("  wake up and go for a very long morning run  ");

        assert_eq!(label.as_str().chars().count(), MAX_LABEL_LENGTH);
        assert!(label.as_str().starts_with("wake up"));
        assert!(AlarmLabel::new("   ").is_empty());
    }

    #[test]
    fn label_counts_characters_not_bytes() {
        let label = AlarmLabel::new("будильник".repeat(5));

        assert_eq!(label.as_str().chars().count(), MAX_LABEL_LENGTH);
    }

    #[test]
    fn schedule_state_from_result() {
        let handle = NotificationHandle::from("handle-1");

        assert_eq!(
            ScheduleState::enabled(Some(handle.clone())),
            ScheduleState::Scheduled(handle)
        );
        assert_eq!(ScheduleState::enabled(None), ScheduleState::EnabledDegraded);
        assert!(ScheduleState::EnabledDegraded.is_enabled());
        assert!(ScheduleState::EnabledDegraded.handle().is_none());
        assert!(!ScheduleState::Disabled.is_enabled());
    }

    proptest! {
        #[test]
        fn normalized_is_always_in_range(hour in any::<i32>(), minute in any::<i32>()) {
            let time = AlarmTime::normalized(hour as i64, minute as i64);

            prop_assert!(time.hour() < 24);
            prop_assert!(time.minute() < 60);
        }

        #[test]
        fn add_minutes_is_consistent_with_minutes_of_day(
            hour in 0i64..24,
            minute in 0i64..60,
            delta in any::<i64>()
        ) {
            let time = AlarmTime::normalized(hour, minute).add_minutes(delta);
            let expected = ((hour * 60 + minute) as i128 + delta as i128).rem_euclid(MINUTES_PER_DAY as i128);

            prop_assert_eq!((time.hour() * 60 + time.minute()) as i128, expected);
        }
    }
}
