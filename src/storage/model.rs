use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::alarm::{Alarm, AlarmId, AlarmLabel, AlarmTime, ScheduleState};
use crate::scheduling::NotificationHandle;
use crate::settings::{
    DEFAULT_ALARM_DURATION_SECS, MAX_ALARM_DURATION_SECS, NotificationSound, Settings,
    VibrationPattern,
};

pub const ALARMS_KEY: &str = "alarms";
pub const SETTINGS_KEY: &str = "alarm_settings";

pub const SETTINGS_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    pub id: String,
    pub hour: i64,
    pub minute: i64,
    #[serde(default)]
    pub label: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration_pattern: Option<String>,
}

impl From<&Alarm> for AlarmRecord {
    fn from(value: &Alarm) -> Self {
        Self {
            id: value.id.as_str().to_owned(),
            hour: value.time.hour() as i64,
            minute: value.time.minute() as i64,
            label: value.label.as_str().to_owned(),
            is_enabled: value.is_enabled(),
            created_at: value.created_at,
            notification_id: value.handle().map(|handle| handle.as_str().to_owned()),
            sound: value.sound.map(|sound| sound.key().to_owned()),
            vibration_pattern: value
                .vibration_pattern
                .map(|pattern| pattern.key().to_owned()),
        }
    }
}

impl AlarmRecord {
    /// Converts the record into an alarm. A disabled record that still carries a
    /// notification id yields that id separately so it can be cancelled.
    pub fn into_alarm(self) -> (Alarm, Option<NotificationHandle>) {
        let handle = self.notification_id.map(NotificationHandle::from);
        let (schedule, orphaned_handle) = match (self.is_enabled, handle) {
            (true, handle) => (ScheduleState::enabled(handle), None),
            (false, handle) => (ScheduleState::Disabled, handle),
        };

        let alarm = Alarm {
            id: AlarmId::from(self.id),
            time: AlarmTime::normalized(self.hour, self.minute),
            label: AlarmLabel::new(self.label),
            schedule,
            created_at: self.created_at,
            sound: self.sound.as_deref().and_then(parse_sound),
            vibration_pattern: self.vibration_pattern.as_deref().and_then(parse_vibration),
        };

        (alarm, orphaned_handle)
    }
}

#[derive(Debug, Default)]
pub struct DecodedAlarms {
    pub alarms: Vec<Alarm>,
    pub orphaned_handles: Vec<NotificationHandle>,
    /// True when the stored document differs from what re-encoding the
    /// decoded alarms would produce.
    pub repaired: bool,
}

/// Decodes the stored alarm list. Only a document that is not a JSON array is an
/// error; individual broken or duplicate records are skipped.
pub fn decode_alarms(raw: &str) -> Result<DecodedAlarms, serde_json::Error> {
    let values: Vec<serde_json::Value> = serde_json::from_str(raw)?;
    let mut decoded = DecodedAlarms::default();
    let mut seen = HashSet::new();

    for (index, value) in values.into_iter().enumerate() {
        let record = match serde_json::from_value::<AlarmRecord>(value) {
            Ok(record) => record,
            Err(error) => {
                log::warn!("Skipping malformed alarm record. [index = {}, error = {}]", index, error);
                decoded.repaired = true;
                continue;
            }
        };

        if !seen.insert(record.id.clone()) {
            log::warn!("Skipping duplicate alarm record. [alarm_id = {}]", record.id);
            decoded.repaired = true;
            continue;
        }

        let original = record.clone();
        let (alarm, orphaned_handle) = record.into_alarm();
        if AlarmRecord::from(&alarm) != original {
            decoded.repaired = true;
        }
        if let Some(handle) = orphaned_handle {
            log::warn!(
                "Disabled alarm still references notification {}. [alarm_id = {}]",
                handle,
                alarm.id
            );
            decoded.orphaned_handles.push(handle);
        }
        decoded.alarms.push(alarm);
    }

    Ok(decoded)
}

pub fn encode_alarms(alarms: &[Alarm]) -> Result<String, serde_json::Error> {
    let records = alarms.iter().map(AlarmRecord::from).collect::<Vec<_>>();
    serde_json::to_string(&records)
}

/// Stored settings, including the keys older versions wrote.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibration_pattern: Option<String>,
    /// v1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sound: Option<String>,
    /// v0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

impl From<&Settings> for SettingsRecord {
    fn from(value: &Settings) -> Self {
        Self {
            version: SETTINGS_VERSION,
            alarm_duration: Some(value.alarm_duration_secs() as i64),
            notification_sound: Some(value.notification_sound.key().to_owned()),
            vibration_pattern: Some(value.vibration_pattern.key().to_owned()),
            default_sound: None,
            sound: None,
        }
    }
}

impl SettingsRecord {
    pub fn migrate(self) -> Settings {
        if self.version < SETTINGS_VERSION {
            log::info!(
                "Migrating settings from version {} to {}",
                self.version,
                SETTINGS_VERSION
            );
        }

        let alarm_duration_secs = match self.alarm_duration {
            Some(secs) if secs > 0 => secs.min(MAX_ALARM_DURATION_SECS as i64) as u32,
            _ => DEFAULT_ALARM_DURATION_SECS,
        };

        let notification_sound = self
            .notification_sound
            .or(self.default_sound)
            .or(self.sound)
            .as_deref()
            .and_then(parse_sound)
            .unwrap_or_default();

        let vibration_pattern = self
            .vibration_pattern
            .as_deref()
            .and_then(parse_vibration)
            .unwrap_or_default();

        Settings::new(alarm_duration_secs, notification_sound, vibration_pattern)
    }
}

pub fn decode_settings(raw: &str) -> Result<Settings, serde_json::Error> {
    let record: SettingsRecord = serde_json::from_str(raw)?;
    Ok(record.migrate())
}

pub fn encode_settings(settings: &Settings) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SettingsRecord::from(settings))
}

fn parse_sound(key: &str) -> Option<NotificationSound> {
    let sound = NotificationSound::from_key(key);
    if sound.is_none() {
        log::warn!("Unknown notification sound {}, using default", key);
    }
    sound
}

fn parse_vibration(key: &str) -> Option<VibrationPattern> {
    let pattern = VibrationPattern::from_key(key);
    if pattern.is_none() {
        log::warn!("Unknown vibration pattern {}, using default", key);
    }
    pattern
}
