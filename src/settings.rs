use std::time::Duration;

pub const DEFAULT_ALARM_DURATION_SECS: u32 = 5;
pub const MIN_ALARM_DURATION_SECS: u32 = 1;
pub const MAX_ALARM_DURATION_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NotificationSound {
    #[default]
    Default,
    Noti1,
    Noti2,
}

impl NotificationSound {
    pub const ALL: [NotificationSound; 3] = [
        NotificationSound::Default,
        NotificationSound::Noti1,
        NotificationSound::Noti2,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            NotificationSound::Default => "default",
            NotificationSound::Noti1 => "noti1",
            NotificationSound::Noti2 => "noti2",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sound| sound.key() == key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VibrationPattern {
    #[default]
    Default,
    Off,
    Short,
    Long,
}

impl VibrationPattern {
    pub const ALL: [VibrationPattern; 4] = [
        VibrationPattern::Default,
        VibrationPattern::Off,
        VibrationPattern::Short,
        VibrationPattern::Long,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            VibrationPattern::Default => "default",
            VibrationPattern::Off => "off",
            VibrationPattern::Short => "short",
            VibrationPattern::Long => "long",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pattern| pattern.key() == key)
    }
}

/// Process-wide alarm preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    alarm_duration_secs: u32,
    pub notification_sound: NotificationSound,
    pub vibration_pattern: VibrationPattern,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alarm_duration_secs: DEFAULT_ALARM_DURATION_SECS,
            notification_sound: NotificationSound::default(),
            vibration_pattern: VibrationPattern::default(),
        }
    }
}

impl Settings {
    pub fn new(
        alarm_duration_secs: u32,
        notification_sound: NotificationSound,
        vibration_pattern: VibrationPattern,
    ) -> Self {
        Self {
            alarm_duration_secs: clamp_alarm_duration(alarm_duration_secs),
            notification_sound,
            vibration_pattern,
        }
    }

    pub fn alarm_duration_secs(&self) -> u32 {
        self.alarm_duration_secs
    }

    pub fn alarm_duration(&self) -> Duration {
        Duration::from_secs(self.alarm_duration_secs as u64)
    }

    pub fn set_alarm_duration_secs(&mut self, secs: u32) {
        self.alarm_duration_secs = clamp_alarm_duration(secs);
    }
}

pub fn clamp_alarm_duration(secs: u32) -> u32 {
    secs.clamp(MIN_ALARM_DURATION_SECS, MAX_ALARM_DURATION_SECS)
}
