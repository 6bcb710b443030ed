pub mod alarm;
pub mod appsettings;
pub mod repository;
pub mod ringing;
pub mod scheduling;
pub mod settings;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

pub use alarm::{Alarm, AlarmId, AlarmLabel, AlarmTime, ScheduleState};
pub use repository::{AlarmRepository, AlarmSnapshot, RepositoryView};
pub use ringing::{AlarmRinger, RingingAlarm};
pub use settings::{NotificationSound, Settings, VibrationPattern};
