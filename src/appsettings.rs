use std::path::PathBuf;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File, builder::DefaultState, ConfigBuilder};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NotificationSettings {
    pub timezone: String,
    pub permission_granted: bool,
}

impl NotificationSettings {
    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|error| anyhow::anyhow!("Unknown timezone {:?}: {}", self.timezone, error))
    }
}

/// What to do with stored alarms once they are loaded.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StartupAction {
    /// Replace every enabled alarm's notification.
    #[default]
    Reschedule,
    /// Only schedule enabled alarms that have no notification.
    RetryDegraded,
    Skip,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AlarmSettings {
    #[serde(default)]
    pub on_start: StartupAction,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    pub storage: StorageSettings,
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub alarms: AlarmSettings,
}

impl AppSettings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(
                Environment::with_prefix("ZVONOK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings = builder
            .set_default("storage.data_dir", "./data")?
            .set_default("notifications.timezone", "UTC")?
            .set_default("notifications.permission_granted", true)?
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_toml(toml: &str) -> AppSettings {
        AppSettings::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
            .unwrap()
    }

    #[test]
    fn defaults_apply_without_sources() {
        let settings = AppSettings::from_builder(Config::builder()).unwrap();

        assert_eq!(settings.storage.data_dir, PathBuf::from("./data"));
        assert_eq!(settings.notifications.timezone().unwrap(), chrono_tz::UTC);
        assert!(settings.notifications.permission_granted);
        assert_eq!(settings.alarms.on_start, StartupAction::Reschedule);
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = from_toml(
            r#"
            [storage]
            data_dir = "/var/lib/zvonok"

            [notifications]
            timezone = "Europe/Moscow"
            permission_granted = false

            [alarms]
            on_start = "retry_degraded"
            "#,
        );

        assert_eq!(settings.storage.data_dir, PathBuf::from("/var/lib/zvonok"));
        assert_eq!(
            settings.notifications.timezone().unwrap(),
            chrono_tz::Europe::Moscow
        );
        assert!(!settings.notifications.permission_granted);
        assert_eq!(settings.alarms.on_start, StartupAction::RetryDegraded);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let settings = from_toml(
            r#"
            [notifications]
            timezone = "Mars/Olympus_Mons"
            "#,
        );

        assert!(settings.notifications.timezone().is_err());
    }

    #[test]
    fn unknown_startup_action_is_rejected() {
        let result = AppSettings::from_builder(Config::builder().add_source(File::from_str(
            "[alarms]\non_start = \"sometimes\"",
            FileFormat::Toml,
        )));

        assert!(result.is_err());
    }
}
