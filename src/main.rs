use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;

use zvonok::appsettings::{AppSettings, StartupAction};
use zvonok::scheduling::{LocalNotificationScheduler, NotificationScheduler, SchedulingCoordinator};
use zvonok::storage::FileKeyValueStore;
use zvonok::{AlarmRepository, AlarmRinger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::new().context("Failed to read application settings")?;
    let timezone = settings.notifications.timezone()?;
    log::info!(
        "Starting alarm daemon. [data_dir = {}, timezone = {}]",
        settings.storage.data_dir.display(),
        timezone
    );

    let store = Arc::new(FileKeyValueStore::new(settings.storage.data_dir.clone()));
    let scheduler = Arc::new(LocalNotificationScheduler::new(
        timezone,
        settings.notifications.permission_granted,
    ));
    let mut events = scheduler.subscribe();

    let coordinator = SchedulingCoordinator::new(scheduler.clone(), timezone);
    let mut repository = AlarmRepository::new(store, coordinator);
    repository.load().await;

    let alarms = match settings.alarms.on_start {
        StartupAction::Reschedule => repository.reschedule_enabled().await,
        StartupAction::RetryDegraded => repository.retry_degraded().await,
        StartupAction::Skip => repository.alarms(),
    };

    for alarm in alarms.iter() {
        log::info!(
            "{} {} {}. [alarm_id = {}]",
            alarm.time.to_12_hour_string(),
            if alarm.is_enabled() { "on" } else { "off" },
            alarm.label.as_str(),
            alarm.id
        );
    }

    let mut ringer = AlarmRinger::new();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    ringer.handle_event(
                        &event,
                        &repository.alarms(),
                        repository.settings().alarm_duration(),
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {} notification events", skipped);
                }
                Err(RecvError::Closed) => {
                    log::warn!("Notification events stream closed");
                    break;
                }
            },
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                log::info!("Shutting down");
                break;
            }
        }
    }

    ringer.dismiss();
    Ok(())
}
