use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::Utc;
use chrono_tz::Tz;

use crate::alarm::Alarm;
use crate::settings::Settings;

use super::{
    NotificationData, NotificationHandle, NotificationPriority, NotificationRequest,
    NotificationScheduler, NotificationTrigger, PermissionStatus, next_fire_at,
};

const DEFAULT_TITLE: &str = "Alarm";

/// Translates alarms into notification requests and owns the handle lifecycle.
///
/// Every failure is logged and swallowed: scheduling yields `None`, cancelling
/// yields nothing.
pub struct SchedulingCoordinator {
    scheduler: Arc<dyn NotificationScheduler>,
    timezone: Tz,
    permission_granted: AtomicBool,
}

impl SchedulingCoordinator {
    pub fn new(scheduler: Arc<dyn NotificationScheduler>, timezone: Tz) -> Self {
        Self {
            scheduler,
            timezone,
            permission_granted: AtomicBool::new(false),
        }
    }

    pub async fn schedule(&self, alarm: &Alarm, settings: &Settings) -> Option<NotificationHandle> {
        if !self.ensure_permission().await {
            log::info!(
                "Notification permission not granted, alarm stays without notification. [alarm_id = {}]",
                alarm.id
            );
            return None;
        }

        let first_fire = next_fire_at(
            alarm.time.as_naive_time(),
            &Utc::now().with_timezone(&self.timezone),
        );
        let request = build_request(alarm, settings);
        let sound = request.sound;

        match self.scheduler.schedule(request).await {
            Ok(handle) => {
                log::info!(
                    "Scheduled notification {} for {} with sound {}. [alarm_id = {}]",
                    handle,
                    first_fire,
                    sound.key(),
                    alarm.id
                );
                Some(handle)
            }
            Err(error) => {
                log::error!(
                    "Failed to schedule notification. [alarm_id = {}, error = {:#}]",
                    alarm.id,
                    error
                );
                None
            }
        }
    }

    pub async fn cancel(&self, handle: &NotificationHandle) {
        match self.scheduler.cancel(handle).await {
            Ok(()) => log::info!("Cancelled notification {}", handle),
            Err(error) => log::error!(
                "Failed to cancel notification. [handle = {}, error = {:#}]",
                handle,
                error
            ),
        }
    }

    /// Cancels the alarm's notification if it has one.
    pub async fn cancel_alarm(&self, alarm: &Alarm) {
        if let Some(handle) = alarm.handle() {
            self.cancel(handle).await;
        }
    }

    async fn ensure_permission(&self) -> bool {
        if self.permission_granted.load(Ordering::Acquire) {
            return true;
        }

        match self.scheduler.request_permission().await {
            Ok(PermissionStatus::Granted) => {
                self.permission_granted.store(true, Ordering::Release);
                true
            }
            Ok(status) => {
                log::warn!("Notification permission is {:?}", status);
                false
            }
            Err(error) => {
                log::error!("Failed to request notification permission. [error = {:#}]", error);
                false
            }
        }
    }
}

pub fn build_request(alarm: &Alarm, settings: &Settings) -> NotificationRequest {
    let title = if alarm.label.is_empty() {
        DEFAULT_TITLE.to_owned()
    } else {
        alarm.label.as_str().to_owned()
    };

    NotificationRequest {
        title,
        body: alarm.time.to_12_hour_string(),
        sound: alarm.sound.unwrap_or(settings.notification_sound),
        vibration_pattern: alarm.vibration_pattern.unwrap_or(settings.vibration_pattern),
        priority: NotificationPriority::Max,
        data: NotificationData {
            alarm_id: alarm.id.clone(),
        },
        trigger: NotificationTrigger::Daily {
            hour: alarm.time.hour(),
            minute: alarm.time.minute(),
        },
    }
}
