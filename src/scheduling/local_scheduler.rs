use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::{
    sync::{RwLock, broadcast},
    task::{self, JoinHandle},
    time,
};
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmId;

use super::{
    NotificationEvent, NotificationHandle, NotificationRequest, NotificationScheduler,
    NotificationTrigger, PermissionStatus, delay_until, following_fire_at, next_fire_at,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

struct ScheduledNotification {
    alarm_id: AlarmId,
    task: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

type NotificationStore = RwLock<HashMap<NotificationHandle, ScheduledNotification>>;

/// In-process notification scheduler: one tokio task per handle, firing daily
/// in the configured time zone. Handles do not survive a restart.
pub struct LocalNotificationScheduler {
    notifications: Arc<NotificationStore>,
    events: broadcast::Sender<NotificationEvent>,
    timezone: Tz,
    permission: PermissionStatus,
    shutdown: CancellationToken,
}

impl LocalNotificationScheduler {
    pub fn new(timezone: Tz, permission_granted: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let permission = if permission_granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };

        Self {
            notifications: Arc::new(RwLock::new(HashMap::new())),
            events,
            timezone,
            permission,
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn scheduled_count(&self) -> usize {
        self.notifications.read().await.len()
    }

    /// Publishes a tap on a delivered notification.
    pub fn respond(&self, alarm_id: AlarmId) {
        let _ = self.events.send(NotificationEvent::response(alarm_id));
    }

    fn spawn_notification(&self, request: NotificationRequest) -> ScheduledNotification {
        let NotificationTrigger::Daily { hour, minute } = request.trigger;
        let fire_at = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
        let alarm_id = request.data.alarm_id;
        let cancellation_token = self.shutdown.child_token();

        let task = task::spawn(run_daily_notification(
            alarm_id.clone(),
            fire_at,
            self.timezone,
            self.events.clone(),
            cancellation_token.clone(),
        ));

        ScheduledNotification {
            alarm_id,
            task,
            cancellation_token,
        }
    }
}

impl Drop for LocalNotificationScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl NotificationScheduler for LocalNotificationScheduler {
    async fn request_permission(&self) -> anyhow::Result<PermissionStatus> {
        Ok(self.permission)
    }

    async fn schedule(&self, request: NotificationRequest) -> anyhow::Result<NotificationHandle> {
        if self.permission != PermissionStatus::Granted {
            anyhow::bail!("Notification permission not granted");
        }

        let handle = NotificationHandle::generate();
        let notification = self.spawn_notification(request);
        log::info!(
            "Started notification task {}. [alarm_id = {}]",
            handle,
            notification.alarm_id
        );
        self.notifications
            .write()
            .await
            .insert(handle.clone(), notification);

        Ok(handle)
    }

    async fn cancel(&self, handle: &NotificationHandle) -> anyhow::Result<()> {
        let removed = self.notifications.write().await.remove(handle);
        match removed {
            Some(notification) => {
                notification.cancellation_token.cancel();
                let _ = time::timeout(CANCEL_TIMEOUT, notification.task).await;
                log::info!(
                    "Stopped notification task {}. [alarm_id = {}]",
                    handle,
                    notification.alarm_id
                );
            }
            None => log::debug!("Notification {} is not scheduled, nothing to cancel", handle),
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }
}

async fn run_daily_notification(
    alarm_id: AlarmId,
    fire_at: NaiveTime,
    timezone: Tz,
    events: broadcast::Sender<NotificationEvent>,
    cancellation_token: CancellationToken,
) {
    let mut next = next_fire_at(fire_at, &Utc::now().with_timezone(&timezone));

    loop {
        let delay = delay_until(&next, &Utc::now());
        log::debug!("[NOTIFY] Sleeping for {:?}. [alarm_id = {}]", delay, alarm_id);

        tokio::select! {
            _ = cancellation_token.cancelled() => {
                break;
            }
            _ = time::sleep(delay) => {
                log::info!("[NOTIFY] Firing notification for {}. [alarm_id = {}]", next, alarm_id);
                let _ = events.send(NotificationEvent::received(alarm_id.clone()));
                next = following_fire_at(fire_at, &next, &Utc::now().with_timezone(&timezone));
            }
        }
    }
}
