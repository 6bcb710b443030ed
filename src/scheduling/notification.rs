use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::alarm::AlarmId;
use crate::settings::{NotificationSound, VibrationPattern};

/// Opaque reference to a registered notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl From<String> for NotificationHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NotificationHandle {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPriority {
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTrigger {
    /// Fires every day at the given local wall-clock time.
    Daily { hour: u32, minute: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationData {
    pub alarm_id: AlarmId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub sound: NotificationSound,
    pub vibration_pattern: VibrationPattern,
    pub priority: NotificationPriority,
    pub data: NotificationData,
    pub trigger: NotificationTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEventKind {
    /// The notification was delivered.
    Received,
    /// The user tapped the notification.
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub kind: NotificationEventKind,
    pub alarm_id: AlarmId,
}

impl NotificationEvent {
    pub fn received(alarm_id: AlarmId) -> Self {
        Self {
            kind: NotificationEventKind::Received,
            alarm_id,
        }
    }

    pub fn response(alarm_id: AlarmId) -> Self {
        Self {
            kind: NotificationEventKind::Response,
            alarm_id,
        }
    }
}

#[async_trait]
pub trait NotificationScheduler: Send + Sync + 'static {
    async fn request_permission(&self) -> anyhow::Result<PermissionStatus>;

    async fn schedule(&self, request: NotificationRequest) -> anyhow::Result<NotificationHandle>;

    /// Cancelling an unknown or already cancelled handle is not an error.
    async fn cancel(&self, handle: &NotificationHandle) -> anyhow::Result<()>;

    /// Out-of-band stream of delivered and tapped notifications.
    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent>;
}
