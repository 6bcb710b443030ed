mod coordinator;
mod local_scheduler;
mod notification;
mod trigger;

pub use coordinator::{SchedulingCoordinator, build_request};
pub use local_scheduler::LocalNotificationScheduler;
pub use notification::{
    NotificationData, NotificationEvent, NotificationEventKind, NotificationHandle,
    NotificationPriority, NotificationRequest, NotificationScheduler, NotificationTrigger,
    PermissionStatus,
};
pub use trigger::{delay_until, following_fire_at, next_fire_at};
