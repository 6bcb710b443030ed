use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::alarm::Alarm;
use crate::scheduling::{NotificationEvent, NotificationEventKind};

#[derive(Debug, Clone, PartialEq)]
pub struct RingingAlarm {
    pub alarm: Alarm,
    pub started_at: DateTime<Utc>,
    generation: u64,
}

/// Tracks the alarm that is currently ringing and dismisses it after the
/// configured duration.
pub struct AlarmRinger {
    state: Arc<watch::Sender<Option<RingingAlarm>>>,
    timer: Option<CancellationToken>,
    generation: u64,
}

impl Default for AlarmRinger {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmRinger {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);

        Self {
            state: Arc::new(state),
            timer: None,
            generation: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RingingAlarm>> {
        self.state.subscribe()
    }

    pub fn ringing(&self) -> Option<RingingAlarm> {
        self.state.borrow().clone()
    }

    pub fn is_ringing(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Starts ringing for the alarm the event refers to. A delivered
    /// notification never interrupts a ringing alarm, a tapped one always
    /// does. Returns whether ringing (re)started.
    pub fn handle_event(
        &mut self,
        event: &NotificationEvent,
        alarms: &[Alarm],
        duration: Duration,
    ) -> bool {
        let Some(alarm) = alarms.iter().find(|alarm| alarm.id == event.alarm_id) else {
            log::warn!(
                "Notification for unknown alarm, ignoring. [alarm_id = {}]",
                event.alarm_id
            );
            return false;
        };

        if event.kind == NotificationEventKind::Received && self.is_ringing() {
            log::info!(
                "Another alarm is already ringing, ignoring. [alarm_id = {}]",
                alarm.id
            );
            return false;
        }

        self.ring(alarm.clone(), duration);
        true
    }

    pub fn ring(&mut self, alarm: Alarm, duration: Duration) {
        self.cancel_timer();
        self.generation += 1;
        let generation = self.generation;

        log::info!(
            "Alarm is ringing for {:?}. [alarm_id = {}]",
            duration,
            alarm.id
        );
        self.state.send_replace(Some(RingingAlarm {
            alarm,
            started_at: Utc::now(),
            generation,
        }));

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    let dismissed = state.send_if_modified(|current| match current {
                        Some(ringing) if ringing.generation == generation => {
                            *current = None;
                            true
                        }
                        _ => false,
                    });

                    if dismissed {
                        log::info!("Alarm dismissed automatically");
                    }
                }
            }
        });

        self.timer = Some(token);
    }

    /// Stops ringing and returns the alarm that was ringing, if any.
    pub fn dismiss(&mut self) -> Option<RingingAlarm> {
        self.cancel_timer();
        let previous = self.state.send_replace(None);

        if let Some(ringing) = &previous {
            log::info!("Alarm dismissed. [alarm_id = {}]", ringing.alarm.id);
        }

        previous
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

impl Drop for AlarmRinger {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
