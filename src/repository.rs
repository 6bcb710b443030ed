use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::watch;

use crate::alarm::{Alarm, AlarmId, AlarmLabel, AlarmTime, ScheduleState, sort_alarms};
use crate::scheduling::SchedulingCoordinator;
use crate::settings::{NotificationSound, Settings, VibrationPattern};
use crate::storage::{
    ALARMS_KEY, KeyValueStore, SETTINGS_KEY, decode_alarms, decode_settings, encode_alarms,
    encode_settings,
};

/// Upper bound on alarms created by one batch. One per minute of the day.
pub const MAX_BATCH_SIZE: usize = 24 * 60;

/// Read-only view of the alarm list, sorted by time and creation.
pub type AlarmSnapshot = Arc<[Alarm]>;

/// Settled repository state published to observers after every operation.
#[derive(Debug, Clone)]
pub struct RepositoryView {
    pub alarms: AlarmSnapshot,
    pub settings: Settings,
    pub is_loading: bool,
}

/// Owns the alarm list and keeps it consistent with the store and the
/// notification scheduler.
///
/// Operations take `&mut self` and are expected to be awaited one at a time;
/// state observed after an operation returns is fully settled and persisted.
/// Failures are logged and never surfaced: the in-memory list always reflects
/// the user's intent even when storage or scheduling fails.
pub struct AlarmRepository {
    store: Arc<dyn KeyValueStore>,
    coordinator: SchedulingCoordinator,
    alarms: Vec<Alarm>,
    snapshot: AlarmSnapshot,
    settings: Settings,
    is_loading: bool,
    last_created_at: i64,
    view: watch::Sender<RepositoryView>,
}

impl AlarmRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, coordinator: SchedulingCoordinator) -> Self {
        let snapshot: AlarmSnapshot = Arc::from(Vec::new());
        let settings = Settings::default();
        let (view, _) = watch::channel(RepositoryView {
            alarms: snapshot.clone(),
            settings: settings.clone(),
            is_loading: true,
        });

        Self {
            store,
            coordinator,
            alarms: Vec::new(),
            snapshot,
            settings,
            is_loading: true,
            last_created_at: 0,
            view,
        }
    }

    /// True until [`AlarmRepository::load`] has completed.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn alarms(&self) -> AlarmSnapshot {
        self.snapshot.clone()
    }

    pub fn get(&self, id: &AlarmId) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| &alarm.id == id)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<RepositoryView> {
        self.view.subscribe()
    }

    /// Reads alarms and settings from the store. Missing or malformed data
    /// yields an empty list and default settings. Runs once per repository.
    pub async fn load(&mut self) -> AlarmSnapshot {
        if !self.is_loading {
            log::warn!("Alarms are already loaded, ignoring repeated load");
            return self.alarms();
        }

        let decoded = match self.store.get(ALARMS_KEY).await {
            Ok(Some(raw)) => match decode_alarms(&raw) {
                Ok(decoded) => decoded,
                Err(error) => {
                    log::error!("Stored alarms are malformed, starting empty. [error = {}]", error);
                    Default::default()
                }
            },
            Ok(None) => Default::default(),
            Err(error) => {
                log::error!("Failed to load alarms. [error = {}]", error);
                Default::default()
            }
        };

        self.settings = match self.store.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => decode_settings(&raw).unwrap_or_else(|error| {
                log::error!("Stored settings are malformed, using defaults. [error = {}]", error);
                Settings::default()
            }),
            Ok(None) => Settings::default(),
            Err(error) => {
                log::error!("Failed to load settings. [error = {}]", error);
                Settings::default()
            }
        };

        join_all(
            decoded
                .orphaned_handles
                .iter()
                .map(|handle| self.coordinator.cancel(handle)),
        )
        .await;

        self.alarms = decoded.alarms;
        sort_alarms(&mut self.alarms);
        self.last_created_at = self
            .alarms
            .iter()
            .map(|alarm| alarm.created_at)
            .max()
            .unwrap_or(0);
        self.is_loading = false;

        log::info!("Loaded {} alarms", self.alarms.len());
        if decoded.repaired {
            log::info!("Saving repaired alarm records");
            self.persist_alarms().await;
        }
        self.publish()
    }

    pub async fn add_alarm(&mut self, hour: i64, minute: i64, label: &str) -> AlarmSnapshot {
        if !self.ensure_loaded("add_alarm") {
            return self.alarms();
        }

        let mut alarm = self.new_alarm(AlarmTime::normalized(hour, minute), AlarmLabel::new(label));
        let handle = self.coordinator.schedule(&alarm, &self.settings).await;
        alarm.schedule = ScheduleState::enabled(handle);

        log::info!("Added alarm at {}. [alarm_id = {}]", alarm.time, alarm.id);
        let index = self
            .alarms
            .partition_point(|existing| existing.sort_key() <= alarm.sort_key());
        self.alarms.insert(index, alarm);

        self.persist_alarms().await;
        self.publish()
    }

    /// Creates `count` alarms starting at `start_hour:start_minute`, each
    /// `interval_minutes` after the previous one, wrapping around midnight.
    /// Every alarm is scheduled independently; a failed schedule leaves that
    /// alarm enabled without a notification. `count` is capped at
    /// [`MAX_BATCH_SIZE`].
    pub async fn add_multiple_alarms(
        &mut self,
        start_hour: i64,
        start_minute: i64,
        interval_minutes: i64,
        count: usize,
    ) -> AlarmSnapshot {
        if !self.ensure_loaded("add_multiple_alarms") || count == 0 {
            return self.alarms();
        }

        let count = if count > MAX_BATCH_SIZE {
            log::warn!("Batch of {} alarms capped at {}", count, MAX_BATCH_SIZE);
            MAX_BATCH_SIZE
        } else {
            count
        };

        let mut time = AlarmTime::normalized(start_hour, start_minute);
        let mut new_alarms = Vec::with_capacity(count);
        for _ in 0..count {
            new_alarms.push(self.new_alarm(time, AlarmLabel::default()));
            time = time.add_minutes(interval_minutes);
        }

        let handles = join_all(
            new_alarms
                .iter()
                .map(|alarm| self.coordinator.schedule(alarm, &self.settings)),
        )
        .await;

        for (alarm, handle) in new_alarms.iter_mut().zip(handles) {
            if handle.is_none() {
                log::warn!("Alarm created without notification. [alarm_id = {}]", alarm.id);
            }
            alarm.schedule = ScheduleState::enabled(handle);
        }

        log::info!("Added {} alarms starting at {}", count, new_alarms[0].time);
        self.alarms.extend(new_alarms);
        sort_alarms(&mut self.alarms);

        self.persist_alarms().await;
        self.publish()
    }

    pub async fn delete_alarm(&mut self, id: &AlarmId) -> AlarmSnapshot {
        if !self.ensure_loaded("delete_alarm") {
            return self.alarms();
        }

        let Some(index) = self.position(id) else {
            log::info!("Alarm to delete does not exist. [alarm_id = {}]", id);
            return self.alarms();
        };

        self.coordinator.cancel_alarm(&self.alarms[index]).await;
        let alarm = self.alarms.remove(index);
        log::info!("Deleted alarm. [alarm_id = {}]", alarm.id);

        self.persist_alarms().await;
        self.publish()
    }

    pub async fn toggle_alarm(&mut self, id: &AlarmId) -> AlarmSnapshot {
        match self.get(id).map(Alarm::is_enabled) {
            Some(enabled) => self.set_alarm_enabled(id, !enabled).await,
            None => {
                log::info!("Alarm to toggle does not exist. [alarm_id = {}]", id);
                self.alarms()
            }
        }
    }

    /// Moves the alarm into the requested enabled state. Requesting the state
    /// the alarm is already in does nothing.
    pub async fn set_alarm_enabled(&mut self, id: &AlarmId, enabled: bool) -> AlarmSnapshot {
        if !self.ensure_loaded("set_alarm_enabled") {
            return self.alarms();
        }

        let Some(index) = self.position(id) else {
            log::info!("Alarm to update does not exist. [alarm_id = {}]", id);
            return self.alarms();
        };

        if self.alarms[index].is_enabled() == enabled {
            return self.alarms();
        }

        let schedule = if enabled {
            let handle = self
                .coordinator
                .schedule(&self.alarms[index], &self.settings)
                .await;
            ScheduleState::enabled(handle)
        } else {
            self.coordinator.cancel_alarm(&self.alarms[index]).await;
            ScheduleState::Disabled
        };

        let alarm = &mut self.alarms[index];
        alarm.schedule = schedule;
        log::info!(
            "Alarm is now {}. [alarm_id = {}]",
            if enabled { "enabled" } else { "disabled" },
            alarm.id
        );

        self.persist_alarms().await;
        self.publish()
    }

    pub async fn update_alarm_label(&mut self, id: &AlarmId, label: &str) -> AlarmSnapshot {
        if !self.ensure_loaded("update_alarm_label") {
            return self.alarms();
        }

        let Some(index) = self.position(id) else {
            log::info!("Alarm to relabel does not exist. [alarm_id = {}]", id);
            return self.alarms();
        };

        self.alarms[index].label = AlarmLabel::new(label);

        self.persist_alarms().await;
        self.publish()
    }

    /// Schedules every disabled alarm. Already enabled alarms are left alone.
    pub async fn enable_all(&mut self) -> AlarmSnapshot {
        if !self.ensure_loaded("enable_all") {
            return self.alarms();
        }

        let targets = self.indices_where(|alarm| !alarm.is_enabled());
        if targets.is_empty() {
            return self.alarms();
        }

        let handles = join_all(
            targets
                .iter()
                .map(|&index| self.coordinator.schedule(&self.alarms[index], &self.settings)),
        )
        .await;

        for (index, handle) in targets.into_iter().zip(handles) {
            self.alarms[index].schedule = ScheduleState::enabled(handle);
        }

        self.persist_alarms().await;
        self.publish()
    }

    pub async fn disable_all(&mut self) -> AlarmSnapshot {
        if !self.ensure_loaded("disable_all") {
            return self.alarms();
        }

        let targets = self.indices_where(Alarm::is_enabled);
        if targets.is_empty() {
            return self.alarms();
        }

        join_all(
            targets
                .iter()
                .map(|&index| self.coordinator.cancel_alarm(&self.alarms[index])),
        )
        .await;

        for index in targets {
            self.alarms[index].schedule = ScheduleState::Disabled;
        }

        self.persist_alarms().await;
        self.publish()
    }

    pub async fn clear_all(&mut self) -> AlarmSnapshot {
        if !self.ensure_loaded("clear_all") || self.alarms.is_empty() {
            return self.alarms();
        }

        join_all(
            self.alarms
                .iter()
                .map(|alarm| self.coordinator.cancel_alarm(alarm)),
        )
        .await;

        log::info!("Cleared {} alarms", self.alarms.len());
        self.alarms.clear();

        self.persist_alarms().await;
        self.publish()
    }

    /// Tries again to schedule every alarm that is enabled but has no notification.
    pub async fn retry_degraded(&mut self) -> AlarmSnapshot {
        if !self.ensure_loaded("retry_degraded") {
            return self.alarms();
        }

        let targets =
            self.indices_where(|alarm| alarm.schedule == ScheduleState::EnabledDegraded);
        self.reschedule(targets).await
    }

    /// Replaces the notification of every enabled alarm with a fresh one. Used
    /// when the notification scheduler does not keep registrations across restarts.
    pub async fn reschedule_enabled(&mut self) -> AlarmSnapshot {
        if !self.ensure_loaded("reschedule_enabled") {
            return self.alarms();
        }

        let targets = self.indices_where(Alarm::is_enabled);
        join_all(
            targets
                .iter()
                .map(|&index| self.coordinator.cancel_alarm(&self.alarms[index])),
        )
        .await;

        self.reschedule(targets).await
    }

    pub async fn update_alarm_duration(&mut self, secs: u32) -> Settings {
        self.settings.set_alarm_duration_secs(secs);
        self.persist_settings().await
    }

    pub async fn update_notification_sound(&mut self, sound: NotificationSound) -> Settings {
        self.settings.notification_sound = sound;
        self.persist_settings().await
    }

    pub async fn update_vibration_pattern(&mut self, pattern: VibrationPattern) -> Settings {
        self.settings.vibration_pattern = pattern;
        self.persist_settings().await
    }

    async fn reschedule(&mut self, targets: Vec<usize>) -> AlarmSnapshot {
        if targets.is_empty() {
            return self.alarms();
        }

        let handles = join_all(
            targets
                .iter()
                .map(|&index| self.coordinator.schedule(&self.alarms[index], &self.settings)),
        )
        .await;

        let mut recovered = 0;
        for (index, handle) in targets.into_iter().zip(handles) {
            if handle.is_some() {
                recovered += 1;
            }
            self.alarms[index].schedule = ScheduleState::enabled(handle);
        }
        log::info!("Rescheduled {} alarms", recovered);

        self.persist_alarms().await;
        self.publish()
    }

    fn new_alarm(&mut self, time: AlarmTime, label: AlarmLabel) -> Alarm {
        Alarm {
            id: AlarmId::generate(),
            time,
            label,
            schedule: ScheduleState::Disabled,
            created_at: self.next_created_at(),
            sound: Some(self.settings.notification_sound),
            vibration_pattern: Some(self.settings.vibration_pattern),
        }
    }

    /// Strictly increasing across every alarm this repository has seen.
    fn next_created_at(&mut self) -> i64 {
        let created_at = Utc::now()
            .timestamp_millis()
            .max(self.last_created_at.saturating_add(1));
        self.last_created_at = created_at;
        created_at
    }

    fn position(&self, id: &AlarmId) -> Option<usize> {
        self.alarms.iter().position(|alarm| &alarm.id == id)
    }

    fn indices_where(&self, predicate: impl Fn(&Alarm) -> bool) -> Vec<usize> {
        self.alarms
            .iter()
            .enumerate()
            .filter_map(|(index, alarm)| predicate(alarm).then_some(index))
            .collect()
    }

    fn ensure_loaded(&self, operation: &str) -> bool {
        if self.is_loading {
            log::warn!("Ignoring {} before alarms are loaded", operation);
        }
        !self.is_loading
    }

    async fn persist_alarms(&self) {
        let raw = match encode_alarms(&self.alarms) {
            Ok(raw) => raw,
            Err(error) => {
                log::error!("Failed to serialize alarms. [error = {}]", error);
                return;
            }
        };

        if let Err(error) = self.store.set(ALARMS_KEY, raw).await {
            log::error!("Failed to save alarms. [error = {}]", error);
        }
    }

    async fn persist_settings(&mut self) -> Settings {
        match encode_settings(&self.settings) {
            Ok(raw) => {
                if let Err(error) = self.store.set(SETTINGS_KEY, raw).await {
                    log::error!("Failed to save settings. [error = {}]", error);
                }
            }
            Err(error) => log::error!("Failed to serialize settings. [error = {}]", error),
        }

        self.publish();
        self.settings.clone()
    }

    fn publish(&mut self) -> AlarmSnapshot {
        self.snapshot = Arc::from(self.alarms.as_slice());
        self.view.send_replace(RepositoryView {
            alarms: self.snapshot.clone(),
            settings: self.settings.clone(),
            is_loading: self.is_loading,
        });
        self.snapshot.clone()
    }
}
