use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::scheduling::{
    NotificationEvent, NotificationHandle, NotificationRequest, NotificationScheduler,
    PermissionStatus,
};
use crate::storage::{InMemoryKeyValueStore, KeyValueStore, StoreError};

#[derive(Default)]
struct RecordedCalls {
    permission_requests: usize,
    schedule_calls: usize,
    scheduled: Vec<(NotificationHandle, NotificationRequest)>,
    active: Vec<NotificationHandle>,
    cancelled: Vec<NotificationHandle>,
    failing_calls: HashSet<usize>,
}

/// Notification scheduler double that records every call and can be told to fail.
pub struct RecordingNotificationScheduler {
    permission: Mutex<PermissionStatus>,
    calls: Mutex<RecordedCalls>,
    fail_all_schedules: AtomicBool,
    fail_cancels: AtomicBool,
    events: broadcast::Sender<NotificationEvent>,
}

impl RecordingNotificationScheduler {
    pub fn new() -> Self {
        Self::with_permission(PermissionStatus::Granted)
    }

    pub fn with_permission(permission: PermissionStatus) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            permission: Mutex::new(permission),
            calls: Mutex::new(RecordedCalls::default()),
            fail_all_schedules: AtomicBool::new(false),
            fail_cancels: AtomicBool::new(false),
            events,
        }
    }

    pub fn set_permission(&self, permission: PermissionStatus) {
        *self.permission.lock().unwrap() = permission;
    }

    /// Fails the `n`-th schedule call, counting from zero.
    pub fn fail_schedule_call(&self, n: usize) {
        self.calls.lock().unwrap().failing_calls.insert(n);
    }

    pub fn fail_all_schedules(&self, fail: bool) {
        self.fail_all_schedules.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }

    pub fn permission_requests(&self) -> usize {
        self.calls.lock().unwrap().permission_requests
    }

    pub fn scheduled_requests(&self) -> Vec<NotificationRequest> {
        self.calls
            .lock()
            .unwrap()
            .scheduled
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn active_handles(&self) -> Vec<NotificationHandle> {
        self.calls.lock().unwrap().active.clone()
    }

    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.calls.lock().unwrap().cancelled.clone()
    }
}

#[async_trait]
impl NotificationScheduler for RecordingNotificationScheduler {
    async fn request_permission(&self) -> anyhow::Result<PermissionStatus> {
        self.calls.lock().unwrap().permission_requests += 1;
        Ok(*self.permission.lock().unwrap())
    }

    async fn schedule(&self, request: NotificationRequest) -> anyhow::Result<NotificationHandle> {
        let mut calls = self.calls.lock().unwrap();
        let call = calls.schedule_calls;
        calls.schedule_calls += 1;

        if self.fail_all_schedules.load(Ordering::SeqCst) || calls.failing_calls.contains(&call) {
            anyhow::bail!("Injected scheduling failure for call {call}");
        }

        let handle = NotificationHandle::from(format!("handle-{call}"));
        calls.scheduled.push((handle.clone(), request));
        calls.active.push(handle.clone());

        Ok(handle)
    }

    async fn cancel(&self, handle: &NotificationHandle) -> anyhow::Result<()> {
        let mut calls = self.calls.lock().unwrap();
        calls.cancelled.push(handle.clone());

        if self.fail_cancels.load(Ordering::SeqCst) {
            anyhow::bail!("Injected cancellation failure for {handle}");
        }

        calls.active.retain(|active| active != handle);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }
}

/// In-memory store that can be switched into failing reads or writes.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryKeyValueStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            inner: InMemoryKeyValueStore::with_entries(entries.iter().copied()),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.unwrap()
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".to_owned()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".to_owned()));
        }
        self.inner.set(key, value).await
    }
}
