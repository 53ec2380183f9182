use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::notifier::Notifier;
use crate::engine::transport::{DispatchPayload, Transport};
use crate::error::DispatchError;
use crate::models::coordinates::Coordinates;
use crate::models::notification::Notification;
use crate::models::request::{DispatchSnapshot, DispatchStatus, RequestId, Resolution};
use crate::models::settings::DispatchSettings;
use crate::observability::metrics::Metrics;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub timeout: Duration,
    pub countdown_seconds: u32,
    pub success_grace: Duration,
    pub failure_grace: Duration,
    pub cancelled_grace: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            countdown_seconds: 5,
            success_grace: Duration::from_millis(1500),
            failure_grace: Duration::from_millis(3000),
            cancelled_grace: Duration::from_millis(1000),
        }
    }
}

impl CoordinatorOptions {
    fn grace_for(&self, status: DispatchStatus) -> Duration {
        match status {
            DispatchStatus::Succeeded => self.success_grace,
            DispatchStatus::Cancelled => self.cancelled_grace,
            DispatchStatus::Failed | DispatchStatus::Pending => self.failure_grace,
        }
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout.as_millis().div_ceil(1000) as u64
    }
}

/// Sends clicked coordinates to the configured endpoint, one request at a time.
///
/// Starting a new dispatch cancels the pending one first, so at most one
/// request is ever non-terminal. Each request is driven by a single task that
/// owns both the countdown and the network deadline; aborting that task stops
/// both. Results are applied only while the request still occupies the
/// current slot, which makes every terminal transition happen exactly once.
///
/// Methods that start work spawn onto the ambient Tokio runtime.
#[derive(Clone)]
pub struct DispatchCoordinator {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    notifier: Notifier,
    metrics: Metrics,
    options: CoordinatorOptions,
    slot: Mutex<Slot>,
    recent: DashMap<RequestId, DispatchSnapshot>,
}

#[derive(Default)]
struct Slot {
    /// `Some` while send mode is active.
    settings: Option<DispatchSettings>,
    current: Option<InFlight>,
}

struct InFlight {
    id: RequestId,
    state: Arc<watch::Sender<DispatchSnapshot>>,
    task: JoinHandle<()>,
    started: Instant,
}

/// Caller's view of one dispatch. Status changes arrive through the watch channel.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    id: RequestId,
    state: watch::Receiver<DispatchSnapshot>,
}

impl DispatchHandle {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> DispatchStatus {
        self.state.borrow().status
    }

    /// Waits until the request reaches a terminal state.
    pub async fn resolved(&self) -> DispatchSnapshot {
        let mut rx = self.state.clone();
        if let Ok(snapshot) = rx.wait_for(|snapshot| snapshot.status.is_terminal()).await {
            return snapshot.clone();
        }
        rx.borrow().clone()
    }
}

impl DispatchCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifier: Notifier,
        metrics: Metrics,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                notifier,
                metrics,
                options,
                slot: Mutex::new(Slot::default()),
                recent: DashMap::new(),
            }),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.shared.notifier.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock_slot().settings.is_some()
    }

    /// Enters send mode. Calling it again while active replaces the settings.
    ///
    /// Settings are checked on every dispatch, so incomplete settings are
    /// accepted here and only reported.
    pub fn activate(&self, settings: DispatchSettings) {
        if let Err(err) = settings.validate() {
            warn!(error = %err, "activating with unusable settings");
        }

        let preview = settings.endpoint_preview();
        self.shared.lock_slot().settings = Some(settings);

        info!(endpoint = %preview, "data sending mode activated");
        self.shared.notifier.info(
            format!(
                "Data sending mode activated. API: {preview}... Click map to send coordinates."
            ),
            None,
        );
    }

    pub fn deactivate(&self) {
        let was_active = {
            let mut slot = self.shared.lock_slot();
            if let Some(flight) = slot.current.take() {
                self.shared.finish(flight, Resolution::Cancelled, true);
            }
            slot.settings.take().is_some()
        };

        if was_active {
            info!("data sending mode deactivated");
            self.shared
                .notifier
                .info("Data sending mode deactivated.", None);
        }
    }

    /// Starts sending `(latitude, longitude)`, superseding any pending request.
    ///
    /// Fails without touching the network when send mode is off, the endpoint
    /// is not configured, or the coordinates are out of range.
    pub fn dispatch(&self, latitude: f64, longitude: f64) -> Result<DispatchHandle, DispatchError> {
        let coordinates = Coordinates::new(latitude, longitude);
        let shared = &self.shared;
        let mut slot = shared.lock_slot();

        let settings = slot.settings.clone().ok_or(DispatchError::Inactive)?;
        settings.validate()?;
        if !coordinates.in_range() {
            return Err(DispatchError::InvalidCoordinates(coordinates.to_string()));
        }

        if let Some(previous) = slot.current.take() {
            debug!(request_id = %previous.id, "superseding pending dispatch");
            shared.finish(previous, Resolution::Cancelled, true);
        }

        let snapshot = DispatchSnapshot::pending(coordinates, shared.options.countdown_seconds);
        let id = snapshot.id;
        let (tx, rx) = watch::channel(snapshot);
        let state = Arc::new(tx);

        let started = Instant::now();
        let task = tokio::spawn(drive(
            shared.clone(),
            id,
            settings.endpoint_url.trim().to_string(),
            DispatchPayload::new(&settings, coordinates),
            started,
            state.clone(),
        ));

        slot.current = Some(InFlight {
            id,
            state,
            task,
            started,
        });
        shared.metrics.dispatches_in_flight.set(1);

        info!(
            request_id = %id,
            latitude,
            longitude,
            "dispatch started"
        );
        shared
            .notifier
            .info(format!("Sending coordinates {coordinates}"), Some(id));

        Ok(DispatchHandle { id, state: rx })
    }

    /// Cancels `id` if it is the pending request. Returns whether anything was cancelled.
    pub fn cancel(&self, id: RequestId) -> bool {
        let mut slot = self.shared.lock_slot();
        match slot.current.take_if(|flight| flight.id == id) {
            Some(flight) => self.shared.finish(flight, Resolution::Cancelled, true),
            None => false,
        }
    }

    /// Cancels whatever is pending. Returns how many requests were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut slot = self.shared.lock_slot();
        match slot.current.take() {
            Some(flight) => usize::from(self.shared.finish(flight, Resolution::Cancelled, true)),
            None => 0,
        }
    }

    /// Checks that the endpoint in `settings` answers, bounded by the dispatch timeout.
    pub async fn check_endpoint(&self, settings: &DispatchSettings) -> Result<(), DispatchError> {
        settings.validate()?;

        let endpoint = settings.endpoint_url.trim();
        match time::timeout(self.shared.options.timeout, self.shared.transport.check(endpoint)).await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(DispatchError::Timeout {
                seconds: self.shared.options.timeout_seconds(),
            }),
        }
    }

    pub fn current(&self) -> Option<DispatchSnapshot> {
        self.shared
            .lock_slot()
            .current
            .as_ref()
            .map(|flight| flight.state.borrow().clone())
    }

    /// Resolved requests still inside their display grace period, newest first.
    pub fn recent(&self) -> Vec<DispatchSnapshot> {
        let mut recent: Vec<DispatchSnapshot> = self
            .shared
            .recent
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent
    }

    pub fn get(&self, id: RequestId) -> Option<DispatchSnapshot> {
        if let Some(current) = self.current().filter(|snapshot| snapshot.id == id) {
            return Some(current);
        }
        self.shared.recent.get(&id).map(|entry| entry.value().clone())
    }
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies a result coming from a request task, unless the request was already taken out of the slot.
    fn settle(self: &Arc<Self>, id: RequestId, resolution: Resolution) -> bool {
        let mut slot = self.lock_slot();
        match slot.current.take_if(|flight| flight.id == id) {
            Some(flight) => self.finish(flight, resolution, false),
            None => {
                debug!(request_id = %id, "discarding result of request that is no longer current");
                false
            }
        }
    }

    /// Moves a request that has left the slot into its terminal state. Caller holds the slot lock.
    fn finish(self: &Arc<Self>, flight: InFlight, resolution: Resolution, abort: bool) -> bool {
        if abort {
            flight.task.abort();
        }
        self.metrics.dispatches_in_flight.set(0);

        let outcome = resolution.outcome_label();
        let failure_message = match &resolution {
            Resolution::Failed(err) => format!("Failed to send coordinates: {err}"),
            _ => String::new(),
        };
        let status = resolution.status();

        if !flight.state.send_if_modified(|snapshot| snapshot.resolve(resolution)) {
            return false;
        }

        let elapsed = flight.started.elapsed().as_secs_f64();
        self.metrics.observe(outcome, elapsed);

        let snapshot = flight.state.borrow().clone();
        match status {
            DispatchStatus::Succeeded => {
                info!(request_id = %flight.id, elapsed, "coordinates sent");
                self.notifier
                    .success("Coordinates sent successfully", Some(flight.id));
            }
            DispatchStatus::Cancelled => {
                info!(request_id = %flight.id, "dispatch cancelled");
                self.notifier.info("Request cancelled", Some(flight.id));
            }
            DispatchStatus::Failed | DispatchStatus::Pending => {
                warn!(
                    request_id = %flight.id,
                    outcome,
                    failure = ?snapshot.failure,
                    "dispatch failed"
                );
                self.notifier.error(failure_message, Some(flight.id));
            }
        }

        self.recent.insert(flight.id, snapshot);
        self.schedule_expiry(flight.id, self.options.grace_for(status));
        true
    }

    fn schedule_expiry(self: &Arc<Self>, id: RequestId, grace: Duration) {
        let shared = Arc::downgrade(self);
        tokio::spawn(async move {
            time::sleep(grace).await;
            if let Some(shared) = shared.upgrade() {
                shared.recent.remove(&id);
            }
        });
    }
}

async fn drive(
    shared: Arc<Shared>,
    id: RequestId,
    endpoint: String,
    payload: DispatchPayload,
    started: Instant,
    state: Arc<watch::Sender<DispatchSnapshot>>,
) {
    let deadline = started + shared.options.timeout;
    let send = time::timeout_at(deadline, shared.transport.send(&endpoint, &payload));
    tokio::pin!(send);

    let mut countdown = time::interval_at(started + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
    countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            biased;
            result = &mut send => break result,
            _ = countdown.tick() => {
                if state.send_if_modified(|snapshot| snapshot.tick()) {
                    let remaining_seconds = state.borrow().remaining_seconds;
                    debug!(request_id = %id, remaining_seconds, "countdown tick");
                }
            }
        }
    };

    let resolution = match result {
        Err(_elapsed) => Resolution::Failed(DispatchError::Timeout {
            seconds: shared.options.timeout_seconds(),
        }),
        Ok(Err(err)) => Resolution::Failed(err),
        Ok(Ok(response)) if response.succeeded() => Resolution::Succeeded,
        Ok(Ok(response)) => Resolution::Failed(DispatchError::Application(response.error_message())),
    };

    shared.settle(id, resolution);
}
