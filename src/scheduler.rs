//! Single-flight refresh scheduler.
//!
//! One task owns the [`Dashboard`] and is its only writer. It drives
//! fetch -> normalize -> commit on a fixed cadence and on demand, and
//! publishes every committed change to subscribers.
//!
//! At most one fetch is in flight. A refresh requested during a fetch is
//! coalesced: the caller waits for the in-flight fetch instead of issuing
//! a second one. The periodic timer is disarmed while a fetch runs and
//! re-armed when it finishes, so cadence is anchored to the last fetch.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::client::{FeedSource, TimeWindow};
use crate::dashboard::{Action, Dashboard, DashboardEvent, Snapshot};
use crate::errors::{FeedError, SchedulerStopped};
use crate::filters::FilterCriteria;
use crate::models::RawFeedRecord;
use crate::normalize::normalize;

/// Default cadence of periodic refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shortest cadence we accept; the feeds only update every minute or so.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// How long a notification stays up.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// Command queue depth.
const COMMAND_CAPACITY: usize = 32;

/// Change broadcast capacity. Lagging views skip old events and re-read
/// the snapshot anyway.
const EVENT_CAPACITY: usize = 64;

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub refresh_interval: Duration,
    pub notification_ttl: Duration,
    pub criteria: FilterCriteria,
    /// Fetch immediately on start instead of waiting a full interval
    pub fetch_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            criteria: FilterCriteria::default(),
            fetch_on_start: true,
        }
    }
}

/// How a refresh ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed { count: usize },
    Failed { message: String },
}

enum Command {
    Refresh(oneshot::Sender<RefreshOutcome>),
    Apply(Action, oneshot::Sender<()>),
    Shutdown,
}

type FetchOutput = (TimeWindow, Result<Vec<RawFeedRecord>, FeedError>);

/// Cheap, cloneable access to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<Snapshot>,
    events: broadcast::Sender<DashboardEvent>,
}

impl SchedulerHandle {
    /// Trigger a refresh and wait for it (or the one already running).
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler has stopped.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, SchedulerStopped> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Refresh(tx)).await?;
        rx.await.map_err(|_| SchedulerStopped)
    }

    /// Change the magnitude threshold. Re-filters without fetching.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler has stopped.
    pub async fn set_min_magnitude(&self, value: f64) -> Result<(), SchedulerStopped> {
        self.apply(Action::SetMinMagnitude(value)).await
    }

    /// Change the time window. Starts a fetch of the new feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler has stopped.
    pub async fn set_time_window(&self, window: TimeWindow) -> Result<(), SchedulerStopped> {
        self.apply(Action::SetTimeWindow(window)).await
    }

    /// Select a visible event by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler has stopped.
    pub async fn select(&self, id: &str) -> Result<(), SchedulerStopped> {
        self.apply(Action::Select(id.to_string())).await
    }

    /// Stop the scheduler. Pending timers die with it.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Current consistent state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Subscribe to change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    async fn apply(&self, action: Action) -> Result<(), SchedulerStopped> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Apply(action, tx)).await?;
        rx.await.map_err(|_| SchedulerStopped)
    }

    async fn send(&self, command: Command) -> Result<(), SchedulerStopped> {
        self.commands.send(command).await.map_err(|_| SchedulerStopped)
    }
}

/// The scheduler task state.
pub struct RefreshScheduler<S> {
    source: Arc<S>,
    config: SchedulerConfig,
    dashboard: Dashboard,
    in_flight: Option<JoinHandle<FetchOutput>>,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    /// Window of the fetch in flight, if any
    in_flight_window: Option<TimeWindow>,
    /// Window changed while a fetch was running
    refetch_pending: bool,
    /// Last fetch failed; the next success posts a notice
    recovering: bool,
    next_refresh: Option<Instant>,
    /// (notification id, dismiss deadline), oldest first
    notice_deadlines: VecDeque<(u64, Instant)>,
    last_tracked_notice: u64,
    state_tx: watch::Sender<Snapshot>,
    events_tx: broadcast::Sender<DashboardEvent>,
}

impl<S: FeedSource> RefreshScheduler<S> {
    /// Start the scheduler task.
    ///
    /// The task ends when [`SchedulerHandle::shutdown`] is called or every
    /// handle is dropped.
    pub fn spawn(source: Arc<S>, config: SchedulerConfig) -> (SchedulerHandle, JoinHandle<()>) {
        let dashboard = Dashboard::new(config.criteria);
        let (state_tx, state_rx) = watch::channel(dashboard.snapshot());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);

        let handle = SchedulerHandle {
            commands: commands_tx,
            state: state_rx,
            events: events_tx.clone(),
        };

        let scheduler = Self {
            source,
            config,
            dashboard,
            in_flight: None,
            waiters: Vec::new(),
            in_flight_window: None,
            refetch_pending: false,
            recovering: false,
            next_refresh: None,
            notice_deadlines: VecDeque::new(),
            last_tracked_notice: 0,
            state_tx,
            events_tx,
        };

        let task = tokio::spawn(scheduler.run(commands_rx));
        (handle, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(
            "refresh scheduler started ({} feed, every {}s)",
            self.dashboard.criteria().time_window,
            self.config.refresh_interval.as_secs()
        );

        if self.config.fetch_on_start {
            self.start_fetch();
        } else {
            self.arm_timer();
        }

        loop {
            let refresh_at = self.next_refresh;
            let dismiss_at = self.notice_deadlines.front().map(|(_, at)| *at);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                result = join_in_flight(&mut self.in_flight) => self.finish_fetch(result),
                () = sleep_until_opt(refresh_at) => {
                    debug!("periodic refresh");
                    self.start_fetch();
                }
                () = sleep_until_opt(dismiss_at) => self.dismiss_expired(),
            }
        }

        // Timers are plain deadlines and go away with `self`; only the
        // fetch task outlives the loop unless stopped here.
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        info!("refresh scheduler stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Refresh(reply) => {
                if self.in_flight.is_some() {
                    debug!("refresh coalesced into in-flight fetch");
                } else {
                    self.start_fetch();
                }
                self.waiters.push(reply);
            }
            Command::Apply(action, ack) => {
                let window_change = matches!(action, Action::SetTimeWindow(_));
                let changes = self.dashboard.apply(action);

                if window_change && !changes.is_empty() {
                    // Cadence restarts from the fetch of the new window
                    self.next_refresh = None;
                    if let Some(fetching) = self.in_flight_window {
                        // Switching back to the window being fetched needs no second fetch
                        self.refetch_pending = fetching != self.dashboard.criteria().time_window;
                    } else {
                        self.start_fetch();
                    }
                }

                self.publish(&changes);
                let _ = ack.send(());
            }
            Command::Shutdown => {}
        }
    }

    /// Start a fetch unless one is already running.
    fn start_fetch(&mut self) {
        if self.in_flight.is_some() {
            return;
        }

        let window = self.dashboard.criteria().time_window;
        let source = Arc::clone(&self.source);
        self.next_refresh = None;
        self.in_flight_window = Some(window);
        self.in_flight = Some(tokio::spawn(async move {
            (window, source.fetch(window).await)
        }));

        let changes = self.dashboard.apply(Action::RefreshStarted);
        self.publish(&changes);
    }

    fn finish_fetch(&mut self, result: Result<FetchOutput, JoinError>) {
        self.in_flight_window = None;
        let now = Utc::now();

        let outcome = match result {
            Ok((window, Ok(records))) => {
                let events = normalize(records, now);
                let count = events.len();
                info!("refreshed {} feed: {} earthquakes", window, count);

                let mut changes = self.dashboard.apply(Action::RefreshCompleted { events, at: now });
                if std::mem::take(&mut self.recovering) {
                    changes.extend(
                        self.dashboard
                            .notify_info(format!("Feed is back: {count} earthquakes loaded"), now),
                    );
                }
                self.publish(&changes);
                RefreshOutcome::Refreshed { count }
            }
            Ok((window, Err(e))) => {
                warn!("{} feed refresh failed ({:?}): {}", window, e.kind(), e);
                self.fail(format!("Failed to refresh earthquakes: {e}"))
            }
            Err(e) => {
                warn!("feed task failed: {}", e);
                self.fail("Failed to refresh earthquakes".to_string())
            }
        };

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }

        if self.refetch_pending {
            self.refetch_pending = false;
            self.start_fetch();
        } else {
            self.arm_timer();
        }
    }

    fn fail(&mut self, message: String) -> RefreshOutcome {
        self.recovering = true;
        let changes = self.dashboard.apply(Action::RefreshFailed {
            message: message.clone(),
            at: Utc::now(),
        });
        self.publish(&changes);
        RefreshOutcome::Failed { message }
    }

    fn arm_timer(&mut self) {
        self.next_refresh = Some(Instant::now() + self.config.refresh_interval);
    }

    fn dismiss_expired(&mut self) {
        let now = Instant::now();
        while let Some(&(id, deadline)) = self.notice_deadlines.front() {
            if deadline > now {
                break;
            }
            self.notice_deadlines.pop_front();
            let changes = self.dashboard.apply(Action::DismissNotification(id));
            self.publish(&changes);
        }
    }

    /// Publish the new snapshot, then the change events.
    fn publish(&mut self, changes: &[DashboardEvent]) {
        if changes.is_empty() {
            return;
        }

        let latest = self.dashboard.latest_notification_id();
        if latest > self.last_tracked_notice {
            let deadline = Instant::now() + self.config.notification_ttl;
            for id in (self.last_tracked_notice + 1)..=latest {
                self.notice_deadlines.push_back((id, deadline));
            }
            self.last_tracked_notice = latest;
        }

        self.state_tx.send_replace(self.dashboard.snapshot());
        for change in changes {
            // No subscribers is fine
            let _ = self.events_tx.send(*change);
        }
    }
}

async fn join_in_flight(
    slot: &mut Option<JoinHandle<FetchOutput>>,
) -> Result<FetchOutput, JoinError> {
    match slot.as_mut() {
        Some(task) => {
            let result = task.await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
