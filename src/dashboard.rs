//! Dashboard state holder.
//!
//! All filter, selection and refresh state lives here and changes only
//! through [`Dashboard::apply`]. Each call is one transaction: the
//! canonical set, visible subset, selection, stats and status are mutually
//! consistent before and after, and the returned events say what moved.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::TimeWindow;
use crate::filters::{self, FilterCriteria, sanitize_min_magnitude};
use crate::models::Earthquake;
use crate::selection::Selection;
use crate::stats::{self, DerivedStats};

/// Upper bound on queued notifications; oldest are dropped first.
pub const MAX_NOTIFICATIONS: usize = 8;

/// Tagged updates accepted by the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetMinMagnitude(f64),
    SetTimeWindow(TimeWindow),
    Select(String),
    RefreshStarted,
    RefreshCompleted {
        events: Vec<Earthquake>,
        at: DateTime<Utc>,
    },
    RefreshFailed {
        message: String,
        at: DateTime<Utc>,
    },
    DismissNotification(u64),
}

/// Change notifications published to views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardEvent {
    FiltersChanged,
    CanonicalSetChanged,
    VisibleSubsetChanged,
    SelectionChanged,
    StatusChanged,
    NotificationsChanged,
}

impl DashboardEvent {
    /// Name used for SSE event types.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FiltersChanged => "filters_changed",
            Self::CanonicalSetChanged => "canonical_set_changed",
            Self::VisibleSubsetChanged => "visible_subset_changed",
            Self::SelectionChanged => "selection_changed",
            Self::StatusChanged => "status_changed",
            Self::NotificationsChanged => "notifications_changed",
        }
    }
}

/// Refresh progress. Written only by the refresh scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RefreshStatus {
    pub in_flight: bool,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A transient user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub level: NotificationLevel,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Consistent read-only view of the whole dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub criteria: FilterCriteria,
    pub canonical_count: usize,
    pub visible: Vec<Earthquake>,
    pub selected: Option<Earthquake>,
    pub stats: DerivedStats,
    pub status: RefreshStatus,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Default)]
pub struct Dashboard {
    criteria: FilterCriteria,
    canonical: Vec<Earthquake>,
    visible: Vec<Earthquake>,
    selection: Selection,
    stats: DerivedStats,
    status: RefreshStatus,
    notifications: VecDeque<Notification>,
    next_notification_id: u64,
}

impl Dashboard {
    #[must_use]
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria: FilterCriteria::new(criteria.min_magnitude, criteria.time_window),
            ..Self::default()
        }
    }

    /// Apply one action and report what changed.
    pub fn apply(&mut self, action: Action) -> Vec<DashboardEvent> {
        let mut changes = Vec::new();

        match action {
            Action::SetMinMagnitude(value) => {
                let value = sanitize_min_magnitude(value);
                if (value - self.criteria.min_magnitude).abs() < f64::EPSILON {
                    return changes;
                }
                self.criteria.min_magnitude = value;
                changes.push(DashboardEvent::FiltersChanged);
                self.clear_selection(&mut changes);
                self.recompute_visible(&mut changes);
            }
            Action::SetTimeWindow(window) => {
                if window == self.criteria.time_window {
                    return changes;
                }
                self.criteria.time_window = window;
                changes.push(DashboardEvent::FiltersChanged);
                self.clear_selection(&mut changes);
            }
            Action::Select(id) => {
                // Only visible events can be picked
                if self.visible.iter().any(|e| e.id == id) && self.selection.select(&id) {
                    changes.push(DashboardEvent::SelectionChanged);
                }
            }
            Action::RefreshStarted => {
                if !self.status.in_flight {
                    self.status.in_flight = true;
                    changes.push(DashboardEvent::StatusChanged);
                }
            }
            Action::RefreshCompleted { events, at } => {
                self.canonical = events;
                changes.push(DashboardEvent::CanonicalSetChanged);
                self.clear_selection(&mut changes);
                self.recompute_visible(&mut changes);
                self.status = RefreshStatus {
                    in_flight: false,
                    last_success_at: Some(at),
                };
                changes.push(DashboardEvent::StatusChanged);
            }
            Action::RefreshFailed { message, at } => {
                self.status.in_flight = false;
                changes.push(DashboardEvent::StatusChanged);
                self.notify(NotificationLevel::Error, message, at);
                changes.push(DashboardEvent::NotificationsChanged);
            }
            Action::DismissNotification(id) => {
                let before = self.notifications.len();
                self.notifications.retain(|n| n.id != id);
                if self.notifications.len() != before {
                    changes.push(DashboardEvent::NotificationsChanged);
                }
            }
        }

        // A selection must always resolve against the canonical set
        if self.selection.retain_in(&self.canonical) {
            changes.push(DashboardEvent::SelectionChanged);
        }
        changes
    }

    /// Queue an informational notice outside of the action flow.
    pub fn notify_info(&mut self, message: String, at: DateTime<Utc>) -> Vec<DashboardEvent> {
        self.notify(NotificationLevel::Info, message, at);
        vec![DashboardEvent::NotificationsChanged]
    }

    fn notify(&mut self, level: NotificationLevel, message: String, at: DateTime<Utc>) {
        self.next_notification_id += 1;
        if self.notifications.len() >= MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(Notification {
            id: self.next_notification_id,
            level,
            message,
            raised_at: at,
        });
        debug_assert!(self.notifications.len() <= MAX_NOTIFICATIONS);
    }

    fn clear_selection(&mut self, changes: &mut Vec<DashboardEvent>) {
        if self.selection.clear() {
            changes.push(DashboardEvent::SelectionChanged);
        }
    }

    fn recompute_visible(&mut self, changes: &mut Vec<DashboardEvent>) {
        self.visible = filters::filter(&self.canonical, &self.criteria);
        self.stats = stats::compute(&self.visible);
        changes.push(DashboardEvent::VisibleSubsetChanged);
    }

    #[must_use]
    pub fn criteria(&self) -> FilterCriteria {
        self.criteria
    }

    #[must_use]
    pub fn status(&self) -> RefreshStatus {
        self.status
    }

    #[must_use]
    pub fn visible(&self) -> &[Earthquake] {
        &self.visible
    }

    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        self.stats
    }

    /// Id of the most recently raised notification (0 if none yet).
    #[must_use]
    pub fn latest_notification_id(&self) -> u64 {
        self.next_notification_id
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    /// The selected event, if it is still in the canonical set.
    #[must_use]
    pub fn selected(&self) -> Option<&Earthquake> {
        self.selection.resolve(&self.canonical)
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            criteria: self.criteria(),
            canonical_count: self.canonical.len(),
            visible: self.visible().to_vec(),
            selected: self.selected().cloned(),
            stats: self.stats(),
            status: self.status(),
            notifications: self.notifications().cloned().collect(),
        }
    }
}
