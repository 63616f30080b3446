//! Single-event selection shared by the map and the list.
//!
//! Holds only the id. The event itself is always looked up against the
//! current canonical set, so a stale id simply resolves to nothing.

use crate::models::Earthquake;

/// Selection state: `Empty` or `Selected(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Empty,
    Selected(String),
}

impl Selection {
    /// Pick an event. Returns `true` if the selection changed.
    ///
    /// The caller is responsible for only offering visible events.
    pub fn select(&mut self, id: &str) -> bool {
        if self.id() == Some(id) {
            return false;
        }
        *self = Self::Selected(id.to_string());
        true
    }

    /// Drop the selection. Returns `true` if something was selected.
    pub fn clear(&mut self) -> bool {
        !matches!(std::mem::take(self), Self::Empty)
    }

    /// Clear the selection if its id is gone from `events`.
    pub fn retain_in(&mut self, events: &[Earthquake]) -> bool {
        match self.id() {
            Some(id) if !events.iter().any(|e| e.id == id) => self.clear(),
            _ => false,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Selected(id) => Some(id),
        }
    }

    /// Look up the selected event in `events`.
    #[must_use]
    pub fn resolve<'a>(&self, events: &'a [Earthquake]) -> Option<&'a Earthquake> {
        let id = self.id()?;
        events.iter().find(|e| e.id == id)
    }
}
