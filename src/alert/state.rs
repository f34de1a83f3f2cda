//! Per-service alerting state machine.

use crate::db::Status;

/// What a service was last seen as. `Unknown` means no check was ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceState {
    #[default]
    Unknown,
    Up,
    Down,
    Degraded,
}

/// Notification a transition calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Down,
    Degraded,
    Recovered,
}

impl AlertKind {
    /// Status the alert reports, which is also its cooldown key.
    pub fn status(&self) -> Status {
        match self {
            AlertKind::Down => Status::Down,
            AlertKind::Degraded => Status::Degraded,
            AlertKind::Recovered => Status::Up,
        }
    }
}

impl From<Status> for ServiceState {
    fn from(status: Status) -> Self {
        match status {
            Status::Up => ServiceState::Up,
            Status::Down => ServiceState::Down,
            Status::Degraded => ServiceState::Degraded,
        }
    }
}

impl From<Option<Status>> for ServiceState {
    fn from(status: Option<Status>) -> Self {
        status.map(ServiceState::from).unwrap_or_default()
    }
}

impl ServiceState {
    /// Decide whether moving to `next` warrants an alert.
    ///
    /// Only `down -> up` counts as a recovery; `degraded -> up` is silent.
    pub fn transition(self, next: Status) -> Option<AlertKind> {
        match (self, next) {
            (ServiceState::Unknown, Status::Down) => Some(AlertKind::Down),
            (ServiceState::Unknown, _) => None,
            (prev, next) if prev == ServiceState::from(next) => None,
            (ServiceState::Down, Status::Up) => Some(AlertKind::Recovered),
            (_, Status::Down) => Some(AlertKind::Down),
            (_, Status::Degraded) => Some(AlertKind::Degraded),
            (_, Status::Up) => None,
        }
    }
}

/// Tracks one service across consecutive checks.
#[derive(Debug, Default)]
pub struct StateTracker {
    state: ServiceState,
}

impl StateTracker {
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Feed the next observed status, returning the alert it triggers.
    pub fn observe(&mut self, next: Status) -> Option<AlertKind> {
        let alert = self.state.transition(next);
        self.state = ServiceState::from(next);
        alert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_check() {
        assert_eq!(ServiceState::Unknown.transition(Status::Down), Some(AlertKind::Down));
        assert_eq!(ServiceState::Unknown.transition(Status::Up), None);
        assert_eq!(ServiceState::Unknown.transition(Status::Degraded), None);
    }

    #[test]
    fn test_unchanged_is_silent() {
        for s in [Status::Up, Status::Down, Status::Degraded] {
            assert_eq!(ServiceState::from(s).transition(s), None);
        }
    }

    #[test]
    fn test_changes() {
        assert_eq!(ServiceState::Up.transition(Status::Down), Some(AlertKind::Down));
        assert_eq!(ServiceState::Degraded.transition(Status::Down), Some(AlertKind::Down));
        assert_eq!(ServiceState::Up.transition(Status::Degraded), Some(AlertKind::Degraded));
        assert_eq!(ServiceState::Down.transition(Status::Degraded), Some(AlertKind::Degraded));
        assert_eq!(ServiceState::Down.transition(Status::Up), Some(AlertKind::Recovered));
        assert_eq!(ServiceState::Degraded.transition(Status::Up), None);
    }

    #[test]
    fn test_sequence_fires_on_down_and_recovery_only() {
        let mut tracker = StateTracker::default();
        let fired: Vec<(usize, AlertKind)> = [Status::Up, Status::Up, Status::Down, Status::Down, Status::Up]
            .into_iter()
            .enumerate()
            .filter_map(|(i, s)| tracker.observe(s).map(|a| (i, a)))
            .collect();

        assert_eq!(fired, vec![(2, AlertKind::Down), (4, AlertKind::Recovered)]);
        assert_eq!(tracker.state(), ServiceState::Up);
    }
}
