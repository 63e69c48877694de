//! # Alert rules as seen by the scheduler.
//!
//! A [`Rule`] is owned by the external catalog. The engine reads its identity,
//! frequency and state policies, and writes back the state computed after each
//! evaluation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// State of an alert rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AlertState {
    /// Condition false.
    Ok,
    /// Condition true, waiting for `for_duration` before alerting.
    Pending,
    /// Condition true (or evaluation failing).
    Alerting,
    /// Query returned no data.
    NoData,
    /// Rule is paused and never scheduled.
    Paused,
    /// Not evaluated yet.
    #[default]
    Unknown,
}

impl AlertState {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Ok => "ok",
            AlertState::Pending => "pending",
            AlertState::Alerting => "alerting",
            AlertState::NoData => "no_data",
            AlertState::Paused => "paused",
            AlertState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State to assume when a query returns no data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoDataPolicy {
    /// Switch to [`AlertState::NoData`].
    #[default]
    NoData,
    /// Switch to [`AlertState::Alerting`].
    Alerting,
    /// Switch to [`AlertState::Ok`].
    Ok,
    /// Keep the previous state.
    KeepState,
}

/// State to assume when the evaluation itself fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Switch to [`AlertState::Alerting`].
    #[default]
    Alerting,
    /// Keep the previous state.
    KeepState,
}

/// An alert rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    /// Rule identifier.
    pub id: i64,
    /// Parent (dashboard) identifier.
    pub dashboard_id: i64,
    /// Human-readable name.
    pub name: String,
    /// Evaluation interval; sub-second values are treated as one second.
    pub frequency: Duration,
    /// Current state, written back after each evaluation.
    pub state: AlertState,
    /// How long the condition must hold before `Pending` turns into `Alerting`.
    pub for_duration: Duration,
    /// When `state` last changed.
    pub last_state_change: SystemTime,
    /// Mapping for "no data" results.
    pub no_data_policy: NoDataPolicy,
    /// Mapping for evaluation errors.
    pub error_policy: ErrorPolicy,
}

impl Rule {
    /// Creates a rule with default policies and [`AlertState::Unknown`].
    pub fn new(id: i64, dashboard_id: i64, name: impl Into<String>, frequency: Duration) -> Self {
        Self {
            id,
            dashboard_id,
            name: name.into(),
            frequency,
            state: AlertState::Unknown,
            for_duration: Duration::ZERO,
            last_state_change: UNIX_EPOCH,
            no_data_policy: NoDataPolicy::default(),
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Returns the rule with the given state.
    pub fn with_state(mut self, state: AlertState) -> Self {
        self.state = state;
        self
    }

    /// Returns the rule with the given pending period.
    pub fn with_for(mut self, for_duration: Duration) -> Self {
        self.for_duration = for_duration;
        self
    }

    /// Frequency in whole seconds, never zero.
    pub fn frequency_secs(&self) -> u64 {
        self.frequency.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_never_zero() {
        let r = Rule::new(1, 1, "r", Duration::from_millis(200));
        assert_eq!(r.frequency_secs(), 1);
        let r = Rule::new(1, 1, "r", Duration::from_secs(60));
        assert_eq!(r.frequency_secs(), 60);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(AlertState::NoData.to_string(), "no_data");
        assert_eq!(AlertState::default(), AlertState::Unknown);
    }
}
