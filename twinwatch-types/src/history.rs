//! Bounded incident history for grid nodes.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;

use crate::{Millis, NodeCondition};

/// Length at which the history is compacted.
pub const INCIDENT_HISTORY_CAP: usize = 15;

/// Index of the first entry kept when the history is compacted.
///
/// Entries `10..15` survive, i.e. the five most recent reports.
pub const INCIDENT_HISTORY_RETAIN_FROM: usize = 10;

/// A single incident observed on a grid node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IncidentReport {
    /// When the incident was recorded.
    pub timestamp: Millis,
    /// Condition reported by the node (minor, moderate or severe).
    pub incident_type: NodeCondition,
}

impl IncidentReport {
    /// Create a report.
    pub fn new(timestamp: Millis, incident_type: NodeCondition) -> Self {
        Self {
            timestamp,
            incident_type,
        }
    }
}

/// Append-only incident log that never grows past [`INCIDENT_HISTORY_CAP`].
///
/// This is a step-down policy rather than a sliding window: reports pile up
/// until the cap is reached, then everything before
/// [`INCIDENT_HISTORY_RETAIN_FROM`] is dropped in one go. The stored length
/// is therefore always below the cap.
///
/// # Example
///
/// ```rust
/// use twinwatch_types::{IncidentHistory, IncidentReport, Millis, NodeCondition};
///
/// let mut history = IncidentHistory::new();
/// for i in 0..15 {
///     history.push(IncidentReport::new(Millis::from_secs(i), NodeCondition::Minor));
/// }
///
/// assert_eq!(history.len(), 5);
/// assert_eq!(history.oldest().unwrap().timestamp, Millis::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<IncidentReport>", into = "Vec<IncidentReport>")
)]
pub struct IncidentHistory {
    reports: VecDeque<IncidentReport>,
}

impl IncidentHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            reports: VecDeque::with_capacity(INCIDENT_HISTORY_CAP),
        }
    }

    /// Append a report, compacting if the cap is reached.
    pub fn push(&mut self, report: IncidentReport) {
        self.reports.push_back(report);
        if self.reports.len() >= INCIDENT_HISTORY_CAP {
            self.reports.drain(..INCIDENT_HISTORY_RETAIN_FROM);
        }
    }

    /// Number of stored reports.
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Check if no reports are stored.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Oldest stored report.
    pub fn oldest(&self) -> Option<&IncidentReport> {
        self.reports.front()
    }

    /// Most recent report.
    pub fn latest(&self) -> Option<&IncidentReport> {
        self.reports.back()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &IncidentReport> {
        self.reports.iter()
    }
}

/// Error returned when a persisted history violates the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryError {
    /// Number of reports found.
    pub len: usize,
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "incident history holds {} reports, at most {} allowed",
            self.len,
            INCIDENT_HISTORY_CAP - 1
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HistoryError {}

impl TryFrom<Vec<IncidentReport>> for IncidentHistory {
    type Error = HistoryError;

    fn try_from(reports: Vec<IncidentReport>) -> Result<Self, Self::Error> {
        if reports.len() >= INCIDENT_HISTORY_CAP {
            return Err(HistoryError { len: reports.len() });
        }
        Ok(Self {
            reports: reports.into(),
        })
    }
}

impl From<IncidentHistory> for Vec<IncidentReport> {
    fn from(history: IncidentHistory) -> Self {
        history.reports.into()
    }
}
