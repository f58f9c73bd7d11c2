//! Power-grid node records.

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

use crate::IncidentHistory;

/// Wire value of an initialization message.
pub const MESSAGE_TYPE_INIT: &str = "init";

/// Wire value of a status message.
pub const MESSAGE_TYPE_STATUS: &str = "status";

/// Region codes used by the grid deployment.
///
/// Regions are free-form strings; these are the codes devices are
/// provisioned with.
pub mod regions {
    pub const NW: &str = "NW";
    pub const SW: &str = "SW";
    pub const MN: &str = "MN";
    pub const MS: &str = "MS";
    pub const NE: &str = "NE";
    pub const SE: &str = "SE";

    /// All known region codes.
    pub const ALL: [&str; 6] = [NW, SW, MN, MS, NE, SE];
}

/// Kind of grid node. Alert levels scale differently per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NodeType {
    Infrastructure,
    Controller,
}

impl NodeType {
    /// Wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeType::Infrastructure => "infrastructure",
            NodeType::Controller => "controller",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infrastructure" => Ok(NodeType::Infrastructure),
            "controller" => Ok(NodeType::Controller),
            other => Err(ParseValueError::new("node type", other)),
        }
    }
}

/// Qualitative condition of a grid node.
///
/// `Unset` is only ever the state of a node that has not been initialized;
/// it is never accepted from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NodeCondition {
    #[default]
    Unset,
    Normal,
    Minor,
    Moderate,
    Severe,
    Offline,
}

impl NodeCondition {
    /// Wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NodeCondition::Unset => "unset",
            NodeCondition::Normal => "normal",
            NodeCondition::Minor => "minor",
            NodeCondition::Moderate => "moderate",
            NodeCondition::Severe => "severe",
            NodeCondition::Offline => "offline",
        }
    }

    /// Minor, moderate and severe conditions count as incidents.
    pub const fn is_incident(&self) -> bool {
        matches!(
            self,
            NodeCondition::Minor | NodeCondition::Moderate | NodeCondition::Severe
        )
    }
}

impl fmt::Display for NodeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeCondition {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(NodeCondition::Normal),
            "minor" => Ok(NodeCondition::Minor),
            "moderate" => Ok(NodeCondition::Moderate),
            "severe" => Ok(NodeCondition::Severe),
            "offline" => Ok(NodeCondition::Offline),
            other => Err(ParseValueError::new("node condition", other)),
        }
    }
}

/// A string that does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseValueError {
    /// What was being parsed.
    pub what: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseValueError {
    fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ParseValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.what, self.value)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseValueError {}

/// Persisted state of a single grid node.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridNodeState {
    /// Set by the first init message.
    pub node_type: Option<NodeType>,
    pub condition: NodeCondition,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Severity score derived from node type, condition and counters.
    pub alert_level: u32,

    pub minor_count: u32,
    pub moderate_count: u32,
    /// Minor/moderate incidents that resolved without escalating.
    pub false_count: u32,
    pub severe_count: u32,
    pub total_incidents: u32,
    pub total_resolved: u32,
    pub experiencing_incident: bool,

    pub incident_history: IncidentHistory,
}

impl GridNodeState {
    /// Create an uninitialized node state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an init message has been applied.
    pub fn is_initialized(&self) -> bool {
        self.node_type.is_some()
    }

    /// Incidents that are neither resolved nor false alarms.
    pub fn open_incidents(&self) -> u32 {
        self.total_incidents.saturating_sub(self.total_resolved)
    }
}

/// Telemetry sent to a grid node, exactly as received.
///
/// Fields stay untyped here so that the classifier can tell a missing field
/// (rejected) apart from an unknown value (skipped).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridNodeMessage {
    /// `"init"` or `"status"`.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub node_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub region: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub condition: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub node_type: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub latitude: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub longitude: Option<f64>,
}

impl GridNodeMessage {
    /// Build an init message.
    pub fn init(
        node_id: impl Into<String>,
        region: impl Into<String>,
        node_type: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            kind: MESSAGE_TYPE_INIT.to_string(),
            node_id: Some(node_id.into()),
            region: Some(region.into()),
            condition: Some(NodeCondition::Normal.as_str().to_string()),
            node_type: Some(node_type.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Build a status message carrying a condition.
    pub fn status(node_id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            kind: MESSAGE_TYPE_STATUS.to_string(),
            node_id: Some(node_id.into()),
            condition: Some(condition.into()),
            ..Default::default()
        }
    }

    /// Check if this is an init message.
    pub fn is_init(&self) -> bool {
        self.kind == MESSAGE_TYPE_INIT
    }

    /// Check if this is a status message.
    pub fn is_status(&self) -> bool {
        self.kind == MESSAGE_TYPE_STATUS
    }
}
