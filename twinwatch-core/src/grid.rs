//! Grid node reducer.
//!
//! Each wire message is classified into a [`GridEvent`] and folded into the
//! node's [`GridNodeState`]. The reducer keeps per-condition counters, tells
//! false alarms (minor or moderate incidents that clear without escalating)
//! apart from confirmed resolutions, and derives an alert level from the node
//! type, the new condition and that history.
//!
//! ```text
//!              init
//!   Unset ───────────▶ Normal
//!                         │  status(minor | moderate | severe | normal | offline)
//!                         ▼
//!        any condition ◀──▶ any condition
//! ```

use serde::Serialize;
use twinwatch_types::{
    GridNodeMessage, GridNodeState, IncidentReport, Millis, NodeCondition, NodeType,
    MESSAGE_TYPE_INIT, MESSAGE_TYPE_STATUS,
};

use crate::{ReduceError, Reducer, Reduction};

/// Share of false alarms among moderate incidents above which a new moderate
/// incident is scored as probably false.
pub const FALSE_ALARM_RATIO: f64 = 0.5;

/// Alert levels for one node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertLevels {
    pub normal: u32,
    pub minor: u32,
    /// Base level for moderate incidents; a [`ModerateRule`] offset is added.
    pub moderate: u32,
    pub severe: u32,
    /// Offsets indexed by [`ModerateRule::index`].
    pub moderate_offsets: [u32; 4],
}

impl AlertLevels {
    pub const INFRASTRUCTURE: AlertLevels = AlertLevels {
        normal: 0,
        minor: 1,
        moderate: 4,
        severe: 10,
        moderate_offsets: [1, 2, 3, 4],
    };

    pub const CONTROLLER: AlertLevels = AlertLevels {
        normal: 0,
        minor: 2,
        moderate: 8,
        severe: 20,
        moderate_offsets: [3, 4, 5, 6],
    };

    /// Level table for a node type.
    pub const fn for_node(node_type: NodeType) -> &'static AlertLevels {
        match node_type {
            NodeType::Infrastructure => &Self::INFRASTRUCTURE,
            NodeType::Controller => &Self::CONTROLLER,
        }
    }

    /// Level for a moderate incident scored by `rule`.
    pub const fn moderate_level(&self, rule: ModerateRule) -> u32 {
        self.moderate + self.moderate_offsets[rule.index()]
    }
}

/// How a moderate incident is scored, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerateRule {
    /// The node has had a severe incident before.
    AfterSevere,
    /// No severe incidents and no false alarms so far.
    NoFalseAlarms,
    /// At least half of past moderate incidents were false alarms.
    MostlyFalse,
    /// Fewer than half of past moderate incidents were false alarms.
    MostlyGenuine,
}

impl ModerateRule {
    /// Pick the rule for the node's counters, or `None` when no rule applies.
    ///
    /// The false alarm share is computed in floating point. A node with false
    /// alarms but no moderate incidents yet matches none of the rules.
    pub fn select(state: &GridNodeState) -> Option<ModerateRule> {
        if state.severe_count > 0 {
            Some(ModerateRule::AfterSevere)
        } else if state.false_count == 0 {
            Some(ModerateRule::NoFalseAlarms)
        } else if state.moderate_count == 0 {
            None
        } else if f64::from(state.false_count) / f64::from(state.moderate_count)
            >= FALSE_ALARM_RATIO
        {
            Some(ModerateRule::MostlyFalse)
        } else {
            Some(ModerateRule::MostlyGenuine)
        }
    }

    pub const fn index(&self) -> usize {
        match self {
            ModerateRule::AfterSevere => 0,
            ModerateRule::NoFalseAlarms => 1,
            ModerateRule::MostlyFalse => 2,
            ModerateRule::MostlyGenuine => 3,
        }
    }
}

/// A classified grid message.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    Init {
        node_type: NodeType,
        region: String,
        latitude: f64,
        longitude: f64,
    },
    Status(NodeCondition),
}

/// Grid nodes never emit alerts; their state is the only output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoAlert {}

/// Turn a wire message into a typed event.
///
/// Missing fields and unknown node types are validation errors. Unknown
/// message types and conditions are classification errors.
pub fn classify(msg: &GridNodeMessage) -> Result<GridEvent, ReduceError> {
    match msg.kind.as_str() {
        MESSAGE_TYPE_INIT => {
            let missing = |field| ReduceError::MissingField {
                kind: MESSAGE_TYPE_INIT,
                field,
            };
            let raw_type = msg.node_type.as_deref().ok_or(missing("node_type"))?;
            let node_type = raw_type
                .parse::<NodeType>()
                .map_err(|_| ReduceError::InvalidNodeType(raw_type.to_string()))?;
            Ok(GridEvent::Init {
                node_type,
                region: msg.region.clone().ok_or(missing("region"))?,
                latitude: msg.latitude.ok_or(missing("latitude"))?,
                longitude: msg.longitude.ok_or(missing("longitude"))?,
            })
        }
        MESSAGE_TYPE_STATUS => {
            let raw = msg
                .condition
                .as_deref()
                .ok_or(ReduceError::MissingField {
                    kind: MESSAGE_TYPE_STATUS,
                    field: "condition",
                })?;
            raw.parse::<NodeCondition>()
                .map(GridEvent::Status)
                .map_err(|_| ReduceError::UnknownCondition(raw.to_string()))
        }
        other => Err(ReduceError::UnknownMessageType(other.to_string())),
    }
}

/// Set the alert level from the node's table.
///
/// Nodes that have not been initialized have no table; their level is left
/// as it is.
fn set_alert_level(state: &mut GridNodeState, pick: impl FnOnce(&AlertLevels) -> u32) {
    match state.node_type {
        Some(node_type) => state.alert_level = pick(AlertLevels::for_node(node_type)),
        None => tracing::warn!(
            condition = %state.condition,
            "status for uninitialized grid node, alert level unchanged"
        ),
    }
}

/// Apply one event to `state`.
pub fn step(state: &mut GridNodeState, event: GridEvent, now: Millis) {
    let condition = match event {
        GridEvent::Init {
            node_type,
            region,
            latitude,
            longitude,
        } => {
            state.node_type = Some(node_type);
            state.condition = NodeCondition::Normal;
            state.region = region;
            state.latitude = latitude;
            state.longitude = longitude;
            return;
        }
        GridEvent::Status(condition) => condition,
    };

    match condition {
        NodeCondition::Normal | NodeCondition::Offline => {
            match state.condition {
                NodeCondition::Minor | NodeCondition::Moderate => {
                    state.false_count += 1;
                    state.total_resolved += 1;
                    state.experiencing_incident = false;
                }
                NodeCondition::Severe => {
                    state.total_resolved += 1;
                    state.experiencing_incident = false;
                }
                _ => {}
            }
            set_alert_level(state, |l| l.normal);
        }
        NodeCondition::Minor => {
            set_alert_level(state, |l| l.minor);
            state.minor_count += 1;
            state.experiencing_incident = true;
        }
        NodeCondition::Severe => {
            set_alert_level(state, |l| l.severe);
            state.severe_count += 1;
            state.experiencing_incident = true;
        }
        NodeCondition::Moderate => match ModerateRule::select(state) {
            Some(rule) => {
                set_alert_level(state, |l| l.moderate_level(rule));
                state.moderate_count += 1;
                state.experiencing_incident = true;
            }
            None => {
                // Counted as an incident, the node itself is left as it was.
                tracing::debug!(
                    false_count = state.false_count,
                    "moderate incident matches no scoring rule"
                );
                record_incident(state, condition, now);
                return;
            }
        },
        NodeCondition::Unset => return,
    }
    state.condition = condition;

    if condition.is_incident() {
        record_incident(state, condition, now);
    }
}

fn record_incident(state: &mut GridNodeState, condition: NodeCondition, now: Millis) {
    state.total_incidents += 1;
    state
        .incident_history
        .push(IncidentReport::new(now, condition));
}

/// Fold a batch of wire messages over `state` in arrival order.
///
/// Messages that fail classification are logged and skipped. Validation
/// errors abort the batch; `state` itself is never modified.
pub fn reduce(
    state: &GridNodeState,
    messages: &[GridNodeMessage],
    now: Millis,
) -> Result<Reduction<GridNodeState, NoAlert>, ReduceError> {
    let mut next = state.clone();
    let mut skipped = 0;

    for (index, msg) in messages.iter().enumerate() {
        match classify(msg) {
            Ok(event) => step(&mut next, event, now),
            Err(err) if err.is_classification() => {
                tracing::warn!(index, error = %err, "skipping grid message");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(Reduction {
        state: next,
        alerts: Vec::new(),
        skipped,
    })
}

/// [`Reducer`] for grid nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridNodeReducer;

impl Reducer for GridNodeReducer {
    type State = GridNodeState;
    type Message = GridNodeMessage;
    type Alert = NoAlert;

    fn domain(&self) -> &'static str {
        "grid"
    }

    fn reduce(
        &self,
        state: &GridNodeState,
        batch: &[GridNodeMessage],
        now: Millis,
    ) -> Result<Reduction<GridNodeState, NoAlert>, ReduceError> {
        reduce(state, batch, now)
    }
}

#[cfg(test)]
mod tests {
    use twinwatch_types::{regions, INCIDENT_HISTORY_CAP};

    use super::*;

    const NOW: Millis = Millis(1_703_160_000_000);

    fn init(node_type: &str) -> GridNodeMessage {
        GridNodeMessage::init("23", regions::NW, node_type, 47.5404, 122.6362)
    }

    fn status(condition: &str) -> GridNodeMessage {
        GridNodeMessage::status("23", condition)
    }

    fn run(messages: &[GridNodeMessage]) -> GridNodeState {
        reduce(&GridNodeState::default(), messages, NOW)
            .unwrap()
            .state
    }

    #[test]
    fn init_sets_identity_and_normal() {
        let state = run(&[init("controller")]);
        assert_eq!(state.node_type, Some(NodeType::Controller));
        assert_eq!(state.condition, NodeCondition::Normal);
        assert_eq!(state.region, "NW");
        assert_eq!(state.latitude, 47.5404);
        assert_eq!(state.longitude, 122.6362);
        assert_eq!(state.alert_level, 0);
        assert_eq!(state.total_incidents, 0);
        assert!(state.incident_history.is_empty());
    }

    #[test]
    fn init_does_not_end_the_batch() {
        let state = run(&[init("infrastructure"), status("minor")]);
        assert_eq!(state.condition, NodeCondition::Minor);
        assert_eq!(state.alert_level, 1);
    }

    #[test]
    fn minor_levels() {
        assert_eq!(run(&[init("infrastructure"), status("minor")]).alert_level, 1);
        let state = run(&[init("controller"), status("minor")]);
        assert_eq!(state.alert_level, 2);
        assert_eq!(state.minor_count, 1);
        assert!(state.experiencing_incident);
    }

    #[test]
    fn severe_levels() {
        assert_eq!(run(&[init("infrastructure"), status("severe")]).alert_level, 10);
        let state = run(&[init("controller"), status("severe")]);
        assert_eq!(state.alert_level, 20);
        assert_eq!(state.severe_count, 1);
        assert_eq!(state.condition, NodeCondition::Severe);
    }

    #[test]
    fn first_moderate_scores_no_false_alarms() {
        let infra = run(&[init("infrastructure"), status("moderate")]);
        assert_eq!(infra.alert_level, 6);
        assert_eq!(infra.moderate_count, 1);

        let controller = run(&[init("controller"), status("moderate")]);
        assert_eq!(controller.alert_level, 12);
        assert!(controller.experiencing_incident);
    }

    #[test]
    fn moderate_after_severe() {
        let infra = run(&[init("infrastructure"), status("severe"), status("moderate")]);
        assert_eq!(infra.alert_level, 5);
        let controller = run(&[init("controller"), status("severe"), status("moderate")]);
        assert_eq!(controller.alert_level, 11);
    }

    #[test]
    fn moderate_with_mostly_false_history() {
        // One moderate, cleared as a false alarm: ratio 1/1.
        let state = run(&[
            init("infrastructure"),
            status("moderate"),
            status("normal"),
            status("moderate"),
        ]);
        assert_eq!(state.alert_level, 7);

        let state = run(&[
            init("controller"),
            status("moderate"),
            status("normal"),
            status("moderate"),
        ]);
        assert_eq!(state.alert_level, 13);
    }

    #[test]
    fn moderate_with_mostly_genuine_history() {
        // Three moderates, one false alarm: ratio 1/3, below one half.
        let node = GridNodeState {
            node_type: Some(NodeType::Controller),
            condition: NodeCondition::Normal,
            moderate_count: 3,
            false_count: 1,
            ..Default::default()
        };
        let out = reduce(&node, &[status("moderate")], NOW).unwrap().state;
        assert_eq!(out.alert_level, 14);
        assert_eq!(out.moderate_count, 4);

        let node = GridNodeState {
            node_type: Some(NodeType::Infrastructure),
            ..node
        };
        let out = reduce(&node, &[status("moderate")], NOW).unwrap().state;
        assert_eq!(out.alert_level, 8);
    }

    #[test]
    fn ratio_uses_float_division() {
        // 2/3 would truncate to 0 with integer division and pick MostlyGenuine.
        let node = GridNodeState {
            node_type: Some(NodeType::Infrastructure),
            moderate_count: 3,
            false_count: 2,
            ..Default::default()
        };
        assert_eq!(ModerateRule::select(&node), Some(ModerateRule::MostlyFalse));
    }

    #[test]
    fn unscored_moderate_only_counts_the_incident() {
        // A false alarm from a minor incident, then the first moderate.
        let state = run(&[
            init("infrastructure"),
            status("minor"),
            status("normal"),
            status("moderate"),
        ]);
        assert_eq!(state.false_count, 1);
        assert_eq!(state.alert_level, 0);
        assert_eq!(state.moderate_count, 0);
        assert_eq!(state.condition, NodeCondition::Normal);
        assert!(!state.experiencing_incident);
        assert_eq!(state.total_incidents, 2);
        assert_eq!(state.incident_history.len(), 2);
        assert_eq!(
            state.incident_history.iter().last().map(|r| r.incident_type),
            Some(NodeCondition::Moderate)
        );
    }

    #[test]
    fn normal_after_moderate_is_false_alarm() {
        let state = run(&[init("controller"), status("moderate"), status("normal")]);
        assert_eq!(state.false_count, 1);
        assert_eq!(state.total_resolved, 1);
        assert!(!state.experiencing_incident);
        assert_eq!(state.alert_level, 0);
        assert_eq!(state.condition, NodeCondition::Normal);
    }

    #[test]
    fn offline_after_minor_is_false_alarm() {
        let state = run(&[init("infrastructure"), status("minor"), status("offline")]);
        assert_eq!(state.false_count, 1);
        assert_eq!(state.condition, NodeCondition::Offline);
    }

    #[test]
    fn normal_after_severe_is_confirmed_resolution() {
        let state = run(&[init("controller"), status("severe"), status("normal")]);
        assert_eq!(state.false_count, 0);
        assert_eq!(state.total_resolved, 1);
        assert!(!state.experiencing_incident);
        assert_eq!(state.alert_level, 0);
    }

    #[test]
    fn normal_from_normal_changes_nothing() {
        let state = run(&[init("controller"), status("normal"), status("offline")]);
        assert_eq!(state.total_resolved, 0);
        assert_eq!(state.false_count, 0);
        assert_eq!(state.condition, NodeCondition::Offline);
    }

    #[test]
    fn incidents_are_recorded() {
        let state = run(&[
            init("controller"),
            status("minor"),
            status("normal"),
            status("severe"),
        ]);
        assert_eq!(state.total_incidents, 2);
        let kinds: Vec<NodeCondition> =
            state.incident_history.iter().map(|r| r.incident_type).collect();
        assert_eq!(kinds, vec![NodeCondition::Minor, NodeCondition::Severe]);
        assert!(state.incident_history.iter().all(|r| r.timestamp == NOW));
    }

    #[test]
    fn history_is_capped() {
        let mut batch = vec![init("infrastructure")];
        batch.extend((0..40).map(|_| status("minor")));
        let state = run(&batch);
        assert_eq!(state.total_incidents, 40);
        assert!(state.incident_history.len() < INCIDENT_HISTORY_CAP);
    }

    #[test]
    fn status_before_init_leaves_level() {
        let state = run(&[status("severe")]);
        assert_eq!(state.alert_level, 0);
        assert_eq!(state.severe_count, 1);
        assert_eq!(state.condition, NodeCondition::Severe);
    }

    #[test]
    fn unknown_condition_is_skipped() {
        let out = reduce(
            &GridNodeState::default(),
            &[init("controller"), status("smoking"), status("minor")],
            NOW,
        )
        .unwrap();
        assert_eq!(out.skipped, 1);
        assert_eq!(out.state.condition, NodeCondition::Minor);
        assert_eq!(out.state.total_incidents, 1);
    }

    #[test]
    fn unknown_message_type_is_skipped() {
        let ping = GridNodeMessage {
            kind: "ping".to_string(),
            ..Default::default()
        };
        let out = reduce(&GridNodeState::default(), &[ping], NOW).unwrap();
        assert_eq!(out.skipped, 1);
        assert_eq!(out.state, GridNodeState::default());
    }

    #[test]
    fn missing_condition_fails_batch() {
        let mut bad = status("minor");
        bad.condition = None;
        let state = run(&[init("controller")]);

        let err = reduce(&state, &[status("severe"), bad], NOW).unwrap_err();
        assert_eq!(
            err,
            ReduceError::MissingField {
                kind: "status",
                field: "condition"
            }
        );
        // The caller's value is untouched even though the first message applied.
        assert_eq!(state.condition, NodeCondition::Normal);
    }

    #[test]
    fn invalid_node_type_fails_batch() {
        let err = reduce(&GridNodeState::default(), &[init("relay")], NOW).unwrap_err();
        assert_eq!(err, ReduceError::InvalidNodeType("relay".to_string()));
    }

    #[test]
    fn init_requires_location() {
        let mut msg = init("controller");
        msg.latitude = None;
        assert_eq!(
            classify(&msg),
            Err(ReduceError::MissingField {
                kind: "init",
                field: "latitude"
            })
        );
    }

    #[test]
    fn replay_is_deterministic() {
        let batch = [
            init("controller"),
            status("moderate"),
            status("normal"),
            status("moderate"),
            status("severe"),
            status("offline"),
        ];
        let a = reduce(&GridNodeState::default(), &batch, NOW).unwrap();
        let b = reduce(&GridNodeState::default(), &batch, NOW).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reduced_state_persists_as_json() {
        let state = run(&[init("controller"), status("severe")]);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["node_type"], "controller");
        assert_eq!(json["condition"], "severe");
        assert_eq!(json["alert_level"], 20);
        assert_eq!(
            json["incident_history"],
            serde_json::json!([{ "timestamp": NOW.0, "incident_type": "severe" }])
        );

        let restored: GridNodeState = serde_json::from_value(json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn level_tables() {
        assert_eq!(AlertLevels::for_node(NodeType::Infrastructure).severe, 10);
        assert_eq!(
            AlertLevels::CONTROLLER.moderate_level(ModerateRule::MostlyGenuine),
            14
        );
    }
}
