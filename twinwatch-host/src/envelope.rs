//! Wire records exchanged with the outside world.

use serde::{Deserialize, Serialize};

/// A domain message addressed to one entity.
///
/// ```json
/// {"id": "sensor-7", "message": {"reading": 63, "timestamp": 1703160000000}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    pub id: String,
    pub message: M,
}

impl<M> Envelope<M> {
    pub fn new(id: impl Into<String>, message: M) -> Self {
        Self {
            id: id.into(),
            message,
        }
    }
}

/// An alert tagged with the entity that raised it.
///
/// The alert's own fields are flattened next to `entity_id`:
///
/// ```json
/// {"entity_id": "sensor-7", "message": "Warning: dangerous air quality.", "timestamp": 1703160000000}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery<A> {
    pub entity_id: String,
    #[serde(flatten)]
    pub alert: A,
}

impl<A> Delivery<A> {
    pub fn new(entity_id: impl Into<String>, alert: A) -> Self {
        Self {
            entity_id: entity_id.into(),
            alert,
        }
    }
}

#[cfg(test)]
mod tests {
    use twinwatch_types::{GasAlert, GasSensorMessage, GridNodeMessage, Millis};

    use super::*;

    #[test]
    fn delivery_flattens_alert() {
        let delivery = Delivery::new("sensor-7", GasAlert::dangerous_air_quality(Millis(42)));
        let json = serde_json::to_value(&delivery).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "entity_id": "sensor-7",
                "message": "Warning: dangerous air quality.",
                "timestamp": 42
            })
        );
    }

    #[test]
    fn parse_gas_envelope() {
        let line = r#"{"id":"sensor-7","message":{"reading":63,"timestamp":1703160000000}}"#;
        let env: Envelope<GasSensorMessage> = serde_json::from_str(line).unwrap();
        assert_eq!(env.id, "sensor-7");
        assert_eq!(env.message.reading, 63);
        assert_eq!(env.message.timestamp, Millis(1_703_160_000_000));
    }

    #[test]
    fn parse_grid_envelope() {
        let line = r#"{"id":"23","message":{"type":"status","condition":"minor"}}"#;
        let env: Envelope<GridNodeMessage> = serde_json::from_str(line).unwrap();
        assert!(env.message.is_status());
        assert_eq!(env.message.condition.as_deref(), Some("minor"));
        assert_eq!(env.message.node_type, None);
    }
}
