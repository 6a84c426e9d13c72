//! Datagram format shared by simulator and observers.
//!
//! Every UDP datagram carries exactly one bincode-encoded [`Packet`].
//! Named commands are carried with raw byte payloads so that their length
//! can be checked by the receiver before decoding (see `command`).

use serde::{Deserialize, Serialize};

use crate::schema::FieldType;
use crate::Vec2;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    /// Observer asks to join. The fingerprint must match the simulator's registry.
    Connect {
        client_version: u32,
        schema_fingerprint: u64,
    },
    /// Observer is leaving.
    Disconnect,
    /// Keeps an idle observer from timing out.
    Heartbeat,
    /// Named command from an observer to the simulator (`Move`, `StopMove`).
    UserMessage { name: String, payload: Vec<u8> },

    /// Named command from the simulator to one observer (`Initialize`).
    HostMessage { name: String, payload: Vec<u8> },
    /// Changed variables from one simulation tick.
    Replicate {
        tick: u64,
        updates: Vec<VariableUpdate>,
    },
    /// Connection refused or closed by the simulator.
    Disconnected { reason: String },
}

/// A replicated field value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum Value {
    Vec2(Vec2),
    Float(f64),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Vec2(_) => FieldType::Vec2,
            Value::Float(_) => FieldType::Float,
        }
    }
}

/// One changed field: `(entityId, fieldName, value)`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VariableUpdate {
    pub entity_id: u32,
    pub field: String,
    pub value: Value,
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(data: &[u8]) -> Result<Packet, bincode::Error> {
        bincode::deserialize(data)
    }
}
