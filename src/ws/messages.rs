//! WebSocket message types: envelope, type codes and payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric message type carried in `messageType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageType {
    /// Client presents its token; server acknowledges.
    Connection,
    /// Server hands the client its connection id.
    CreateUuid,
    /// Message could not be handled.
    Invalid,
    /// Server-side failure; carries [`ErrorData`].
    Error,
    /// Connection is being closed.
    Disconnect,
}

impl MessageType {
    /// Wire code of this type.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Connection => 7,
            Self::CreateUuid => 8,
            Self::Invalid => 9,
            Self::Error => 10,
            Self::Disconnect => 11,
        }
    }

    /// Type for a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            7 => Some(Self::Connection),
            8 => Some(Self::CreateUuid),
            9 => Some(Self::Invalid),
            10 => Some(Self::Error),
            11 => Some(Self::Disconnect),
            _ => None,
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value.code()
    }
}

impl TryFrom<u8> for MessageType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, String> {
        Self::from_code(code).ok_or_else(|| format!("unknown message type {code}"))
    }
}

/// Envelope exchanged in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Type discriminator.
    pub message_type: MessageType,
    /// Clinic the message concerns.
    pub clinic_id: i64,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Option<Value>,
}

impl Message {
    /// Message without payload.
    #[must_use]
    pub fn new(message_type: MessageType, clinic_id: i64) -> Self {
        Self {
            message_type,
            clinic_id,
            data: None,
        }
    }

    /// Message carrying a serializable payload.
    #[must_use]
    pub fn with_data<T: Serialize>(message_type: MessageType, clinic_id: i64, data: &T) -> Self {
        Self {
            message_type,
            clinic_id,
            data: serde_json::to_value(data).ok(),
        }
    }

    /// `INVALID` reply.
    #[must_use]
    pub fn invalid(clinic_id: i64) -> Self {
        Self::new(MessageType::Invalid, clinic_id)
    }

    /// `ERROR` reply with a reason.
    #[must_use]
    pub fn error(clinic_id: i64, error: &str) -> Self {
        Self::with_data(
            MessageType::Error,
            clinic_id,
            &ErrorData {
                error: error.to_string(),
            },
        )
    }

    /// `CREATE_UUID` greeting.
    #[must_use]
    pub fn create_uuid(clinic_id: i64, uuid: &str) -> Self {
        Self::with_data(
            MessageType::CreateUuid,
            clinic_id,
            &CreateUuidData {
                uuid: uuid.to_string(),
            },
        )
    }

    /// Token presented by a `CONNECTION` message, if any.
    #[must_use]
    pub fn connection_token(&self) -> Option<&str> {
        if self.message_type != MessageType::Connection {
            return None;
        }
        self.data
            .as_ref()?
            .get("token")?
            .as_str()
            .filter(|token| !token.is_empty())
    }

    /// JSON text frame body.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Payload of a client `CONNECTION` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionData {
    /// Session token.
    pub token: String,
}

/// Payload of `CREATE_UUID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUuidData {
    /// Connection id assigned by the server.
    pub uuid: String,
}

/// Payload of `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Human readable reason.
    pub error: String,
}
