//! The [`Message`] that every frame carries.

use crate::serial;
use crate::{ProtocolError, Value};

/// Protocol version stamped on every outgoing message and required on
/// every incoming one.
pub const PROTOCOL_VERSION: u32 = 0;

/// Reserved command consumed by the framing layer and never delivered to
/// a service.
pub const KEEP_ALIVE: &str = "KEEP_ALIVE";

/// One addressed request or reply.
///
/// On the wire a message is the 5-element sequence
/// `[version, sender, address, command, content]`, encoded by the
/// serializer. The serializer's outer length prefix is the frame prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Protocol version the sender built this message for.
    pub version: u32,
    /// Identity the sender claims (a user name, or empty).
    pub sender: String,
    /// Target service address, e.g. `/chat/dev_main`.
    pub address: String,
    /// The verb, e.g. `ENTER`, `MOVE`, `APPEND`.
    pub command: String,
    /// Command-specific payload.
    pub content: Value,
}

impl Message {
    /// Builds a message stamped with [`PROTOCOL_VERSION`].
    pub fn new(
        sender: impl Into<String>,
        address: impl Into<String>,
        command: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sender: sender.into(),
            address: address.into(),
            command: command.into(),
            content: content.into(),
        }
    }

    /// A keep-alive from `sender`. Its address is empty and its content
    /// is the empty string.
    pub fn keep_alive(sender: impl Into<String>) -> Self {
        Self::new(sender, "", KEEP_ALIVE, Value::empty())
    }

    /// Returns `true` for the reserved keep-alive verb.
    pub fn is_keep_alive(&self) -> bool {
        self.command == KEEP_ALIVE
    }

    /// Builds a reply to the same address with a new verb and content.
    ///
    /// The sender field is left empty: replies come from the server.
    pub fn reply(&self, command: impl Into<String>, content: impl Into<Value>) -> Self {
        Self::new("", self.address.clone(), command, content)
    }

    /// Encodes this message as one complete frame.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let fields = [
            Value::from(self.version),
            Value::Str(self.sender.clone()),
            Value::Str(self.address.clone()),
            Value::Str(self.command.clone()),
        ];
        Ok(serial::encode_list(fields.iter().chain([&self.content]))?)
    }

    /// Decodes one complete frame.
    ///
    /// Anything that is not a well-formed message of the current version
    /// is an error. The caller discards it; nothing is half-filled.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value = serial::decode(bytes)?;
        let fields = value.as_seq().ok_or_else(|| {
            ProtocolError::InvalidMessage(format!(
                "expected a sequence, got {}",
                value.kind()
            ))
        })?;
        let [version, sender, address, command, content] = fields else {
            return Err(ProtocolError::InvalidMessage(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        };

        let version = match version.as_i64() {
            Some(v) if v == i64::from(PROTOCOL_VERSION) => PROTOCOL_VERSION,
            _ => {
                return Err(ProtocolError::VersionMismatch {
                    expected: PROTOCOL_VERSION,
                    found: describe(version),
                });
            }
        };

        Ok(Self {
            version,
            sender: string_field("sender", sender)?,
            address: string_field("address", address)?,
            command: string_field("command", command)?,
            content: content.clone(),
        })
    }
}

fn string_field(name: &str, value: &Value) -> Result<String, ProtocolError> {
    value.as_str().map(str::to_string).ok_or_else(|| {
        ProtocolError::InvalidMessage(format!(
            "{name} must be a string, got {}",
            value.kind()
        ))
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Str(s) => format!("{s:?}"),
        other => other.kind().to_string(),
    }
}
