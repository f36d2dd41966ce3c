use serde::Deserialize;

/// How an inbound message asks to be routed.
///
/// The wire carries a free-form string; only `"private"` selects private
/// delivery. Everything else - `"public"`, an unrecognized value, or a
/// missing field - is a broadcast, matching the relay's original contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MessageKind {
    Private,
    #[default]
    Public,
}

impl From<String> for MessageKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "private" => Self::Private,
            _ => Self::Public,
        }
    }
}

/// One decoded inbound frame. Transient: exists only for the duration of a
/// single routing decision, never persisted.
///
/// `from` is sender-asserted and relayed as-is; the verified identity binds
/// the connection's registry entry, not the payloads it emits.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub content: String,
}

impl InboundMessage {
    /// Outbound payload for a broadcast delivery
    pub fn public_payload(&self) -> String {
        format!("{}: {}", self.from, self.content)
    }

    /// Outbound payload for a private delivery
    pub fn private_payload(&self) -> String {
        format!("[Private] {}: {}", self.from, self.content)
    }
}
