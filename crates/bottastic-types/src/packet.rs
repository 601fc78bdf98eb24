//! Inbound packet types.
//!
//! Packets are decoded once, at the transport boundary, into a `MeshPacket`
//! whose `kind` says what the payload is. The runtime only ever inspects the
//! typed form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::NodeNum;

/// Application port a payload is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortNum {
    /// UTF-8 text messages.
    TextMessage,
    /// Routing control (acks, naks).
    Routing,
    /// Any other application port, by number.
    Other(u32),
}

/// What a packet carries once decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PacketKind {
    /// A text message.
    Text { text: String },
    /// A decoded payload on a non-text port.
    Data { port: PortNum, payload: Vec<u8> },
    /// A payload this node could not decrypt.
    Encrypted,
}

impl PacketKind {
    /// Decode a raw payload by its port. Text-port payloads that are not
    /// valid UTF-8 stay as opaque data.
    pub fn decode(port: PortNum, payload: Vec<u8>) -> Self {
        if port == PortNum::TextMessage {
            match String::from_utf8(payload) {
                Ok(text) => Self::Text { text },
                Err(err) => Self::Data {
                    port,
                    payload: err.into_bytes(),
                },
            }
        } else {
            Self::Data { port, payload }
        }
    }
}

/// A packet received from the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshPacket {
    pub from: NodeNum,
    pub to: NodeNum,
    /// Textual sender id when the transport supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    pub rx_time: DateTime<Utc>,
    pub kind: PacketKind,
}

impl MeshPacket {
    pub fn new(from: NodeNum, to: NodeNum, kind: PacketKind) -> Self {
        Self {
            from,
            to,
            from_id: None,
            rx_time: Utc::now(),
            kind,
        }
    }

    /// Build a text packet.
    pub fn text(from: NodeNum, to: NodeNum, text: impl Into<String>) -> Self {
        Self::new(from, to, PacketKind::Text { text: text.into() })
    }

    /// The decoded text payload, if this is a text message.
    pub fn text_payload(&self) -> Option<&str> {
        match &self.kind {
            PacketKind::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Sender label for log lines: the textual id if known, else the number.
    pub fn sender_label(&self) -> String {
        self.from_id
            .clone()
            .unwrap_or_else(|| self.from.to_node_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_text_port_yields_text() {
        let kind = PacketKind::decode(PortNum::TextMessage, b"ping".to_vec());
        assert_eq!(kind, PacketKind::Text { text: "ping".into() });
    }

    #[test]
    fn decode_invalid_utf8_stays_data() {
        let kind = PacketKind::decode(PortNum::TextMessage, vec![0xff, 0xfe]);
        assert!(matches!(kind, PacketKind::Data { port: PortNum::TextMessage, .. }));
    }

    #[test]
    fn decode_other_port_yields_data() {
        let kind = PacketKind::decode(PortNum::Other(67), vec![1, 2, 3]);
        assert!(matches!(kind, PacketKind::Data { port: PortNum::Other(67), .. }));
    }

    #[test]
    fn text_payload_only_for_text_packets() {
        let text = MeshPacket::text(NodeNum(7), NodeNum::BROADCAST, "hi");
        assert_eq!(text.text_payload(), Some("hi"));

        let encrypted = MeshPacket::new(NodeNum(7), NodeNum(42), PacketKind::Encrypted);
        assert_eq!(encrypted.text_payload(), None);
    }

    #[test]
    fn sender_label_prefers_textual_id() {
        let mut packet = MeshPacket::text(NodeNum(7), NodeNum(42), "hi");
        assert_eq!(packet.sender_label(), "!00000007");

        packet.from_id = Some("!cafe0007".into());
        assert_eq!(packet.sender_label(), "!cafe0007");
    }

    #[test]
    fn packet_kind_json_is_tagged() {
        let packet = MeshPacket::text(NodeNum(7), NodeNum(42), "ping");
        let json = serde_json::to_string(&packet).unwrap();
        assert!(json.contains(r#""type":"text""#));
        assert!(!json.contains("from_id"));
    }
}
