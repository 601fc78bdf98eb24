//! Node addressing and node directory types.
//!
//! Every participant on the mesh is addressed by a 32-bit node number. The
//! transport keeps a live directory of the nodes it has heard from, keyed by
//! that number, with the user record each node advertises.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric address of a node on the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeNum(pub u32);

impl NodeNum {
    /// Reserved target address meaning "all nodes".
    pub const BROADCAST: NodeNum = NodeNum(0xFFFF_FFFF);

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }

    /// The textual node id the firmware derives from the number (`!0000002a`).
    pub fn to_node_id(self) -> String {
        format!("!{:08x}", self.0)
    }
}

impl From<u32> for NodeNum {
    fn from(num: u32) -> Self {
        Self(num)
    }
}

impl fmt::Display for NodeNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            f.write_str("^all")
        } else {
            f.write_str(&self.to_node_id())
        }
    }
}

/// Where an outbound packet is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// Every node in radio range.
    Broadcast,
    /// One specific node.
    Node { num: NodeNum },
}

impl Destination {
    /// The address placed in the packet's `to` field.
    pub fn num(self) -> NodeNum {
        match self {
            Self::Broadcast => NodeNum::BROADCAST,
            Self::Node { num } => num,
        }
    }
}

/// Decoded public key of a node, used for PKI-encrypted direct messages.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({} bytes)", self.0.len())
    }
}

/// User record a node advertises about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Textual node id (e.g. `!0000002a`).
    pub id: String,
    pub long_name: String,
    pub short_name: String,
    /// Base64-encoded public key, if the node has published one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// One entry of the transport's node directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub num: NodeNum,
    /// Absent until the node's user record has been received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heard: Option<DateTime<Utc>>,
}

impl NodeRecord {
    pub fn new(num: NodeNum, user: Option<UserInfo>) -> Self {
        Self {
            num,
            user,
            last_heard: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_sentinel_is_distinct_from_real_nodes() {
        assert!(NodeNum::BROADCAST.is_broadcast());
        assert!(!NodeNum(42).is_broadcast());
        assert_eq!(Destination::Broadcast.num(), NodeNum::BROADCAST);
        assert_eq!(Destination::Node { num: NodeNum(7) }.num(), NodeNum(7));
    }

    #[test]
    fn node_id_formatting() {
        assert_eq!(NodeNum(42).to_node_id(), "!0000002a");
        assert_eq!(NodeNum(42).to_string(), "!0000002a");
        assert_eq!(NodeNum::BROADCAST.to_string(), "^all");
    }

    #[test]
    fn public_key_debug_hides_bytes() {
        let key = PublicKey::new(vec![1; 32]);
        assert_eq!(format!("{key:?}"), "PublicKey(32 bytes)");
    }

    #[test]
    fn node_record_without_user_omits_field() {
        let record = NodeRecord::new(NodeNum(7), None);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"num":7}"#);

        let parsed: NodeRecord = serde_json::from_str(&json).unwrap();
        assert!(parsed.user.is_none());
    }
}
