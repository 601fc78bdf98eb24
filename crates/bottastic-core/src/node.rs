//! Handle for a remote node, as seen from one bot's connection.
//!
//! Attributes are read live from the transport's node directory on every
//! access; nothing is cached. A node the transport has not heard from yet
//! simply reports no attributes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bottastic_types::error::SendError;
use bottastic_types::node::{NodeNum, NodeRecord, PublicKey, UserInfo};
use tracing::debug;

use crate::delivery::{self, TextMessage};
use crate::runtime::BotContext;

#[derive(Clone)]
pub struct Node {
    num: NodeNum,
    ctx: BotContext,
}

impl Node {
    pub(crate) fn new(ctx: BotContext, num: NodeNum) -> Self {
        Self { num, ctx }
    }

    pub fn num(&self) -> NodeNum {
        self.num
    }

    /// Current directory entry, if any.
    pub fn record(&self) -> Option<NodeRecord> {
        self.ctx.connection().transport().node(self.num)
    }

    /// Advertised user record, if any.
    pub fn user(&self) -> Option<UserInfo> {
        self.record().and_then(|record| record.user)
    }

    /// Textual node id the node advertises.
    pub fn identity(&self) -> Option<String> {
        self.user().map(|user| user.id).filter(|id| !id.is_empty())
    }

    pub fn short_name(&self) -> Option<String> {
        self.user()
            .map(|user| user.short_name)
            .filter(|name| !name.is_empty())
    }

    pub fn long_name(&self) -> Option<String> {
        self.user()
            .map(|user| user.long_name)
            .filter(|name| !name.is_empty())
    }

    /// Decoded public key. Empty or malformed keys count as absent.
    pub fn public_key(&self) -> Option<PublicKey> {
        let encoded = self.user()?.public_key?;
        if encoded.is_empty() {
            return None;
        }
        match STANDARD.decode(encoded.as_bytes()) {
            Ok(bytes) if !bytes.is_empty() => Some(PublicKey::new(bytes)),
            Ok(_) => None,
            Err(err) => {
                debug!(node = %self.num, "ignoring malformed public key: {err}");
                None
            }
        }
    }

    /// Send a direct text message to this node.
    ///
    /// With a known public key the message is PKI-encrypted. Without one it
    /// goes out unencrypted, unless `require_encryption` is set, in which
    /// case nothing is sent.
    pub async fn send(
        &self,
        text: &str,
        require_encryption: bool,
        want_response: bool,
    ) -> Result<(), SendError> {
        let public_key = self.public_key();
        if require_encryption && public_key.is_none() {
            return Err(SendError::EncryptionKeyUnavailable(self.num));
        }

        let recipient = self.identity().unwrap_or_else(|| self.num.to_node_id());
        delivery::send_text(
            self.ctx.connection(),
            self.ctx.pool(),
            self.ctx.echo(),
            TextMessage::direct(text, self.num, public_key, want_response, recipient),
        )
        .await
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.num == other.num && self.ctx.connection() == other.ctx.connection()
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("num", &self.num)
            .field("connection", &self.ctx.connection().id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bridge::WorkerPool;
    use crate::registry::DispatchRegistry;
    use crate::runtime::{Bot, BotOptions, BotRuntime};
    use crate::testing::RecordingTransport;
    use crate::transport::Connection;
    use bottastic_types::node::Destination;

    struct Idle;
    impl Bot for Idle {}

    const PEER: NodeNum = NodeNum(7);

    fn peer_record(public_key: Option<&str>) -> NodeRecord {
        NodeRecord::new(
            PEER,
            Some(UserInfo {
                id: "!00000007".into(),
                long_name: "Seven".into(),
                short_name: "".into(),
                public_key: public_key.map(str::to_string),
            }),
        )
    }

    fn context(transport: &Arc<RecordingTransport>) -> BotContext {
        let runtime = BotRuntime::new(
            Idle,
            Connection::from(Arc::clone(transport)),
            &DispatchRegistry::new(),
            BotOptions::default().with_pool(WorkerPool::new(1)),
        );
        runtime.handle()
    }

    #[test]
    fn unknown_node_has_no_attributes() {
        let transport = Arc::new(RecordingTransport::new(NodeNum(42)));
        let node = context(&transport).node(PEER);

        assert!(node.record().is_none());
        assert!(node.identity().is_none());
        assert!(node.long_name().is_none());
        assert!(node.public_key().is_none());
    }

    #[test]
    fn attributes_are_read_live() {
        let transport = Arc::new(RecordingTransport::new(NodeNum(42)));
        let node = context(&transport).node(PEER);
        assert!(node.long_name().is_none());

        transport.add_node(peer_record(None));
        assert_eq!(node.identity().as_deref(), Some("!00000007"));
        assert_eq!(node.long_name().as_deref(), Some("Seven"));
        // Empty strings count as absent.
        assert!(node.short_name().is_none());
    }

    #[test]
    fn public_key_is_base64_decoded() {
        let transport =
            Arc::new(RecordingTransport::new(NodeNum(42)).with_node(peer_record(Some("AQID"))));
        let node = context(&transport).node(PEER);

        assert_eq!(node.public_key(), Some(PublicKey::new(vec![1, 2, 3])));
    }

    #[test]
    fn empty_or_malformed_key_is_absent() {
        let transport = Arc::new(RecordingTransport::new(NodeNum(42)));
        let node = context(&transport).node(PEER);

        transport.add_node(peer_record(Some("")));
        assert!(node.public_key().is_none());
        transport.add_node(peer_record(Some("not base64!")));
        assert!(node.public_key().is_none());
    }

    #[tokio::test]
    async fn required_encryption_without_key_sends_nothing() {
        let transport =
            Arc::new(RecordingTransport::new(NodeNum(42)).with_node(peer_record(None)));
        let node = context(&transport).node(PEER);

        let result = node.send("secret", true, false).await;

        assert!(matches!(
            result,
            Err(SendError::EncryptionKeyUnavailable(num)) if num == PEER
        ));
        assert!(transport.sends().is_empty());
    }

    #[tokio::test]
    async fn missing_key_falls_back_to_plain_text() {
        let transport = Arc::new(RecordingTransport::new(NodeNum(42)));
        let node = context(&transport).node(PEER);

        node.send("hello", false, false).await.unwrap();

        let sends = transport.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].destination, Destination::Node { num: PEER });
        assert!(!sends[0].pki_encrypted);
        assert_eq!(sends[0].text(), Some("hello"));
    }

    #[tokio::test]
    async fn known_key_encrypts() {
        let transport =
            Arc::new(RecordingTransport::new(NodeNum(42)).with_node(peer_record(Some("AQID"))));
        let node = context(&transport).node(PEER);

        node.send("hello", true, true).await.unwrap();

        let sent = &transport.sends()[0];
        assert!(sent.pki_encrypted);
        assert_eq!(sent.public_key, Some(PublicKey::new(vec![1, 2, 3])));
        assert!(sent.want_ack);
    }

    #[test]
    fn nodes_compare_by_connection_and_number() {
        let transport = Arc::new(RecordingTransport::new(NodeNum(42)));
        let ctx = context(&transport);
        let other = context(&Arc::new(RecordingTransport::new(NodeNum(42))));

        assert_eq!(ctx.node(PEER), ctx.node(PEER));
        assert_ne!(ctx.node(PEER), ctx.node(NodeNum(8)));
        assert_ne!(ctx.node(PEER), other.node(PEER));
    }
}
