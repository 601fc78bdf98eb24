//! Answers "ping" with "pong!".

use bottastic_core::{Bot, BotContext, Node};
use tracing::info;

/// Replies to a case-insensitive "ping".
///
/// Broadcast pings get a broadcast reply. Direct pings get an encrypted
/// direct reply, so a sender whose public key is unknown gets none.
#[derive(Debug, Default)]
pub struct PingPongBot;

fn is_ping(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("ping")
}

fn reply_for(from: &Node) -> String {
    match from.long_name() {
        Some(name) => format!("pong! hello, {name}"),
        None => "pong!".to_string(),
    }
}

impl Bot for PingPongBot {
    fn name(&self) -> &str {
        "ping-pong"
    }

    async fn on_initialized(&self, ctx: &BotContext) -> anyhow::Result<()> {
        if let Some(identity) = ctx.identity() {
            info!(node = %identity.node.num, name = %identity.user.long_name, "ping-pong bot listening");
        }
        Ok(())
    }

    async fn handle_broadcast_message(
        &self,
        ctx: &BotContext,
        from: Node,
        text: String,
    ) -> anyhow::Result<()> {
        if is_ping(&text) {
            ctx.send(&reply_for(&from), false).await?;
        }
        Ok(())
    }

    async fn handle_direct_message(
        &self,
        _ctx: &BotContext,
        from: Node,
        text: String,
    ) -> anyhow::Result<()> {
        if is_ping(&text) {
            from.send(&reply_for(&from), true, false).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bottastic_core::testing::RecordingTransport;
    use bottastic_core::{BotOptions, BotRuntime, Connection, DispatchRegistry, WorkerPool};
    use bottastic_types::error::SendError;
    use bottastic_types::node::{Destination, NodeNum, NodeRecord, UserInfo};

    const PEER: NodeNum = NodeNum(7);

    fn peer(long_name: &str, public_key: Option<&str>) -> NodeRecord {
        NodeRecord::new(
            PEER,
            Some(UserInfo {
                id: PEER.to_node_id(),
                long_name: long_name.into(),
                short_name: "P".into(),
                public_key: public_key.map(str::to_string),
            }),
        )
    }

    fn context(transport: &Arc<RecordingTransport>) -> BotContext {
        BotRuntime::new(
            PingPongBot,
            Connection::from(Arc::clone(transport)),
            &DispatchRegistry::new(),
            BotOptions::default().with_pool(WorkerPool::new(1)),
        )
        .handle()
    }

    #[test]
    fn ping_matching_ignores_case_and_whitespace() {
        assert!(is_ping("ping"));
        assert!(is_ping("  PiNg \n"));
        assert!(!is_ping("ping pong"));
        assert!(!is_ping(""));
    }

    #[tokio::test]
    async fn broadcast_ping_from_unknown_node_gets_plain_pong() {
        let transport = Arc::new(RecordingTransport::new(NodeNum(42)));
        let ctx = context(&transport);

        PingPongBot
            .handle_broadcast_message(&ctx, ctx.node(PEER), " PING ".into())
            .await
            .unwrap();

        let sends = transport.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].destination, Destination::Broadcast);
        assert_eq!(sends[0].text(), Some("pong!"));
    }

    #[tokio::test]
    async fn broadcast_ping_greets_known_node() {
        let transport =
            Arc::new(RecordingTransport::new(NodeNum(42)).with_node(peer("Alice", None)));
        let ctx = context(&transport);

        PingPongBot
            .handle_broadcast_message(&ctx, ctx.node(PEER), "ping".into())
            .await
            .unwrap();

        assert_eq!(transport.sends()[0].text(), Some("pong! hello, Alice"));
    }

    #[tokio::test]
    async fn other_text_is_ignored() {
        let transport = Arc::new(RecordingTransport::new(NodeNum(42)));
        let ctx = context(&transport);

        PingPongBot
            .handle_broadcast_message(&ctx, ctx.node(PEER), "hello".into())
            .await
            .unwrap();
        PingPongBot
            .handle_direct_message(&ctx, ctx.node(PEER), "hello".into())
            .await
            .unwrap();

        assert!(transport.sends().is_empty());
    }

    #[tokio::test]
    async fn direct_ping_replies_encrypted() {
        let transport =
            Arc::new(RecordingTransport::new(NodeNum(42)).with_node(peer("Alice", Some("AQID"))));
        let ctx = context(&transport);

        PingPongBot
            .handle_direct_message(&ctx, ctx.node(PEER), "ping".into())
            .await
            .unwrap();

        let sent = &transport.sends()[0];
        assert_eq!(sent.destination, Destination::Node { num: PEER });
        assert!(sent.pki_encrypted);
        assert_eq!(sent.text(), Some("pong! hello, Alice"));
    }

    #[tokio::test]
    async fn direct_ping_without_key_is_refused() {
        let transport =
            Arc::new(RecordingTransport::new(NodeNum(42)).with_node(peer("Alice", None)));
        let ctx = context(&transport);

        let err = PingPongBot
            .handle_direct_message(&ctx, ctx.node(PEER), "ping".into())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SendError>(),
            Some(SendError::EncryptionKeyUnavailable(_))
        ));
        assert!(transport.sends().is_empty());
    }
}
