//! Outbound text delivery shared by broadcasts and direct messages.
//!
//! Text is sent as UTF-8 bytes on the text-message port. The blocking
//! transport send always runs on the worker pool.

use std::sync::Arc;

use bottastic_types::error::SendError;
use bottastic_types::node::{Destination, NodeNum, PublicKey};
use bottastic_types::packet::PortNum;
use bottastic_types::send::{ResponseCallback, SendOptions};
use tracing::info;

use crate::bridge::WorkerPool;
use crate::runtime::EchoFlags;
use crate::transport::Connection;

/// Log target for echo lines, so they can be filtered on their own.
pub const ECHO_TARGET: &str = "bottastic::echo";

/// One outbound text message.
#[derive(Debug, Clone)]
pub struct TextMessage {
    pub text: String,
    pub destination: Destination,
    /// Encrypt to this key when present.
    pub public_key: Option<PublicKey>,
    pub want_response: bool,
    /// Recipient label for echo lines; `None` for broadcasts.
    pub recipient: Option<String>,
}

impl TextMessage {
    pub fn broadcast(text: impl Into<String>, want_response: bool) -> Self {
        Self {
            text: text.into(),
            destination: Destination::Broadcast,
            public_key: None,
            want_response,
            recipient: None,
        }
    }

    pub fn direct(
        text: impl Into<String>,
        to: NodeNum,
        public_key: Option<PublicKey>,
        want_response: bool,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            destination: Destination::Node { num: to },
            public_key,
            want_response,
            recipient: Some(recipient.into()),
        }
    }

    /// Transport flags for this message.
    ///
    /// `want_response` asks for both a link-level ack and an application
    /// response.
    pub fn send_options(&self, on_response: Option<ResponseCallback>) -> SendOptions {
        SendOptions {
            want_ack: self.want_response,
            want_response: self.want_response,
            on_response,
            pki_encrypted: self.public_key.is_some(),
            public_key: self.public_key.clone(),
            port: PortNum::TextMessage,
        }
    }
}

/// Hand a text message to the transport and wait until it is accepted.
///
/// Transport failures are returned as-is; nothing is retried.
pub async fn send_text(
    connection: &Connection,
    pool: &WorkerPool,
    echo: EchoFlags,
    message: TextMessage,
) -> Result<(), SendError> {
    let on_response = message
        .want_response
        .then(|| delivery_echo(echo, &message));
    let options = message.send_options(on_response);
    let payload = message.text.as_bytes().to_vec();
    let destination = message.destination;

    let transport = Arc::clone(connection.transport());
    pool.run_transport::<_, _, SendError>(move || {
        transport.send_data(payload, destination, options)
    })
    .await?;

    if echo.sent {
        match &message.recipient {
            Some(recipient) => {
                let mode = if message.public_key.is_some() { "enc" } else { "no enc" };
                info!(target: ECHO_TARGET, "Sent to {recipient} ({mode}): {}", message.text);
            }
            None => info!(target: ECHO_TARGET, "Sent: {}", message.text),
        }
    }
    Ok(())
}

/// Response callback that echoes delivery when both echo flags are on.
fn delivery_echo(echo: EchoFlags, message: &TextMessage) -> ResponseCallback {
    let text = message.text.clone();
    let recipient = message.recipient.clone();
    Box::new(move |_response| {
        if !echo.delivery() {
            return;
        }
        match recipient {
            Some(recipient) => info!(target: ECHO_TARGET, "Delivered message to {recipient}: {text}"),
            None => info!(target: ECHO_TARGET, "Delivered message: {text}"),
        }
    })
}
