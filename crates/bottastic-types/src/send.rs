//! Outbound send options handed to the transport.

use std::fmt;

use crate::node::PublicKey;
use crate::packet::{MeshPacket, PortNum};

/// Callback the transport invokes, from its own thread, when a response to a
/// send arrives.
pub type ResponseCallback = Box<dyn FnOnce(MeshPacket) + Send + 'static>;

/// Per-send flags understood by the transport.
pub struct SendOptions {
    /// Ask for a link-level acknowledgement.
    pub want_ack: bool,
    /// Ask for an application-level response.
    pub want_response: bool,
    pub on_response: Option<ResponseCallback>,
    /// Encrypt the payload with `public_key`.
    pub pki_encrypted: bool,
    pub public_key: Option<PublicKey>,
    pub port: PortNum,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            want_ack: false,
            want_response: false,
            on_response: None,
            pki_encrypted: false,
            public_key: None,
            port: PortNum::TextMessage,
        }
    }
}

impl fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendOptions")
            .field("want_ack", &self.want_ack)
            .field("want_response", &self.want_response)
            .field("on_response", &self.on_response.is_some())
            .field("pki_encrypted", &self.pki_encrypted)
            .field("public_key", &self.public_key)
            .field("port", &self.port)
            .finish()
    }
}
