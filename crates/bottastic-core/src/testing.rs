//! In-memory transport for tests.
//!
//! `RecordingTransport` answers identity and directory queries from memory
//! and records every send instead of putting it on air. Downstream crates
//! enable it with the `test-util` feature.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bottastic_types::error::TransportError;
use bottastic_types::event::ConnectionId;
use bottastic_types::node::{Destination, NodeNum, NodeRecord, PublicKey, UserInfo};
use bottastic_types::packet::{MeshPacket, PacketKind, PortNum};
use bottastic_types::send::SendOptions;

use crate::transport::MeshTransport;

/// One call to [`MeshTransport::send_data`], minus the callback itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSend {
    pub payload: Vec<u8>,
    pub destination: Destination,
    pub want_ack: bool,
    pub want_response: bool,
    pub pki_encrypted: bool,
    pub public_key: Option<PublicKey>,
    pub port: PortNum,
    pub had_callback: bool,
}

impl RecordedSend {
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

#[derive(Default)]
struct Recorded {
    sends: Vec<RecordedSend>,
    nodes: HashMap<NodeNum, NodeRecord>,
    send_failure: Option<TransportError>,
    identity_fails: bool,
    identity_fetches: usize,
    answer_responses: bool,
    responses_answered: usize,
    closed: bool,
}

pub struct RecordingTransport {
    id: ConnectionId,
    my_num: NodeNum,
    state: Mutex<Recorded>,
}

impl RecordingTransport {
    /// A transport whose local node is `my_num`.
    pub fn new(my_num: NodeNum) -> Self {
        let transport = Self {
            id: ConnectionId::new(),
            my_num,
            state: Mutex::new(Recorded::default()),
        };
        transport.add_node(NodeRecord::new(my_num, Some(Self::user_for(my_num))));
        transport
    }

    pub fn with_node(self, record: NodeRecord) -> Self {
        self.add_node(record);
        self
    }

    pub fn add_node(&self, record: NodeRecord) {
        self.lock().nodes.insert(record.num, record);
    }

    pub fn sends(&self) -> Vec<RecordedSend> {
        self.lock().sends.clone()
    }

    /// Make every following send fail with `error`, or succeed again on `None`.
    pub fn fail_sends(&self, error: Option<TransportError>) {
        self.lock().send_failure = error;
    }

    pub fn fail_identity(&self, fail: bool) {
        self.lock().identity_fails = fail;
    }

    /// Number of `my_node_info` calls so far.
    pub fn identity_fetches(&self) -> usize {
        self.lock().identity_fetches
    }

    /// Invoke `on_response` synchronously with a routing ack on every send
    /// that registers one.
    pub fn answer_responses(&self, answer: bool) {
        self.lock().answer_responses = answer;
    }

    /// Number of `on_response` callbacks invoked so far.
    pub fn responses_answered(&self) -> usize {
        self.lock().responses_answered
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn user_for(num: NodeNum) -> UserInfo {
        UserInfo {
            id: num.to_node_id(),
            long_name: format!("Node {}", num.0),
            short_name: format!("{:04x}", num.0 & 0xffff),
            public_key: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MeshTransport for RecordingTransport {
    fn connection_id(&self) -> ConnectionId {
        self.id
    }

    fn send_data(
        &self,
        payload: Vec<u8>,
        destination: Destination,
        options: SendOptions,
    ) -> Result<(), TransportError> {
        let callback = {
            let mut state = self.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            if let Some(error) = state.send_failure.clone() {
                return Err(error);
            }
            state.sends.push(RecordedSend {
                payload,
                destination,
                want_ack: options.want_ack,
                want_response: options.want_response,
                pki_encrypted: options.pki_encrypted,
                public_key: options.public_key,
                port: options.port,
                had_callback: options.on_response.is_some(),
            });
            options.on_response.filter(|_| state.answer_responses)
        };

        // Outside the lock: the callback may query the transport.
        if let Some(callback) = callback {
            let ack = MeshPacket::new(
                destination.num(),
                self.my_num,
                PacketKind::Data {
                    port: PortNum::Routing,
                    payload: Vec::new(),
                },
            );
            callback(ack);
            self.lock().responses_answered += 1;
        }
        Ok(())
    }

    fn my_node_info(&self) -> Result<NodeRecord, TransportError> {
        let mut state = self.lock();
        state.identity_fetches += 1;
        if state.identity_fails {
            return Err(TransportError::NotConnected);
        }
        state
            .nodes
            .get(&self.my_num)
            .cloned()
            .ok_or(TransportError::NotConnected)
    }

    fn my_user(&self) -> Result<UserInfo, TransportError> {
        let state = self.lock();
        if state.identity_fails {
            return Err(TransportError::NotConnected);
        }
        Ok(state
            .nodes
            .get(&self.my_num)
            .and_then(|record| record.user.clone())
            .unwrap_or_else(|| Self::user_for(self.my_num)))
    }

    fn node(&self, num: NodeNum) -> Option<NodeRecord> {
        self.lock().nodes.get(&num).cloned()
    }

    fn close(&self) -> Result<(), TransportError> {
        self.lock().closed = true;
        Ok(())
    }
}

/// Captures this test binary's log output so echo lines can be asserted on.
///
/// Callbacks run on worker threads, so the subscriber is process-wide rather
/// than scoped to the test's thread. Tests share the buffer and must use
/// distinct message texts.
#[cfg(test)]
pub(crate) mod echo_capture {
    use std::io;
    use std::sync::{Mutex, Once, PoisonError};

    use crate::delivery::ECHO_TARGET;

    static CAPTURED: Mutex<Vec<u8>> = Mutex::new(Vec::new());
    static INSTALL: Once = Once::new();

    struct CaptureWriter;

    impl io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            CAPTURED
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn install() {
        INSTALL.call_once(|| {
            let subscriber = tracing_subscriber::fmt()
                .with_writer(|| CaptureWriter)
                .with_ansi(false)
                .without_time()
                .with_max_level(tracing::Level::INFO)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        });
    }

    /// Echo lines logged so far, across all tests.
    pub(crate) fn echo_lines() -> Vec<String> {
        let captured = CAPTURED.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&captured)
            .lines()
            .filter(|line| line.contains(ECHO_TARGET))
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn logged(line_ending: &str) -> bool {
        echo_lines().iter().any(|line| line.ends_with(line_ending))
    }
}
