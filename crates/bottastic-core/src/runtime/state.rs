use bottastic_types::config::RuntimeConfig;
use bottastic_types::node::{NodeRecord, UserInfo};

/// Lifecycle of a bot instance.
///
/// `Constructed → Registered → AwaitingConnection → Ready → Closed`. A closed
/// bot never leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Constructed,
    /// In the dispatch registry; scheduler not started.
    Registered,
    /// Scheduler running; waiting for the connection to come up.
    AwaitingConnection,
    /// Self-identity known and `on_initialized` finished; packets are routed.
    Ready,
    Closed,
}

/// Echo logging switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoFlags {
    /// Log each message the bot sends.
    pub sent: bool,
    /// Log each text message routed to the bot.
    pub received: bool,
}

impl EchoFlags {
    pub fn new(sent: bool, received: bool) -> Self {
        Self { sent, received }
    }

    /// Delivery confirmations are only logged when both directions echo.
    pub fn delivery(self) -> bool {
        self.sent && self.received
    }
}

impl From<&RuntimeConfig> for EchoFlags {
    fn from(config: &RuntimeConfig) -> Self {
        Self::new(config.echo_sent, config.echo_received)
    }
}

/// The bot's own node, resolved once when the connection comes up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfIdentity {
    pub node: NodeRecord,
    pub user: UserInfo,
}
