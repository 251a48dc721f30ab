use anyhow::Result;
use std::time::Duration;

/// A message received on a subscribed topic, buffered until the control loop
/// drains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Message the broker publishes on our behalf if the link drops uncleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Everything the connect handshake carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectSpec {
    pub client_id: String,
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    pub will: LastWill,
}

/// The broker link underneath [`ConnectionManager`](crate::ConnectionManager).
///
/// Implementations never retry on their own: a failed or lost connection
/// stays down until the manager calls [`Transport::connect`] again.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// One connect attempt, bounded by the implementation's connect timeout.
    async fn connect(&mut self, spec: &ConnectSpec) -> Result<()>;

    /// Liveness of the current session.
    fn is_connected(&self) -> bool;

    /// Queue a publish on the live session.
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()>;

    fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Take everything received since the last call.
    fn drain_inbound(&mut self) -> Vec<Inbound>;
}
