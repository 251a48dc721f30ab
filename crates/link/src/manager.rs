//! Broker link lifecycle: backoff-gated connect attempts, presence
//! announcement, subscription re-establishment.
//!
//! ## State machine
//!
//! ```text
//! Disconnected ──[attempt ok]──────────────▶ Connected
//!      │                                        │
//!  [attempt failed]                   [liveness lost, noticed lazily]
//!      ▼                                        │
//!   Backoff ──[deadline reached, attempt ok]──▶ │
//!      ▲  │                                     ▼
//!      └──┘ [attempt failed: delay doubles] Disconnected (backoff reset)
//! ```

use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::clock::{deadline_reached, Millis};
use crate::topics::ONLINE;
use crate::transport::{ConnectSpec, Inbound, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Backoff,
    Connected,
}

/// Outcome of one [`ConnectionManager::ensure_connected`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Already connected before this call.
    Online,
    /// A new session came up during this call.  Callers owning retained
    /// state must republish it.
    Established,
    /// Not connected (attempt failed or still waiting out the backoff).
    Offline,
}

/// Best-effort publishing, implemented by the connection manager.  Messages
/// offered while offline are dropped, never queued.
pub trait Publish {
    fn is_online(&self) -> bool;

    /// Returns `false` when the message was dropped.
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> bool;
}

pub struct ConnectionManager<T> {
    transport: T,
    spec: ConnectSpec,
    subscriptions: Vec<String>,
    phase: Phase,
    backoff: Backoff,
    /// `None` when disarmed: the next call may attempt immediately.
    next_attempt_at: Option<Millis>,
}

impl<T: Transport> ConnectionManager<T> {
    /// `subscriptions` are (re-)established after every successful connect;
    /// a telemetry-only node passes none.
    pub fn new(transport: T, spec: ConnectSpec, backoff: Backoff, subscriptions: Vec<String>) -> Self {
        Self {
            transport,
            spec,
            subscriptions,
            phase: Phase::Disconnected,
            backoff,
            next_attempt_at: None,
        }
    }

    /// Reconnect if needed and allowed.  Connect failures are absorbed into
    /// the backoff state, never returned.
    pub async fn ensure_connected(&mut self, now: Millis) -> LinkStatus {
        if self.transport.is_connected() {
            self.phase = Phase::Connected;
            return LinkStatus::Online;
        }

        if self.phase == Phase::Connected {
            warn!(client_id = %self.spec.client_id, "broker link lost");
            self.phase = Phase::Disconnected;
            self.backoff.reset();
            self.next_attempt_at = None;
        }

        if let Some(at) = self.next_attempt_at {
            if !deadline_reached(now, at) {
                return LinkStatus::Offline;
            }
        }

        match self.transport.connect(&self.spec).await {
            Ok(()) => {
                self.on_connected();
                LinkStatus::Established
            }
            Err(e) => {
                let delay = self.backoff.next_delay();
                self.next_attempt_at = Some(now.wrapping_add(delay));
                self.phase = Phase::Backoff;
                warn!(retry_in_ms = delay, "mqtt connect failed: {e:#}");
                LinkStatus::Offline
            }
        }
    }

    fn on_connected(&mut self) {
        self.phase = Phase::Connected;
        self.backoff.reset();
        self.next_attempt_at = None;
        info!(client_id = %self.spec.client_id, "mqtt connected");

        // The offline half is the broker-held will; the online half is ours.
        let presence = self.spec.will.topic.clone();
        if let Err(e) = self
            .transport
            .publish(&presence, ONLINE.as_bytes().to_vec(), true)
        {
            warn!(topic = %presence, "presence publish failed: {e:#}");
        }

        for topic in &self.subscriptions {
            match self.transport.subscribe(topic) {
                Ok(()) => info!(%topic, "subscribed"),
                Err(e) => warn!(%topic, "subscribe failed: {e:#}"),
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Messages received since the last call; empty while disconnected.
    pub fn pump_inbound(&mut self) -> Vec<Inbound> {
        if !self.transport.is_connected() {
            return Vec::new();
        }
        self.transport.drain_inbound()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Delay the next failed attempt will wait.
    pub fn backoff_ms(&self) -> u32 {
        self.backoff.current_ms()
    }

    pub fn next_attempt_at(&self) -> Option<Millis> {
        self.next_attempt_at
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

impl<T: Transport> Publish for ConnectionManager<T> {
    fn is_online(&self) -> bool {
        self.transport.is_connected()
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> bool {
        if !self.transport.is_connected() {
            debug!(%topic, "offline, publish dropped");
            return false;
        }
        match self.transport.publish(topic, payload, retain) {
            Ok(()) => true,
            Err(e) => {
                warn!(%topic, "publish dropped: {e:#}");
                false
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use crate::topics::{Topics, OFFLINE};
    use crate::transport::LastWill;
    use std::time::Duration;

    fn spec() -> ConnectSpec {
        let topics = Topics::for_node("vermilinks", "esp32a");
        ConnectSpec {
            client_id: "vermilinks-esp32a-B827EB12AB34".into(),
            credentials: None,
            keep_alive: Duration::from_secs(15),
            will: LastWill {
                topic: topics.presence,
                payload: OFFLINE.into(),
                retain: true,
            },
        }
    }

    fn manager(transport: MockTransport) -> ConnectionManager<MockTransport> {
        ConnectionManager::new(
            transport,
            spec(),
            Backoff::default(),
            vec!["vermilinks/esp32a/command".into()],
        )
    }

    fn refusing() -> ConnectionManager<MockTransport> {
        let mut t = MockTransport::default();
        t.refuse = true;
        manager(t)
    }

    // -- Connect / backoff ---------------------------------------------------------

    #[tokio::test]
    async fn first_call_attempts_immediately() {
        let mut m = manager(MockTransport::default());
        assert_eq!(m.phase(), Phase::Disconnected);
        assert_eq!(m.ensure_connected(0).await, LinkStatus::Established);
        assert_eq!(m.phase(), Phase::Connected);
        assert_eq!(m.transport().attempts.len(), 1);
    }

    #[tokio::test]
    async fn backoff_sequence_is_exact() {
        let mut m = refusing();
        let mut now: Millis = 0;
        let mut delays = Vec::new();
        for _ in 0..8 {
            assert_eq!(m.ensure_connected(now).await, LinkStatus::Offline);
            let at = m.next_attempt_at().unwrap();
            delays.push(at.wrapping_sub(now));
            now = at;
        }
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
        assert_eq!(m.phase(), Phase::Backoff);
        assert_eq!(m.transport().attempts.len(), 8);
    }

    #[tokio::test]
    async fn no_attempt_before_deadline() {
        let mut m = refusing();
        m.ensure_connected(0).await;
        m.ensure_connected(1).await;
        m.ensure_connected(500).await;
        m.ensure_connected(999).await;
        assert_eq!(m.transport().attempts.len(), 1);
        m.ensure_connected(1000).await;
        assert_eq!(m.transport().attempts.len(), 2);
    }

    #[tokio::test]
    async fn backoff_deadline_across_counter_wrap() {
        let mut m = refusing();
        let start = u32::MAX - 300;
        m.ensure_connected(start).await;
        assert_eq!(m.next_attempt_at(), Some(699));
        m.ensure_connected(u32::MAX).await;
        m.ensure_connected(10).await;
        assert_eq!(m.transport().attempts.len(), 1);
        m.ensure_connected(699).await;
        assert_eq!(m.transport().attempts.len(), 2);
    }

    #[tokio::test]
    async fn success_resets_backoff() {
        let mut m = refusing();
        let mut now: Millis = 0;
        for _ in 0..6 {
            m.ensure_connected(now).await;
            now = m.next_attempt_at().unwrap();
        }
        assert_eq!(m.backoff_ms(), 30000);

        m.transport_mut().refuse = false;
        assert_eq!(m.ensure_connected(now).await, LinkStatus::Established);
        assert_eq!(m.backoff_ms(), 1000);
        assert_eq!(m.next_attempt_at(), None);
    }

    #[tokio::test]
    async fn connected_calls_do_not_reconnect() {
        let mut m = manager(MockTransport::default());
        m.ensure_connected(0).await;
        assert_eq!(m.ensure_connected(10).await, LinkStatus::Online);
        assert_eq!(m.ensure_connected(20).await, LinkStatus::Online);
        assert_eq!(m.transport().attempts.len(), 1);
    }

    #[tokio::test]
    async fn lost_link_restarts_from_initial_backoff() {
        let mut m = refusing();
        let mut now: Millis = 0;
        for _ in 0..4 {
            m.ensure_connected(now).await;
            now = m.next_attempt_at().unwrap();
        }
        m.transport_mut().refuse = false;
        m.ensure_connected(now).await;

        m.transport_mut().drop_link();
        m.transport_mut().refuse = true;
        // Reconnect is attempted straight away, then waits 1000 ms.
        assert_eq!(m.ensure_connected(now + 5).await, LinkStatus::Offline);
        assert_eq!(m.transport().attempts.len(), 6);
        assert_eq!(m.next_attempt_at(), Some(now + 5 + 1000));
    }

    #[tokio::test]
    async fn reconnect_reports_established_again() {
        let mut m = manager(MockTransport::default());
        assert_eq!(m.ensure_connected(0).await, LinkStatus::Established);
        m.transport_mut().drop_link();
        assert!(!m.is_connected());
        assert_eq!(m.ensure_connected(100).await, LinkStatus::Established);
    }

    // -- Handshake contents ----------------------------------------------------------

    #[tokio::test]
    async fn connect_carries_retained_offline_will() {
        let mut m = manager(MockTransport::default());
        m.ensure_connected(0).await;
        let will = &m.transport().attempts[0].will;
        assert_eq!(will.topic, "vermilinks/device_status/esp32a");
        assert_eq!(will.payload, "offline");
        assert!(will.retain);
    }

    #[tokio::test]
    async fn connect_announces_online_retained() {
        let mut m = manager(MockTransport::default());
        m.ensure_connected(0).await;
        let sent = &m.transport().published;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].topic, "vermilinks/device_status/esp32a");
        assert_eq!(sent[0].payload, b"online");
        assert!(sent[0].retain);
    }

    #[tokio::test]
    async fn every_connect_resubscribes() {
        let mut m = manager(MockTransport::default());
        m.ensure_connected(0).await;
        m.transport_mut().drop_link();
        m.ensure_connected(50).await;
        assert_eq!(
            m.transport().subscriptions,
            vec!["vermilinks/esp32a/command", "vermilinks/esp32a/command"]
        );
    }

    #[tokio::test]
    async fn telemetry_node_subscribes_nothing() {
        let mut m = ConnectionManager::new(
            MockTransport::default(),
            spec(),
            Backoff::default(),
            Vec::new(),
        );
        m.ensure_connected(0).await;
        assert!(m.transport().subscriptions.is_empty());
    }

    // -- Inbound / publish ------------------------------------------------------------

    #[tokio::test]
    async fn pump_inbound_is_noop_while_disconnected() {
        let mut m = manager(MockTransport::default());
        m.transport_mut().push_inbound("vermilinks/esp32a/command", b"{}");
        assert!(m.pump_inbound().is_empty());
    }

    #[tokio::test]
    async fn pump_inbound_drains_buffer() {
        let mut m = manager(MockTransport::default());
        m.ensure_connected(0).await;
        m.transport_mut().push_inbound("vermilinks/esp32a/command", b"a");
        m.transport_mut().push_inbound("vermilinks/esp32a/command", b"b");
        let msgs = m.pump_inbound();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].payload, b"a");
        assert!(m.pump_inbound().is_empty());
    }

    #[tokio::test]
    async fn publish_while_offline_is_dropped() {
        let mut m = manager(MockTransport::default());
        assert!(!m.is_online());
        assert!(!m.publish("vermilinks/esp32a/status", b"{}".to_vec(), false));
        assert!(m.transport().published.is_empty());
    }

    #[tokio::test]
    async fn publish_while_online_goes_out() {
        let mut m = manager(MockTransport::default());
        m.ensure_connected(0).await;
        assert!(m.publish("vermilinks/esp32a/status", b"{}".to_vec(), false));
        let last = m.transport().published.last().unwrap();
        assert_eq!(last.topic, "vermilinks/esp32a/status");
        assert!(!last.retain);
    }
}
