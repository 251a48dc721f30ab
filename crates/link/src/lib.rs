//! Broker connectivity shared by the vermilinks field nodes: a reconnecting
//! MQTT link with bounded backoff, presence announcement via last will, and
//! the periodic status report.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod identity;
pub mod manager;
pub mod mqtt;
pub mod status;
pub mod topics;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::Backoff;
pub use clock::{Cadence, Millis, MonotonicClock};
pub use config::MqttConfig;
pub use manager::{ConnectionManager, LinkStatus, Phase, Publish};
pub use mqtt::MqttTransport;
pub use topics::Topics;
pub use transport::{ConnectSpec, Inbound, LastWill, Transport};

/// Connect handshake for `node_id`: hardware-derived client id, credentials,
/// and the retained "offline" will on the presence topic.
pub fn connect_spec(cfg: &MqttConfig, topics: &Topics, node_id: &str, hw_id: &str) -> ConnectSpec {
    ConnectSpec {
        client_id: identity::client_id(&cfg.topic_prefix, node_id, hw_id),
        credentials: cfg.credentials(),
        keep_alive: cfg.keep_alive(),
        will: LastWill {
            topic: topics.presence.clone(),
            payload: topics::OFFLINE.to_string(),
            retain: true,
        },
    }
}
