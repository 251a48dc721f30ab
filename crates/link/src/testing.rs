//! In-memory doubles for exercising the link and the nodes without a broker.

use anyhow::{bail, Result};
use std::collections::VecDeque;

use crate::manager::Publish;
use crate::transport::{ConnectSpec, Inbound, Transport};

/// One recorded publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl Published {
    /// Payload parsed as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Scriptable broker link.  Connects succeed unless `refuse` is set.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub refuse: bool,
    pub connected: bool,
    pub attempts: Vec<ConnectSpec>,
    pub published: Vec<Published>,
    pub subscriptions: Vec<String>,
    pub inbound: VecDeque<Inbound>,
}

impl MockTransport {
    /// Simulate the broker side closing the session.
    pub fn drop_link(&mut self) {
        self.connected = false;
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(Inbound {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Publishes on `topic`, oldest first.
    pub fn published_on(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self, spec: &ConnectSpec) -> Result<()> {
        self.attempts.push(spec.clone());
        if self.refuse {
            bail!("connection refused");
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        if !self.connected {
            bail!("not connected");
        }
        self.published.push(Published {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<()> {
        if !self.connected {
            bail!("not connected");
        }
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn drain_inbound(&mut self) -> Vec<Inbound> {
        self.inbound.drain(..).collect()
    }
}

/// A [`Publish`] sink that records everything offered while online.
#[derive(Debug)]
pub struct RecordingPublisher {
    pub online: bool,
    pub sent: Vec<Published>,
}

impl RecordingPublisher {
    pub fn online() -> Self {
        Self {
            online: true,
            sent: Vec::new(),
        }
    }

    pub fn offline() -> Self {
        Self {
            online: false,
            sent: Vec::new(),
        }
    }
}

impl Publish for RecordingPublisher {
    fn is_online(&self) -> bool {
        self.online
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> bool {
        if !self.online {
            return false;
        }
        self.sent.push(Published {
            topic: topic.to_string(),
            payload,
            retain,
        });
        true
    }
}
