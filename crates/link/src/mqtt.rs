//! rumqttc-backed [`Transport`].
//!
//! Every connect builds a fresh `AsyncClient`/`EventLoop` pair, polls it to
//! `ConnAck` under a timeout, then hands the event loop to a driver task.
//! The driver forwards inbound publishes into a bounded buffer and exits on
//! the first error or broker disconnect, clearing the liveness flag.  It
//! never reconnects; the next attempt comes from the manager's backoff.

use anyhow::{anyhow, bail, Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill as MqttWill, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::MqttConfig;
use crate::transport::{ConnectSpec, Inbound, Transport};

/// Capacity of the request channel between `AsyncClient` and `EventLoop`.
const REQUEST_CAPACITY: usize = 20;

struct Session {
    client: AsyncClient,
    alive: Arc<AtomicBool>,
    inbound: mpsc::Receiver<Inbound>,
    driver: JoinHandle<()>,
}

pub struct MqttTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    inbound_capacity: usize,
    max_packet_size: usize,
    session: Option<Session>,
}

impl MqttTransport {
    pub fn new(cfg: &MqttConfig) -> Self {
        Self {
            host: cfg.host.clone(),
            port: cfg.port,
            connect_timeout: cfg.connect_timeout(),
            inbound_capacity: cfg.inbound_capacity,
            max_packet_size: cfg.max_packet_size,
            session: None,
        }
    }

    fn options(&self, spec: &ConnectSpec) -> MqttOptions {
        let mut opts = MqttOptions::new(spec.client_id.clone(), self.host.clone(), self.port);
        opts.set_keep_alive(spec.keep_alive);
        opts.set_clean_session(true);
        // An oversized inbound packet is a session-fatal error in rumqttc.
        opts.set_max_packet_size(self.max_packet_size, self.max_packet_size);
        if let Some((user, pass)) = &spec.credentials {
            opts.set_credentials(user.clone(), pass.clone());
        }
        opts.set_last_will(MqttWill::new(
            spec.will.topic.clone(),
            spec.will.payload.clone(),
            QoS::AtLeastOnce,
            spec.will.retain,
        ));
        opts
    }

    fn teardown(&mut self) {
        if let Some(old) = self.session.take() {
            old.alive.store(false, Ordering::Release);
            old.driver.abort();
        }
    }
}

impl Transport for MqttTransport {
    async fn connect(&mut self, spec: &ConnectSpec) -> Result<()> {
        self.teardown();

        let (client, mut eventloop) = AsyncClient::new(self.options(spec), REQUEST_CAPACITY);

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => {}
                    Err(e) => return Err(anyhow!(e)),
                }
            }
        };
        timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| anyhow!("connect timed out after {:?}", self.connect_timeout))?
            .with_context(|| format!("connect to {}:{} failed", self.host, self.port))?;

        let alive = Arc::new(AtomicBool::new(true));
        let (tx, inbound) = mpsc::channel(self.inbound_capacity);
        let driver = tokio::spawn(drive(eventloop, tx, Arc::clone(&alive)));

        self.session = Some(Session {
            client,
            alive,
            inbound,
            driver,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.alive.load(Ordering::Acquire))
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            bail!("not connected");
        };
        session
            .client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload)
            .with_context(|| format!("publish to {topic} failed"))
    }

    fn subscribe(&mut self, topic: &str) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            bail!("not connected");
        };
        session
            .client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .with_context(|| format!("subscribe to {topic} failed"))
    }

    fn drain_inbound(&mut self) -> Vec<Inbound> {
        let mut out = Vec::new();
        if let Some(session) = self.session.as_mut() {
            while let Ok(msg) = session.inbound.try_recv() {
                out.push(msg);
            }
        }
        out
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Pump one session's event loop until it dies.
async fn drive(mut eventloop: EventLoop, tx: mpsc::Sender<Inbound>, alive: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(p))) => {
                let msg = Inbound {
                    topic: p.topic.clone(),
                    payload: p.payload.to_vec(),
                };
                if tx.send(msg).await.is_err() {
                    break; // transport dropped
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("broker sent disconnect");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("mqtt session ended: {e}");
                break;
            }
        }
    }
    alive.store(false, Ordering::Release);
    debug!("mqtt driver stopped");
}

// ===========================================================================
// Tests
// ===========================================================================
