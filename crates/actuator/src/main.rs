mod command;
mod config;
mod controller;
mod float_switch;
mod outputs;
mod safety;
mod state;
mod sync;

use anyhow::Result;
use std::{env, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vermilinks_link::status::publish_status;
use vermilinks_link::{
    connect_spec, identity, Cadence, ConnectionManager, Millis, MonotonicClock, MqttTransport,
    Topics,
};

use controller::Controller;
use float_switch::FloatSwitch;
use outputs::OutputBank;

fn millis(ms: u64) -> Millis {
    ms.min(Millis::MAX as u64) as Millis
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "actuator.toml".to_string());
    let cfg = config::load(&config_path)?;

    let topics = Topics::for_node(&cfg.mqtt.topic_prefix, &cfg.node_id);
    let hw_id = identity::hardware_id()?;
    let spec = connect_spec(&cfg.mqtt, &topics, &cfg.node_id, &hw_id);
    info!(
        node_id = %cfg.node_id,
        client_id = %spec.client_id,
        broker = %format!("{}:{}", cfg.mqtt.host, cfg.mqtt.port),
        "actuator starting"
    );

    // ── Hardware (all outputs OFF before anything else) ─────────────
    let outputs = OutputBank::new(&cfg.pins)?;
    let float = FloatSwitch::new(cfg.pins.float, cfg.sim_float_high)?;
    let mut ctl = Controller::new(outputs, float, &topics);

    // ── Link ────────────────────────────────────────────────────────
    let mut link = ConnectionManager::new(
        MqttTransport::new(&cfg.mqtt),
        spec,
        cfg.mqtt.backoff(),
        vec![topics.command.clone()],
    );

    let clock = MonotonicClock::start();
    let start = clock.now_ms();
    let mut safety_due = Cadence::new(millis(cfg.timing.safety_sample_ms), start);
    let mut status_due = Cadence::new(millis(cfg.timing.status_interval_ms), start);

    let mut tick = interval(Duration::from_millis(cfg.timing.loop_tick_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            res = &mut shutdown => {
                if let Err(e) = res {
                    tracing::error!("signal handler failed: {e}");
                }
                info!(last_request = %ctl.state().request_id, "shutting down, driving outputs OFF");
                ctl.shutdown();
                return Ok(());
            }
        }

        let now = clock.now_ms();

        let status = link.ensure_connected(now).await;
        ctl.on_link(status, &mut link);

        let inbound = link.pump_inbound();
        ctl.dispatch(inbound, &mut link);

        if safety_due.due(now) {
            ctl.safety_tick();
        }

        ctl.sync(&mut link);

        if status_due.due(now) {
            publish_status(&mut link, &topics.status, clock.uptime_secs());
        }
    }
}
