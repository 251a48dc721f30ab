mod config;
mod sensors;
#[cfg(feature = "sim")]
mod sim;
mod telemetry;

#[cfg(not(feature = "sim"))]
compile_error!("no hardware probe drivers yet: build vermilinks-sensor with the `sim` feature");

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

use sim::{Scenario, SimProbes};
use telemetry::TelemetryPublisher;

/// Simulated day length; short so a dev session sees a full cycle.
const SIM_DAY_S: f64 = 600.0;

fn millis(ms: u64) -> Millis {
    ms.min(Millis::MAX as u64) as Millis
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "sensor.toml".to_string());
    let cfg = config::load(&config_path)?;

    let topics = Topics::for_node(&cfg.mqtt.topic_prefix, &cfg.node_id);
    let hw_id = identity::hardware_id()?;
    let spec = connect_spec(&cfg.mqtt, &topics, &cfg.node_id, &hw_id);

    let scenario = Scenario::from_str_lossy(&env::var("SIM_SCENARIO").unwrap_or_default());
    info!(
        node_id = %cfg.node_id,
        client_id = %spec.client_id,
        %scenario,
        topic = %topics.telemetry,
        "sensor starting"
    );

    let mut probes = SimProbes::new(
        scenario,
        &cfg.soil,
        cfg.timing.telemetry_interval_ms as f64 / 1000.0,
        SIM_DAY_S,
    );
    let telemetry = TelemetryPublisher::new(topics.telemetry.clone());

    // Telemetry only: nothing to subscribe to.
    let mut link = ConnectionManager::new(
        MqttTransport::new(&cfg.mqtt),
        spec,
        cfg.mqtt.backoff(),
        Vec::new(),
    );

    let clock = MonotonicClock::start();
    let start = clock.now_ms();
    let mut telemetry_due = Cadence::new(millis(cfg.timing.telemetry_interval_ms), start);
    let mut status_due = Cadence::new(millis(cfg.timing.status_interval_ms), start);

    let mut tick = interval(Duration::from_millis(cfg.timing.loop_tick_ms));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tick.tick().await;
        let now = clock.now_ms();

        link.ensure_connected(now).await;

        if telemetry_due.due(now) {
            let snapshot = probes.read().aggregate(&cfg.soil);
            telemetry.publish(&snapshot, &mut link);
        }

        if status_due.due(now) {
            publish_status(&mut link, &topics.status, clock.uptime_secs());
        }
    }
}
