//! Periodic telemetry publishing.  Every sample goes out (no change
//! detection), never retained, and is dropped while the link is down.

use serde::{Serialize, Serializer};
use tracing::{debug, error};
use vermilinks_link::clock::unix_now;
use vermilinks_link::Publish;

use crate::sensors::SensorSnapshot;

fn one_decimal<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((value * 10.0).round() / 10.0)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMsg {
    #[serde(serialize_with = "one_decimal")]
    pub temp_c: f64,
    #[serde(serialize_with = "one_decimal")]
    pub humidity: f64,
    #[serde(serialize_with = "one_decimal")]
    pub soil: f64,
    #[serde(serialize_with = "one_decimal")]
    pub water_temp_c: f64,
    pub ts: i64,
}

impl TelemetryMsg {
    pub fn new(snap: &SensorSnapshot, ts: i64) -> Self {
        Self {
            temp_c: snap.temp_c,
            humidity: snap.humidity,
            soil: snap.soil,
            water_temp_c: snap.water_temp_c,
            ts,
        }
    }
}

pub struct TelemetryPublisher {
    topic: String,
}

impl TelemetryPublisher {
    pub fn new(topic: String) -> Self {
        Self { topic }
    }

    pub fn publish(&self, snap: &SensorSnapshot, out: &mut impl Publish) -> bool {
        if !out.is_online() {
            return false;
        }
        let payload = match serde_json::to_vec(&TelemetryMsg::new(snap, unix_now())) {
            Ok(p) => p,
            Err(e) => {
                error!("telemetry serialisation failed: {e}");
                return false;
            }
        };
        let sent = out.publish(&self.topic, payload, false);
        if sent {
            debug!(
                temp_c = snap.temp_c,
                humidity = snap.humidity,
                soil = snap.soil,
                water_temp_c = snap.water_temp_c,
                "telemetry published"
            );
        }
        sent
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vermilinks_link::testing::RecordingPublisher;

    const TOPIC: &str = "vermilinks/esp32b/telemetry";

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot {
            temp_c: 24.46,
            humidity: 61.04,
            soil: 49.96,
            water_temp_c: 19.0,
        }
    }

    #[test]
    fn wire_names_and_rounding() {
        let json = serde_json::to_value(TelemetryMsg::new(&snapshot(), 1_700_000_000)).unwrap();
        assert_eq!(json["tempC"], 24.5);
        assert_eq!(json["humidity"], 61.0);
        assert_eq!(json["soil"], 50.0);
        assert_eq!(json["waterTempC"], 19.0);
        assert_eq!(json["ts"], 1_700_000_000);
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn negative_values_round_to_one_decimal() {
        let snap = SensorSnapshot {
            temp_c: -3.14,
            ..snapshot()
        };
        let json = serde_json::to_value(TelemetryMsg::new(&snap, 0)).unwrap();
        assert_eq!(json["tempC"], -3.1);
    }

    #[test]
    fn every_sample_is_published() {
        let p = TelemetryPublisher::new(TOPIC.to_string());
        let mut out = RecordingPublisher::online();
        let snap = snapshot();
        assert!(p.publish(&snap, &mut out));
        assert!(p.publish(&snap, &mut out));
        assert_eq!(out.sent.len(), 2);
        assert!(out.sent.iter().all(|m| m.topic == TOPIC && !m.retain));
    }

    #[test]
    fn dropped_while_offline() {
        let p = TelemetryPublisher::new(TOPIC.to_string());
        let mut out = RecordingPublisher::offline();
        assert!(!p.publish(&snapshot(), &mut out));
        assert!(out.sent.is_empty());
    }
}
