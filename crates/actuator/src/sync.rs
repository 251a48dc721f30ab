//! Change-gated retained publishing of the actuator state.
//!
//! The loop offers the state every iteration; it goes out only when the
//! observable projection differs from what was last published.  Connect and
//! command handling force a publish regardless so late or rejoining
//! observers converge.

use tracing::{debug, error};
use vermilinks_link::clock::unix_now;
use vermilinks_link::Publish;

use crate::state::{ActuatorState, Observed};

pub struct StateSynchronizer {
    topic: String,
    /// Projection of the last successful publish; `None` before the first.
    last_published: Option<Observed>,
}

impl StateSynchronizer {
    pub fn new(topic: String) -> Self {
        Self {
            topic,
            last_published: None,
        }
    }

    /// Publish iff pump/valves/float changed since the last publish.
    /// `requestId` and `source` ride along but never trigger.
    pub fn maybe_publish(&mut self, state: &ActuatorState, out: &mut impl Publish) -> bool {
        if self.last_published == Some(state.observed()) || !out.is_online() {
            return false;
        }
        debug!("observable state changed");
        self.publish_now(state, out)
    }

    /// Unconditional retained publish.  The snapshot only moves when the
    /// message actually went out.
    pub fn publish_now(&mut self, state: &ActuatorState, out: &mut impl Publish) -> bool {
        let payload = match serde_json::to_vec(&state.to_msg(unix_now())) {
            Ok(p) => p,
            Err(e) => {
                error!("state serialisation failed: {e}");
                return false;
            }
        };
        if out.publish(&self.topic, payload, true) {
            self.last_published = Some(state.observed());
            true
        } else {
            false
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
