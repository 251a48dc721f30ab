//! The actuator node's per-iteration operations.  `main` calls these in a
//! fixed order each loop tick: link status, inbound dispatch, safety sample
//! (on its cadence), change-gated sync.

use tracing::{debug, info, warn};
use vermilinks_link::{Inbound, LinkStatus, Publish, Topics};

use crate::command;
use crate::float_switch::FloatSwitch;
use crate::outputs::OutputBank;
use crate::safety;
use crate::state::{ActuatorState, Source};
use crate::sync::StateSynchronizer;

pub(crate) struct Controller {
    state: ActuatorState,
    outputs: OutputBank,
    float: FloatSwitch,
    sync: StateSynchronizer,
    command_topic: String,
}

impl Controller {
    /// Start from the boot state with every output driven OFF.
    pub(crate) fn new(outputs: OutputBank, float: FloatSwitch, topics: &Topics) -> Self {
        let mut ctl = Self {
            state: ActuatorState::boot(),
            outputs,
            float,
            sync: StateSynchronizer::new(topics.state.clone()),
            command_topic: topics.command.clone(),
        };
        ctl.outputs.all_off();
        ctl.outputs.apply(&ctl.state);
        ctl
    }

    pub(crate) fn state(&self) -> &ActuatorState {
        &self.state
    }

    /// React to this iteration's connect result.  A fresh session may have
    /// missed the retained state, so it is always republished.
    pub(crate) fn on_link(&mut self, status: LinkStatus, out: &mut impl Publish) {
        self.outputs.set_status_led(status != LinkStatus::Offline);
        if status == LinkStatus::Established {
            self.sync.publish_now(&self.state, out);
        }
    }

    /// Route drained inbound messages by topic.
    pub(crate) fn dispatch(&mut self, inbound: Vec<Inbound>, out: &mut impl Publish) {
        for msg in inbound {
            if msg.topic == self.command_topic {
                self.handle_command(&msg.payload, out);
            } else {
                debug!(topic = %msg.topic, "unhandled topic");
            }
        }
    }

    /// Validate and apply one raw command.  Rejected payloads change nothing
    /// and publish nothing.  Accepted ones are safety-checked against a fresh
    /// float reading, driven to the outputs, and echoed as state even when
    /// the net outputs did not change.
    pub(crate) fn handle_command(&mut self, raw: &[u8], out: &mut impl Publish) -> bool {
        let cmd = match command::parse(raw) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!("command rejected: {e}");
                return false;
            }
        };

        let requested_pump = cmd.pump;
        let float_high = self.float.is_high();
        command::apply(cmd, &mut self.state, float_high);
        self.outputs.apply(&self.state);

        let st = &self.state;
        if requested_pump && !st.pump {
            warn!(request_id = %st.request_id, "pump request vetoed: reservoir LOW");
        }
        info!(
            request_id = %st.request_id,
            pump = st.pump,
            valve1 = st.valve1,
            valve2 = st.valve2,
            valve3 = st.valve3,
            "command applied"
        );

        self.sync.publish_now(&self.state, out);
        true
    }

    /// Periodic float sample: re-run the governor and re-assert the outputs.
    pub(crate) fn safety_tick(&mut self) {
        let before = self.state.float;
        let pump_before = self.state.pump;
        safety::enforce(&mut self.state, self.float.is_high());
        self.outputs.apply(&self.state);

        if before != self.state.float {
            info!(float = ?self.state.float, "float level changed");
        }
        if pump_before && !self.state.pump && self.state.source == Source::SafetyOverride {
            warn!("pump stopped by safety override");
        }
    }

    /// Change-gated publish; once per loop iteration.
    pub(crate) fn sync(&mut self, out: &mut impl Publish) -> bool {
        self.sync.maybe_publish(&self.state, out)
    }

    /// Drive every output OFF (process exit).
    pub(crate) fn shutdown(&mut self) {
        self.outputs.all_off();
        self.outputs.set_status_led(false);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
