//! Inbound command validation and application.
//!
//! Commands arrive untrusted on `<prefix>/<node>/command`:
//!
//! ```json
//! {"pump":true,"valve1":true,"valve2":false,"valve3":false,"requestId":"r1"}
//! ```
//!
//! All five fields are required and strictly typed; anything else is
//! rejected whole.  Rejections have no wire-visible effect: the only
//! acknowledgement a sender ever gets is the state echo after acceptance.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::safety;
use crate::state::{ActuatorState, Source};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Command {
    pub pump: bool,
    pub valve1: bool,
    pub valve2: bool,
    pub valve3: bool,
    #[serde(rename = "requestId")]
    pub request_id: String,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("malformed command payload: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("command schema violation: {0}")]
    Schema(#[source] serde_json::Error),
    #[error("command requestId is empty")]
    EmptyRequestId,
}

/// Decode and schema-check a raw command payload.
pub fn parse(raw: &[u8]) -> Result<Command, CommandError> {
    // Go through a map first: derived struct impls also accept a positional
    // array, which is not a command.
    let doc: Map<String, Value> = serde_json::from_slice(raw).map_err(|e| {
        if e.is_data() {
            CommandError::Schema(e)
        } else {
            CommandError::Malformed(e)
        }
    })?;
    let cmd = Command::deserialize(Value::Object(doc)).map_err(CommandError::Schema)?;
    if cmd.request_id.is_empty() {
        return Err(CommandError::EmptyRequestId);
    }
    Ok(cmd)
}

/// Copy an accepted command into `state`, then run the safety governor
/// against the fresh float reading before anyone can observe the result.
pub fn apply(cmd: Command, state: &mut ActuatorState, raw_float_high: bool) {
    state.pump = cmd.pump;
    state.valve1 = cmd.valve1;
    state.valve2 = cmd.valve2;
    state.valve3 = cmd.valve3;
    state.request_id = cmd.request_id;
    state.source = Source::Applied;

    safety::enforce(state, raw_float_high);
}

// ===========================================================================
// Tests
// ===========================================================================
