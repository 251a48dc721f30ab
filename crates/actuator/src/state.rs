use serde::Serialize;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Last classification of the reservoir float switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FloatLevel {
    Unknown,
    Low,
    High,
}

/// What produced the current output values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Boot,
    Applied,
    SafetyOverride,
}

/// Authoritative output state of the actuator node.  Owned by the control
/// loop; outputs are driven from it after every mutation.
///
/// Invariant: `float == FloatLevel::Low` implies `!pump`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorState {
    pub pump: bool,
    pub valve1: bool,
    pub valve2: bool,
    pub valve3: bool,
    pub float: FloatLevel,
    pub request_id: String,
    pub source: Source,
}

/// The fields observers care about; change detection compares these only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed {
    pub pump: bool,
    pub valve1: bool,
    pub valve2: bool,
    pub valve3: bool,
    pub float: FloatLevel,
}

// ---------------------------------------------------------------------------
// Wire payload (retained on the `state` topic)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StateMsg<'a> {
    pub pump: bool,
    pub valve1: bool,
    pub valve2: bool,
    pub valve3: bool,
    pub float: FloatLevel,
    #[serde(rename = "requestId")]
    pub request_id: &'a str,
    pub source: Source,
    pub ts: i64,
}

impl ActuatorState {
    /// Everything off, float not yet sampled.
    pub fn boot() -> Self {
        Self {
            pump: false,
            valve1: false,
            valve2: false,
            valve3: false,
            float: FloatLevel::Unknown,
            request_id: String::new(),
            source: Source::Boot,
        }
    }

    pub fn observed(&self) -> Observed {
        Observed {
            pump: self.pump,
            valve1: self.valve1,
            valve2: self.valve2,
            valve3: self.valve3,
            float: self.float,
        }
    }

    pub fn to_msg(&self, ts: i64) -> StateMsg<'_> {
        StateMsg {
            pump: self.pump,
            valve1: self.valve1,
            valve2: self.valve2,
            valve3: self.valve3,
            float: self.float,
            request_id: &self.request_id,
            source: self.source,
            ts,
        }
    }
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self::boot()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
