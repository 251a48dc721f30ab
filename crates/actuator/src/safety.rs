//! Float-switch safety governor.
//!
//! A LOW reservoir reading forces the pump off no matter what was commanded,
//! including a command applied earlier in the same loop iteration.  Valves
//! are not safety-relevant and are never touched here.

use crate::state::{ActuatorState, FloatLevel, Source};

/// Correct `state` for the latest raw float reading (`true` = water present).
pub fn enforce(state: &mut ActuatorState, raw_high: bool) {
    if raw_high {
        state.float = FloatLevel::High;
    } else {
        state.pump = false;
        state.float = FloatLevel::Low;
        state.source = Source::SafetyOverride;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> ActuatorState {
        ActuatorState {
            pump: true,
            valve1: true,
            valve2: false,
            valve3: true,
            float: FloatLevel::High,
            request_id: "r1".into(),
            source: Source::Applied,
        }
    }

    #[test]
    fn low_forces_pump_off() {
        let mut st = running();
        enforce(&mut st, false);
        assert!(!st.pump);
        assert_eq!(st.float, FloatLevel::Low);
        assert_eq!(st.source, Source::SafetyOverride);
    }

    #[test]
    fn low_leaves_valves_and_request_id() {
        let mut st = running();
        enforce(&mut st, false);
        assert!(st.valve1 && !st.valve2 && st.valve3);
        assert_eq!(st.request_id, "r1");
    }

    #[test]
    fn high_only_classifies() {
        let mut st = running();
        st.float = FloatLevel::Unknown;
        enforce(&mut st, true);
        assert!(st.pump);
        assert_eq!(st.float, FloatLevel::High);
        assert_eq!(st.source, Source::Applied);
    }

    #[test]
    fn recovery_to_high_keeps_override_provenance() {
        let mut st = running();
        enforce(&mut st, false);
        enforce(&mut st, true);
        assert!(!st.pump, "pump stays off until commanded again");
        assert_eq!(st.float, FloatLevel::High);
        assert_eq!(st.source, Source::SafetyOverride);
    }

    #[test]
    fn invariant_holds_for_every_input() {
        for bits in 0u8..16 {
            for raw_high in [false, true] {
                let mut st = ActuatorState {
                    pump: bits & 1 != 0,
                    valve1: bits & 2 != 0,
                    valve2: bits & 4 != 0,
                    valve3: bits & 8 != 0,
                    ..ActuatorState::boot()
                };
                enforce(&mut st, raw_high);
                if st.float == FloatLevel::Low {
                    assert!(!st.pump, "LOW with pump on: bits={bits:04b}");
                }
            }
        }
    }
}
