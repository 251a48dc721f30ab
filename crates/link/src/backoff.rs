//! Bounded exponential reconnect delay.

/// Default first delay after a failed connect.
pub const INITIAL_BACKOFF_MS: u32 = 1_000;
/// Reconnect delay ceiling.  Brokers and the network expect this exact cap.
pub const MAX_BACKOFF_MS: u32 = 30_000;

/// Doubling delay with a hard ceiling.
///
/// Each failed attempt waits [`Backoff::current_ms`] and then doubles it, so
/// consecutive failures wait 1000, 2000, 4000, 8000, 16000, 30000, 30000, …
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial_ms: u32,
    max_ms: u32,
    current_ms: u32,
}

impl Backoff {
    pub fn new(initial_ms: u32, max_ms: u32) -> Self {
        Self {
            initial_ms,
            max_ms,
            current_ms: initial_ms,
        }
    }

    /// Delay the next failure will wait.
    pub fn current_ms(&self) -> u32 {
        self.current_ms
    }

    /// Consume the current delay and escalate for the following failure.
    pub fn next_delay(&mut self) -> u32 {
        let delay = self.current_ms;
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
        delay
    }

    pub fn reset(&mut self) {
        self.current_ms = self.initial_ms;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF_MS, MAX_BACKOFF_MS)
    }
}
