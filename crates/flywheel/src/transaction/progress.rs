//! The commit progress state machine fed by RPM runtime callbacks.

use std::time::Instant;

use super::rpm::RpmEvent;

/// Where the commit pipeline currently is. Progress events arriving in the
/// wrong state are dropped rather than misattributed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DriverState {
    /// The pipeline was created but nothing ran yet.
    Started,
    /// The runtime is preparing the transaction.
    Preparing,
    /// Payloads are being written; entered on the first install or removal.
    Writing,
    /// Events are being discarded (the test-transaction pass).
    Ignore,
}

/// Tracks the commit state machine and the write speed derived from
/// per-package progress deltas.
#[derive(Debug)]
pub struct ProgressTracker {
    state: DriverState,
    last_progress: u64,
    last_tick: Option<Instant>,
    speed_bytes_per_sec: f64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        ProgressTracker {
            state: DriverState::Started,
            last_progress: 0,
            last_tick: None,
            speed_bytes_per_sec: 0.0,
        }
    }
}

impl ProgressTracker {
    /// The current pipeline state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Forces a state, used when entering and leaving the test transaction.
    pub fn set_state(&mut self, state: DriverState) {
        self.state = state;
    }

    /// The most recent write speed estimate in bytes per second.
    pub fn speed(&self) -> f64 {
        self.speed_bytes_per_sec
    }

    /// Feeds one runtime event through the state machine.
    pub fn handle(&mut self, event: &RpmEvent) {
        if self.state == DriverState::Ignore {
            return;
        }
        match event {
            RpmEvent::TransStart { .. } | RpmEvent::TransProgress { .. } | RpmEvent::TransStop => {
                // Preparation noise; progress while preparing is dropped.
            }
            RpmEvent::InstStart { .. } | RpmEvent::UninstStart { .. } => {
                if self.state != DriverState::Writing {
                    self.state = DriverState::Writing;
                }
                self.last_progress = 0;
                self.last_tick = Some(Instant::now());
            }
            RpmEvent::InstProgress { amount, .. } => {
                if self.state != DriverState::Writing {
                    return;
                }
                let now = Instant::now();
                if let Some(last) = self.last_tick {
                    let elapsed = now.duration_since(last).as_secs_f64();
                    if elapsed > 0.0 && *amount > self.last_progress {
                        self.speed_bytes_per_sec =
                            (*amount - self.last_progress) as f64 / elapsed;
                    }
                }
                self.last_progress = *amount;
                self.last_tick = Some(now);
            }
            RpmEvent::InstStop { .. } | RpmEvent::UninstStop { .. } => {}
        }
    }
}
