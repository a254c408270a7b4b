//! Per-target Circuit Breaker: CLOSED -> OPEN -> HALF_OPEN.
//!
//! Tracks consecutive failures (timeouts, 5xx, 403, 429) for one target host
//! or host-group. Once tripped, suppresses further invocations against that
//! target until a cooldown elapses, then admits exactly one probe.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub threshold: u32,
    pub cooldown: Duration,
    pub cooldown_cap: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            cooldown: Duration::from_secs(60),
            cooldown_cap: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStateKind {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Normal invocation, breaker is CLOSED.
    Allowed,
    /// The single HALF_OPEN probe slot, just claimed by this caller.
    Probe,
    /// Breaker is OPEN (or another probe is already in flight); record as
    /// SKIPPED with reason `circuit-open`.
    CircuitOpen,
}

enum State {
    Closed { consecutive_failures: u32 },
    Open { since: Instant, cooldown: Duration },
    HalfOpen { cooldown: Duration, probe_in_flight: bool },
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    pub fn state_kind(&self) -> BreakerStateKind {
        match &*self.state.lock().unwrap() {
            State::Closed { .. } => BreakerStateKind::Closed,
            State::Open { .. } => BreakerStateKind::Open,
            State::HalfOpen { .. } => BreakerStateKind::HalfOpen,
        }
    }

    /// Ask whether an invocation against this target may proceed right
    /// now. Transitions OPEN -> HALF_OPEN internally once the cooldown has
    /// elapsed.
    pub fn admit(&self) -> Admission {
        let mut state = self.state.lock().unwrap();
        match &*state {
            State::Closed { .. } => Admission::Allowed,
            State::Open { since, cooldown } => {
                if since.elapsed() >= *cooldown {
                    *state = State::HalfOpen {
                        cooldown: *cooldown,
                        probe_in_flight: true,
                    };
                    Admission::Probe
                } else {
                    Admission::CircuitOpen
                }
            }
            State::HalfOpen { probe_in_flight, .. } if *probe_in_flight => Admission::CircuitOpen,
            State::HalfOpen { cooldown, .. } => {
                let cooldown = *cooldown;
                *state = State::HalfOpen {
                    cooldown,
                    probe_in_flight: true,
                };
                Admission::Probe
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap();
        match &*state {
            State::Closed { .. } => {
                *state = State::Closed {
                    consecutive_failures: 0,
                };
            }
            State::HalfOpen { .. } => {
                *state = State::Closed {
                    consecutive_failures: 0,
                };
            }
            State::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap();
        match &*state {
            State::Closed { consecutive_failures } => {
                let count = consecutive_failures + 1;
                if count >= self.config.threshold {
                    *state = State::Open {
                        since: Instant::now(),
                        cooldown: self.config.cooldown,
                    };
                } else {
                    *state = State::Closed {
                        consecutive_failures: count,
                    };
                }
            }
            State::HalfOpen { cooldown, .. } => {
                let doubled = (*cooldown) * 2;
                let capped = doubled.min(self.config.cooldown_cap);
                *state = State::Open {
                    since: Instant::now(),
                    cooldown: capped,
                };
            }
            State::Open { .. } => {}
        }
    }
}
