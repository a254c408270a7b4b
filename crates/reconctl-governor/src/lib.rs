//! Adaptive concurrency: a global permit pool plus a per-target circuit
//! breaker, together preventing a Run from self-inflicting a DoS or tripping
//! a target's WAF.

pub mod breaker_registry;
pub mod cancellation;
pub mod circuit_breaker;
pub mod governor;

pub use breaker_registry::BreakerRegistry;
pub use cancellation::Cancellation;
pub use circuit_breaker::{Admission, BreakerStateKind, CircuitBreaker, CircuitBreakerConfig};
pub use governor::{Governor, GovernorConfig, Permit};
