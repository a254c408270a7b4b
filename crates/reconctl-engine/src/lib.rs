//! Pipeline Engine: the only crate that knows how to turn an effective
//! [`reconctl_config::Config`] into a sequence of Stage executions. Stages
//! themselves (`reconctl-stages`) know nothing about scheduling, locking,
//! or resumability — all of that lives here.

pub mod error;
pub mod pipeline;
pub mod run;
pub mod run_lock;

pub use error::EngineError;
pub use run::{execute_prepared, prepare, run, PreparedRun, RunOutcome};
