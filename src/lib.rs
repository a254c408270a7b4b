//! `reconctl`: the binary crate that wires argument parsing
//! (`reconctl-config`), pipeline execution (`reconctl-engine`), reporting
//! (`reconctl-report`), and webhook delivery (`reconctl-webhook`) together.
//! Every collaborator crate is reusable on its own; this crate only does
//! dispatch and exit-code mapping.

pub mod cli;
pub mod doctor;
pub mod logging;
pub mod status;
