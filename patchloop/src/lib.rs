//! Plan-then-patch code editing agent.
//!
//! A run takes an instruction and a code artifact, asks a model to break the
//! instruction into small steps, then asks it for one unified diff per step and
//! applies each diff to the latest snapshot. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (patch extraction, diff application,
//!   plan parsing, the run state machine). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config files, model processes,
//!   prompt rendering, context search). Isolated behind traits for tests.
//!
//! [`controller`] coordinates the [`agents`] with a [`core::run::Run`] to
//! implement the CLI commands and the HTTP endpoint.

pub mod agents;
pub mod cancel;
pub mod controller;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
