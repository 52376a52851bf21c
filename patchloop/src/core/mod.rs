//! Deterministic, pure logic shared by the patchloop core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod apply;
pub mod budget;
pub mod extract;
pub mod plan_parse;
pub mod run;
pub mod types;
pub mod unified;
