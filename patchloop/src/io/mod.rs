//! I/O helpers: configuration, model processes, prompts and context search.

pub mod config;
pub mod model;
pub mod process;
pub mod prompt;
pub mod search;
