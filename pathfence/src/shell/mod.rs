//! # Shell Module
//!
//! Entry point and CLI logic for the `pathfence` binary.

pub mod cli;

pub use cli::{Cli, Command, execute, run};
