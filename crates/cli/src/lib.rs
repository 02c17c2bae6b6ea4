//! osc CLI library
//!
//! Exposed as a library so the integration tests can share argument types.

pub mod commands;
pub mod exit_code;
pub mod output;
