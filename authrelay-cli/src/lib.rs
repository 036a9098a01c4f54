//! Library half of the `authrelay` CLI.
//!
//! Split out from the binary so configuration loading and the command
//! implementations can be exercised from integration tests.

pub mod commands;
pub mod config;
