//! Expose marklite's command implementations for use in integration tests.
//! The binary is the supported interface.
pub mod cli;
pub mod commands;
pub mod files;
