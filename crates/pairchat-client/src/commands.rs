//! Subcommand implementations.

pub mod chat;
pub mod config;
pub mod relay;
