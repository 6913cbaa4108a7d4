//! Core infrastructure: configuration, errors and node wiring.

pub mod config;
pub mod error;
pub mod runtime;
