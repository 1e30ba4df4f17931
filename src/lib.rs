//! Greenhouse controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and the host
//! simulator.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod config_store;
pub mod control;
pub mod error;
pub mod pins;
pub mod runtime;
pub mod scheduler;

pub mod adapters;
pub mod channels;
pub mod drivers;
pub mod sensors;

pub use error::{Error, Result};
