//! Application core: pure domain logic, zero I/O.
//!
//! The single owned [`state::SystemState`], the service that mutates it,
//! and the port traits every adapter implements.  Nothing in here touches
//! hardware, so the whole core runs under plain `cargo test`.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod state;
