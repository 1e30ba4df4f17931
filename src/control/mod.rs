//! Automatic control.
//!
//! [`policy::decide`] maps a snapshot to the actuator outputs the greenhouse
//! should have.  It is pure; the service applies its result.

pub mod policy;

pub use policy::decide;
