//! Application core: the wake cycle, zero direct I/O.
//!
//! This module holds the boot-time [`context`], the [`service`] that runs
//! one measure/decide/publish/sleep cycle, the structured [`events`] it
//! emits, and the [`ports`] every adapter implements.  Hardware only ever
//! appears behind those traits, keeping this layer testable without real
//! peripherals.

pub mod context;
pub mod events;
pub mod ports;
pub mod service;
