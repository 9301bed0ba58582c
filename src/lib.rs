//! Sensor node firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod capability;
pub mod config;
pub mod discovery;
pub mod error;
pub mod policy;
pub mod power;
pub mod sequencer;
pub mod topics;

// Adapters compile on every target; the hardware paths are guarded by
// cfg attributes inside and the host paths are simulations.
pub mod adapters;
pub mod drivers;
pub mod sensors;
