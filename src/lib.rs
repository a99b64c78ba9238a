//! paxsniff library: passive WiFi capture engine for crowd counting.
//!
//! Puts an ESP32-class radio into promiscuous receive, rotates it across the
//! channels a regulatory region allows, and hands the transmitter address of
//! every accepted frame to an external counting sink. All scheduling, filtering
//! and lifecycle logic lives here with no platform dependencies, testable on
//! any host with `cargo test`. The `firmware-std` binary is a thin consumer
//! that provides the driver calls, timers and the sink.
//!
//! Layers:
//! - `region`, `config`: regulatory table and shared atomic scan settings
//! - `capture`, `hop`: frame callback and channel rotation, safe to call from
//!   driver and timer contexts
//! - `radio`, `timer`, `sniffer`: driver seams and the lifecycle controller
//! - `protocol`, `comm`, `board`: NDJSON control surface

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod capture;
pub mod comm;
pub mod config;
pub mod error;
pub mod hop;
pub mod protocol;
pub mod radio;
pub mod region;
pub mod sniffer;
pub mod timer;

#[cfg(test)]
mod testing;

pub use error::Error;
