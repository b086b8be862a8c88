//! Network-facing services: request handling, update transfer, discovery.
//!
//! The wire-format halves are pure and host-tested; the socket-facing halves
//! compile only for the MCU target.

pub mod mdns;
pub mod request;
pub mod update;

#[cfg(target_os = "none")]
pub mod discovery;
#[cfg(target_os = "none")]
pub mod http;
#[cfg(target_os = "none")]
pub mod ota;
#[cfg(target_os = "none")]
pub mod wifi;
