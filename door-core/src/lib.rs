#![no_std]

// Shared control logic for the Gandalf door controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding
// the Rust standard library. All timing is expressed against a caller-supplied
// monotonic instant, so the same state machines drive the hardware loop, the
// emulator, and the test suite without an executor or blocking waits.

pub mod auth;
pub mod button;
pub mod control;
pub mod doors;
pub mod wifi;
