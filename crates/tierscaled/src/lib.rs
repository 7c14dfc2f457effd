//! tierscaled: wiring for the tierscale daemon.
//!
//! The binary in `main.rs` is a thin CLI over [`app`]; integration tests
//! drive the same functions.

pub mod app;
pub mod fleet;
