//! `manikin-link` library: the command/telemetry protocol engine of a
//! CPR-training manikin in a `no_std` environment. The crate exposes the
//! wire codec, the command dispatcher, the session lifecycle machine, the
//! prioritized notification queue, and the time/role store. Transport,
//! storage, clock, and LED access stay behind traits so firmware can plug
//! in its own drivers.
#![no_std]
//==================================================================================
/// Capacity constants and delivery tuning knobs.
pub mod config;
/// Domain errors (frame decoding, dispatch, queue admission, session
/// transitions, time-data parsing, and related issues).
pub mod error;
/// Protocol implementation: wire codec, dispatcher, session machine,
/// notification delivery, and the time/role store.
pub mod protocol;
//==================================================================================
