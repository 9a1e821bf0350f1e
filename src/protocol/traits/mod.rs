//! Abstraction traits binding the engine to firmware drivers (notification
//! sink, clock, session log storage, and LED feedback).
pub mod clock;
pub mod led;
pub mod notify_sink;
pub mod session_log;
