//! Protocol engine: wire codec, command dispatch, session lifecycle,
//! prioritized notification delivery, time/role store, and the collaborator
//! traits binding it all to firmware drivers.
pub mod dispatch;
pub mod notify;
pub mod session;
pub mod store;
pub mod traits;
pub mod wire;
