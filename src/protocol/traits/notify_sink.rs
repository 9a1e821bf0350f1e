//! Minimal abstraction for the outbound notification transport. Allows the
//! library to plug into various implementations (BLE GATT stack, serial
//! bridge, test double, etc.).
use crate::error::SinkError;
use futures_util::Future;

/// Contract to deliver framed notifications asynchronously.
///
/// Implementations report buffer exhaustion as [`SinkError::Exhausted`] so
/// the notification runner can apply its backoff/retry policy; every other
/// failure is [`SinkError::Rejected`] and retires the notification. A sink
/// whose link is down may also report `Exhausted` to keep high-priority
/// items queued until the link returns.
pub trait NotifySink {
    type Error: core::fmt::Debug;
    /// Deliver one framed notification. Asynchronous to accommodate
    /// non-blocking transport drivers.
    fn deliver<'a>(
        &'a mut self,
        bytes: &'a [u8],
    ) -> impl Future<Output = Result<(), SinkError<Self::Error>>> + 'a;
}
