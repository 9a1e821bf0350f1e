//! Clock abstraction providing the uptime reading and timing primitives
//! required by session guards, backoff waits, and periodic polling.

/// Monotonic clock trait abstraction; must remain thread-safe when applicable.
pub trait Clock {
    /// Milliseconds elapsed since boot. Monotonic, never wraps in practice.
    fn now_ms(&self) -> u64;
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;
}

/// [`Clock`] backed by the embassy time driver.
///
/// Requires a `time-driver` implementation from the target HAL.
#[cfg(feature = "embassy")]
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a {
        embassy_time::Timer::after_millis(u64::from(millis))
    }
}
