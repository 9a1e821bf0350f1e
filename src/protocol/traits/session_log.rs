//! Storage abstraction for the per-session sample log. The engine only
//! needs open/append/close; file naming, media handling, and write queueing
//! stay in the firmware's storage driver.
use futures_util::Future;

/// Contract for the CSV session log backing a training session.
pub trait SessionLog {
    type Error: core::fmt::Debug;
    /// Open or create the log for a new session.
    fn open<'a>(&'a mut self) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Append one CSV line (no trailing newline expected from the caller).
    fn write_line<'a>(
        &'a mut self,
        line: &'a str,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Flush and close the log.
    fn close<'a>(&'a mut self) -> impl Future<Output = Result<(), Self::Error>> + 'a;
}
