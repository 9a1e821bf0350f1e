//! Capacity constants and delivery tuning shared across the library.
//!
//! Queue depths and buffer sizes are compile-time constants so every
//! container is pre-sized; the delivery knobs live in [`NotifyConfig`] so
//! firmware can adjust retry behavior without rebuilding the library.

/// Capacity of a command envelope, in bytes.
///
/// Bounds both `submit` input and the payload a framed command may declare.
/// Commands arrive over a BLE characteristic write, so a 40-byte envelope
/// comfortably covers the longest defined command (identity assignment with
/// a 19-byte id).
pub const COMMAND_CAPACITY: usize = 40;

/// Depth of the command envelope queue between producers and the worker.
pub const COMMAND_QUEUE_DEPTH: usize = 10;

/// Number of slots in the notification table.
pub const NOTIFY_SLOTS: usize = 8;

/// Capacity of a notification slot, in bytes.
///
/// Slots hold the framed notification, so the six framing bytes count
/// against this.
pub const NOTIFY_CAPACITY: usize = 256;

/// Maximum notification payload accepted by `enqueue`, in bytes.
pub const MAX_NOTIFY_PAYLOAD: usize = NOTIFY_CAPACITY - 6;

/// Maximum stored length of an instructor or trainee id, in bytes.
pub const MAX_ID_LEN: usize = 19;

/// Uptime below which a session start request is treated as boot noise.
pub const SESSION_BOOT_GUARD_MS: u64 = 1000;

/// Delivery tuning for the notification runner.
///
/// Defaults reproduce the behavior tuned on the manikin mainboard: 100 ms
/// exponential backoff base capped at 5 s, three retries reserved for
/// high-priority and critical items, a 10 s sliding window for transient
/// error pressure, and a short recovery pause after each transient failure
/// so the transport can drain its buffers.
#[derive(Clone, Copy, Debug)]
pub struct NotifyConfig {
    /// Exponential backoff base (ms); retry `n` waits `base << n` plus
    /// surcharge and jitter.
    pub backoff_base_ms: u32,
    /// Upper bound for a single backoff wait (ms).
    pub backoff_cap_ms: u32,
    /// Jitter range added to every backoff (ms, exclusive upper bound).
    pub jitter_ms: u32,
    /// Retries granted to high-priority/critical items.
    pub max_retries: u8,
    /// Priority at or above which an item earns retries.
    pub high_priority: u8,
    /// Windowed transient-error count at which the runner throttles.
    pub pressure_threshold: u32,
    /// Quiescence after which the transient-error count resets (ms).
    pub error_window_ms: u64,
    /// Pause after a transient delivery failure (ms).
    pub recovery_delay_ms: u32,
    /// Minimum spacing between two sink deliveries (ms).
    pub min_send_interval_ms: u64,
}

impl NotifyConfig {
    /// Mainboard defaults, usable in `const` contexts.
    pub const DEFAULT: Self = Self {
        backoff_base_ms: 100,
        backoff_cap_ms: 5000,
        jitter_ms: 50,
        max_retries: 3,
        high_priority: 70,
        pressure_threshold: 3,
        error_window_ms: 10_000,
        recovery_delay_ms: 350,
        min_send_interval_ms: 100,
    };
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
