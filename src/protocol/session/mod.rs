//! CPR session lifecycle: the active/inactive state machine, its boot
//! guard, and the per-session sample log. Exactly one writer (the
//! dispatcher worker) drives transitions through [`SessionController`];
//! every other task reads snapshots from the shared [`SessionTracker`].

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::SESSION_BOOT_GUARD_MS;
use crate::error::SessionError;
use crate::protocol::traits::session_log::SessionLog;

//==================================================================================Constants

/// Header row of the per-session sample log.
///
/// Sensor batches carry between one and eight readings, so data rows may
/// be shorter than the header.
pub const CSV_HEADER: &str =
    "sensor_name,frame_id,data0,data1,data2,data3,data4,data5,data6,data7";

//==================================================================================Outcomes

/// Outcome of a session start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartOutcome {
    /// Log opened, header written, session timer running.
    Started,
    /// A session was already running; timing is untouched.
    AlreadyActive,
    /// Rejected inside the boot guard window.
    BootGuarded,
}

/// Outcome of a session stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopOutcome {
    /// Session closed after `duration_secs` of activity.
    Stopped { duration_secs: u32 },
    /// No session was running.
    AlreadyInactive,
}

//==================================================================================Session Tracker

#[derive(Debug, Clone, Copy)]
struct TrackerInner {
    start_ms: Option<u64>,
    last_duration_secs: u32,
}

/// Shared read side of the session state.
///
/// `active` mirrors the locked state so pollers can check it without
/// taking the lock; a reader racing a transition sees a state at most one
/// tick stale. `start_ms` is `Some` exactly while a session is active.
pub struct SessionTracker {
    active: AtomicBool,
    inner: Mutex<CriticalSectionRawMutex, RefCell<TrackerInner>>,
}

impl SessionTracker {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            inner: Mutex::new(RefCell::new(TrackerInner {
                start_ms: None,
                last_duration_secs: 0,
            })),
        }
    }

    /// Whether a session is currently running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whole seconds since the session started, 0 while inactive.
    pub fn elapsed_secs(&self, now_ms: u64) -> u32 {
        self.inner.lock(|inner| {
            inner
                .borrow()
                .start_ms
                .map_or(0, |start| (now_ms.saturating_sub(start) / 1000) as u32)
        })
    }

    /// Duration of the most recently stopped session, in whole seconds.
    pub fn last_duration_secs(&self) -> u32 {
        self.inner.lock(|inner| inner.borrow().last_duration_secs)
    }

    fn begin(&self, now_ms: u64) {
        self.inner.lock(|inner| {
            inner.borrow_mut().start_ms = Some(now_ms);
            self.active.store(true, Ordering::Release);
        });
    }

    fn end(&self, now_ms: u64) -> u32 {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let duration_secs = inner
                .start_ms
                .map_or(0, |start| (now_ms.saturating_sub(start) / 1000) as u32);
            inner.start_ms = None;
            inner.last_duration_secs = duration_secs;
            self.active.store(false, Ordering::Release);
            duration_secs
        })
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================Session Controller

/// Write side of the session state machine, owned by the dispatcher
/// worker.
///
/// Start order is load-bearing: the log must be open and the header
/// written before the state flips, so a storage failure aborts the start
/// with the tracker unchanged.
pub struct SessionController<'a, S: SessionLog> {
    tracker: &'a SessionTracker,
    log: S,
}

impl<'a, S: SessionLog> SessionController<'a, S> {
    pub fn new(tracker: &'a SessionTracker, log: S) -> Self {
        Self { tracker, log }
    }

    /// Start a session at uptime `now_ms`.
    ///
    /// Requests inside the boot guard window are rejected to suppress
    /// spurious triggers from uninitialized input lines. A start while
    /// already active leaves the running session untouched.
    pub async fn start(&mut self, now_ms: u64) -> Result<StartOutcome, SessionError<S::Error>> {
        if now_ms < SESSION_BOOT_GUARD_MS {
            #[cfg(feature = "defmt")]
            defmt::warn!("session start rejected during early boot ({} ms)", now_ms);
            return Ok(StartOutcome::BootGuarded);
        }
        if self.tracker.is_active() {
            return Ok(StartOutcome::AlreadyActive);
        }

        self.log.open().await.map_err(SessionError::LogOpen)?;
        if let Err(err) = self.log.write_line(CSV_HEADER).await {
            // Header write failed with the log already open.
            let _ = self.log.close().await;
            return Err(SessionError::LogWrite(err));
        }

        self.tracker.begin(now_ms);
        #[cfg(feature = "defmt")]
        defmt::info!("session started at {} ms", now_ms);
        Ok(StartOutcome::Started)
    }

    /// Stop the running session at uptime `now_ms`.
    ///
    /// The elapsed duration is recorded on the tracker before the log
    /// closes, so the stop acknowledgment can read it afterwards.
    pub async fn stop(&mut self, now_ms: u64) -> Result<StopOutcome, SessionError<S::Error>> {
        if !self.tracker.is_active() {
            return Ok(StopOutcome::AlreadyInactive);
        }

        let duration_secs = self.tracker.end(now_ms);
        #[cfg(feature = "defmt")]
        defmt::info!("session stopped after {} s", duration_secs);
        self.log.close().await.map_err(SessionError::LogClose)?;
        Ok(StopOutcome::Stopped { duration_secs })
    }

    /// Append one CSV sample line while a session is active.
    ///
    /// Returns `Ok(false)` when inactive; the line is dropped.
    pub async fn record_sample(&mut self, line: &str) -> Result<bool, SessionError<S::Error>> {
        if !self.tracker.is_active() {
            return Ok(false);
        }
        self.log
            .write_line(line)
            .await
            .map_err(SessionError::LogWrite)?;
        Ok(true)
    }

    /// Shared read side backing this controller.
    pub fn tracker(&self) -> &'a SessionTracker {
        self.tracker
    }
}

//==================================================================================Led Request

/// Cross-task LED request flags.
///
/// The dispatcher posts the wanted state here; the status observer
/// consumes it, drives the LED, and emits the led_state notification.
/// `on` is published before `pending`, so a consumer that sees the flag
/// also sees the state it belongs to.
pub struct LedRequest {
    pending: AtomicBool,
    on: AtomicBool,
}

impl LedRequest {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            on: AtomicBool::new(false),
        }
    }

    /// Post a request for the LED to be `on`.
    ///
    /// A second request before the first is consumed overwrites it; only
    /// the latest state matters.
    pub fn request(&self, on: bool) {
        self.on.store(on, Ordering::Relaxed);
        self.pending.store(true, Ordering::Release);
    }

    /// Consume the pending request, if any.
    pub fn take(&self) -> Option<bool> {
        if self.pending.swap(false, Ordering::Acquire) {
            Some(self.on.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}

impl Default for LedRequest {
    fn default() -> Self {
        Self::new()
    }
}
