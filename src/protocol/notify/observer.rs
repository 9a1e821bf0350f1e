//! Periodic status observer feeding the notification queue.
//!
//! A single task polls the shared state every 100 ms and turns what it
//! sees into notifications: LED requests become hardware writes plus an
//! `led_state` echo, session activation edges produce a `cpr_state`
//! announcement and the matching command acknowledgment, running sessions
//! report progress every five elapsed seconds, and slower cadences cover
//! the heartbeat, operator role and projected wall-clock time.
//!
//! Commands never touch the LED or the sink directly; they leave marks in
//! the shared state and this observer publishes them. The command worker
//! stays non-blocking no matter how congested the transport is.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::protocol::notify::{
    NotifyHandle, PRIORITY_CRITICAL, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM,
};
use crate::protocol::session::{LedRequest, SessionTracker};
use crate::protocol::store::DeviceStore;
use crate::protocol::traits::clock::Clock;
use crate::protocol::traits::led::Led;
use crate::protocol::wire::{NotifyKind, Role};

//==================================================================================Cadence

/// Poll period of the observer loop.
pub const POLL_INTERVAL_MS: u32 = 100;

/// Polls between two heartbeats (1 s).
const HEARTBEAT_TICKS: u32 = 10;

/// Polls between two role/wall-clock reports (5 s).
const STATUS_TICKS: u32 = 50;

/// Session progress is announced at elapsed-second multiples of this.
const CPR_TIME_STRIDE: u32 = 5;

/// Acknowledgment context byte for a session start.
const ACK_START: u8 = 0x01;
/// Acknowledgment context byte for a session stop.
const ACK_STOP: u8 = 0x02;
/// Acknowledgment status byte for success.
const ACK_OK: u8 = 0x00;

//==================================================================================Observer

/// Polling task bridging shared state to the notification queue.
pub struct StatusObserver<'a, L: Led, C: Clock> {
    handle: NotifyHandle<'a>,
    tracker: &'a SessionTracker,
    store: &'a DeviceStore,
    led_request: &'a LedRequest,
    led: L,
    clock: C,
    ticks: u32,
    heartbeat: u32,
    prev_active: bool,
    last_progress_secs: u32,
    last_role: Option<Role>,
}

impl<'a, L: Led, C: Clock> StatusObserver<'a, L, C> {
    pub fn new(
        handle: NotifyHandle<'a>,
        tracker: &'a SessionTracker,
        store: &'a DeviceStore,
        led_request: &'a LedRequest,
        led: L,
        clock: C,
    ) -> Self {
        Self {
            handle,
            tracker,
            store,
            led_request,
            led,
            clock,
            ticks: 0,
            heartbeat: 0,
            prev_active: false,
            last_progress_secs: 0,
            last_role: None,
        }
    }

    pub async fn drive(mut self) -> ! {
        loop {
            self.tick();
            self.clock.delay_ms(POLL_INTERVAL_MS).await;
        }
    }

    /// One observer pass over the shared state.
    fn tick(&mut self) {
        let now = self.clock.now_ms();

        if let Some(on) = self.led_request.take() {
            self.led.set(on);
            self.send(
                NotifyKind::LedState,
                &[u8::from(on)],
                PRIORITY_MEDIUM,
                false,
            );
        }

        let active = self.tracker.is_active();
        if active != self.prev_active {
            self.prev_active = active;
            self.announce_session_edge(active, now);
        }

        if active {
            self.announce_progress(now);
        }

        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % HEARTBEAT_TICKS == 0 {
            self.heartbeat = self.heartbeat.wrapping_add(1);
            self.send(
                NotifyKind::Heartbeat,
                &self.heartbeat.to_le_bytes(),
                PRIORITY_LOW,
                false,
            );
        }
        if self.ticks % STATUS_TICKS == 0 {
            self.announce_role();
            let time = self.store.now_string(now);
            self.send(NotifyKind::TimeData, time.as_bytes(), PRIORITY_LOW, false);
        }
    }

    /// Session edge: state announcement plus the matching acknowledgment.
    fn announce_session_edge(&mut self, active: bool, now_ms: u64) {
        self.send(
            NotifyKind::CprState,
            &[u8::from(active)],
            PRIORITY_HIGH,
            true,
        );

        let mut ack: Vec<u8, 24> = Vec::new();
        if active {
            self.last_progress_secs = 0;
            let clock = session_clock(self.tracker.elapsed_secs(now_ms));
            let _ = ack.push(ACK_START);
            let _ = ack.push(ACK_OK);
            let _ = ack.extend_from_slice(clock.as_bytes());
        } else {
            let duration = self.tracker.last_duration_secs();
            let clock = session_clock(duration);
            let wire_duration = u16::try_from(duration).unwrap_or(u16::MAX);
            let _ = ack.push(ACK_STOP);
            let _ = ack.push(ACK_OK);
            let _ = ack.extend_from_slice(&wire_duration.to_be_bytes());
            let _ = ack.extend_from_slice(clock.as_bytes());
        }
        self.send(NotifyKind::CprCmdAck, &ack, PRIORITY_CRITICAL, true);
    }

    /// Progress report at five-second session marks, once per mark.
    ///
    /// The announced value is the latest crossed mark, so a poll landing
    /// shortly after a boundary still reports it.
    fn announce_progress(&mut self, now_ms: u64) {
        let elapsed = self.tracker.elapsed_secs(now_ms);
        let mark = elapsed - elapsed % CPR_TIME_STRIDE;
        if mark == 0 || mark == self.last_progress_secs {
            return;
        }
        self.last_progress_secs = mark;

        let clock = session_clock(mark);
        let mut payload: Vec<u8, 24> = Vec::new();
        let _ = payload.extend_from_slice(&mark.to_be_bytes());
        let _ = payload.extend_from_slice(clock.as_bytes());
        self.send(NotifyKind::CprTime, &payload, PRIORITY_MEDIUM, false);
    }

    /// Role report, deduplicated on change.
    fn announce_role(&mut self) {
        let role = self.store.role();
        if self.last_role == Some(role) {
            return;
        }
        self.last_role = Some(role);
        self.send(NotifyKind::UserRole, &[role.byte()], PRIORITY_LOW, false);
    }

    fn send(&self, kind: NotifyKind, payload: &[u8], priority: u8, critical: bool) {
        if self.handle.enqueue(kind, payload, priority, critical).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("status notification dropped: {}", kind);
        }
    }
}

/// Render elapsed seconds as the display string `cpr:MM:SS`.
fn session_clock(elapsed_secs: u32) -> String<16> {
    let mut out = String::new();
    let _ = write!(out, "cpr:{:02}:{:02}", elapsed_secs / 60, elapsed_secs % 60);
    out
}
