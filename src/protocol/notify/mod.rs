//! Priority-queued delivery of outbound notifications.
//!
//! The transport's notification buffer is small and frequently exhausted,
//! so producers never send directly. They enqueue into a fixed slot table
//! with priority-based admission, and a single runner drains it: highest
//! priority first, exponential backoff with jitter on transient failures,
//! retries reserved for high-priority and critical items, and graceful
//! dropping of low-priority items under sustained pressure.
//!
//! Each slot moves through an explicit state machine (`Pending` →
//! `InFlight` → freed or `BackingOff(deadline)`), driven by the runner
//! alone. Producers only ever flip `Free` slots to `Pending`.

pub mod observer;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use futures_util::{
    future::{select, Either},
    pin_mut,
};
use rand_core::RngCore;

use crate::config::{NotifyConfig, MAX_NOTIFY_PAYLOAD, NOTIFY_CAPACITY, NOTIFY_SLOTS};
use crate::error::{EnqueueError, SinkError};
use crate::protocol::traits::clock::Clock;
use crate::protocol::traits::notify_sink::NotifySink;
use crate::protocol::wire::{self, NotifyKind};

//==================================================================================Priorities

/// Routine telemetry (heartbeat, wall-clock, role).
pub const PRIORITY_LOW: u8 = 10;
/// Operator feedback (LED state, session progress).
pub const PRIORITY_MEDIUM: u8 = 50;
/// Session edges; at or above this level items earn delivery retries.
pub const PRIORITY_HIGH: u8 = 70;
/// Command acknowledgments.
pub const PRIORITY_CRITICAL: u8 = 90;

//==================================================================================Slot Table

/// Delivery state of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    /// Admitted, waiting for the runner.
    Pending,
    /// Bytes copied out by the runner, delivery in progress.
    InFlight,
    /// Transient failure, eligible again once the deadline passes.
    BackingOff { deadline_ms: u64 },
}

#[derive(Clone, Copy)]
struct Slot {
    data: [u8; NOTIFY_CAPACITY],
    len: usize,
    priority: u8,
    critical: bool,
    retry_count: u8,
    state: SlotState,
}

impl Slot {
    const FREE: Self = Self {
        data: [0; NOTIFY_CAPACITY],
        len: 0,
        priority: 0,
        critical: false,
        retry_count: 0,
        state: SlotState::Free,
    };
}

struct QueueInner {
    slots: [Slot; NOTIFY_SLOTS],
    count: usize,
    error_count: u32,
    last_error_ms: u64,
}

/// Snapshot handed to the runner for one delivery attempt.
///
/// The framed bytes are copied out under the lock so the table stays
/// unlocked while the sink works.
struct DeliveryJob {
    index: usize,
    data: [u8; NOTIFY_CAPACITY],
    len: usize,
    priority: u8,
    critical: bool,
    retry_count: u8,
}

/// Outcome of one table scan.
enum Scan {
    /// Highest-priority ready slot, now marked in flight.
    Ready(DeliveryJob),
    /// Nothing ready; earliest backoff deadline to wait for.
    Wait { deadline_ms: u64 },
    /// Table empty.
    Idle,
}

/// Fixed-capacity notification table shared by producers and the runner.
///
/// Producers call [`enqueue`](Self::enqueue) from any task; it is
/// non-blocking, copies the framed bytes into a slot under a short
/// critical section, and rings the runner's doorbell.
pub struct NotifyQueue {
    config: NotifyConfig,
    inner: Mutex<CriticalSectionRawMutex, RefCell<QueueInner>>,
    doorbell: Channel<CriticalSectionRawMutex, (), 1>,
}

impl NotifyQueue {
    pub const fn new() -> Self {
        Self::with_config(NotifyConfig::DEFAULT)
    }

    pub const fn with_config(config: NotifyConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(RefCell::new(QueueInner {
                slots: [Slot::FREE; NOTIFY_SLOTS],
                count: 0,
                error_count: 0,
                last_error_ms: 0,
            })),
            doorbell: Channel::new(),
        }
    }

    /// Delivery tuning this queue was built with.
    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// Admit a notification, framing `payload` under `kind`.
    ///
    /// Admission with a full table replaces the lowest-priority
    /// non-critical occupant (lowest index among ties), and only when the
    /// new item's priority is strictly greater or the new item is
    /// critical. A table of all-critical items rejects everything,
    /// critical included. In-flight bytes are never replaced.
    pub fn enqueue(
        &self,
        kind: NotifyKind,
        payload: &[u8],
        priority: u8,
        critical: bool,
    ) -> Result<(), EnqueueError> {
        if payload.is_empty() {
            return Err(EnqueueError::EmptyPayload);
        }
        if payload.len() > MAX_NOTIFY_PAYLOAD {
            return Err(EnqueueError::PayloadTooLarge { len: payload.len() });
        }

        let mut framed = [0u8; NOTIFY_CAPACITY];
        // Cannot exceed the slot: the payload bound leaves room for framing.
        let len = wire::encode(&mut framed, kind.byte(), payload)
            .map_err(|_| EnqueueError::PayloadTooLarge { len: payload.len() })?;

        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();

            let index = if inner.count < NOTIFY_SLOTS {
                inner
                    .slots
                    .iter()
                    .position(|slot| slot.state == SlotState::Free)
            } else {
                let mut victim: Option<(usize, u8)> = None;
                for (index, slot) in inner.slots.iter().enumerate() {
                    if slot.critical || slot.state == SlotState::InFlight {
                        continue;
                    }
                    if victim.map_or(true, |(_, pri)| slot.priority < pri) {
                        victim = Some((index, slot.priority));
                    }
                }
                match victim {
                    Some((index, pri)) if priority > pri || critical => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!(
                            "notify table full, replacing pri {} with pri {}",
                            pri,
                            priority
                        );
                        Some(index)
                    }
                    _ => None,
                }
            };

            let Some(index) = index else {
                return Err(EnqueueError::QueueFull);
            };

            let taking_free_slot = inner.slots[index].state == SlotState::Free;
            let slot = &mut inner.slots[index];
            slot.data[..len].copy_from_slice(&framed[..len]);
            slot.len = len;
            slot.priority = priority;
            slot.critical = critical;
            slot.retry_count = 0;
            slot.state = SlotState::Pending;
            if taking_free_slot {
                inner.count += 1;
            }
            Ok(())
        })?;

        // Wake the runner; a full doorbell already holds a wakeup.
        let _ = self.doorbell.try_send(());
        Ok(())
    }

    /// Occupied slots, in-flight included.
    pub fn len(&self) -> usize {
        self.inner.lock(|inner| inner.borrow().count)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued notification.
    ///
    /// A delivery already in flight completes, but its slot is gone; the
    /// runner's follow-up bookkeeping lands on a freed slot and is
    /// ignored.
    pub fn clear(&self) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            inner.slots = [Slot::FREE; NOTIFY_SLOTS];
            inner.count = 0;
        });
        #[cfg(feature = "defmt")]
        defmt::info!("notify table cleared");
    }

    /// Whether transient errors inside the sliding window have reached
    /// the pressure threshold.
    pub fn under_pressure(&self, now_ms: u64) -> bool {
        self.windowed_errors(now_ms) >= self.config.pressure_threshold
    }

    /// Pick the highest-priority ready slot and mark it in flight.
    ///
    /// Ready means `Pending`, or `BackingOff` past its deadline. Ties
    /// break towards the lowest index, keeping delivery order
    /// deterministic.
    fn scan(&self, now_ms: u64) -> Scan {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let mut best: Option<(usize, u8)> = None;
            let mut earliest: Option<u64> = None;

            for (index, slot) in inner.slots.iter().enumerate() {
                let ready = match slot.state {
                    SlotState::Free | SlotState::InFlight => continue,
                    SlotState::Pending => true,
                    SlotState::BackingOff { deadline_ms } => {
                        if deadline_ms <= now_ms {
                            true
                        } else {
                            earliest =
                                Some(earliest.map_or(deadline_ms, |e| e.min(deadline_ms)));
                            false
                        }
                    }
                };
                if ready && best.map_or(true, |(_, pri)| slot.priority > pri) {
                    best = Some((index, slot.priority));
                }
            }

            match (best, earliest) {
                (Some((index, _)), _) => {
                    let slot = &mut inner.slots[index];
                    slot.state = SlotState::InFlight;
                    Scan::Ready(DeliveryJob {
                        index,
                        data: slot.data,
                        len: slot.len,
                        priority: slot.priority,
                        critical: slot.critical,
                        retry_count: slot.retry_count,
                    })
                }
                (None, Some(deadline_ms)) => Scan::Wait { deadline_ms },
                (None, None) => Scan::Idle,
            }
        })
    }

    /// Free a slot after delivery, permanent failure, or retry
    /// exhaustion. No-op if the slot was cleared mid-flight.
    fn retire(&self, index: usize) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.slots[index].state == SlotState::InFlight {
                inner.slots[index].state = SlotState::Free;
                inner.count = inner.count.saturating_sub(1);
            }
        });
    }

    /// Consume one retry and park the slot until `deadline_ms`.
    fn back_off(&self, index: usize, deadline_ms: u64) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let slot = &mut inner.slots[index];
            if slot.state == SlotState::InFlight {
                slot.retry_count += 1;
                slot.state = SlotState::BackingOff { deadline_ms };
            }
        });
    }

    /// Count a transient sink failure; returns the windowed total.
    fn record_error(&self, now_ms: u64) -> u32 {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if now_ms.saturating_sub(inner.last_error_ms) > self.config.error_window_ms {
                inner.error_count = 0;
            }
            inner.error_count += 1;
            inner.last_error_ms = now_ms;
            inner.error_count
        })
    }

    fn windowed_errors(&self, now_ms: u64) -> u32 {
        self.inner.lock(|inner| {
            let inner = inner.borrow();
            if now_ms.saturating_sub(inner.last_error_ms) > self.config.error_window_ms {
                0
            } else {
                inner.error_count
            }
        })
    }
}

impl Default for NotifyQueue {
    fn default() -> Self {
        Self::new()
    }
}

//==================================================================================Service

/// Service assembling the notification components.
///
/// Firmware provides the shared [`NotifyQueue`] (usually a `static`), the
/// delivery sink, a clock, and a jitter RNG, then splits the service into
/// a producer handle and the runner task.
pub struct NotifyService<'a, S: NotifySink, C: Clock, R: RngCore> {
    queue: &'a NotifyQueue,
    sink: S,
    clock: C,
    rng: R,
}

impl<'a, S: NotifySink, C: Clock, R: RngCore> NotifyService<'a, S, C, R> {
    pub fn new(queue: &'a NotifyQueue, sink: S, clock: C, rng: R) -> Self {
        Self {
            queue,
            sink,
            clock,
            rng,
        }
    }

    /// Split into handle/runner components.
    pub fn into_parts(self) -> NotifyParts<'a, S, C, R> {
        NotifyParts {
            handle: NotifyHandle { queue: self.queue },
            runner: NotifyRunner {
                queue: self.queue,
                sink: self.sink,
                clock: self.clock,
                rng: self.rng,
                last_send_ms: None,
            },
        }
    }
}

/// Bundle returned by [`NotifyService::into_parts`].
pub struct NotifyParts<'a, S: NotifySink, C: Clock, R: RngCore> {
    pub handle: NotifyHandle<'a>,
    pub runner: NotifyRunner<'a, S, C, R>,
}

/// Producer-side handle, freely copyable across tasks.
#[derive(Clone, Copy)]
pub struct NotifyHandle<'a> {
    queue: &'a NotifyQueue,
}

impl<'a> NotifyHandle<'a> {
    pub fn enqueue(
        &self,
        kind: NotifyKind,
        payload: &[u8],
        priority: u8,
        critical: bool,
    ) -> Result<(), EnqueueError> {
        self.queue.enqueue(kind, payload, priority, critical)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&self) {
        self.queue.clear()
    }

    pub fn under_pressure(&self, now_ms: u64) -> bool {
        self.queue.under_pressure(now_ms)
    }
}

//==================================================================================Runner

/// Single delivery driver draining the slot table.
pub struct NotifyRunner<'a, S: NotifySink, C: Clock, R: RngCore> {
    queue: &'a NotifyQueue,
    sink: S,
    clock: C,
    rng: R,
    last_send_ms: Option<u64>,
}

impl<'a, S: NotifySink, C: Clock, R: RngCore> NotifyRunner<'a, S, C, R> {
    pub async fn drive(mut self) -> ! {
        loop {
            let now = self.clock.now_ms();
            match self.queue.scan(now) {
                Scan::Ready(job) => self.attempt(job).await,
                Scan::Wait { deadline_ms } => self.wait_for_deadline(deadline_ms).await,
                Scan::Idle => {
                    let queue = self.queue;
                    queue.doorbell.receive().await;
                }
            }
        }
    }

    /// One delivery attempt with the slot's bytes already copied out.
    async fn attempt(&mut self, job: DeliveryJob) {
        self.pace().await;

        match self.sink.deliver(&job.data[..job.len]).await {
            Ok(()) => {
                self.queue.retire(job.index);
                #[cfg(feature = "defmt")]
                defmt::trace!("notification delivered (pri {})", job.priority);
            }
            Err(SinkError::Rejected(_err)) => {
                // Permanent refusal, the retry budget stays unspent.
                self.queue.retire(job.index);
                #[cfg(feature = "defmt")]
                defmt::warn!("notification rejected by sink (pri {})", job.priority);
            }
            Err(SinkError::Exhausted) => {
                let now = self.clock.now_ms();
                let pressure = self.queue.record_error(now);
                let config = self.queue.config();
                let eligible = (job.priority >= config.high_priority || job.critical)
                    && job.retry_count < config.max_retries;
                if eligible {
                    let backoff = self.backoff_ms(job.retry_count, pressure);
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "sink exhausted, retry {}/{} in {} ms",
                        job.retry_count + 1,
                        self.queue.config().max_retries,
                        backoff
                    );
                    self.queue.back_off(job.index, now + backoff as u64);
                } else {
                    self.queue.retire(job.index);
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "notification dropped, sink exhausted (pri {}, retries {})",
                        job.priority,
                        job.retry_count
                    );
                }
                // Bounded pause so the transport can drain its buffers.
                let recovery = self.queue.config().recovery_delay_ms;
                self.clock.delay_ms(recovery).await;
            }
        }

        // Under sustained pressure, hold off instead of rescanning hot.
        let now = self.clock.now_ms();
        if !self.queue.is_empty() && self.queue.under_pressure(now) {
            let recovery = self.queue.config().recovery_delay_ms;
            self.clock.delay_ms(recovery).await;
        }
    }

    /// Keep deliveries at least `min_send_interval_ms` apart.
    async fn pace(&mut self) {
        let interval = self.queue.config().min_send_interval_ms;
        if let Some(last) = self.last_send_ms {
            let now = self.clock.now_ms();
            let next_allowed = last.saturating_add(interval);
            if now < next_allowed {
                self.clock.delay_ms((next_allowed - now) as u32).await;
            }
        }
        self.last_send_ms = Some(self.clock.now_ms());
    }

    /// Sleep towards the earliest backoff deadline, waking early on a
    /// fresh enqueue.
    async fn wait_for_deadline(&mut self, deadline_ms: u64) {
        let now = self.clock.now_ms();
        let millis = deadline_ms.saturating_sub(now).min(u32::MAX as u64) as u32;

        let queue = self.queue;
        let doorbell = queue.doorbell.receive();
        let timer = self.clock.delay_ms(millis);
        pin_mut!(doorbell);
        pin_mut!(timer);
        match select(doorbell, timer).await {
            Either::Left(_) | Either::Right(_) => {}
        }
    }

    /// `base * 2^retry + pressure surcharge + jitter`, capped.
    fn backoff_ms(&mut self, retry_count: u8, pressure: u32) -> u32 {
        let config = self.queue.config();
        let factor = 1u32.checked_shl(u32::from(retry_count)).unwrap_or(u32::MAX);
        let mut backoff = config.backoff_base_ms.saturating_mul(factor);
        if pressure > config.pressure_threshold {
            backoff = backoff.saturating_add(pressure.saturating_mul(config.backoff_base_ms));
        }
        if config.jitter_ms > 0 {
            backoff = backoff.saturating_add(self.rng.next_u32() % config.jitter_ms);
        }
        backoff.min(config.backoff_cap_ms)
    }
}
