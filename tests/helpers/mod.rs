/// Test doubles to simulate the notification transport, session storage,
/// LED and clock during integration tests.
use manikin_link::error::SinkError;
use manikin_link::protocol::traits::{
    clock::Clock, led::Led, notify_sink::NotifySink, session_log::SessionLog,
};
use manikin_link::protocol::wire::NotifyKind;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::yield_now;
use tokio::time::{sleep, timeout, Duration};

#[derive(Clone, Copy, Debug)]
#[allow(dead_code)]
/// Scripted outcome for an upcoming delivery attempt.
pub enum SinkFailure {
    Exhausted,
    Rejected,
}

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory transport reproducing the `NotifySink` contract.
///
/// Scripted failures are consumed first-in-first-out, one per delivery
/// attempt; once the script is empty every delivery succeeds and lands in
/// the probe.
pub struct MockSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    failures: Arc<Mutex<VecDeque<SinkFailure>>>,
}

#[allow(dead_code)]
/// Host-side view of everything the sink delivered.
pub struct SinkProbe {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[allow(dead_code)]
impl MockSink {
    /// Construct a sink plus the probe observing its deliveries.
    pub fn create() -> (Self, SinkProbe) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                failures: Arc::new(Mutex::new(VecDeque::new())),
            },
            SinkProbe { rx },
        )
    }

    /// Script a failure for the next delivery attempt.
    pub fn push_failure(&self, failure: SinkFailure) {
        self.failures.lock().unwrap().push_back(failure);
    }
}

impl NotifySink for MockSink {
    type Error = ();

    async fn deliver<'a>(&'a mut self, bytes: &'a [u8]) -> Result<(), SinkError<()>> {
        if let Some(failure) = self.failures.lock().unwrap().pop_front() {
            return Err(match failure {
                SinkFailure::Exhausted => SinkError::Exhausted,
                SinkFailure::Rejected => SinkError::Rejected(()),
            });
        }
        self.tx.send(bytes.to_vec()).map_err(|_| SinkError::Rejected(()))
    }
}

#[allow(dead_code)]
impl SinkProbe {
    /// Next delivered frame; a stalled runner fails the test instead of
    /// hanging it.
    pub async fn next_frame(&mut self) -> Vec<u8> {
        timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a delivery")
            .expect("sink closed")
    }

    /// Next delivered frame of the given kind, skipping the rest.
    pub async fn next_frame_of(&mut self, kind: NotifyKind) -> Vec<u8> {
        loop {
            let frame = self.next_frame().await;
            if frame[3] == kind.byte() {
                return frame;
            }
        }
    }

    /// Assert that nothing is delivered within the window.
    pub async fn expect_quiet(&mut self, window: Duration) {
        if let Ok(Some(frame)) = timeout(window, self.rx.recv()).await {
            panic!("unexpected delivery: {frame:02X?}");
        }
    }
}

/// Payload slice of a delivered frame (between command slot and trailer).
#[allow(dead_code)]
pub fn frame_payload(frame: &[u8]) -> &[u8] {
    &frame[4..frame.len() - 2]
}

#[derive(Clone)]
#[allow(dead_code)]
/// Manually steered clock shared across the device tasks.
///
/// `delay_ms` advances the shared time instantly and yields, so periodic
/// tasks spin through their cadences in virtual time.
pub struct MockClock {
    now: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Relaxed);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }

    async fn delay_ms<'a>(&'a mut self, millis: u32) {
        self.now.fetch_add(u64::from(millis), Ordering::Relaxed);
        yield_now().await;
    }
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// In-memory session log recording every line, with scriptable failures.
pub struct MockLog {
    lines: Arc<Mutex<Vec<String>>>,
    opens: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
    fail_opens: Arc<AtomicU32>,
    fail_writes: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl MockLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::Relaxed)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::Relaxed)
    }

    /// Fail the next `open` call.
    pub fn fail_next_open(&self) {
        self.fail_opens.fetch_add(1, Ordering::Relaxed);
    }

    /// Fail the next `write_line` call.
    pub fn fail_next_write(&self) {
        self.fail_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn consume(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl SessionLog for MockLog {
    type Error = ();

    async fn open<'a>(&'a mut self) -> Result<(), ()> {
        if Self::consume(&self.fail_opens) {
            return Err(());
        }
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write_line<'a>(&'a mut self, line: &'a str) -> Result<(), ()> {
        if Self::consume(&self.fail_writes) {
            return Err(());
        }
        self.lines.lock().unwrap().push(line.to_owned());
        Ok(())
    }

    async fn close<'a>(&'a mut self) -> Result<(), ()> {
        self.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// Feedback LED double recording every write.
pub struct MockLed {
    history: Arc<Mutex<Vec<bool>>>,
}

#[allow(dead_code)]
impl MockLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<bool> {
        self.history.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<bool> {
        self.history.lock().unwrap().last().copied()
    }
}

impl Led for MockLed {
    fn set(&mut self, on: bool) {
        self.history.lock().unwrap().push(on);
    }
}

#[allow(dead_code)]
/// Poll `predicate` until it holds, bounded so a stuck worker fails the
/// test instead of hanging it.
pub async fn wait_for(mut predicate: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !predicate() {
            yield_now().await;
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}
