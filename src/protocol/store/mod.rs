//! Device-wide state shared between the dispatcher and the notification
//! observers: the last-assigned instructor/trainee identities, the role
//! derived from them, and the software clock base used to project wall
//! time without a hardware RTC.
//!
//! The store is lock-cheap by construction: every access copies a small
//! value in or out under a short critical section, and the clock
//! projection runs on plain integers outside the lock.

use core::cell::RefCell;
use core::fmt;
use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::String;

use crate::config::MAX_ID_LEN;
use crate::error::TimeDataError;
use crate::protocol::wire::Role;

//==================================================================================Constants

/// Length of a formatted `YYYY-MM-DD HH:MM:SS` timestamp.
pub const TIME_STRING_LEN: usize = 19;

/// Timestamp reported before any time data has been accepted.
pub const FALLBACK_TIME: &str = "2023-01-01 12:00:00";

/// Minimum time-data payload: the 14-digit `YYYYMMDDHHMMSS` layout.
/// Two further sub-second digits may follow and are ignored.
pub const TIME_DATA_MIN_LEN: usize = 14;

/// Year range accepted from time-data payloads.
const YEAR_MIN: u16 = 2023;
const YEAR_MAX: u16 = 2100;

/// Elapsed-seconds ceiling for clock projection (~3 years).
/// Bounds the month-carry loop when the anchor has gone stale.
const MAX_PROJECTION_SECS: u64 = 100_000_000;

/// Days per month in a common year; February is adjusted separately.
const DAYS_IN_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A bounded identity string copied out of the store.
pub type IdString = String<MAX_ID_LEN>;

/// A formatted timestamp copied out of the store.
pub type TimeString = String<TIME_STRING_LEN>;

//==================================================================================Calendar Time

/// Six-field calendar timestamp with carry arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CalendarTime {
    /// Advance by whole `seconds`, carrying through minutes, hours, days,
    /// months, and years. February stretches to 29 days in leap years.
    pub fn advanced_by(mut self, seconds: u64) -> Self {
        let total_seconds = self.second as u64 + seconds;
        self.second = (total_seconds % 60) as u8;
        let total_minutes = self.minute as u64 + total_seconds / 60;
        self.minute = (total_minutes % 60) as u8;
        let total_hours = self.hour as u64 + total_minutes / 60;
        self.hour = (total_hours % 24) as u8;

        let mut day = self.day as u64 + total_hours / 24;
        loop {
            let month_days = days_in_month(self.year, self.month) as u64;
            if day <= month_days {
                break;
            }
            day -= month_days;
            self.month += 1;
            if self.month > 12 {
                self.month = 1;
                self.year += 1;
            }
        }
        self.day = day as u8;
        self
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Gregorian leap-year rule.
const fn is_leap_year(year: u16) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Days in `month` of `year`; `month` must be in `1..=12`.
const fn days_in_month(year: u16, month: u8) -> u8 {
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS_IN_MONTH[(month - 1) as usize]
    }
}

//==================================================================================Time Data Parsing

/// Parse the positional `YYYYMMDDHHMMSS` layout into calendar fields.
///
/// Each field is a fixed-width ASCII-digit substring; a non-digit anywhere
/// in the first 14 bytes or an out-of-range value rejects the whole
/// payload. Bytes beyond the 14th (the optional sub-second unit) are not
/// inspected.
pub fn parse_time_data(payload: &[u8]) -> Result<CalendarTime, TimeDataError> {
    if payload.len() < TIME_DATA_MIN_LEN {
        return Err(TimeDataError::TooShort { len: payload.len() });
    }

    let year = parse_digits(&payload[0..4], "year")?;
    let month = parse_digits(&payload[4..6], "month")?;
    let day = parse_digits(&payload[6..8], "day")?;
    let hour = parse_digits(&payload[8..10], "hour")?;
    let minute = parse_digits(&payload[10..12], "minute")?;
    let second = parse_digits(&payload[12..14], "second")?;

    check_range(year, YEAR_MIN, YEAR_MAX, "year")?;
    check_range(month, 1, 12, "month")?;
    check_range(day, 1, 31, "day")?;
    check_range(hour, 0, 23, "hour")?;
    check_range(minute, 0, 59, "minute")?;
    check_range(second, 0, 59, "second")?;

    Ok(CalendarTime {
        year,
        month: month as u8,
        day: day as u8,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
    })
}

fn parse_digits(digits: &[u8], field: &'static str) -> Result<u16, TimeDataError> {
    let mut value: u16 = 0;
    for &byte in digits {
        if !byte.is_ascii_digit() {
            return Err(TimeDataError::NonDigit { field });
        }
        value = value * 10 + (byte - b'0') as u16;
    }
    Ok(value)
}

fn check_range(
    value: u16,
    min: u16,
    max: u16,
    field: &'static str,
) -> Result<(), TimeDataError> {
    if value < min || value > max {
        return Err(TimeDataError::OutOfRange { field, value });
    }
    Ok(())
}

//==================================================================================Device Store

/// Accepted calendar fields plus the monotonic tick they anchor to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct TimeBase {
    calendar: CalendarTime,
    anchor_ms: u64,
}

#[derive(Debug)]
struct StoreInner {
    instructor_id: IdString,
    trainee_id: IdString,
    role: Role,
    time_base: Option<TimeBase>,
}

/// Shared identity/role/clock state.
///
/// The dispatcher worker is the only writer; observers read snapshots.
/// All methods take `&self` so the store can sit in a `static` and be
/// handed out by reference to every task.
pub struct DeviceStore {
    inner: Mutex<CriticalSectionRawMutex, RefCell<StoreInner>>,
}

impl DeviceStore {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(StoreInner {
                instructor_id: String::new(),
                trainee_id: String::new(),
                role: Role::None,
                time_base: None,
            })),
        }
    }

    /// Record an identity assignment and derive the current role from it.
    ///
    /// Ids longer than [`MAX_ID_LEN`] are truncated on a character
    /// boundary. The two ids are independent; only the role tracks which
    /// was set last.
    pub fn set_identity(&self, role: Role, id: &str) {
        let id = truncate_id(id);
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            let slot = match role {
                Role::Instructor => &mut inner.instructor_id,
                Role::Trainee => &mut inner.trainee_id,
                // Decoded identity commands always carry a concrete role.
                Role::None => return,
            };
            slot.clear();
            let _ = slot.push_str(id);
            inner.role = role;
        });
    }

    /// Last instructor id, empty until one was assigned.
    pub fn instructor_id(&self) -> IdString {
        self.inner.lock(|inner| inner.borrow().instructor_id.clone())
    }

    /// Last trainee id, empty until one was assigned.
    pub fn trainee_id(&self) -> IdString {
        self.inner.lock(|inner| inner.borrow().trainee_id.clone())
    }

    /// Role of the most recent identity assignment.
    pub fn role(&self) -> Role {
        self.inner.lock(|inner| inner.borrow().role)
    }

    /// Parse a time-data payload and anchor it at `anchor_ms`.
    ///
    /// On any parse or range failure the previous time base (or unset
    /// state) is retained.
    pub fn set_time(&self, payload: &[u8], anchor_ms: u64) -> Result<(), TimeDataError> {
        let calendar = parse_time_data(payload)?;
        self.inner.lock(|inner| {
            inner.borrow_mut().time_base = Some(TimeBase {
                calendar,
                anchor_ms,
            });
        });
        Ok(())
    }

    /// Whether a time base has been accepted since boot.
    pub fn has_time_base(&self) -> bool {
        self.inner.lock(|inner| inner.borrow().time_base.is_some())
    }

    /// Project the current calendar time from the anchored base.
    ///
    /// Returns `None` with no base set, or once the anchor is further in
    /// the past than the projection ceiling.
    pub fn now(&self, now_ms: u64) -> Option<CalendarTime> {
        let base = self.inner.lock(|inner| inner.borrow().time_base)?;
        let elapsed_secs = now_ms.saturating_sub(base.anchor_ms) / 1000;
        if elapsed_secs >= MAX_PROJECTION_SECS {
            return None;
        }
        Some(base.calendar.advanced_by(elapsed_secs))
    }

    /// Projected time as `YYYY-MM-DD HH:MM:SS`, or [`FALLBACK_TIME`] when
    /// no usable base exists.
    pub fn now_string(&self, now_ms: u64) -> TimeString {
        let mut out = TimeString::new();
        match self.now(now_ms) {
            Some(time) => {
                let _ = write!(out, "{time}");
            }
            None => {
                let _ = out.push_str(FALLBACK_TIME);
            }
        }
        out
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp an id to [`MAX_ID_LEN`] bytes without splitting a character.
fn truncate_id(id: &str) -> &str {
    if id.len() <= MAX_ID_LEN {
        return id;
    }
    let mut end = MAX_ID_LEN;
    while !id.is_char_boundary(end) {
        end -= 1;
    }
    &id[..end]
}
