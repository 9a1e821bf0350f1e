//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (frame decoding, command
//! dispatch, queue admission, session transitions, time-data parsing).
use thiserror_no_std::Error;

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors that can occur while encoding or decoding a wire frame.
pub enum FrameError {
    /// Destination buffer cannot hold the encoded frame.
    #[error("Buffer too small")]
    BufferTooSmall,
    /// Fewer bytes than the minimal frame (START, LEN, COLON, SEMICOLON, END).
    #[error("Frame too short: {len} bytes")]
    TooShort { len: usize },
    /// First byte is not the START marker.
    #[error("Invalid start byte: {byte:#04x}")]
    InvalidStart { byte: u8 },
    /// Declared data length exceeds the supported maximum.
    #[error("Declared payload too large: {data_len}")]
    PayloadTooLarge { data_len: usize },
    /// Declared data length does not fit in the received slice.
    #[error("Length mismatch: need {needed} bytes, got {available}")]
    LengthMismatch { needed: usize, available: usize },
    /// Third byte is not the COLON separator.
    #[error("Invalid colon byte: {byte:#04x}")]
    InvalidColon { byte: u8 },
    /// A trailer byte inside the received slice holds the wrong value.
    /// Trailer bytes beyond the declared length are tolerated (streamed input).
    #[error("Invalid trailer byte at offset {offset}: {byte:#04x}")]
    InvalidTrailer { offset: usize, byte: u8 },
    /// Structurally valid frame whose length field declares no command byte.
    #[error("Frame carries no command")]
    EmptyFrame,
}

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised while turning raw bytes into a [`Command`].
///
/// [`Command`]: crate::protocol::wire::Command
pub enum DecodeError {
    /// The frame structure itself is invalid.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Command byte outside the known command set.
    #[error("Unknown command byte: {cmd:#04x}")]
    UnknownCommand { cmd: u8 },
    /// Identity payload without an `in:`/`tr:` prefix.
    #[error("Identity payload without a recognized prefix")]
    MissingIdentityPrefix,
    /// Identity prefix present but no id bytes follow.
    #[error("Identity id is empty")]
    EmptyIdentity,
    /// Identity id bytes are not valid UTF-8.
    #[error("Identity id is not valid UTF-8")]
    IdentityEncoding,
}

//================================================================================DISPATCH

#[derive(Error, Debug, PartialEq, Eq)]
/// Submission failures reported to command producers.
pub enum SubmitError {
    /// Input exceeds the envelope capacity.
    #[error("Command too long: {len} bytes, capacity {capacity}")]
    TooLong { len: usize, capacity: usize },
    /// Envelope queue is full; the input is dropped by the caller.
    #[error("Command queue full")]
    QueueFull,
}

#[derive(Error, Debug)]
/// Failures produced by the synchronous decode-and-execute path.
///
/// The queued worker logs and drops these (its caller has already returned);
/// direct callers receive them.
pub enum DispatchError<E: core::fmt::Debug> {
    /// Input did not decode into a known command.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Session transition failed in the storage collaborator.
    #[error("Session transition failed: {0}")]
    Session(SessionError<E>),
    /// Time-data payload was rejected.
    #[error(transparent)]
    Time(#[from] TimeDataError),
}

//================================================================================SESSION

#[derive(Error, Debug)]
/// Errors encountered while starting or logging a training session.
pub enum SessionError<E: core::fmt::Debug> {
    /// Session log could not be opened; the session stays inactive.
    #[error("Session log open failed: {0:?}")]
    LogOpen(E),
    /// Header or sample write failed.
    #[error("Session log write failed: {0:?}")]
    LogWrite(E),
    /// Log close failed during stop; the session is inactive regardless.
    #[error("Session log close failed: {0:?}")]
    LogClose(E),
}

//================================================================================NOTIFY

#[derive(Error, Debug, PartialEq, Eq)]
/// Admission failures for the notification queue.
pub enum EnqueueError {
    /// Zero-length payloads carry no information.
    #[error("Empty notification payload")]
    EmptyPayload,
    /// Payload exceeds the per-slot capacity.
    #[error("Notification payload too large: {len}")]
    PayloadTooLarge { len: usize },
    /// No free slot and no evictable occupant of lower priority.
    #[error("Notification queue full")]
    QueueFull,
}

#[derive(Error, Debug)]
/// Delivery failure classification returned by [`NotifySink::deliver`].
///
/// The retry policy keys off this split: `Exhausted` feeds the
/// backoff/retry machinery, `Rejected` retires the notification.
///
/// [`NotifySink::deliver`]: crate::protocol::traits::notify_sink::NotifySink::deliver
pub enum SinkError<E: core::fmt::Debug> {
    /// Transport buffers exhausted; retry later.
    #[error("Delivery sink exhausted")]
    Exhausted,
    /// Non-recoverable refusal from the transport.
    #[error("Delivery rejected: {0:?}")]
    Rejected(E),
}

//================================================================================TIME_DATA

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised while parsing a time-data payload.
pub enum TimeDataError {
    /// Payload shorter than the 14-digit `YYYYMMDDHHMMSS` layout.
    #[error("Time data too short: {len} bytes")]
    TooShort { len: usize },
    /// A fixed-width field contains a non-digit byte.
    #[error("Non-digit in field {field}")]
    NonDigit { field: &'static str },
    /// A parsed field lies outside its valid calendar range.
    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u16 },
}
