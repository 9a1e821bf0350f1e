//! Wire framing for the command/telemetry link: a single frame shape
//! (START, length, COLON, data, SEMICOLON, END) carries operator commands
//! inbound and status notifications outbound, plus two unframed legacy
//! identity commands recognized by prefix.
use crate::config::COMMAND_CAPACITY;
use crate::error::{DecodeError, FrameError};

//==================================================================================Constants

/// First byte of every frame.
pub const FRAME_START: u8 = 0x01;
/// Separator between the frame header and the data region.
pub const FRAME_COLON: u8 = 0x3A;
/// First trailer byte.
pub const FRAME_SEMICOLON: u8 = 0x3B;
/// Final trailer byte.
pub const FRAME_END: u8 = 0x17;

/// Framing bytes around the data region (START, LEN, COLON, SEMICOLON, END).
pub const FRAME_OVERHEAD: usize = 5;
/// Shortest slice `decode` accepts.
pub const MIN_FRAME_LEN: usize = 5;
/// Upper bound for the declared data length (command byte plus payload).
pub const MAX_DATA_LEN: usize = COMMAND_CAPACITY;

/// Switch the feedback LED off.
pub const CMD_LED_OFF: u8 = 0x00;
/// Switch the feedback LED on.
pub const CMD_LED_ON: u8 = 0x01;
/// Start a CPR training session.
pub const CMD_CPR_START: u8 = 0x02;
/// Stop the running CPR training session.
pub const CMD_CPR_STOP: u8 = 0x03;
/// Data payload command; sub-payload carries a prefixed identity string.
pub const CMD_DATA: u8 = 0x04;
/// Time-data payload command (`YYYYMMDDHHMMSS[SS]` ASCII digits).
pub const CMD_TIME_DATA: u8 = 0x05;

/// Prefix marking an instructor identity assignment.
pub const INSTRUCTOR_PREFIX: &[u8] = b"in:";
/// Prefix marking a trainee identity assignment.
pub const TRAINEE_PREFIX: &[u8] = b"tr:";

/// Ack id for a session start.
pub const ACK_CPR_START: u8 = 0x01;
/// Ack id for a session stop.
pub const ACK_CPR_STOP: u8 = 0x02;
/// Ack status byte: command applied.
pub const ACK_STATUS_OK: u8 = 0x00;
/// Ack status byte: command failed.
pub const ACK_STATUS_ERROR: u8 = 0x01;

//==================================================================================Message Types

/// Message-type byte of an outbound notification frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NotifyKind {
    /// Liveness counter.
    Heartbeat = 0x01,
    /// Feedback LED state.
    LedState = 0x10,
    /// Projected wall-clock time.
    TimeData = 0x20,
    /// Session progress (elapsed seconds plus display string).
    CprTime = 0x30,
    /// Session active/inactive edge.
    CprState = 0x40,
    /// Current operator role.
    UserRole = 0x50,
    /// Command acknowledgment.
    CprCmdAck = 0x60,
}

impl NotifyKind {
    /// Wire value of the message type.
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Reverse lookup used by test harnesses inspecting delivered frames.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Heartbeat),
            0x10 => Some(Self::LedState),
            0x20 => Some(Self::TimeData),
            0x30 => Some(Self::CprTime),
            0x40 => Some(Self::CprState),
            0x50 => Some(Self::UserRole),
            0x60 => Some(Self::CprCmdAck),
            _ => None,
        }
    }
}

/// Operator role derived from the most recent identity assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Role {
    None = 0,
    Instructor = 1,
    Trainee = 2,
}

impl Role {
    /// Wire value used in user-role notifications.
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

//==================================================================================Frame Codec

/// A structurally decoded frame: command byte plus borrowed payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    pub cmd: u8,
    pub payload: &'a [u8],
}

/// Encode `cmd` and `payload` into `buf` as one frame.
///
/// Returns the number of bytes written (`6 + payload.len()`). The same
/// shape frames outbound notifications, with the message type in the
/// command slot.
pub fn encode(buf: &mut [u8], cmd: u8, payload: &[u8]) -> Result<usize, FrameError> {
    let data_len = payload.len() + 1;
    if data_len > u8::MAX as usize {
        return Err(FrameError::PayloadTooLarge { data_len });
    }
    let total = FRAME_OVERHEAD + data_len;
    if buf.len() < total {
        return Err(FrameError::BufferTooSmall);
    }

    buf[0] = FRAME_START;
    buf[1] = data_len as u8;
    buf[2] = FRAME_COLON;
    buf[3] = cmd;
    buf[4..4 + payload.len()].copy_from_slice(payload);
    buf[4 + payload.len()] = FRAME_SEMICOLON;
    buf[5 + payload.len()] = FRAME_END;

    Ok(total)
}

/// Decode one frame out of `bytes`.
///
/// Validation order matches the companion-app protocol: minimum length,
/// START, declared length sanity, total-length consistency, COLON, then
/// the trailer bytes. Trailer offsets follow from the declared length:
/// input longer than the declared frame is accepted with the excess
/// ignored, while a trailer byte holding the wrong value is rejected.
pub fn decode(bytes: &[u8]) -> Result<CommandFrame<'_>, FrameError> {
    if bytes.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort { len: bytes.len() });
    }
    if bytes[0] != FRAME_START {
        return Err(FrameError::InvalidStart { byte: bytes[0] });
    }

    let data_len = bytes[1] as usize;
    if data_len > MAX_DATA_LEN {
        return Err(FrameError::PayloadTooLarge { data_len });
    }
    let needed = FRAME_OVERHEAD + data_len;
    if needed > bytes.len() {
        return Err(FrameError::LengthMismatch {
            needed,
            available: bytes.len(),
        });
    }

    if bytes[2] != FRAME_COLON {
        return Err(FrameError::InvalidColon { byte: bytes[2] });
    }

    let semicolon_at = 3 + data_len;
    if semicolon_at < bytes.len() && bytes[semicolon_at] != FRAME_SEMICOLON {
        return Err(FrameError::InvalidTrailer {
            offset: semicolon_at,
            byte: bytes[semicolon_at],
        });
    }
    let end_at = 4 + data_len;
    if end_at < bytes.len() && bytes[end_at] != FRAME_END {
        return Err(FrameError::InvalidTrailer {
            offset: end_at,
            byte: bytes[end_at],
        });
    }

    if data_len == 0 {
        // Structurally valid, but there is no command byte to act on.
        return Err(FrameError::EmptyFrame);
    }

    Ok(CommandFrame {
        cmd: bytes[3],
        payload: &bytes[4..4 + data_len - 1],
    })
}

//==================================================================================Command

/// A fully decoded operator command, consumed exhaustively by the
/// dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    LedOff,
    LedOn,
    CprStart,
    CprStop,
    /// Identity assignment; `id` is the bytes after the matched prefix.
    Identity { role: Role, id: &'a str },
    /// Raw time-data payload, parsed by the time/role store.
    TimeData(&'a [u8]),
}

impl<'a> Command<'a> {
    /// Decode a submitted byte slice into a command.
    ///
    /// The unframed `in:`/`tr:` identity form takes precedence over framed
    /// parsing and is checked first.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        if let Some(identity) = parse_identity(bytes)? {
            return Ok(identity);
        }
        let frame = decode(bytes)?;
        Self::from_frame(frame)
    }

    /// Map a structurally valid frame onto the command set.
    pub fn from_frame(frame: CommandFrame<'a>) -> Result<Self, DecodeError> {
        match frame.cmd {
            CMD_LED_OFF => Ok(Command::LedOff),
            CMD_LED_ON => Ok(Command::LedOn),
            CMD_CPR_START => Ok(Command::CprStart),
            CMD_CPR_STOP => Ok(Command::CprStop),
            CMD_DATA => match parse_identity(frame.payload)? {
                Some(identity) => Ok(identity),
                None => Err(DecodeError::MissingIdentityPrefix),
            },
            CMD_TIME_DATA => Ok(Command::TimeData(frame.payload)),
            cmd => Err(DecodeError::UnknownCommand { cmd }),
        }
    }

    /// Map a single-byte direct command.
    ///
    /// Only the parameterless commands have a direct form; everything else
    /// is unknown here.
    pub fn from_direct(byte: u8) -> Result<Command<'static>, DecodeError> {
        match byte {
            CMD_LED_OFF => Ok(Command::LedOff),
            CMD_LED_ON => Ok(Command::LedOn),
            CMD_CPR_START => Ok(Command::CprStart),
            CMD_CPR_STOP => Ok(Command::CprStop),
            cmd => Err(DecodeError::UnknownCommand { cmd }),
        }
    }
}

/// Recognize a prefixed identity payload.
///
/// Returns `Ok(None)` when neither prefix matches so callers can fall
/// through to framed parsing.
fn parse_identity(bytes: &[u8]) -> Result<Option<Command<'_>>, DecodeError> {
    let (role, rest) = if let Some(rest) = bytes.strip_prefix(INSTRUCTOR_PREFIX) {
        (Role::Instructor, rest)
    } else if let Some(rest) = bytes.strip_prefix(TRAINEE_PREFIX) {
        (Role::Trainee, rest)
    } else {
        return Ok(None);
    };

    if rest.is_empty() {
        return Err(DecodeError::EmptyIdentity);
    }
    let id = core::str::from_utf8(rest).map_err(|_| DecodeError::IdentityEncoding)?;

    Ok(Some(Command::Identity { role, id }))
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
