//! Frame codec tests covering round-trips, rejection paths, and the
//! legacy identity commands.
use super::*;

//==================================================================================CODEC
#[test]
/// Encode then decode restores the command byte and payload.
fn test_round_trip() {
    let mut buf = [0u8; 64];
    let len = encode(&mut buf, CMD_DATA, b"in:ALICE").expect("encode must fit");
    assert_eq!(len, 6 + 8);

    let frame = decode(&buf[..len]).expect("decode must succeed");
    assert_eq!(
        frame,
        CommandFrame {
            cmd: CMD_DATA,
            payload: b"in:ALICE",
        }
    );
}

#[test]
/// A payload-less command encodes to the six framing bytes.
fn test_round_trip_empty_payload() {
    let mut buf = [0u8; 8];
    let len = encode(&mut buf, CMD_CPR_START, &[]).expect("encode must fit");
    assert_eq!(&buf[..len], &[0x01, 0x01, 0x3A, 0x02, 0x3B, 0x17]);

    let frame = decode(&buf[..len]).expect("decode must succeed");
    assert_eq!(frame.cmd, CMD_CPR_START);
    assert!(frame.payload.is_empty());
}

#[test]
/// Encode refuses a destination buffer smaller than the frame.
fn test_encode_buffer_too_small() {
    let mut buf = [0u8; 8];
    let result = encode(&mut buf, CMD_DATA, b"in:ALICE");
    assert_eq!(result, Err(FrameError::BufferTooSmall));
}

#[test]
/// Slices below the minimal frame length are rejected.
fn test_decode_too_short() {
    assert_eq!(
        decode(&[0x01, 0x02, 0x3A, 0x02]),
        Err(FrameError::TooShort { len: 4 })
    );
}

#[test]
/// A wrong START byte is rejected before anything else is read.
fn test_decode_invalid_start() {
    assert_eq!(
        decode(&[0x55, 0x02, 0x3A, 0x02, 0x3B, 0x17]),
        Err(FrameError::InvalidStart { byte: 0x55 })
    );
}

#[test]
/// A declared length exceeding the envelope capacity is rejected.
fn test_decode_payload_too_large() {
    assert_eq!(
        decode(&[0x01, 0xFF, 0x3A, 0x02, 0x17]),
        Err(FrameError::PayloadTooLarge { data_len: 255 })
    );
}

#[test]
/// A declared length larger than the received slice is rejected without
/// reading past the end.
fn test_decode_length_mismatch() {
    assert_eq!(
        decode(&[0x01, 0x10, 0x3A, 0x02, 0x3B, 0x17]),
        Err(FrameError::LengthMismatch {
            needed: 21,
            available: 6,
        })
    );

    // Off-by-one declared length, as sent by app builds that counted the
    // semicolon. The declared length must match the received bytes.
    assert_eq!(
        decode(&[0x01, 0x02, 0x3A, 0x02, 0x3B, 0x17]),
        Err(FrameError::LengthMismatch {
            needed: 7,
            available: 6,
        })
    );
}

#[test]
/// A wrong COLON byte is rejected.
fn test_decode_invalid_colon() {
    assert_eq!(
        decode(&[0x01, 0x01, 0x00, 0x02, 0x3B, 0x17]),
        Err(FrameError::InvalidColon { byte: 0x00 })
    );
}

#[test]
/// A trailer byte holding the wrong value is rejected.
fn test_decode_invalid_trailer() {
    assert_eq!(
        decode(&[0x01, 0x01, 0x3A, 0x02, 0x99, 0x17]),
        Err(FrameError::InvalidTrailer {
            offset: 4,
            byte: 0x99,
        })
    );
}

#[test]
/// Bytes beyond the declared frame are ignored (streamed input).
fn test_decode_tolerates_trailing_bytes() {
    let frame = decode(&[0x01, 0x01, 0x3A, 0x02, 0x3B, 0x17, 0xFF, 0xFF])
        .expect("excess bytes must not reject the frame");
    assert_eq!(frame.cmd, CMD_CPR_START);
}

#[test]
/// A zero data length is structurally valid but carries no command.
fn test_decode_empty_frame() {
    assert_eq!(
        decode(&[0x01, 0x00, 0x3A, 0x3B, 0x17]),
        Err(FrameError::EmptyFrame)
    );
}

//==================================================================================COMMAND
#[test]
/// The unframed identity form is matched before framed parsing.
fn test_parse_unframed_instructor() {
    let command = Command::parse(b"in:ALICE").expect("identity must parse");
    assert_eq!(
        command,
        Command::Identity {
            role: Role::Instructor,
            id: "ALICE",
        }
    );
}

#[test]
/// The trainee prefix selects the trainee role.
fn test_parse_unframed_trainee() {
    let command = Command::parse(b"tr:BOB").expect("identity must parse");
    assert_eq!(
        command,
        Command::Identity {
            role: Role::Trainee,
            id: "BOB",
        }
    );
}

#[test]
/// A bare prefix with no id bytes is rejected.
fn test_parse_empty_identity() {
    assert_eq!(
        Command::parse(b"in:"),
        Err(DecodeError::EmptyIdentity)
    );
}

#[test]
/// A framed data command carrying a prefixed id decodes to the same
/// identity as the unframed form.
fn test_parse_framed_identity() {
    let mut buf = [0u8; 32];
    let len = encode(&mut buf, CMD_DATA, b"tr:BOB").expect("encode must fit");

    let command = Command::parse(&buf[..len]).expect("identity must parse");
    assert_eq!(
        command,
        Command::Identity {
            role: Role::Trainee,
            id: "BOB",
        }
    );
}

#[test]
/// A data command without a recognized prefix is rejected.
fn test_parse_data_without_prefix() {
    let mut buf = [0u8; 32];
    let len = encode(&mut buf, CMD_DATA, b"garbage").expect("encode must fit");
    assert_eq!(
        Command::parse(&buf[..len]),
        Err(DecodeError::MissingIdentityPrefix)
    );
}

#[test]
/// Time-data payload bytes pass through untouched.
fn test_parse_time_data() {
    let mut buf = [0u8; 32];
    let len = encode(&mut buf, CMD_TIME_DATA, b"20250131235958").expect("encode must fit");

    let command = Command::parse(&buf[..len]).expect("time data must parse");
    assert_eq!(command, Command::TimeData(b"20250131235958"));
}

#[test]
/// Command bytes outside the known set are reported with their value.
fn test_parse_unknown_command() {
    let mut buf = [0u8; 8];
    let len = encode(&mut buf, 0x7F, &[]).expect("encode must fit");
    assert_eq!(
        Command::parse(&buf[..len]),
        Err(DecodeError::UnknownCommand { cmd: 0x7F })
    );
}

#[test]
/// The direct form covers exactly the parameterless commands.
fn test_from_direct() {
    assert_eq!(Command::from_direct(CMD_LED_ON), Ok(Command::LedOn));
    assert_eq!(Command::from_direct(CMD_CPR_STOP), Ok(Command::CprStop));
    assert_eq!(
        Command::from_direct(CMD_DATA),
        Err(DecodeError::UnknownCommand { cmd: CMD_DATA })
    );
}

#[test]
/// Message-type bytes survive the enum round-trip.
fn test_notify_kind_bytes() {
    assert_eq!(NotifyKind::CprCmdAck.byte(), 0x60);
    assert_eq!(NotifyKind::from_byte(0x30), Some(NotifyKind::CprTime));
    assert_eq!(NotifyKind::from_byte(0x99), None);
}
