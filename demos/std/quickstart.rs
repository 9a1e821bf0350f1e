//! # Quickstart Example
//!
//! Minimal example demonstrating the basics of manikin-link:
//! - Frame an operator command
//! - Decode and interpret incoming bytes
//! - Assign trainer identities and anchor the wall clock
//! - Queue prioritized status notifications
//!
//! This example uses `std` for a quick trial run.
//! The async dispatcher and delivery runner are covered by the
//! integration tests under `tests/`.
//!
//! ```bash
//! cargo run --example quickstart
//! ```

use manikin_link::protocol::notify::{NotifyQueue, PRIORITY_CRITICAL, PRIORITY_LOW};
use manikin_link::protocol::store::DeviceStore;
use manikin_link::protocol::wire::{decode, encode, Command, NotifyKind, Role, CMD_TIME_DATA};
use static_cell::StaticCell;

// Firmware pins the queues in statics so every task can borrow them.
static NOTIFICATIONS: StaticCell<NotifyQueue> = StaticCell::new();

fn main() {
    println!("=== manikin-link Quickstart ===\n");

    // ======================================================================
    // 1. Frame an operator command
    // ======================================================================
    println!("1. Framing a time-data command");

    let mut buffer = [0u8; 64];
    match encode(&mut buffer, CMD_TIME_DATA, b"20250131235958+0") {
        Ok(len) => {
            println!("   Encoded: {} bytes", len);
            print!("   Frame: ");
            for byte in &buffer[..len] {
                print!("{:02X} ", byte);
            }
            println!("\n");
        }
        Err(e) => {
            eprintln!("   Encoding error: {:?}\n", e);
        }
    }

    // ======================================================================
    // 2. Decode and interpret incoming bytes
    // ======================================================================
    println!("2. Decoding the frame back into a command");

    let frame = decode(&buffer[..22]).expect("frame must decode");
    println!("   Command byte: 0x{:02X}", frame.cmd);
    println!("   Payload: {} bytes", frame.payload.len());

    match Command::parse(&buffer[..22]) {
        Ok(Command::TimeData(payload)) => {
            println!("   Parsed: TimeData ({} bytes)\n", payload.len());
        }
        Ok(other) => {
            println!("   Parsed: {:?}\n", other);
        }
        Err(e) => {
            eprintln!("   Parse error: {:?}\n", e);
        }
    }

    // ======================================================================
    // 3. Assign trainer identities
    // ======================================================================
    println!("3. Assigning identities (unframed in:/tr: commands)");

    let store = DeviceStore::new();

    if let Ok(Command::Identity { role, id }) = Command::parse(b"in:Alice") {
        store.set_identity(role, id);
        println!("   Instructor registered: {}", id);
    }
    if let Ok(Command::Identity { role, id }) = Command::parse(b"tr:Bob") {
        store.set_identity(role, id);
        println!("   Trainee registered: {}", id);
    }

    println!("   Active role: {:?}", store.role());
    println!(
        "   Stored: instructor={}, trainee={}\n",
        store.instructor_id(),
        store.trainee_id()
    );

    // ======================================================================
    // 4. Anchor the wall clock
    // ======================================================================
    println!("4. Anchoring the wall clock");

    // Anchor "2025-01-31 23:59:58" at uptime 10 s, then read 3 s later.
    match store.set_time(b"20250131235958+0", 10_000) {
        Ok(()) => {
            println!("   Base set at uptime 10 s");
            println!("   Now at 10 s: {}", store.now_string(10_000));
            println!("   Now at 13 s: {}\n", store.now_string(13_000));
        }
        Err(e) => {
            eprintln!("   Time-data error: {:?}\n", e);
        }
    }

    // ======================================================================
    // 5. Queue prioritized notifications
    // ======================================================================
    println!("5. Queueing status notifications");

    let queue = NOTIFICATIONS.init(NotifyQueue::new());

    queue
        .enqueue(NotifyKind::Heartbeat, &1u32.to_le_bytes(), PRIORITY_LOW, false)
        .expect("heartbeat must queue");
    queue
        .enqueue(
            NotifyKind::CprCmdAck,
            b"\x01\x00cpr:00:00",
            PRIORITY_CRITICAL,
            true,
        )
        .expect("ack must queue");

    println!("   Queued: {} notifications", queue.len());
    println!("   Role byte on the wire: 0x{:02X}", Role::Instructor.byte());
    println!("   The runner delivers the critical ack first.\n");

    // ======================================================================
    println!("Quickstart complete.");
    println!("\nFull documentation:");
    println!("  https://docs.rs/manikin-link");
}
