//! Command intake and serialized execution.
//!
//! Producers hand raw bytes to [`CommandGate::submit`] from any context;
//! the bytes are copied into a bounded envelope and queued without
//! blocking. A single worker drains the queue and executes each command
//! on its own task, making it the only writer of session state and the
//! device store. Malformed input is decoded, rejected and logged there
//! without ever stalling the queue.
//!
//! [`CommandWorker::dispatch`] is the same decode-and-execute path as a
//! direct call: it returns the failure to the caller instead of logging
//! it, for transports that want to report errors inline.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::config::{COMMAND_CAPACITY, COMMAND_QUEUE_DEPTH};
use crate::error::{DispatchError, SubmitError};
use crate::protocol::session::{LedRequest, SessionController};
use crate::protocol::store::DeviceStore;
use crate::protocol::traits::clock::Clock;
use crate::protocol::traits::session_log::SessionLog;
use crate::protocol::wire::Command;

//==================================================================================Envelope

/// One queued unit of command input.
///
/// `Framed` holds a copy of the submitted bytes; `Direct` carries a bare
/// command byte from transports that strip framing themselves.
#[derive(Clone, Copy)]
pub enum CommandEnvelope {
    Direct(u8),
    Framed {
        len: usize,
        data: [u8; COMMAND_CAPACITY],
    },
}

/// Envelope queue between producers and the worker.
///
/// Declared as a `static` by the integrator and shared by reference.
pub type CommandQueue =
    Channel<CriticalSectionRawMutex, CommandEnvelope, COMMAND_QUEUE_DEPTH>;

//==================================================================================Service

/// Service assembling the command path.
///
/// Splits into a copyable producer gate and the worker that owns every
/// mutable collaborator.
pub struct CommandService<'a, S: SessionLog, C: Clock> {
    queue: &'a CommandQueue,
    store: &'a DeviceStore,
    led_request: &'a LedRequest,
    session: SessionController<'a, S>,
    clock: C,
}

impl<'a, S: SessionLog, C: Clock> CommandService<'a, S, C> {
    pub fn new(
        queue: &'a CommandQueue,
        store: &'a DeviceStore,
        led_request: &'a LedRequest,
        session: SessionController<'a, S>,
        clock: C,
    ) -> Self {
        Self {
            queue,
            store,
            led_request,
            session,
            clock,
        }
    }

    /// Split into gate/worker components.
    pub fn into_parts(self) -> CommandParts<'a, S, C> {
        CommandParts {
            gate: CommandGate { queue: self.queue },
            worker: CommandWorker {
                queue: self.queue,
                store: self.store,
                led_request: self.led_request,
                session: self.session,
                clock: self.clock,
            },
        }
    }
}

/// Bundle returned by [`CommandService::into_parts`].
pub struct CommandParts<'a, S: SessionLog, C: Clock> {
    pub gate: CommandGate<'a>,
    pub worker: CommandWorker<'a, S, C>,
}

//==================================================================================Gate

/// Producer-side handle, freely copyable across tasks.
#[derive(Clone, Copy)]
pub struct CommandGate<'a> {
    queue: &'a CommandQueue,
}

impl<'a> CommandGate<'a> {
    /// Copy `data` into an envelope and enqueue it without blocking.
    pub fn submit(&self, data: &[u8]) -> Result<(), SubmitError> {
        if data.len() > COMMAND_CAPACITY {
            return Err(SubmitError::TooLong {
                len: data.len(),
                capacity: COMMAND_CAPACITY,
            });
        }
        let mut envelope = [0u8; COMMAND_CAPACITY];
        envelope[..data.len()].copy_from_slice(data);
        self.queue
            .try_send(CommandEnvelope::Framed {
                len: data.len(),
                data: envelope,
            })
            .map_err(|_| SubmitError::QueueFull)
    }

    /// Enqueue a bare command byte.
    pub fn submit_direct(&self, byte: u8) -> Result<(), SubmitError> {
        self.queue
            .try_send(CommandEnvelope::Direct(byte))
            .map_err(|_| SubmitError::QueueFull)
    }
}

//==================================================================================Worker

/// Single consumer executing queued commands in arrival order.
pub struct CommandWorker<'a, S: SessionLog, C: Clock> {
    queue: &'a CommandQueue,
    store: &'a DeviceStore,
    led_request: &'a LedRequest,
    session: SessionController<'a, S>,
    clock: C,
}

impl<'a, S: SessionLog, C: Clock> CommandWorker<'a, S, C> {
    pub async fn drive(mut self) -> ! {
        loop {
            let envelope = self.queue.receive().await;
            let result = match envelope {
                CommandEnvelope::Direct(byte) => self.dispatch_direct(byte).await,
                CommandEnvelope::Framed { len, data } => self.dispatch(&data[..len]).await,
            };
            // Fire-and-forget path: the producer has long since returned.
            if result.is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!("queued command dropped");
            }
        }
    }

    /// Decode `bytes` and execute the command inline.
    pub async fn dispatch(&mut self, bytes: &[u8]) -> Result<(), DispatchError<S::Error>> {
        let command = Command::parse(bytes)?;
        self.execute(command).await
    }

    /// Execute a bare command byte inline.
    pub async fn dispatch_direct(&mut self, byte: u8) -> Result<(), DispatchError<S::Error>> {
        let command = Command::from_direct(byte)?;
        self.execute(command).await
    }

    async fn execute(&mut self, command: Command<'_>) -> Result<(), DispatchError<S::Error>> {
        let now = self.clock.now_ms();
        match command {
            Command::LedOff => self.led_request.request(false),
            Command::LedOn => self.led_request.request(true),
            Command::CprStart => {
                // LED feedback refreshes even when the start is a no-op.
                self.led_request.request(true);
                let _outcome = self
                    .session
                    .start(now)
                    .await
                    .map_err(DispatchError::Session)?;
                #[cfg(feature = "defmt")]
                defmt::info!("session start: {}", _outcome);
            }
            Command::CprStop => {
                self.led_request.request(false);
                let _outcome = self
                    .session
                    .stop(now)
                    .await
                    .map_err(DispatchError::Session)?;
                #[cfg(feature = "defmt")]
                defmt::info!("session stop: {}", _outcome);
            }
            Command::Identity { role, id } => {
                self.store.set_identity(role, id);
                self.led_request.request(true);
            }
            Command::TimeData(payload) => {
                self.store.set_time(payload, now)?;
                self.led_request.request(true);
            }
        }
        Ok(())
    }
}
