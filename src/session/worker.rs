//! Runs a live session on a dedicated thread

use super::channels::SessionChannels;
use super::{LiveEvent, LiveSession, SessionFlags};
use crate::audio::AudioBackend;
use crate::config::ParklinkConfig;
use crate::link::LinkConnector;
use crate::persona::Contact;
use crate::{ParklinkError, Result};
use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Commands accepted by the session thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
    SetMuted(bool),
    /// Stop the call and end the thread
    Shutdown,
}

/// Handle for controlling a session thread from the UI
pub struct LiveSessionHandle {
    command_tx: Sender<SessionCommand>,
    event_rx: Receiver<LiveEvent>,
    flags: SessionFlags,
    thread: Option<JoinHandle<()>>,
}

impl LiveSessionHandle {
    /// Spawn the session thread. The session itself is built on that thread,
    /// so only the factories have to be `Send`.
    pub fn spawn(
        contact: Contact,
        config: ParklinkConfig,
        backend: Box<dyn AudioBackend>,
        connector: Box<dyn LinkConnector>,
    ) -> Result<Self> {
        config.validate()?;

        let channels = SessionChannels::new(config.channel_buffer_size);
        let flags = SessionFlags::default();
        let worker_flags = flags.clone();
        let command_rx = channels.command_rx;
        let event_tx = channels.event_tx;

        let thread = thread::Builder::new()
            .name(format!("parklink-session-{}", contact.id))
            .spawn(move || {
                let session = LiveSession::new(contact, config, backend, connector, event_tx)
                    .with_flags(worker_flags);
                run_session(session, command_rx);
            })?;

        Ok(Self {
            command_tx: channels.command_tx,
            event_rx: channels.event_rx,
            flags,
            thread: Some(thread),
        })
    }

    pub fn send_command(&self, command: SessionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| ParklinkError::ChannelError(format!("Failed to send command: {}", e)))
    }

    pub fn start(&self) -> Result<()> {
        self.send_command(SessionCommand::Start)
    }

    /// Stop the call. Takes effect for in-flight audio and link callbacks
    /// immediately; teardown follows on the session thread.
    pub fn stop(&self) -> Result<()> {
        self.flags.active.store(false, Ordering::SeqCst);
        self.send_command(SessionCommand::Stop)
    }

    /// Push-to-talk: `false` opens the microphone, `true` closes it
    pub fn set_muted(&self, muted: bool) -> Result<()> {
        if self.flags.is_active() {
            self.flags.muted.store(muted, Ordering::SeqCst);
        }
        self.send_command(SessionCommand::SetMuted(muted))
    }

    pub fn is_active(&self) -> bool {
        self.flags.is_active()
    }

    pub fn is_muted(&self) -> bool {
        self.flags.is_muted()
    }

    pub fn try_recv_event(&self) -> Option<LiveEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<LiveEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn event_receiver(&self) -> Receiver<LiveEvent> {
        self.event_rx.clone()
    }

    /// Stop the call and wait for the session thread to exit
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        self.flags.active.store(false, Ordering::SeqCst);
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.command_tx.send(SessionCommand::Shutdown).is_err() {
            debug!("Session thread already gone");
        }
        if thread.join().is_err() {
            warn!("Session thread panicked");
        }
    }
}

impl Drop for LiveSessionHandle {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

fn run_session(mut session: LiveSession, command_rx: Receiver<SessionCommand>) {
    info!("Session worker for {} started", session.contact().name);
    let inbound = session.inbound_receiver();

    loop {
        select! {
            recv(command_rx) -> command => match command {
                Ok(SessionCommand::Start) => {
                    // Failures are already reported as events
                    let _ = session.start();
                }
                Ok(SessionCommand::Stop) => session.stop(),
                Ok(SessionCommand::SetMuted(muted)) => session.set_muted(muted),
                Ok(SessionCommand::Shutdown) | Err(_) => {
                    session.stop();
                    break;
                }
            },
            recv(inbound) -> event => {
                if let Ok(event) = event {
                    session.handle_inbound(event);
                }
            }
        }
    }

    info!("Session worker for {} stopped", session.contact().name);
}
