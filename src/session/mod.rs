//! Real-time voice sessions
//!
//! A [`LiveSession`] owns everything one call needs: the microphone, the
//! output clock, the link and the transcript buffers. All callbacks from
//! those resources land in a single inbound queue, tagged with the epoch of
//! the call that produced them, and are applied in arrival order.
//!
//! [`LiveSessionHandle`] runs a session on its own thread for callers that
//! must not block, such as a UI loop.

pub mod channels;
pub mod live;
pub mod worker;

pub use channels::{InboundQueue, SessionChannels};
pub use live::LiveSession;
pub use worker::{LiveSessionHandle, SessionCommand};

use crate::audio::{AudioFrame, SourceId};
use crate::link::LinkEvent;
use crate::transcript::{Direction, TranscriptEvent};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Audio acquired, waiting for the link to open
    Starting,
    Active,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Events surfaced to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    StateChanged(SessionState),
    Transcript {
        text: String,
        direction: Direction,
        is_final: bool,
    },
    /// The model asked for a picture of this
    VisualPrompt(String),
    /// A user-facing failure message
    Error(String),
}

impl From<TranscriptEvent> for LiveEvent {
    fn from(event: TranscriptEvent) -> Self {
        LiveEvent::Transcript {
            text: event.text,
            direction: event.direction,
            is_final: event.is_final,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Inbound {
    Link(LinkEvent),
    Frame(AudioFrame),
    PlaybackEnded(SourceId),
}

/// An inbound callback, stamped with the call it belongs to
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub epoch: u64,
    pub kind: Inbound,
}

impl InboundEvent {
    pub fn new(epoch: u64, kind: Inbound) -> Self {
        Self { epoch, kind }
    }
}

/// Flags shared between a session and whoever controls it.
///
/// Writes are visible to every in-flight callback immediately, before the
/// session thread gets around to processing the matching command.
#[derive(Debug, Clone)]
pub struct SessionFlags {
    pub active: Arc<AtomicBool>,
    pub muted: Arc<AtomicBool>,
}

impl Default for SessionFlags {
    fn default() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            muted: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl SessionFlags {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }
}
