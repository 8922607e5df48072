use super::{InboundEvent, LiveEvent, SessionCommand};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

/// The single queue every session callback is funneled through
#[derive(Debug, Clone)]
pub struct InboundQueue {
    pub tx: Sender<InboundEvent>,
    pub rx: Receiver<InboundEvent>,
}

impl InboundQueue {
    pub fn new() -> Self {
        // Audio callbacks must never block on a slow consumer
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Control and event channels between a caller and a session worker
pub struct SessionChannels {
    pub command_tx: Sender<SessionCommand>,
    pub command_rx: Receiver<SessionCommand>,
    pub event_tx: Sender<LiveEvent>,
    pub event_rx: Receiver<LiveEvent>,
}

impl SessionChannels {
    pub fn new(buffer_size: usize) -> Self {
        let (command_tx, command_rx) = bounded(buffer_size.max(1));
        let (event_tx, event_rx) = unbounded();

        Self {
            command_tx,
            command_rx,
            event_tx,
            event_rx,
        }
    }
}

impl Default for SessionChannels {
    fn default() -> Self {
        Self::new(256)
    }
}
