use super::channels::InboundQueue;
use super::{Inbound, InboundEvent, LiveEvent, SessionFlags, SessionState};
use crate::audio::{codec, AudioBackend, AudioFrame, CapturePipeline, EndedCallback, InputSource};
use crate::audio::{PlaybackScheduler, SourceId};
use crate::config::ParklinkConfig;
use crate::link::protocol::Blob;
use crate::link::{
    ClientMessage, Link, LinkConnector, LinkEvent, LinkEventCallback, ServerMessage,
    SessionParams,
};
use crate::persona::Contact;
use crate::tools::ToolDispatcher;
use crate::transcript::{Direction, TranscriptAccumulator};
use crate::{ParklinkError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One persona's voice call.
///
/// Not `Send`: device streams are tied to the thread that opened them. Use
/// [`super::LiveSessionHandle`] to drive a session from elsewhere.
pub struct LiveSession {
    contact: Contact,
    config: ParklinkConfig,
    backend: Box<dyn AudioBackend>,
    connector: Box<dyn LinkConnector>,
    dispatcher: ToolDispatcher,
    inbound: InboundQueue,
    events: Sender<LiveEvent>,
    flags: SessionFlags,
    state: SessionState,
    epoch: u64,
    input: Option<Box<dyn InputSource>>,
    capture: CapturePipeline,
    scheduler: Option<PlaybackScheduler>,
    link: Option<Box<dyn Link>>,
    transcripts: TranscriptAccumulator,
}

impl LiveSession {
    pub fn new(
        contact: Contact,
        config: ParklinkConfig,
        backend: Box<dyn AudioBackend>,
        connector: Box<dyn LinkConnector>,
        events: Sender<LiveEvent>,
    ) -> Self {
        let flags = SessionFlags::default();
        let capture =
            CapturePipeline::with_mute_flag(config.audio.frame_samples, Arc::clone(&flags.muted));

        Self {
            contact,
            config,
            backend,
            connector,
            dispatcher: ToolDispatcher::new(),
            inbound: InboundQueue::new(),
            events,
            flags,
            state: SessionState::Idle,
            epoch: 0,
            input: None,
            capture,
            scheduler: None,
            link: None,
            transcripts: TranscriptAccumulator::new(),
        }
    }

    /// Share `flags` with a controller instead of private ones
    pub fn with_flags(mut self, flags: SessionFlags) -> Self {
        self.capture =
            CapturePipeline::with_mute_flag(self.config.audio.frame_samples, Arc::clone(&flags.muted));
        self.flags = flags;
        self
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn flags(&self) -> &SessionFlags {
        &self.flags
    }

    pub fn is_active(&self) -> bool {
        self.flags.is_active()
    }

    pub fn is_muted(&self) -> bool {
        self.flags.is_muted()
    }

    pub fn scheduler(&self) -> Option<&PlaybackScheduler> {
        self.scheduler.as_ref()
    }

    pub fn transcripts(&self) -> &TranscriptAccumulator {
        &self.transcripts
    }

    pub fn inbound_receiver(&self) -> Receiver<InboundEvent> {
        self.inbound.rx.clone()
    }

    /// Acquire audio and open the link. Does nothing unless idle.
    ///
    /// Failures are reported both as the returned error and as one
    /// [`LiveEvent::Error`]; nothing stays acquired afterwards.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            debug!("Ignoring start while {}", self.state);
            return Ok(());
        }

        self.epoch += 1;
        let epoch = self.epoch;
        info!("Starting voice session with {} (epoch {})", self.contact.name, epoch);
        self.set_state(SessionState::Starting);

        if let Err(e) = self.acquire(epoch) {
            return Err(self.fail_start(e));
        }
        self.flags.active.store(true, Ordering::SeqCst);

        let params = SessionParams::for_contact(
            &self.config.link,
            &self.contact,
            self.dispatcher.declarations(),
        );
        let tx = self.inbound.tx.clone();
        let on_event: LinkEventCallback = Arc::new(move |event| {
            let _ = tx.send(InboundEvent::new(epoch, Inbound::Link(event)));
        });

        match self.connector.connect(&params, on_event) {
            Ok(link) => {
                self.link = Some(link);
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    ParklinkError::TransportError(_) => e,
                    other => ParklinkError::TransportError(other.to_string()),
                };
                Err(self.fail_start(e))
            }
        }
    }

    fn acquire(&mut self, epoch: u64) -> Result<()> {
        let tx = self.inbound.tx.clone();
        let on_ended: EndedCallback = Arc::new(move |id: SourceId| {
            let _ = tx.send(InboundEvent::new(epoch, Inbound::PlaybackEnded(id)));
        });

        let clock = self
            .backend
            .open_output(self.config.audio.output_sample_rate, on_ended)
            .map_err(as_acquisition)?;
        self.scheduler = Some(PlaybackScheduler::with_gain(
            clock,
            self.config.audio.output_gain,
        ));

        let input = self
            .backend
            .open_input(self.config.audio.input_sample_rate)
            .map_err(as_acquisition)?;
        self.input = Some(input);

        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.ensure_running().map_err(as_acquisition)?;
        }
        Ok(())
    }

    /// Any failure inside `start()` reads to the user as a failed uplink,
    /// whatever variant is returned.
    fn fail_start(&mut self, e: ParklinkError) -> ParklinkError {
        error!("Voice session failed to start: {}", e);
        self.release();
        self.emit(LiveEvent::Error(as_acquisition(e.clone()).user_message()));
        self.set_state(SessionState::Idle);
        e
    }

    /// End the call and release everything. Safe to call repeatedly.
    pub fn stop(&mut self) {
        // Callbacks already in flight see this before anything is torn down
        self.flags.active.store(false, Ordering::SeqCst);

        if self.state == SessionState::Idle {
            return;
        }
        self.set_state(SessionState::Stopping);
        self.release();
        self.set_state(SessionState::Idle);
        info!("Voice session with {} stopped", self.contact.name);
    }

    fn release(&mut self) {
        self.flags.active.store(false, Ordering::SeqCst);

        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close() {
                debug!("Ignoring link close failure: {}", e);
            }
        }
        self.capture.stop();
        if let Some(mut input) = self.input.take() {
            input.stop();
        }
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
        self.transcripts.reset();
        self.flags.muted.store(true, Ordering::SeqCst);
    }

    /// Gate outbound microphone audio. Only meaningful while active.
    pub fn set_muted(&mut self, muted: bool) {
        if self.state != SessionState::Active {
            debug!("Ignoring mute change while {}", self.state);
            return;
        }
        self.capture.set_muted(muted);
    }

    /// Apply every queued inbound event; returns how many were taken
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.inbound.rx.try_recv() {
            self.handle_inbound(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_inbound(&mut self, event: InboundEvent) {
        if event.epoch != self.epoch || self.state == SessionState::Idle {
            debug!("Dropping stale event from epoch {}", event.epoch);
            return;
        }

        match event.kind {
            Inbound::Link(LinkEvent::Opened) => self.on_link_open(),
            Inbound::Link(LinkEvent::Message(message)) => self.route_message(&message),
            Inbound::Link(LinkEvent::Error(reason)) => {
                error!("Link error: {}", reason);
                let e = ParklinkError::TransportError(reason);
                self.emit(LiveEvent::Error(e.user_message()));
                self.stop();
            }
            Inbound::Link(LinkEvent::Closed(reason)) => {
                info!("Link closed ({})", reason.as_deref().unwrap_or("no reason"));
                self.stop();
            }
            Inbound::Frame(frame) => self.send_frame(frame),
            Inbound::PlaybackEnded(id) => {
                if let Some(scheduler) = self.scheduler.as_mut() {
                    scheduler.on_source_ended(id);
                }
            }
        }
    }

    fn on_link_open(&mut self) {
        if self.state != SessionState::Starting {
            return;
        }
        let Some(input) = self.input.take() else {
            warn!("Link opened without an input source");
            return;
        };

        self.capture.set_muted(true);
        let tx = self.inbound.tx.clone();
        let epoch = self.epoch;
        let started = self.capture.start(input, move |frame| {
            let _ = tx.send(InboundEvent::new(epoch, Inbound::Frame(frame)));
        });

        if let Err(e) = started {
            error!("Microphone failed to start: {}", e);
            self.emit(LiveEvent::Error(as_acquisition(e).user_message()));
            self.stop();
            return;
        }
        self.set_state(SessionState::Active);
    }

    fn route_message(&mut self, message: &ServerMessage) {
        if !self.is_active() {
            return;
        }

        let calls = message.function_calls();
        if !calls.is_empty() {
            let events = self.events.clone();
            let responses = self.dispatcher.dispatch(calls, |description| {
                events
                    .send(LiveEvent::VisualPrompt(description.to_string()))
                    .map_err(|_| ParklinkError::ChannelError("Event receiver dropped".into()))
            });
            if !responses.is_empty() {
                self.send(ClientMessage::tool_responses(responses));
            }
        }
        if !self.is_active() {
            return;
        }

        if let Some(text) = message.input_transcript() {
            self.transcripts.append_delta(Direction::User, text);
        }
        if let Some(text) = message.output_transcript() {
            self.transcripts.append_delta(Direction::Agent, text);
        }
        if message.is_turn_complete() {
            for event in self.transcripts.finalize_turn() {
                debug!("{:?}: {}", event.direction, event.text);
                self.emit(event.into());
            }
        }

        for chunk in message.audio_chunks() {
            if !self.is_active() {
                return;
            }
            self.play_chunk(chunk);
        }

        if message.is_interrupted() && self.is_active() {
            debug!("Agent interrupted");
            if let Some(scheduler) = self.scheduler.as_mut() {
                scheduler.interrupt();
            }
            self.transcripts.discard(Direction::Agent);
        }
    }

    fn play_chunk(&mut self, chunk: &Blob) {
        if !chunk.mime_type.is_empty() && !codec::is_pcm_audio(&chunk.mime_type) {
            warn!("Skipping non-PCM audio chunk ({})", chunk.mime_type);
            return;
        }
        let rate = codec::parse_rate(&chunk.mime_type).unwrap_or(self.config.audio.output_sample_rate);
        let Some(scheduler) = self.scheduler.as_mut() else {
            return;
        };
        if let Err(e) = scheduler.ensure_running() {
            warn!("Could not resume output clock: {}", e);
        }

        match codec::decode(&chunk.data, rate, 1) {
            Ok(decoded) => {
                if let Err(e) = scheduler.enqueue(decoded.into()) {
                    warn!("Dropping audio chunk: {}", e);
                }
            }
            Err(e) => warn!("Skipping undecodable audio chunk: {}", e),
        }
    }

    fn send_frame(&mut self, frame: AudioFrame) {
        if self.state != SessionState::Active || !self.is_active() {
            return;
        }
        self.send(ClientMessage::audio(frame.to_media_chunk()));
    }

    fn send(&mut self, message: ClientMessage) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let kind = message.kind();
        if let Err(e) = link.send(message) {
            warn!("Failed to send {}: {}", kind, e);
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state {} -> {}", self.state, state);
            self.state = state;
            self.emit(LiveEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: LiveEvent) {
        if self.events.send(event).is_err() {
            debug!("No listener for session events");
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn as_acquisition(e: ParklinkError) -> ParklinkError {
    match e {
        ParklinkError::AcquisitionError(_) => e,
        other => ParklinkError::AcquisitionError(other.to_string()),
    }
}
