//! WebSocket transport for the live link
//!
//! Each link runs on its own thread with a small tokio runtime. The session
//! side stays synchronous: outbound messages go through an unbounded channel
//! and inbound traffic is reported through the event callback.

use super::protocol::{ClientMessage, ServerMessage};
use super::{Link, LinkConnector, LinkEvent, LinkEventCallback, SessionParams};
use crate::config::LinkConfig;
use crate::{ParklinkError, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

enum Outbound {
    Text(String),
    Close,
}

/// Opens links against the configured live endpoint
#[derive(Debug, Clone)]
pub struct WsConnector {
    config: LinkConfig,
}

impl WsConnector {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }
}

impl LinkConnector for WsConnector {
    fn connect(&self, params: &SessionParams, on_event: LinkEventCallback) -> Result<Box<dyn Link>> {
        if self.config.api_key.is_none() {
            warn!("No API key configured; the backend will likely refuse the link");
        }

        let url = self.config.url();
        let setup = params.setup_message().to_json()?;
        let (tx, rx) = unbounded_channel();

        std::thread::Builder::new()
            .name("parklink-link".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to create link runtime: {}", e);
                        on_event(LinkEvent::Error(format!("Runtime creation failed: {}", e)));
                        return;
                    }
                };
                runtime.block_on(run_link(url, setup, rx, on_event));
                debug!("Link thread exiting");
            })?;

        info!("Connecting link for model {}", params.model);
        Ok(Box::new(WsLink {
            tx,
            closed: false,
        }))
    }
}

/// Session-side handle to a running link
pub struct WsLink {
    tx: UnboundedSender<Outbound>,
    closed: bool,
}

impl Link for WsLink {
    fn send(&mut self, message: ClientMessage) -> Result<()> {
        if self.closed {
            return Err(ParklinkError::TransportError("Link is closed".into()));
        }
        let json = message.to_json()?;
        self.tx
            .send(Outbound::Text(json))
            .map_err(|_| ParklinkError::TransportError("Link is gone".into()))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(ParklinkError::TransportError("Link already closed".into()));
        }
        self.closed = true;
        self.tx
            .send(Outbound::Close)
            .map_err(|_| ParklinkError::TransportError("Link is gone".into()))
    }
}

async fn run_link(
    url: String,
    setup: String,
    mut outbound: UnboundedReceiver<Outbound>,
    on_event: LinkEventCallback,
) {
    let (stream, _) = match connect_async(url.as_str()).await {
        Ok(connected) => connected,
        Err(e) => {
            error!("Link connection failed: {}", e);
            on_event(LinkEvent::Error(e.to_string()));
            return;
        }
    };
    let (mut ws_tx, mut ws_rx) = stream.split();

    if let Err(e) = ws_tx.send(Message::Text(setup.into())).await {
        error!("Failed to send setup: {}", e);
        on_event(LinkEvent::Error(e.to_string()));
        return;
    }
    debug!("Setup sent, waiting for acknowledgement");

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(json)) => {
                    if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                        error!("Link send failed: {}", e);
                        on_event(LinkEvent::Error(e.to_string()));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = ws_tx.send(Message::Close(None)).await {
                        debug!("Close frame not delivered: {}", e);
                    }
                    info!("Link closed locally");
                    break;
                }
            },
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    for event in parse_frame(text.as_str()) {
                        on_event(event);
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => {
                        for event in parse_frame(text) {
                            on_event(event);
                        }
                    }
                    Err(_) => warn!("Dropping non-UTF-8 binary frame ({} bytes)", bytes.len()),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty());
                    info!("Link closed by server: {:?}", reason);
                    on_event(LinkEvent::Closed(reason));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Link error: {}", e);
                    on_event(LinkEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    on_event(LinkEvent::Closed(None));
                    break;
                }
            }
        }
    }
}

/// Turn one server frame into link events. Malformed frames are logged
/// and dropped.
fn parse_frame(text: &str) -> Vec<LinkEvent> {
    let message = match ServerMessage::from_json(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed server frame: {}", e);
            return Vec::new();
        }
    };

    let mut events = Vec::with_capacity(2);
    if message.setup_complete.is_some() {
        info!("Link setup complete");
        events.push(LinkEvent::Opened);
    }
    if let Some(go_away) = message.go_away.as_ref() {
        warn!("Server will close the link soon (time left: {:?})", go_away.time_left);
    }

    let has_payload = message.server_content.is_some()
        || message.tool_call.is_some()
        || message.tool_call_cancellation.is_some();
    if has_payload {
        events.push(LinkEvent::Message(Box::new(message)));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_complete_opens() {
        assert_eq!(parse_frame(r#"{"setupComplete":{}}"#), vec![LinkEvent::Opened]);
    }

    #[test]
    fn test_content_frame_becomes_message() {
        let events = parse_frame(r#"{"serverContent":{"turnComplete":true}}"#);
        assert_eq!(events.len(), 1);
        match &events[0] {
            LinkEvent::Message(msg) => assert!(msg.is_turn_complete()),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_malformed_and_empty_frames() {
        assert!(parse_frame("not json").is_empty());
        assert!(parse_frame(r#"{"usageMetadata":{}}"#).is_empty());
        assert!(parse_frame(r#"{"goAway":{"timeLeft":"5s"}}"#).is_empty());
    }

    #[test]
    fn test_closed_link_rejects_sends() {
        let (tx, _rx) = unbounded_channel();
        let mut link = WsLink { tx, closed: false };
        assert!(link.close().is_ok());
        assert!(link.close().is_err());
        assert!(matches!(
            link.send(ClientMessage::tool_responses(Vec::new())),
            Err(ParklinkError::TransportError(_))
        ));
    }

    #[test]
    fn test_send_after_transport_gone() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let mut link = WsLink { tx, closed: false };
        assert!(link.send(ClientMessage::tool_responses(Vec::new())).is_err());
    }
}
