use anyhow::{bail, Context, Result};
use parklink::config::ParklinkConfig;
use parklink::persona::{contacts, Contact};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Args {
    contact: Option<String>,
    config: Option<String>,
    list: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        contact: None,
        config: None,
        list: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                args.config = Some(iter.next().context("--config needs a path")?);
            }
            "--list" | "-l" => args.list = true,
            other if other.starts_with('-') => bail!("Unknown option: {}", other),
            other => args.contact = Some(other.to_string()),
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parklink=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;
    if args.list {
        for contact in contacts::all() {
            println!("{:<8} {} [{}]", contact.id, contact, contact.voice);
        }
        return Ok(());
    }

    let contact = match args.contact.as_deref() {
        Some(id) => contacts::find(id).with_context(|| format!("No contact named '{}'", id))?,
        None => contacts::default_contact(),
    };

    let mut config = match args.config.as_deref() {
        Some(path) => ParklinkConfig::load(path)?,
        None => ParklinkConfig::new(),
    };
    config.link = config.link.with_env_key();
    config.validate()?;

    info!("Starting parklink, calling {}", contact.name);
    run_call(contact, config)
}

#[cfg(feature = "audio-io")]
fn run_call(contact: &'static Contact, config: ParklinkConfig) -> Result<()> {
    use crossbeam_channel::{select, unbounded};
    use parklink::audio::DeviceAudioBackend;
    use parklink::link::WsConnector;
    use parklink::messages::{ConversationLog, Message};
    use parklink::persona::{avatar_prompt, classify_mood, visual_feed_prompt, AvatarMood};
    use parklink::session::{LiveEvent, LiveSessionHandle, SessionState};
    use parklink::transcript::Direction;
    use std::io::BufRead;
    use tracing::debug;

    let log = ConversationLog::new();
    if log.open(contact) {
        print_message(&log.get_all(contact.id)[0]);
    }

    let connector = WsConnector::new(config.link.clone());
    let handle = LiveSessionHandle::spawn(
        *contact,
        config,
        Box::new(DeviceAudioBackend),
        Box::new(connector),
    )?;

    note(&log, contact, Message::calling(contact));
    handle.start()?;

    let (line_tx, line_rx) = unbounded::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("[Enter] toggles push-to-talk, 'q' hangs up.");

    let events = handle.event_receiver();
    let mut ptt = PushToTalk::default();
    let mut mood = AvatarMood::Listening;

    loop {
        select! {
            recv(line_rx) -> line => match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    handle.stop()?;
                }
                Ok(_) => match ptt.toggle(handle.is_active()) {
                    Some(talking) => {
                        handle.set_muted(!talking)?;
                        println!("{}", if talking { "** TRANSMITTING **" } else { "** LISTENING **" });
                    }
                    None => println!("Uplink not ready yet."),
                },
                Err(_) => {
                    handle.stop()?;
                }
            },
            recv(events) -> event => {
                let Ok(event) = event else { break };
                match event {
                    LiveEvent::StateChanged(SessionState::Active) => {
                        ptt.on_live();
                        println!("Uplink established with {}.", contact.name);
                    }
                    LiveEvent::StateChanged(SessionState::Idle) => {
                        if ptt.was_live() {
                            note(&log, contact, Message::uplink_terminated());
                        }
                        break;
                    }
                    LiveEvent::StateChanged(state) => info!("Session {}", state),
                    LiveEvent::Transcript { text, direction, .. } => {
                        let message = Message::new(direction.into(), text.trim());
                        print_message(&message);
                        log.add(contact.id, message);
                        if direction == Direction::Agent {
                            let next = classify_mood(&text);
                            if next != mood {
                                mood = next;
                                info!("Avatar mood: {:?} ({})", mood, mood.expression());
                                debug!("Avatar prompt: {}", avatar_prompt(contact, mood));
                            }
                        }
                    }
                    LiveEvent::VisualPrompt(description) => {
                        println!("[VISUAL FEED] {}", visual_feed_prompt(&description));
                        note(&log, contact, Message::visual_received(&description));
                    }
                    LiveEvent::Error(reason) => {
                        note(&log, contact, Message::system_error(reason));
                    }
                }
            }
        }
    }

    handle.shutdown();
    info!(
        "Call ended, {} messages in the log",
        log.len(contact.id)
    );
    Ok(())
}

#[cfg(not(feature = "audio-io"))]
fn run_call(contact: &'static Contact, _config: ParklinkConfig) -> Result<()> {
    warn!("Built without audio-io; cannot call {}", contact.name);
    bail!("parklink was built without the audio-io feature")
}

/// Push-to-talk state as seen by the terminal.
///
/// Toggling only counts once the uplink has opened; the session itself
/// ignores mute changes before that.
#[cfg(any(feature = "audio-io", test))]
#[derive(Debug, Default)]
struct PushToTalk {
    live: bool,
    talking: bool,
}

#[cfg(any(feature = "audio-io", test))]
impl PushToTalk {
    /// The session always comes up muted
    fn on_live(&mut self) {
        self.live = true;
        self.talking = false;
    }

    fn was_live(&self) -> bool {
        self.live
    }

    /// Flip transmit on an Enter press. Returns the new state, or `None`
    /// while the uplink is not open.
    fn toggle(&mut self, session_active: bool) -> Option<bool> {
        if !self.live || !session_active {
            return None;
        }
        self.talking = !self.talking;
        Some(self.talking)
    }
}

#[cfg(feature = "audio-io")]
fn note(log: &parklink::messages::ConversationLog, contact: &Contact, message: parklink::messages::Message) {
    print_message(&message);
    log.add(contact.id, message);
}

#[cfg(feature = "audio-io")]
fn print_message(message: &parklink::messages::Message) {
    use parklink::messages::Sender;

    match message.sender {
        Sender::User => println!("YOU: {}", message.text),
        Sender::Agent => println!("AGENT: {}", message.text),
        Sender::System if message.is_error => {
            warn!("{}", message.text);
            println!("{}", message.text)
        }
        Sender::System => println!("{}", message.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_ignored_until_uplink_opens() {
        let mut ptt = PushToTalk::default();
        // active is already set while the link is still connecting
        assert_eq!(ptt.toggle(true), None);
        assert_eq!(ptt.toggle(true), None);

        ptt.on_live();
        assert_eq!(ptt.toggle(true), Some(true));
        assert_eq!(ptt.toggle(true), Some(false));
    }

    #[test]
    fn test_reopened_uplink_starts_listening() {
        let mut ptt = PushToTalk::default();
        ptt.on_live();
        assert_eq!(ptt.toggle(true), Some(true));

        ptt.on_live();
        assert_eq!(ptt.toggle(true), Some(true));
    }

    #[test]
    fn test_toggle_ignored_after_stop() {
        let mut ptt = PushToTalk::default();
        ptt.on_live();
        assert_eq!(ptt.toggle(false), None);
        assert!(ptt.was_live());
    }
}
