//! Wire codec for the `|`-separated text frames exchanged with the relay.
//!
//! Every direction of traffic has its own closed message enum. Frames are
//! decoded into those enums once, at the socket boundary; nothing past the
//! boundary looks at raw strings. Payloads (SDP and candidate JSON) are
//! carried through untouched.

use crate::errors::FrameError;
use crate::key::ReceiverKey;

/// Field separator. There is no escaping: keys may not contain it, the
/// payload may, because it is always the last field.
pub const SEPARATOR: char = '|';

/// Command names as they appear on the wire.
pub mod commands {
    pub const RECEIVER_ONLINE: &str = "receiver-online";
    pub const RECEIVER_OFFLINE: &str = "receiver-offline";
    pub const DEVICE_ONLINE: &str = "device-online";
    pub const DEVICE_OFFLINE: &str = "device-offline";
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "onIceCandidate";
}

/// A message type that maps one-to-one onto a text frame.
pub trait Frame: Sized {
    fn encode(&self) -> String;
    fn decode(frame: &str) -> Result<Self, FrameError>;
}

// ---------------------------------------------------------------------------
// Relay <-> sender
// ---------------------------------------------------------------------------

/// Frames the relay sends to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToSender {
    ReceiverOnline(ReceiverKey),
    ReceiverOffline(ReceiverKey),
    Answer { key: ReceiverKey, payload: String },
    IceCandidate { key: ReceiverKey, payload: String },
}

/// Frames the sender sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromSender {
    Offer { key: ReceiverKey, payload: String },
    IceCandidate { key: ReceiverKey, payload: String },
}

impl Frame for ToSender {
    fn encode(&self) -> String {
        match self {
            Self::ReceiverOnline(key) => keyed(commands::RECEIVER_ONLINE, key, None),
            Self::ReceiverOffline(key) => keyed(commands::RECEIVER_OFFLINE, key, None),
            Self::Answer { key, payload } => keyed(commands::ANSWER, key, Some(payload)),
            Self::IceCandidate { key, payload } => {
                keyed(commands::ICE_CANDIDATE, key, Some(payload))
            }
        }
    }

    fn decode(frame: &str) -> Result<Self, FrameError> {
        let (command, rest) = split_command(frame)?;
        match command {
            commands::RECEIVER_ONLINE => {
                let (key, _) = split_key(command, rest)?;
                Ok(Self::ReceiverOnline(key))
            }
            commands::RECEIVER_OFFLINE => {
                let (key, _) = split_key(command, rest)?;
                Ok(Self::ReceiverOffline(key))
            }
            commands::ANSWER => {
                let (key, payload) = split_key(command, rest)?;
                Ok(Self::Answer {
                    key,
                    payload: payload.to_string(),
                })
            }
            commands::ICE_CANDIDATE => {
                let (key, payload) = split_key(command, rest)?;
                Ok(Self::IceCandidate {
                    key,
                    payload: payload.to_string(),
                })
            }
            other => Err(FrameError::UnknownCommand(other.to_string())),
        }
    }
}

impl Frame for FromSender {
    fn encode(&self) -> String {
        match self {
            Self::Offer { key, payload } => keyed(commands::OFFER, key, Some(payload)),
            Self::IceCandidate { key, payload } => {
                keyed(commands::ICE_CANDIDATE, key, Some(payload))
            }
        }
    }

    fn decode(frame: &str) -> Result<Self, FrameError> {
        let (command, rest) = split_command(frame)?;
        let build: fn(ReceiverKey, String) -> Self = match command {
            commands::OFFER => |key, payload| Self::Offer { key, payload },
            commands::ICE_CANDIDATE => |key, payload| Self::IceCandidate { key, payload },
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        let (key, payload) = split_key(command, rest)?;
        Ok(build(key, payload.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Relay <-> receiver
// ---------------------------------------------------------------------------

/// Frames the relay sends to a receiver. Receivers predate keyed routing,
/// so these use the legacy `command|payload` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToReceiver {
    DeviceOnline,
    DeviceOffline,
    Offer(String),
    IceCandidate(String),
}

/// Frames a receiver sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromReceiver {
    Answer(String),
    IceCandidate(String),
}

impl Frame for ToReceiver {
    // Receivers drop frames without a separator, so presence notices keep
    // the trailing one.
    fn encode(&self) -> String {
        match self {
            Self::DeviceOnline => unkeyed(commands::DEVICE_ONLINE, ""),
            Self::DeviceOffline => unkeyed(commands::DEVICE_OFFLINE, ""),
            Self::Offer(payload) => unkeyed(commands::OFFER, payload),
            Self::IceCandidate(payload) => unkeyed(commands::ICE_CANDIDATE, payload),
        }
    }

    fn decode(frame: &str) -> Result<Self, FrameError> {
        let (command, payload) = split_command(frame)?;
        match command {
            commands::DEVICE_ONLINE => Ok(Self::DeviceOnline),
            commands::DEVICE_OFFLINE => Ok(Self::DeviceOffline),
            commands::OFFER => Ok(Self::Offer(payload.to_string())),
            commands::ICE_CANDIDATE => Ok(Self::IceCandidate(payload.to_string())),
            other => Err(FrameError::UnknownCommand(other.to_string())),
        }
    }
}

impl Frame for FromReceiver {
    fn encode(&self) -> String {
        match self {
            Self::Answer(payload) => unkeyed(commands::ANSWER, payload),
            Self::IceCandidate(payload) => unkeyed(commands::ICE_CANDIDATE, payload),
        }
    }

    fn decode(frame: &str) -> Result<Self, FrameError> {
        let (command, payload) = split_command(frame)?;
        match command {
            commands::ANSWER => Ok(Self::Answer(payload.to_string())),
            commands::ICE_CANDIDATE => Ok(Self::IceCandidate(payload.to_string())),
            other => Err(FrameError::UnknownCommand(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn keyed(command: &str, key: &ReceiverKey, payload: Option<&str>) -> String {
    match payload {
        Some(payload) => format!("{command}{SEPARATOR}{key}{SEPARATOR}{payload}"),
        None => format!("{command}{SEPARATOR}{key}"),
    }
}

fn unkeyed(command: &str, payload: &str) -> String {
    format!("{command}{SEPARATOR}{payload}")
}

/// Split off the command. A frame without any separator is malformed.
fn split_command(frame: &str) -> Result<(&str, &str), FrameError> {
    frame
        .split_once(SEPARATOR)
        .ok_or_else(|| FrameError::MissingSeparator(frame.to_string()))
}

/// Split `key|payload`. The payload is everything after the first
/// separator and is never split further; it may be empty.
fn split_key<'a>(command: &str, rest: &'a str) -> Result<(ReceiverKey, &'a str), FrameError> {
    let (key, payload) = rest.split_once(SEPARATOR).unwrap_or((rest, ""));
    if key.is_empty() {
        return Err(FrameError::MissingKey(command.to_string()));
    }
    Ok((ReceiverKey::new(key), payload))
}
