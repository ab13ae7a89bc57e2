//! Payload encoding for descriptions and candidates inside signaling frames.

use beam_common::{IceCandidate, PayloadError, SessionDescription};

/// Converts negotiation payloads to and from the text carried after the
/// key in a signaling frame.
pub trait PayloadCodec: Send + Sync {
    fn encode_description(&self, description: &SessionDescription) -> Result<String, PayloadError>;
    fn decode_description(&self, payload: &str) -> Result<SessionDescription, PayloadError>;
    fn encode_candidate(&self, candidate: &IceCandidate) -> Result<String, PayloadError>;
    fn decode_candidate(&self, payload: &str) -> Result<IceCandidate, PayloadError>;
}

/// The JSON shapes browsers hand to `RTCPeerConnection`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode_description(&self, description: &SessionDescription) -> Result<String, PayloadError> {
        serde_json::to_string(description).map_err(|e| PayloadError::Encode(e.to_string()))
    }

    fn decode_description(&self, payload: &str) -> Result<SessionDescription, PayloadError> {
        serde_json::from_str(payload).map_err(|e| PayloadError::Decode(e.to_string()))
    }

    fn encode_candidate(&self, candidate: &IceCandidate) -> Result<String, PayloadError> {
        serde_json::to_string(candidate).map_err(|e| PayloadError::Encode(e.to_string()))
    }

    fn decode_candidate(&self, payload: &str) -> Result<IceCandidate, PayloadError> {
        serde_json::from_str(payload).map_err(|e| PayloadError::Decode(e.to_string()))
    }
}
