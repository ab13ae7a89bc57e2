//! Negotiation payloads carried inside offer/answer/candidate frames.
//!
//! The relay never parses these; only the sender side and receivers do.
//! Field names follow the browser's `RTCSessionDescriptionInit` and
//! `RTCIceCandidateInit` so receivers can feed them straight to WebRTC.

use serde::{Deserialize, Serialize};

/// Kind of session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description (`{type, sdp}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// One ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_m_line_index: u32,
    pub sdp_mid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Build a candidate from a raw `candidate:` attribute line, picking the
    /// username fragment out of its ` ufrag ` extension when present.
    pub fn from_sdp_line(
        candidate: impl Into<String>,
        sdp_m_line_index: u32,
        sdp_mid: impl Into<String>,
    ) -> Self {
        let candidate = candidate.into();
        let username_fragment = candidate
            .split_once(" ufrag ")
            .and_then(|(_, rest)| rest.split(' ').next())
            .filter(|ufrag| !ufrag.is_empty())
            .map(str::to_string);
        Self {
            candidate,
            sdp_m_line_index,
            sdp_mid: sdp_mid.into(),
            username_fragment,
        }
    }

    /// Candidate foundation: the token right after `candidate:`.
    pub fn foundation(&self) -> Option<&str> {
        let (_, rest) = self.candidate.split_once("candidate:")?;
        rest.split(' ').next().filter(|id| !id.is_empty())
    }
}
