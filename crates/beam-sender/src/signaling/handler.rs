//! Translation between relay frames and orchestrator calls.

use beam_common::{Frame, FromSender, PayloadError, SdpType, ToSender};
use tracing::debug;

use crate::codec::PayloadCodec;
use crate::error::Result;
use crate::media::MediaPipeline;
use crate::orchestrator::{PeerSessionOrchestrator, SignalOut};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Apply one text frame from the relay. Malformed frames and unknown
/// commands are dropped; the offer produced by `receiver-online` is
/// returned for sending.
pub(crate) async fn handle_frame<P, C>(
    orchestrator: &mut PeerSessionOrchestrator<P>,
    codec: &C,
    text: &str,
) -> Result<Option<SignalOut>>
where
    P: MediaPipeline,
    C: PayloadCodec,
{
    let frame = match ToSender::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Dropping frame from relay");
            return Ok(None);
        }
    };

    match frame {
        ToSender::ReceiverOnline(key) => orchestrator.on_receiver_online(key).await.map(Some),
        ToSender::ReceiverOffline(key) => {
            orchestrator.on_receiver_offline(&key).await?;
            Ok(None)
        }
        ToSender::Answer { key, payload } => {
            let answer = codec.decode_description(&payload)?;
            if answer.sdp_type != SdpType::Answer {
                debug!(key = %key, "Non-answer description dropped");
                return Ok(None);
            }
            orchestrator.on_answer(&key, answer).await?;
            Ok(None)
        }
        ToSender::IceCandidate { key, payload } => {
            let candidate = codec.decode_candidate(&payload)?;
            orchestrator.on_remote_candidate(&key, candidate).await?;
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Encode an orchestrator signal as the text frame for the relay.
pub(crate) fn encode_signal<C: PayloadCodec>(
    codec: &C,
    signal: SignalOut,
) -> std::result::Result<String, PayloadError> {
    let frame = match signal {
        SignalOut::Offer { key, description } => FromSender::Offer {
            key,
            payload: codec.encode_description(&description)?,
        },
        SignalOut::Candidate { key, candidate } => FromSender::IceCandidate {
            key,
            payload: codec.encode_candidate(&candidate)?,
        },
    };
    Ok(frame.encode())
}
