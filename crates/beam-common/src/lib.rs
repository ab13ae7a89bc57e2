pub mod errors;
pub mod frame;
pub mod key;
pub mod payload;

pub use errors::{ConfigError, FrameError, PayloadError};
pub use frame::{Frame, FromReceiver, FromSender, ToReceiver, ToSender, SEPARATOR};
pub use key::ReceiverKey;
pub use payload::{IceCandidate, SdpType, SessionDescription};
