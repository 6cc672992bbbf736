//! Gossip wire frames exchanged between dagnet nodes.
//!
//! Every frame is `u32 BE length || tag || payload`, where `length` counts
//! the tag byte plus the payload. Request and response share a tag and are
//! told apart by payload shape.

pub mod frame;
pub mod transport;

pub use frame::{Frame, FrameError, FrameTag, MAX_FRAME_LEN, NOT_FOUND_MARKER};
pub use transport::{PeerTransport, TransportError};
