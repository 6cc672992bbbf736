use thiserror::Error;

use dagnet_transactions::{Transaction, TransactionError};
use dagnet_types::{NetworkConfig, TxHash};

/// Largest accepted `length` field. Comfortably above the largest valid
/// transaction (64 KiB payload, eight parents, a P-521 signature).
pub const MAX_FRAME_LEN: usize = 256 * 1024;

/// Single-byte payload of a `RespondTransaction` for an unknown hash.
pub const NOT_FOUND_MARKER: u8 = 0x00;

const LEN_PREFIX: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("frame length {0} out of range")]
    BadLength(usize),

    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),

    #[error("malformed {tag:?} payload: {reason}")]
    BadPayload { tag: FrameTag, reason: String },

    #[error("bad transaction in frame: {0}")]
    Transaction(#[from] TransactionError),

    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    #[error("cannot encode {tag:?} payload: {reason}")]
    Encode { tag: FrameTag, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameTag {
    PublishTransaction = 0x01,
    Config = 0x02,
    BestTip = 0x03,
    Transaction = 0x04,
    TransactionRejected = 0x05,
}

impl FrameTag {
    pub fn from_byte(b: u8) -> Result<Self, FrameError> {
        match b {
            0x01 => Ok(Self::PublishTransaction),
            0x02 => Ok(Self::Config),
            0x03 => Ok(Self::BestTip),
            0x04 => Ok(Self::Transaction),
            0x05 => Ok(Self::TransactionRejected),
            other => Err(FrameError::UnknownTag(other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    PublishTransaction(Transaction),
    RequestConfig,
    RespondConfig(NetworkConfig),
    RequestBestTip,
    RespondBestTip(TxHash),
    RequestTransaction(TxHash),
    /// `None` means the responder does not hold the requested hash.
    RespondTransaction(Option<Transaction>),
    /// Generic rejection indicator. Deliberately carries no reason.
    TransactionRejected(TxHash),
}

impl Frame {
    pub fn tag(&self) -> FrameTag {
        match self {
            Frame::PublishTransaction(_) => FrameTag::PublishTransaction,
            Frame::RequestConfig | Frame::RespondConfig(_) => FrameTag::Config,
            Frame::RequestBestTip | Frame::RespondBestTip(_) => FrameTag::BestTip,
            Frame::RequestTransaction(_) | Frame::RespondTransaction(_) => FrameTag::Transaction,
            Frame::TransactionRejected(_) => FrameTag::TransactionRejected,
        }
    }

    /// Publishes are subject to admission backpressure; every other frame
    /// travels on the request/response channel and is never dropped.
    pub fn is_publish(&self) -> bool {
        matches!(self, Frame::PublishTransaction(_))
    }

    /// Length-prefixed bytes for the wire. Fails rather than emit a frame
    /// the receiving side would reject or misread.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let payload = self.encode_payload()?;
        let len = payload.len() + 1;
        if len > MAX_FRAME_LEN {
            return Err(FrameError::BadLength(len));
        }
        let mut out = Vec::with_capacity(LEN_PREFIX + len);
        out.extend_from_slice(&(len as u32).to_be_bytes());
        out.push(self.tag() as u8);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn encode_payload(&self) -> Result<Vec<u8>, FrameError> {
        Ok(match self {
            Frame::PublishTransaction(tx) | Frame::RespondTransaction(Some(tx)) => tx.encode(),
            Frame::RespondTransaction(None) => vec![NOT_FOUND_MARKER],
            Frame::RequestConfig | Frame::RequestBestTip => Vec::new(),
            Frame::RespondConfig(config) => {
                let json = serde_json::to_vec(config).map_err(|e| FrameError::Encode {
                    tag: FrameTag::Config,
                    reason: e.to_string(),
                })?;
                // An empty body would read back as a request.
                if json.is_empty() {
                    return Err(FrameError::Encode {
                        tag: FrameTag::Config,
                        reason: "empty config".into(),
                    });
                }
                json
            }
            Frame::RespondBestTip(h) | Frame::RequestTransaction(h) | Frame::TransactionRejected(h) => {
                h.as_bytes().to_vec()
            }
        })
    }

    /// Decode exactly one frame occupying all of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        match Self::decode_prefix(bytes)? {
            Some((frame, used)) if used == bytes.len() => Ok(frame),
            Some((_, used)) => Err(FrameError::TrailingBytes(bytes.len() - used)),
            None => Err(FrameError::Truncated {
                needed: Self::declared_len(bytes).map_or(LEN_PREFIX, |l| LEN_PREFIX + l),
                available: bytes.len(),
            }),
        }
    }

    /// Decode the first frame in a stream buffer.
    ///
    /// `Ok(None)` means more bytes are needed. On success returns the frame
    /// and how many bytes it consumed.
    pub fn decode_prefix(buf: &[u8]) -> Result<Option<(Self, usize)>, FrameError> {
        let Some(len) = Self::declared_len(buf) else {
            return Ok(None);
        };
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(FrameError::BadLength(len));
        }
        let Some(body) = buf.get(LEN_PREFIX..LEN_PREFIX + len) else {
            return Ok(None);
        };
        let tag = FrameTag::from_byte(body[0])?;
        let frame = Self::decode_payload(tag, &body[1..])?;
        Ok(Some((frame, LEN_PREFIX + len)))
    }

    fn declared_len(buf: &[u8]) -> Option<usize> {
        let prefix: [u8; LEN_PREFIX] = buf.get(..LEN_PREFIX)?.try_into().ok()?;
        Some(u32::from_be_bytes(prefix) as usize)
    }

    fn decode_payload(tag: FrameTag, payload: &[u8]) -> Result<Self, FrameError> {
        let bad = |reason: &str| FrameError::BadPayload {
            tag,
            reason: reason.to_string(),
        };
        let hash = |p: &[u8]| TxHash::from_slice(p).map_err(|e| bad(&e.to_string()));
        match tag {
            FrameTag::PublishTransaction => Ok(Frame::PublishTransaction(Transaction::decode(payload)?)),
            FrameTag::Config if payload.is_empty() => Ok(Frame::RequestConfig),
            FrameTag::Config => serde_json::from_slice(payload)
                .map(Frame::RespondConfig)
                .map_err(|e| bad(&e.to_string())),
            FrameTag::BestTip if payload.is_empty() => Ok(Frame::RequestBestTip),
            FrameTag::BestTip => Ok(Frame::RespondBestTip(hash(payload)?)),
            FrameTag::Transaction => match payload {
                [] => Err(bad("empty")),
                [NOT_FOUND_MARKER] => Ok(Frame::RespondTransaction(None)),
                p if p.len() == TxHash::LEN => Ok(Frame::RequestTransaction(hash(p)?)),
                p => Ok(Frame::RespondTransaction(Some(Transaction::decode(p)?))),
            },
            FrameTag::TransactionRejected => Ok(Frame::TransactionRejected(hash(payload)?)),
        }
    }
}
