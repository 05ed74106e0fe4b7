//! Wire codec: CBOR frames carrying a [`GossipValue`].
//!
//! A frame is a CBOR map `{kind, source, timestamp, value}`. The `kind`
//! field lets a node share a port with other datagram traffic: a frame that
//! decodes but carries another kind is reported as
//! [`CodecError::UnexpectedKind`] so the caller can discard it without
//! treating it as corruption.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::GossipValue;

/// Message identifier for gossip value frames.
pub const GOSSIP_VALUE_KIND: u16 = 270;

/// Largest datagram a node will encode or accept.
pub const MAX_PAYLOAD: usize = 4096;

/// Errors from encoding or decoding a frame. None of these are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Payload exceeds [`MAX_PAYLOAD`]
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    Oversized {
        /// Payload length in bytes
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Bytes are not a valid frame
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame is well-formed but carries another message kind
    #[error("unexpected message kind {found} (expected {GOSSIP_VALUE_KIND})")]
    UnexpectedKind {
        /// Kind found on the wire
        found: u16,
    },

    /// Serialization failed
    #[error("encode failed: {0}")]
    Encode(String),
}

#[derive(Serialize)]
struct OutboundFrame {
    kind: u16,
    source: u32,
    timestamp: f64,
    value: f64,
}

/// Inbound frames are read leniently so the kind can be checked before
/// the gossip fields are required.
#[derive(Deserialize)]
struct InboundFrame {
    kind: u16,
    source: Option<u32>,
    timestamp: Option<f64>,
    value: Option<f64>,
}

/// Encode `value` into `buf`, replacing its contents.
///
/// Returns the number of bytes written. The buffer is reused across calls
/// so announces do not allocate once it has grown to frame size.
pub fn encode(value: &GossipValue, buf: &mut Vec<u8>) -> Result<usize, CodecError> {
    buf.clear();

    let frame = OutboundFrame {
        kind: GOSSIP_VALUE_KIND,
        source: value.source_id,
        timestamp: value.timestamp,
        value: value.value,
    };

    ciborium::into_writer(&frame, &mut *buf).map_err(|e| CodecError::Encode(e.to_string()))?;

    if buf.len() > MAX_PAYLOAD {
        return Err(CodecError::Oversized {
            len: buf.len(),
            max: MAX_PAYLOAD,
        });
    }

    Ok(buf.len())
}

/// Decode a gossip value from a received datagram.
pub fn decode(bytes: &[u8]) -> Result<GossipValue, CodecError> {
    if bytes.len() > MAX_PAYLOAD {
        return Err(CodecError::Oversized {
            len: bytes.len(),
            max: MAX_PAYLOAD,
        });
    }

    let frame: InboundFrame =
        ciborium::from_reader(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;

    if frame.kind != GOSSIP_VALUE_KIND {
        return Err(CodecError::UnexpectedKind { found: frame.kind });
    }

    let missing = |field: &str| CodecError::Malformed(format!("missing {field} field"));
    let source_id = frame.source.ok_or_else(|| missing("source"))?;
    let timestamp = frame.timestamp.ok_or_else(|| missing("timestamp"))?;
    let value = frame.value.ok_or_else(|| missing("value"))?;

    if !value.is_finite() || !timestamp.is_finite() {
        return Err(CodecError::Malformed("non-finite value or timestamp".into()));
    }

    Ok(GossipValue::with_timestamp(source_id, value, timestamp))
}
