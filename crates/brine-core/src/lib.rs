//! Core types and wire codec for the brine gossip-averaging protocol.
//!
//! This crate provides the pieces shared by every brine node:
//!
//! - **Types**: [`GossipValue`], the timestamped scalar each node announces
//! - **Codec**: CBOR encoding of a [`GossipValue`] into a bounded datagram
//! - **Errors**: [`BrineError`] and the non-fatal [`CodecError`]
//!
//! # Example
//!
//! ```rust
//! use brine_core::{codec, GossipValue};
//!
//! let value = GossipValue::new(7, 3.5);
//! let mut buf = Vec::new();
//! let len = codec::encode(&value, &mut buf).unwrap();
//! let decoded = codec::decode(&buf[..len]).unwrap();
//! assert_eq!(decoded.source_id, 7);
//! ```

#![doc(html_root_url = "https://docs.rs/brine-core/0.3.0")]

pub mod codec;
mod error;
pub mod types;

pub use codec::{CodecError, MAX_PAYLOAD};
pub use error::{BrineError, Result};
pub use types::*;
