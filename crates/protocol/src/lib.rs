//! Wire types for the remote debugging protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with a remote
//! browser: command envelopes sent over the page WebSocket, the responses and
//! events that come back, and the JSON documents served by the HTTP listing
//! endpoint.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: only small accessors beyond serialization/deserialization
//! * Open-ended: Commands are `{method, params}` pairs, not an enumeration
//! * Stable: Changes only when the wire protocol changes
//!
//! Higher-level APIs are built on top of these types in `tabwire`.

pub mod dom;
pub mod message;
pub mod target;

pub use dom::*;
pub use message::*;
pub use target::*;
