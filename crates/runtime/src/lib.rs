//! Page connections, command dispatch, and transports.
//!
//! A [`Connection`] owns one physical channel to one page. Callers issue
//! commands through [`Connection::invoke`]; a single reader task routes each
//! response back to its caller by request id.

pub mod connection;
pub mod error;
pub mod fake_transport;
pub mod request_id;
pub mod transport;

pub use connection::Connection;
pub use error::{CommandError, Result};
pub use request_id::RequestIdRegistry;
pub use transport::{Connector, Transport, TransportParts, TransportReceiver, WebSocketConnector, WebSocketTransport};
