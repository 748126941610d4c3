//! Server engine for idlrpc services.
//!
//! A server binds a transport, tracks connected clients, and routes each
//! inbound request through a [`ServiceDispatch`] implementation (generated
//! per service) to the user's handler. Responses go back on the originating
//! connection or to the originating address; pushes fan out to every tracked
//! client via [`StreamServer::broadcast`] / [`DatagramServer::broadcast`].
//!
//! Stream binding: one worker thread per accepted connection. Datagram
//! binding: a single receive loop with an address-keyed client registry.

pub mod clients;
pub mod config;
pub mod datagram;
pub mod dispatch;
pub mod error;
pub mod stream;

pub use clients::ClientId;
pub use config::ServerConfig;
pub use datagram::DatagramServer;
pub use dispatch::{Dispatched, ServiceDispatch};
pub use error::{Result, ServerError};
pub use stream::StreamServer;
