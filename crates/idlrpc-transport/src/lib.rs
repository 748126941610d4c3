//! Transport bindings for idlrpc.
//!
//! Two bindings share one framing rule upstream:
//! - [`TcpEndpoint`] / [`RpcStream`] — connection-oriented stream transport
//! - [`UdpEndpoint`] — datagram transport, one logical message per datagram
//!
//! This layer knows nothing about frames or messages; it hands byte streams
//! and datagrams to the framing layer.

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::{Result, TransportError};
pub use tcp::{RpcStream, TcpEndpoint};
pub use udp::UdpEndpoint;
