//! Generated runtime for IDL-defined RPC services.
//!
//! idlrpc is the wire runtime a per-service code generator embeds: a
//! big-endian binary codec, length-prefixed framing over stream and datagram
//! transports, a correlating client engine with push delivery, and a server
//! engine with per-connection dispatch and broadcast fan-out.
//!
//! # Crate Structure
//!
//! - [`codec`] — byte-level serialization (writer, reader, `Encode`/`Decode`)
//! - [`frame`] — length-prefixed framing and message-id scaffolding
//! - [`transport`] — TCP stream and UDP datagram endpoints
//! - [`client`] — typed calls, response correlation, push handler slots
//! - [`server`] — request dispatch, client tracking, broadcast
//! - [`kvstore`] — reference generated module for the KeyValueStore service

/// Re-export codec types.
pub mod codec {
    pub use idlrpc_codec::*;
}

/// Re-export frame types.
pub mod frame {
    pub use idlrpc_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use idlrpc_transport::*;
}

/// Re-export client engine types.
pub mod client {
    pub use idlrpc_client::*;
}

/// Re-export server engine types.
pub mod server {
    pub use idlrpc_server::*;
}

pub mod kvstore;
