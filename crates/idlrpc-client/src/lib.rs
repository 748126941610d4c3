//! Client engine for idlrpc services.
//!
//! A client owns one transport endpoint, one listener thread, one
//! send-serializing lock, and one response-correlation queue. Generated
//! service modules layer typed calls on top of [`StreamClient::call`] /
//! [`DatagramClient::call`] and route push notifications through a
//! [`PushDispatch`] implementation.
//!
//! Correlation is by response message id. Two concurrent calls to the *same*
//! method on one client may conflate their responses; calls to different
//! methods are safe because their ids differ.

pub mod config;
pub mod datagram;
pub mod error;
pub mod push;
pub mod queue;
pub mod stream;

pub use config::ClientConfig;
pub use datagram::DatagramClient;
pub use error::{ClientError, Result};
pub use push::{NoPushes, PushDispatch};
pub use stream::StreamClient;
