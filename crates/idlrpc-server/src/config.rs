use std::time::Duration;

use idlrpc_frame::DEFAULT_MAX_FRAME;

/// Server behavior configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum message size accepted or sent. Default: 65536.
    pub max_frame_size: usize,
    /// Receive timeout on connection workers and the datagram loop — the
    /// cadence at which the shutdown flag is observed. Default: 1 second.
    pub poll_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            poll_timeout: Duration::from_secs(1),
        }
    }
}
