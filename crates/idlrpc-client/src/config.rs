use std::time::Duration;

use idlrpc_frame::DEFAULT_MAX_FRAME;

/// Client behavior configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bounded wait for a matching response. Default: 5 seconds.
    pub call_timeout: Duration,
    /// Listener receive timeout — the cadence at which the shutdown flag is
    /// observed. Default: 1 second.
    pub poll_timeout: Duration,
    /// Maximum message size accepted or sent. Default: 65536.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(1),
            max_frame_size: DEFAULT_MAX_FRAME,
        }
    }
}
