use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use idlrpc_frame::FrameWriter;
use idlrpc_transport::RpcStream;

/// Handle identifying one tracked stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// One tracked connection: its id, peer address, and send half.
///
/// The writer has its own lock so responses from the connection worker and
/// broadcast sends never interleave bytes on the wire.
pub(crate) struct ClientHandle {
    pub id: ClientId,
    pub addr: Option<SocketAddr>,
    pub writer: Arc<Mutex<FrameWriter<RpcStream>>>,
}

impl Clone for ClientHandle {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            addr: self.addr,
            writer: Arc::clone(&self.writer),
        }
    }
}

/// The tracked-connection set.
///
/// The set lock is held only for mutation and snapshotting; sends happen
/// under the per-client writer locks.
pub(crate) struct ClientSet {
    inner: Mutex<HashMap<ClientId, ClientHandle>>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, handle: ClientHandle) {
        self.inner
            .lock()
            .expect("client set lock poisoned")
            .insert(handle.id, handle);
    }

    pub fn remove(&self, id: ClientId) {
        self.inner
            .lock()
            .expect("client set lock poisoned")
            .remove(&id);
    }

    /// Clone the current handles. Broadcast iterates the snapshot so the set
    /// lock is not held across sends.
    pub fn snapshot(&self) -> Vec<ClientHandle> {
        let mut handles: Vec<ClientHandle> = self
            .inner
            .lock()
            .expect("client set lock poisoned")
            .values()
            .cloned()
            .collect();
        handles.sort_by_key(|handle| handle.id);
        handles
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("client set lock poisoned").len()
    }

    pub fn clear(&self) {
        self.inner.lock().expect("client set lock poisoned").clear();
    }
}
