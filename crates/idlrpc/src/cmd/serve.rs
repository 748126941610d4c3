use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use idlrpc::kvstore::{
    ChangeEvent, ChangeEventType, KeyValue, KeyValueStoreHandler, KeyValueStoreServer,
    OperationStatus,
};
use idlrpc_server::ServerConfig;
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{server_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

enum PushJob {
    Key(ChangeEvent),
    Batch(Vec<ChangeEvent>),
}

/// In-memory store behind the service's abstract handlers. Change events go
/// to the pusher thread, which fans them out to every connected client.
struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
    pushes: mpsc::Sender<PushJob>,
}

impl MemoryStore {
    fn event(&self, event_type: ChangeEventType, key: &str, old: &str, new: &str) -> ChangeEvent {
        ChangeEvent {
            event_type,
            key: key.to_string(),
            old_value: old.to_string(),
            new_value: new.to_string(),
            timestamp: unix_millis(),
        }
    }

    fn apply_set(&self, key: &str, value: &str) -> ChangeEvent {
        let mut data = self.data.lock().expect("store lock poisoned");
        match data.insert(key.to_string(), value.to_string()) {
            Some(old) => self.event(ChangeEventType::KeyUpdated, key, &old, value),
            None => self.event(ChangeEventType::KeyAdded, key, "", value),
        }
    }
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl KeyValueStoreHandler for MemoryStore {
    fn set(&self, key: String, value: String) -> bool {
        if key.is_empty() {
            return false;
        }
        let event = self.apply_set(&key, &value);
        let _ = self.pushes.send(PushJob::Key(event));
        true
    }

    fn get(&self, key: String) -> String {
        self.data
            .lock()
            .expect("store lock poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    fn remove(&self, key: String) -> bool {
        let removed = self
            .data
            .lock()
            .expect("store lock poisoned")
            .remove(&key);
        match removed {
            Some(old) => {
                let event = self.event(ChangeEventType::KeyRemoved, &key, &old, "");
                let _ = self.pushes.send(PushJob::Key(event));
                true
            }
            None => false,
        }
    }

    fn exists(&self, key: String) -> bool {
        self.data
            .lock()
            .expect("store lock poisoned")
            .contains_key(&key)
    }

    fn count(&self) -> i64 {
        self.data.lock().expect("store lock poisoned").len() as i64
    }

    fn clear(&self) {
        self.data.lock().expect("store lock poisoned").clear();
        let event = self.event(ChangeEventType::StoreCleared, "", "", "");
        let _ = self.pushes.send(PushJob::Key(event));
    }

    fn batch_set(&self, items: Vec<KeyValue>) -> i64 {
        let mut events = Vec::with_capacity(items.len());
        let mut applied = 0i64;
        for item in items {
            if item.key.is_empty() {
                continue;
            }
            events.push(self.apply_set(&item.key, &item.value));
            applied += 1;
        }
        if !events.is_empty() {
            let _ = self.pushes.send(PushJob::Batch(events));
        }
        applied
    }

    fn batch_get(&self, keys: Vec<String>) -> (Vec<String>, Vec<OperationStatus>) {
        let data = self.data.lock().expect("store lock poisoned");
        let mut values = Vec::with_capacity(keys.len());
        let mut status = Vec::with_capacity(keys.len());
        for key in &keys {
            match data.get(key) {
                Some(value) => {
                    values.push(value.clone());
                    status.push(OperationStatus::Success);
                }
                None => {
                    values.push(String::new());
                    status.push(OperationStatus::KeyNotFound);
                }
            }
        }
        (values, status)
    }
}

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let addr = super::kv::resolve_addr(&args.addr)
        .map_err(|err| CliError::new(USAGE, format!("invalid address: {err}")))?;

    let (tx, rx) = mpsc::channel();
    let store = MemoryStore {
        data: Mutex::new(HashMap::new()),
        pushes: tx,
    };

    let server = Arc::new(
        KeyValueStoreServer::bind(addr, store, ServerConfig::default())
            .map_err(|err| server_error("bind failed", err))?,
    );
    info!(addr = %server.local_addr(), "key-value server listening");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let server = Arc::clone(&server);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
            server.stop();
        })
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    }

    let pusher = {
        let server = Arc::clone(&server);
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(250)) {
                    Ok(PushJob::Key(event)) => {
                        server.push_on_key_changed(&event, None);
                    }
                    Ok(PushJob::Batch(events)) => {
                        server.push_on_batch_changed(&events, None);
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    };

    server.run();

    running.store(false, Ordering::SeqCst);
    let _ = pusher.join();

    Ok(SUCCESS)
}
