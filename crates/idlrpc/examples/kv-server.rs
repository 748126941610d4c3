//! Minimal KeyValueStore server backed by a HashMap.
//!
//! Run with:
//!   cargo run --example kv-server
//!
//! In another terminal:
//!   cargo run -- set name Alice --addr 127.0.0.1:7100
//!   cargo run -- get name --addr 127.0.0.1:7100

use std::collections::HashMap;
use std::sync::Mutex;

use idlrpc::kvstore::{KeyValue, KeyValueStoreHandler, KeyValueStoreServer, OperationStatus};
use idlrpc::server::ServerConfig;

struct MapStore {
    data: Mutex<HashMap<String, String>>,
}

impl KeyValueStoreHandler for MapStore {
    fn set(&self, key: String, value: String) -> bool {
        self.data.lock().unwrap().insert(key, value);
        true
    }

    fn get(&self, key: String) -> String {
        self.data.lock().unwrap().get(&key).cloned().unwrap_or_default()
    }

    fn remove(&self, key: String) -> bool {
        self.data.lock().unwrap().remove(&key).is_some()
    }

    fn exists(&self, key: String) -> bool {
        self.data.lock().unwrap().contains_key(&key)
    }

    fn count(&self) -> i64 {
        self.data.lock().unwrap().len() as i64
    }

    fn clear(&self) {
        self.data.lock().unwrap().clear();
    }

    fn batch_set(&self, items: Vec<KeyValue>) -> i64 {
        let mut data = self.data.lock().unwrap();
        let applied = items.len() as i64;
        for item in items {
            data.insert(item.key, item.value);
        }
        applied
    }

    fn batch_get(&self, keys: Vec<String>) -> (Vec<String>, Vec<OperationStatus>) {
        let data = self.data.lock().unwrap();
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

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = MapStore {
        data: Mutex::new(HashMap::new()),
    };

    let server = KeyValueStoreServer::bind(
        "127.0.0.1:7100".parse()?,
        store,
        ServerConfig::default(),
    )?;
    eprintln!("Listening on {}", server.local_addr());

    server.run();
    Ok(())
}
