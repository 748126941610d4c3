//! KeyValueStore client walkthrough: calls, batches, and push events.
//!
//! Run kv-server first, then:
//!   cargo run --example kv-client

use std::sync::Arc;

use idlrpc::client::ClientConfig;
use idlrpc::kvstore::{ChangeEvent, KeyValue, KeyValueStoreClient, KeyValueStoreEvents};

struct LogEvents;

impl KeyValueStoreEvents for LogEvents {
    fn on_key_changed(&self, event: ChangeEvent) {
        eprintln!("change: {event:?}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = KeyValueStoreClient::connect_with(
        "127.0.0.1:7100".parse()?,
        Arc::new(LogEvents),
        ClientConfig::default(),
    )?;

    client.set("name", "Alice")?;
    println!("name = {}", client.get("name")?);

    client.batch_set(&[
        KeyValue {
            key: "a".to_string(),
            value: "1".to_string(),
        },
        KeyValue {
            key: "b".to_string(),
            value: "2".to_string(),
        },
    ])?;
    println!("count = {}", client.count()?);

    let (values, status) = client.batch_get(&["a".to_string(), "missing".to_string()])?;
    println!("batch_get -> {values:?} {status:?}");

    client.remove("name")?;
    println!("exists(name) = {}", client.exists("name")?);

    Ok(())
}
