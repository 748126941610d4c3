use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use idlrpc::kvstore::{ChangeEvent, KeyValueStoreClient, KeyValueStoreEvents};
use idlrpc_client::ClientConfig;

use crate::cmd::WatchArgs;
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_event, OutputFormat};

struct PrintEvents {
    format: OutputFormat,
    printed: AtomicUsize,
}

impl KeyValueStoreEvents for PrintEvents {
    fn on_key_changed(&self, event: ChangeEvent) {
        print_event(&event, self.format);
        self.printed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_changed(&self, events: Vec<ChangeEvent>) {
        for event in &events {
            print_event(event, self.format);
        }
        self.printed.fetch_add(events.len(), Ordering::SeqCst);
    }
}

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let addr = super::kv::resolve_addr(&args.addr)
        .map_err(|err| CliError::new(USAGE, format!("invalid address: {err}")))?;

    let events = Arc::new(PrintEvents {
        format,
        printed: AtomicUsize::new(0),
    });
    let client =
        KeyValueStoreClient::connect_with(addr, Arc::clone(&events) as _, ClientConfig::default())
            .map_err(|err| client_error("connect failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    }

    while running.load(Ordering::SeqCst) && client.is_connected() {
        if let Some(count) = args.count {
            if events.printed.load(Ordering::SeqCst) >= count {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    Ok(SUCCESS)
}
