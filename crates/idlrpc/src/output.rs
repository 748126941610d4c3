use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use idlrpc::kvstore::{ChangeEvent, ChangeEventType};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_value(key: &str, value: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "key": key, "value": value })
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"])
                .add_row(vec![key.to_string(), value.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{key} = {value}");
        }
    }
}

pub fn print_outcome(operation: &str, ok: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "operation": operation, "ok": ok })
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{operation}: {}", if ok { "ok" } else { "failed" });
        }
    }
}

pub fn print_count(count: i64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "count": count }));
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{count}");
        }
    }
}

pub fn event_type_name(event_type: ChangeEventType) -> &'static str {
    match event_type {
        ChangeEventType::KeyAdded => "KEY_ADDED",
        ChangeEventType::KeyUpdated => "KEY_UPDATED",
        ChangeEventType::KeyRemoved => "KEY_REMOVED",
        ChangeEventType::StoreCleared => "STORE_CLEARED",
    }
}

pub fn print_event(event: &ChangeEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "event": event_type_name(event.event_type),
                    "key": event.key,
                    "old": event.old_value,
                    "new": event.new_value,
                    "timestamp": event.timestamp,
                })
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "KEY", "OLD", "NEW", "TIMESTAMP"])
                .add_row(vec![
                    event_type_name(event.event_type).to_string(),
                    event.key.clone(),
                    event.old_value.clone(),
                    event.new_value.clone(),
                    event.timestamp.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} key={} old={} new={} ts={}",
                event_type_name(event.event_type),
                event.key,
                event.old_value,
                event.new_value,
                event.timestamp
            );
        }
    }
}
