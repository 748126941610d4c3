use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod kv;
pub mod serve;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an in-memory KeyValueStore server.
    Serve(ServeArgs),
    /// Store a value under a key.
    Set(SetArgs),
    /// Look up the value of a key.
    Get(KeyArgs),
    /// Remove a key.
    Remove(KeyArgs),
    /// Print the number of stored keys.
    Count(AddrArgs),
    /// Connect and print change notifications as they arrive.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Set(args) => kv::set(args, format),
        Command::Get(args) => kv::get(args, format),
        Command::Remove(args) => kv::remove(args, format),
        Command::Count(args) => kv::count(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

pub const DEFAULT_ADDR: &str = "127.0.0.1:7100";

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct AddrArgs {
    /// Server address to connect to.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Key to store under.
    pub key: String,
    /// Value to store.
    pub value: String,
    /// Server address to connect to.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Key to operate on.
    pub key: String,
    /// Server address to connect to.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Server address to connect to.
    #[arg(long, default_value = DEFAULT_ADDR)]
    pub addr: String,
    /// Exit after printing N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
