use std::net::{SocketAddr, ToSocketAddrs};

use idlrpc::kvstore::KeyValueStoreClient;

use crate::cmd::{AddrArgs, KeyArgs, SetArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_count, print_outcome, print_value, OutputFormat};

pub fn resolve_addr(input: &str) -> std::io::Result<SocketAddr> {
    input.to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address resolved")
    })
}

fn connect(addr: &str) -> CliResult<KeyValueStoreClient> {
    let addr = resolve_addr(addr)
        .map_err(|err| CliError::new(USAGE, format!("invalid address: {err}")))?;
    KeyValueStoreClient::connect(addr).map_err(|err| client_error("connect failed", err))
}

pub fn set(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args.addr)?;
    let ok = client
        .set(&args.key, &args.value)
        .map_err(|err| client_error("set failed", err))?;
    print_outcome("set", ok, format);
    Ok(SUCCESS)
}

pub fn get(args: KeyArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args.addr)?;
    let value = client
        .get(&args.key)
        .map_err(|err| client_error("get failed", err))?;
    print_value(&args.key, &value, format);
    Ok(SUCCESS)
}

pub fn remove(args: KeyArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args.addr)?;
    let ok = client
        .remove(&args.key)
        .map_err(|err| client_error("remove failed", err))?;
    print_outcome("remove", ok, format);
    Ok(SUCCESS)
}

pub fn count(args: AddrArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args.addr)?;
    let count = client
        .count()
        .map_err(|err| client_error("count failed", err))?;
    print_count(count, format);
    Ok(SUCCESS)
}
