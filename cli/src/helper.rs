use crate::CLIError;
use mesh_transport::address::{Address, UnicastAddress};
use mesh_transport::bytes::hex_to_bytes;
use mesh_transport::mesh::{AppKeyIndex, NetKeyIndex, TTL};
use mesh_transport::stack::directory::NetworkState;
use std::convert::TryFrom;
use std::str::FromStr;

pub fn is_hex_str(s: &str) -> bool {
    s.len() % 2 == 0 && s.chars().all(|c| c.is_digit(16))
}
pub fn is_128_bit_hex_str_validator(input: String) -> Result<(), String> {
    if input.len() == 32 && is_hex_str(&input) {
        Ok(())
    } else {
        Err(format!("'{}' is not a 128-bit hex string", &input))
    }
}
pub fn is_hex_validator(input: String) -> Result<(), String> {
    if !input.is_empty() && is_hex_str(&input) {
        Ok(())
    } else {
        Err(format!("'{}' is not a hex string", &input))
    }
}
pub fn is_ttl(input: String) -> Result<(), String> {
    match u8::from_str(&input).map(TTL::for_sending) {
        Ok(Ok(_)) => Ok(()),
        _ => Err(format!("`{}` is not a valid TTL", &input)),
    }
}
pub fn is_key_index(input: String) -> Result<(), String> {
    match u16::from_str(&input).ok().map(NetKeyIndex::try_from) {
        Some(Ok(_)) => Ok(()),
        _ => Err(format!("'{}' is not a valid key index", &input)),
    }
}
/// Accepts `0x` prefixed hex or decimal.
pub fn parse_u16(input: &str) -> Option<u16> {
    if let Some(hex) = input.strip_prefix("0x") {
        u16::from_str_radix(hex, 16).ok()
    } else {
        u16::from_str(input).ok()
    }
}
pub fn is_address_validator(input: String) -> Result<(), String> {
    match parse_u16(&input) {
        Some(_) => Ok(()),
        None => Err(format!("'{}' is not a 16-bit address", &input)),
    }
}
pub fn is_unicast_validator(input: String) -> Result<(), String> {
    match parse_u16(&input).map(UnicastAddress::try_from) {
        Some(Ok(_)) => Ok(()),
        _ => Err(format!("'{}' is not a unicast address", &input)),
    }
}
pub fn address_arg(matches: &clap::ArgMatches, name: &str) -> Option<Address> {
    matches
        .value_of(name)
        .and_then(parse_u16)
        .map(Address::from)
}
pub fn unicast_arg(matches: &clap::ArgMatches, name: &str) -> Option<UnicastAddress> {
    matches
        .value_of(name)
        .and_then(parse_u16)
        .and_then(|v| UnicastAddress::try_from(v).ok())
}
pub fn net_key_index_arg(matches: &clap::ArgMatches, name: &str) -> Option<NetKeyIndex> {
    matches
        .value_of(name)
        .and_then(|v| u16::from_str(v).ok())
        .and_then(|v| NetKeyIndex::try_from(v).ok())
}
pub fn app_key_index_arg(matches: &clap::ArgMatches, name: &str) -> Option<AppKeyIndex> {
    matches
        .value_of(name)
        .and_then(|v| u16::from_str(v).ok())
        .and_then(|v| AppKeyIndex::try_from(v).ok())
}
pub fn hex_arg(matches: &clap::ArgMatches, name: &str) -> Result<Vec<u8>, CLIError> {
    let value = matches.value_of(name).unwrap_or_default();
    hex_to_bytes(value)
        .ok_or_else(|| CLIError::OtherMessage(format!("'{}' is not a hex string", value)))
}
pub fn load_file(path: &str, writeable: bool, create: bool) -> Result<std::fs::File, CLIError> {
    std::fs::OpenOptions::new()
        .read(true)
        .write(writeable)
        .truncate(writeable)
        .create(create)
        .open(path)
        .map_err(|e| CLIError::IOError(path.to_owned(), e))
}
pub fn load_network_state(path: &str) -> Result<NetworkState, CLIError> {
    serde_json::from_reader(load_file(path, false, false)?).map_err(CLIError::SerdeJSON)
}
pub fn write_network_state(path: &str, state: &NetworkState) -> Result<(), CLIError> {
    serde_json::to_writer_pretty(load_file(path, true, true)?, state).map_err(CLIError::SerdeJSON)
}
