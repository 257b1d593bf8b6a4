use crate::{helper, CLIError};
use mesh_transport::crypto::k2;
use mesh_transport::crypto::key::{AppKey, NetKey};

pub fn sub_command() -> clap::App<'static, 'static> {
    clap::SubCommand::with_name("crypto")
        .about("Derive key material from network and application keys")
        .subcommand(
            clap::SubCommand::with_name("k2")
                .about("derive NID, encryption key and privacy key from a netkey")
                .arg(
                    clap::Arg::with_name("key_hex")
                        .help("128-bit big endian netkey hex")
                        .required(true)
                        .value_name("KEY_HEX")
                        .validator(helper::is_128_bit_hex_str_validator),
                ),
        )
        .subcommand(
            clap::SubCommand::with_name("aid")
                .about("derive the AID of an appkey")
                .arg(
                    clap::Arg::with_name("key_hex")
                        .help("128-bit big endian appkey hex")
                        .required(true)
                        .value_name("KEY_HEX")
                        .validator(helper::is_128_bit_hex_str_validator),
                ),
        )
}
pub fn crypto_matches(
    parent_logger: &slog::Logger,
    crypto_matches: &clap::ArgMatches,
) -> Result<(), CLIError> {
    let logger = parent_logger.new(o!("command" => "crypto"));
    let key_hex = |matches: &clap::ArgMatches| -> Result<[u8; 16], CLIError> {
        let hex = matches.value_of("key_hex").unwrap_or_default();
        mesh_transport::crypto::hex_16_to_array(hex)
            .ok_or_else(|| CLIError::OtherMessage(format!("bad key '{}'", hex)))
    };
    match crypto_matches.subcommand() {
        ("k2", Some(k2_matches)) => {
            let net_key = NetKey::new_bytes(key_hex(k2_matches)?);
            debug!(logger, "k2"; "net_key" => %net_key);
            let (nid, encryption, privacy) = k2(net_key.key(), [0_u8]);
            println!("nid: {}", nid);
            println!("encryption_key: {}", encryption.key());
            println!("privacy_key: {}", privacy.key());
        }
        ("aid", Some(aid_matches)) => {
            let app_key = AppKey::new_bytes(key_hex(aid_matches)?);
            debug!(logger, "aid"; "app_key" => %app_key);
            println!("aid: {:#04x}", app_key.aid().value());
        }
        ("", None) => error!(logger, "no_subcommand"),
        _ => unreachable!("unhandled crypto subcommand"),
    }
    Ok(())
}
