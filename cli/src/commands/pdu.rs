use crate::{helper, CLIError};
use mesh_transport::access::AccessPayload;
use mesh_transport::address::{Address, UnicastAddress};
use mesh_transport::bytes::hex_string;
use mesh_transport::config::StackConfig;
use mesh_transport::control::Ack;
use mesh_transport::crypto::aes::MicSize;
use mesh_transport::mesh::SequenceNumber;
use mesh_transport::stack::bearer::{Bearer, BearerError, StatusSink};
use mesh_transport::stack::directory::{MeshNetwork, NetworkState};
use mesh_transport::stack::messages::{ControlMessage, Message, MessageKeys, OutgoingMessage};
use mesh_transport::stack::{Layer, MeshStack};
use std::convert::TryFrom;

pub fn sub_command() -> clap::App<'static, 'static> {
    clap::SubCommand::with_name("pdu")
        .about("Encode/decode proxy PDUs with the keys from a network state file")
        .subcommand(
            clap::SubCommand::with_name("encode")
                .about("encrypt an access message into proxy PDUs")
                .arg(
                    clap::Arg::with_name("src")
                        .long("src")
                        .takes_value(true)
                        .value_name("UNICAST")
                        .default_value("0x0001")
                        .validator(helper::is_unicast_validator),
                )
                .arg(
                    clap::Arg::with_name("dst")
                        .long("dst")
                        .required(true)
                        .value_name("ADDRESS")
                        .validator(helper::is_address_validator),
                )
                .arg(
                    clap::Arg::with_name("app_index")
                        .long("app")
                        .value_name("APP_INDEX")
                        .help("encrypt with this appkey")
                        .validator(helper::is_key_index)
                        .conflicts_with("dev_net_index")
                        .required_unless("dev_net_index"),
                )
                .arg(
                    clap::Arg::with_name("dev_net_index")
                        .long("dev")
                        .value_name("NET_INDEX")
                        .help("encrypt with the destination's device key, sent on this netkey")
                        .validator(helper::is_key_index),
                )
                .arg(
                    clap::Arg::with_name("ttl")
                        .long("ttl")
                        .value_name("TTL")
                        .validator(helper::is_ttl),
                )
                .arg(
                    clap::Arg::with_name("big_mic")
                        .long("big_mic")
                        .help("use a 64-bit TransMIC (always segments)")
                        .takes_value(false),
                )
                .arg(
                    clap::Arg::with_name("payload")
                        .help("access payload hex (opcode followed by parameters)")
                        .required(true)
                        .value_name("PAYLOAD_HEX")
                        .validator(helper::is_hex_validator),
                ),
        )
        .subcommand(
            clap::SubCommand::with_name("decode")
                .about("decrypt proxy PDUs and print the messages they carry")
                .arg(
                    clap::Arg::with_name("local")
                        .long("local")
                        .takes_value(true)
                        .value_name("UNICAST")
                        .default_value("0x0001")
                        .help("address the PDUs are received on")
                        .validator(helper::is_unicast_validator),
                )
                .arg(
                    clap::Arg::with_name("raw")
                        .long("raw")
                        .help("PDUs are bare network PDUs without the proxy header octet")
                        .takes_value(false),
                )
                .arg(
                    clap::Arg::with_name("pdus")
                        .required(true)
                        .multiple(true)
                        .value_name("PDU_HEX")
                        .validator(helper::is_hex_validator),
                ),
        )
}
/// Collects every framed PDU the stack sends.
#[derive(Default)]
struct CollectBearer {
    sent: Vec<(Address, Vec<u8>)>,
}
impl Bearer for CollectBearer {
    fn send(&mut self, dst: Address, pdu: &[u8]) -> Result<(), BearerError> {
        self.sent.push((dst, pdu.to_vec()));
        Ok(())
    }
}
/// Prints what the stack reports while decoding.
struct PrintSink {
    logger: slog::Logger,
}
impl StatusSink for PrintSink {
    fn message_received(&mut self, src: UnicastAddress, message: &Message) {
        let header = message.header();
        println!(
            "src: {} dst: {} seq: {} ttl: {} iv_index: {} net_key: {}",
            src,
            header.dst,
            header.seq.0.value(),
            header.ttl.value(),
            header.iv_index.0,
            header.net_key_index
        );
        match message {
            Message::Access(access) => {
                match access.app_key_index {
                    Some(index) => println!("key: {} aid: {}", index, access.aid.value()),
                    None => println!("key: device"),
                }
                println!(
                    "opcode: {} parameters: {}",
                    access.opcode(),
                    hex_string(access.payload.parameters())
                );
                if let Some(decoded) = &access.decoded {
                    println!("decoded: {:?}", decoded);
                }
            }
            Message::Control(control) => println!("control: {:?}", control.body),
        }
    }
    fn decryption_failed(&mut self, layer: Layer, reason: &str) {
        warn!(self.logger, "decryption_failed"; "layer" => %layer, "reason" => reason);
    }
    fn unknown_pdu_received(&mut self, src: UnicastAddress, pdu: &[u8]) {
        println!("src: {} unknown pdu: {}", src, hex_string(pdu));
    }
    fn block_acknowledgement_received(&mut self, src: UnicastAddress, ack: &Ack) {
        println!("src: {} ack: {:?}", src, ack);
    }
    fn control_received(&mut self, src: UnicastAddress, message: &ControlMessage) {
        println!("src: {} control: {:?}", src, message.body);
    }
}
fn load_network(
    logger: &slog::Logger,
    network_state_path: &str,
) -> Result<(NetworkState, MeshNetwork), CLIError> {
    let state = helper::load_network_state(network_state_path)?;
    let network = MeshNetwork::from_state(&state)
        .map_err(|e| CLIError::OtherMessage(format!("bad network state: {}", e)))?;
    debug!(logger, "loaded_network_state";
        "net_keys" => state.net_keys.len(),
        "app_keys" => state.app_keys.len(),
        "nodes" => state.nodes.len());
    Ok((state, network))
}
pub fn pdu_matches(
    parent_logger: &slog::Logger,
    network_state_path: &str,
    pdu_matches: &clap::ArgMatches,
) -> Result<(), CLIError> {
    let logger = parent_logger.new(o!("network_state_path" => network_state_path.to_owned()));
    match pdu_matches.subcommand() {
        ("encode", Some(encode_matches)) => {
            let (mut state, network) = load_network(&logger, network_state_path)?;
            let src = helper::unicast_arg(encode_matches, "src")
                .ok_or_else(|| CLIError::OtherMessage("bad src address".to_owned()))?;
            let dst = helper::address_arg(encode_matches, "dst").unwrap_or_default();
            let keys = match helper::app_key_index_arg(encode_matches, "app_index") {
                Some(index) => MessageKeys::App(index),
                None => MessageKeys::Device(
                    helper::net_key_index_arg(encode_matches, "dev_net_index")
                        .unwrap_or_default(),
                ),
            };
            let payload = AccessPayload::try_from(&helper::hex_arg(encode_matches, "payload")?[..])
                .map_err(|e| CLIError::OtherMessage(format!("bad payload: {}", e)))?;
            let mut message = OutgoingMessage::new(dst, keys, payload);
            if let Some(ttl) = encode_matches.value_of("ttl").and_then(|t| t.parse().ok()) {
                message = message.with_ttl(ttl);
            }
            if encode_matches.is_present("big_mic") {
                message = message.with_mic_size(MicSize::Big);
            }
            let mut stack = MeshStack::new(
                StackConfig::new(src),
                network,
                CollectBearer::default(),
                mesh_transport::stack::bearer::NullSink,
                SequenceNumber::new(state.seq),
                &logger,
            );
            stack
                .send(message)
                .map_err(|e| CLIError::OtherMessage(format!("encode failed: {}", e)))?;
            for (_, pdu) in &stack.bearer().sent {
                println!("{}", hex_string(pdu));
            }
            if let Some(next) = stack.seq_counter().check() {
                state.seq = next.0.value();
                helper::write_network_state(network_state_path, &state)?;
                info!(logger, "saved_seq"; "seq" => state.seq);
            }
        }
        ("decode", Some(decode_matches)) => {
            let (_, network) = load_network(&logger, network_state_path)?;
            let local = helper::unicast_arg(decode_matches, "local")
                .ok_or_else(|| CLIError::OtherMessage("bad local address".to_owned()))?;
            let raw = decode_matches.is_present("raw");
            let mut stack = MeshStack::new(
                StackConfig::new(local),
                network,
                CollectBearer::default(),
                PrintSink {
                    logger: logger.clone(),
                },
                SequenceNumber::new(0),
                &logger,
            );
            for pdu_hex in decode_matches.values_of("pdus").into_iter().flatten() {
                let mut pdu = mesh_transport::bytes::hex_to_bytes(pdu_hex).unwrap_or_default();
                if raw {
                    pdu.insert(0, 0x00);
                }
                if let Err(e) = stack.receive(&pdu) {
                    println!("{}: {}", pdu_hex, e);
                }
            }
            if stack.pending_reassemblies() > 0 {
                warn!(logger, "incomplete_segmented_messages"; "count" => stack.pending_reassemblies());
            }
        }
        ("", None) => error!(logger, "no_pdu_subcommand"),
        _ => unreachable!("unhandled pdu subcommand"),
    }
    Ok(())
}
