//! Two stacks (a client and a server node) sharing one `MeshNetwork`, wired together by moving
//! PDUs from one bearer into the other stack by hand.
use super::*;
use crate::access::AccessPayload;
use crate::address::UnicastAddress;
use crate::control::{Ack, ControlPDU, Features, Heartbeat};
use crate::crypto::aes::MicSize;
use crate::crypto::key::{AppKey, DevKey, NetKey};
use crate::crypto::materials::NetworkKeys;
use crate::lower::{BlockAck, OBO};
use crate::mesh::{IVIndex, IVIndexState, IVUpdateFlag, TTL, U24_MAX};
use crate::models::generic_onoff::{
    GenericOnOffGet, GenericOnOffStatus, GENERIC_ONOFF_GET, GENERIC_ONOFF_STATUS,
};
use crate::models::{MessagePackError, PackableMessage};
use crate::net::EncryptedPDU;
use crate::proxy::{FilterType, ProxyConfigMessage};
use crate::stack::bearer::Bearer;
use crate::stack::directory::{MeshNetwork, NodeInfo};
use crate::stack::messages::{ControlBody, ControlMessage, Message, MessageKeys, OutgoingMessage};
use crate::stack::transactions::Phase;
use alloc::sync::Arc;
use core::convert::TryFrom;
use core::time::Duration;

const NET_KEY: &str = "7dd7364cd842ad18c17c2b820c84c3d6";
const APP_KEY: &str = "63964771734fbd76e3b40519d1d94a48";
const IV_INDEX: u32 = 0x1234_5678;
const BLOB_OPCODE: u16 = 0x8240;

pub(crate) fn client_address() -> UnicastAddress {
    UnicastAddress::new(0x0001)
}
pub(crate) fn server_address() -> UnicastAddress {
    UnicastAddress::new(0x0100)
}
fn net_index() -> NetKeyIndex {
    NetKeyIndex::new(0)
}
fn net_key() -> NetKey {
    NetKey::from_hex(NET_KEY).unwrap()
}
/// Network with the client and the server as nodes, one network key and one bound app key.
pub(crate) fn fixture() -> (Arc<MeshNetwork>, AppKeyIndex) {
    let network = MeshNetwork::new();
    network.set_iv_index(IVIndexState::new(IVIndex(IV_INDEX), IVUpdateFlag(false)));
    network.add_net_key(net_index(), &net_key());
    let app_key_index = AppKeyIndex::new(0);
    network
        .add_app_key(app_key_index, AppKey::from_hex(APP_KEY).unwrap(), net_index())
        .unwrap();
    network.add_node(NodeInfo::new(client_address(), 1, DevKey::new_bytes([0x11; 16])));
    network.add_node(NodeInfo::new(server_address(), 2, DevKey::new_bytes([0x22; 16])));
    (Arc::new(network), app_key_index)
}
#[derive(Default, Debug)]
pub(crate) struct RecordingBearer {
    pub sent: Vec<(Address, Vec<u8>)>,
    pub closed: bool,
}
impl RecordingBearer {
    pub fn take(&mut self) -> Vec<(Address, Vec<u8>)> {
        core::mem::replace(&mut self.sent, Vec::new())
    }
}
impl Bearer for RecordingBearer {
    fn send(&mut self, dst: Address, pdu: &[u8]) -> Result<(), BearerError> {
        if self.closed {
            return Err(BearerError::Closed);
        }
        self.sent.push((dst, pdu.to_vec()));
        Ok(())
    }
}
#[derive(Default, Debug)]
pub(crate) struct RecordingSink {
    pub processed: usize,
    pub received: Vec<(UnicastAddress, Opcode)>,
    pub onoff_status: Vec<GenericOnOffStatus>,
    pub proxy: Vec<ProxyConfigMessage>,
    pub failed: Vec<(Address, bool)>,
    pub decrypt_failures: Vec<Layer>,
    pub unknown: Vec<(UnicastAddress, Vec<u8>)>,
    pub acks: Vec<(UnicastAddress, Ack)>,
    pub controls: Vec<ControlMessage>,
}
impl StatusSink for RecordingSink {
    fn message_processed(&mut self, _message: &Message) {
        self.processed += 1;
    }
    fn message_received(&mut self, src: UnicastAddress, message: &Message) {
        match message {
            Message::Access(access) => {
                self.received.push((src, access.opcode()));
                if let Some(status) = access.decoded_as::<GenericOnOffStatus>() {
                    self.onoff_status.push(*status);
                }
            }
            Message::Control(control) => {
                if let ControlBody::Proxy(message) = &control.body {
                    self.proxy.push(message.clone());
                }
            }
        }
    }
    fn transaction_failed(&mut self, dst: Address, was_timeout: bool) {
        self.failed.push((dst, was_timeout));
    }
    fn decryption_failed(&mut self, layer: Layer, _reason: &str) {
        self.decrypt_failures.push(layer);
    }
    fn unknown_pdu_received(&mut self, src: UnicastAddress, pdu: &[u8]) {
        self.unknown.push((src, pdu.to_vec()));
    }
    fn block_acknowledgement_received(&mut self, src: UnicastAddress, ack: &Ack) {
        self.acks.push((src, *ack));
    }
    fn control_received(&mut self, _src: UnicastAddress, message: &ControlMessage) {
        self.controls.push(message.clone());
    }
}
/// Opaque test message big enough to need segmentation.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Blob(Vec<u8>);
impl PackableMessage for Blob {
    fn opcode() -> Opcode {
        Opcode::sig(BLOB_OPCODE).unwrap()
    }

    fn message_size(&self) -> usize {
        self.0.len()
    }

    fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
        if buffer.len() != self.0.len() {
            return Err(MessagePackError::SmallBuffer);
        }
        buffer.copy_from_slice(&self.0);
        Ok(())
    }

    fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
        Ok(Blob(buffer.to_vec()))
    }
}
type TestStack = MeshStack<Arc<MeshNetwork>, RecordingBearer, RecordingSink>;

fn stack(network: &Arc<MeshNetwork>, address: UnicastAddress) -> TestStack {
    stack_with_seq(network, address, 0)
}
fn stack_with_seq(network: &Arc<MeshNetwork>, address: UnicastAddress, seq: u32) -> TestStack {
    let mut stack = MeshStack::new(
        StackConfig::new(address),
        network.clone(),
        RecordingBearer::default(),
        RecordingSink::default(),
        SequenceNumber::new(seq),
        &slog::Logger::root(slog::Discard, slog::o!()),
    );
    stack.registry_mut().register::<Blob>();
    stack
}
/// Moves every PDU `from` sent into `to`.
fn deliver(from: &mut TestStack, to: &mut TestStack) -> Vec<Result<(), RecvError>> {
    from.bearer_mut()
        .take()
        .into_iter()
        .map(|(_, pdu)| to.receive(&pdu))
        .collect()
}
fn deliver_ok(from: &mut TestStack, to: &mut TestStack) {
    for result in deliver(from, to) {
        assert_eq!(result, Ok(()));
    }
}
/// Decrypts a framed network PDU sent with the fixture's network key.
fn open(framed: &[u8], nonce_kind: NetworkNonceKind) -> net::PDU {
    let keys = NetworkKeys::from(&net_key());
    EncryptedPDU::new(&framed[1..])
        .unwrap()
        .try_decrypt(&keys, IVIndex(IV_INDEX), nonce_kind)
        .unwrap()
}
fn open_lower(framed: &[u8]) -> crate::lower::PDU {
    let pdu = open(framed, NetworkNonceKind::Network);
    crate::lower::PDU::from_bytes(pdu.payload.as_ref(), pdu.header.ctl).unwrap()
}
fn onoff_get(dst: UnicastAddress, app_key_index: AppKeyIndex) -> OutgoingMessage {
    OutgoingMessage::new(
        Address::Unicast(dst),
        MessageKeys::App(app_key_index),
        GenericOnOffGet.to_access_payload().unwrap(),
    )
    .expecting(GENERIC_ONOFF_STATUS)
}
fn onoff_status(dst: UnicastAddress, app_key_index: AppKeyIndex) -> OutgoingMessage {
    let status = GenericOnOffStatus {
        present: true,
        target: None,
    };
    OutgoingMessage::new(
        Address::Unicast(dst),
        MessageKeys::App(app_key_index),
        status.to_access_payload().unwrap(),
    )
}
/// 2 byte opcode + 42 bytes + 4 byte TransMIC = 4 segments.
fn blob(dst: UnicastAddress, app_key_index: AppKeyIndex) -> OutgoingMessage {
    let payload = Blob((0..42).collect()).to_access_payload().unwrap();
    OutgoingMessage::new(Address::Unicast(dst), MessageKeys::App(app_key_index), payload)
}
fn ack(seq_zero: crate::lower::SeqZero, block_ack: u32) -> ControlPDU {
    ControlPDU::Ack(Ack {
        obo: OBO(false),
        seq_zero,
        block_ack: BlockAck(block_ack),
    })
}

#[test]
fn test_onoff_get_status_round_trip() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());
    let to_server = Address::Unicast(server_address());

    client.send(onoff_get(server_address(), app)).unwrap();
    assert_eq!(client.transaction_phase(to_server), Some(Phase::AwaitingAck));
    assert_eq!(client.sink().processed, 1);
    let sent = &client.bearer().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, to_server);
    assert_eq!(sent[0].1[0], 0x00);
    let pdu = open(&sent[0].1, NetworkNonceKind::Network);
    assert_eq!(pdu.header.src, client_address());
    assert_eq!(pdu.header.dst, to_server);
    assert_eq!(pdu.header.ttl, TTL::new(5));
    assert_eq!(pdu.header.seq, SequenceNumber::new(0));
    assert!(!pdu.header.ctl.0);

    deliver_ok(&mut client, &mut server);
    assert_eq!(server.sink().received, vec![(client_address(), GENERIC_ONOFF_GET)]);

    server.send(onoff_status(client_address(), app)).unwrap();
    assert_eq!(
        server.transaction_phase(Address::Unicast(client_address())),
        Some(Phase::Completed)
    );
    deliver_ok(&mut server, &mut client);
    assert_eq!(client.transaction_phase(to_server), Some(Phase::Idle));
    assert_eq!(
        client.sink().onoff_status,
        vec![GenericOnOffStatus {
            present: true,
            target: None
        }]
    );
    assert_eq!(network.cached_status(server_address()), Some(GENERIC_ONOFF_STATUS));
    assert_eq!(client.seq_counter().check(), Some(SequenceNumber::new(1)));
}
#[test]
fn test_config_appkey_add_matches_sample_pdus() {
    // Mesh Profile sample data, message #6.
    let network = MeshNetwork::new();
    network.set_iv_index(IVIndexState::new(IVIndex(IV_INDEX), IVUpdateFlag(false)));
    network.add_net_key(net_index(), &net_key());
    let node = UnicastAddress::new(0x1201);
    network.add_node(NodeInfo::new(
        node,
        1,
        DevKey::from_hex("9d6dd0e96eb25dc19a40ed9914f8f03f").unwrap(),
    ));
    let network = Arc::new(network);
    let mut provisioner = stack_with_seq(&network, UnicastAddress::new(0x0003), 0x3129ab);
    let payload = crate::bytes::hex_to_bytes("0056341263964771734fbd76e3b40519d1d94a48").unwrap();
    let message = OutgoingMessage::new(
        Address::Unicast(node),
        MessageKeys::Device(net_index()),
        AccessPayload::try_from(&payload[..]).unwrap(),
    )
    .with_ttl(4);
    provisioner.send(message).unwrap();

    let sent: Vec<Vec<u8>> = provisioner
        .bearer_mut()
        .take()
        .into_iter()
        .map(|(_, pdu)| pdu)
        .collect();
    assert_eq!(
        sent,
        vec![
            crate::bytes::hex_to_bytes(
                "0068cab5c5348a230afba8c63d4e686364979deaf4fd40961145939cda0e"
            )
            .unwrap(),
            crate::bytes::hex_to_bytes(
                "00681615b5dd4a846cae0c032bf0746f44f1b8cc8ce5edc57e55beed49c0"
            )
            .unwrap(),
        ]
    );
    assert_eq!(
        provisioner.transaction_phase(Address::Unicast(node)),
        Some(Phase::AwaitingAck)
    );
    assert_eq!(
        provisioner.seq_counter().check(),
        Some(SequenceNumber::new(0x3129ad))
    );
}
#[test]
fn test_group_segmented_send_completes() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let group = Address::from(0xC105_u16);
    let payload = Blob((0..42).collect()).to_access_payload().unwrap();
    client
        .send(OutgoingMessage::new(group, MessageKeys::App(app), payload))
        .unwrap();
    assert_eq!(client.bearer_mut().take().len(), 4);
    assert_eq!(client.transaction_phase(group), Some(Phase::Completed));
    assert!(client.next_deadline().is_none());
    assert!(client
        .poll_timers(Instant::now() + Duration::from_secs(31))
        .is_empty());
    assert!(client.sink().failed.is_empty());
}
#[test]
fn test_slow_segments_keep_reassembly_alive() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());

    server.send(blob(client_address(), app)).unwrap();
    let segments = server.bearer_mut().take();
    client.receive(&segments[0].1).unwrap();
    let first_deadline = client.next_deadline().unwrap();
    std::thread::sleep(Duration::from_millis(10));
    client.receive(&segments[1].1).unwrap();

    // The timer armed by the first segment went stale.
    assert!(client.poll_timers(first_deadline).is_empty());
    assert_eq!(client.pending_reassemblies(), 1);
    let second_deadline = client.next_deadline().unwrap();
    assert!(second_deadline > first_deadline);
    client.poll_timers(second_deadline);
    assert_eq!(client.pending_reassemblies(), 0);
    assert!(client.sink().received.is_empty());
}
#[test]
fn test_filter_status_after_timeout_confirms_new_request() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut proxy = stack(&network, server_address());
    let node_a = Address::from(0x0200_u16);

    client
        .set_filter_type(net_index(), FilterType::Inclusion)
        .unwrap();
    client.bearer_mut().take();
    assert_eq!(
        client.poll_timers(Instant::now() + Duration::from_secs(31)),
        vec![TransactionTimeout(Address::Unassigned)]
    );
    assert_eq!(client.proxy_filter().pending_requests(), 0);

    client.add_filter_addresses(net_index(), &[node_a]).unwrap();
    client.bearer_mut().take();
    proxy
        .send_proxy_message(
            net_index(),
            ProxyConfigMessage::FilterStatus {
                filter_type: FilterType::Inclusion,
                list_size: 1,
            },
        )
        .unwrap();
    deliver_ok(&mut proxy, &mut client);
    let filter = client.proxy_filter().filter().unwrap();
    assert_eq!(filter.filter_type, FilterType::Inclusion);
    assert!(filter.addresses.contains(&0x0200));
    assert!(!client
        .proxy_filter()
        .trusted(Address::Unicast(server_address())));

    // The filtered node's status no longer reaches the node cache.
    client.send(onoff_get(server_address(), app)).unwrap();
    deliver_ok(&mut client, &mut proxy);
    proxy.send(onoff_status(client_address(), app)).unwrap();
    deliver_ok(&mut proxy, &mut client);
    assert_eq!(network.cached_status(server_address()), None);
}
#[test]
fn test_device_key_message() {
    let (network, _) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());
    let get = GenericOnOffGet.to_access_payload().unwrap();
    client
        .send(OutgoingMessage::new(
            Address::Unicast(server_address()),
            MessageKeys::Device(net_index()),
            get,
        ))
        .unwrap();
    deliver_ok(&mut client, &mut server);
    assert_eq!(server.sink().received, vec![(client_address(), GENERIC_ONOFF_GET)]);
}
#[test]
fn test_partial_ack_resends_missing_segments() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());
    let to_server = Address::Unicast(server_address());

    client.send(blob(server_address(), app)).unwrap();
    let first = client.bearer_mut().take();
    assert_eq!(first.len(), 4);
    let originals: Vec<_> = first.iter().map(|(_, pdu)| open_lower(pdu)).collect();
    let seq_zero = originals[0].segment_header().unwrap().seq_zero();
    assert_eq!(client.transaction_phase(to_server), Some(Phase::AwaitingAck));

    server
        .send_control(Address::Unicast(client_address()), net_index(), &ack(seq_zero, 0b0101))
        .unwrap();
    deliver_ok(&mut server, &mut client);
    assert_eq!(client.sink().acks.len(), 1);

    let resent = client.bearer_mut().take();
    assert_eq!(resent.len(), 2);
    assert_eq!(open_lower(&resent[0].1), originals[1]);
    assert_eq!(open_lower(&resent[1].1), originals[3]);
    let seqs: Vec<_> = resent
        .iter()
        .map(|(_, pdu)| open(pdu, NetworkNonceKind::Network).header.seq)
        .collect();
    assert_eq!(seqs, vec![SequenceNumber::new(4), SequenceNumber::new(5)]);
    assert_eq!(client.transaction_phase(to_server), Some(Phase::AwaitingAck));

    server
        .send_control(Address::Unicast(client_address()), net_index(), &ack(seq_zero, 0b1111))
        .unwrap();
    deliver_ok(&mut server, &mut client);
    assert!(client.bearer().sent.is_empty());
    assert_eq!(client.transaction_phase(to_server), Some(Phase::Completed));
    assert!(client.sink().failed.is_empty());
}
#[test]
fn test_zero_block_ack_cancels() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());
    let to_server = Address::Unicast(server_address());

    client.send(blob(server_address(), app)).unwrap();
    let first = client.bearer_mut().take();
    let seq_zero = open_lower(&first[0].1).segment_header().unwrap().seq_zero();
    server
        .send_control(Address::Unicast(client_address()), net_index(), &ack(seq_zero, 0))
        .unwrap();
    deliver_ok(&mut server, &mut client);
    assert!(client.bearer().sent.is_empty());
    assert_eq!(client.sink().failed, vec![(to_server, false)]);
    assert_eq!(client.transaction_phase(to_server), Some(Phase::Idle));
    // The ack timer armed for the cancelled transaction is stale.
    assert!(client
        .poll_timers(Instant::now() + Duration::from_secs(60))
        .is_empty());
}
#[test]
fn test_ack_timeout() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let to_server = Address::Unicast(server_address());

    client.send(onoff_get(server_address(), app)).unwrap();
    assert!(client.next_deadline().is_some());
    assert!(client.poll_timers(Instant::now()).is_empty());
    assert_eq!(
        client.poll_timers(Instant::now() + Duration::from_secs(31)),
        vec![TransactionTimeout(to_server)]
    );
    assert_eq!(client.sink().failed, vec![(to_server, true)]);
    assert_eq!(client.transaction_phase(to_server), Some(Phase::Idle));
    assert!(client.next_deadline().is_none());
}
#[test]
fn test_new_send_replaces_transaction() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let to_server = Address::Unicast(server_address());

    client.send(onoff_get(server_address(), app)).unwrap();
    client.send(onoff_status(server_address(), app)).unwrap();
    assert_eq!(client.transaction_phase(to_server), Some(Phase::Completed));
    assert!(client
        .poll_timers(Instant::now() + Duration::from_secs(31))
        .is_empty());
    assert!(client.sink().failed.is_empty());
}
#[test]
fn test_incomplete_reassembly_times_out() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());
    let from_server = Address::Unicast(server_address());

    server.send(blob(client_address(), app)).unwrap();
    let segments = server.bearer_mut().take();
    assert_eq!(segments.len(), 4);
    client.receive(&segments[2].1).unwrap();
    client.receive(&segments[0].1).unwrap();
    assert_eq!(client.pending_reassemblies(), 1);
    assert!(client.bearer().sent.is_empty());

    client.send(onoff_get(server_address(), app)).unwrap();
    client.bearer_mut().take();
    let timeouts = client.poll_timers(Instant::now() + Duration::from_secs(11));
    assert_eq!(timeouts, vec![TransactionTimeout(from_server)]);
    assert_eq!(client.pending_reassemblies(), 0);
    assert_eq!(client.transaction_phase(from_server), Some(Phase::Idle));
    assert_eq!(client.sink().failed, vec![(from_server, true)]);
    assert!(client.sink().received.is_empty());

    // A fresh message from the same source goes through and is acknowledged.
    server.send(blob(client_address(), app)).unwrap();
    let segments = server.bearer_mut().take();
    for (_, segment) in segments.iter().rev() {
        client.receive(segment).unwrap();
    }
    assert_eq!(
        client.sink().received,
        vec![(server_address(), Opcode::sig(BLOB_OPCODE).unwrap())]
    );
    let acks = client.bearer_mut().take();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].0, from_server);
    match open_lower(&acks[0].1) {
        crate::lower::PDU::UnsegmentedControl(pdu) => match ControlPDU::try_from(&pdu).unwrap() {
            ControlPDU::Ack(ack) => assert_eq!(ack.block_ack, BlockAck(0b1111)),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }

    // A late segment of the completed message is acknowledged again without a new delivery.
    client.receive(&segments[1].1).unwrap();
    assert_eq!(client.bearer_mut().take().len(), 1);
    assert_eq!(client.sink().received.len(), 1);
}
#[test]
fn test_big_mic_forces_segmentation() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());

    client
        .send(onoff_get(server_address(), app).with_mic_size(MicSize::Big))
        .unwrap();
    let sent = client.bearer_mut().take();
    assert_eq!(sent.len(), 1);
    assert!(open_lower(&sent[0].1).is_seg());
    server.receive(&sent[0].1).unwrap();
    assert_eq!(server.sink().received, vec![(client_address(), GENERIC_ONOFF_GET)]);
    // Addressed to the server's own element, so it acks the single segment.
    assert_eq!(server.bearer().sent.len(), 1);
}
#[test]
fn test_proxy_filter_attribution() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut proxy = stack(&network, server_address());
    let node_a = Address::from(0x0200_u16);
    let node_b = Address::Unicast(server_address());

    client
        .set_filter_type(net_index(), FilterType::Inclusion)
        .unwrap();
    let sent = client.bearer_mut().take();
    assert_eq!(sent[0].1[0], 0x02);
    let pdu = open(&sent[0].1, NetworkNonceKind::Proxy);
    assert!(pdu.header.ctl.0);
    assert_eq!(pdu.header.ttl, TTL::new(0));
    assert_eq!(pdu.header.dst, Address::Unassigned);
    assert_eq!(pdu.payload.as_ref(), &[0x00, 0x00]);
    assert_eq!(
        client.transaction_phase(Address::Unassigned),
        Some(Phase::AwaitingAck)
    );

    let status = |list_size| ProxyConfigMessage::FilterStatus {
        filter_type: FilterType::Inclusion,
        list_size,
    };
    proxy.send_proxy_message(net_index(), status(0)).unwrap();
    deliver_ok(&mut proxy, &mut client);
    assert_eq!(
        client.transaction_phase(Address::Unassigned),
        Some(Phase::Idle)
    );

    client.add_filter_addresses(net_index(), &[node_a]).unwrap();
    client.bearer_mut().take();
    proxy.send_proxy_message(net_index(), status(1)).unwrap();
    deliver_ok(&mut proxy, &mut client);
    assert_eq!(client.sink().proxy, vec![status(0), status(1)]);
    assert!(client.proxy_filter().trusted(node_a));
    assert!(!client.proxy_filter().trusted(node_b));

    client.send(onoff_get(server_address(), app)).unwrap();
    deliver_ok(&mut client, &mut proxy);
    proxy.send(onoff_status(client_address(), app)).unwrap();
    deliver_ok(&mut proxy, &mut client);
    assert_eq!(client.transaction_phase(node_b), Some(Phase::Idle));
    assert_eq!(client.sink().onoff_status.len(), 1);
    assert_eq!(network.cached_status(server_address()), None);
}
#[test]
fn test_invalid_arguments_use_no_seq() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let to_server = Address::Unicast(server_address());
    let get = GenericOnOffGet.to_access_payload().unwrap();
    let before = client.seq_counter().check();

    let cases = vec![
        (
            OutgoingMessage::new(Address::Unassigned, MessageKeys::App(app), get.clone()),
            InvalidArgument::Destination(Address::Unassigned),
        ),
        (
            OutgoingMessage::new(Address::from(0x8123_u16), MessageKeys::App(app), get.clone()),
            InvalidArgument::Destination(Address::from(0x8123_u16)),
        ),
        (
            OutgoingMessage::new(to_server, MessageKeys::App(app), get.clone()).with_ttl(1),
            InvalidArgument::TTL(1),
        ),
        (
            OutgoingMessage::new(to_server, MessageKeys::App(app), get.clone()).with_ttl(128),
            InvalidArgument::TTL(128),
        ),
        (
            OutgoingMessage::new(
                to_server,
                MessageKeys::App(AppKeyIndex::new(9)),
                get.clone(),
            ),
            InvalidArgument::AppKeyIndex(AppKeyIndex::new(9)),
        ),
        (
            OutgoingMessage::new(
                Address::from(0x0300_u16),
                MessageKeys::Device(net_index()),
                get.clone(),
            ),
            InvalidArgument::DeviceKey(Address::from(0x0300_u16)),
        ),
        (
            OutgoingMessage::new(
                to_server,
                MessageKeys::Device(NetKeyIndex::new(5)),
                get.clone(),
            ),
            InvalidArgument::NetKeyIndex(NetKeyIndex::new(5)),
        ),
        (
            OutgoingMessage::new(
                to_server,
                MessageKeys::App(app),
                AccessPayload::new(get.opcode(), &[0; 380]),
            ),
            InvalidArgument::PayloadLength(386),
        ),
    ];
    for (message, expected) in cases {
        assert_eq!(client.send(message), Err(SendError::InvalidArgument(expected)));
    }
    assert_eq!(
        client.add_filter_addresses(net_index(), &[]),
        Err(SendError::InvalidArgument(InvalidArgument::FilterAddresses(0)))
    );
    assert_eq!(
        client.add_filter_addresses(net_index(), &[to_server; 6]),
        Err(SendError::InvalidArgument(InvalidArgument::FilterAddresses(6)))
    );
    assert_eq!(
        client.send_control(Address::Unassigned, net_index(), &ack(crate::lower::SeqZero::new(0), 1)),
        Err(SendError::InvalidArgument(InvalidArgument::Destination(
            Address::Unassigned
        )))
    );
    assert_eq!(client.seq_counter().check(), before);
    assert!(client.bearer().sent.is_empty());
    assert!(client.transaction_phase(to_server).is_none());
}
#[test]
fn test_out_of_seq() {
    let (network, app) = fixture();
    let mut client = stack_with_seq(&network, client_address(), U24_MAX);
    client.send(onoff_get(server_address(), app)).unwrap();
    assert_eq!(client.seq_counter().check(), None);
    assert_eq!(
        client.send(onoff_get(server_address(), app)),
        Err(SendError::OutOfSeq)
    );
}
#[test]
fn test_bearer_failure_resets_transaction() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    client.bearer_mut().closed = true;
    assert_eq!(
        client.send(onoff_get(server_address(), app)),
        Err(SendError::Bearer(BearerError::Closed))
    );
    assert_eq!(
        client.transaction_phase(Address::Unicast(server_address())),
        Some(Phase::Idle)
    );
    assert_eq!(client.sink().processed, 0);
}
#[test]
fn test_unknown_opcode_reported() {
    let (network, app) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());
    let opcode = Opcode::sig(0x8250).unwrap();
    client
        .send(OutgoingMessage::new(
            Address::Unicast(server_address()),
            MessageKeys::App(app),
            AccessPayload::new(opcode, &[1, 2]),
        ))
        .unwrap();
    assert_eq!(
        deliver(&mut client, &mut server),
        vec![Err(RecvError::UnknownOpcode(opcode))]
    );
    assert_eq!(server.sink().unknown, vec![(client_address(), vec![0x82, 0x50, 1, 2])]);
    assert!(server.sink().received.is_empty());
}
#[test]
fn test_control_message_received() {
    let (network, _) = fixture();
    let mut client = stack(&network, client_address());
    let mut server = stack(&network, server_address());
    let heartbeat = ControlPDU::Heartbeat(Heartbeat {
        init_ttl: TTL::new(5),
        features: Features(Features::PROXY),
    });
    server
        .send_control(Address::Unicast(client_address()), net_index(), &heartbeat)
        .unwrap();
    assert!(server
        .transaction_phase(Address::Unicast(client_address()))
        .is_none());
    deliver_ok(&mut server, &mut client);
    assert_eq!(client.sink().controls.len(), 1);
    assert_eq!(
        client.sink().controls[0].body,
        ControlBody::Transport(heartbeat)
    );
}
#[test]
fn test_foreign_network_key_rejected() {
    let (network, app) = fixture();
    let foreign = MeshNetwork::new();
    foreign.set_iv_index(IVIndexState::new(IVIndex(IV_INDEX), IVUpdateFlag(false)));
    foreign.add_net_key(net_index(), &NetKey::new_bytes([0x5A; 16]));
    foreign
        .add_app_key(app, AppKey::from_hex(APP_KEY).unwrap(), net_index())
        .unwrap();
    foreign.add_node(NodeInfo::new(server_address(), 1, DevKey::new_bytes([0x22; 16])));
    let foreign = Arc::new(foreign);
    let mut stranger = stack(&foreign, client_address());
    let mut server = stack(&network, server_address());

    stranger.send(onoff_get(server_address(), app)).unwrap();
    assert_eq!(
        deliver(&mut stranger, &mut server),
        vec![Err(RecvError::DecryptionFailed(Layer::Network))]
    );
    assert_eq!(server.sink().decrypt_failures, vec![Layer::Network]);
}
#[test]
fn test_beacons_ignored() {
    let (network, _) = fixture();
    let mut client = stack(&network, client_address());
    assert_eq!(client.receive(&[0x01, 0x00, 0x01, 0x02]), Ok(()));
    assert_eq!(
        client.receive(&[]),
        Err(RecvError::MalformedPdu(Layer::Proxy))
    );
    assert_eq!(
        client.receive(&[0x00, 0x01]),
        Err(RecvError::MalformedPdu(Layer::Network))
    );
    assert!(client.sink().decrypt_failures.is_empty());
}
