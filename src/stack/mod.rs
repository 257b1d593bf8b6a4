//! Bluetooth Mesh Stack that connects all the layers together.
//! See [`MeshStack`] for more.
//!
//! Layers:
//! - Access
//! - Upper Transport
//! - Lower Transport (segmentation, reassembly, acknowledgements)
//! - Network
//! - Proxy (PDU framing and the proxy filter)
//!
//! `MeshStack` is single threaded and never sleeps. The application (or `full::FullStack`)
//! calls `poll_timers` at `next_deadline`.

pub mod bearer;
pub mod directory;
#[cfg(feature = "full_stack")]
pub mod full;
mod incoming;
pub mod messages;
mod outgoing;
pub mod segments;
pub mod transactions;

#[cfg(test)]
mod tests;

use crate::access::Opcode;
use crate::address::Address;
use crate::config::StackConfig;
use crate::device_state::SeqCounter;
use crate::lower::PDUBytes;
use crate::mesh::{AppKeyIndex, NetKeyIndex, SequenceNumber};
use crate::models::OpcodeRegistry;
use crate::net::{self, NetworkNonceKind};
use crate::proxy::{self, ProxyFilterTracker};
use crate::reassembler::ReassembleError;
use crate::scheduler::TimeQueue;
use crate::stack::bearer::{Bearer, BearerError, StatusSink};
use crate::stack::directory::NodeDirectory;
use crate::stack::messages::MessageHeader;
use crate::stack::segments::{ReassemblyKey, ReassemblyTable};
use crate::stack::transactions::{Phase, TransactionKey, TransactionTable};
use alloc::vec::Vec;
use core::fmt::{Display, Formatter};
use std::time::Instant;

/// Layer a receive or decrypt failure happened in.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum Layer {
    Proxy,
    Network,
    Lower,
    Upper,
    Access,
}
impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let s = match self {
            Layer::Proxy => "proxy",
            Layer::Network => "network",
            Layer::Lower => "lower transport",
            Layer::Upper => "upper transport",
            Layer::Access => "access",
        };
        f.write_str(s)
    }
}
/// Rejected before any sequence number is used.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum InvalidArgument {
    Destination(Address),
    TTL(u8),
    AppKeyIndex(AppKeyIndex),
    NetKeyIndex(NetKeyIndex),
    /// Device key message to an address that isn't a known node.
    DeviceKey(Address),
    PayloadLength(usize),
    Opcode,
    /// Proxy filter requests carry 1 to 5 addresses.
    FilterAddresses(usize),
}
impl Display for InvalidArgument {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            InvalidArgument::Destination(a) => write!(f, "invalid destination {}", a),
            InvalidArgument::TTL(t) => write!(f, "invalid TTL {}", t),
            InvalidArgument::AppKeyIndex(i) => write!(f, "unknown {}", i),
            InvalidArgument::NetKeyIndex(i) => write!(f, "unknown {}", i),
            InvalidArgument::DeviceKey(a) => write!(f, "no device key for {}", a),
            InvalidArgument::PayloadLength(l) => write!(f, "bad payload length {}", l),
            InvalidArgument::Opcode => f.write_str("opcode can't be packed"),
            InvalidArgument::FilterAddresses(n) => write!(f, "{} filter addresses", n),
        }
    }
}
/// Returned when an outgoing message can't be sent for some reason.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum SendError {
    InvalidArgument(InvalidArgument),
    /// The 24-bit sequence number space is used up. Requires an IV update.
    OutOfSeq,
    TooManySegments,
    EncryptError(Layer),
    Bearer(BearerError),
}
impl From<InvalidArgument> for SendError {
    fn from(e: InvalidArgument) -> Self {
        SendError::InvalidArgument(e)
    }
}
impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            SendError::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
            SendError::OutOfSeq => f.write_str("out of sequence numbers"),
            SendError::TooManySegments => f.write_str("too many segments"),
            SendError::EncryptError(l) => write!(f, "{} encryption failed", l),
            SendError::Bearer(e) => write!(f, "{}", e),
        }
    }
}
/// Returned when an incoming PDU can't be received for some reason. The same failure is also
/// reported to the `StatusSink` where it has a callback.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum RecvError {
    MalformedPdu(Layer),
    DecryptionFailed(Layer),
    UnknownOpcode(Opcode),
    Reassemble(ReassembleError),
}
impl Display for RecvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            RecvError::MalformedPdu(l) => write!(f, "malformed {} PDU", l),
            RecvError::DecryptionFailed(l) => write!(f, "{} decryption failed", l),
            RecvError::UnknownOpcode(o) => write!(f, "unknown opcode {}", o),
            RecvError::Reassemble(e) => write!(f, "reassembly failed: {}", e),
        }
    }
}
/// A transaction whose ack or response never arrived.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct TransactionTimeout(pub Address);
impl Display for TransactionTimeout {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(f, "transaction to {} timed out", self.0)
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
enum TimerEvent {
    Transaction(TransactionKey),
    Reassembly(ReassemblyKey),
}
/// Bluetooth Mesh transport stack for one local element (usually a provisioner/configuration
/// client connected through a GATT proxy).
///
/// - `D` answers questions about nodes and keys.
/// - `B` carries framed PDUs to the proxy.
/// - `S` receives messages and failures.
pub struct MeshStack<D: NodeDirectory, B: Bearer, S: StatusSink> {
    config: StackConfig,
    directory: D,
    bearer: B,
    sink: S,
    seq: SeqCounter,
    registry: OpcodeRegistry,
    transactions: TransactionTable,
    reassembly: ReassemblyTable,
    timers: TimeQueue<TimerEvent, Instant>,
    proxy_filter: ProxyFilterTracker,
    logger: slog::Logger,
}
impl<D: NodeDirectory, B: Bearer, S: StatusSink> MeshStack<D, B, S> {
    /// `seq` is the next sequence number to use. It has to be persisted by the application
    /// (see `seq_counter`) or the node will be rejected as a replay after a restart.
    pub fn new(
        config: StackConfig,
        directory: D,
        bearer: B,
        sink: S,
        seq: SequenceNumber,
        logger: &slog::Logger,
    ) -> Self {
        let logger = logger.new(slog::o!("local" => config.local_address.value()));
        Self {
            config,
            directory,
            bearer,
            sink,
            seq: SeqCounter::new(seq),
            registry: OpcodeRegistry::with_builtin(),
            transactions: TransactionTable::new(),
            reassembly: ReassemblyTable::new(),
            timers: TimeQueue::new(),
            proxy_filter: ProxyFilterTracker::new(logger.new(slog::o!("layer" => "proxy"))),
            logger,
        }
    }
    pub fn config(&self) -> &StackConfig {
        &self.config
    }
    pub fn directory(&self) -> &D {
        &self.directory
    }
    pub fn bearer(&self) -> &B {
        &self.bearer
    }
    pub fn bearer_mut(&mut self) -> &mut B {
        &mut self.bearer
    }
    pub fn sink(&self) -> &S {
        &self.sink
    }
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
    pub fn logger(&self) -> &slog::Logger {
        &self.logger
    }
    pub fn seq_counter(&self) -> &SeqCounter {
        &self.seq
    }
    /// Add decoders for the application's own model messages here.
    pub fn registry_mut(&mut self) -> &mut OpcodeRegistry {
        &mut self.registry
    }
    pub fn proxy_filter(&self) -> &ProxyFilterTracker {
        &self.proxy_filter
    }
    /// Phase of the transaction towards `dst`. `None` if nothing was ever sent to or received
    /// from `dst`.
    pub fn transaction_phase(&self, dst: Address) -> Option<Phase> {
        self.transactions.phase(dst)
    }
    pub fn pending_reassemblies(&self) -> usize {
        self.reassembly.len()
    }
    /// When `poll_timers` should be called next. Can be earlier than needed.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.peek_timestamp()
    }
    /// Fires every timer due at `now`. Returns the transactions that timed out (they were also
    /// reported to the sink).
    pub fn poll_timers(&mut self, now: Instant) -> Vec<TransactionTimeout> {
        let mut timeouts = Vec::new();
        while let Some(event) = self.timers.pop_item_ready(now) {
            match event {
                TimerEvent::Transaction(key) => {
                    let dst = match self.transactions.lookup(key) {
                        Some((dst, state)) if state.is_waiting() => {
                            state.set_phase(Phase::TimedOut);
                            dst
                        }
                        _ => continue,
                    };
                    slog::warn!(self.logger, "transaction_timeout"; "dst" => dst.value());
                    if dst == Address::Unassigned {
                        self.proxy_filter.requests_failed();
                    }
                    self.sink.transaction_failed(dst, true);
                    self.transactions.reset(dst);
                    timeouts.push(TransactionTimeout(dst));
                }
                TimerEvent::Reassembly(key) => {
                    if let Some(segments) = self.reassembly.expire(key) {
                        slog::warn!(self.logger, "incomplete_timeout"; "src" => segments.src.value(), "seq_zero" => key.seq_zero.value());
                        let src = Address::Unicast(segments.src);
                        if self.transactions.get(src).map_or(false, |s| s.is_waiting()) {
                            if let Some(state) = self.transactions.get_mut(src) {
                                state.set_phase(Phase::TimedOut);
                            }
                            self.sink.transaction_failed(src, true);
                            timeouts.push(TransactionTimeout(src));
                        }
                        self.transactions.reset(src);
                    }
                }
            }
        }
        timeouts
    }
    fn arm_transaction_timer(&mut self, key: TransactionKey) {
        let at = Instant::now() + self.config.ack_timeout();
        self.timers.push(at, TimerEvent::Transaction(key));
    }
    fn arm_reassembly_timer(&mut self, key: ReassemblyKey) {
        let at = Instant::now() + self.config.incomplete_timeout();
        self.timers.push(at, TimerEvent::Reassembly(key));
    }
    /// Encrypts one network PDU with the transmit key of `header.net_key_index`, frames it and
    /// hands it to the bearer. Returns the framed bytes.
    fn send_network(
        &mut self,
        header: &MessageHeader,
        seq: SequenceNumber,
        transport_pdu: PDUBytes,
        nonce_kind: NetworkNonceKind,
    ) -> Result<Vec<u8>, SendError> {
        let net_keys = self.directory.net_keys();
        let keys = net_keys
            .get_keys(header.net_key_index)
            .ok_or(InvalidArgument::NetKeyIndex(header.net_key_index))?
            .tx_key()
            .network_keys();
        let pdu = net::PDU::new(
            net::Header {
                ivi: header.iv_index.ivi(),
                nid: keys.nid(),
                ctl: header.ctl,
                ttl: header.ttl,
                seq,
                src: header.src,
                dst: header.dst,
            },
            transport_pdu,
        );
        let encrypted = pdu
            .encrypt(keys, header.iv_index, nonce_kind)
            .map_err(|_| SendError::EncryptError(Layer::Network))?;
        let framed = proxy::frame(header.pdu_type, encrypted.data());
        slog::trace!(self.logger, "send_network"; "dst" => header.dst.value(), "seq" => seq.value(), "len" => framed.len());
        self.bearer
            .send(header.dst, &framed)
            .map_err(SendError::Bearer)?;
        Ok(framed)
    }
}
