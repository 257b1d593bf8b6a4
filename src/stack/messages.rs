//! Messages as seen by the application, inbound and outbound.

use crate::access::{AccessPayload, Opcode};
use crate::address::{Address, UnicastAddress};
use crate::control::ControlPDU;
use crate::crypto::aes::MicSize;
use crate::crypto::{AID, AKF};
use crate::mesh::{AppKeyIndex, IVIndex, NetKeyIndex, SequenceNumber, CTL, TTL};
use crate::models::ModelMessage;
use crate::proxy::{ProxyConfigMessage, ProxyPDUType};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// Key used for the upper transport encryption of an outgoing access message.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum MessageKeys {
    /// Device key of the destination node, sent on the given network key.
    Device(NetKeyIndex),
    /// Application key. The network key is the one the application key is bound to.
    App(AppKeyIndex),
}
/// Access message the application wants to send.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct OutgoingMessage {
    pub dst: Address,
    /// `None` uses the configured default TTL.
    pub ttl: Option<u8>,
    pub keys: MessageKeys,
    pub payload: AccessPayload,
    pub mic_size: MicSize,
    /// Opcode of the status message that completes the transaction.
    pub expected_response: Option<Opcode>,
}
impl OutgoingMessage {
    #[must_use]
    pub fn new(dst: Address, keys: MessageKeys, payload: AccessPayload) -> Self {
        Self {
            dst,
            ttl: None,
            keys,
            payload,
            mic_size: MicSize::Small,
            expected_response: None,
        }
    }
    #[must_use]
    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = Some(ttl);
        self
    }
    #[must_use]
    pub fn with_mic_size(mut self, mic_size: MicSize) -> Self {
        self.mic_size = mic_size;
        self
    }
    #[must_use]
    pub fn expecting(mut self, response: Opcode) -> Self {
        self.expected_response = Some(response);
        self
    }
    /// Length of the upper transport PDU (`payload || TransMIC`).
    #[must_use]
    pub fn upper_len(&self) -> usize {
        self.payload.byte_len() + self.mic_size.byte_size()
    }
}
/// Network layer fields shared by every message.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct MessageHeader {
    pub ctl: CTL,
    pub ttl: TTL,
    pub src: UnicastAddress,
    pub dst: Address,
    /// Sequence number of the first network PDU (the `SeqAuth` for segmented messages).
    pub seq: SequenceNumber,
    pub iv_index: IVIndex,
    pub net_key_index: NetKeyIndex,
    pub pdu_type: ProxyPDUType,
}
#[derive(Debug)]
pub struct AccessMessage {
    pub header: MessageHeader,
    pub akf: AKF,
    pub aid: AID,
    /// `None` for device key messages.
    pub app_key_index: Option<AppKeyIndex>,
    pub mic_size: MicSize,
    pub payload: AccessPayload,
    /// Typed message, when the opcode is registered.
    pub decoded: Option<Box<dyn ModelMessage>>,
    /// Proxy framed network PDUs by segment offset (offset 0 for unsegmented messages). Only
    /// filled in for sent messages.
    pub network_layer_pdu: BTreeMap<u8, Vec<u8>>,
}
impl AccessMessage {
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.payload.opcode()
    }
    #[must_use]
    pub fn decoded_as<M: ModelMessage>(&self) -> Option<&M> {
        self.decoded.as_ref().and_then(|m| m.downcast_ref::<M>())
    }
}
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ControlBody {
    Transport(ControlPDU),
    Proxy(ProxyConfigMessage),
}
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ControlMessage {
    pub header: MessageHeader,
    pub body: ControlBody,
    pub network_layer_pdu: BTreeMap<u8, Vec<u8>>,
}
#[derive(Debug)]
pub enum Message {
    Access(AccessMessage),
    Control(ControlMessage),
}
impl Message {
    #[must_use]
    pub fn header(&self) -> &MessageHeader {
        match self {
            Message::Access(m) => &m.header,
            Message::Control(m) => &m.header,
        }
    }
    #[must_use]
    pub fn src(&self) -> UnicastAddress {
        self.header().src
    }
    #[must_use]
    pub fn dst(&self) -> Address {
        self.header().dst
    }
    #[must_use]
    pub fn ctl(&self) -> CTL {
        self.header().ctl
    }
    #[must_use]
    pub fn seq(&self) -> SequenceNumber {
        self.header().seq
    }
    #[must_use]
    pub fn pdu_type(&self) -> ProxyPDUType {
        self.header().pdu_type
    }
    #[must_use]
    pub fn network_layer_pdu(&self) -> &BTreeMap<u8, Vec<u8>> {
        match self {
            Message::Access(m) => &m.network_layer_pdu,
            Message::Control(m) => &m.network_layer_pdu,
        }
    }
    pub(crate) fn network_layer_pdu_mut(&mut self) -> &mut BTreeMap<u8, Vec<u8>> {
        match self {
            Message::Access(m) => &mut m.network_layer_pdu,
            Message::Control(m) => &mut m.network_layer_pdu,
        }
    }
    #[must_use]
    pub fn access(&self) -> Option<&AccessMessage> {
        match self {
            Message::Access(m) => Some(m),
            Message::Control(_) => None,
        }
    }
    #[must_use]
    pub fn control(&self) -> Option<&ControlMessage> {
        match self {
            Message::Access(_) => None,
            Message::Control(m) => Some(m),
        }
    }
}
