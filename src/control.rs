//! Bluetooth Mesh Control Layer. Transport control messages (`CTL == 1`) share one 7-bit opcode
//! space. All multi-byte parameters are big endian.
//!
//! The friendship messages are only framed here; acting as a friend or low power node is left to
//! the application.

use crate::address::{Address, UnicastAddress};
use crate::bytes::ToFromBytesEndian;
use crate::lower::{BlockAck, SeqZero, UnsegmentedControlPDU, OBO, SEQ_ZERO_MAX};
use crate::mesh::{IVIndex, IVUpdateFlag, TTL, U24};
use core::convert::{TryFrom, TryInto};
use core::fmt::{Display, Formatter};

/// 7 Bit Control Opcode
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum ControlOpcode {
    Ack = 0x00,
    FriendPoll = 0x01,
    FriendUpdate = 0x02,
    FriendRequest = 0x03,
    FriendOffer = 0x04,
    FriendClear = 0x05,
    FriendClearConfirm = 0x06,
    FriendSubscriptionListAdd = 0x07,
    FriendSubscriptionListRemove = 0x08,
    FriendSubscriptionListConfirm = 0x09,
    Heartbeat = 0x0A,
}
impl ControlOpcode {
    #[must_use]
    pub fn new(opcode: u8) -> Option<Self> {
        match opcode {
            0x00 => Some(ControlOpcode::Ack),
            0x01 => Some(ControlOpcode::FriendPoll),
            0x02 => Some(ControlOpcode::FriendUpdate),
            0x03 => Some(ControlOpcode::FriendRequest),
            0x04 => Some(ControlOpcode::FriendOffer),
            0x05 => Some(ControlOpcode::FriendClear),
            0x06 => Some(ControlOpcode::FriendClearConfirm),
            0x07 => Some(ControlOpcode::FriendSubscriptionListAdd),
            0x08 => Some(ControlOpcode::FriendSubscriptionListRemove),
            0x09 => Some(ControlOpcode::FriendSubscriptionListConfirm),
            0x0A => Some(ControlOpcode::Heartbeat),
            _ => None,
        }
    }
}
impl From<ControlOpcode> for u8 {
    fn from(opcode: ControlOpcode) -> Self {
        opcode as u8
    }
}
/// Upper transport control PDU: opcode and raw parameters.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ControlPayload<Storage: AsRef<[u8]>> {
    pub opcode: ControlOpcode,
    pub payload: Storage,
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ControlMessageError {
    BufferTooSmall,
    BadBytes,
    BadLength,
    BadOpcode,
}
impl Display for ControlMessageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let s = match self {
            ControlMessageError::BufferTooSmall => "buffer too small",
            ControlMessageError::BadBytes => "bad control message bytes",
            ControlMessageError::BadLength => "bad control message length",
            ControlMessageError::BadOpcode => "unexpected control opcode",
        };
        f.write_str(s)
    }
}
pub trait ControlMessage: Sized {
    const OPCODE: ControlOpcode;
    fn byte_len(&self) -> usize;
    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError>;
    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError>;
    fn try_from_pdu(value: &UnsegmentedControlPDU) -> Result<Self, ControlMessageError> {
        if value.opcode() == Self::OPCODE {
            Self::unpack(value.data())
        } else {
            Err(ControlMessageError::BadOpcode)
        }
    }
}
fn check_len(buf: &[u8], len: usize) -> Result<(), ControlMessageError> {
    if buf.len() == len {
        Ok(())
    } else {
        Err(ControlMessageError::BadLength)
    }
}
fn check_buf(buf: &[u8], len: usize) -> Result<(), ControlMessageError> {
    if buf.len() < len {
        Err(ControlMessageError::BufferTooSmall)
    } else {
        Ok(())
    }
}
fn be_u16(buf: &[u8]) -> Result<u16, ControlMessageError> {
    u16::from_bytes_be(buf).ok_or(ControlMessageError::BadLength)
}

/// Segment Acknowledgment. `OBO(1) SeqZero(13) RFU(2) BlockAck(32)`.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Ack {
    pub obo: OBO,
    pub seq_zero: SeqZero,
    pub block_ack: BlockAck,
}
const ACK_LEN: usize = 6;
impl ControlMessage for Ack {
    const OPCODE: ControlOpcode = ControlOpcode::Ack;

    fn byte_len(&self) -> usize {
        ACK_LEN
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, ACK_LEN)?;
        let head = be_u16(&buf[..2])?;
        let block_ack = u32::from_bytes_be(&buf[2..6]).ok_or(ControlMessageError::BadLength)?;
        Ok(Self {
            obo: OBO(head & 0x8000 != 0),
            seq_zero: SeqZero::new((head >> 2) & SEQ_ZERO_MAX),
            block_ack: BlockAck(block_ack),
        })
    }

    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, ACK_LEN)?;
        let head = u16::from(self.obo.0) << 15 | self.seq_zero.value() << 2;
        buf[..2].copy_from_slice(&head.to_be_bytes());
        buf[2..6].copy_from_slice(&(self.block_ack.0).to_be_bytes());
        Ok(())
    }
}
/// Friend Sequence Number. Toggled by the low power node for each new poll.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FSN(pub bool);
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendPoll {
    pub fsn: FSN,
}
impl ControlMessage for FriendPoll {
    const OPCODE: ControlOpcode = ControlOpcode::FriendPoll;

    fn byte_len(&self) -> usize {
        1
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, 1)?;
        if buf[0] & 0xFE != 0 {
            // Padding must be zero.
            return Err(ControlMessageError::BadBytes);
        }
        Ok(Self {
            fsn: FSN(buf[0] & 0x01 != 0),
        })
    }

    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, 1)?;
        buf[0] = u8::from(self.fsn.0);
        Ok(())
    }
}
/// More Data flag of a Friend Update.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct MD(pub bool);
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendUpdate {
    pub key_refresh: bool,
    pub iv_update: IVUpdateFlag,
    pub iv_index: IVIndex,
    pub md: MD,
}
impl ControlMessage for FriendUpdate {
    const OPCODE: ControlOpcode = ControlOpcode::FriendUpdate;

    fn byte_len(&self) -> usize {
        6
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, 6)?;
        let md = match buf[5] {
            0 => MD(false),
            1 => MD(true),
            _ => return Err(ControlMessageError::BadBytes),
        };
        Ok(Self {
            key_refresh: buf[0] & 0x01 != 0,
            iv_update: IVUpdateFlag(buf[0] & 0x02 != 0),
            iv_index: IVIndex::from_bytes_be(&buf[1..5]).ok_or(ControlMessageError::BadLength)?,
            md,
        })
    }

    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, 6)?;
        buf[0] = u8::from(self.key_refresh) | u8::from(self.iv_update.0) << 1;
        buf[1..5].copy_from_slice(&self.iv_index.to_bytes_be());
        buf[5] = u8::from(self.md.0);
        Ok(())
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum RSSIFactor {
    Factor1 = 0b00,
    Factor15 = 0b01,
    Factor2 = 0b10,
    Factor25 = 0b11,
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ReceiveWindowFactor {
    Factor1 = 0b00,
    Factor15 = 0b01,
    Factor2 = 0b10,
    Factor25 = 0b11,
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum MinQueueSizeLog {
    Prohibited = 0b000,
    N2 = 0b001,
    N4 = 0b010,
    N8 = 0b011,
    N16 = 0b100,
    N32 = 0b101,
    N64 = 0b110,
    N128 = 0b111,
}
/// Friend Request criteria octet. `RFU(1) RSSIFactor(2) ReceiveWindowFactor(2)
/// MinQueueSizeLog(3)`.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Criteria {
    pub rssi_factor: RSSIFactor,
    pub receive_window_factor: ReceiveWindowFactor,
    pub min_queue_size_log: MinQueueSizeLog,
}
impl Criteria {
    fn unpack(b: u8) -> Result<Self, ControlMessageError> {
        if b & 0x80 != 0 {
            return Err(ControlMessageError::BadBytes);
        }
        let rssi_factor = match (b >> 5) & 0b11 {
            0b00 => RSSIFactor::Factor1,
            0b01 => RSSIFactor::Factor15,
            0b10 => RSSIFactor::Factor2,
            _ => RSSIFactor::Factor25,
        };
        let receive_window_factor = match (b >> 3) & 0b11 {
            0b00 => ReceiveWindowFactor::Factor1,
            0b01 => ReceiveWindowFactor::Factor15,
            0b10 => ReceiveWindowFactor::Factor2,
            _ => ReceiveWindowFactor::Factor25,
        };
        let min_queue_size_log = match b & 0b111 {
            0b000 => return Err(ControlMessageError::BadBytes),
            0b001 => MinQueueSizeLog::N2,
            0b010 => MinQueueSizeLog::N4,
            0b011 => MinQueueSizeLog::N8,
            0b100 => MinQueueSizeLog::N16,
            0b101 => MinQueueSizeLog::N32,
            0b110 => MinQueueSizeLog::N64,
            _ => MinQueueSizeLog::N128,
        };
        Ok(Self {
            rssi_factor,
            receive_window_factor,
            min_queue_size_log,
        })
    }
    fn pack(self) -> u8 {
        (self.rssi_factor as u8) << 5
            | (self.receive_window_factor as u8) << 3
            | self.min_queue_size_log as u8
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendRequest {
    pub criteria: Criteria,
    /// Receive delay in milliseconds (`0x0A..=0xFF`).
    pub receive_delay: u8,
    /// Poll timeout in units of 100 milliseconds.
    pub poll_timeout: U24,
    /// Previous friend of the low power node. Unassigned if there wasn't one.
    pub previous_address: Address,
    pub num_elements: u8,
    pub lpn_counter: u16,
}
const FRIEND_REQUEST_LEN: usize = 10;
impl ControlMessage for FriendRequest {
    const OPCODE: ControlOpcode = ControlOpcode::FriendRequest;

    fn byte_len(&self) -> usize {
        FRIEND_REQUEST_LEN
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, FRIEND_REQUEST_LEN)?;
        Ok(Self {
            criteria: Criteria::unpack(buf[0])?,
            receive_delay: buf[1],
            poll_timeout: U24::from_bytes_be(&buf[2..5]).ok_or(ControlMessageError::BadLength)?,
            previous_address: Address::from(be_u16(&buf[5..7])?),
            num_elements: buf[7],
            lpn_counter: be_u16(&buf[8..10])?,
        })
    }

    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, FRIEND_REQUEST_LEN)?;
        buf[0] = self.criteria.pack();
        buf[1] = self.receive_delay;
        buf[2..5].copy_from_slice(&self.poll_timeout.to_bytes_be());
        buf[5..7].copy_from_slice(&self.previous_address.to_bytes_be());
        buf[7] = self.num_elements;
        buf[8..10].copy_from_slice(&self.lpn_counter.to_be_bytes());
        Ok(())
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendOffer {
    pub receive_window: u8,
    pub queue_size: u8,
    pub subscription_list_size: u8,
    pub rssi: i8,
    pub friend_counter: u16,
}
impl ControlMessage for FriendOffer {
    const OPCODE: ControlOpcode = ControlOpcode::FriendOffer;

    fn byte_len(&self) -> usize {
        6
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, 6)?;
        Ok(Self {
            receive_window: buf[0],
            queue_size: buf[1],
            subscription_list_size: buf[2],
            rssi: buf[3] as i8,
            friend_counter: be_u16(&buf[4..6])?,
        })
    }

    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, 6)?;
        buf[0] = self.receive_window;
        buf[1] = self.queue_size;
        buf[2] = self.subscription_list_size;
        buf[3] = self.rssi as u8;
        buf[4..6].copy_from_slice(&self.friend_counter.to_be_bytes());
        Ok(())
    }
}
/// Body shared by Friend Clear and Friend Clear Confirm.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct LPNClear {
    pub lpn_address: UnicastAddress,
    pub lpn_counter: u16,
}
impl LPNClear {
    fn byte_len(&self) -> usize {
        4
    }
    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, 4)?;
        Ok(Self {
            lpn_address: UnicastAddress::try_from(be_u16(&buf[..2])?)
                .map_err(|_| ControlMessageError::BadBytes)?,
            lpn_counter: be_u16(&buf[2..4])?,
        })
    }
    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, 4)?;
        buf[..2].copy_from_slice(&self.lpn_address.to_bytes_be());
        buf[2..4].copy_from_slice(&self.lpn_counter.to_be_bytes());
        Ok(())
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendClear(pub LPNClear);
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendClearConfirm(pub LPNClear);
/// Body shared by Friend Subscription List Add and Remove.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct SubscriptionList {
    pub transaction_number: u8,
    pub addresses: Vec<Address>,
}
impl SubscriptionList {
    fn byte_len(&self) -> usize {
        1 + self.addresses.len() * 2
    }
    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        if buf.len() < 3 || buf.len() % 2 != 1 {
            return Err(ControlMessageError::BadLength);
        }
        let addresses = buf[1..]
            .chunks_exact(2)
            .map(|c| Address::from(u16::from_be_bytes([c[0], c[1]])))
            .collect();
        Ok(Self {
            transaction_number: buf[0],
            addresses,
        })
    }
    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, self.byte_len())?;
        buf[0] = self.transaction_number;
        for (chunk, address) in buf[1..].chunks_exact_mut(2).zip(&self.addresses) {
            chunk.copy_from_slice(&address.to_bytes_be());
        }
        Ok(())
    }
}
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendSubscriptionListAdd(pub SubscriptionList);
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendSubscriptionListRemove(pub SubscriptionList);
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FriendSubscriptionListConfirm {
    pub transaction_number: u8,
}
macro_rules! wrapped_control_message {
    ( $( $name:ident($inner:ident) => $opcode:ident ),* ) => {
        $(
            impl ControlMessage for $name {
                const OPCODE: ControlOpcode = ControlOpcode::$opcode;

                fn byte_len(&self) -> usize {
                    self.0.byte_len()
                }

                fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
                    Ok($name($inner::unpack(buf)?))
                }

                fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
                    self.0.pack_into(buf)
                }
            }
        )*
    };
}
wrapped_control_message!(
    FriendClear(LPNClear) => FriendClear,
    FriendClearConfirm(LPNClear) => FriendClearConfirm,
    FriendSubscriptionListAdd(SubscriptionList) => FriendSubscriptionListAdd,
    FriendSubscriptionListRemove(SubscriptionList) => FriendSubscriptionListRemove
);
impl ControlMessage for FriendSubscriptionListConfirm {
    const OPCODE: ControlOpcode = ControlOpcode::FriendSubscriptionListConfirm;

    fn byte_len(&self) -> usize {
        1
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, 1)?;
        Ok(Self {
            transaction_number: buf[0],
        })
    }

    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, 1)?;
        buf[0] = self.transaction_number;
        Ok(())
    }
}
/// Bit field of the features active on the heartbeat's source node.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct Features(pub u16);
impl Features {
    pub const RELAY: u16 = 0x0001;
    pub const PROXY: u16 = 0x0002;
    pub const FRIEND: u16 = 0x0004;
    pub const LOW_POWER: u16 = 0x0008;
    #[must_use]
    pub fn has(self, feature: u16) -> bool {
        self.0 & feature != 0
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Heartbeat {
    pub init_ttl: TTL,
    pub features: Features,
}
impl ControlMessage for Heartbeat {
    const OPCODE: ControlOpcode = ControlOpcode::Heartbeat;

    fn byte_len(&self) -> usize {
        3
    }

    fn unpack(buf: &[u8]) -> Result<Self, ControlMessageError> {
        check_len(buf, 3)?;
        Ok(Self {
            init_ttl: TTL::new(buf[0] & 0x7F),
            features: Features(be_u16(&buf[1..3])?),
        })
    }

    fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        check_buf(buf, 3)?;
        buf[0] = self.init_ttl.value();
        buf[1..3].copy_from_slice(&(self.features.0).to_be_bytes());
        Ok(())
    }
}
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ControlPDU {
    Ack(Ack),
    FriendPoll(FriendPoll),
    FriendUpdate(FriendUpdate),
    FriendRequest(FriendRequest),
    FriendOffer(FriendOffer),
    FriendClear(FriendClear),
    FriendClearConfirm(FriendClearConfirm),
    FriendSubscriptionListAdd(FriendSubscriptionListAdd),
    FriendSubscriptionListRemove(FriendSubscriptionListRemove),
    FriendSubscriptionListConfirm(FriendSubscriptionListConfirm),
    Heartbeat(Heartbeat),
}
impl ControlPDU {
    pub fn try_unpack(opcode: ControlOpcode, payload: &[u8]) -> Result<Self, ControlMessageError> {
        (&ControlPayload { opcode, payload }).try_into()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ControlPDU::Ack(pdu) => pdu.byte_len(),
            ControlPDU::FriendPoll(pdu) => pdu.byte_len(),
            ControlPDU::FriendUpdate(pdu) => pdu.byte_len(),
            ControlPDU::FriendRequest(pdu) => pdu.byte_len(),
            ControlPDU::FriendOffer(pdu) => pdu.byte_len(),
            ControlPDU::FriendClear(pdu) => pdu.byte_len(),
            ControlPDU::FriendClearConfirm(pdu) => pdu.byte_len(),
            ControlPDU::FriendSubscriptionListAdd(pdu) => pdu.byte_len(),
            ControlPDU::FriendSubscriptionListRemove(pdu) => pdu.byte_len(),
            ControlPDU::FriendSubscriptionListConfirm(pdu) => pdu.byte_len(),
            ControlPDU::Heartbeat(pdu) => pdu.byte_len(),
        }
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    #[must_use]
    pub fn opcode(&self) -> ControlOpcode {
        match self {
            ControlPDU::Ack(_) => Ack::OPCODE,
            ControlPDU::FriendPoll(_) => FriendPoll::OPCODE,
            ControlPDU::FriendUpdate(_) => FriendUpdate::OPCODE,
            ControlPDU::FriendRequest(_) => FriendRequest::OPCODE,
            ControlPDU::FriendOffer(_) => FriendOffer::OPCODE,
            ControlPDU::FriendClear(_) => FriendClear::OPCODE,
            ControlPDU::FriendClearConfirm(_) => FriendClearConfirm::OPCODE,
            ControlPDU::FriendSubscriptionListAdd(_) => FriendSubscriptionListAdd::OPCODE,
            ControlPDU::FriendSubscriptionListRemove(_) => FriendSubscriptionListRemove::OPCODE,
            ControlPDU::FriendSubscriptionListConfirm(_) => FriendSubscriptionListConfirm::OPCODE,
            ControlPDU::Heartbeat(_) => Heartbeat::OPCODE,
        }
    }
    pub fn pack_into(&self, buf: &mut [u8]) -> Result<(), ControlMessageError> {
        match self {
            ControlPDU::Ack(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendPoll(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendUpdate(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendRequest(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendOffer(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendClear(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendClearConfirm(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendSubscriptionListAdd(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendSubscriptionListRemove(pdu) => pdu.pack_into(buf),
            ControlPDU::FriendSubscriptionListConfirm(pdu) => pdu.pack_into(buf),
            ControlPDU::Heartbeat(pdu) => pdu.pack_into(buf),
        }
    }
    pub fn to_vec_payload(&self) -> Result<ControlPayload<Vec<u8>>, ControlMessageError> {
        let mut payload = vec![0_u8; self.len()];
        self.pack_into(&mut payload)?;
        Ok(ControlPayload {
            opcode: self.opcode(),
            payload,
        })
    }
}
impl<Storage: AsRef<[u8]>> TryFrom<&ControlPayload<Storage>> for ControlPDU {
    type Error = ControlMessageError;

    fn try_from(value: &ControlPayload<Storage>) -> Result<Self, Self::Error> {
        let buf = value.payload.as_ref();
        Ok(match value.opcode {
            ControlOpcode::Ack => ControlPDU::Ack(Ack::unpack(buf)?),
            ControlOpcode::FriendPoll => ControlPDU::FriendPoll(FriendPoll::unpack(buf)?),
            ControlOpcode::FriendUpdate => ControlPDU::FriendUpdate(FriendUpdate::unpack(buf)?),
            ControlOpcode::FriendRequest => ControlPDU::FriendRequest(FriendRequest::unpack(buf)?),
            ControlOpcode::FriendOffer => ControlPDU::FriendOffer(FriendOffer::unpack(buf)?),
            ControlOpcode::FriendClear => ControlPDU::FriendClear(FriendClear::unpack(buf)?),
            ControlOpcode::FriendClearConfirm => {
                ControlPDU::FriendClearConfirm(FriendClearConfirm::unpack(buf)?)
            }
            ControlOpcode::FriendSubscriptionListAdd => {
                ControlPDU::FriendSubscriptionListAdd(FriendSubscriptionListAdd::unpack(buf)?)
            }
            ControlOpcode::FriendSubscriptionListRemove => {
                ControlPDU::FriendSubscriptionListRemove(FriendSubscriptionListRemove::unpack(buf)?)
            }
            ControlOpcode::FriendSubscriptionListConfirm => {
                ControlPDU::FriendSubscriptionListConfirm(FriendSubscriptionListConfirm::unpack(
                    buf,
                )?)
            }
            ControlOpcode::Heartbeat => ControlPDU::Heartbeat(Heartbeat::unpack(buf)?),
        })
    }
}
impl TryFrom<&UnsegmentedControlPDU> for ControlPDU {
    type Error = ControlMessageError;

    fn try_from(value: &UnsegmentedControlPDU) -> Result<Self, Self::Error> {
        ControlPDU::try_unpack(value.opcode(), value.data())
    }
}
