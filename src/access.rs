//! Access Layer between Models and the rest of the stack (Transport, Network, etc). The most
//! surface layer of the stack. An access payload is an opcode (1, 2 or 3 octets) followed by the
//! raw message parameters.
//!
//! | First octet | Opcode length | Format                                        |
//! | ----------- | ------------- | --------------------------------------------- |
//! | `0xxxxxxx`  | 1             | SIG (`0x7F` is RFU)                           |
//! | `10xxxxxx`  | 2             | SIG, big endian                               |
//! | `11xxxxxx`  | 3             | 6-bit vendor opcode + company id (little end) |
use crate::bytes::ToFromBytesEndian;
use crate::mesh::{CompanyID, ModelID};
use core::convert::TryFrom;
use core::fmt::{Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum SigOpcode {
    SingleOctet(u8),
    DoubleOctet(u16),
}
impl SigOpcode {
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            SigOpcode::SingleOctet(_) => 1,
            SigOpcode::DoubleOctet(_) => 2,
        }
    }
}
impl From<SigOpcode> for Opcode {
    fn from(opcode: SigOpcode) -> Self {
        Opcode::SIG(opcode)
    }
}
const VENDOR_OPCODE_MAX: u8 = (1_u8 << 6) - 1;
/// 6 bit Vendor Opcode
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct VendorOpcode(u8);
impl VendorOpcode {
    /// `None` if `opcode` doesn't fit in 6 bits.
    #[must_use]
    pub fn new(opcode: u8) -> Option<Self> {
        if opcode <= VENDOR_OPCODE_MAX {
            Some(VendorOpcode(opcode))
        } else {
            None
        }
    }
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
/// Returned when bytes don't form an opcode (too short, RFU) or an opcode can't be packed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct OpcodeConversationError(pub ());
impl Display for OpcodeConversationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        f.write_str("malformed opcode")
    }
}
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Opcode {
    SIG(SigOpcode),
    Vendor(VendorOpcode, CompanyID),
}
impl Opcode {
    /// Creates a SIG opcode from its numeric form (`0x00..=0x7E` or `0x8000..=0xBFFF`).
    #[must_use]
    pub fn sig(opcode: u16) -> Option<Opcode> {
        if opcode < 0x7F {
            Some(Opcode::SIG(SigOpcode::SingleOctet(opcode as u8)))
        } else if opcode & 0xC000 == 0x8000 {
            Some(Opcode::SIG(SigOpcode::DoubleOctet(opcode)))
        } else {
            None
        }
    }
    /// Creates a vendor opcode. `opcode` is the 6-bit part (`0x00..=0x3F`).
    #[must_use]
    pub fn vendor(opcode: u8, company_id: CompanyID) -> Option<Opcode> {
        Some(Opcode::Vendor(VendorOpcode::new(opcode)?, company_id))
    }
    #[must_use]
    pub fn company_id(&self) -> Option<CompanyID> {
        match self {
            Opcode::Vendor(_, cid) => Some(*cid),
            _ => None,
        }
    }
    #[must_use]
    pub fn is_sig(&self) -> bool {
        self.company_id().is_none()
    }
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        !self.is_sig()
    }
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Opcode::SIG(o) => o.byte_len(),
            Opcode::Vendor(_, _) => 3,
        }
    }
    #[must_use]
    pub const fn max_byte_len() -> usize {
        3
    }
    /// Opcode length implied by the first octet of an access payload.
    pub fn len_from_first_octet(first: u8) -> Result<usize, OpcodeConversationError> {
        match first {
            0x7F => Err(OpcodeConversationError(())),
            f if f & 0x80 == 0 => Ok(1),
            f if f & 0xC0 == 0x80 => Ok(2),
            _ => Ok(3),
        }
    }
    /// Unpacks the opcode at the start of `bytes`. Extra bytes after the opcode are ignored.
    pub fn unpack_from(bytes: &[u8]) -> Result<Self, OpcodeConversationError> {
        let first = *bytes.first().ok_or(OpcodeConversationError(()))?;
        let len = Self::len_from_first_octet(first)?;
        if bytes.len() < len {
            return Err(OpcodeConversationError(()));
        }
        Ok(match len {
            1 => Opcode::SIG(SigOpcode::SingleOctet(first)),
            2 => Opcode::SIG(SigOpcode::DoubleOctet(u16::from_be_bytes([first, bytes[1]]))),
            _ => Opcode::Vendor(
                VendorOpcode(first & VENDOR_OPCODE_MAX),
                CompanyID(u16::from_le_bytes([bytes[1], bytes[2]])),
            ),
        })
    }
    pub fn pack_into(&self, buffer: &mut [u8]) -> Result<(), OpcodeConversationError> {
        if buffer.len() < self.byte_len() {
            return Err(OpcodeConversationError(()));
        }
        match *self {
            Opcode::SIG(SigOpcode::SingleOctet(s)) => {
                if s & 0x80 != 0 || s == 0x7F {
                    return Err(OpcodeConversationError(()));
                }
                buffer[0] = s;
            }
            Opcode::SIG(SigOpcode::DoubleOctet(d)) => {
                if d & 0xC000 != 0x8000 {
                    return Err(OpcodeConversationError(()));
                }
                buffer[..2].copy_from_slice(&d.to_be_bytes());
            }
            Opcode::Vendor(opcode, company_id) => {
                buffer[0] = opcode.0 | 0xC0;
                buffer[1..3].copy_from_slice(&company_id.to_bytes_le());
            }
        }
        Ok(())
    }
}
impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            Opcode::SIG(SigOpcode::SingleOctet(s)) => write!(f, "{:#04x}", s),
            Opcode::SIG(SigOpcode::DoubleOctet(d)) => write!(f, "{:#06x}", d),
            Opcode::Vendor(o, cid) => write!(f, "vendor({:#04x}, company {:#06x})", o.0, cid.0),
        }
    }
}
/// Identifies a model on an element. SIG models are 16-bit, vendor models 32-bit
/// (`company_id << 16 | model_id`). Packed little endian with the company id first.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ModelIdentifier {
    model_id: ModelID,
    company_id: Option<CompanyID>,
}
impl ModelIdentifier {
    #[must_use]
    pub fn new_sig(sig_model_id: ModelID) -> ModelIdentifier {
        ModelIdentifier {
            model_id: sig_model_id,
            company_id: None,
        }
    }
    /// Creates a new vendor model from a `ModelID` and Bluetooth `CompanyID`
    #[must_use]
    pub fn new_vendor(model_id: ModelID, company_id: CompanyID) -> ModelIdentifier {
        ModelIdentifier {
            model_id,
            company_id: Some(company_id),
        }
    }
    #[must_use]
    pub const fn vendor_byte_len() -> usize {
        4
    }
    #[must_use]
    pub const fn sig_byte_len() -> usize {
        2
    }
    #[must_use]
    pub fn byte_len(&self) -> usize {
        if self.is_vendor() {
            Self::vendor_byte_len()
        } else {
            Self::sig_byte_len()
        }
    }
    #[must_use]
    pub fn model_id(&self) -> ModelID {
        self.model_id
    }
    /// Returns the `CompanyID` of the vendor model or `None` if it's a SIG model.
    #[must_use]
    pub fn company_id(&self) -> Option<CompanyID> {
        self.company_id
    }
    #[must_use]
    pub fn is_sig(&self) -> bool {
        self.company_id.is_none()
    }
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        !self.is_sig()
    }
    /// Numeric form. SIG models stay 16-bit, vendor models are `company_id << 16 | model_id`.
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        let model = u32::from((self.model_id).0);
        match self.company_id {
            Some(cid) => u32::from(cid.0) << 16 | model,
            None => model,
        }
    }
    /// Inverse of [`ModelIdentifier::as_u32`]. `is_vendor` can't be inferred from the number
    /// alone (a vendor model of company `0x0000` looks like a SIG model).
    #[must_use]
    pub fn from_u32(value: u32, is_vendor: bool) -> ModelIdentifier {
        let model_id = ModelID(value as u16);
        if is_vendor {
            Self::new_vendor(model_id, CompanyID((value >> 16) as u16))
        } else {
            Self::new_sig(model_id)
        }
    }
    pub fn pack_into(&self, buffer: &mut [u8]) -> Result<(), OpcodeConversationError> {
        if buffer.len() < self.byte_len() {
            return Err(OpcodeConversationError(()));
        }
        match self.company_id {
            Some(cid) => {
                buffer[..2].copy_from_slice(&cid.to_bytes_le());
                buffer[2..4].copy_from_slice(&self.model_id.to_bytes_le());
            }
            None => buffer[..2].copy_from_slice(&self.model_id.to_bytes_le()),
        }
        Ok(())
    }
    /// Unpacks a 2 byte SIG or 4 byte vendor model identifier.
    pub fn unpack_from(bytes: &[u8]) -> Result<Self, OpcodeConversationError> {
        match bytes.len() {
            2 => Ok(Self::new_sig(
                ModelID::from_bytes_le(bytes).ok_or(OpcodeConversationError(()))?,
            )),
            4 => Ok(Self::new_vendor(
                ModelID::from_bytes_le(&bytes[2..4]).ok_or(OpcodeConversationError(()))?,
                CompanyID::from_bytes_le(&bytes[..2]).ok_or(OpcodeConversationError(()))?,
            )),
            _ => Err(OpcodeConversationError(())),
        }
    }
}

/// Plaintext access layer PDU.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AccessPayload {
    opcode: Opcode,
    parameters: Vec<u8>,
}
/// 32 segments of 12 bytes minus the smallest TransMIC.
pub const MAX_ACCESS_PAYLOAD_LEN: usize = 380;
impl AccessPayload {
    #[must_use]
    pub fn new(opcode: Opcode, parameters: &[u8]) -> Self {
        Self {
            opcode,
            parameters: parameters.to_vec(),
        }
    }
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }
    #[must_use]
    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.opcode.byte_len() + self.parameters.len()
    }
    /// Opcode bytes followed by the parameters.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OpcodeConversationError> {
        let mut out = vec![0_u8; self.byte_len()];
        self.opcode.pack_into(&mut out)?;
        out[self.opcode.byte_len()..].copy_from_slice(&self.parameters);
        Ok(out)
    }
}
impl TryFrom<&[u8]> for AccessPayload {
    type Error = OpcodeConversationError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let opcode = Opcode::unpack_from(bytes)?;
        Ok(AccessPayload::new(opcode, &bytes[opcode.byte_len()..]))
    }
}
