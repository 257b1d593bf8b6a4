//! Model messages carried in the access layer and the opcode → decoder table the stack uses to
//! turn received access payloads into typed messages.
use crate::access::{AccessPayload, Opcode};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt::{Debug, Display, Formatter};

pub mod generic_onoff;

/// Error when trying to pack a message into a byte buffer.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum MessagePackError {
    /// Byte Buffer too small to fit the whole message.
    SmallBuffer,
    /// Incoming Byte Buffer length doesn't make sense.
    BadLength,
    /// Incoming Byte Buffer creates an invalid message.
    BadBytes,
    /// Message can't be packed because the object is in a bad state.
    BadState,
}
impl Display for MessagePackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let s = match self {
            MessagePackError::SmallBuffer => "buffer too small",
            MessagePackError::BadLength => "bad message length",
            MessagePackError::BadBytes => "bad message bytes",
            MessagePackError::BadState => "message in bad state",
        };
        f.write_str(s)
    }
}

/// An Access Message that can be packed into a (little endian) byte buffer.
/// If a message comes in that matches `Opcode`, the stack will try to decode it with
/// `PackableMessage::unpack_from`.
pub trait PackableMessage: Sized {
    fn opcode() -> Opcode;
    /// Bytes need to fit the entire message in bytes (excluding opcode).
    fn message_size(&self) -> usize;
    /// Pack the message into the byte buffer (without the opcode). If the length of the buffer is
    /// too small or the object is in a bad state, return `MessagePackError`.
    fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError>;
    fn pack_with_opcode(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
        let opcode = Self::opcode();
        let opcode_len = opcode.byte_len();
        if buffer.len() < opcode_len + self.message_size() {
            return Err(MessagePackError::SmallBuffer);
        }
        self.pack_into(&mut buffer[opcode_len..opcode_len + self.message_size()])?;
        opcode
            .pack_into(&mut buffer[..opcode_len])
            .map_err(|_| MessagePackError::BadState)
    }
    /// Unpack the message from the byte buffer (without the opcode). Make sure to check for a valid
    /// message or return a `MessagePackError` otherwise.
    fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError>;
    /// Opcode and packed parameters, ready to be sent.
    fn to_access_payload(&self) -> Result<AccessPayload, MessagePackError> {
        let mut parameters = Vec::new();
        parameters.resize(self.message_size(), 0_u8);
        self.pack_into(&mut parameters[..])?;
        Ok(AccessPayload::new(Self::opcode(), &parameters))
    }
}
/// Decoded model message as handed to the application.
pub trait ModelMessage: Debug + Send + Sync + 'static {
    fn message_opcode(&self) -> Opcode;
    fn as_any(&self) -> &dyn Any;
}
impl<M: PackableMessage + Debug + Send + Sync + 'static> ModelMessage for M {
    fn message_opcode(&self) -> Opcode {
        M::opcode()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl dyn ModelMessage {
    /// Downcasts to the concrete message type.
    #[must_use]
    pub fn downcast_ref<M: ModelMessage>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }
}
pub type Decoder = fn(&[u8]) -> Result<Box<dyn ModelMessage>, MessagePackError>;

fn decode<M: PackableMessage + ModelMessage>(
    parameters: &[u8],
) -> Result<Box<dyn ModelMessage>, MessagePackError> {
    Ok(Box::new(M::unpack_from(parameters)?))
}

/// Opcode → decoder lookup table.
#[derive(Clone, Default)]
pub struct OpcodeRegistry {
    decoders: BTreeMap<Opcode, Decoder>,
}
impl OpcodeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Registry with every message defined in this crate.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        generic_onoff::register(&mut registry);
        registry
    }
    pub fn register<M: PackableMessage + ModelMessage>(&mut self) {
        self.decoders.insert(M::opcode(), decode::<M>);
    }
    #[must_use]
    pub fn contains(&self, opcode: Opcode) -> bool {
        self.decoders.contains_key(&opcode)
    }
    /// `None` if the opcode isn't registered.
    #[must_use]
    pub fn decode(
        &self,
        payload: &AccessPayload,
    ) -> Option<Result<Box<dyn ModelMessage>, MessagePackError>> {
        let decoder = self.decoders.get(&payload.opcode())?;
        Some(decoder(payload.parameters()))
    }
}
impl Debug for OpcodeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}
