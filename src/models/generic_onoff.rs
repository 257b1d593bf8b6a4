//! Generic OnOff Server/Client messages (Mesh Model v1.0 section 3.2.1).
use crate::access::{Opcode, SigOpcode};
use crate::models::{MessagePackError, OpcodeRegistry, PackableMessage};

pub const GENERIC_ONOFF_GET: Opcode = Opcode::SIG(SigOpcode::DoubleOctet(0x8201));
pub const GENERIC_ONOFF_SET: Opcode = Opcode::SIG(SigOpcode::DoubleOctet(0x8202));
pub const GENERIC_ONOFF_SET_UNACKNOWLEDGED: Opcode =
    Opcode::SIG(SigOpcode::DoubleOctet(0x8203));
pub const GENERIC_ONOFF_STATUS: Opcode = Opcode::SIG(SigOpcode::DoubleOctet(0x8204));

/// Generic Default Transition Time encoding. Steps in the lower 6 bits, resolution in the top 2.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct TransitionTime(pub u8);
impl TransitionTime {
    #[must_use]
    pub fn is_unknown(self) -> bool {
        self.0 & 0x3F == 0x3F
    }
}
fn unpack_onoff(b: u8) -> Result<bool, MessagePackError> {
    match b {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(MessagePackError::BadBytes),
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct GenericOnOffGet;
impl PackableMessage for GenericOnOffGet {
    fn opcode() -> Opcode {
        GENERIC_ONOFF_GET
    }

    fn message_size(&self) -> usize {
        0
    }

    fn pack_into(&self, _buffer: &mut [u8]) -> Result<(), MessagePackError> {
        Ok(())
    }

    fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
        if buffer.is_empty() {
            Ok(GenericOnOffGet)
        } else {
            Err(MessagePackError::BadLength)
        }
    }
}
/// Parameters shared by Set and Set Unacknowledged.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct OnOffSetParameters {
    pub on_off: bool,
    /// Transaction Identifier
    pub tid: u8,
    /// Transition time and delay (5 ms steps).
    pub transition: Option<(TransitionTime, u8)>,
}
impl OnOffSetParameters {
    fn size(&self) -> usize {
        if self.transition.is_some() {
            4
        } else {
            2
        }
    }
    fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
        if buffer.len() != self.size() {
            return Err(MessagePackError::SmallBuffer);
        }
        buffer[0] = u8::from(self.on_off);
        buffer[1] = self.tid;
        if let Some((time, delay)) = self.transition {
            if time.is_unknown() {
                return Err(MessagePackError::BadState);
            }
            buffer[2] = time.0;
            buffer[3] = delay;
        }
        Ok(())
    }
    fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
        match buffer {
            [on_off, tid] => Ok(Self {
                on_off: unpack_onoff(*on_off)?,
                tid: *tid,
                transition: None,
            }),
            [on_off, tid, time, delay] => {
                let time = TransitionTime(*time);
                if time.is_unknown() {
                    return Err(MessagePackError::BadBytes);
                }
                Ok(Self {
                    on_off: unpack_onoff(*on_off)?,
                    tid: *tid,
                    transition: Some((time, *delay)),
                })
            }
            _ => Err(MessagePackError::BadLength),
        }
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct GenericOnOffSet(pub OnOffSetParameters);
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct GenericOnOffSetUnacknowledged(pub OnOffSetParameters);
macro_rules! set_message {
    ($name:ident, $opcode:expr) => {
        impl PackableMessage for $name {
            fn opcode() -> Opcode {
                $opcode
            }

            fn message_size(&self) -> usize {
                self.0.size()
            }

            fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
                self.0.pack_into(buffer)
            }

            fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
                Ok($name(OnOffSetParameters::unpack_from(buffer)?))
            }
        }
    };
}
set_message!(GenericOnOffSet, GENERIC_ONOFF_SET);
set_message!(GenericOnOffSetUnacknowledged, GENERIC_ONOFF_SET_UNACKNOWLEDGED);

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct GenericOnOffStatus {
    pub present: bool,
    /// Target state and remaining time while a transition is running.
    pub target: Option<(bool, TransitionTime)>,
}
impl PackableMessage for GenericOnOffStatus {
    fn opcode() -> Opcode {
        GENERIC_ONOFF_STATUS
    }

    fn message_size(&self) -> usize {
        if self.target.is_some() {
            3
        } else {
            1
        }
    }

    fn pack_into(&self, buffer: &mut [u8]) -> Result<(), MessagePackError> {
        if buffer.len() != self.message_size() {
            return Err(MessagePackError::SmallBuffer);
        }
        buffer[0] = u8::from(self.present);
        if let Some((target, remaining)) = self.target {
            buffer[1] = u8::from(target);
            buffer[2] = remaining.0;
        }
        Ok(())
    }

    fn unpack_from(buffer: &[u8]) -> Result<Self, MessagePackError> {
        match buffer {
            [present] => Ok(GenericOnOffStatus {
                present: unpack_onoff(*present)?,
                target: None,
            }),
            [present, target, remaining] => Ok(GenericOnOffStatus {
                present: unpack_onoff(*present)?,
                target: Some((unpack_onoff(*target)?, TransitionTime(*remaining))),
            }),
            _ => Err(MessagePackError::BadLength),
        }
    }
}
pub(crate) fn register(registry: &mut OpcodeRegistry) {
    registry.register::<GenericOnOffGet>();
    registry.register::<GenericOnOffSet>();
    registry.register::<GenericOnOffSetUnacknowledged>();
    registry.register::<GenericOnOffStatus>();
}
