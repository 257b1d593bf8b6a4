//! Seams between the stack and the outside world: the bearer that carries framed PDUs to the
//! proxy and the sink that receives everything the stack wants to report.
use crate::address::{Address, UnicastAddress};
use crate::control::Ack;
use crate::stack::messages::{ControlMessage, Message};
use crate::stack::Layer;
use core::fmt::{Display, Formatter};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum BearerError {
    ReadyError,
    SendError,
    FlushError,
    Closed,
}
impl Display for BearerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let s = match self {
            BearerError::ReadyError => "bearer not ready",
            BearerError::SendError => "bearer send failed",
            BearerError::FlushError => "bearer flush failed",
            BearerError::Closed => "bearer closed",
        };
        f.write_str(s)
    }
}
/// Carries proxy framed PDUs (proxy PDU header octet followed by the network PDU) to the proxy
/// node. `dst` is the mesh destination of the message the PDU belongs to.
pub trait Bearer {
    fn send(&mut self, dst: Address, pdu: &[u8]) -> Result<(), BearerError>;
}
impl<B: Bearer + ?Sized> Bearer for &mut B {
    fn send(&mut self, dst: Address, pdu: &[u8]) -> Result<(), BearerError> {
        (**self).send(dst, pdu)
    }
}
/// Application callbacks. Every method defaults to doing nothing.
pub trait StatusSink {
    /// An outbound message had all of its network PDUs handed to the bearer.
    fn message_processed(&mut self, _message: &Message) {}
    /// An inbound access message (or proxy configuration status) was decoded.
    fn message_received(&mut self, _src: UnicastAddress, _message: &Message) {}
    /// The transaction towards `dst` was abandoned. `was_timeout` is false when the receiver
    /// cancelled it with an empty block ack.
    fn transaction_failed(&mut self, _dst: Address, _was_timeout: bool) {}
    fn decryption_failed(&mut self, _layer: Layer, _reason: &str) {}
    /// Access payload with an opcode nothing is registered for, or a control PDU that couldn't
    /// be parsed.
    fn unknown_pdu_received(&mut self, _src: UnicastAddress, _pdu: &[u8]) {}
    fn block_acknowledgement_received(&mut self, _src: UnicastAddress, _ack: &Ack) {}
    /// Transport control message other than a segment ack.
    fn control_received(&mut self, _src: UnicastAddress, _message: &ControlMessage) {}
}
/// Sink that ignores everything.
#[derive(Copy, Clone, Default, Debug)]
pub struct NullSink;
impl StatusSink for NullSink {}
