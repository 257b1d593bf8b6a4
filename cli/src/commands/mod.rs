pub mod crypto;
pub mod pdu;
