//! Stack tunables.
use crate::address::UnicastAddress;
use crate::mesh::TTL;
use core::time::Duration;

pub const DEFAULT_TTL: u8 = 5;
/// Mesh Profile minimum for the lower transport incomplete timer.
pub const DEFAULT_INCOMPLETE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 30_000;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-1", serde(default))]
pub struct StackConfig {
    /// Source address of every message the stack sends (the provisioner/client element).
    pub local_address: UnicastAddress,
    pub default_ttl: TTL,
    /// How long a partial inbound reassembly is kept.
    pub incomplete_timeout_ms: u64,
    /// How long an outbound transaction waits for a segment ack or the expected response.
    pub ack_timeout_ms: u64,
}
impl StackConfig {
    #[must_use]
    pub fn new(local_address: UnicastAddress) -> Self {
        Self {
            local_address,
            ..Self::default()
        }
    }
    #[must_use]
    pub fn incomplete_timeout(&self) -> Duration {
        Duration::from_millis(self.incomplete_timeout_ms)
    }
    #[must_use]
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}
impl Default for StackConfig {
    fn default() -> Self {
        Self {
            local_address: UnicastAddress::new(0x0001),
            default_ttl: TTL::new(DEFAULT_TTL),
            incomplete_timeout_ms: DEFAULT_INCOMPLETE_TIMEOUT_MS,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
        }
    }
}
