//! One outbound transaction per destination.
//!
//! States live in an arena of slots indexed by destination. Every time a destination's state is
//! replaced (or its timer re-armed) the slot's generation is bumped, so timers scheduled for an
//! older state find a stale `TransactionKey` and do nothing.
use crate::access::Opcode;
use crate::address::Address;
use crate::lower::{BlockAck, SeqZero};
use crate::mesh::{IVIndex, NetKeyIndex, SequenceNumber};
use crate::segmenter::Segmenter;
use crate::stack::messages::Message;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum Phase {
    Idle,
    Sending,
    AwaitingAck,
    Resending,
    Completed,
    TimedOut,
}
/// What completes a transaction once every segment is acknowledged.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum Expectation {
    Nothing,
    Response(Opcode),
    FilterStatus,
}
/// Everything needed to resend segments of a sent message.
#[derive(Debug)]
pub struct OutgoingTransaction {
    pub message: Message,
    /// `None` for unsegmented messages.
    pub segmenter: Option<Segmenter>,
    pub net_key_index: NetKeyIndex,
    pub iv_index: IVIndex,
    pub seq_auth: SequenceNumber,
    pub expected: Expectation,
    /// Segments the receiver has confirmed so far.
    pub block_ack: BlockAck,
}
impl OutgoingTransaction {
    #[must_use]
    pub fn seq_zero(&self) -> SeqZero {
        SeqZero::from_seq(self.seq_auth)
    }
    #[must_use]
    pub fn all_acked(&self) -> bool {
        match &self.segmenter {
            Some(segmenter) => self.block_ack.all_acked(segmenter.seg_n()),
            None => true,
        }
    }
}
#[derive(Debug)]
pub struct MeshMessageState {
    phase: Phase,
    outgoing: Option<OutgoingTransaction>,
}
impl MeshMessageState {
    #[must_use]
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            outgoing: None,
        }
    }
    #[must_use]
    pub fn new(phase: Phase, outgoing: Option<OutgoingTransaction>) -> Self {
        Self { phase, outgoing }
    }
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }
    /// Waiting on an ack or on the expected response.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        match self.phase {
            Phase::AwaitingAck | Phase::Resending => true,
            _ => false,
        }
    }
    #[must_use]
    pub fn outgoing(&self) -> Option<&OutgoingTransaction> {
        self.outgoing.as_ref()
    }
    pub fn outgoing_mut(&mut self) -> Option<&mut OutgoingTransaction> {
        self.outgoing.as_mut()
    }
}
impl Default for MeshMessageState {
    fn default() -> Self {
        Self::idle()
    }
}
/// Identifies one state of one destination. Goes stale once the state is replaced.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct TransactionKey {
    slot: usize,
    generation: u32,
}
#[derive(Debug)]
struct Slot {
    generation: u32,
    entry: Option<(Address, MeshMessageState)>,
}
#[derive(Debug, Default)]
pub struct TransactionTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
    index: BTreeMap<Address, usize>,
}
impl TransactionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
    #[must_use]
    pub fn get(&self, dst: Address) -> Option<&MeshMessageState> {
        let slot = *self.index.get(&dst)?;
        self.slots[slot].entry.as_ref().map(|(_, state)| state)
    }
    pub fn get_mut(&mut self, dst: Address) -> Option<&mut MeshMessageState> {
        let slot = *self.index.get(&dst)?;
        self.slots[slot].entry.as_mut().map(|(_, state)| state)
    }
    #[must_use]
    pub fn phase(&self, dst: Address) -> Option<Phase> {
        self.get(dst).map(MeshMessageState::phase)
    }
    /// Key of `dst`'s current state.
    #[must_use]
    pub fn key(&self, dst: Address) -> Option<TransactionKey> {
        let slot = *self.index.get(&dst)?;
        Some(TransactionKey {
            slot,
            generation: self.slots[slot].generation,
        })
    }
    /// Replaces `dst`'s state, reusing its slot. Outstanding keys for `dst` go stale. Returns the
    /// replaced state and the key of the new one.
    pub fn replace(
        &mut self,
        dst: Address,
        state: MeshMessageState,
    ) -> (Option<MeshMessageState>, TransactionKey) {
        let slot = match self.index.get(&dst) {
            Some(&slot) => slot,
            None => {
                let slot = match self.free.pop() {
                    Some(slot) => slot,
                    None => {
                        self.slots.push(Slot {
                            generation: 0,
                            entry: None,
                        });
                        self.slots.len() - 1
                    }
                };
                self.index.insert(dst, slot);
                slot
            }
        };
        let entry = &mut self.slots[slot];
        entry.generation = entry.generation.wrapping_add(1);
        let old = entry.entry.replace((dst, state)).map(|(_, state)| state);
        (
            old,
            TransactionKey {
                slot,
                generation: entry.generation,
            },
        )
    }
    /// Replaces `dst`'s state with `Idle`.
    pub fn reset(&mut self, dst: Address) -> Option<MeshMessageState> {
        self.replace(dst, MeshMessageState::idle()).0
    }
    /// New key for `dst`'s unchanged state. Used when a timer is re-armed.
    pub fn rearm(&mut self, dst: Address) -> Option<TransactionKey> {
        let slot = *self.index.get(&dst)?;
        let entry = &mut self.slots[slot];
        entry.generation = entry.generation.wrapping_add(1);
        Some(TransactionKey {
            slot,
            generation: entry.generation,
        })
    }
    /// Removes `dst` and frees its slot.
    pub fn remove(&mut self, dst: Address) -> Option<MeshMessageState> {
        let slot = self.index.remove(&dst)?;
        let entry = &mut self.slots[slot];
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(slot);
        entry.entry.take().map(|(_, state)| state)
    }
    /// The destination and state `key` refers to, if it isn't stale.
    pub fn lookup(&mut self, key: TransactionKey) -> Option<(Address, &mut MeshMessageState)> {
        let entry = self.slots.get_mut(key.slot)?;
        if entry.generation != key.generation {
            return None;
        }
        entry.entry.as_mut().map(|(dst, state)| (*dst, state))
    }
}
