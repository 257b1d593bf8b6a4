//! Outgoing path: access messages, transport control messages, proxy configuration and
//! resending unacknowledged segments.
use super::{InvalidArgument, Layer, MeshStack, SendError};
use crate::address::Address;
use crate::control::{Ack, ControlPDU};
use crate::crypto::key::DevKey;
use crate::crypto::materials::ApplicationSecurityMaterials;
use crate::crypto::nonce::UpperNonceParts;
use crate::device_state::SeqRange;
use crate::lower::{self, BlockAck, PDUBytes, SegO, SeqZero};
use crate::mesh::{AppKeyIndex, NetKeyIndex, CTL, TTL};
use crate::net::NetworkNonceKind;
use crate::proxy::{
    FilterRequest, FilterType, ProxyConfigMessage, ProxyPDUType, MAX_FILTER_ADDRESSES,
};
use crate::segmenter::Segmenter;
use crate::stack::bearer::{Bearer, StatusSink};
use crate::stack::directory::NodeDirectory;
use crate::stack::messages::{
    AccessMessage, ControlBody, ControlMessage, Message, MessageHeader, MessageKeys,
    OutgoingMessage,
};
use crate::stack::transactions::{Expectation, MeshMessageState, OutgoingTransaction, Phase};
use crate::upper::{
    AppPayload, SecurityMaterials, UpperPDU, MAX_UNSEGMENTED_UPPER_PDU_LEN, MAX_UPPER_PDU_LEN,
};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::convert::TryFrom;

enum UpperKey {
    App(AppKeyIndex, ApplicationSecurityMaterials),
    Device(DevKey),
}
/// Number of lower transport PDUs `len` bytes of upper PDU need.
fn segment_count(len: usize, seg_len: usize, segmented: bool) -> usize {
    if segmented {
        (len + seg_len - 1) / seg_len
    } else {
        1
    }
}

impl<D: NodeDirectory, B: Bearer, S: StatusSink> MeshStack<D, B, S> {
    fn check_destination(dst: Address) -> Result<(), InvalidArgument> {
        match dst {
            Address::Unicast(_) | Address::Group(_) => Ok(()),
            Address::Unassigned | Address::VirtualHash(_) => {
                Err(InvalidArgument::Destination(dst))
            }
        }
    }
    fn sending_ttl(&self, ttl: Option<u8>) -> Result<TTL, InvalidArgument> {
        match ttl {
            None => Ok(self.config.default_ttl),
            Some(ttl) => TTL::for_sending(ttl).map_err(|e| InvalidArgument::TTL(e.0)),
        }
    }
    fn allocate_seqs(&self, count: usize) -> Result<SeqRange, SendError> {
        let count = u32::try_from(count).map_err(|_| SendError::TooManySegments)?;
        self.seq.inc_seq(count).ok_or(SendError::OutOfSeq)
    }
    /// Sends an access message. Every argument is checked before a sequence number is used.
    ///
    /// A message segmented to a unicast address, or one that names an expected response, stays
    /// `AwaitingAck` until it is acknowledged (and answered) or times out. Anything else is
    /// `Completed` as soon as it is handed to the bearer. Sending to a destination replaces its previous
    /// transaction.
    pub fn send(&mut self, message: OutgoingMessage) -> Result<(), SendError> {
        Self::check_destination(message.dst)?;
        let ttl = self.sending_ttl(message.ttl)?;
        let access_bytes = message
            .payload
            .to_bytes()
            .map_err(|_| InvalidArgument::Opcode)?;
        let upper_len = message.upper_len();
        if access_bytes.is_empty() || upper_len > MAX_UPPER_PDU_LEN {
            return Err(InvalidArgument::PayloadLength(upper_len).into());
        }
        let (net_key_index, key) = match message.keys {
            MessageKeys::App(index) => {
                let materials = self
                    .directory
                    .app_key(index)
                    .ok_or(InvalidArgument::AppKeyIndex(index))?;
                (materials.net_key_index, UpperKey::App(index, materials))
            }
            MessageKeys::Device(net_key_index) => {
                let node = message
                    .dst
                    .unicast()
                    .and_then(|address| self.directory.node(address))
                    .ok_or(InvalidArgument::DeviceKey(message.dst))?;
                (net_key_index, UpperKey::Device(node.dev_key))
            }
        };
        if self.directory.net_keys().get_keys(net_key_index).is_none() {
            return Err(InvalidArgument::NetKeyIndex(net_key_index).into());
        }
        let big_mic = message.mic_size.is_big();
        let segmented = big_mic || upper_len > MAX_UNSEGMENTED_UPPER_PDU_LEN;
        let seqs = self.allocate_seqs(segment_count(
            upper_len,
            lower::SegmentedAccessPDU::max_seg_len(),
            segmented,
        ))?;
        let seq_auth = seqs.start();
        let iv_index = self.directory.iv_index().tx_index();
        let src = self.config.local_address;
        let nonce = UpperNonceParts {
            aszmic: big_mic,
            seq: seq_auth,
            src,
            dst: message.dst,
            iv_index,
        };
        let (sm, app_key_index) = match key {
            UpperKey::App(index, materials) => (
                SecurityMaterials::App(nonce.app_nonce(), materials.app_key, materials.aid),
                Some(index),
            ),
            UpperKey::Device(dev_key) => {
                (SecurityMaterials::Device(nonce.device_nonce(), dev_key), None)
            }
        };
        let encrypted = AppPayload::new(access_bytes)
            .encrypt(&sm, message.mic_size)
            .map_err(|_| SendError::EncryptError(Layer::Upper))?;
        let header = MessageHeader {
            ctl: CTL(false),
            ttl,
            src,
            dst: message.dst,
            seq: seq_auth,
            iv_index,
            net_key_index,
            pdu_type: ProxyPDUType::Network,
        };
        slog::debug!(self.logger, "send_access"; "dst" => message.dst.value(), "opcode" => %message.payload.opcode(), "seq_auth" => seq_auth.value(), "segments" => seqs.len());
        let outgoing = Message::Access(AccessMessage {
            header,
            akf: encrypted.akf(),
            aid: encrypted.aid(),
            app_key_index,
            mic_size: message.mic_size,
            payload: message.payload,
            decoded: None,
            network_layer_pdu: BTreeMap::new(),
        });
        let expected = message
            .expected_response
            .map_or(Expectation::Nothing, Expectation::Response);
        self.transmit(UpperPDU::Access(encrypted), seqs, outgoing, expected, true)
    }
    /// Sends a transport control message with the transmit key of `net_key_index`. Segmented
    /// control messages wait for an ack like access messages do. Unsegmented ones don't touch
    /// the destination's transaction.
    pub fn send_control(
        &mut self,
        dst: Address,
        net_key_index: NetKeyIndex,
        pdu: &ControlPDU,
    ) -> Result<(), SendError> {
        Self::check_destination(dst)?;
        let ttl = self.config.default_ttl;
        if self.directory.net_keys().get_keys(net_key_index).is_none() {
            return Err(InvalidArgument::NetKeyIndex(net_key_index).into());
        }
        let payload = pdu
            .to_vec_payload()
            .map_err(|_| InvalidArgument::PayloadLength(pdu.len()))?;
        let upper = UpperPDU::Control(payload);
        let max_len =
            lower::SegmentedControlPDU::max_seg_len() * (usize::from(lower::SEG_MAX) + 1);
        if upper.len() > max_len {
            return Err(InvalidArgument::PayloadLength(upper.len()).into());
        }
        let segmented = upper.should_segment();
        let seqs = self.allocate_seqs(segment_count(upper.len(), upper.seg_len(), segmented))?;
        let header = MessageHeader {
            ctl: CTL(true),
            ttl,
            src: self.config.local_address,
            dst,
            seq: seqs.start(),
            iv_index: self.directory.iv_index().tx_index(),
            net_key_index,
            pdu_type: ProxyPDUType::Network,
        };
        slog::debug!(self.logger, "send_control"; "dst" => dst.value(), "opcode" => ?pdu.opcode(), "segmented" => segmented);
        let message = Message::Control(ControlMessage {
            header,
            body: ControlBody::Transport(pdu.clone()),
            network_layer_pdu: BTreeMap::new(),
        });
        self.transmit(upper, seqs, message, Expectation::Nothing, segmented)
    }
    /// Asks the proxy to switch its filter type. The filter is cleared by the proxy.
    pub fn set_filter_type(
        &mut self,
        net_key_index: NetKeyIndex,
        filter_type: FilterType,
    ) -> Result<(), SendError> {
        self.send_filter_request(net_key_index, FilterRequest::SetType(filter_type))
    }
    pub fn add_filter_addresses(
        &mut self,
        net_key_index: NetKeyIndex,
        addresses: &[Address],
    ) -> Result<(), SendError> {
        Self::check_filter_addresses(addresses)?;
        let request = FilterRequest::Add(addresses.to_vec(), self.proxy_filter.assumed_type());
        self.send_filter_request(net_key_index, request)
    }
    pub fn remove_filter_addresses(
        &mut self,
        net_key_index: NetKeyIndex,
        addresses: &[Address],
    ) -> Result<(), SendError> {
        Self::check_filter_addresses(addresses)?;
        let request = FilterRequest::Remove(addresses.to_vec(), self.proxy_filter.assumed_type());
        self.send_filter_request(net_key_index, request)
    }
    fn check_filter_addresses(addresses: &[Address]) -> Result<(), InvalidArgument> {
        if addresses.is_empty() || addresses.len() > MAX_FILTER_ADDRESSES {
            Err(InvalidArgument::FilterAddresses(addresses.len()))
        } else {
            Ok(())
        }
    }
    fn send_filter_request(
        &mut self,
        net_key_index: NetKeyIndex,
        request: FilterRequest,
    ) -> Result<(), SendError> {
        self.send_proxy_message(net_key_index, request.message())?;
        self.proxy_filter.request_sent(request);
        Ok(())
    }
    /// Sends a raw proxy configuration message. Requests wait for the proxy's Filter Status
    /// (tracked under the unassigned address). Use the `*_filter_*` methods to keep the filter
    /// tracker in sync.
    pub fn send_proxy_message(
        &mut self,
        net_key_index: NetKeyIndex,
        message: ProxyConfigMessage,
    ) -> Result<(), SendError> {
        let bytes = message.to_bytes().map_err(|_| match &message {
            ProxyConfigMessage::AddAddresses(a) | ProxyConfigMessage::RemoveAddresses(a) => {
                InvalidArgument::FilterAddresses(a.len())
            }
            _ => InvalidArgument::Opcode,
        })?;
        let transport_pdu = PDUBytes::try_from(bytes.as_slice())
            .map_err(|_| InvalidArgument::PayloadLength(bytes.len()))?;
        if self.directory.net_keys().get_keys(net_key_index).is_none() {
            return Err(InvalidArgument::NetKeyIndex(net_key_index).into());
        }
        let seq = self.allocate_seqs(1)?.start();
        let header = MessageHeader {
            ctl: CTL(true),
            ttl: TTL::new(0),
            src: self.config.local_address,
            dst: Address::Unassigned,
            seq,
            iv_index: self.directory.iv_index().tx_index(),
            net_key_index,
            pdu_type: ProxyPDUType::ProxyConfiguration,
        };
        let expected = match &message {
            ProxyConfigMessage::FilterStatus { .. } => Expectation::Nothing,
            _ => Expectation::FilterStatus,
        };
        self.transactions.replace(
            Address::Unassigned,
            MeshMessageState::new(Phase::Sending, None),
        );
        let framed =
            match self.send_network(&header, seq, transport_pdu, NetworkNonceKind::Proxy) {
                Ok(framed) => framed,
                Err(e) => {
                    // Earlier requests lost their timer along with the transaction.
                    self.transactions.reset(Address::Unassigned);
                    self.proxy_filter.requests_failed();
                    return Err(e);
                }
            };
        slog::debug!(self.logger, "send_proxy_config"; "opcode" => ?message.opcode(), "seq" => seq.value());
        let mut network_layer_pdu = BTreeMap::new();
        network_layer_pdu.insert(0, framed);
        let sent = Message::Control(ControlMessage {
            header,
            body: ControlBody::Proxy(message),
            network_layer_pdu,
        });
        self.sink.message_processed(&sent);
        self.finish_transmit(sent, None, expected, true);
        Ok(())
    }
    /// Splits `upper` into lower transport PDUs, one sequence number from `seqs` each, and sends
    /// them. With `track` the message becomes `dst`'s transaction.
    fn transmit(
        &mut self,
        upper: UpperPDU,
        seqs: SeqRange,
        mut message: Message,
        expected: Expectation,
        track: bool,
    ) -> Result<(), SendError> {
        let header = *message.header();
        let (segmenter, pdus): (Option<Segmenter>, Vec<(SegO, lower::PDU)>) =
            match upper.unsegmented() {
                Some(pdu) => (None, vec![(SegO::new(0), pdu)]),
                None => {
                    let segmenter = Segmenter::new(upper, SeqZero::from_seq(header.seq))
                        .map_err(|_| SendError::TooManySegments)?;
                    let pdus = segmenter.iter(BlockAck::default()).collect();
                    (Some(segmenter), pdus)
                }
            };
        debug_assert_eq!(pdus.len(), seqs.len() as usize, "one seq per segment");
        if track {
            self.transactions
                .replace(header.dst, MeshMessageState::new(Phase::Sending, None));
        }
        for ((seg_o, pdu), seq) in pdus.iter().zip(seqs) {
            match self.send_network(&header, seq, pdu.to_bytes(), NetworkNonceKind::Network) {
                Ok(framed) => {
                    message.network_layer_pdu_mut().insert(seg_o.value(), framed);
                }
                Err(e) => {
                    slog::warn!(self.logger, "send_failed"; "dst" => header.dst.value(), "seg_o" => seg_o.value(), "error" => %e);
                    if track {
                        self.transactions.reset(header.dst);
                    }
                    return Err(e);
                }
            }
        }
        self.sink.message_processed(&message);
        self.finish_transmit(message, segmenter, expected, track);
        Ok(())
    }
    /// Moves a sent message's transaction out of `Sending`.
    fn finish_transmit(
        &mut self,
        message: Message,
        segmenter: Option<Segmenter>,
        expected: Expectation,
        track: bool,
    ) {
        if !track {
            return;
        }
        let header = *message.header();
        // Only unicast receivers acknowledge segments.
        let awaits_ack = segmenter.is_some() && header.dst.unicast().is_some();
        let waiting = awaits_ack || expected != Expectation::Nothing;
        let phase = if waiting {
            Phase::AwaitingAck
        } else {
            Phase::Completed
        };
        let outgoing = OutgoingTransaction {
            message,
            segmenter,
            net_key_index: header.net_key_index,
            iv_index: header.iv_index,
            seq_auth: header.seq,
            expected,
            block_ack: BlockAck::default(),
        };
        let (_, key) = self
            .transactions
            .replace(header.dst, MeshMessageState::new(phase, Some(outgoing)));
        if waiting {
            self.arm_transaction_timer(key);
        }
    }
    /// Handles a Segment Acknowledgment from `src`.
    ///
    /// A zero block ack cancels the transaction. A partial one resends every missing segment
    /// (ascending `SegO`, same `SeqAuth` and segment bytes, fresh network sequence numbers) and
    /// re-arms the ack timer.
    pub(super) fn handle_ack(&mut self, src: Address, ack: &Ack) {
        let logger = self.logger.clone();
        let state = match self.transactions.get_mut(src) {
            Some(state) if state.is_waiting() => state,
            _ => {
                slog::debug!(logger, "unexpected_ack"; "src" => src.value(), "seq_zero" => ack.seq_zero.value());
                return;
            }
        };
        let outgoing = match state.outgoing_mut() {
            Some(outgoing)
                if outgoing.segmenter.is_some() && outgoing.seq_zero() == ack.seq_zero =>
            {
                outgoing
            }
            _ => {
                slog::debug!(logger, "stale_ack"; "src" => src.value(), "seq_zero" => ack.seq_zero.value());
                return;
            }
        };
        if ack.block_ack.is_empty() {
            slog::warn!(logger, "transaction_cancelled"; "dst" => src.value());
            self.transactions.reset(src);
            self.sink.transaction_failed(src, false);
            return;
        }
        outgoing.block_ack = BlockAck(outgoing.block_ack.0 | ack.block_ack.0);
        let block_ack = outgoing.block_ack;
        if outgoing.all_acked() {
            let done = outgoing.expected == Expectation::Nothing;
            slog::debug!(logger, "all_segments_acked"; "dst" => src.value(), "completed" => done);
            if done {
                state.set_phase(Phase::Completed);
            }
            return;
        }
        let header = *outgoing.message.header();
        let missing: Vec<(SegO, lower::PDU)> = match &outgoing.segmenter {
            Some(segmenter) => segmenter.iter(block_ack).collect(),
            None => Vec::new(),
        };
        state.set_phase(Phase::Resending);
        let seqs = match self.allocate_seqs(missing.len()) {
            Ok(seqs) => seqs,
            Err(e) => {
                slog::error!(logger, "resend_failed"; "dst" => src.value(), "error" => %e);
                self.transactions.reset(src);
                self.sink.transaction_failed(src, false);
                return;
            }
        };
        slog::debug!(logger, "resend_segments"; "dst" => src.value(), "count" => missing.len(), "block_ack" => block_ack.0);
        let mut resent = BTreeMap::new();
        for ((seg_o, pdu), seq) in missing.iter().zip(seqs) {
            match self.send_network(&header, seq, pdu.to_bytes(), NetworkNonceKind::Network) {
                Ok(framed) => {
                    resent.insert(seg_o.value(), framed);
                }
                Err(e) => {
                    slog::warn!(logger, "resend_failed"; "dst" => src.value(), "seg_o" => seg_o.value(), "error" => %e)
                }
            }
        }
        if let Some(state) = self.transactions.get_mut(src) {
            if let Some(outgoing) = state.outgoing_mut() {
                outgoing
                    .message
                    .network_layer_pdu_mut()
                    .extend(resent.into_iter());
            }
            state.set_phase(Phase::AwaitingAck);
        }
        if let Some(key) = self.transactions.rearm(src) {
            self.arm_transaction_timer(key);
        }
    }
    /// Acknowledges a segmented message received from `dst`. Never touches `dst`'s
    /// transaction.
    pub(super) fn send_ack(
        &mut self,
        dst: Address,
        net_key_index: NetKeyIndex,
        seq_zero: SeqZero,
        block_ack: BlockAck,
    ) -> Result<(), SendError> {
        let pdu = ControlPDU::Ack(Ack {
            obo: lower::OBO(false),
            seq_zero,
            block_ack,
        });
        slog::trace!(self.logger, "send_ack"; "dst" => dst.value(), "seq_zero" => seq_zero.value(), "block_ack" => block_ack.0);
        self.send_control(dst, net_key_index, &pdu)
    }
}

#[cfg(test)]
mod tests {
    use super::segment_count;

    #[test]
    fn test_segment_count() {
        assert_eq!(segment_count(10, 12, false), 1);
        assert_eq!(segment_count(12, 12, true), 1);
        assert_eq!(segment_count(13, 12, true), 2);
        assert_eq!(segment_count(46, 12, true), 4);
        assert_eq!(segment_count(384, 12, true), 32);
        assert_eq!(segment_count(9, 8, true), 2);
    }
}
