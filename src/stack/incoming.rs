//! Incoming path: proxy PDU → network → lower transport → upper transport → access.
use super::{Layer, MeshStack, RecvError};
use crate::access::{AccessPayload, Opcode};
use crate::address::{Address, UnicastAddress};
use crate::control::ControlPDU;
use crate::crypto::aes::MicSize;
use crate::crypto::nonce::UpperNonceParts;
use crate::lower::{self, PDUBytes};
use crate::mesh::AppKeyIndex;
use crate::net::{EncryptedPDU, NetworkNonceKind};
use crate::proxy::{ProxyConfigMessage, ProxyPDUHeader, ProxyPDUType, SAR};
use crate::resolver;
use crate::stack::bearer::{Bearer, StatusSink};
use crate::stack::directory::NodeDirectory;
use crate::stack::messages::{AccessMessage, ControlBody, ControlMessage, Message, MessageHeader};
use crate::stack::segments::{IncomingSegments, SegmentInfo, SegmentOutcome};
use crate::stack::transactions::{Expectation, Phase};
use crate::upper::{AppPayload, EncryptedAppPayload, SecurityMaterials, UpperPDU};
use alloc::collections::BTreeMap;
use alloc::string::ToString;
use core::convert::TryFrom;

impl<D: NodeDirectory, B: Bearer, S: StatusSink> MeshStack<D, B, S> {
    /// Handles one Proxy PDU from the bearer.
    ///
    /// Beacons and provisioning PDUs are ignored. Failures are reported to the sink and returned.
    pub fn receive(&mut self, data: &[u8]) -> Result<(), RecvError> {
        let (&first, pdu) = data
            .split_first()
            .ok_or(RecvError::MalformedPdu(Layer::Proxy))?;
        let proxy_header =
            ProxyPDUHeader::unpack(first).ok_or(RecvError::MalformedPdu(Layer::Proxy))?;
        if proxy_header.sar != SAR::Complete {
            slog::debug!(self.logger, "proxy_sar_unsupported"; "sar" => ?proxy_header.sar);
            return Err(RecvError::MalformedPdu(Layer::Proxy));
        }
        let nonce_kind = match proxy_header.pdu_type {
            ProxyPDUType::Network => NetworkNonceKind::Network,
            ProxyPDUType::ProxyConfiguration => NetworkNonceKind::Proxy,
            ProxyPDUType::Beacon | ProxyPDUType::Provisioning => {
                slog::trace!(self.logger, "ignored_proxy_pdu"; "type" => ?proxy_header.pdu_type);
                return Ok(());
            }
        };
        let encrypted = EncryptedPDU::new(pdu).ok_or(RecvError::MalformedPdu(Layer::Network))?;
        let net_keys = self.directory.net_keys();
        let directory = &self.directory;
        let resolved = match resolver::resolve(
            &encrypted,
            &net_keys,
            directory.iv_index(),
            nonce_kind,
            |src| directory.node(src).is_some(),
            &self.logger,
        ) {
            Ok(resolved) => resolved,
            Err(e) => {
                slog::debug!(self.logger, "network_decrypt_failed"; "error" => %e);
                self.sink.decryption_failed(Layer::Network, &e.to_string());
                return Err(RecvError::DecryptionFailed(Layer::Network));
            }
        };
        let net_header = resolved.pdu.header;
        let header = MessageHeader {
            ctl: net_header.ctl,
            ttl: net_header.ttl,
            src: net_header.src,
            dst: net_header.dst,
            seq: net_header.seq,
            iv_index: resolved.iv_index,
            net_key_index: resolved.net_key_index,
            pdu_type: proxy_header.pdu_type,
        };
        slog::trace!(self.logger, "recv_network"; "src" => header.src.value(), "dst" => header.dst.value(), "seq" => header.seq.value(), "ctl" => header.ctl.0);
        match proxy_header.pdu_type {
            ProxyPDUType::ProxyConfiguration => {
                self.receive_proxy_config(header, resolved.pdu.payload.as_ref())
            }
            _ => self.receive_lower(header, &resolved.pdu.payload),
        }
    }
    fn receive_proxy_config(
        &mut self,
        header: MessageHeader,
        bytes: &[u8],
    ) -> Result<(), RecvError> {
        let message = match ProxyConfigMessage::from_bytes(bytes) {
            Ok(message) => message,
            Err(e) => {
                slog::debug!(self.logger, "bad_proxy_config"; "error" => %e);
                self.sink.unknown_pdu_received(header.src, bytes);
                return Err(RecvError::MalformedPdu(Layer::Proxy));
            }
        };
        match message {
            ProxyConfigMessage::FilterStatus {
                filter_type,
                list_size,
            } => {
                self.proxy_filter.status_received(filter_type, list_size);
                let waiting = self
                    .transactions
                    .get(Address::Unassigned)
                    .and_then(|state| if state.is_waiting() { state.outgoing() } else { None })
                    .map_or(false, |outgoing| outgoing.expected == Expectation::FilterStatus);
                if waiting {
                    self.complete_transaction(Address::Unassigned);
                }
                let received = Message::Control(ControlMessage {
                    header,
                    body: ControlBody::Proxy(message),
                    network_layer_pdu: BTreeMap::new(),
                });
                self.sink.message_received(header.src, &received);
                Ok(())
            }
            other => {
                slog::debug!(self.logger, "unexpected_proxy_config"; "opcode" => ?other.opcode());
                self.sink.unknown_pdu_received(header.src, bytes);
                Ok(())
            }
        }
    }
    fn receive_lower(
        &mut self,
        header: MessageHeader,
        payload: &PDUBytes,
    ) -> Result<(), RecvError> {
        let pdu = match lower::PDU::from_bytes(payload.as_ref(), header.ctl) {
            Ok(pdu) => pdu,
            Err(e) => {
                slog::debug!(self.logger, "bad_lower_pdu"; "src" => header.src.value(), "error" => %e);
                self.sink.unknown_pdu_received(header.src, payload.as_ref());
                return Err(RecvError::MalformedPdu(Layer::Lower));
            }
        };
        match &pdu {
            lower::PDU::UnsegmentedControl(control) => match ControlPDU::try_from(control) {
                Ok(control) => self.receive_control(header, control),
                Err(e) => {
                    slog::debug!(self.logger, "bad_control_pdu"; "src" => header.src.value(), "error" => %e);
                    self.sink.unknown_pdu_received(header.src, payload.as_ref());
                    Err(RecvError::MalformedPdu(Layer::Lower))
                }
            },
            lower::PDU::UnsegmentedAccess(access) => {
                let upper = EncryptedAppPayload::from_bytes(
                    access.upper_pdu(),
                    MicSize::Small,
                    access.akf(),
                    access.aid(),
                )
                .ok_or(RecvError::MalformedPdu(Layer::Upper))?;
                self.receive_access(header, upper)
            }
            lower::PDU::SegmentedAccess(_) | lower::PDU::SegmentedControl(_) => {
                self.receive_segment(header, &pdu)
            }
        }
    }
    fn receive_segment(
        &mut self,
        header: MessageHeader,
        pdu: &lower::PDU,
    ) -> Result<(), RecvError> {
        let info = SegmentInfo {
            src: header.src,
            dst: header.dst,
            seq: header.seq,
            ttl: header.ttl,
            iv_index: header.iv_index,
            net_key_index: header.net_key_index,
        };
        match self.reassembly.insert(info, pdu) {
            Ok(SegmentOutcome::Started(key)) => {
                slog::trace!(self.logger, "reassembly_started"; "src" => header.src.value(), "seq_zero" => key.seq_zero.value());
                self.arm_reassembly_timer(key);
                Ok(())
            }
            Ok(SegmentOutcome::Pending(key)) => {
                self.arm_reassembly_timer(key);
                Ok(())
            }
            Ok(SegmentOutcome::Duplicate) => Ok(()),
            Ok(SegmentOutcome::AlreadyComplete(block_ack)) => {
                if self.is_local(header.dst) {
                    if let Some(segment) = pdu.segment_header() {
                        let seq_zero = segment.seq_zero();
                        self.ack_segments(header, seq_zero, block_ack);
                    }
                }
                Ok(())
            }
            Ok(SegmentOutcome::Complete(segments)) => self.segments_complete(header, segments),
            Err(e) => {
                slog::warn!(self.logger, "reassembly_failed"; "src" => header.src.value(), "error" => %e);
                Err(RecvError::Reassemble(e))
            }
        }
    }
    fn is_local(&self, dst: Address) -> bool {
        dst == Address::Unicast(self.config.local_address)
    }
    fn ack_segments(
        &mut self,
        header: MessageHeader,
        seq_zero: lower::SeqZero,
        block_ack: lower::BlockAck,
    ) {
        let src = Address::Unicast(header.src);
        if let Err(e) = self.send_ack(src, header.net_key_index, seq_zero, block_ack) {
            slog::warn!(self.logger, "ack_failed"; "dst" => src.value(), "error" => %e);
        }
    }
    fn segments_complete(
        &mut self,
        last: MessageHeader,
        segments: IncomingSegments,
    ) -> Result<(), RecvError> {
        let context_header = *segments.context.header();
        let header = MessageHeader {
            ttl: segments.ttl,
            seq: segments.seq_auth,
            iv_index: segments.iv_index,
            net_key_index: segments.net_key_index,
            ..last
        };
        slog::debug!(self.logger, "reassembled"; "src" => header.src.value(), "seq_auth" => header.seq.value(), "segments" => context_header.seg_count());
        if self.is_local(header.dst) {
            self.ack_segments(
                header,
                context_header.seq_zero(),
                context_header.block_ack(),
            );
        }
        match segments.context.finish() {
            Ok(UpperPDU::Access(upper)) => self.receive_access(header, upper),
            Ok(UpperPDU::Control(payload)) => match ControlPDU::try_from(&payload) {
                Ok(control) => self.receive_control(header, control),
                Err(e) => {
                    slog::debug!(self.logger, "bad_control_pdu"; "src" => header.src.value(), "error" => %e);
                    self.sink.unknown_pdu_received(header.src, &payload.payload);
                    Err(RecvError::MalformedPdu(Layer::Lower))
                }
            },
            Err(e) => Err(RecvError::Reassemble(e)),
        }
    }
    fn receive_control(
        &mut self,
        header: MessageHeader,
        pdu: ControlPDU,
    ) -> Result<(), RecvError> {
        if let ControlPDU::Ack(ack) = &pdu {
            self.sink.block_acknowledgement_received(header.src, ack);
            self.handle_ack(Address::Unicast(header.src), ack);
            return Ok(());
        }
        let message = ControlMessage {
            header,
            body: ControlBody::Transport(pdu),
            network_layer_pdu: BTreeMap::new(),
        };
        self.sink.control_received(header.src, &message);
        Ok(())
    }
    /// Tries every key that could have encrypted `upper`. Application keys bound to the network
    /// key with a matching `AID`, or the device key of either end for device key messages.
    fn decrypt_upper(
        &self,
        header: &MessageHeader,
        upper: &EncryptedAppPayload,
    ) -> Option<(AppPayload, Option<AppKeyIndex>)> {
        let nonce = UpperNonceParts {
            aszmic: upper.szmic(),
            seq: header.seq,
            src: header.src,
            dst: header.dst,
            iv_index: header.iv_index,
        };
        if upper.akf().0 {
            let app_nonce = nonce.app_nonce();
            self.directory
                .app_keys(header.net_key_index)
                .into_iter()
                .filter(|(_, materials)| materials.aid == upper.aid())
                .find_map(|(index, materials)| {
                    let sm = SecurityMaterials::App(app_nonce, materials.app_key, materials.aid);
                    upper.decrypt(&sm).ok().map(|payload| (payload, Some(index)))
                })
        } else {
            let device_nonce = nonce.device_nonce();
            let candidates = [Some(header.src), header.dst.unicast()];
            candidates
                .iter()
                .filter_map(|address| self.directory.node((*address)?))
                .find_map(|node| {
                    let sm = SecurityMaterials::Device(device_nonce, node.dev_key);
                    upper.decrypt(&sm).ok().map(|payload| (payload, None))
                })
        }
    }
    fn receive_access(
        &mut self,
        header: MessageHeader,
        upper: EncryptedAppPayload,
    ) -> Result<(), RecvError> {
        let (payload, app_key_index) = match self.decrypt_upper(&header, &upper) {
            Some(decrypted) => decrypted,
            None => {
                slog::debug!(self.logger, "upper_decrypt_failed"; "src" => header.src.value(), "akf" => upper.akf().0);
                self.sink
                    .decryption_failed(Layer::Upper, "no key authenticated the TransMIC");
                return Err(RecvError::DecryptionFailed(Layer::Upper));
            }
        };
        let access = match AccessPayload::try_from(payload.payload()) {
            Ok(access) => access,
            Err(_) => {
                self.sink.unknown_pdu_received(header.src, payload.payload());
                return Err(RecvError::MalformedPdu(Layer::Access));
            }
        };
        let opcode = access.opcode();
        self.complete_response(header.src, opcode);
        let decoded = match self.registry.decode(&access) {
            Some(Ok(decoded)) => decoded,
            Some(Err(e)) => {
                slog::debug!(self.logger, "bad_access_parameters"; "opcode" => %opcode, "error" => %e);
                self.sink.unknown_pdu_received(header.src, payload.payload());
                return Err(RecvError::MalformedPdu(Layer::Access));
            }
            None => {
                slog::debug!(self.logger, "unknown_opcode"; "src" => header.src.value(), "opcode" => %opcode);
                self.sink.unknown_pdu_received(header.src, payload.payload());
                return Err(RecvError::UnknownOpcode(opcode));
            }
        };
        let message = AccessMessage {
            header,
            akf: upper.akf(),
            aid: upper.aid(),
            app_key_index,
            mic_size: if upper.szmic() {
                MicSize::Big
            } else {
                MicSize::Small
            },
            payload: access,
            decoded: Some(decoded),
            network_layer_pdu: BTreeMap::new(),
        };
        if self.proxy_filter.trusted(Address::Unicast(header.src)) {
            self.directory.update_node_cache(header.src, &message);
        } else {
            slog::debug!(self.logger, "untrusted_source"; "src" => header.src.value(), "opcode" => %opcode);
        }
        slog::debug!(self.logger, "recv_access"; "src" => header.src.value(), "opcode" => %opcode);
        self.sink.message_received(header.src, &Message::Access(message));
        Ok(())
    }
    /// Completes `src`'s transaction if it was waiting on `opcode`.
    fn complete_response(&mut self, src: UnicastAddress, opcode: Opcode) {
        let dst = Address::Unicast(src);
        let expected = self
            .transactions
            .get(dst)
            .and_then(|state| if state.is_waiting() { state.outgoing() } else { None })
            .map_or(false, |outgoing| outgoing.expected == Expectation::Response(opcode));
        if expected {
            self.complete_transaction(dst);
        }
    }
    fn complete_transaction(&mut self, dst: Address) {
        if let Some(state) = self.transactions.get_mut(dst) {
            state.set_phase(Phase::Completed);
        }
        slog::debug!(self.logger, "transaction_completed"; "dst" => dst.value());
        self.transactions.reset(dst);
    }
}
