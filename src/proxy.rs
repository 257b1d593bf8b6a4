//! GATT Proxy PDUs, proxy configuration messages and the client side view of a proxy's filter.
//!
//! Proxy configuration messages travel as network PDUs with `CTL=1`, `TTL=0`,
//! `DST=unassigned` and the proxy nonce. The transport PDU is `opcode || parameters`.
use crate::address::Address;
use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;
use core::convert::TryFrom;
use core::fmt::{Display, Formatter};

/// Segmentation And Reassembly field of the Proxy PDU header.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum SAR {
    Complete = 0b00,
    First = 0b01,
    Continuation = 0b10,
    Last = 0b11,
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum ProxyPDUType {
    Network = 0x00,
    Beacon = 0x01,
    ProxyConfiguration = 0x02,
    Provisioning = 0x03,
}
impl ProxyPDUType {
    #[must_use]
    pub fn from_u8(v: u8) -> Option<ProxyPDUType> {
        match v {
            0x00 => Some(ProxyPDUType::Network),
            0x01 => Some(ProxyPDUType::Beacon),
            0x02 => Some(ProxyPDUType::ProxyConfiguration),
            0x03 => Some(ProxyPDUType::Provisioning),
            _ => None,
        }
    }
}
/// `SAR(2 bits) | Type(6 bits)`
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct ProxyPDUHeader {
    pub sar: SAR,
    pub pdu_type: ProxyPDUType,
}
impl ProxyPDUHeader {
    #[must_use]
    pub const fn complete(pdu_type: ProxyPDUType) -> Self {
        Self {
            sar: SAR::Complete,
            pdu_type,
        }
    }
    #[must_use]
    pub fn unpack(b: u8) -> Option<Self> {
        let sar = match b >> 6 {
            0b00 => SAR::Complete,
            0b01 => SAR::First,
            0b10 => SAR::Continuation,
            _ => SAR::Last,
        };
        Some(Self {
            sar,
            pdu_type: ProxyPDUType::from_u8(b & 0x3F)?,
        })
    }
    #[must_use]
    pub fn pack(self) -> u8 {
        ((self.sar as u8) << 6) | (self.pdu_type as u8)
    }
}
/// Frames `data` as a single complete Proxy PDU.
#[must_use]
pub fn frame(pdu_type: ProxyPDUType, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(ProxyPDUHeader::complete(pdu_type).pack());
    out.extend_from_slice(data);
    out
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum ProxyConfigError {
    BadOpcode,
    BadLength,
    BadFilterType,
    TooManyAddresses,
}
impl Display for ProxyConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let s = match self {
            ProxyConfigError::BadOpcode => "unknown proxy configuration opcode",
            ProxyConfigError::BadLength => "bad proxy configuration length",
            ProxyConfigError::BadFilterType => "unknown filter type",
            ProxyConfigError::TooManyAddresses => "too many addresses for one message",
        };
        f.write_str(s)
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterType {
    /// Only addresses in the list are forwarded.
    Inclusion = 0x00,
    /// Every address except the ones in the list is forwarded.
    Exclusion = 0x01,
}
impl TryFrom<u8> for FilterType {
    type Error = ProxyConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(FilterType::Inclusion),
            0x01 => Ok(FilterType::Exclusion),
            _ => Err(ProxyConfigError::BadFilterType),
        }
    }
}
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum ProxyConfigOpcode {
    SetFilterType = 0x00,
    AddAddresses = 0x01,
    RemoveAddresses = 0x02,
    FilterStatus = 0x03,
}
/// Addresses that fit one unsegmented proxy configuration PDU (`1 + 2*5` bytes).
pub const MAX_FILTER_ADDRESSES: usize = 5;

#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub enum ProxyConfigMessage {
    SetFilterType(FilterType),
    AddAddresses(Vec<Address>),
    RemoveAddresses(Vec<Address>),
    FilterStatus {
        filter_type: FilterType,
        list_size: u16,
    },
}
impl ProxyConfigMessage {
    #[must_use]
    pub fn opcode(&self) -> ProxyConfigOpcode {
        match self {
            ProxyConfigMessage::SetFilterType(_) => ProxyConfigOpcode::SetFilterType,
            ProxyConfigMessage::AddAddresses(_) => ProxyConfigOpcode::AddAddresses,
            ProxyConfigMessage::RemoveAddresses(_) => ProxyConfigOpcode::RemoveAddresses,
            ProxyConfigMessage::FilterStatus { .. } => ProxyConfigOpcode::FilterStatus,
        }
    }
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProxyConfigError> {
        let mut out = Vec::with_capacity(1 + 2 * MAX_FILTER_ADDRESSES);
        out.push(self.opcode() as u8);
        match self {
            ProxyConfigMessage::SetFilterType(filter_type) => out.push(*filter_type as u8),
            ProxyConfigMessage::AddAddresses(addresses)
            | ProxyConfigMessage::RemoveAddresses(addresses) => {
                if addresses.len() > MAX_FILTER_ADDRESSES {
                    return Err(ProxyConfigError::TooManyAddresses);
                }
                for address in addresses {
                    out.extend_from_slice(&address.value().to_be_bytes());
                }
            }
            ProxyConfigMessage::FilterStatus {
                filter_type,
                list_size,
            } => {
                out.push(*filter_type as u8);
                out.extend_from_slice(&list_size.to_be_bytes());
            }
        }
        Ok(out)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProxyConfigError> {
        let (&opcode, params) = bytes.split_first().ok_or(ProxyConfigError::BadLength)?;
        let addresses = |params: &[u8]| -> Result<Vec<Address>, ProxyConfigError> {
            if params.len() % 2 != 0 {
                return Err(ProxyConfigError::BadLength);
            }
            Ok(params
                .chunks_exact(2)
                .map(|c| Address::from(u16::from_be_bytes([c[0], c[1]])))
                .collect())
        };
        match opcode {
            0x00 => match params {
                [filter_type] => Ok(ProxyConfigMessage::SetFilterType(FilterType::try_from(
                    *filter_type,
                )?)),
                _ => Err(ProxyConfigError::BadLength),
            },
            0x01 => Ok(ProxyConfigMessage::AddAddresses(addresses(params)?)),
            0x02 => Ok(ProxyConfigMessage::RemoveAddresses(addresses(params)?)),
            0x03 => match params {
                [filter_type, size_hi, size_lo] => Ok(ProxyConfigMessage::FilterStatus {
                    filter_type: FilterType::try_from(*filter_type)?,
                    list_size: u16::from_be_bytes([*size_hi, *size_lo]),
                }),
                _ => Err(ProxyConfigError::BadLength),
            },
            _ => Err(ProxyConfigError::BadOpcode),
        }
    }
}

/// Filter believed to be configured on the connected proxy.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ProxyFilter {
    pub filter_type: FilterType,
    pub addresses: BTreeSet<u16>,
}
impl ProxyFilter {
    #[must_use]
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            filter_type,
            addresses: BTreeSet::new(),
        }
    }
    /// An empty filter doesn't change what the proxy forwards for attribution purposes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.addresses.is_empty()
    }
    #[must_use]
    pub fn allows(&self, address: Address) -> bool {
        let listed = self.addresses.contains(&address.value());
        match self.filter_type {
            FilterType::Inclusion => listed,
            FilterType::Exclusion => !listed,
        }
    }
}
/// Filter request sent but not yet confirmed by a Filter Status.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum FilterRequest {
    SetType(FilterType),
    /// Addresses and the filter type assumed when the request was sent.
    Add(Vec<Address>, FilterType),
    Remove(Vec<Address>, FilterType),
}
impl FilterRequest {
    #[must_use]
    pub fn message(&self) -> ProxyConfigMessage {
        match self {
            FilterRequest::SetType(t) => ProxyConfigMessage::SetFilterType(*t),
            FilterRequest::Add(a, _) => ProxyConfigMessage::AddAddresses(a.clone()),
            FilterRequest::Remove(a, _) => ProxyConfigMessage::RemoveAddresses(a.clone()),
        }
    }
}
/// Tracks the proxy filter only as confirmed by Filter Status replies.
pub struct ProxyFilterTracker {
    filter: Option<ProxyFilter>,
    pending: VecDeque<FilterRequest>,
    logger: slog::Logger,
}
impl ProxyFilterTracker {
    #[must_use]
    pub fn new(logger: slog::Logger) -> Self {
        Self {
            filter: None,
            pending: VecDeque::new(),
            logger,
        }
    }
    #[must_use]
    pub fn filter(&self) -> Option<&ProxyFilter> {
        self.filter.as_ref()
    }
    /// Filter type requests should assume. `Inclusion` until one is confirmed.
    #[must_use]
    pub fn assumed_type(&self) -> FilterType {
        self.pending
            .iter()
            .rev()
            .find_map(|r| match r {
                FilterRequest::SetType(t) => Some(*t),
                _ => None,
            })
            .or_else(|| self.filter.as_ref().map(|f| f.filter_type))
            .unwrap_or(FilterType::Inclusion)
    }
    pub fn request_sent(&mut self, request: FilterRequest) {
        self.pending.push_back(request);
    }
    /// The proxy never confirmed the outstanding requests. They are dropped so a later Filter
    /// Status is only matched against requests sent after this point.
    pub fn requests_failed(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped > 0 {
            slog::warn!(self.logger, "filter_requests_dropped"; "count" => dropped);
        }
        self.pending.clear();
        dropped
    }
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
    /// Applies the oldest pending request confirmed by a Filter Status. Returns the request.
    pub fn status_received(
        &mut self,
        filter_type: FilterType,
        list_size: u16,
    ) -> Option<FilterRequest> {
        let request = self.pending.pop_front();
        match &request {
            Some(FilterRequest::SetType(t)) => {
                if *t != filter_type {
                    slog::warn!(self.logger, "filter_type_mismatch"; "requested" => ?t, "status" => ?filter_type);
                }
                self.filter = Some(ProxyFilter::new(filter_type));
            }
            Some(FilterRequest::Add(addresses, assumed))
            | Some(FilterRequest::Remove(addresses, assumed)) => {
                let current = self.filter.as_ref().map(|f| f.filter_type);
                if *assumed == filter_type && current.unwrap_or(filter_type) == filter_type {
                    let filter = self
                        .filter
                        .get_or_insert_with(|| ProxyFilter::new(filter_type));
                    let is_add = match &request {
                        Some(FilterRequest::Add(..)) => true,
                        _ => false,
                    };
                    for address in addresses {
                        if is_add {
                            filter.addresses.insert(address.value());
                        } else {
                            filter.addresses.remove(&address.value());
                        }
                    }
                } else {
                    slog::warn!(self.logger, "filter_type_mismatch"; "assumed" => ?assumed, "status" => ?filter_type);
                    self.filter = Some(ProxyFilter::new(filter_type));
                }
            }
            None => {
                slog::debug!(self.logger, "unsolicited_filter_status"; "filter_type" => ?filter_type);
                if self.filter.as_ref().map(|f| f.filter_type) != Some(filter_type) {
                    self.filter = Some(ProxyFilter::new(filter_type));
                }
            }
        }
        if let Some(filter) = &self.filter {
            if filter.addresses.len() != usize::from(list_size) {
                slog::debug!(self.logger, "filter_size_differs"; "tracked" => filter.addresses.len(), "status" => list_size);
            }
        }
        request
    }
    /// Whether a message from `src` can update global per node state. Messages are only
    /// untrusted while an active filter wouldn't forward `src`.
    #[must_use]
    pub fn trusted(&self, src: Address) -> bool {
        match &self.filter {
            Some(filter) if filter.is_active() => filter.allows(src),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::o;

    fn tracker() -> ProxyFilterTracker {
        ProxyFilterTracker::new(slog::Logger::root(slog::Discard, o!()))
    }
    #[test]
    fn test_header() {
        let header = ProxyPDUHeader::unpack(0x02).unwrap();
        assert_eq!(header, ProxyPDUHeader::complete(ProxyPDUType::ProxyConfiguration));
        assert_eq!(ProxyPDUHeader::unpack(0xC1).unwrap().sar, SAR::Last);
        assert_eq!(ProxyPDUHeader::unpack(0x04), None);
        assert_eq!(frame(ProxyPDUType::Network, &[0xAA]), vec![0x00, 0xAA]);
    }
    #[test]
    fn test_config_messages() {
        let add = ProxyConfigMessage::AddAddresses(vec![Address::from(0x0001_u16), Address::from(0xC000_u16)]);
        assert_eq!(add.to_bytes().unwrap(), vec![0x01, 0x00, 0x01, 0xC0, 0x00]);
        assert_eq!(ProxyConfigMessage::from_bytes(&[0x01, 0x00, 0x01, 0xC0, 0x00]), Ok(add));
        assert_eq!(
            ProxyConfigMessage::from_bytes(&[0x03, 0x01, 0x00, 0x02]),
            Ok(ProxyConfigMessage::FilterStatus {
                filter_type: FilterType::Exclusion,
                list_size: 2
            })
        );
        assert_eq!(
            ProxyConfigMessage::from_bytes(&[0x00, 0x02]),
            Err(ProxyConfigError::BadFilterType)
        );
        assert_eq!(
            ProxyConfigMessage::from_bytes(&[0x01, 0x00]),
            Err(ProxyConfigError::BadLength)
        );
        let too_many = ProxyConfigMessage::RemoveAddresses(vec![Address::from(1_u16); 6]);
        assert_eq!(too_many.to_bytes(), Err(ProxyConfigError::TooManyAddresses));
    }
    #[test]
    fn test_filter_only_changes_on_status() {
        let mut tracker = tracker();
        assert!(tracker.filter().is_none());
        tracker.request_sent(FilterRequest::SetType(FilterType::Inclusion));
        assert!(tracker.filter().is_none());
        tracker.status_received(FilterType::Inclusion, 0);
        assert_eq!(tracker.filter(), Some(&ProxyFilter::new(FilterType::Inclusion)));
        tracker.request_sent(FilterRequest::Add(
            vec![Address::from(0x0005_u16)],
            FilterType::Inclusion,
        ));
        assert!(tracker.trusted(Address::from(0x0006_u16)));
        tracker.status_received(FilterType::Inclusion, 1);
        assert!(tracker.trusted(Address::from(0x0005_u16)));
        assert!(!tracker.trusted(Address::from(0x0006_u16)));
        tracker.request_sent(FilterRequest::Remove(
            vec![Address::from(0x0005_u16)],
            FilterType::Inclusion,
        ));
        tracker.status_received(FilterType::Inclusion, 0);
        assert!(tracker.trusted(Address::from(0x0006_u16)));
    }
    #[test]
    fn test_type_mismatch_resets() {
        let mut tracker = tracker();
        tracker.request_sent(FilterRequest::SetType(FilterType::Exclusion));
        tracker.status_received(FilterType::Exclusion, 0);
        tracker.request_sent(FilterRequest::Add(
            vec![Address::from(0x0002_u16)],
            FilterType::Inclusion,
        ));
        tracker.status_received(FilterType::Exclusion, 0);
        let filter = tracker.filter().unwrap();
        assert_eq!(filter.filter_type, FilterType::Exclusion);
        assert!(filter.addresses.is_empty());
    }
    #[test]
    fn test_failed_request_not_confirmed_by_later_status() {
        let mut tracker = tracker();
        tracker.request_sent(FilterRequest::SetType(FilterType::Inclusion));
        assert_eq!(tracker.requests_failed(), 1);
        assert_eq!(tracker.pending_requests(), 0);
        tracker.request_sent(FilterRequest::Add(
            vec![Address::from(0x0200_u16)],
            FilterType::Inclusion,
        ));
        assert_eq!(
            tracker.status_received(FilterType::Inclusion, 1),
            Some(FilterRequest::Add(
                vec![Address::from(0x0200_u16)],
                FilterType::Inclusion
            ))
        );
        let filter = tracker.filter().unwrap();
        assert!(filter.addresses.contains(&0x0200));
        assert!(tracker.trusted(Address::from(0x0200_u16)));
        assert!(!tracker.trusted(Address::from(0x0100_u16)));
    }
    #[test]
    fn test_exclusion_attribution() {
        let mut tracker = tracker();
        tracker.request_sent(FilterRequest::SetType(FilterType::Exclusion));
        tracker.status_received(FilterType::Exclusion, 0);
        assert_eq!(tracker.assumed_type(), FilterType::Exclusion);
        tracker.request_sent(FilterRequest::Add(
            vec![Address::from(0x0003_u16)],
            FilterType::Exclusion,
        ));
        tracker.status_received(FilterType::Exclusion, 1);
        assert!(!tracker.trusted(Address::from(0x0003_u16)));
        assert!(tracker.trusted(Address::from(0x0004_u16)));
    }
}
