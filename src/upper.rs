//! Upper Transport Layer. Encrypts/decrypts the access payload with an application key
//! (`AKF == 1`) or a device key (`AKF == 0`) and appends the TransMIC.
use crate::control::{ControlOpcode, ControlPayload};
use crate::crypto::aes::{AESCipher, Error, MicSize};
use crate::crypto::key::{AppKey, DevKey, Key};
use crate::crypto::nonce::{AppNonce, DeviceNonce, Nonce};
use crate::crypto::{AID, AKF, MIC};
use crate::lower::{
    SegmentedAccessPDU, SegmentedControlPDU, UnsegmentedAccessPDU, UnsegmentedControlPDU, PDU,
};

/// Largest upper transport PDU (encrypted access payload + TransMIC). 32 segments of 12 bytes.
pub const MAX_UPPER_PDU_LEN: usize = 32 * 12;
/// An unsegmented access message carries at most 15 bytes of upper transport PDU.
pub const MAX_UNSEGMENTED_UPPER_PDU_LEN: usize = 15;

/// Key and nonce used to protect one upper transport PDU. Application keys are used directly
/// as the AES-CCM key (no derivation besides the `AID`).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SecurityMaterials {
    App(AppNonce, AppKey, AID),
    Device(DeviceNonce, DevKey),
}
impl SecurityMaterials {
    #[must_use]
    pub fn unpack(&self) -> (&Nonce, &Key) {
        match &self {
            SecurityMaterials::App(n, k, _) => (n.as_ref(), k.as_ref()),
            SecurityMaterials::Device(n, k) => (n.as_ref(), k.as_ref()),
        }
    }
    #[must_use]
    pub fn akf(&self) -> AKF {
        match self {
            SecurityMaterials::App(_, _, _) => AppKey::akf(),
            SecurityMaterials::Device(_, _) => DevKey::akf(),
        }
    }
    /// `AID` carried in the lower transport header. Device key messages always use 0.
    #[must_use]
    pub fn aid(&self) -> AID {
        match self {
            SecurityMaterials::App(_, _, aid) => *aid,
            SecurityMaterials::Device(_, _) => AID::new(0),
        }
    }
    pub fn encrypt(&self, payload: &mut [u8], mic_size: MicSize) -> Result<MIC, Error> {
        let (nonce, key) = self.unpack();
        AESCipher::new(*key).ccm_encrypt(nonce, b"", payload, mic_size)
    }
    pub fn decrypt(&self, payload: &mut [u8], mic: MIC) -> Result<(), Error> {
        let (nonce, key) = self.unpack();
        AESCipher::new(*key).ccm_decrypt(nonce, b"", payload, mic)
    }
}
/// Plaintext access payload (opcode + parameters).
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AppPayload {
    data: Vec<u8>,
}
impl AppPayload {
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self { data: payload }
    }
    /// Encrypts the access payload in-place, reusing the plaintext buffer.
    pub fn encrypt(
        self,
        sm: &SecurityMaterials,
        mic_size: MicSize,
    ) -> Result<EncryptedAppPayload, Error> {
        let mut data = self.data;
        let mic = sm.encrypt(&mut data, mic_size)?;
        Ok(EncryptedAppPayload::new(data, mic, sm.akf(), sm.aid()))
    }
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data
    }
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
/// Upper transport access PDU: encrypted access payload with its TransMIC plus the `AKF`/`AID`
/// the lower transport layer needs.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct EncryptedAppPayload {
    data: Vec<u8>,
    mic: MIC,
    akf: AKF,
    aid: AID,
}
impl EncryptedAppPayload {
    #[must_use]
    pub fn new(data: Vec<u8>, mic: MIC, akf: AKF, aid: AID) -> Self {
        Self {
            data,
            mic,
            akf,
            aid,
        }
    }
    /// Splits `upper_pdu` (`data || TransMIC`) back into its parts.
    #[must_use]
    pub fn from_bytes(upper_pdu: &[u8], mic_size: MicSize, akf: AKF, aid: AID) -> Option<Self> {
        let mic_len = mic_size.byte_size();
        if upper_pdu.len() <= mic_len {
            return None;
        }
        let (data, mic) = upper_pdu.split_at(upper_pdu.len() - mic_len);
        Some(Self::new(
            data.to_vec(),
            MIC::try_from_bytes_be(mic)?,
            akf,
            aid,
        ))
    }
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
    #[must_use]
    pub fn mic(&self) -> MIC {
        self.mic
    }
    #[must_use]
    pub fn akf(&self) -> AKF {
        self.akf
    }
    #[must_use]
    pub fn aid(&self) -> AID {
        self.aid
    }
    /// `SZMIC` flag of the segment header. Only segmented messages may use the 64-bit MIC.
    #[must_use]
    pub fn szmic(&self) -> bool {
        self.mic.is_big()
    }
    pub fn decrypt(&self, sm: &SecurityMaterials) -> Result<AppPayload, Error> {
        let mut data = self.data.clone();
        sm.decrypt(&mut data, self.mic)?;
        Ok(AppPayload::new(data))
    }
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_len() + self.mic.byte_size()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
    /// `data || TransMIC` as it's carried by the lower transport layer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.data);
        let mut mic = [0_u8; MIC::max_len()];
        self.mic.pack_into(&mut mic);
        out.extend_from_slice(&mic[..self.mic.byte_size()]);
        out
    }
    /// True if the PDU has to be segmented (too long, or a 64-bit TransMIC).
    #[must_use]
    pub fn should_segment(&self) -> bool {
        self.mic.is_big() || self.len() > MAX_UNSEGMENTED_UPPER_PDU_LEN
    }
}

/// Upper transport PDU handed to the lower transport layer.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum UpperPDU {
    Access(EncryptedAppPayload),
    Control(ControlPayload<Vec<u8>>),
}
impl UpperPDU {
    /// Bytes split across segments. Control opcodes travel in every lower transport header so only
    /// the parameters are included.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UpperPDU::Access(p) => p.to_bytes(),
            UpperPDU::Control(p) => p.payload.clone(),
        }
    }
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            UpperPDU::Access(p) => p.len(),
            UpperPDU::Control(p) => p.payload.len(),
        }
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    #[must_use]
    pub fn is_control(&self) -> bool {
        match self {
            UpperPDU::Access(_) => false,
            UpperPDU::Control(_) => true,
        }
    }
    #[must_use]
    pub fn control_opcode(&self) -> Option<ControlOpcode> {
        match self {
            UpperPDU::Access(_) => None,
            UpperPDU::Control(p) => Some(p.opcode),
        }
    }
    /// Bytes of upper PDU per segment. 12 for access, 8 for control.
    #[must_use]
    pub fn seg_len(&self) -> usize {
        if self.is_control() {
            SegmentedControlPDU::max_seg_len()
        } else {
            SegmentedAccessPDU::max_seg_len()
        }
    }
    #[must_use]
    pub fn szmic(&self) -> bool {
        match self {
            UpperPDU::Access(p) => p.szmic(),
            UpperPDU::Control(_) => false,
        }
    }
    #[must_use]
    pub fn should_segment(&self) -> bool {
        match self {
            UpperPDU::Access(p) => p.should_segment(),
            UpperPDU::Control(p) => p.payload.len() > UnsegmentedControlPDU::max_parameters_size(),
        }
    }
    /// The single lower transport PDU carrying `self`. `None` if it must be segmented.
    #[must_use]
    pub fn unsegmented(&self) -> Option<PDU> {
        if self.should_segment() {
            return None;
        }
        Some(match self {
            UpperPDU::Access(p) => {
                PDU::UnsegmentedAccess(UnsegmentedAccessPDU::new(p.akf(), p.aid(), &p.to_bytes()))
            }
            UpperPDU::Control(p) => {
                PDU::UnsegmentedControl(UnsegmentedControlPDU::new(p.opcode, &p.payload))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, UnicastAddress};
    use crate::bytes::hex_to_bytes;
    use crate::crypto::nonce::UpperNonceParts;
    use crate::mesh::{IVIndex, SequenceNumber};

    fn message_6_materials() -> SecurityMaterials {
        let nonce = UpperNonceParts {
            aszmic: false,
            seq: SequenceNumber::new(0x3129ab),
            src: UnicastAddress::new(0x0003),
            dst: Address::from(0x1201_u16),
            iv_index: IVIndex(0x1234_5678),
        }
        .device_nonce();
        SecurityMaterials::Device(
            nonce,
            DevKey::from_hex("9d6dd0e96eb25dc19a40ed9914f8f03f").unwrap(),
        )
    }

    #[test]
    fn test_device_key_encrypt() {
        // Mesh Profile sample data, message #6 (Config AppKey Add).
        let payload = hex_to_bytes("0056341263964771734fbd76e3b40519d1d94a48").unwrap();
        let encrypted = AppPayload::new(payload.clone())
            .encrypt(&message_6_materials(), MicSize::Small)
            .unwrap();
        assert_eq!(
            encrypted.to_bytes(),
            hex_to_bytes("ee9dddfd2169326d23f3afdfcfdc18c52fdef772e0e17308").unwrap()
        );
        assert_eq!(encrypted.akf(), AKF(false));
        assert!(encrypted.should_segment());
        let decrypted = encrypted.decrypt(&message_6_materials()).unwrap();
        assert_eq!(decrypted.payload(), &payload[..]);
    }
    #[test]
    fn test_wrong_key_fails() {
        let payload = hex_to_bytes("0056341263964771734fbd76e3b40519d1d94a48").unwrap();
        let encrypted = AppPayload::new(payload)
            .encrypt(&message_6_materials(), MicSize::Small)
            .unwrap();
        let wrong = match message_6_materials() {
            SecurityMaterials::Device(n, _) => SecurityMaterials::Device(
                n,
                DevKey::from_hex("63964771734fbd76e3b40519d1d94a48").unwrap(),
            ),
            other => other,
        };
        assert_eq!(encrypted.decrypt(&wrong), Err(Error));
    }
    #[test]
    fn test_app_key_round_trip_and_mic_size() {
        let app_key = AppKey::from_hex("63964771734fbd76e3b40519d1d94a48").unwrap();
        for &(src, dst, seq, iv) in &[
            (0x0001_u16, 0x0002_u16, 1_u32, 0_u32),
            (0x1201, 0xC105, 0x07080b, 0x1234_5678),
        ] {
            let nonce = UpperNonceParts {
                aszmic: false,
                seq: SequenceNumber::new(seq),
                src: UnicastAddress::new(src),
                dst: Address::from(dst),
                iv_index: IVIndex(iv),
            }
            .app_nonce();
            let sm = SecurityMaterials::App(nonce, app_key, app_key.aid());
            let encrypted = AppPayload::new(vec![0x82, 0x01, 1, 2, 3, 4])
                .encrypt(&sm, MicSize::Small)
                .unwrap();
            assert_eq!(encrypted.aid(), AID::new(0x26));
            assert_eq!(encrypted.len(), 10);
            assert!(!encrypted.should_segment());
            let bytes = encrypted.to_bytes();
            let parsed =
                EncryptedAppPayload::from_bytes(&bytes, MicSize::Small, AKF(true), sm.aid())
                    .unwrap();
            assert_eq!(parsed.decrypt(&sm).unwrap().payload(), &[0x82, 0x01, 1, 2, 3, 4]);
            // Reading the same bytes with the other MIC size must not authenticate.
            let misread =
                EncryptedAppPayload::from_bytes(&bytes, MicSize::Big, AKF(true), sm.aid())
                    .unwrap();
            assert!(misread.decrypt(&sm).is_err());
        }
    }
}
