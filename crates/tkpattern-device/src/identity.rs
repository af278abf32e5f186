use serde::Serialize;

use crate::error::{DeviceError, Result};

/// First name word of both the firmware and the pattern app.
pub const FW_NAME0: &str = "tk1 ";
/// Second name word reported by the firmware.
pub const FW_NAME1: &str = "mkdf";
/// First name word of the pattern app.
pub const APP_NAME0: &str = "tk1 ";
/// Second name word of the pattern app.
pub const APP_NAME1: &str = "ptrn";

/// Name and version record returned by GetNameVersion.
///
/// Layout: `name0` (4 bytes), `name1` (4 bytes), `version` (u32 LE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameVersion {
    pub name0: String,
    pub name1: String,
    pub version: u32,
}

impl NameVersion {
    pub const PACKED_SIZE: usize = 12;

    pub fn new(name0: &str, name1: &str, version: u32) -> Self {
        Self {
            name0: name0.to_string(),
            name1: name1.to_string(),
            version,
        }
    }

    pub fn unpack(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::PACKED_SIZE {
            return Err(DeviceError::ShortResponse {
                rsp: "rspGetNameVersion",
                len: raw.len(),
                need: Self::PACKED_SIZE,
            });
        }
        Ok(Self {
            name0: String::from_utf8_lossy(&raw[0..4]).into_owned(),
            name1: String::from_utf8_lossy(&raw[4..8]).into_owned(),
            version: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
        })
    }

    /// Wire form; names are truncated or zero-padded to four bytes.
    pub fn pack(&self) -> [u8; Self::PACKED_SIZE] {
        let mut out = [0u8; Self::PACKED_SIZE];
        for (dst, name) in [(0usize, &self.name0), (4, &self.name1)] {
            let bytes = name.as_bytes();
            let n = bytes.len().min(4);
            out[dst..dst + n].copy_from_slice(&bytes[..n]);
        }
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out
    }

    /// Compare names, ignoring the version.
    pub fn is(&self, name0: &str, name1: &str) -> bool {
        self.name0 == name0 && self.name1 == name1
    }

    pub fn is_pattern_app(&self) -> bool {
        self.is(APP_NAME0, APP_NAME1)
    }

    pub fn is_firmware(&self) -> bool {
        self.is(FW_NAME0, FW_NAME1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_reference_layout() {
        let mut raw = b"tk1 ptrn".to_vec();
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.resize(31, 0);

        let nv = NameVersion::unpack(&raw).unwrap();
        assert_eq!(nv, NameVersion::new("tk1 ", "ptrn", 2));
        assert!(nv.is_pattern_app());
        assert!(!nv.is_firmware());
    }

    #[test]
    fn pack_matches_unpack() {
        let nv = NameVersion::new(FW_NAME0, FW_NAME1, 5);
        assert_eq!(NameVersion::unpack(&nv.pack()).unwrap(), nv);
    }

    #[test]
    fn short_record_is_an_error() {
        assert!(matches!(
            NameVersion::unpack(b"tk1 "),
            Err(DeviceError::ShortResponse { len: 4, .. })
        ));
    }
}
