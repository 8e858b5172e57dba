//! VCL NAL unit classification (ITU-T H.265 Table 7-1).
//!
//! Reference management only needs to know which kind of coded slice is
//! being decoded: IDR pictures start a new coded video sequence, CRA/BLA
//! pictures are random-access points whose references may legitimately be
//! absent, and sub-layer non-reference pictures must not move the POC
//! derivation anchor.

use serde::{Deserialize, Serialize};

/// Coded-slice NAL unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum NalUnitType {
    // Trailing pictures
    TrailN = 0,
    TrailR = 1,
    // Temporal sub-layer access
    TsaN = 2,
    TsaR = 3,
    StsaN = 4,
    StsaR = 5,
    // Leading pictures
    RadlN = 6,
    RadlR = 7,
    RaslN = 8,
    RaslR = 9,
    // Broken-link access
    BlaWLp = 16,
    BlaWRadl = 17,
    BlaNLp = 18,
    // Instantaneous decoder refresh
    IdrWRadl = 19,
    IdrNLp = 20,
    // Clean random access
    CraNut = 21,
}

impl NalUnitType {
    /// Create from the raw 6-bit NAL unit type, for coded-slice types only.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::TrailN),
            1 => Some(Self::TrailR),
            2 => Some(Self::TsaN),
            3 => Some(Self::TsaR),
            4 => Some(Self::StsaN),
            5 => Some(Self::StsaR),
            6 => Some(Self::RadlN),
            7 => Some(Self::RadlR),
            8 => Some(Self::RaslN),
            9 => Some(Self::RaslR),
            16 => Some(Self::BlaWLp),
            17 => Some(Self::BlaWRadl),
            18 => Some(Self::BlaNLp),
            19 => Some(Self::IdrWRadl),
            20 => Some(Self::IdrNLp),
            21 => Some(Self::CraNut),
            _ => None,
        }
    }

    /// Check if this is an IDR picture.
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::IdrWRadl | Self::IdrNLp)
    }

    /// Check if this is a BLA picture.
    pub fn is_bla(&self) -> bool {
        matches!(self, Self::BlaWLp | Self::BlaWRadl | Self::BlaNLp)
    }

    /// Check if this is a CRA picture.
    pub fn is_cra(&self) -> bool {
        matches!(self, Self::CraNut)
    }

    /// Check if this is an IRAP picture (IDR, CRA, or BLA).
    pub fn is_irap(&self) -> bool {
        (*self as u8) >= 16 && (*self as u8) <= 23
    }

    /// Check if this is a RASL picture.
    pub fn is_rasl(&self) -> bool {
        matches!(self, Self::RaslN | Self::RaslR)
    }

    /// Check if this is a RADL picture.
    pub fn is_radl(&self) -> bool {
        matches!(self, Self::RadlN | Self::RadlR)
    }

    /// Check if this picture is used as a reference.
    ///
    /// Sub-layer reference pictures have odd NAL type values below 16;
    /// all IRAP pictures are reference pictures.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Self::TrailR | Self::TsaR | Self::StsaR | Self::RadlR | Self::RaslR
        ) || self.is_irap()
    }

    /// Check if decoding this picture moves the POC derivation anchor.
    ///
    /// Leading pictures never anchor POC derivation even when they are
    /// sub-layer references.
    pub fn updates_poc_anchor(&self) -> bool {
        self.is_reference() && !self.is_rasl() && !self.is_radl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(NalUnitType::IdrWRadl.is_idr());
        assert!(NalUnitType::IdrWRadl.is_irap());
        assert!(!NalUnitType::IdrWRadl.is_cra());

        assert!(NalUnitType::CraNut.is_cra());
        assert!(NalUnitType::CraNut.is_irap());

        assert!(NalUnitType::BlaWLp.is_bla());
        assert!(NalUnitType::BlaWLp.is_irap());

        assert!(NalUnitType::TrailR.is_reference());
        assert!(!NalUnitType::TrailN.is_reference());
    }

    #[test]
    fn test_poc_anchor_updates() {
        assert!(NalUnitType::TrailR.updates_poc_anchor());
        assert!(NalUnitType::CraNut.updates_poc_anchor());
        assert!(!NalUnitType::TrailN.updates_poc_anchor());
        // Leading pictures never anchor, reference or not.
        assert!(!NalUnitType::RaslR.updates_poc_anchor());
        assert!(!NalUnitType::RadlR.updates_poc_anchor());
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(NalUnitType::from_u8(21), Some(NalUnitType::CraNut));
        assert_eq!(NalUnitType::from_u8(19), Some(NalUnitType::IdrWRadl));
        assert_eq!(NalUnitType::from_u8(32), None);
        assert_eq!(NalUnitType::from_u8(10), None);
    }
}
