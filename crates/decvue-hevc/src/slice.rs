//! Parsed slice-header state consumed by reference management.
//!
//! Slice parsing happens upstream; the types here carry the already-decoded
//! header fields the DPB reads, including the short-term and long-term
//! reference picture sets signalled for the picture.

use serde::{Deserialize, Serialize};

/// HEVC slice type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceType {
    /// B slice (bi-directional prediction).
    B = 0,
    /// P slice (uni-directional prediction).
    P = 1,
    /// I slice (intra prediction only).
    I = 2,
}

impl SliceType {
    /// Check if this is an intra slice.
    pub fn is_intra(&self) -> bool {
        matches!(self, Self::I)
    }

    /// Check if this slice uses inter prediction.
    pub fn is_inter(&self) -> bool {
        matches!(self, Self::B | Self::P)
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::B => "B",
            Self::P => "P",
            Self::I => "I",
        }
    }
}

/// Short-term reference picture set, as signalled for the current picture.
///
/// Deltas are relative to the current POC, negative entries first. Bit `i`
/// of `used` says whether delta `i` is referenced by the current picture
/// (as opposed to only by pictures following it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShortTermRps {
    /// Signed POC deltas, the first `num_negative_pics` of them negative.
    pub delta_poc: Vec<i32>,
    /// Number of negative deltas at the front of `delta_poc`.
    pub num_negative_pics: usize,
    /// Used-by-current-picture bitmask over `delta_poc`.
    pub used: u32,
}

impl ShortTermRps {
    /// Total number of deltas.
    pub fn num_delta_pocs(&self) -> usize {
        self.delta_poc.len()
    }

    /// Whether delta `i` is used by the current picture.
    pub fn is_used(&self, i: usize) -> bool {
        self.used & (1 << i) != 0
    }
}

/// Long-term reference picture set, as signalled for the current picture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LongTermRps {
    /// Absolute POC (or POC LSB when the MSB is not signalled) per entry.
    pub poc: Vec<i32>,
    /// Used-by-current-picture flag per entry.
    pub used: Vec<bool>,
    /// Whether the POC MSB cycle was signalled per entry.
    pub poc_msb_present: Vec<bool>,
}

impl LongTermRps {
    /// Number of long-term entries.
    pub fn nb_refs(&self) -> usize {
        self.poc.len()
    }
}

/// The slice-header fields reference management reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceHeader {
    /// First slice segment in picture.
    pub first_slice_segment_in_pic_flag: bool,
    /// No output of prior pictures (for IRAP).
    pub no_output_of_prior_pics_flag: bool,
    /// Raster-scan CTB address of the slice's first CTB.
    pub slice_segment_address: u32,
    /// Slice type (B, P, I).
    pub slice_type: SliceType,
    /// Picture output flag.
    pub pic_output_flag: bool,
    /// Picture order count LSB.
    pub slice_pic_order_cnt_lsb: u32,
    /// Short-term RPS (absent for IDR pictures).
    pub short_term_rps: Option<ShortTermRps>,
    /// Long-term RPS.
    pub long_term_rps: LongTermRps,
    /// Active reference count per list.
    pub nb_refs: [usize; 2],
    /// Reference list modification flag per list.
    pub rpl_modification_flag: [bool; 2],
    /// Modification permutation indices per list.
    pub list_entry_lx: [Vec<u8>; 2],
    /// Which list the collocated picture comes from (0 or 1).
    pub collocated_list: u8,
    /// Index of the collocated picture in that list.
    pub collocated_ref_idx: usize,
}

impl Default for SliceHeader {
    fn default() -> Self {
        Self {
            first_slice_segment_in_pic_flag: true,
            no_output_of_prior_pics_flag: false,
            slice_segment_address: 0,
            slice_type: SliceType::I,
            pic_output_flag: true,
            slice_pic_order_cnt_lsb: 0,
            short_term_rps: None,
            long_term_rps: LongTermRps::default(),
            nb_refs: [0, 0],
            rpl_modification_flag: [false, false],
            list_entry_lx: [Vec::new(), Vec::new()],
            collocated_list: 0,
            collocated_ref_idx: 0,
        }
    }
}

impl SliceHeader {
    /// Check if this slice uses inter prediction.
    pub fn is_inter(&self) -> bool {
        self.slice_type.is_inter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_type() {
        assert!(SliceType::I.is_intra());
        assert!(!SliceType::I.is_inter());
        assert!(SliceType::P.is_inter());
        assert!(SliceType::B.is_inter());
        assert_eq!(SliceType::B.name(), "B");
    }

    #[test]
    fn test_short_term_rps_used_bits() {
        let rps = ShortTermRps {
            delta_poc: vec![-1, -3, 2],
            num_negative_pics: 2,
            used: 0b101,
        };
        assert_eq!(rps.num_delta_pocs(), 3);
        assert!(rps.is_used(0));
        assert!(!rps.is_used(1));
        assert!(rps.is_used(2));
    }

    #[test]
    fn test_header_defaults() {
        let header = SliceHeader::default();
        assert!(header.first_slice_segment_in_pic_flag);
        assert!(header.pic_output_flag);
        assert!(!header.is_inter());
        assert!(header.short_term_rps.is_none());
        assert_eq!(header.long_term_rps.nb_refs(), 0);
    }
}
