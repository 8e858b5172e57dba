//! Configured sequence-level parameters.
//!
//! The DPB never parses an SPS; it receives one already activated by the
//! parameter-set layer and only reads the geometry and buffering bounds
//! derived below.

use decvue_core::{CropWindow, PictureGeometry};
use serde::{Deserialize, Serialize};

/// Chroma format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromaFormat {
    Monochrome = 0,
    Chroma420 = 1,
    Chroma422 = 2,
    Chroma444 = 3,
}

impl From<u8> for ChromaFormat {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Monochrome,
            2 => Self::Chroma422,
            3 => Self::Chroma444,
            _ => Self::Chroma420,
        }
    }
}

/// Active Sequence Parameter Set, reduced to what buffer management reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sps {
    /// Picture width in luma samples.
    pub pic_width_in_luma_samples: u32,
    /// Picture height in luma samples.
    pub pic_height_in_luma_samples: u32,
    /// Chroma format.
    pub chroma_format_idc: ChromaFormat,
    /// Bit depth for luma samples.
    pub bit_depth_luma_minus8: u8,
    /// Log2 of max POC LSB.
    pub log2_max_pic_order_cnt_lsb_minus4: u8,
    /// Log2 of min luma coding block size.
    pub log2_min_luma_coding_block_size_minus3: u8,
    /// Log2 diff of max and min luma coding block size.
    pub log2_diff_max_min_luma_coding_block_size: u8,
    /// Conformance window offsets.
    pub conf_win_left_offset: u32,
    pub conf_win_right_offset: u32,
    pub conf_win_top_offset: u32,
    pub conf_win_bottom_offset: u32,
    /// Max DPB size per sub-layer.
    pub sps_max_dec_pic_buffering_minus1: Vec<u8>,
    /// Max num reorder pics per sub-layer.
    pub sps_max_num_reorder_pics: Vec<u8>,
    /// Temporal MVP enabled.
    pub sps_temporal_mvp_enabled_flag: bool,
}

impl Sps {
    /// Get the actual bit depth.
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth_luma_minus8 + 8
    }

    /// Log2 of bytes per sample (0 at 8-bit, 1 above).
    pub fn pixel_shift(&self) -> u8 {
        u8::from(self.bit_depth() > 8)
    }

    /// Log2 of the CTB size.
    pub fn log2_ctb_size(&self) -> u32 {
        u32::from(self.log2_min_luma_coding_block_size_minus3)
            + 3
            + u32::from(self.log2_diff_max_min_luma_coding_block_size)
    }

    /// Get the CTB (Coding Tree Block) size.
    pub fn ctb_size(&self) -> u32 {
        1 << self.log2_ctb_size()
    }

    /// Get picture width in CTBs.
    pub fn ctb_width(&self) -> u32 {
        let ctb_size = self.ctb_size();
        (self.pic_width_in_luma_samples + ctb_size - 1) / ctb_size
    }

    /// Get picture height in CTBs.
    pub fn ctb_height(&self) -> u32 {
        let ctb_size = self.ctb_size();
        (self.pic_height_in_luma_samples + ctb_size - 1) / ctb_size
    }

    /// Total CTB count of one picture.
    pub fn pic_size_in_ctbs(&self) -> usize {
        self.ctb_width() as usize * self.ctb_height() as usize
    }

    /// Log2 of the minimum coding block size.
    pub fn log2_min_cb_size(&self) -> u32 {
        u32::from(self.log2_min_luma_coding_block_size_minus3) + 3
    }

    /// Log2 of the minimum prediction unit size.
    pub fn log2_min_pu_size(&self) -> u32 {
        self.log2_min_cb_size() - 1
    }

    /// Picture width in minimum prediction units.
    pub fn min_pu_width(&self) -> u32 {
        self.pic_width_in_luma_samples >> self.log2_min_pu_size()
    }

    /// Picture height in minimum prediction units.
    pub fn min_pu_height(&self) -> u32 {
        self.pic_height_in_luma_samples >> self.log2_min_pu_size()
    }

    /// Log2 of the max POC LSB value.
    pub fn log2_max_poc_lsb(&self) -> u32 {
        u32::from(self.log2_max_pic_order_cnt_lsb_minus4) + 4
    }

    /// Get max POC LSB value.
    pub fn max_poc_lsb(&self) -> u32 {
        1 << self.log2_max_poc_lsb()
    }

    /// Horizontal chroma subsampling shifts per plane.
    pub fn hshift(&self) -> [u8; 3] {
        match self.chroma_format_idc {
            ChromaFormat::Chroma420 | ChromaFormat::Chroma422 => [0, 1, 1],
            _ => [0, 0, 0],
        }
    }

    /// Vertical chroma subsampling shifts per plane.
    pub fn vshift(&self) -> [u8; 3] {
        match self.chroma_format_idc {
            ChromaFormat::Chroma420 => [0, 1, 1],
            _ => [0, 0, 0],
        }
    }

    /// Number of sample planes.
    pub fn nb_planes(&self) -> usize {
        match self.chroma_format_idc {
            ChromaFormat::Monochrome => 1,
            _ => 3,
        }
    }

    /// Allocation geometry for one decoded picture.
    pub fn geometry(&self) -> PictureGeometry {
        PictureGeometry {
            width: self.pic_width_in_luma_samples,
            height: self.pic_height_in_luma_samples,
            bit_depth: self.bit_depth(),
            pixel_shift: self.pixel_shift(),
            nb_planes: self.nb_planes(),
            hshift: self.hshift(),
            vshift: self.vshift(),
        }
    }

    /// Output cropping window.
    pub fn output_window(&self) -> CropWindow {
        CropWindow {
            left: self.conf_win_left_offset,
            right: self.conf_win_right_offset,
            top: self.conf_win_top_offset,
            bottom: self.conf_win_bottom_offset,
        }
    }

    /// Max DPB occupancy for the highest sub-layer.
    pub fn max_dec_pic_buffering(&self) -> usize {
        self.sps_max_dec_pic_buffering_minus1
            .last()
            .map(|&v| v as usize + 1)
            .unwrap_or(1)
    }

    /// Max number of output-pending pictures for the highest sub-layer.
    pub fn max_num_reorder_pics(&self) -> usize {
        self.sps_max_num_reorder_pics
            .last()
            .map(|&v| v as usize)
            .unwrap_or(0)
    }
}
