//! Configured picture-level parameters.
//!
//! Besides the self-reference flag, the only thing buffer management needs
//! from the PPS is the raster-scan to tile-scan CTB address map, which is
//! precomputed here at activation time (ITU-T H.265 6.5.1).

use serde::{Deserialize, Serialize};

use crate::error::{DpbError, Result};
use crate::sps::Sps;

/// Tile grid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileConfig {
    /// Number of tile columns minus 1.
    pub num_tile_columns_minus1: u16,
    /// Number of tile rows minus 1.
    pub num_tile_rows_minus1: u16,
    /// Uniform tile spacing.
    pub uniform_spacing_flag: bool,
    /// Explicit column widths in CTBs (all but the last column).
    pub column_width_minus1: Vec<u16>,
    /// Explicit row heights in CTBs (all but the last row).
    pub row_height_minus1: Vec<u16>,
}

impl TileConfig {
    /// Get number of tile columns.
    pub fn num_columns(&self) -> usize {
        self.num_tile_columns_minus1 as usize + 1
    }

    /// Get number of tile rows.
    pub fn num_rows(&self) -> usize {
        self.num_tile_rows_minus1 as usize + 1
    }
}

/// Active Picture Parameter Set, reduced to what buffer management reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pps {
    /// Current-picture self-reference enabled (screen content coding).
    pub pps_curr_pic_ref_enabled_flag: bool,
    /// Reference list modification syntax present in slice headers.
    pub lists_modification_present_flag: bool,
    /// Tiles enabled.
    pub tiles_enabled_flag: bool,
    /// Tile configuration.
    pub tile_config: Option<TileConfig>,
    ctb_width: u32,
    log2_ctb_size: u32,
    ctb_addr_rs_to_ts: Vec<u32>,
}

impl Pps {
    /// Activate a PPS without tiles: the CTB scan map is the identity.
    pub fn new(sps: &Sps) -> Self {
        Self {
            pps_curr_pic_ref_enabled_flag: false,
            lists_modification_present_flag: false,
            tiles_enabled_flag: false,
            tile_config: None,
            ctb_width: sps.ctb_width(),
            log2_ctb_size: sps.log2_ctb_size(),
            ctb_addr_rs_to_ts: (0..sps.pic_size_in_ctbs() as u32).collect(),
        }
    }

    /// Activate a PPS with a tile grid, precomputing the scan map.
    pub fn with_tiles(sps: &Sps, tiles: TileConfig) -> Result<Self> {
        let map = build_ctb_addr_map(sps, &tiles)?;
        Ok(Self {
            pps_curr_pic_ref_enabled_flag: false,
            lists_modification_present_flag: false,
            tiles_enabled_flag: true,
            tile_config: Some(tiles),
            ctb_width: sps.ctb_width(),
            log2_ctb_size: sps.log2_ctb_size(),
            ctb_addr_rs_to_ts: map,
        })
    }

    /// Raster-scan to tile-scan CTB address map.
    pub fn ctb_addr_rs_to_ts(&self) -> &[u32] {
        &self.ctb_addr_rs_to_ts
    }

    /// Picture width in CTBs (copied from the SPS at activation).
    pub fn ctb_width(&self) -> u32 {
        self.ctb_width
    }

    /// Log2 of the CTB size (copied from the SPS at activation).
    pub fn log2_ctb_size(&self) -> u32 {
        self.log2_ctb_size
    }
}

/// Split `total` CTBs into `parts` tile spans.
fn tile_spans(
    total: usize,
    parts: usize,
    uniform: bool,
    explicit_minus1: &[u16],
) -> Result<Vec<usize>> {
    if parts == 0 || parts > total {
        return Err(DpbError::invalid(format!(
            "tile grid does not fit: {parts} tiles over {total} CTBs"
        )));
    }
    if uniform {
        return Ok((0..parts)
            .map(|i| ((i + 1) * total) / parts - (i * total) / parts)
            .collect());
    }
    if explicit_minus1.len() != parts - 1 {
        return Err(DpbError::invalid(format!(
            "expected {} explicit tile sizes, got {}",
            parts - 1,
            explicit_minus1.len()
        )));
    }
    let mut spans: Vec<usize> = explicit_minus1.iter().map(|&v| v as usize + 1).collect();
    let used: usize = spans.iter().sum();
    if used >= total {
        return Err(DpbError::invalid("explicit tile sizes exceed the picture"));
    }
    spans.push(total - used);
    Ok(spans)
}

/// Build the raster-scan to tile-scan conversion table (H.265 6.5.1).
fn build_ctb_addr_map(sps: &Sps, tiles: &TileConfig) -> Result<Vec<u32>> {
    let ctb_width = sps.ctb_width() as usize;
    let ctb_height = sps.ctb_height() as usize;

    let col_width = tile_spans(
        ctb_width,
        tiles.num_columns(),
        tiles.uniform_spacing_flag,
        &tiles.column_width_minus1,
    )?;
    let row_height = tile_spans(
        ctb_height,
        tiles.num_rows(),
        tiles.uniform_spacing_flag,
        &tiles.row_height_minus1,
    )?;

    let mut col_bd = vec![0usize; col_width.len() + 1];
    for (i, &w) in col_width.iter().enumerate() {
        col_bd[i + 1] = col_bd[i] + w;
    }
    let mut row_bd = vec![0usize; row_height.len() + 1];
    for (i, &h) in row_height.iter().enumerate() {
        row_bd[i + 1] = row_bd[i] + h;
    }

    let mut map = vec![0u32; ctb_width * ctb_height];
    for ctb_addr_rs in 0..map.len() {
        let tb_x = ctb_addr_rs % ctb_width;
        let tb_y = ctb_addr_rs / ctb_width;
        let tile_x = (0..col_width.len())
            .rev()
            .find(|&i| tb_x >= col_bd[i])
            .unwrap_or(0);
        let tile_y = (0..row_height.len())
            .rev()
            .find(|&i| tb_y >= row_bd[i])
            .unwrap_or(0);

        let mut val: usize = row_height[tile_y] * col_bd[tile_x];
        val += ctb_width * row_bd[tile_y];
        val += (tb_y - row_bd[tile_y]) * col_width[tile_x] + tb_x - col_bd[tile_x];

        map[ctb_addr_rs] = val as u32;
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sps::ChromaFormat;

    fn test_sps(width: u32, height: u32) -> Sps {
        Sps {
            pic_width_in_luma_samples: width,
            pic_height_in_luma_samples: height,
            chroma_format_idc: ChromaFormat::Chroma420,
            bit_depth_luma_minus8: 0,
            log2_max_pic_order_cnt_lsb_minus4: 4,
            log2_min_luma_coding_block_size_minus3: 0,
            log2_diff_max_min_luma_coding_block_size: 3,
            conf_win_left_offset: 0,
            conf_win_right_offset: 0,
            conf_win_top_offset: 0,
            conf_win_bottom_offset: 0,
            sps_max_dec_pic_buffering_minus1: vec![4],
            sps_max_num_reorder_pics: vec![2],
            sps_temporal_mvp_enabled_flag: false,
        }
    }

    #[test]
    fn test_identity_map_without_tiles() {
        let sps = test_sps(256, 128); // 4x2 CTBs
        let pps = Pps::new(&sps);
        assert_eq!(pps.ctb_addr_rs_to_ts(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_uniform_2x2_tile_map() {
        let sps = test_sps(256, 256); // 4x4 CTBs
        let tiles = TileConfig {
            num_tile_columns_minus1: 1,
            num_tile_rows_minus1: 1,
            uniform_spacing_flag: true,
            column_width_minus1: vec![],
            row_height_minus1: vec![],
        };
        let pps = Pps::with_tiles(&sps, tiles).expect("valid tile grid");
        // Tile scan visits the top-left 2x2 tile first, then top-right, etc.
        #[rustfmt::skip]
        let expected = [
            0, 1, 4, 5,
            2, 3, 6, 7,
            8, 9, 12, 13,
            10, 11, 14, 15,
        ];
        assert_eq!(pps.ctb_addr_rs_to_ts(), &expected);
    }

    #[test]
    fn test_explicit_columns() {
        let sps = test_sps(256, 64); // 4x1 CTBs
        let tiles = TileConfig {
            num_tile_columns_minus1: 1,
            num_tile_rows_minus1: 0,
            uniform_spacing_flag: false,
            column_width_minus1: vec![0], // first column 1 CTB wide, second gets 3
            row_height_minus1: vec![],
        };
        let pps = Pps::with_tiles(&sps, tiles).expect("valid tile grid");
        assert_eq!(pps.ctb_addr_rs_to_ts(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let sps = test_sps(128, 64); // 2x1 CTBs
        let tiles = TileConfig {
            num_tile_columns_minus1: 3,
            num_tile_rows_minus1: 0,
            uniform_spacing_flag: true,
            column_width_minus1: vec![],
            row_height_minus1: vec![],
        };
        assert!(Pps::with_tiles(&sps, tiles).is_err());
    }
}
