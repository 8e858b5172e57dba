//! Per-slice reference list construction.
//!
//! For every slice of the current picture the builder concatenates the
//! candidate buckets into L0 (and L1 for B slices), applies the slice
//! header's modification permutation, and records which pair of lists was
//! active for every CTB from the slice onward, so later pictures can use
//! this one as a collocated reference with correct cross-slice semantics.

use tracing::error;

use crate::error::{DpbError, Result};
use crate::frame::{RefPicEntry, RefPicList, RefPicListPair, HEVC_MAX_REFS, L0};
use crate::rps::RpsType;
use crate::slice::{SliceHeader, SliceType};
use crate::DecoderContext;

impl DecoderContext {
    /// Point the current picture's per-CTB table at this slice's list pair,
    /// from the slice's first CTB to the end of the picture. Later slices
    /// overwrite the tail again.
    fn init_slice_rpl(&mut self, sh: &SliceHeader) -> Result<()> {
        let cur = self
            .cur_frame
            .ok_or_else(|| DpbError::invalid("no current picture"))?;
        let slice_idx = self.slice_idx;
        let layer = &mut self.layers[self.cur_layer];

        let ctb_addr_ts = {
            let rs = sh.slice_segment_address as usize;
            *layer.pps().ctb_addr_rs_to_ts().get(rs).ok_or_else(|| {
                DpbError::invalid(format!("slice segment address {rs} outside the picture"))
            })? as usize
        };

        let frame = layer.slot_mut(cur);
        if slice_idx >= frame.nb_rpl_elems() {
            return Err(DpbError::invalid(
                "more slices than NAL units queued for this picture",
            ));
        }
        let ctb_count = frame.ctb_count;
        if let Some(rpl_tab) = frame.rpl_tab.as_mut() {
            for entry in rpl_tab[ctb_addr_ts..ctb_count].iter_mut() {
                *entry = slice_idx as u16;
            }
        }
        Ok(())
    }

    /// Build L0/L1 for the current slice and publish them in the current
    /// picture's list pool.
    pub fn slice_rpl(&mut self, sh: &SliceHeader) -> Result<()> {
        self.init_slice_rpl(sh)?;

        // Intra slices carry no lists; the per-CTB table is still updated.
        if !sh.slice_type.is_inter() {
            return Ok(());
        }

        let curr_pic_ref = self.layers[self.cur_layer]
            .pps()
            .pps_curr_pic_ref_enabled_flag;
        let nb_curr = self.rps[RpsType::StCurrBef as usize].nb_refs()
            + self.rps[RpsType::StCurrAft as usize].nb_refs()
            + self.rps[RpsType::LtCurr as usize].nb_refs();
        if nb_curr == 0 && !curr_pic_ref {
            error!("zero refs in the frame RPS");
            return Err(DpbError::invalid("zero refs in the frame RPS"));
        }

        let cur = self
            .cur_frame
            .ok_or_else(|| DpbError::invalid("no current picture"))?;
        let cur_poc = self.poc;
        let nb_list = if sh.slice_type == SliceType::B { 2 } else { 1 };

        for list_idx in 0..nb_list {
            let wanted = sh.nb_refs[list_idx].min(HEVC_MAX_REFS);

            // The candidate order is ST_CURR_BEF, ST_CURR_AFT, LT_CURR for
            // L0 and ST_CURR_AFT, ST_CURR_BEF, LT_CURR for L1.
            let cand_lists = if list_idx == 0 {
                [RpsType::StCurrBef, RpsType::StCurrAft, RpsType::LtCurr]
            } else {
                [RpsType::StCurrAft, RpsType::StCurrBef, RpsType::LtCurr]
            };

            // Concatenate the candidate buckets, repeating the whole
            // sequence until the declared count is reached.
            let mut rpl_tmp = RefPicList::default();
            while rpl_tmp.nb_refs() < wanted {
                for (pos, &cand) in cand_lists.iter().enumerate() {
                    for entry in self.rps[cand as usize].entries() {
                        if rpl_tmp.is_full() {
                            break;
                        }
                        rpl_tmp.push(RefPicEntry {
                            poc: entry.poc,
                            slot: entry.slot,
                            is_long_term: pos == 2,
                        });
                    }
                }
                // Construct RefPicList0, RefPicList1 (8-8, 8-10)
                if curr_pic_ref && !rpl_tmp.is_full() {
                    rpl_tmp.push(RefPicEntry {
                        poc: cur_poc,
                        slot: cur,
                        is_long_term: true,
                    });
                }
            }

            let mut rpl = RefPicList::default();
            if sh.rpl_modification_flag[list_idx] {
                // Exactly `wanted` permutation entries are consumed,
                // however the resulting list is used.
                for i in 0..wanted {
                    let entry_idx = sh.list_entry_lx[list_idx]
                        .get(i)
                        .copied()
                        .ok_or_else(|| DpbError::invalid("truncated list_entry_lx"))?
                        as usize;
                    if entry_idx >= rpl_tmp.nb_refs() {
                        error!("invalid reference index");
                        return Err(DpbError::invalid(format!(
                            "list_entry_lx[{list_idx}][{i}] out of range"
                        )));
                    }
                    rpl.push(rpl_tmp.entries()[entry_idx]);
                }
            } else {
                rpl = rpl_tmp.clone();
                rpl.truncate(wanted);
            }

            // 8-9: with self-reference enabled and no modification, the
            // last L0 position always holds the current picture.
            let wanted_l0 = sh.nb_refs[L0].min(HEVC_MAX_REFS);
            if curr_pic_ref
                && !sh.rpl_modification_flag[list_idx]
                && rpl_tmp.nb_refs() > wanted_l0
                && wanted_l0 > 0
            {
                rpl.overwrite(
                    wanted_l0 - 1,
                    RefPicEntry {
                        poc: cur_poc,
                        slot: cur,
                        is_long_term: true,
                    },
                );
            }

            if usize::from(sh.collocated_list) == list_idx
                && sh.collocated_ref_idx < rpl.nb_refs()
            {
                self.collocated_ref = Some(rpl.entries()[sh.collocated_ref_idx].slot);
            }

            let frame = self.layers[self.cur_layer].slot_mut(cur);
            frame.rpl[self.slice_idx][list_idx] = rpl;
        }

        Ok(())
    }

    /// Look up the L0/L1 pair that was active at pixel `(x0, y0)` of a
    /// reference picture, for temporal motion-vector prediction.
    pub fn get_ref_list(
        &self,
        layer: usize,
        slot: usize,
        x0: u32,
        y0: u32,
    ) -> Option<&RefPicListPair> {
        self.layers.get(layer)?.dpb().get(slot)?.ref_list_at(x0, y0)
    }
}
