//! Reference picture set resolution.
//!
//! Once per picture the resolver reconciles the DPB with the RPS signalled
//! in the slice header: every slot's reference classification is rebuilt
//! from scratch, the five candidate buckets are filled, and references the
//! DPB does not hold are synthesized as gray placeholder frames so
//! decoding can proceed after a random-access entry or a stream error.

use decvue_core::{PictureAllocator, ProgressHandle};
use tracing::error;

use crate::dpb::{LayerContext, MAX_DPB_SIZE};
use crate::error::{DpbError, Result};
use crate::frame::{FrameFlags, RefPicEntry};
use crate::pps::Pps;
use crate::sei::PictureTiming;
use crate::slice::SliceHeader;
use crate::DecoderContext;

/// The five candidate buckets filled by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpsType {
    /// Short-term, used by the current picture, before it in output order.
    StCurrBef = 0,
    /// Short-term, used by the current picture, after it in output order.
    StCurrAft = 1,
    /// Short-term, kept only for pictures following the current one.
    StFoll = 2,
    /// Long-term, used by the current picture.
    LtCurr = 3,
    /// Long-term, kept only for pictures following the current one.
    LtFoll = 4,
}

/// Number of candidate buckets.
pub const NB_RPS_TYPE: usize = 5;

impl DecoderContext {
    /// Reconcile the current layer's DPB with the slice header's RPS.
    ///
    /// On success every frame referenced by a candidate bucket carries
    /// exactly one of SHORT_REF/LONG_REF. On failure the partially filled
    /// buckets are retained, but frames whose flags dropped to empty are
    /// still released.
    pub fn frame_rps(&mut self, sh: &SliceHeader) -> Result<()> {
        let Some(short_rps) = sh.short_term_rps.as_ref() else {
            // IDR-like case: nothing is referenced.
            for bucket in &mut self.rps {
                bucket.clear();
            }
            return Ok(());
        };

        let layer = &mut self.layers[self.cur_layer];
        layer.unref_missing_refs();

        // Clear the reference flags on all frames except the current one.
        for i in 0..MAX_DPB_SIZE {
            if self.cur_frame == Some(i) {
                continue;
            }
            layer.slot_mut(i).mark_ref(FrameFlags::empty());
        }

        for bucket in &mut self.rps {
            bucket.clear();
        }

        let mut result = Ok(());
        'resolve: {
            for i in 0..short_rps.num_delta_pocs() {
                let poc = self.poc + short_rps.delta_poc[i];
                let bucket = if !short_rps.is_used(i) {
                    RpsType::StFoll
                } else if i < short_rps.num_negative_pics {
                    RpsType::StCurrBef
                } else {
                    RpsType::StCurrAft
                };
                if let Err(err) = self.add_candidate_ref(bucket, poc, FrameFlags::SHORT_REF, true) {
                    result = Err(err);
                    break 'resolve;
                }
            }

            let long_rps = &sh.long_term_rps;
            for i in 0..long_rps.nb_refs() {
                let used = long_rps.used.get(i).copied().unwrap_or(false);
                let use_msb = long_rps.poc_msb_present.get(i).copied().unwrap_or(false);
                let bucket = if used { RpsType::LtCurr } else { RpsType::LtFoll };
                if let Err(err) =
                    self.add_candidate_ref(bucket, long_rps.poc[i], FrameFlags::LONG_REF, use_msb)
                {
                    result = Err(err);
                    break 'resolve;
                }
            }
        }

        // Release any frames whose flags just dropped to empty.
        let layer = &mut self.layers[self.cur_layer];
        for i in 0..MAX_DPB_SIZE {
            layer.unref_frame(i, FrameFlags::empty());
        }

        result
    }

    /// Candidate bucket filled by the last [`DecoderContext::frame_rps`].
    pub fn rps_bucket(&self, kind: RpsType) -> &crate::frame::RefPicList {
        &self.rps[kind as usize]
    }

    /// Resolve one RPS entry, add it to `bucket` and classify the frame.
    fn add_candidate_ref(
        &mut self,
        bucket: RpsType,
        poc: i32,
        flag: FrameFlags,
        use_msb: bool,
    ) -> Result<()> {
        if self.rps[bucket as usize].is_full() {
            return Err(DpbError::invalid("too many entries in the RPS"));
        }
        if use_msb && poc == self.poc {
            return Err(DpbError::invalid("RPS references the current picture"));
        }

        let cur_poc = self.poc;
        let nal_type = self.nal_unit_type;
        let layer = &mut self.layers[self.cur_layer];

        let idx = match layer.find_ref_idx(poc, use_msb, cur_poc) {
            Some(idx) => idx,
            None => {
                // References are legitimately absent after a random-access
                // entry; anywhere else it is a stream error, concealed all
                // the same.
                if !nal_type.is_cra() && !nal_type.is_bla() {
                    error!("could not find ref with POC {}", poc);
                }
                generate_missing_ref(
                    layer,
                    self.allocator.as_ref(),
                    self.nb_nals.max(1),
                    self.picture_timing,
                    self.frame_threading,
                    poc,
                )?
            }
        };

        if self.cur_frame == Some(idx) {
            return Err(DpbError::invalid("RPS resolves to the current picture"));
        }

        let frame = layer.slot_mut(idx);
        frame.mark_ref(flag);
        let entry = RefPicEntry {
            poc: frame.poc(),
            slot: idx,
            is_long_term: false,
        };
        self.rps[bucket as usize].push(entry);
        Ok(())
    }
}

/// Synthesize a placeholder for a reference the DPB never held.
///
/// The frame is filled with mid-gray (unless an accelerator owns the
/// samples), flagged UNAVAILABLE, and reports full progress immediately so
/// no frame thread ever waits on it.
pub(crate) fn generate_missing_ref(
    layer: &mut LayerContext,
    allocator: &dyn PictureAllocator,
    nb_rpl_elems: usize,
    timing: PictureTiming,
    frame_threading: bool,
    poc: i32,
) -> Result<usize> {
    let idx = layer.alloc_frame(allocator, nb_rpl_elems, timing)?;
    let frame = layer.slot_mut(idx);

    if !allocator.is_accelerated() {
        if let Some(buffer) = frame.buffer.as_mut().and_then(std::sync::Arc::get_mut) {
            buffer.fill_gray();
        }
    }

    frame.poc = poc;
    frame.flags = FrameFlags::UNAVAILABLE;

    if frame_threading {
        if let Some(progress) = frame.progress.as_ref() {
            progress.report(ProgressHandle::COMPLETE);
        }
    }

    Ok(idx)
}

/// Count the references the current slice will consume, for slice-header
/// validation before any list is built.
pub fn frame_nb_refs(sh: &SliceHeader, pps: &Pps) -> usize {
    let mut nb = 0;
    if let Some(rps) = sh.short_term_rps.as_ref() {
        nb += (0..rps.num_delta_pocs()).filter(|&i| rps.is_used(i)).count();
    }
    nb += sh.long_term_rps.used.iter().filter(|&&used| used).count();
    if pps.pps_curr_pic_ref_enabled_flag {
        nb += 1;
    }
    nb
}
