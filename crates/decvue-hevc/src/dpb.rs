//! Per-layer decoded picture buffer.
//!
//! Each scalable/multi-view layer owns a fixed array of frame slots plus
//! the pools its per-picture side tables come from. All slot state changes
//! go through [`FrameSlot::unref`] so a slot can never leak resources.

use std::sync::Arc;

use decvue_core::{PictureAllocator, ProgressHandle, SlabPool};
use tracing::error;

use crate::error::{DpbError, Result};
use crate::frame::{FrameFlags, FrameSlot, MvField, RefPicListPair};
use crate::pps::Pps;
use crate::sei::{PictureStruct, PictureTiming};
use crate::sps::Sps;

/// Compile-time DPB capacity per layer, above any profile's limit.
pub const MAX_DPB_SIZE: usize = 32;

/// One layer's DPB and table pools.
pub struct LayerContext {
    sps: Arc<Sps>,
    pps: Arc<Pps>,
    dpb: Vec<FrameSlot>,
    tab_mvf_pool: SlabPool<MvField>,
    rpl_tab_pool: SlabPool<u16>,
}

impl LayerContext {
    /// Create a layer for the given active parameter sets.
    pub fn new(sps: Arc<Sps>, pps: Arc<Pps>) -> Self {
        let tab_mvf_pool =
            SlabPool::new(sps.min_pu_width() as usize * sps.min_pu_height() as usize);
        let rpl_tab_pool = SlabPool::new(sps.pic_size_in_ctbs());
        Self {
            sps,
            pps,
            dpb: (0..MAX_DPB_SIZE).map(|_| FrameSlot::default()).collect(),
            tab_mvf_pool,
            rpl_tab_pool,
        }
    }

    pub fn sps(&self) -> &Arc<Sps> {
        &self.sps
    }

    pub fn pps(&self) -> &Arc<Pps> {
        &self.pps
    }

    /// The layer's frame slots.
    pub fn dpb(&self) -> &[FrameSlot] {
        &self.dpb
    }

    pub(crate) fn slot_mut(&mut self, idx: usize) -> &mut FrameSlot {
        &mut self.dpb[idx]
    }

    /// Number of occupied slots.
    pub fn nb_occupied(&self) -> usize {
        self.dpb.iter().filter(|f| f.occupied()).count()
    }

    /// Claim the first free slot and acquire every per-slot resource.
    ///
    /// On any failure the slot is fully released again before the error is
    /// returned; no partially initialized slot is ever visible.
    pub(crate) fn alloc_frame(
        &mut self,
        allocator: &dyn PictureAllocator,
        nb_rpl_elems: usize,
        timing: PictureTiming,
    ) -> Result<usize> {
        let Some(idx) = self.dpb.iter().position(|f| f.is_free()) else {
            error!("error allocating frame, DPB full");
            return Err(DpbError::DpbFull);
        };
        match self.init_slot(idx, allocator, nb_rpl_elems, timing) {
            Ok(()) => Ok(idx),
            Err(err) => {
                self.dpb[idx].unref(FrameFlags::ALL);
                Err(err)
            }
        }
    }

    fn init_slot(
        &mut self,
        idx: usize,
        allocator: &dyn PictureAllocator,
        nb_rpl_elems: usize,
        timing: PictureTiming,
    ) -> Result<()> {
        let mut buffer = allocator.get_buffer(self.sps.geometry())?;
        buffer.crop = self.sps.output_window();
        buffer.top_field_first = timing.picture_struct == PictureStruct::TopField;
        buffer.interlaced = matches!(
            timing.picture_struct,
            PictureStruct::TopField | PictureStruct::BottomField
        );

        let ctb_count = self.rpl_tab_pool.slab_len();
        let tab_mvf = self.tab_mvf_pool.get()?;
        // Slabs arrive zeroed, so every per-CTB entry already points at the
        // first list pair.
        let rpl_tab = self.rpl_tab_pool.get()?;
        let hwaccel_priv = allocator.alloc_private()?;

        let frame = &mut self.dpb[idx];
        frame.progress = Some(ProgressHandle::new());
        frame.buffer = Some(Arc::new(buffer));
        frame.rpl = vec![RefPicListPair::default(); nb_rpl_elems];
        frame.tab_mvf = Some(tab_mvf);
        frame.rpl_tab = Some(rpl_tab);
        frame.ctb_count = ctb_count;
        frame.hwaccel_priv = hwaccel_priv;
        frame.pps = Some(Arc::clone(&self.pps));
        Ok(())
    }

    /// Clear `mask` from one slot, releasing it if no flag remains.
    pub fn unref_frame(&mut self, idx: usize, mask: FrameFlags) {
        self.dpb[idx].unref(mask);
    }

    /// Drop the reference classification of every slot. Output-pending
    /// pictures stay alive.
    pub fn clear_refs(&mut self) {
        for frame in &mut self.dpb {
            frame.unref(FrameFlags::SHORT_REF | FrameFlags::LONG_REF);
        }
    }

    /// Forcibly release every slot, as on seek or stream reset.
    pub fn flush(&mut self) {
        for frame in &mut self.dpb {
            frame.unref(FrameFlags::ALL);
        }
    }

    /// Release stale placeholder frames left by the previous picture's
    /// resolver run.
    pub(crate) fn unref_missing_refs(&mut self) {
        for frame in &mut self.dpb {
            if frame.flags().contains(FrameFlags::UNAVAILABLE) {
                frame.unref(FrameFlags::ALL);
            }
        }
    }

    /// Find an occupied slot by POC.
    ///
    /// Without `use_msb` only the POC LSBs are compared, and a slot whose
    /// full POC equals the current picture's is rejected so an LSB
    /// collision can never alias the picture being decoded.
    pub(crate) fn find_ref_idx(&self, poc: i32, use_msb: bool, cur_poc: i32) -> Option<usize> {
        let mask = if use_msb {
            -1
        } else {
            self.sps.max_poc_lsb() as i32 - 1
        };
        self.dpb.iter().position(|f| {
            f.occupied() && (f.poc() & mask) == poc && (use_msb || f.poc() != cur_poc)
        })
    }
}

impl std::fmt::Debug for LayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerContext")
            .field("nb_occupied", &self.nb_occupied())
            .finish()
    }
}
