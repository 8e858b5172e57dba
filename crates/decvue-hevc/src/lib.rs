//! HEVC decoded picture buffer and reference management for decvue.
//!
//! This crate implements the buffer-management half of an HEVC decoder:
//! everything between "a slice header has been parsed" and "a picture
//! reaches the output FIFO". Bitstream parsing, entropy decoding and pixel
//! reconstruction live elsewhere; this crate consumes already-configured
//! parameter sets and slice headers.
//!
//! # Responsibilities
//!
//! - Frame slot allocation and release in a fixed-size per-layer DPB
//! - POC derivation from the slice header's POC LSB
//! - Reference picture set resolution with placeholder synthesis for
//!   missing references
//! - L0/L1 reference list construction, including list modification and
//!   current-picture self-reference
//! - Output scheduling under reorder/occupancy bounds, in POC order
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use decvue_core::SystemAllocator;
//! use decvue_hevc::{DecoderContext, NalUnitType, Pps, SliceHeader, Sps};
//!
//! let sps = Arc::new(sps);
//! let pps = Arc::new(Pps::new(&sps));
//! let mut ctx = DecoderContext::new(sps, pps, Box::new(SystemAllocator));
//!
//! for (header, nal_type) in slices {
//!     ctx.decode_slice(&header, nal_type)?;
//! }
//! ctx.drain(false)?;
//! while let Some(picture) = ctx.output().pop() {
//!     // consume pictures in presentation order
//! }
//! ```

pub mod dpb;
pub mod error;
pub mod frame;
pub mod nal;
pub mod output;
pub mod poc;
pub mod pps;
pub mod rpl;
pub mod rps;
pub mod sei;
pub mod slice;
pub mod sps;

use std::sync::Arc;

use decvue_core::{OutputFifo, PictureAllocator, PictureBuffer};
use tracing::error;

pub use dpb::{LayerContext, MAX_DPB_SIZE};
pub use error::{DpbError, Result};
pub use frame::{
    FrameFlags, FrameSlot, Mv, MvField, RefPicEntry, RefPicList, RefPicListPair, HEVC_MAX_REFS,
    L0, L1,
};
pub use nal::NalUnitType;
pub use poc::PocState;
pub use pps::{Pps, TileConfig};
pub use rps::{frame_nb_refs, RpsType, NB_RPS_TYPE};
pub use sei::{PictureStruct, PictureTiming};
pub use slice::{LongTermRps, ShortTermRps, SliceHeader, SliceType};
pub use sps::{ChromaFormat, Sps};

/// Decoder-side state for buffer and reference management.
///
/// One context owns the DPBs of every scalable/multi-view layer; all
/// layers deliver into the same output FIFO. The per-slice entry point is
/// [`DecoderContext::decode_slice`]; the individual steps it sequences are
/// public for callers that drive them separately.
pub struct DecoderContext {
    pub(crate) layers: Vec<LayerContext>,
    pub(crate) cur_layer: usize,
    pub(crate) output: OutputFifo,
    pub(crate) allocator: Box<dyn PictureAllocator>,
    /// Candidate buckets, indexed by [`RpsType`].
    pub(crate) rps: [RefPicList; NB_RPS_TYPE],
    /// Slot of the picture currently being decoded, in the current layer.
    pub(crate) cur_frame: Option<usize>,
    /// Slot of the collocated picture for temporal MV prediction.
    pub(crate) collocated_ref: Option<usize>,
    /// Full POC of the current picture.
    pub(crate) poc: i32,
    pub(crate) poc_state: PocState,
    pub(crate) nal_unit_type: NalUnitType,
    /// Index of the slice being decoded within the current picture.
    pub(crate) slice_idx: usize,
    /// NAL units queued for the current picture; bounds the slice count.
    pub(crate) nb_nals: usize,
    pub(crate) picture_timing: PictureTiming,
    pub(crate) frame_threading: bool,
    pub(crate) first_picture: bool,
}

impl DecoderContext {
    /// Create a context with a single layer.
    pub fn new(sps: Arc<Sps>, pps: Arc<Pps>, allocator: Box<dyn PictureAllocator>) -> Self {
        Self {
            layers: vec![LayerContext::new(sps, pps)],
            cur_layer: 0,
            output: OutputFifo::new(),
            allocator,
            rps: Default::default(),
            cur_frame: None,
            collocated_ref: None,
            poc: 0,
            poc_state: PocState::new(),
            nal_unit_type: NalUnitType::TrailN,
            slice_idx: 0,
            nb_nals: 1,
            picture_timing: PictureTiming::default(),
            frame_threading: false,
            first_picture: true,
        }
    }

    /// Add an independent layer sharing this context's output FIFO.
    pub fn add_layer(&mut self, sps: Arc<Sps>, pps: Arc<Pps>) -> usize {
        self.layers.push(LayerContext::new(sps, pps));
        self.layers.len() - 1
    }

    /// Switch decoding to another layer.
    pub fn select_layer(&mut self, layer: usize) -> Result<()> {
        if layer >= self.layers.len() {
            return Err(DpbError::invalid(format!("no such layer {layer}")));
        }
        self.cur_layer = layer;
        self.cur_frame = None;
        self.collocated_ref = None;
        Ok(())
    }

    pub fn layers(&self) -> &[LayerContext] {
        &self.layers
    }

    pub fn layer(&self, idx: usize) -> Option<&LayerContext> {
        self.layers.get(idx)
    }

    /// Shared handle to the output FIFO.
    pub fn output(&self) -> OutputFifo {
        self.output.clone()
    }

    /// Full POC of the current picture.
    pub fn poc(&self) -> i32 {
        self.poc
    }

    /// DPB slot of the picture being decoded, if one is admitted.
    pub fn cur_frame(&self) -> Option<usize> {
        self.cur_frame
    }

    /// DPB slot of the collocated reference picked by the last slice.
    pub fn collocated_ref(&self) -> Option<usize> {
        self.collocated_ref
    }

    /// Declare how many NAL units are queued for the next picture. This
    /// bounds the number of slices the picture may contain.
    pub fn set_queued_nal_count(&mut self, nb_nals: usize) {
        self.nb_nals = nb_nals;
    }

    /// Update picture-timing state from SEI, applied to frames allocated
    /// from here on.
    pub fn set_picture_timing(&mut self, timing: PictureTiming) {
        self.picture_timing = timing;
    }

    /// Enable frame-threaded decoding behavior (placeholder frames report
    /// full progress immediately).
    pub fn set_frame_threading(&mut self, enabled: bool) {
        self.frame_threading = enabled;
    }

    /// Derive the current picture's POC from the slice header.
    pub fn compute_poc(&mut self, sh: &SliceHeader, nal_type: NalUnitType) -> i32 {
        self.nal_unit_type = nal_type;
        let sps = Arc::clone(self.layers[self.cur_layer].sps());
        self.poc = self
            .poc_state
            .compute(&sps, sh.slice_pic_order_cnt_lsb, nal_type);
        self.poc
    }

    /// Admit the current picture into the DPB.
    ///
    /// Rejects a POC already present in the layer, claims a slot, and
    /// publishes it as the decoder's current frame with SHORT_REF (plus
    /// OUTPUT when the header requests output).
    pub fn set_new_ref(&mut self, sh: &SliceHeader) -> Result<()> {
        let poc = self.poc;
        let layer = &mut self.layers[self.cur_layer];

        if layer.dpb().iter().any(|f| f.occupied() && f.poc() == poc) {
            error!("duplicate POC in a sequence: {}", poc);
            return Err(DpbError::invalid(format!("duplicate POC {poc} in a sequence")));
        }

        let idx = layer.alloc_frame(
            self.allocator.as_ref(),
            self.nb_nals.max(1),
            self.picture_timing,
        )?;
        let frame = layer.slot_mut(idx);
        frame.poc = poc;
        frame.flags = if sh.pic_output_flag {
            FrameFlags::OUTPUT | FrameFlags::SHORT_REF
        } else {
            FrameFlags::SHORT_REF
        };

        self.cur_frame = Some(idx);
        self.collocated_ref = None;
        Ok(())
    }

    /// Process one parsed slice header.
    ///
    /// On the first slice of a picture this derives the POC, reconciles
    /// the DPB with the declared RPS, admits the new picture and lets the
    /// output scheduler bump pictures that no longer fit. Every slice then
    /// gets its reference lists built.
    pub fn decode_slice(&mut self, sh: &SliceHeader, nal_type: NalUnitType) -> Result<()> {
        self.nal_unit_type = nal_type;

        if sh.first_slice_segment_in_pic_flag {
            self.slice_idx = 0;
            self.compute_poc(sh, nal_type);

            // An IRAP starting a new CVS empties the DPB before the new
            // picture is admitted; prior pictures are delivered unless the
            // header forbids their output.
            let new_cvs = nal_type.is_idr()
                || nal_type.is_bla()
                || (self.first_picture && nal_type.is_irap());
            if new_cvs {
                self.output_frames(self.cur_layer, 0, 0, sh.no_output_of_prior_pics_flag)?;
                if nal_type.is_idr() {
                    self.layers[self.cur_layer].clear_refs();
                }
            }

            self.cur_frame = None;
            self.frame_rps(sh)?;
            self.set_new_ref(sh)?;

            let (max_output, max_dpb) = {
                let sps = self.layers[self.cur_layer].sps();
                (sps.max_num_reorder_pics(), sps.max_dec_pic_buffering())
            };
            self.output_frames(self.cur_layer, max_output, max_dpb, false)?;
            self.first_picture = false;
        } else {
            self.slice_idx += 1;
        }

        self.slice_rpl(sh)
    }

    /// Attach a film-grain overlay to an occupied slot; the scheduler will
    /// deliver it in place of the raw decoded picture.
    pub fn set_film_grain(
        &mut self,
        layer: usize,
        slot: usize,
        grain: Arc<PictureBuffer>,
    ) -> Result<()> {
        let frame = self
            .layers
            .get_mut(layer)
            .ok_or_else(|| DpbError::invalid(format!("no such layer {layer}")))?
            .slot_mut(slot);
        if !frame.occupied() {
            return Err(DpbError::invalid("film grain on a free slot"));
        }
        frame.set_film_grain(grain);
        Ok(())
    }

    /// Drop the reference classification of every slot in one layer.
    pub fn clear_refs(&mut self, layer: usize) -> Result<()> {
        self.layers
            .get_mut(layer)
            .ok_or_else(|| DpbError::invalid(format!("no such layer {layer}")))?
            .clear_refs();
        Ok(())
    }

    /// Clear `mask` from one slot, releasing it once no flag remains.
    pub fn unref_frame(&mut self, layer: usize, slot: usize, mask: FrameFlags) -> Result<()> {
        self.layers
            .get_mut(layer)
            .ok_or_else(|| DpbError::invalid(format!("no such layer {layer}")))?
            .unref_frame(slot, mask);
        Ok(())
    }

    /// Forcibly release every slot of every layer, as on seek.
    pub fn flush_dpb(&mut self) {
        for layer in &mut self.layers {
            layer.flush();
        }
        self.cur_frame = None;
        self.collocated_ref = None;
        self.first_picture = true;
        self.poc_state.reset();
    }

    /// Drain every layer through the output scheduler, delivering (or
    /// discarding) all output-pending pictures in POC order. Used at end
    /// of stream and on seek.
    pub fn drain(&mut self, discard: bool) -> Result<()> {
        for layer_idx in 0..self.layers.len() {
            self.output_frames(layer_idx, 0, 0, discard)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DecoderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderContext")
            .field("nb_layers", &self.layers.len())
            .field("cur_layer", &self.cur_layer)
            .field("poc", &self.poc)
            .field("cur_frame", &self.cur_frame)
            .finish()
    }
}
