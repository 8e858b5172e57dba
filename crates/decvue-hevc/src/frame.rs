//! DPB frame slots, reference flags and reference picture lists.

use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use decvue_core::{HwaccelPrivate, PictureBuffer, PoolSlab, ProgressHandle};

use crate::pps::Pps;

/// Maximum number of entries in a reference picture list.
pub const HEVC_MAX_REFS: usize = 16;

/// Reference/output state of a frame slot, kept as a bitset because the
/// resolver mass-clears and re-marks the reference bits while OUTPUT and
/// UNAVAILABLE ride along untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl FrameFlags {
    /// The picture still has to be delivered to the output FIFO.
    pub const OUTPUT: FrameFlags = FrameFlags(1 << 0);
    /// The picture is a short-term reference.
    pub const SHORT_REF: FrameFlags = FrameFlags(1 << 1);
    /// The picture is a long-term reference.
    pub const LONG_REF: FrameFlags = FrameFlags(1 << 2);
    /// Synthetic placeholder for a reference that was never decoded.
    pub const UNAVAILABLE: FrameFlags = FrameFlags(1 << 3);
    /// Every flag at once, for forced release.
    pub const ALL: FrameFlags = FrameFlags(0x0f);

    /// No flags set.
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(&self, other: FrameFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set.
    pub fn intersects(&self, other: FrameFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: FrameFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: FrameFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for FrameFlags {
    type Output = FrameFlags;

    fn bitor(self, rhs: FrameFlags) -> FrameFlags {
        FrameFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: FrameFlags) {
        self.0 |= rhs.0;
    }
}

/// One entry of a reference picture list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefPicEntry {
    /// Full POC of the referenced picture.
    pub poc: i32,
    /// DPB slot index of the referenced picture within its layer.
    pub slot: usize,
    /// Whether the entry is treated as a long-term reference.
    pub is_long_term: bool,
}

/// An ordered reference picture list, at most [`HEVC_MAX_REFS`] entries.
#[derive(Debug, Clone, Default)]
pub struct RefPicList {
    entries: Vec<RefPicEntry>,
}

impl RefPicList {
    /// Number of entries.
    pub fn nb_refs(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= HEVC_MAX_REFS
    }

    /// Append an entry; refused once the list is full.
    pub fn push(&mut self, entry: RefPicEntry) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Replace entry `idx` in place; out-of-range writes are dropped.
    pub(crate) fn overwrite(&mut self, idx: usize, entry: RefPicEntry) {
        if let Some(slot) = self.entries.get_mut(idx) {
            *slot = entry;
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[RefPicEntry] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&RefPicEntry> {
        self.entries.get(idx)
    }
}

/// The L0/L1 pair built for one slice.
pub type RefPicListPair = [RefPicList; 2];

/// Index of list 0 in a [`RefPicListPair`].
pub const L0: usize = 0;
/// Index of list 1 in a [`RefPicListPair`].
pub const L1: usize = 1;

/// One motion vector in quarter-sample units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mv {
    pub x: i16,
    pub y: i16,
}

/// Motion data of one minimum prediction unit, recorded for temporal MV
/// prediction by later pictures.
#[derive(Debug, Clone, Copy, Default)]
pub struct MvField {
    pub mv: [Mv; 2],
    pub ref_idx: [i8; 2],
    pub pred_flag: u8,
}

/// One entry of a layer's decoded picture buffer.
///
/// A slot is free iff it has no flags and its buffer has been released;
/// clearing the last flag through [`FrameSlot::unref`] releases every
/// per-slot resource.
pub struct FrameSlot {
    pub(crate) buffer: Option<Arc<PictureBuffer>>,
    pub(crate) progress: Option<ProgressHandle>,
    pub(crate) poc: i32,
    pub(crate) flags: FrameFlags,
    /// One L0/L1 pair per slice of this picture.
    pub(crate) rpl: Vec<RefPicListPair>,
    /// Per-CTB (tile-scan order) index into `rpl`, recording which slice's
    /// lists were active when the CTB was decoded.
    pub(crate) rpl_tab: Option<PoolSlab<u16>>,
    pub(crate) ctb_count: usize,
    pub(crate) tab_mvf: Option<PoolSlab<MvField>>,
    pub(crate) pps: Option<Arc<Pps>>,
    pub(crate) needs_fg: bool,
    pub(crate) frame_grain: Option<Arc<PictureBuffer>>,
    pub(crate) hwaccel_priv: Option<HwaccelPrivate>,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self {
            buffer: None,
            progress: None,
            poc: 0,
            flags: FrameFlags::empty(),
            rpl: Vec::new(),
            rpl_tab: None,
            ctb_count: 0,
            tab_mvf: None,
            pps: None,
            needs_fg: false,
            frame_grain: None,
            hwaccel_priv: None,
        }
    }
}

impl std::fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("poc", &self.poc)
            .field("flags", &self.flags)
            .field("occupied", &self.buffer.is_some())
            .field("nb_rpl_elems", &self.rpl.len())
            .finish()
    }
}

impl FrameSlot {
    /// Whether the slot holds a decoded picture.
    pub fn occupied(&self) -> bool {
        self.buffer.is_some()
    }

    /// Whether the slot can be handed to a new picture.
    pub fn is_free(&self) -> bool {
        self.buffer.is_none() && self.flags.is_empty()
    }

    /// POC of the held picture; meaningful only while occupied.
    pub fn poc(&self) -> i32 {
        self.poc
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// The decoded picture, while occupied.
    pub fn buffer(&self) -> Option<&Arc<PictureBuffer>> {
        self.buffer.as_ref()
    }

    /// The slot's progress handle, while occupied.
    pub fn progress(&self) -> Option<&ProgressHandle> {
        self.progress.as_ref()
    }

    /// Number of per-slice list pairs allocated for this picture.
    pub fn nb_rpl_elems(&self) -> usize {
        self.rpl.len()
    }

    /// The L0/L1 pair built for slice `slice_idx` of this picture.
    pub fn ref_pic_lists(&self, slice_idx: usize) -> Option<&RefPicListPair> {
        self.rpl.get(slice_idx)
    }

    /// Whether the film-grain overlay should be delivered instead of the
    /// raw picture.
    pub fn needs_film_grain(&self) -> bool {
        self.needs_fg
    }

    /// Attach a film-grain overlay picture, delivered in place of the raw
    /// decoded samples.
    pub fn set_film_grain(&mut self, grain: Arc<PictureBuffer>) {
        self.frame_grain = Some(grain);
        self.needs_fg = true;
    }

    /// Look up the L0/L1 pair that was active at pixel position `(x0, y0)`
    /// when this picture was decoded.
    ///
    /// Used by pictures that take this one as their collocated reference.
    pub fn ref_list_at(&self, x0: u32, y0: u32) -> Option<&RefPicListPair> {
        let pps = self.pps.as_ref()?;
        let x_cb = x0 >> pps.log2_ctb_size();
        let y_cb = y0 >> pps.log2_ctb_size();
        let ctb_addr_rs = (y_cb * pps.ctb_width() + x_cb) as usize;
        let ctb_addr_ts = *pps.ctb_addr_rs_to_ts().get(ctb_addr_rs)? as usize;
        let rpl_idx = *self.rpl_tab.as_ref()?.get(ctb_addr_ts)? as usize;
        self.rpl.get(rpl_idx)
    }

    /// Set the reference class of this frame to exactly `flag`.
    ///
    /// SHORT_REF and LONG_REF never coexist; passing an empty flag clears
    /// both without touching OUTPUT or UNAVAILABLE.
    pub(crate) fn mark_ref(&mut self, flag: FrameFlags) {
        self.flags
            .remove(FrameFlags::SHORT_REF | FrameFlags::LONG_REF);
        self.flags.insert(flag);
    }

    /// Clear `mask` from the slot's flags; releasing every per-slot
    /// resource once no flag remains. This is the sole release path.
    pub(crate) fn unref(&mut self, mask: FrameFlags) {
        self.flags.remove(mask);
        if self.flags.is_empty() {
            self.buffer = None;
            self.progress = None;
            self.frame_grain = None;
            self.needs_fg = false;
            self.pps = None;
            self.tab_mvf = None;
            self.rpl.clear();
            self.rpl_tab = None;
            self.ctb_count = 0;
            self.hwaccel_priv = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_operations() {
        let mut flags = FrameFlags::empty();
        assert!(flags.is_empty());
        flags.insert(FrameFlags::OUTPUT | FrameFlags::SHORT_REF);
        assert!(flags.contains(FrameFlags::OUTPUT));
        assert!(flags.contains(FrameFlags::OUTPUT | FrameFlags::SHORT_REF));
        assert!(!flags.contains(FrameFlags::LONG_REF));
        assert!(flags.intersects(FrameFlags::SHORT_REF | FrameFlags::LONG_REF));
        flags.remove(FrameFlags::OUTPUT);
        assert_eq!(flags, FrameFlags::SHORT_REF);
    }

    #[test]
    fn test_mark_ref_keeps_classes_exclusive() {
        let mut slot = FrameSlot::default();
        slot.flags.insert(FrameFlags::OUTPUT);
        slot.mark_ref(FrameFlags::SHORT_REF);
        assert!(slot.flags().contains(FrameFlags::SHORT_REF));
        slot.mark_ref(FrameFlags::LONG_REF);
        assert!(slot.flags().contains(FrameFlags::LONG_REF));
        assert!(!slot.flags().intersects(FrameFlags::SHORT_REF));
        // OUTPUT rides along untouched.
        assert!(slot.flags().contains(FrameFlags::OUTPUT));
    }

    #[test]
    fn test_ref_pic_list_capacity() {
        let mut list = RefPicList::default();
        for i in 0..HEVC_MAX_REFS {
            assert!(list.push(RefPicEntry {
                poc: i as i32,
                slot: i,
                is_long_term: false,
            }));
        }
        assert!(list.is_full());
        assert!(!list.push(RefPicEntry {
            poc: 99,
            slot: 0,
            is_long_term: false,
        }));
        assert_eq!(list.nb_refs(), HEVC_MAX_REFS);
    }

    #[test]
    fn test_overwrite_ignores_out_of_range() {
        let mut list = RefPicList::default();
        list.push(RefPicEntry {
            poc: 1,
            slot: 0,
            is_long_term: false,
        });
        list.overwrite(
            5,
            RefPicEntry {
                poc: 7,
                slot: 1,
                is_long_term: true,
            },
        );
        assert_eq!(list.nb_refs(), 1);
        assert_eq!(list.get(0).map(|e| e.poc), Some(1));
    }
}
