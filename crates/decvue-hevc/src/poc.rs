//! Picture order count derivation (ITU-T H.265 8.3.1).
//!
//! The slice header only carries the low bits of the POC; the high bits are
//! extended from the most recent anchor picture. IDR pictures restart the
//! count at zero, BLA pictures restart the MSB cycle while keeping their
//! signalled LSB.

use crate::nal::NalUnitType;
use crate::sps::Sps;

/// POC derivation state, one per coded video sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PocState {
    prev_poc_msb: i32,
    prev_poc_lsb: i32,
}

impl PocState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the anchor, as at the start of a coded video sequence.
    pub fn reset(&mut self) {
        self.prev_poc_msb = 0;
        self.prev_poc_lsb = 0;
    }

    /// Derive the full POC of the current picture from its signalled LSB.
    pub fn compute(&mut self, sps: &Sps, poc_lsb: u32, nal_type: NalUnitType) -> i32 {
        if nal_type.is_idr() {
            self.reset();
            return 0;
        }

        let max_poc_lsb = sps.max_poc_lsb() as i32;
        let poc_lsb = poc_lsb as i32;

        let poc_msb = if nal_type.is_bla() {
            0
        } else if poc_lsb < self.prev_poc_lsb && self.prev_poc_lsb - poc_lsb >= max_poc_lsb / 2 {
            self.prev_poc_msb + max_poc_lsb
        } else if poc_lsb > self.prev_poc_lsb && poc_lsb - self.prev_poc_lsb > max_poc_lsb / 2 {
            self.prev_poc_msb - max_poc_lsb
        } else {
            self.prev_poc_msb
        };

        if nal_type.updates_poc_anchor() {
            self.prev_poc_msb = poc_msb;
            self.prev_poc_lsb = poc_lsb;
        }

        poc_msb + poc_lsb
    }
}
