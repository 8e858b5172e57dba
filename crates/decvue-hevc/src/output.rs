//! Output scheduling: bumping pictures from the DPB to the consumer.

use decvue_core::OutputPicture;
use tracing::debug;

use crate::error::{DpbError, Result};
use crate::frame::FrameFlags;
use crate::DecoderContext;

impl DecoderContext {
    /// Evict output-pending pictures until the DPB satisfies its bounds.
    ///
    /// While more than `max_output` pictures wait for output, or any
    /// picture waits while more than `max_dpb` slots are occupied, the
    /// waiting picture with the smallest POC is pushed to the output FIFO
    /// (or dropped when `discard` is set) and its OUTPUT flag cleared.
    /// Calling with `max_output == 0` drains the layer completely, in
    /// strictly ascending POC order.
    ///
    /// A FIFO failure is propagated, but the evicted picture still counts
    /// as consumed.
    pub fn output_frames(
        &mut self,
        layer_idx: usize,
        max_output: usize,
        max_dpb: usize,
        discard: bool,
    ) -> Result<()> {
        loop {
            let mut nb_output = 0usize;
            let mut nb_dpb = 0usize;
            let mut min_idx = None;
            let mut min_poc = 0i32;

            let layer = self
                .layers
                .get(layer_idx)
                .ok_or_else(|| DpbError::invalid(format!("no such layer {layer_idx}")))?;
            for (i, frame) in layer.dpb().iter().enumerate() {
                if frame.flags().contains(FrameFlags::OUTPUT) {
                    nb_output += 1;
                    if min_idx.is_none() || frame.poc() < min_poc {
                        min_poc = frame.poc();
                        min_idx = Some(i);
                    }
                }
                if !frame.flags().is_empty() {
                    nb_dpb += 1;
                }
            }

            let over_budget = nb_output > max_output || (nb_output > 0 && nb_dpb > max_dpb);
            let Some(min_idx) = min_idx.filter(|_| over_budget) else {
                return Ok(());
            };

            let layer = &mut self.layers[layer_idx];
            let frame = layer.slot_mut(min_idx);
            let poc = frame.poc();
            let write_result = if discard {
                Ok(())
            } else {
                let picture = if frame.needs_fg {
                    frame.frame_grain.clone()
                } else {
                    None
                }
                .or_else(|| frame.buffer.clone());
                match picture {
                    Some(picture) => self
                        .output
                        .write(OutputPicture { poc, picture })
                        .map_err(DpbError::from),
                    None => Ok(()),
                }
            };
            layer.unref_frame(min_idx, FrameFlags::OUTPUT);
            write_result?;

            debug!(
                "{} frame with POC {}",
                if discard { "discarded" } else { "output" },
                poc
            );
        }
    }
}
