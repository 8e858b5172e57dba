//! Raw decoded-picture storage and the allocator seam.
//!
//! A [`PictureBuffer`] owns the planar samples of one decoded picture. The
//! decoder obtains buffers through the [`PictureAllocator`] trait so tests
//! can inject failing allocators and hardware backends can substitute their
//! own surfaces.

use std::any::Any;

use crate::error::{CoreError, Result};

/// Opaque per-picture state owned by a hardware accelerator backend.
pub type HwaccelPrivate = Box<dyn Any + Send>;

/// The slice of sequence-level configuration an allocator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureGeometry {
    /// Picture width in luma samples.
    pub width: u32,
    /// Picture height in luma samples.
    pub height: u32,
    /// Sample bit depth (8..=16).
    pub bit_depth: u8,
    /// log2 of bytes per sample (0 for 8-bit, 1 for higher depths).
    pub pixel_shift: u8,
    /// Number of planes (1 for monochrome, 3 otherwise).
    pub nb_planes: usize,
    /// Horizontal chroma subsampling shift per plane.
    pub hshift: [u8; 3],
    /// Vertical chroma subsampling shift per plane.
    pub vshift: [u8; 3],
}

impl PictureGeometry {
    /// Width of plane `i` in samples.
    pub fn plane_width(&self, i: usize) -> usize {
        (self.width >> self.hshift[i]) as usize
    }

    /// Height of plane `i` in rows.
    pub fn plane_height(&self, i: usize) -> usize {
        (self.height >> self.vshift[i]) as usize
    }

    /// Line size of plane `i` in bytes.
    pub fn plane_linesize(&self, i: usize) -> usize {
        self.plane_width(i) << self.pixel_shift
    }
}

/// Output cropping rectangle, in luma samples from each edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropWindow {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

/// One decoded picture: planar sample storage plus display metadata.
#[derive(Debug, Clone)]
pub struct PictureBuffer {
    geometry: PictureGeometry,
    planes: Vec<Vec<u8>>,
    /// Output cropping copied from the active parameter set.
    pub crop: CropWindow,
    /// Field order from picture-timing information.
    pub top_field_first: bool,
    /// Whether the picture is coded as fields.
    pub interlaced: bool,
}

impl PictureBuffer {
    /// Allocate zeroed planes for the given geometry.
    pub fn new(geometry: PictureGeometry) -> Self {
        let planes = (0..geometry.nb_planes)
            .map(|i| vec![0u8; geometry.plane_linesize(i) * geometry.plane_height(i)])
            .collect();
        Self {
            geometry,
            planes,
            crop: CropWindow::default(),
            top_field_first: false,
            interlaced: false,
        }
    }

    /// Geometry this buffer was allocated with.
    pub fn geometry(&self) -> &PictureGeometry {
        &self.geometry
    }

    /// Number of planes.
    pub fn nb_planes(&self) -> usize {
        self.planes.len()
    }

    /// Sample data of plane `i`.
    pub fn plane(&self, i: usize) -> &[u8] {
        &self.planes[i]
    }

    /// Mutable sample data of plane `i`.
    pub fn plane_mut(&mut self, i: usize) -> &mut [u8] {
        &mut self.planes[i]
    }

    /// Line size of plane `i` in bytes.
    pub fn linesize(&self, i: usize) -> usize {
        self.geometry.plane_linesize(i)
    }

    /// Fill every plane with the mid-gray sample `1 << (bit_depth - 1)`.
    ///
    /// Used to conceal references that were never decoded. At 8-bit this is
    /// a plain byte fill; at higher depths every 16-bit sample position gets
    /// the little-endian mid-gray value.
    pub fn fill_gray(&mut self) {
        let gray = 1u16 << (self.geometry.bit_depth - 1);
        if self.geometry.pixel_shift == 0 {
            for plane in &mut self.planes {
                plane.fill(gray as u8);
            }
        } else {
            let sample = gray.to_le_bytes();
            for plane in &mut self.planes {
                for pos in plane.chunks_exact_mut(2) {
                    pos.copy_from_slice(&sample);
                }
            }
        }
    }
}

/// Source of decoded-picture buffers and accelerator state.
pub trait PictureAllocator {
    /// Obtain a buffer for one picture.
    fn get_buffer(&self, geometry: PictureGeometry) -> Result<PictureBuffer>;

    /// Obtain backend-private per-picture state, if the backend has any.
    fn alloc_private(&self) -> Result<Option<HwaccelPrivate>> {
        Ok(None)
    }

    /// Whether decoding is dispatched to a hardware accelerator.
    ///
    /// When true the decoder does not touch sample memory itself (so
    /// concealment fills are skipped).
    fn is_accelerated(&self) -> bool {
        false
    }
}

/// Default heap-backed allocator.
#[derive(Debug, Default)]
pub struct SystemAllocator;

impl PictureAllocator for SystemAllocator {
    fn get_buffer(&self, geometry: PictureGeometry) -> Result<PictureBuffer> {
        if geometry.width == 0 || geometry.height == 0 {
            return Err(CoreError::alloc(format!(
                "invalid picture dimensions {}x{}",
                geometry.width, geometry.height
            )));
        }
        Ok(PictureBuffer::new(geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry_420_8bit() -> PictureGeometry {
        PictureGeometry {
            width: 64,
            height: 32,
            bit_depth: 8,
            pixel_shift: 0,
            nb_planes: 3,
            hshift: [0, 1, 1],
            vshift: [0, 1, 1],
        }
    }

    #[test]
    fn test_plane_sizes_420() {
        let buf = PictureBuffer::new(geometry_420_8bit());
        assert_eq!(buf.nb_planes(), 3);
        assert_eq!(buf.plane(0).len(), 64 * 32);
        assert_eq!(buf.plane(1).len(), 32 * 16);
        assert_eq!(buf.plane(2).len(), 32 * 16);
        assert_eq!(buf.linesize(0), 64);
        assert_eq!(buf.linesize(1), 32);
    }

    #[test]
    fn test_fill_gray_8bit() {
        let mut buf = PictureBuffer::new(geometry_420_8bit());
        buf.fill_gray();
        assert!(buf.plane(0).iter().all(|&s| s == 128));
        assert!(buf.plane(1).iter().all(|&s| s == 128));
    }

    #[test]
    fn test_fill_gray_10bit() {
        let mut geometry = geometry_420_8bit();
        geometry.bit_depth = 10;
        geometry.pixel_shift = 1;
        let mut buf = PictureBuffer::new(geometry);
        buf.fill_gray();
        let expected = (1u16 << 9).to_le_bytes();
        for pos in buf.plane(0).chunks_exact(2) {
            assert_eq!(pos, expected);
        }
    }

    #[test]
    fn test_system_allocator_rejects_empty_geometry() {
        let mut geometry = geometry_420_8bit();
        geometry.width = 0;
        assert!(SystemAllocator.get_buffer(geometry).is_err());
    }
}
