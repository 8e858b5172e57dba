//! decvue-core: shared decoder-side infrastructure.
//!
//! This crate collects the pieces a frame decoder leans on regardless of
//! codec:
//!
//! - Raw picture buffers and the allocator seam ([`picture`])
//! - Refcounted pools of fixed-shape slabs for per-picture tables ([`pool`])
//! - The FIFO that hands finished pictures to the downstream consumer
//!   ([`fifo`])
//! - Progress handles for frame-threaded decoding ([`progress`])
//!
//! Codec crates (e.g. `decvue-hevc`) build their buffer-management logic on
//! top of these types and never touch the heap or a lock directly.

pub mod error;
pub mod fifo;
pub mod picture;
pub mod pool;
pub mod progress;

pub use error::{CoreError, Result};
pub use fifo::{OutputFifo, OutputPicture};
pub use picture::{
    CropWindow, HwaccelPrivate, PictureAllocator, PictureBuffer, PictureGeometry, SystemAllocator,
};
pub use pool::{PoolSlab, SlabPool};
pub use progress::ProgressHandle;
