//! Refcounted pools of fixed-shape, zero-initialized slabs.
//!
//! Per-picture side tables (motion fields, per-CTB indices) churn once per
//! frame; pooling the slabs avoids reallocating them for every picture.
//! A [`PoolSlab`] hands the slab back to the pool on drop, reset to its
//! default-initialized state, so every slab handed out is clean.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CoreError, Result};

struct PoolInner<T> {
    free: Mutex<Vec<Box<[T]>>>,
    slab_len: usize,
    /// Maximum number of slabs allowed out of the pool at once, if bounded.
    max_slabs: Option<usize>,
    in_use: Mutex<usize>,
}

/// A pool of equally sized slabs of `T`.
///
/// Cloning the pool shares it; slabs released through any clone go back to
/// the same free list.
pub struct SlabPool<T: Default> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Default> Clone for SlabPool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default + Clone> SlabPool<T> {
    /// Create an unbounded pool of slabs of `slab_len` elements.
    pub fn new(slab_len: usize) -> Self {
        Self::bounded(slab_len, None)
    }

    /// Create a pool that refuses to hand out more than `max_slabs` slabs.
    pub fn with_capacity(slab_len: usize, max_slabs: usize) -> Self {
        Self::bounded(slab_len, Some(max_slabs))
    }

    fn bounded(slab_len: usize, max_slabs: Option<usize>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                slab_len,
                max_slabs,
                in_use: Mutex::new(0),
            }),
        }
    }

    /// Element count of every slab from this pool.
    pub fn slab_len(&self) -> usize {
        self.inner.slab_len
    }

    /// Take a slab, recycling a previously released one when possible.
    ///
    /// Fresh and recycled slabs alike arrive default-initialized.
    pub fn get(&self) -> Result<PoolSlab<T>> {
        {
            let mut in_use = self.inner.in_use.lock();
            if let Some(max) = self.inner.max_slabs {
                if *in_use >= max {
                    tracing::warn!("slab pool exhausted: {} slabs in use", *in_use);
                    return Err(CoreError::PoolExhausted { in_use: *in_use });
                }
            }
            *in_use += 1;
        }
        let slab = self
            .inner
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| vec![T::default(); self.inner.slab_len].into_boxed_slice());
        Ok(PoolSlab {
            data: Some(slab),
            pool: Arc::clone(&self.inner),
        })
    }
}

/// An exclusive handle to one pooled slab.
pub struct PoolSlab<T: Default> {
    data: Option<Box<[T]>>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Default> Deref for PoolSlab<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl<T: Default> DerefMut for PoolSlab<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.data.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<T: Default> Drop for PoolSlab<T> {
    fn drop(&mut self) {
        if let Some(mut slab) = self.data.take() {
            for elem in slab.iter_mut() {
                *elem = T::default();
            }
            self.pool.free.lock().push(slab);
        }
        let mut in_use = self.pool.in_use.lock();
        *in_use = in_use.saturating_sub(1);
    }
}

impl<T: Default + std::fmt::Debug> std::fmt::Debug for PoolSlab<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolSlab")
            .field("len", &self.deref().len())
            .finish()
    }
}
