//! FIFO between the output scheduler and the downstream consumer.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CoreError, Result};
use crate::picture::PictureBuffer;

/// One picture delivered in output order.
#[derive(Debug, Clone)]
pub struct OutputPicture {
    /// Picture order count of the delivered picture.
    pub poc: i32,
    /// Shared handle to the decoded samples.
    pub picture: Arc<PictureBuffer>,
}

struct FifoState {
    queue: VecDeque<OutputPicture>,
    closed: bool,
}

/// Unbounded FIFO of finished pictures, shared by every layer's scheduler.
#[derive(Clone)]
pub struct OutputFifo {
    state: Arc<Mutex<FifoState>>,
}

impl Default for OutputFifo {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFifo {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FifoState {
                queue: VecDeque::new(),
                closed: false,
            })),
        }
    }

    /// Append a picture. Fails once the consumer has closed the FIFO.
    pub fn write(&self, picture: OutputPicture) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CoreError::FifoClosed);
        }
        state.queue.push_back(picture);
        Ok(())
    }

    /// Take the oldest queued picture, if any.
    pub fn pop(&self) -> Option<OutputPicture> {
        self.state.lock().queue.pop_front()
    }

    /// Number of queued pictures.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Reject all further writes. Queued pictures stay readable.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }
}

impl std::fmt::Debug for OutputFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OutputFifo")
            .field("len", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}
