//! Single-buffer bookkeeping: which side owns the mapped buffer.
//!
//! A V4L2 mmap buffer is shared with the driver. User space may only touch it
//! between a dequeue and the next enqueue; [`FrameBuffer`] tracks that handoff
//! so the session can refuse any call that would break it.

use crate::traits::{CameraError, Result};

/// Metadata the driver reports for a mapped buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Buffer index within the request.
    pub index: u32,
    /// Length of the mapped region in bytes.
    pub length: usize,
}

/// Side of the QBUF/DQBUF handoff currently allowed to touch the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Dequeued: user space may read and write.
    User,
    /// Queued: the driver may fill it at any time.
    Kernel,
}

/// Ownership tracker for the one streaming buffer.
#[derive(Debug)]
pub struct FrameBuffer {
    info: BufferInfo,
    owner: Owner,
    handoffs: u64,
}

impl FrameBuffer {
    /// Track a freshly mapped buffer. It starts on the user side.
    #[must_use]
    pub const fn new(info: BufferInfo) -> Self {
        Self {
            info,
            owner: Owner::User,
            handoffs: 0,
        }
    }

    /// Driver-reported metadata.
    #[must_use]
    pub const fn info(&self) -> &BufferInfo {
        &self.info
    }

    /// Current owner.
    #[must_use]
    pub const fn owner(&self) -> Owner {
        self.owner
    }

    /// Number of completed enqueue/dequeue round trips.
    #[must_use]
    pub const fn handoffs(&self) -> u64 {
        self.handoffs
    }

    /// Whether the buffer may be handed to the driver now.
    pub fn check_enqueue(&self) -> Result<()> {
        if self.owner == Owner::Kernel {
            return Err(CameraError::OwnershipViolation(format!(
                "buffer {} enqueued twice without a dequeue",
                self.info.index
            )));
        }
        Ok(())
    }

    /// User to kernel, once the driver accepted the enqueue.
    pub fn hand_to_kernel(&mut self) -> Result<()> {
        self.check_enqueue()?;
        self.owner = Owner::Kernel;
        Ok(())
    }

    /// Kernel to user, on dequeue of buffer `index`.
    pub fn reclaim(&mut self, index: u32) -> Result<()> {
        if self.owner == Owner::User {
            return Err(CameraError::OwnershipViolation(format!(
                "buffer {index} dequeued without a matching enqueue"
            )));
        }
        if index != self.info.index {
            return Err(CameraError::OwnershipViolation(format!(
                "driver returned buffer {index}, expected {}",
                self.info.index
            )));
        }
        self.owner = Owner::User;
        self.handoffs += 1;
        Ok(())
    }

    /// Streaming was disabled; the driver has released every buffer.
    pub fn reset(&mut self) {
        self.owner = Owner::User;
    }
}
