//! Frame slot ring and in-flight tracking.
//!
//! The synchronizer bounds CPU run-ahead to `N` frames. Each slot carries a
//! CPU-waitable completion signal; every presentable image remembers which
//! slot last rendered into it so a second acquisition of the same image waits
//! for that slot before anything is recorded again.
//!
//! # Synchronization Flow
//!
//! ```text
//! 1. begin_frame   wait current slot's completion signal (bounded by a timeout)
//! 2. acquire_image acquire next image (signals image-acquired), then wait the
//!                  slot that last used that image and record the current slot
//! 3. (record)
//! 4. submit        reset completion signal, then submit
//!                  (waits image-acquired, signals rendering-finished + completion)
//! 5. present       gated on rendering-finished
//! 6. advance       current = (current + 1) mod N
//! ```

use std::time::Duration;

use tracing::{debug, info, trace};
use vulkanisch_core::{Error, Result};

use crate::backend::{Acquire, GpuBackend, Present};
use crate::config::FrameConfig;

/// Ring of frame slots plus the per-image in-flight table.
pub struct FrameSynchronizer<B: GpuBackend> {
    slots: Vec<B::Slot>,
    current: usize,
    /// For each presentable image, the slot that last rendered into it.
    images_in_flight: Vec<Option<usize>>,
    slot_wait_timeout: Duration,
    acquire_timeout: Duration,
}

impl<B: GpuBackend> FrameSynchronizer<B> {
    /// Create `config.frames_in_flight` slots for a chain of `image_count` images.
    ///
    /// # Errors
    ///
    /// Slots created before a failure are destroyed before returning.
    pub fn new(backend: &B, config: &FrameConfig, image_count: u32) -> Result<Self> {
        let mut slots = Vec::with_capacity(config.frames_in_flight);
        for i in 0..config.frames_in_flight {
            match backend.create_frame_slot() {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in slots {
                        backend.destroy_frame_slot(slot);
                    }
                    return Err(e);
                }
            }
            debug!("Created frame slot {}", i);
        }

        info!(
            "Frame synchronizer created with {} slots for {} images",
            config.frames_in_flight, image_count
        );

        Ok(Self {
            slots,
            current: 0,
            images_in_flight: vec![None; image_count as usize],
            slot_wait_timeout: config.slot_wait_timeout,
            acquire_timeout: config.acquire_timeout,
        })
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn current_slot(&self) -> &B::Slot {
        &self.slots[self.current]
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Slot that last rendered into `image`, if any.
    pub fn image_owner(&self, image: u32) -> Option<usize> {
        self.images_in_flight.get(image as usize).copied().flatten()
    }

    /// Wait until the current slot's previous submission has retired.
    ///
    /// # Errors
    ///
    /// A timeout is reported as [`Error::DeviceLost`].
    pub fn begin_frame(&self, backend: &B) -> Result<usize> {
        self.wait_slot(backend, self.current)?;
        Ok(self.current)
    }

    fn wait_slot(&self, backend: &B, index: usize) -> Result<()> {
        if backend.wait_frame_slot(&self.slots[index], self.slot_wait_timeout)? {
            Ok(())
        } else {
            Err(Error::DeviceLost(format!(
                "frame slot {} did not complete within {:?}",
                index, self.slot_wait_timeout
            )))
        }
    }

    /// Acquire the next presentable image into the current slot.
    ///
    /// When the image is still owned by another slot, that slot is waited on
    /// first. A stale chain is passed through untouched.
    pub fn acquire_image(&mut self, backend: &B, chain: &B::Chain) -> Result<Acquire> {
        let acquired =
            backend.acquire_next_image(chain, &self.slots[self.current], self.acquire_timeout)?;

        if let Acquire::Acquired { index, suboptimal } = acquired {
            let entry = self
                .images_in_flight
                .get_mut(index as usize)
                .ok_or_else(|| Error::resource(format!("acquired unknown image {index}")))?;

            if let Some(owner) = *entry
                && owner != self.current
            {
                trace!("Image {} still owned by slot {}, waiting", index, owner);
                self.wait_slot(backend, owner)?;
            }
            self.images_in_flight[index as usize] = Some(self.current);

            if suboptimal {
                debug!("Acquired image {} from a suboptimal chain", index);
            }
        }

        Ok(acquired)
    }

    /// Reset the current slot's completion signal, then submit.
    pub fn submit(&self, backend: &B, recorder: B::Recorder) -> Result<()> {
        let slot = &self.slots[self.current];
        backend.reset_frame_slot(slot)?;
        backend.submit(slot, recorder)
    }

    pub fn present(&self, backend: &B, chain: &B::Chain, image: u32) -> Result<Present> {
        backend.present_image(chain, &self.slots[self.current], image)
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    /// Destroy every slot. The caller must have drained the device.
    pub fn destroy(self, backend: &B) {
        for slot in self.slots {
            backend.destroy_frame_slot(slot);
        }
        debug!("Frame slot ring destroyed");
    }
}
