//! N-buffered history render targets keyed by integer id.
//!
//! Temporal effects read last frame's output while writing this frame's. Each
//! id owns a ring of render targets where index 0 is the current frame, index
//! 1 the previous frame and so on. [`HistoryBufferSystem::swap`] rotates every
//! ring once per render.
//!
//! Each camera owns one system, with its own [`RenderTargetSystem`] so the
//! history of one camera is never resized by another camera's viewport.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use aperture_core::math::Vec4;

use crate::error::GraphicsError;
use crate::resources::{RenderTargetBackend, RenderTargetHandle, RenderTargetSystem};
use crate::types::MsaaSamples;

/// Identifier of a history slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistoryId(pub u32);

impl HistoryId {
    /// Mip-chained scene colour used by refraction, distortion, SSR and TAA.
    pub const COLOR_PYRAMID: Self = Self(0);
    /// Reprojected volumetric lighting.
    pub const VOLUMETRIC_LIGHTING: Self = Self(1);
    /// Temporally filtered ambient occlusion.
    pub const AMBIENT_OCCLUSION: Self = Self(2);
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "history#{}", self.0)
    }
}

/// Ring of render targets for one history id.
#[derive(Debug, Clone)]
struct HistorySlot {
    buffers: Vec<RenderTargetHandle>,
}

/// Owns the history rings of one camera.
pub struct HistoryBufferSystem {
    render_targets: RenderTargetSystem,
    slots: HashMap<HistoryId, HistorySlot>,
}

impl HistoryBufferSystem {
    /// Create an empty system allocating through `backend`.
    pub fn new(backend: Arc<dyn RenderTargetBackend>) -> Self {
        Self {
            render_targets: RenderTargetSystem::new(backend),
            slots: HashMap::new(),
        }
    }

    /// The render target pool backing the history rings.
    pub fn render_targets(&self) -> &RenderTargetSystem {
        &self.render_targets
    }

    /// Allocate `count` buffers for `id`, replacing any previous ring.
    ///
    /// `allocator` is called once per buffer with the buffer's index in the
    /// ring. If any call fails the slot is left empty and the error returned.
    /// Returns the current-frame buffer.
    pub fn allocate_slot<F>(
        &mut self,
        id: HistoryId,
        count: usize,
        mut allocator: F,
    ) -> Result<RenderTargetHandle, GraphicsError>
    where
        F: FnMut(&mut RenderTargetSystem, usize) -> Result<RenderTargetHandle, GraphicsError>,
    {
        if count == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "history slot {id} needs at least one buffer"
            )));
        }

        self.release_slot(id);

        let mut buffers = Vec::with_capacity(count);
        for index in 0..count {
            match allocator(&mut self.render_targets, index) {
                Ok(handle) => buffers.push(handle),
                Err(err) => {
                    for handle in buffers {
                        self.render_targets.release(handle);
                    }
                    return Err(err);
                }
            }
        }

        log::debug!("HistoryBufferSystem: allocated {count} buffers for {id}");
        let current = buffers[0];
        self.slots.insert(id, HistorySlot { buffers });
        Ok(current)
    }

    /// The buffer written `frames_ago` renders ago.
    pub fn buffer(
        &self,
        id: HistoryId,
        frames_ago: usize,
    ) -> Result<RenderTargetHandle, GraphicsError> {
        let slot = self.slots.get(&id).ok_or(GraphicsError::InvalidSlot(id))?;
        slot.buffers
            .get(frames_ago)
            .copied()
            .ok_or(GraphicsError::InvalidOffset {
                id,
                frames_ago,
                count: slot.buffers.len(),
            })
    }

    /// The buffer for this render.
    pub fn current(&self, id: HistoryId) -> Result<RenderTargetHandle, GraphicsError> {
        self.buffer(id, 0)
    }

    /// The buffer from the previous render.
    pub fn previous(&self, id: HistoryId) -> Result<RenderTargetHandle, GraphicsError> {
        self.buffer(id, 1)
    }

    /// Number of buffers allocated for `id` (0 when unallocated).
    pub fn buffer_count(&self, id: HistoryId) -> usize {
        self.slots.get(&id).map_or(0, |slot| slot.buffers.len())
    }

    /// Returns true if `id` has buffers.
    pub fn contains(&self, id: HistoryId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Rotate every ring by one so the old current buffer becomes the previous one.
    pub fn swap(&mut self) {
        for slot in self.slots.values_mut() {
            slot.buffers.rotate_right(1);
        }
        log::trace!("HistoryBufferSystem: swapped {} slots", self.slots.len());
    }

    /// Swap rings and set the reference size used for the coming render.
    pub fn swap_and_set_reference_size(
        &mut self,
        width: u32,
        height: u32,
        msaa: MsaaSamples,
    ) -> Result<(), GraphicsError> {
        self.swap();
        self.render_targets.set_reference_size(width, height, msaa)
    }

    /// Scale factors for sampling history buffers (see [`RenderTargetSystem::rt_handle_scale`]).
    pub fn rt_handle_scale(&self) -> Vec4 {
        self.render_targets.rt_handle_scale()
    }

    /// Release the buffers of one slot. Returns false if it was not allocated.
    pub fn release_slot(&mut self, id: HistoryId) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => {
                for handle in slot.buffers {
                    self.render_targets.release(handle);
                }
                log::trace!("HistoryBufferSystem: released {id}");
                true
            }
            None => false,
        }
    }

    /// Release every slot.
    pub fn release_all(&mut self) {
        for (_, slot) in self.slots.drain() {
            for handle in slot.buffers {
                self.render_targets.release(handle);
            }
        }
        self.render_targets.release_all();
    }
}

impl Drop for HistoryBufferSystem {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for HistoryBufferSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut slots: Vec<_> = self
            .slots
            .iter()
            .map(|(id, slot)| (id.0, slot.buffers.len()))
            .collect();
        slots.sort_unstable();
        f.debug_struct("HistoryBufferSystem")
            .field("slots", &slots)
            .field("render_targets", &self.render_targets)
            .finish()
    }
}
