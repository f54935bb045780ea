//! Render targets sized relative to a shared reference resolution.
//!
//! Cameras with different viewports share a pool of screen-sized targets.
//! Targets are allocated at the largest resolution seen so far and each frame
//! renders into the top-left `current / max` portion of them. Shaders use
//! [`RenderTargetSystem::rt_handle_scale`] to map viewport UVs into that
//! portion.
//!
//! # Growth
//!
//! The reference size only grows. When a camera requests a larger viewport
//! than any before it, every scaled target is recreated at the new maximum.
//! Shrinking the viewport only changes the scale factors.
//!
//! # Example
//!
//! ```ignore
//! let backend = Arc::new(DummyRenderTargetBackend::new());
//! let mut rts = RenderTargetSystem::new(backend);
//! rts.set_reference_size(1920, 1080, MsaaSamples::None)?;
//!
//! let color = rts.allocate(
//!     RenderTargetDescriptor::scaled(1.0, 1.0, TextureFormat::Rgba16Float).with_label("color"),
//! )?;
//! assert_eq!(rts.extent(color).unwrap().width, 1920);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aperture_core::math::Vec4;

use crate::error::GraphicsError;
use crate::types::{Extent3d, MsaaSamples, TextureFormat, TextureUsage};

/// Stable handle to a render target owned by a [`RenderTargetSystem`].
///
/// Handles stay valid across reference-size growth; the backing GPU
/// resource may change underneath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetHandle(pub u64);

/// Backend-side identifier of an allocated GPU texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuRenderTarget(pub u64);

/// How a render target derives its size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderTargetSize {
    /// Fraction of the reference size, per axis.
    Scaled { x: f32, y: f32 },
    /// Fixed pixel size, unaffected by the reference size.
    Fixed { width: u32, height: u32 },
}

impl RenderTargetSize {
    /// Resolve to pixels against a reference size. Never returns zero.
    pub fn resolve(&self, reference: (u32, u32)) -> (u32, u32) {
        match *self {
            Self::Scaled { x, y } => (
                ((reference.0 as f32 * x).round() as u32).max(1),
                ((reference.1 as f32 * y).round() as u32).max(1),
            ),
            Self::Fixed { width, height } => (width.max(1), height.max(1)),
        }
    }
}

/// Descriptor for allocating a render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Size policy.
    pub size: RenderTargetSize,
    /// Array layers (one per XR view for single-pass stereo).
    pub array_layers: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
    /// Allocate a full mip chain.
    pub mipmapped: bool,
    /// Use the reference MSAA sample count instead of a single sample.
    pub msaa: bool,
}

impl RenderTargetDescriptor {
    /// Descriptor for a target scaled against the reference size.
    pub fn scaled(x: f32, y: f32, format: TextureFormat) -> Self {
        Self {
            label: None,
            size: RenderTargetSize::Scaled { x, y },
            array_layers: 1,
            format,
            usage: TextureUsage::default(),
            mipmapped: false,
            msaa: false,
        }
    }

    /// Descriptor for a fixed-size target.
    pub fn fixed(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            size: RenderTargetSize::Fixed { width, height },
            ..Self::scaled(1.0, 1.0, format)
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the array layer count.
    pub fn with_array_layers(mut self, layers: u32) -> Self {
        self.array_layers = layers.max(1);
        self
    }

    /// Set the usage flags.
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Request a mip chain.
    pub fn with_mipmaps(mut self, mipmapped: bool) -> Self {
        self.mipmapped = mipmapped;
        self
    }

    /// Follow the reference MSAA sample count.
    pub fn with_msaa(mut self, msaa: bool) -> Self {
        self.msaa = msaa;
        self
    }

    /// Returns true if the size follows the reference size.
    pub fn is_scaled(&self) -> bool {
        matches!(self.size, RenderTargetSize::Scaled { .. })
    }
}

/// Fully resolved parameters handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetAllocation<'a> {
    pub descriptor: &'a RenderTargetDescriptor,
    pub extent: Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
}

/// Graphics-layer seam for render target creation.
pub trait RenderTargetBackend: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Create the GPU resource for a render target.
    fn create_render_target(
        &self,
        allocation: &RenderTargetAllocation<'_>,
    ) -> Result<GpuRenderTarget, GraphicsError>;

    /// Destroy a GPU resource previously returned by `create_render_target`.
    fn destroy_render_target(&self, target: GpuRenderTarget);
}

/// Backend that tracks allocations without touching a GPU.
///
/// An optional byte budget makes allocations fail with
/// [`GraphicsError::OutOfMemory`] once exceeded.
#[derive(Debug, Default)]
pub struct DummyRenderTargetBackend {
    next_id: AtomicU64,
    live: AtomicUsize,
    created: AtomicUsize,
    budget: Option<u64>,
    sizes: Mutex<HashMap<u64, u64>>,
}

impl DummyRenderTargetBackend {
    /// Create a new dummy backend with no memory budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dummy backend that fails once `bytes` are in use.
    pub fn with_budget(bytes: u64) -> Self {
        Self {
            budget: Some(bytes),
            ..Self::default()
        }
    }

    /// Number of targets currently alive.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Total number of targets ever created.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> u64 {
        self.sizes
            .lock()
            .map(|sizes| sizes.values().sum())
            .unwrap_or(0)
    }
}

impl RenderTargetBackend for DummyRenderTargetBackend {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn create_render_target(
        &self,
        allocation: &RenderTargetAllocation<'_>,
    ) -> Result<GpuRenderTarget, GraphicsError> {
        let extent = allocation.extent;
        if extent.width == 0 || extent.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "render target dimensions cannot be zero".to_string(),
            ));
        }

        let bytes = extent.texel_count()
            * allocation.descriptor.format.block_size() as u64
            * allocation.sample_count as u64;

        let mut sizes = self
            .sizes
            .lock()
            .map_err(|_| GraphicsError::ResourceCreationFailed("allocation table poisoned".into()))?;
        if let Some(budget) = self.budget {
            let used: u64 = sizes.values().sum();
            if used + bytes > budget {
                return Err(GraphicsError::OutOfMemory);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        sizes.insert(id, bytes);
        self.live.fetch_add(1, Ordering::AcqRel);
        self.created.fetch_add(1, Ordering::AcqRel);

        log::trace!(
            "DummyRenderTargetBackend: creating render target {:?} ({}x{}x{})",
            allocation.descriptor.label,
            extent.width,
            extent.height,
            extent.depth
        );
        Ok(GpuRenderTarget(id))
    }

    fn destroy_render_target(&self, target: GpuRenderTarget) {
        let removed = self
            .sizes
            .lock()
            .map(|mut sizes| sizes.remove(&target.0).is_some())
            .unwrap_or(false);
        if removed {
            self.live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// A live render target and its backing resource.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    descriptor: RenderTargetDescriptor,
    extent: Extent3d,
    mip_level_count: u32,
    gpu: GpuRenderTarget,
}

impl RenderTarget {
    /// The descriptor this target was allocated with.
    pub fn descriptor(&self) -> &RenderTargetDescriptor {
        &self.descriptor
    }

    /// Current allocated size.
    pub fn extent(&self) -> Extent3d {
        self.extent
    }

    /// Number of mip levels.
    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    /// Backing GPU resource.
    pub fn gpu(&self) -> GpuRenderTarget {
        self.gpu
    }
}

/// Pool of render targets sized against a monotonically growing reference size.
pub struct RenderTargetSystem {
    backend: Arc<dyn RenderTargetBackend>,
    targets: HashMap<RenderTargetHandle, RenderTarget>,
    next_handle: u64,
    max_size: (u32, u32),
    current_size: (u32, u32),
    previous_size: (u32, u32),
    msaa_samples: MsaaSamples,
}

static_assertions::assert_impl_all!(RenderTargetSystem: Send, Sync);
static_assertions::assert_impl_all!(DummyRenderTargetBackend: RenderTargetBackend);

impl RenderTargetSystem {
    /// Create an empty system over a backend.
    pub fn new(backend: Arc<dyn RenderTargetBackend>) -> Self {
        Self {
            backend,
            targets: HashMap::new(),
            next_handle: 0,
            max_size: (1, 1),
            current_size: (1, 1),
            previous_size: (1, 1),
            msaa_samples: MsaaSamples::None,
        }
    }

    /// The backend this system allocates through.
    pub fn backend(&self) -> &Arc<dyn RenderTargetBackend> {
        &self.backend
    }

    /// Largest reference size seen so far.
    pub fn max_size(&self) -> (u32, u32) {
        self.max_size
    }

    /// Reference size of the current frame.
    pub fn current_size(&self) -> (u32, u32) {
        self.current_size
    }

    /// Largest MSAA sample count seen so far.
    pub fn msaa_samples(&self) -> MsaaSamples {
        self.msaa_samples
    }

    /// Number of live targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true if no targets are allocated.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Look up a target.
    pub fn get(&self, handle: RenderTargetHandle) -> Option<&RenderTarget> {
        self.targets.get(&handle)
    }

    /// Allocated size of a target.
    pub fn extent(&self, handle: RenderTargetHandle) -> Option<Extent3d> {
        self.targets.get(&handle).map(RenderTarget::extent)
    }

    /// `(current / max, previous / max)` for sampling scaled targets.
    pub fn rt_handle_scale(&self) -> Vec4 {
        let (mw, mh) = (self.max_size.0 as f32, self.max_size.1 as f32);
        Vec4::new(
            self.current_size.0 as f32 / mw,
            self.current_size.1 as f32 / mh,
            self.previous_size.0 as f32 / mw,
            self.previous_size.1 as f32 / mh,
        )
    }

    /// Allocate a render target.
    pub fn allocate(
        &mut self,
        descriptor: RenderTargetDescriptor,
    ) -> Result<RenderTargetHandle, GraphicsError> {
        let (extent, mip_level_count, gpu) = self.create_backing(&descriptor)?;
        let handle = RenderTargetHandle(self.next_handle);
        self.next_handle += 1;
        log::trace!(
            "RenderTargetSystem: allocated {:?} as {:?} ({}x{})",
            descriptor.label,
            handle,
            extent.width,
            extent.height
        );
        self.targets.insert(
            handle,
            RenderTarget {
                descriptor,
                extent,
                mip_level_count,
                gpu,
            },
        );
        Ok(handle)
    }

    /// Release a render target. Returns false if the handle was unknown.
    pub fn release(&mut self, handle: RenderTargetHandle) -> bool {
        match self.targets.remove(&handle) {
            Some(target) => {
                self.backend.destroy_render_target(target.gpu);
                true
            }
            None => false,
        }
    }

    /// Release every target.
    pub fn release_all(&mut self) {
        for (_, target) in self.targets.drain() {
            self.backend.destroy_render_target(target.gpu);
        }
    }

    /// Set the reference size for the coming frame.
    ///
    /// The maximum size and MSAA count grow monotonically. Scaled targets are
    /// recreated when either grows; handles stay the same. If any target
    /// fails to grow the call has no effect: every target keeps its old
    /// backing and the sizes are unchanged.
    pub fn set_reference_size(
        &mut self,
        width: u32,
        height: u32,
        msaa: MsaaSamples,
    ) -> Result<(), GraphicsError> {
        let width = width.max(1);
        let height = height.max(1);
        let new_max = (self.max_size.0.max(width), self.max_size.1.max(height));
        let new_msaa = self.msaa_samples.max(msaa);

        if new_max != self.max_size || new_msaa != self.msaa_samples {
            log::debug!(
                "RenderTargetSystem: reference size grows to {}x{} ({:?})",
                new_max.0,
                new_max.1,
                new_msaa
            );
            self.resize_scaled_targets(new_max, new_msaa)?;
            self.max_size = new_max;
            self.msaa_samples = new_msaa;
        }

        self.previous_size = self.current_size;
        self.current_size = (width, height);
        Ok(())
    }

    fn resize_scaled_targets(
        &mut self,
        max_size: (u32, u32),
        msaa: MsaaSamples,
    ) -> Result<(), GraphicsError> {
        let mut staged = Vec::new();
        for (handle, target) in &self.targets {
            if !(target.descriptor.is_scaled() || target.descriptor.msaa) {
                continue;
            }
            match self.create_backing_at(&target.descriptor, max_size, msaa) {
                Ok(backing) => staged.push((*handle, backing)),
                Err(err) => {
                    log::warn!(
                        "RenderTargetSystem: failed to grow {:?}: {err}",
                        target.descriptor.label
                    );
                    for (_, (_, _, gpu)) in staged {
                        self.backend.destroy_render_target(gpu);
                    }
                    return Err(err);
                }
            }
        }

        for (handle, (extent, mip_level_count, gpu)) in staged {
            if let Some(target) = self.targets.get_mut(&handle) {
                let old = std::mem::replace(&mut target.gpu, gpu);
                target.extent = extent;
                target.mip_level_count = mip_level_count;
                self.backend.destroy_render_target(old);
            }
        }
        Ok(())
    }

    fn create_backing(
        &self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<(Extent3d, u32, GpuRenderTarget), GraphicsError> {
        self.create_backing_at(descriptor, self.max_size, self.msaa_samples)
    }

    fn create_backing_at(
        &self,
        descriptor: &RenderTargetDescriptor,
        max_size: (u32, u32),
        msaa: MsaaSamples,
    ) -> Result<(Extent3d, u32, GpuRenderTarget), GraphicsError> {
        let (width, height) = descriptor.size.resolve(max_size);
        let extent = Extent3d {
            width,
            height,
            depth: descriptor.array_layers.max(1),
        };
        let mip_level_count = if descriptor.mipmapped {
            32 - width.max(height).leading_zeros()
        } else {
            1
        };
        let sample_count = if descriptor.msaa {
            msaa.sample_count()
        } else {
            1
        };
        let allocation = RenderTargetAllocation {
            descriptor,
            extent,
            mip_level_count,
            sample_count,
        };
        let gpu = self.backend.create_render_target(&allocation)?;
        Ok((extent, mip_level_count, gpu))
    }
}

impl Drop for RenderTargetSystem {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for RenderTargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTargetSystem")
            .field("backend", &self.backend.name())
            .field("targets", &self.targets.len())
            .field("max_size", &self.max_size)
            .field("current_size", &self.current_size)
            .field("msaa_samples", &self.msaa_samples)
            .finish()
    }
}
