//! # Aperture Graphics
//!
//! Per-camera render state and temporal history buffers for a real-time
//! renderer.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`camera::CameraStateRegistry`] - Pool of per-camera states owned by the pipeline
//! - [`camera::CameraState`] - View constants, frustum, jitter and history of one camera
//! - [`camera::HistoryBufferSystem`] - N-buffered render targets for temporal effects
//! - [`resources::RenderTargetSystem`] - Render targets sized against a reference resolution
//!
//! ## Example
//!
//! ```ignore
//! use aperture_graphics::camera::{CameraStateRegistry, UpdateContext};
//!
//! let state = registry.get_or_create(camera.id, 0);
//! state.update(&camera, &mut ctx)?;
//! state.begin_render(&mut render_targets)?;
//! // Record passes reading state.main_view(), state.frustum()...
//! registry.clean_unused(cameras.as_slice());
//! ```

pub mod camera;
pub mod error;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use camera::{CameraDescriptor, CameraId, CameraState, CameraStateRegistry, PipelineConfig};
pub use error::GraphicsError;
pub use resources::{DummyRenderTargetBackend, RenderTargetBackend, RenderTargetSystem};
pub use types::{Extent3d, MsaaSamples, TextureFormat, TextureUsage};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    log::info!("Aperture Graphics v{} initialized", VERSION);
}
