//! Shared fixtures for camera integration tests.

use std::sync::Arc;

use aperture_graphics::camera::{
    CameraDescriptor, CameraId, CameraState, FrameSettings, PipelineConfig, UpdateContext, XrPass,
};
use aperture_graphics::{DummyRenderTargetBackend, MsaaSamples, RenderTargetSystem};

/// Initialize logging once for the test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Owns everything a pipeline hands to a camera state each render.
pub struct PipelineHarness {
    pub backend: Arc<DummyRenderTargetBackend>,
    pub render_targets: RenderTargetSystem,
    pub xr: XrPass,
    pub frame_settings: FrameSettings,
    pub config: PipelineConfig,
}

impl PipelineHarness {
    pub fn new(config: PipelineConfig) -> Self {
        init_logging();
        let backend = Arc::new(DummyRenderTargetBackend::new());
        Self {
            render_targets: RenderTargetSystem::new(backend.clone()),
            backend,
            xr: XrPass::default(),
            frame_settings: FrameSettings::POSTPROCESS,
            config,
        }
    }

    pub fn camera_state(&self, id: CameraId) -> CameraState {
        CameraState::new(id, 0, self.config, self.backend.clone())
    }

    pub fn update(&mut self, state: &mut CameraState, desc: &CameraDescriptor) {
        let mut ctx = UpdateContext {
            frame_settings: self.frame_settings,
            msaa: MsaaSamples::None,
            xr: &self.xr,
            render_targets: &mut self.render_targets,
            dynamic_resolution_scale: 1.0,
            main_camera_overrides: None,
        };
        state.update(desc, &mut ctx).unwrap();
    }

    pub fn begin_render(&mut self, state: &mut CameraState) {
        state.begin_render(&mut self.render_targets).unwrap();
    }
}

/// 60 degree perspective camera at 1920x1080.
pub fn full_hd_camera(id: u64) -> CameraDescriptor {
    CameraDescriptor::new(CameraId(id), 1920, 1080)
}

pub fn assert_mat_near(a: &aperture_core::math::Mat4, b: &aperture_core::math::Mat4, eps: f32) {
    for r in 0..4 {
        for c in 0..4 {
            assert!(
                (a[(r, c)] - b[(r, c)]).abs() <= eps * (1.0 + b[(r, c)].abs()),
                "element ({r}, {c}): {} != {}",
                a[(r, c)],
                b[(r, c)]
            );
        }
    }
}
