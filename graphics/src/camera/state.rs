//! Per-camera render state.
//!
//! A [`CameraState`] is refreshed by [`CameraState::update`] every time its
//! camera is about to be rendered and then armed by
//! [`CameraState::begin_render`]. Passes read the resulting snapshot.
//!
//! Previous-frame data must move forward exactly once per render. The state
//! tracks where it is in the cycle ([`TemporalPhase`]): only the first update
//! after creation or after a `begin_render` advances previous-frame state;
//! further updates recompute the current frame and keep the snapshot.

use std::sync::Arc;

use aperture_core::math::{
    Mat4, Vec2, Vec3, Vec4, gpu_projection, mat4_from_translation, mat4_inverse,
};
use aperture_core::profile_function;

use super::capture::CaptureQueue;
use super::descriptor::{
    AntialiasingMode, CameraDescriptor, CameraId, CameraOverrides, CameraType, FrameSettings,
    PipelineConfig, PixelRect, Projection, ResolvedCameraSettings, SmaaQuality, UpdateContext,
    XrPass, XrView,
};
use super::frustum::{
    DepthConvention, FRUSTUM_PLANE_COUNT, Frustum, OrthoExtent, extract_frustum,
};
use super::history::{HistoryBufferSystem, HistoryId};
use super::jitter::{JITTER_SAMPLE_COUNT, JitterSequence, JitterTarget, jitter_projection};
use super::shader_params::{
    GlobalShaderParams, GpuViewConstants, MAX_XR_VIEWS, FrameTiming, ShaderParamSink,
    delta_time_vector, gpu_vec4, time_vectors,
};
use super::view_constants::{
    PixelDirection, PreviousFrameUpdate, ViewConstants, ViewConstantsComputer, ViewInput,
    pixel_coord_to_view_dir_matrix,
};
use crate::error::GraphicsError;
use crate::resources::{
    RenderTargetBackend, RenderTargetDescriptor, RenderTargetHandle, RenderTargetSystem,
};
use crate::types::{MsaaSamples, TextureFormat, TextureUsage};

/// Where a camera state is in its update / render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalPhase {
    /// Created or reset; the next update seeds previous-frame data.
    Created,
    /// Updated since the last render began; further updates keep previous-frame data.
    Advanced,
    /// A render began; the next update advances previous-frame data.
    RenderBegun,
}

/// Render state of one camera (one multi-pass view of it).
pub struct CameraState {
    camera_id: CameraId,
    multipass_index: u32,
    name: String,
    camera_type: CameraType,
    config: PipelineConfig,
    computer: ViewConstantsComputer,
    phase: TemporalPhase,
    is_first_frame: bool,

    main_view: ViewConstants,
    xr_views: Box<[ViewConstants]>,
    xr_enabled: bool,
    xr_single_pass: bool,

    frustum: Frustum,
    frustum_plane_equations: [Vec4; FRUSTUM_PLANE_COUNT],
    depth_convention: DepthConvention,
    z_buffer_params: Vec4,
    projection_params: Vec4,
    ortho_params: Vec4,

    final_viewport: PixelRect,
    non_scaled_size: (u32, u32),
    actual_width: u32,
    actual_height: u32,
    screen_size: Vec4,
    screen_params: Vec4,
    msaa: MsaaSamples,
    frame_settings: FrameSettings,
    projection: Projection,
    renders_to_texture: bool,
    animated_materials: bool,

    antialiasing: AntialiasingMode,
    smaa_quality: SmaaQuality,
    taa_sharpen_strength: f32,
    taa_jitter: Vec4,
    taa_frame_index: u32,

    settings: ResolvedCameraSettings,
    volume_layer_mask: u32,
    volume_anchor: Vec3,

    history: HistoryBufferSystem,
    color_pyramid_buffer_count: usize,
    color_pyramid_history_mip_count: u32,
    volumetric_buffer_count: usize,
    ambient_occlusion_scale: f32,
    pub color_pyramid_history_is_valid: bool,
    pub volumetric_history_is_valid: bool,

    capture: CaptureQueue,
}

static_assertions::assert_impl_all!(CameraState: Send, Sync);

impl CameraState {
    pub fn new(
        camera_id: CameraId,
        multipass_index: u32,
        config: PipelineConfig,
        backend: Arc<dyn RenderTargetBackend>,
    ) -> Self {
        let desc = CameraDescriptor::new(camera_id, 1, 1);
        Self {
            camera_id,
            multipass_index,
            name: desc.name.clone(),
            camera_type: desc.camera_type,
            config,
            computer: ViewConstantsComputer::new(config.clip_space, config.camera_relative),
            phase: TemporalPhase::Created,
            is_first_frame: true,
            main_view: ViewConstants::default(),
            xr_views: vec![ViewConstants::default()].into_boxed_slice(),
            xr_enabled: false,
            xr_single_pass: false,
            frustum: Frustum::default(),
            frustum_plane_equations: [Vec4::zeros(); FRUSTUM_PLANE_COUNT],
            depth_convention: DepthConvention {
                reversed_z: config.clip_space.reversed_z,
                zero_to_one: config.clip_space.zero_to_one,
            },
            z_buffer_params: Vec4::zeros(),
            projection_params: Vec4::zeros(),
            ortho_params: Vec4::zeros(),
            final_viewport: desc.pixel_rect,
            non_scaled_size: (1, 1),
            actual_width: 1,
            actual_height: 1,
            screen_size: Vec4::new(1.0, 1.0, 1.0, 1.0),
            screen_params: Vec4::new(1.0, 1.0, 2.0, 2.0),
            msaa: MsaaSamples::None,
            frame_settings: FrameSettings::default(),
            projection: desc.projection,
            renders_to_texture: false,
            animated_materials: true,
            antialiasing: AntialiasingMode::None,
            smaa_quality: SmaaQuality::default(),
            taa_sharpen_strength: 0.0,
            taa_jitter: Vec4::zeros(),
            taa_frame_index: 0,
            settings: ResolvedCameraSettings::resolve(&desc),
            volume_layer_mask: !0,
            volume_anchor: Vec3::zeros(),
            history: HistoryBufferSystem::new(backend),
            color_pyramid_buffer_count: 0,
            color_pyramid_history_mip_count: 0,
            volumetric_buffer_count: 0,
            ambient_occlusion_scale: 0.0,
            color_pyramid_history_is_valid: false,
            volumetric_history_is_valid: false,
            capture: CaptureQueue::new(),
        }
    }

    /// Refresh the state for the coming render of `desc`.
    pub fn update(
        &mut self,
        desc: &CameraDescriptor,
        ctx: &mut UpdateContext<'_>,
    ) -> Result<(), GraphicsError> {
        profile_function!();

        self.name.clone_from(&desc.name);
        self.camera_type = desc.camera_type;
        self.projection = desc.projection;
        self.renders_to_texture = desc.renders_to_texture;
        self.animated_materials = desc.animated_materials;
        self.settings = ResolvedCameraSettings::resolve(desc);
        self.frame_settings = ctx.frame_settings;
        self.xr_enabled = ctx.xr.enabled;
        self.xr_single_pass = ctx.xr.enabled && ctx.xr.single_pass;

        self.update_antialiasing(desc);
        self.reconcile_history(Self::view_count_of(ctx.xr))?;

        self.final_viewport = if ctx.xr.enabled {
            ctx.xr.viewport
        } else {
            desc.pixel_rect
        };
        let width = (self.final_viewport.width as u32).max(1);
        let height = (self.final_viewport.height as u32).max(1);
        self.non_scaled_size = (width, height);
        (self.actual_width, self.actual_height) = if self.is_main_game_view() {
            let scale = ctx.dynamic_resolution_scale.clamp(0.0, 1.0);
            (
                ((width as f32 * scale).round() as u32).max(1),
                ((height as f32 * scale).round() as u32).max(1),
            )
        } else {
            (width, height)
        };
        self.msaa = ctx.msaa;

        let (w, h) = (self.actual_width as f32, self.actual_height as f32);
        self.screen_size = Vec4::new(w, h, 1.0 / w, 1.0 / h);
        self.screen_params = Vec4::new(w, h, 1.0 + 1.0 / w, 1.0 + 1.0 / h);

        let previous = match self.phase {
            TemporalPhase::Created | TemporalPhase::RenderBegun => PreviousFrameUpdate::Advance {
                first_frame: self.is_first_frame,
            },
            TemporalPhase::Advanced => {
                log::debug!(
                    "CameraState: {} updated again before rendering; keeping previous-frame data",
                    self.name
                );
                PreviousFrameUpdate::Preserve
            }
        };
        let jitter = self.is_taa_enabled();
        self.update_all_view_constants(desc, ctx.xr, previous, jitter);
        self.is_first_frame = false;
        self.phase = TemporalPhase::Advanced;

        self.update_volume_parameters(desc, ctx.main_camera_overrides);

        // Grow pipeline targets to full resolution; begin_render sets the real viewport.
        ctx.render_targets.set_reference_size(width, height, self.msaa)
    }

    /// Prepare for rendering: set reference sizes and rotate history rings.
    pub fn begin_render(
        &mut self,
        render_targets: &mut RenderTargetSystem,
    ) -> Result<(), GraphicsError> {
        profile_function!();

        let (w, h) = (self.actual_width, self.actual_height);
        render_targets.set_reference_size(w, h, self.msaa)?;

        match self.phase {
            TemporalPhase::Advanced => {
                self.history.swap_and_set_reference_size(w, h, self.msaa)?;
                self.refresh_color_pyramid_mip_count();
                self.phase = TemporalPhase::RenderBegun;
            }
            TemporalPhase::RenderBegun => {
                log::warn!(
                    "CameraState: {} began rendering twice without an update; history not swapped",
                    self.name
                );
            }
            TemporalPhase::Created => {
                log::warn!("CameraState: {} began rendering before its first update", self.name);
            }
        }
        Ok(())
    }

    /// Recompute view constants without touching previous-frame data.
    ///
    /// `jitter` reapplies the jitter of the current render.
    pub fn refresh_view_constants(&mut self, desc: &CameraDescriptor, xr: &XrPass, jitter: bool) {
        self.update_all_view_constants(desc, xr, PreviousFrameUpdate::Preserve, jitter);
    }

    /// Forget history so the next update seeds previous-frame data.
    pub fn reset(&mut self) {
        self.is_first_frame = true;
        self.phase = TemporalPhase::Created;
    }

    /// Release every resource held by the state.
    pub fn dispose(&mut self) {
        self.history.release_all();
        self.color_pyramid_buffer_count = 0;
        self.color_pyramid_history_mip_count = 0;
        self.volumetric_buffer_count = 0;
        self.ambient_occlusion_scale = 0.0;
        self.color_pyramid_history_is_valid = false;
        self.volumetric_history_is_valid = false;
        self.capture.clear();
    }

    fn update_antialiasing(&mut self, desc: &CameraDescriptor) {
        self.antialiasing = if !self.frame_settings.contains(FrameSettings::POSTPROCESS)
            || !desc.post_processing
        {
            AntialiasingMode::None
        } else if desc.camera_type == CameraType::SceneView {
            match self.config.scene_view_antialiasing {
                AntialiasingMode::Taa if !desc.animated_materials => AntialiasingMode::None,
                mode => mode,
            }
        } else if let Some(overrides) = &desc.overrides {
            self.smaa_quality = overrides.smaa_quality;
            self.taa_sharpen_strength = overrides.taa_sharpen_strength;
            overrides.antialiasing
        } else {
            AntialiasingMode::None
        };

        if self.antialiasing != AntialiasingMode::Taa {
            self.taa_frame_index = 0;
            self.taa_jitter = Vec4::zeros();
        }
    }

    fn reconcile_history(&mut self, view_count: u32) -> Result<(), GraphicsError> {
        let fs = self.frame_settings;
        let mut color_pyramid = 0;
        if fs.intersects(FrameSettings::ROUGH_REFRACTION | FrameSettings::DISTORTION) {
            color_pyramid = 1;
        }
        if fs.contains(FrameSettings::SSR) || self.antialiasing == AntialiasingMode::Taa {
            color_pyramid = 2;
        }
        let volumetric =
            if fs.contains(FrameSettings::VOLUMETRICS | FrameSettings::REPROJECTION_FOR_VOLUMETRICS) {
                2
            } else {
                0
            };

        if color_pyramid == self.color_pyramid_buffer_count
            && volumetric == self.volumetric_buffer_count
        {
            return Ok(());
        }

        log::debug!(
            "CameraState: {} history demand changed (colour pyramid {} -> {}, volumetric {} -> {})",
            self.name,
            self.color_pyramid_buffer_count,
            color_pyramid,
            self.volumetric_buffer_count,
            volumetric
        );

        // Rings of different ids are rebuilt together.
        self.color_pyramid_history_is_valid = false;
        self.volumetric_history_is_valid = false;
        self.history.release_all();
        self.ambient_occlusion_scale = 0.0;
        self.color_pyramid_buffer_count = 0;
        self.color_pyramid_history_mip_count = 0;
        self.volumetric_buffer_count = 0;

        if color_pyramid > 0 {
            let name = &self.name;
            let format = self.config.history_format;
            self.history
                .allocate_slot(HistoryId::COLOR_PYRAMID, color_pyramid, |rts, index| {
                    rts.allocate(color_pyramid_descriptor(name, index, view_count, format))
                })?;
        }
        if volumetric > 0 {
            let name = &self.name;
            self.history
                .allocate_slot(HistoryId::VOLUMETRIC_LIGHTING, volumetric, |rts, index| {
                    rts.allocate(
                        RenderTargetDescriptor::scaled(1.0, 1.0, TextureFormat::Rgba16Float)
                            .with_label(format!("{name}_VBufferHistory{index}"))
                            .with_array_layers(view_count)
                            .with_usage(TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING),
                    )
                })?;
        }

        self.color_pyramid_buffer_count = color_pyramid;
        self.volumetric_buffer_count = volumetric;
        self.refresh_color_pyramid_mip_count();
        Ok(())
    }

    fn refresh_color_pyramid_mip_count(&mut self) {
        self.color_pyramid_history_mip_count = self
            .history
            .current(HistoryId::COLOR_PYRAMID)
            .ok()
            .and_then(|handle| self.history.render_targets().get(handle))
            .map_or(0, |target| target.mip_level_count());
    }

    fn update_all_view_constants(
        &mut self,
        desc: &CameraDescriptor,
        xr: &XrPass,
        previous: PreviousFrameUpdate,
        jitter: bool,
    ) {
        profile_function!();

        let view_count = Self::view_count_of(xr) as usize;
        let mut xr_previous = previous;
        if self.xr_views.len() != view_count {
            self.xr_views = vec![ViewConstants::default(); view_count].into_boxed_slice();
            // New views have no history of their own, even within one render.
            xr_previous = PreviousFrameUpdate::Advance { first_frame: true };
        }

        let (nw, nh) = self.non_scaled_size;
        let aspect = nw as f32 / nh as f32;
        let mut input = ViewInput {
            projection: desc.projection.matrix(aspect),
            jittered_projection: None,
            view: desc.transform.view_matrix(),
            camera_position: desc.transform.position,
        };
        if let Some(view) = self.xr_main_view(xr) {
            input.projection = view.projection;
            input.view = view.view;
            input.camera_position = view.position();
        }

        if jitter {
            input.jittered_projection = self.jittered_projection(&input.projection, xr, previous);
        }

        let pixel_direction = match desc.projection {
            Projection::Perspective {
                vertical_fov,
                lens_shift,
                ..
            } if !xr.enabled => PixelDirection::Perspective {
                vertical_fov,
                lens_shift,
            },
            _ => PixelDirection::Generic,
        };

        self.computer.compute(
            &mut self.main_view,
            &input,
            previous,
            pixel_direction,
            self.screen_size,
        );

        if self.xr_single_pass {
            let main_position = self.main_view.world_space_camera_pos;
            for (constants, view) in self.xr_views.iter_mut().zip(&xr.views) {
                let view_input = ViewInput {
                    projection: view.projection,
                    jittered_projection: None,
                    view: view.view,
                    camera_position: view.position(),
                };
                self.computer.compute(
                    constants,
                    &view_input,
                    xr_previous,
                    PixelDirection::Generic,
                    self.screen_size,
                );
                constants.world_space_camera_pos_view_offset =
                    constants.world_space_camera_pos - main_position;
            }
        } else if let Some(first) = self.xr_views.first_mut() {
            // Compute passes always read the per-view array.
            *first = self.main_view;
        }

        self.update_frustum(desc, xr);
    }

    fn jittered_projection(
        &mut self,
        projection: &Mat4,
        xr: &XrPass,
        previous: PreviousFrameUpdate,
    ) -> Option<Mat4> {
        // Head tracking already provides sub-pixel variation.
        if xr.enabled {
            self.taa_jitter = Vec4::zeros();
            return None;
        }

        let (w, h) = (self.actual_width as f32, self.actual_height as f32);
        let offset = match previous {
            PreviousFrameUpdate::Advance { .. } => {
                let offset = JitterSequence::centered_offset(self.taa_frame_index);
                self.taa_jitter = Vec4::new(offset.x, offset.y, offset.x / w, offset.y / h);
                self.taa_frame_index = (self.taa_frame_index + 1) % JITTER_SAMPLE_COUNT;
                offset
            }
            PreviousFrameUpdate::Preserve => Vec2::new(self.taa_jitter.x, self.taa_jitter.y),
        };

        let target = match self.projection {
            Projection::Perspective { .. } => JitterTarget::Perspective,
            Projection::Orthographic { size, near, far } => JitterTarget::Orthographic {
                size,
                aspect: self.non_scaled_size.0 as f32 / self.non_scaled_size.1 as f32,
                near,
                far,
            },
        };
        Some(jitter_projection(projection, offset, target, w, h))
    }

    fn update_frustum(&mut self, desc: &CameraDescriptor, xr: &XrPass) {
        let (mut proj, mut inv_proj, mut view_proj) = (
            self.main_view.proj,
            self.main_view.inv_proj,
            self.main_view.view_proj,
        );

        if let (true, Some(culling_proj), Some(culling_view)) =
            (xr.enabled, xr.culling_projection, xr.culling_view)
        {
            let view = if self.config.camera_relative {
                culling_view * mat4_from_translation(desc.transform.position)
            } else {
                culling_view
            };
            proj = gpu_projection(&culling_proj, self.config.clip_space);
            inv_proj = mat4_inverse(&proj);
            view_proj = proj * view;
        }

        let ortho = match desc.projection {
            Projection::Orthographic { size, .. } => Some(OrthoExtent {
                size,
                aspect: self.non_scaled_size.0 as f32 / self.non_scaled_size.1 as f32,
            }),
            Projection::Perspective { .. } => None,
        };

        let extraction = extract_frustum(
            &proj,
            &inv_proj,
            &view_proj,
            desc.projection.near(),
            desc.projection.far(),
            ortho,
        );
        self.frustum = extraction.frustum;
        self.frustum_plane_equations = extraction.frustum.plane_equations();
        self.depth_convention = extraction.convention;
        self.z_buffer_params = extraction.z_buffer_params;
        self.projection_params = extraction.projection_params;
        self.ortho_params = extraction.ortho_params;
    }

    fn update_volume_parameters(
        &mut self,
        desc: &CameraDescriptor,
        main_camera_overrides: Option<&CameraOverrides>,
    ) {
        let mut anchor = None;
        self.volume_layer_mask = !0;

        if let Some(overrides) = &desc.overrides {
            self.volume_layer_mask = overrides.volume_layer_mask;
            anchor = overrides.volume_anchor_override;
        } else if desc.camera_type == CameraType::SceneView {
            if let Some(main) = main_camera_overrides {
                self.volume_layer_mask = main.volume_layer_mask;
                anchor = main.volume_anchor_override;
            } else {
                let sky_mask = self.config.sky_lighting_override_mask;
                // Layer 31 is reserved for previews.
                self.volume_layer_mask = if sky_mask == u32::MAX {
                    u32::MAX
                } else {
                    !(sky_mask | (1 << 31))
                };
            }
        }

        self.volume_anchor = anchor.unwrap_or(desc.transform.position);
    }

    /// Views rendered by this state. Multi-pass XR renders one view per
    /// `multipass_index`, so only single-pass XR has more than one.
    fn view_count_of(xr: &XrPass) -> u32 {
        if xr.enabled && xr.single_pass {
            (xr.view_count() as u32).max(1)
        } else {
            1
        }
    }

    /// The XR view that replaces the camera's own pose, if any.
    fn xr_main_view<'x>(&self, xr: &'x XrPass) -> Option<&'x XrView> {
        if !xr.enabled {
            None
        } else if xr.single_pass {
            match xr.views.as_slice() {
                [only] => Some(only),
                _ => None,
            }
        } else {
            xr.views
                .get(self.multipass_index as usize)
                .or_else(|| xr.views.first())
        }
    }

    /// Allocate the ambient occlusion history at `scale` of the reference size.
    ///
    /// Reallocates only when the scale changed or the history is missing.
    pub fn allocate_ambient_occlusion_history(
        &mut self,
        scale: f32,
    ) -> Result<RenderTargetHandle, GraphicsError> {
        if scale == self.ambient_occlusion_scale {
            if let Ok(current) = self.history.current(HistoryId::AMBIENT_OCCLUSION) {
                return Ok(current);
            }
        }

        self.history.release_slot(HistoryId::AMBIENT_OCCLUSION);
        let layers = self.view_count();
        let current = self
            .history
            .allocate_slot(HistoryId::AMBIENT_OCCLUSION, 2, |rts, index| {
                rts.allocate(
                    RenderTargetDescriptor::scaled(scale, scale, TextureFormat::R32Uint)
                        .with_label(format!("AO Packed history_{index}"))
                        .with_array_layers(layers)
                        .with_usage(TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING),
                )
            })?;
        self.ambient_occlusion_scale = scale;
        Ok(current)
    }

    /// Allocate `count` history buffers for `id` and return the current one.
    ///
    /// `allocator` gets the camera name, the buffer index and the camera's
    /// history render targets.
    pub fn alloc_history_frame_rt<F>(
        &mut self,
        id: HistoryId,
        count: usize,
        mut allocator: F,
    ) -> Result<RenderTargetHandle, GraphicsError>
    where
        F: FnMut(&str, usize, &mut RenderTargetSystem) -> Result<RenderTargetHandle, GraphicsError>,
    {
        let name = &self.name;
        let current = self
            .history
            .allocate_slot(id, count, |rts, index| allocator(name, index, rts))?;
        self.refresh_color_pyramid_mip_count();
        Ok(current)
    }

    pub fn current_frame_rt(&self, id: HistoryId) -> Result<RenderTargetHandle, GraphicsError> {
        self.history.current(id)
    }

    pub fn previous_frame_rt(&self, id: HistoryId) -> Result<RenderTargetHandle, GraphicsError> {
        self.history.previous(id)
    }

    pub fn release_history_frame_rt(&mut self, id: HistoryId) -> bool {
        if id == HistoryId::AMBIENT_OCCLUSION {
            self.ambient_occlusion_scale = 0.0;
        }
        let released = self.history.release_slot(id);
        self.refresh_color_pyramid_mip_count();
        released
    }

    /// Pixel-to-view-direction matrices for `resolution`, one per view.
    pub fn pixel_coord_to_view_dir_ws_for(&self, resolution: Vec4) -> Vec<Mat4> {
        let flip_y = self.config.clip_space.flip_y;
        let main_direction = match self.projection {
            Projection::Perspective {
                vertical_fov,
                lens_shift,
                ..
            } if !self.xr_enabled => PixelDirection::Perspective {
                vertical_fov,
                lens_shift,
            },
            _ => PixelDirection::Generic,
        };
        if self.xr_single_pass {
            self.xr_views
                .iter()
                .map(|c| pixel_coord_to_view_dir_matrix(c, PixelDirection::Generic, resolution, flip_y))
                .collect()
        } else {
            vec![pixel_coord_to_view_dir_matrix(
                &self.main_view,
                main_direction,
                resolution,
                flip_y,
            )]
        }
    }

    /// Run pending capture actions on the camera's final colour.
    pub fn execute_capture_actions(
        &mut self,
        source: RenderTargetHandle,
        render_targets: &mut RenderTargetSystem,
    ) -> Result<usize, GraphicsError> {
        self.capture
            .execute(source, render_targets, self.actual_width, self.actual_height)
    }

    /// Build the shader parameter block for this render.
    pub fn global_params(
        &self,
        timing: &FrameTiming,
        render_targets: &RenderTargetSystem,
    ) -> GlobalShaderParams {
        let taa_enabled = self.is_taa_enabled() && self.camera_type == CameraType::Game;

        // Previews always animate.
        let animate = self.animated_materials || self.camera_type == CameraType::Preview;
        let ct = if animate { timing.time } else { 0.0 };
        let pt = if animate { timing.last_time } else { 0.0 };
        let current = time_vectors(ct);
        let last = time_vectors(pt);

        let mut frustum_planes = [[0.0; 4]; FRUSTUM_PLANE_COUNT];
        for (dst, plane) in frustum_planes.iter_mut().zip(&self.frustum_plane_equations) {
            *dst = gpu_vec4(*plane);
        }

        let view_count = self.view_count();
        let mut xr_views = [GpuViewConstants::from(&ViewConstants::default()); MAX_XR_VIEWS];
        for (dst, src) in xr_views.iter_mut().zip(self.xr_views.iter()) {
            *dst = GpuViewConstants::from(src);
        }

        GlobalShaderParams {
            main: GpuViewConstants::from(&self.main_view),
            screen_size: gpu_vec4(self.screen_size),
            rt_handle_scale: gpu_vec4(render_targets.rt_handle_scale()),
            rt_handle_scale_history: gpu_vec4(self.history.rt_handle_scale()),
            z_buffer_params: gpu_vec4(self.z_buffer_params),
            projection_params: gpu_vec4(self.projection_params),
            ortho_params: gpu_vec4(self.ortho_params),
            screen_params: gpu_vec4(self.screen_params),
            taa_frame_info: [
                self.taa_sharpen_strength,
                0.0,
                self.taa_frame_index as f32,
                if taa_enabled { 1.0 } else { 0.0 },
            ],
            taa_jitter_strength: gpu_vec4(self.taa_jitter),
            frustum_planes,
            time: current.time,
            sin_time: current.sin_time,
            cos_time: current.cos_time,
            delta_time: delta_time_vector(timing),
            time_parameters: current.time_parameters,
            last_time_parameters: last.time_parameters,
            frame_count: timing.frame_count,
            probe_exposure_scale: 1.0 / self.settings.probe_range_compression_factor.max(1e-6),
            xr_view_count: view_count,
            _padding: 0,
            xr_views,
        }
    }

    /// Publish [`Self::global_params`] through `sink` in one write.
    pub fn setup_global_params(
        &self,
        sink: &mut dyn ShaderParamSink,
        timing: &FrameTiming,
        render_targets: &RenderTargetSystem,
    ) {
        sink.write_global_params(&self.global_params(timing, render_targets));
    }

    // ===== Accessors =====

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn multipass_index(&self) -> u32 {
        self.multipass_index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn camera_type(&self) -> CameraType {
        self.camera_type
    }

    pub fn phase(&self) -> TemporalPhase {
        self.phase
    }

    pub fn is_first_frame(&self) -> bool {
        self.is_first_frame
    }

    pub fn main_view(&self) -> &ViewConstants {
        &self.main_view
    }

    /// Per-view constants; length is [`Self::view_count`].
    pub fn xr_views(&self) -> &[ViewConstants] {
        &self.xr_views
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Left, right, top, bottom, near, far.
    pub fn frustum_plane_equations(&self) -> &[Vec4; FRUSTUM_PLANE_COUNT] {
        &self.frustum_plane_equations
    }

    pub fn depth_convention(&self) -> DepthConvention {
        self.depth_convention
    }

    pub fn z_buffer_params(&self) -> Vec4 {
        self.z_buffer_params
    }

    pub fn projection_params(&self) -> Vec4 {
        self.projection_params
    }

    pub fn ortho_params(&self) -> Vec4 {
        self.ortho_params
    }

    pub fn screen_size(&self) -> Vec4 {
        self.screen_size
    }

    pub fn screen_params(&self) -> Vec4 {
        self.screen_params
    }

    /// Viewport at full resolution, before dynamic scaling.
    pub fn final_viewport(&self) -> PixelRect {
        self.final_viewport
    }

    pub fn actual_width(&self) -> u32 {
        self.actual_width
    }

    pub fn actual_height(&self) -> u32 {
        self.actual_height
    }

    pub fn msaa_samples(&self) -> MsaaSamples {
        self.msaa
    }

    pub fn frame_settings(&self) -> FrameSettings {
        self.frame_settings
    }

    pub fn antialiasing(&self) -> AntialiasingMode {
        self.antialiasing
    }

    pub fn smaa_quality(&self) -> SmaaQuality {
        self.smaa_quality
    }

    pub fn taa_sharpen_strength(&self) -> f32 {
        self.taa_sharpen_strength
    }

    /// `(x, y, x / width, y / height)` of the current jitter in pixels.
    pub fn taa_jitter(&self) -> Vec4 {
        self.taa_jitter
    }

    pub fn taa_frame_index(&self) -> u32 {
        self.taa_frame_index
    }

    pub fn is_taa_enabled(&self) -> bool {
        self.antialiasing == AntialiasingMode::Taa
    }

    pub fn settings(&self) -> &ResolvedCameraSettings {
        &self.settings
    }

    pub fn volume_layer_mask(&self) -> u32 {
        self.volume_layer_mask
    }

    pub fn volume_anchor(&self) -> Vec3 {
        self.volume_anchor
    }

    pub fn history(&self) -> &HistoryBufferSystem {
        &self.history
    }

    /// Mip levels of the colour pyramid history; zero when it is not allocated.
    pub fn color_pyramid_history_mip_count(&self) -> u32 {
        self.color_pyramid_history_mip_count
    }

    pub fn color_pyramid_buffer_count(&self) -> usize {
        self.color_pyramid_buffer_count
    }

    pub fn volumetric_buffer_count(&self) -> usize {
        self.volumetric_buffer_count
    }

    pub fn capture_queue_mut(&mut self) -> &mut CaptureQueue {
        &mut self.capture
    }

    /// Depth linearization terms for oblique projections.
    ///
    /// Ref: An Efficient Depth Linearization Method for Oblique View Frustums, Eq. 6.
    pub fn inv_proj_param(&self) -> Vec4 {
        let p = &self.main_view.proj;
        Vec4::new(
            p[(2, 0)] / (p[(0, 0)] * p[(2, 3)]),
            p[(2, 1)] / (p[(1, 1)] * p[(2, 3)]),
            -1.0 / p[(2, 3)],
            (-p[(2, 2)] + p[(2, 0)] * p[(0, 2)] / p[(0, 0)] + p[(2, 1)] * p[(1, 2)] / p[(1, 1)])
                / p[(2, 3)],
        )
    }

    /// Identifier shared by every multi-pass view of the camera.
    pub fn view_id(&self) -> u64 {
        self.camera_id.0.wrapping_add((1 << 31) + 1)
    }

    pub fn is_main_game_view(&self) -> bool {
        self.camera_type == CameraType::Game && !self.renders_to_texture
    }

    /// Views rendered at once (1 without XR).
    pub fn view_count(&self) -> u32 {
        self.xr_views.len() as u32
    }
}

fn color_pyramid_descriptor(
    camera_name: &str,
    index: usize,
    view_count: u32,
    format: TextureFormat,
) -> RenderTargetDescriptor {
    RenderTargetDescriptor::scaled(1.0, 1.0, format)
        .with_label(format!("{camera_name}_CameraColorBufferMipChain{}", index & 1))
        .with_array_layers(view_count)
        .with_usage(
            TextureUsage::TEXTURE_BINDING
                | TextureUsage::STORAGE_BINDING
                | TextureUsage::RENDER_ATTACHMENT,
        )
        .with_mipmaps(true)
}

impl std::fmt::Debug for CameraState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraState")
            .field("camera_id", &self.camera_id)
            .field("multipass_index", &self.multipass_index)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("actual_size", &(self.actual_width, self.actual_height))
            .field("antialiasing", &self.antialiasing)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::descriptor::CameraTransform;
    use crate::resources::DummyRenderTargetBackend;
    use aperture_core::math::{Quat, view_from_pose};

    struct Fixture {
        backend: Arc<DummyRenderTargetBackend>,
        pipeline_targets: RenderTargetSystem,
        xr: XrPass,
        frame_settings: FrameSettings,
    }

    impl Fixture {
        fn new() -> Self {
            let backend = Arc::new(DummyRenderTargetBackend::new());
            Self {
                pipeline_targets: RenderTargetSystem::new(backend.clone()),
                backend,
                xr: XrPass::default(),
                frame_settings: FrameSettings::POSTPROCESS,
            }
        }

        fn state(&self) -> CameraState {
            CameraState::new(CameraId(1), 0, PipelineConfig::default(), self.backend.clone())
        }

        fn update(&mut self, state: &mut CameraState, desc: &CameraDescriptor) {
            let mut ctx = UpdateContext {
                frame_settings: self.frame_settings,
                msaa: MsaaSamples::None,
                xr: &self.xr,
                render_targets: &mut self.pipeline_targets,
                dynamic_resolution_scale: 1.0,
                main_camera_overrides: None,
            };
            state.update(desc, &mut ctx).unwrap();
        }
    }

    fn taa_camera() -> CameraDescriptor {
        CameraDescriptor::new(CameraId(1), 1920, 1080).with_overrides(CameraOverrides {
            antialiasing: AntialiasingMode::Taa,
            taa_sharpen_strength: 0.8,
            ..Default::default()
        })
    }

    #[test]
    fn antialiasing_requires_post_processing() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let desc = taa_camera();
        fx.update(&mut state, &desc);
        assert_eq!(state.antialiasing(), AntialiasingMode::Taa);
        assert_eq!(state.taa_sharpen_strength(), 0.8);

        fx.frame_settings = FrameSettings::empty();
        fx.update(&mut state, &desc);
        assert_eq!(state.antialiasing(), AntialiasingMode::None);
        assert_eq!(state.taa_jitter(), Vec4::zeros());
        assert_eq!(state.taa_frame_index(), 0);
    }

    #[test]
    fn scene_view_drops_taa_without_animated_materials() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let mut desc = CameraDescriptor::new(CameraId(1), 640, 480).with_type(CameraType::SceneView);
        fx.update(&mut state, &desc);
        assert_eq!(state.antialiasing(), AntialiasingMode::Taa);

        desc.animated_materials = false;
        fx.update(&mut state, &desc);
        assert_eq!(state.antialiasing(), AntialiasingMode::None);
    }

    #[test]
    fn camera_without_overrides_has_no_antialiasing() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &CameraDescriptor::new(CameraId(1), 640, 480));
        assert_eq!(state.antialiasing(), AntialiasingMode::None);
        assert_eq!(state.color_pyramid_buffer_count(), 0);
    }

    #[test]
    fn history_demand_follows_frame_settings() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let desc = CameraDescriptor::new(CameraId(1), 640, 480);

        fx.frame_settings = FrameSettings::POSTPROCESS | FrameSettings::DISTORTION;
        fx.update(&mut state, &desc);
        assert_eq!(state.history().buffer_count(HistoryId::COLOR_PYRAMID), 1);

        fx.frame_settings |= FrameSettings::SSR
            | FrameSettings::VOLUMETRICS
            | FrameSettings::REPROJECTION_FOR_VOLUMETRICS;
        state.color_pyramid_history_is_valid = true;
        fx.update(&mut state, &desc);
        assert_eq!(state.history().buffer_count(HistoryId::COLOR_PYRAMID), 2);
        assert_eq!(state.history().buffer_count(HistoryId::VOLUMETRIC_LIGHTING), 2);
        assert!(!state.color_pyramid_history_is_valid);
        assert_eq!(fx.backend.live_count(), 4);

        fx.frame_settings = FrameSettings::POSTPROCESS;
        fx.update(&mut state, &desc);
        assert!(!state.history().contains(HistoryId::COLOR_PYRAMID));
        assert_eq!(fx.backend.live_count(), 0);
    }

    #[test]
    fn taa_demands_two_color_pyramid_buffers() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &taa_camera());
        assert_eq!(state.color_pyramid_buffer_count(), 2);
        let current = state.current_frame_rt(HistoryId::COLOR_PYRAMID).unwrap();
        let target = state.history().render_targets().get(current).unwrap();
        assert!(target.descriptor().mipmapped);
        assert_eq!(target.descriptor().format, PipelineConfig::default().history_format);
    }

    #[test]
    fn jitter_advances_once_per_render() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let desc = taa_camera();

        fx.update(&mut state, &desc);
        assert_eq!(state.taa_frame_index(), 1);
        let first = state.taa_jitter();
        assert_eq!(first.x, JitterSequence::centered_offset(0).x);
        assert!((first.z - first.x / 1920.0).abs() < 1e-9);

        fx.update(&mut state, &desc);
        assert_eq!(state.taa_frame_index(), 1);
        assert_eq!(state.taa_jitter(), first);

        state.begin_render(&mut fx.pipeline_targets).unwrap();
        fx.update(&mut state, &desc);
        assert_eq!(state.taa_frame_index(), 2);
        assert_ne!(state.taa_jitter(), first);
    }

    #[test]
    fn jitter_index_wraps_after_eight_renders() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let desc = taa_camera();
        for _ in 0..JITTER_SAMPLE_COUNT {
            fx.update(&mut state, &desc);
            state.begin_render(&mut fx.pipeline_targets).unwrap();
        }
        assert_eq!(state.taa_frame_index(), 0);
    }

    #[test]
    fn jittered_projection_differs_from_non_jittered() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &taa_camera());
        let v = state.main_view();
        assert_ne!(v.view_proj, v.non_jittered_view_proj);
        assert!((v.view_proj - v.proj * v.view).norm() < 1e-5);
    }

    #[test]
    fn second_update_keeps_previous_frame() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let mut desc = CameraDescriptor::new(CameraId(1), 640, 480);
        fx.update(&mut state, &desc);
        state.begin_render(&mut fx.pipeline_targets).unwrap();
        fx.update(&mut state, &desc);
        let prev = state.main_view().prev_view_proj;

        desc.transform = CameraTransform::new(Vec3::new(3.0, 0.0, 0.0), Quat::identity());
        fx.update(&mut state, &desc);
        assert_eq!(state.phase(), TemporalPhase::Advanced);
        assert_eq!(state.main_view().prev_view_proj, prev);
        assert_eq!(state.main_view().world_space_camera_pos, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn double_begin_render_does_not_swap_twice() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &taa_camera());
        let current = state.current_frame_rt(HistoryId::COLOR_PYRAMID).unwrap();

        state.begin_render(&mut fx.pipeline_targets).unwrap();
        assert_eq!(state.previous_frame_rt(HistoryId::COLOR_PYRAMID).unwrap(), current);
        state.begin_render(&mut fx.pipeline_targets).unwrap();
        assert_eq!(state.previous_frame_rt(HistoryId::COLOR_PYRAMID).unwrap(), current);
    }

    #[test]
    fn dynamic_resolution_scales_main_game_view_only() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let mut desc = CameraDescriptor::new(CameraId(1), 1000, 500);
        let mut ctx = UpdateContext {
            frame_settings: FrameSettings::POSTPROCESS,
            msaa: MsaaSamples::None,
            xr: &fx.xr,
            render_targets: &mut fx.pipeline_targets,
            dynamic_resolution_scale: 0.5,
            main_camera_overrides: None,
        };
        state.update(&desc, &mut ctx).unwrap();
        assert_eq!((state.actual_width(), state.actual_height()), (500, 250));
        assert_eq!(state.screen_size(), Vec4::new(500.0, 250.0, 1.0 / 500.0, 1.0 / 250.0));
        // Pipeline targets grow to the unscaled size.
        assert_eq!(ctx.render_targets.max_size(), (1000, 500));

        desc.renders_to_texture = true;
        state.update(&desc, &mut ctx).unwrap();
        assert_eq!((state.actual_width(), state.actual_height()), (1000, 500));
        assert!(!state.is_main_game_view());
    }

    #[test]
    fn zero_sized_viewport_is_clamped() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &CameraDescriptor::new(CameraId(1), 0, 0));
        assert_eq!((state.actual_width(), state.actual_height()), (1, 1));
        assert_eq!(state.screen_params(), Vec4::new(1.0, 1.0, 2.0, 2.0));
    }

    #[test]
    fn volume_parameters_fall_back_for_scene_view() {
        let mut fx = Fixture::new();
        let mut state = CameraState::new(
            CameraId(1),
            0,
            PipelineConfig::default().with_sky_lighting_override_mask(1 << 4),
            fx.backend.clone(),
        );
        let desc = CameraDescriptor::new(CameraId(1), 64, 64)
            .with_type(CameraType::SceneView)
            .with_transform(CameraTransform::new(Vec3::new(1.0, 2.0, 3.0), Quat::identity()));
        fx.update(&mut state, &desc);
        assert_eq!(state.volume_layer_mask(), !((1 << 4) | (1 << 31)));
        assert_eq!(state.volume_anchor(), Vec3::new(1.0, 2.0, 3.0));

        let main = CameraOverrides {
            volume_layer_mask: 0b101,
            volume_anchor_override: Some(Vec3::new(9.0, 9.0, 9.0)),
            ..Default::default()
        };
        let mut ctx = UpdateContext {
            frame_settings: FrameSettings::POSTPROCESS,
            msaa: MsaaSamples::None,
            xr: &fx.xr,
            render_targets: &mut fx.pipeline_targets,
            dynamic_resolution_scale: 1.0,
            main_camera_overrides: Some(&main),
        };
        state.update(&desc, &mut ctx).unwrap();
        assert_eq!(state.volume_layer_mask(), 0b101);
        assert_eq!(state.volume_anchor(), Vec3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn game_camera_without_overrides_sees_every_volume_layer() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &CameraDescriptor::new(CameraId(1), 64, 64));
        assert_eq!(state.volume_layer_mask(), u32::MAX);
    }

    #[test]
    fn ambient_occlusion_history_reallocates_on_scale_change() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &CameraDescriptor::new(CameraId(1), 64, 64));
        let a = state.allocate_ambient_occlusion_history(0.5).unwrap();
        let again = state.allocate_ambient_occlusion_history(0.5).unwrap();
        assert_eq!(a, again);
        assert_eq!(fx.backend.live_count(), 2);

        let b = state.allocate_ambient_occlusion_history(1.0).unwrap();
        assert_ne!(a, b);
        assert_eq!(fx.backend.live_count(), 2);

        assert!(state.release_history_frame_rt(HistoryId::AMBIENT_OCCLUSION));
        let c = state.allocate_ambient_occlusion_history(1.0).unwrap();
        assert_ne!(b, c);
    }

    #[test]
    fn inv_proj_param_linearizes_depth() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &CameraDescriptor::new(CameraId(1), 64, 64));
        let p = state.main_view().proj;
        let param = state.inv_proj_param();
        assert!((param.z + 1.0 / p[(2, 3)]).abs() < 1e-6);
        assert_eq!(param.x, 0.0);
    }

    #[test]
    fn view_id_is_offset_camera_id() {
        let fx = Fixture::new();
        let state = fx.state();
        assert_eq!(state.view_id(), 1 + (1 << 31) + 1);
    }

    #[test]
    fn multipass_xr_uses_first_view() {
        let mut fx = Fixture::new();
        let eye = Vec3::new(0.5, 1.7, 0.0);
        fx.xr = XrPass {
            enabled: true,
            single_pass: false,
            views: vec![XrView {
                projection: Projection::default().matrix(1.0),
                view: view_from_pose(eye, Quat::identity()),
            }],
            viewport: PixelRect::from_size(1440, 1600),
            culling_projection: None,
            culling_view: None,
        };
        let mut state = fx.state();
        fx.update(&mut state, &taa_camera());
        assert_eq!(state.view_count(), 1);
        assert!((state.main_view().world_space_camera_pos - eye).norm() < 1e-5);
        assert_eq!(state.xr_views()[0], *state.main_view());
        assert_eq!((state.actual_width(), state.actual_height()), (1440, 1600));
        assert_eq!(state.taa_jitter(), Vec4::zeros());
    }

    #[test]
    fn multipass_xr_renders_the_view_of_its_pass() {
        let mut fx = Fixture::new();
        let eyes = [Vec3::new(-0.032, 1.7, 0.0), Vec3::new(0.032, 1.7, 0.0)];
        fx.xr = XrPass {
            enabled: true,
            single_pass: false,
            views: eyes
                .iter()
                .map(|&eye| XrView {
                    projection: Projection::default().matrix(1.0),
                    view: view_from_pose(eye, Quat::identity()),
                })
                .collect(),
            viewport: PixelRect::from_size(1440, 1600),
            culling_projection: None,
            culling_view: None,
        };
        let desc = CameraDescriptor::new(CameraId(1), 64, 64);

        for (pass, eye) in eyes.iter().enumerate() {
            let mut state = CameraState::new(
                CameraId(1),
                pass as u32,
                PipelineConfig::default(),
                fx.backend.clone(),
            );
            fx.update(&mut state, &desc);
            assert_eq!(state.view_count(), 1);
            assert!((state.main_view().world_space_camera_pos - eye).norm() < 1e-5);
            assert_eq!(state.xr_views()[0], *state.main_view());
        }
    }

    #[test]
    fn views_added_between_renders_start_without_motion() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let desc = CameraDescriptor::new(CameraId(1), 64, 64);
        fx.update(&mut state, &desc);

        let projection = Projection::default().matrix(1.0);
        fx.xr = XrPass {
            enabled: true,
            single_pass: true,
            views: [-0.032, 0.032]
                .iter()
                .map(|&x| XrView {
                    projection,
                    view: view_from_pose(Vec3::new(x, 0.0, 0.0), Quat::identity()),
                })
                .collect(),
            viewport: PixelRect::from_size(64, 64),
            culling_projection: None,
            culling_view: None,
        };
        // Second update before rendering keeps the main view's snapshot.
        fx.update(&mut state, &desc);
        assert_eq!(state.phase(), TemporalPhase::Advanced);
        assert_eq!(state.view_count(), 2);
        for view in state.xr_views() {
            assert_ne!(view.prev_view_proj, Mat4::identity());
            assert!((view.prev_view_proj - view.non_jittered_view_proj).norm() < 1e-6);
            assert_eq!(view.prev_world_space_camera_pos, Vec3::zeros());
        }
    }

    #[test]
    fn color_pyramid_mip_count_tracks_history() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let desc = taa_camera();
        fx.update(&mut state, &desc);
        state.begin_render(&mut fx.pipeline_targets).unwrap();

        let current = state.current_frame_rt(HistoryId::COLOR_PYRAMID).unwrap();
        let target = state.history().render_targets().get(current).unwrap();
        assert_eq!(state.color_pyramid_history_mip_count(), target.mip_level_count());
        // 1920 wide: floor(log2(1920)) + 1 levels.
        assert_eq!(state.color_pyramid_history_mip_count(), 11);

        fx.frame_settings = FrameSettings::empty();
        fx.update(&mut state, &desc);
        assert!(!state.history().contains(HistoryId::COLOR_PYRAMID));
        assert_eq!(state.color_pyramid_history_mip_count(), 0);
    }

    #[test]
    fn reset_seeds_previous_frame_again() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let mut desc = CameraDescriptor::new(CameraId(1), 64, 64);
        fx.update(&mut state, &desc);
        state.begin_render(&mut fx.pipeline_targets).unwrap();
        state.reset();
        assert!(state.is_first_frame());

        desc.transform.position = Vec3::new(10.0, 0.0, 0.0);
        fx.update(&mut state, &desc);
        let v = state.main_view();
        assert_eq!(v.prev_world_space_camera_pos, Vec3::zeros());
        assert!((v.prev_view_proj - v.non_jittered_view_proj).norm() < 1e-6);
    }

    #[test]
    fn global_params_publish_taa_and_time() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &taa_camera());
        let timing = FrameTiming::fixed_step(4, 0.25);
        let params = state.global_params(&timing, &fx.pipeline_targets);
        assert_eq!(params.taa_frame_info, [0.8, 0.0, 1.0, 1.0]);
        assert_eq!(params.time[1], 1.0);
        assert_eq!(params.last_time_parameters[0], 0.75);
        assert_eq!(params.frame_count, 4);
        assert_eq!(params.xr_view_count, 1);
        assert_eq!(params.probe_exposure_scale, 1.0);
        assert_eq!(params.xr_views[0], params.main);

        let mut sink: Vec<u8> = Vec::new();
        state.setup_global_params(&mut sink, &timing, &fx.pipeline_targets);
        assert_eq!(sink.as_slice(), bytemuck::bytes_of(&params));
    }

    #[test]
    fn static_materials_freeze_time() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        let mut desc = CameraDescriptor::new(CameraId(1), 64, 64);
        desc.animated_materials = false;
        fx.update(&mut state, &desc);
        let params = state.global_params(&FrameTiming::fixed_step(10, 1.0), &fx.pipeline_targets);
        assert_eq!(params.time, [0.0; 4]);

        desc.camera_type = CameraType::Preview;
        fx.update(&mut state, &desc);
        let params = state.global_params(&FrameTiming::fixed_step(10, 1.0), &fx.pipeline_targets);
        assert_eq!(params.time[1], 10.0);
    }

    #[test]
    fn dispose_releases_history() {
        let mut fx = Fixture::new();
        let mut state = fx.state();
        fx.update(&mut state, &taa_camera());
        assert!(fx.backend.live_count() > 0);
        state.dispose();
        assert_eq!(fx.backend.live_count(), 0);
        assert_eq!(state.color_pyramid_buffer_count(), 0);
    }
}
