//! Camera inputs and pipeline configuration.
//!
//! A [`CameraDescriptor`] is the application-side description of a camera.
//! The optional [`CameraOverrides`] record carries per-camera pipeline
//! settings; when absent, every setting falls back to a default derived from
//! the descriptor (see [`ResolvedCameraSettings::resolve`]).

use aperture_core::math::{
    ClipSpaceConvention, Mat4, Quat, Vec2, Vec3, Vec4, orthographic_gl, perspective_gl,
    view_from_pose,
};
use bitflags::bitflags;

use crate::types::{MsaaSamples, TextureFormat};

/// Stable identity of an application camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(pub u64);

/// What a camera renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraType {
    #[default]
    Game,
    /// Editor viewport.
    SceneView,
    /// Material and asset previews.
    Preview,
    /// Reflection probe capture.
    Reflection,
}

/// Camera projection in OpenGL convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians.
        vertical_fov: f32,
        near: f32,
        far: f32,
        /// Off-axis shift in units of the frustum extent.
        lens_shift: Vec2,
    },
    Orthographic {
        /// Half of the vertical extent.
        size: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn near(&self) -> f32 {
        match *self {
            Self::Perspective { near, .. } | Self::Orthographic { near, .. } => near,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Self::Perspective { far, .. } | Self::Orthographic { far, .. } => far,
        }
    }

    pub fn is_orthographic(&self) -> bool {
        matches!(self, Self::Orthographic { .. })
    }

    /// Projection matrix for the given width over height.
    pub fn matrix(&self, aspect: f32) -> Mat4 {
        match *self {
            Self::Perspective {
                vertical_fov,
                near,
                far,
                lens_shift,
            } => {
                let mut m = perspective_gl(vertical_fov, aspect, near, far);
                // A shift of 1 moves the frustum by its full width.
                m[(0, 2)] = 2.0 * lens_shift.x;
                m[(1, 2)] = 2.0 * lens_shift.y;
                m
            }
            Self::Orthographic { size, near, far } => {
                let half_width = size * aspect;
                orthographic_gl(-half_width, half_width, -size, size, near, far)
            }
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::Perspective {
            vertical_fov: 60f32.to_radians(),
            near: 0.3,
            far: 1000.0,
            lens_shift: Vec2::zeros(),
        }
    }
}

/// World-space pose of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl CameraTransform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// World-to-view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        view_from_pose(self.position, self.rotation)
    }
}

impl Default for CameraTransform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

/// Pixel-space viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }
}

/// How the camera clears its target before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearFlags {
    #[default]
    Skybox,
    SolidColor,
    DepthOnly,
    Nothing,
}

/// Resolved colour clear behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearColorMode {
    #[default]
    Sky,
    Color,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipYMode {
    #[default]
    Automatic,
    ForceFlipY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AntialiasingMode {
    #[default]
    None,
    Fxaa,
    Taa,
    Smaa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmaaQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Optional per-camera pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraOverrides {
    pub antialiasing: AntialiasingMode,
    pub smaa_quality: SmaaQuality,
    pub taa_sharpen_strength: f32,
    pub clear_depth: bool,
    pub clear_color_mode: ClearColorMode,
    /// Linear HDR background colour.
    pub background_color_hdr: Vec4,
    pub flip_y_mode: FlipYMode,
    pub dithering: bool,
    pub stop_nans: bool,
    pub invert_face_culling: bool,
    pub probe_layer_mask: u32,
    pub probe_range_compression_factor: f32,
    pub volume_layer_mask: u32,
    /// Position volumes are evaluated at instead of the camera position.
    pub volume_anchor_override: Option<Vec3>,
    /// Keep history while the camera is inactive.
    pub has_persistent_history: bool,
}

impl Default for CameraOverrides {
    fn default() -> Self {
        Self {
            antialiasing: AntialiasingMode::None,
            smaa_quality: SmaaQuality::default(),
            taa_sharpen_strength: 0.6,
            clear_depth: true,
            clear_color_mode: ClearColorMode::Sky,
            background_color_hdr: Vec4::new(0.025, 0.07, 0.19, 0.0),
            flip_y_mode: FlipYMode::Automatic,
            dithering: false,
            stop_nans: false,
            invert_face_culling: false,
            probe_layer_mask: !0,
            probe_range_compression_factor: 1.0,
            volume_layer_mask: 1,
            volume_anchor_override: None,
            has_persistent_history: false,
        }
    }
}

/// Application-side camera description.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDescriptor {
    pub id: CameraId,
    pub name: String,
    pub camera_type: CameraType,
    pub transform: CameraTransform,
    pub projection: Projection,
    pub pixel_rect: PixelRect,
    pub clear_flags: ClearFlags,
    /// Background colour in sRGB.
    pub background_color: Vec4,
    pub culling_mask: u32,
    pub renders_to_texture: bool,
    pub post_processing: bool,
    pub animated_materials: bool,
    pub active: bool,
    pub overrides: Option<CameraOverrides>,
}

impl CameraDescriptor {
    pub fn new(id: CameraId, width: u32, height: u32) -> Self {
        Self {
            id,
            name: format!("Camera {}", id.0),
            camera_type: CameraType::Game,
            transform: CameraTransform::default(),
            projection: Projection::default(),
            pixel_rect: PixelRect::from_size(width, height),
            clear_flags: ClearFlags::Skybox,
            background_color: Vec4::new(0.19, 0.3, 0.47, 0.0),
            culling_mask: !0,
            renders_to_texture: false,
            post_processing: true,
            animated_materials: true,
            active: true,
            overrides: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_type(mut self, camera_type: CameraType) -> Self {
        self.camera_type = camera_type;
        self
    }

    pub fn with_transform(mut self, transform: CameraTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_overrides(mut self, overrides: CameraOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Camera properties after applying [`CameraOverrides`] or their fallbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedCameraSettings {
    pub clear_depth: bool,
    pub clear_color_mode: ClearColorMode,
    pub background_color_hdr: Vec4,
    pub flip_y_mode: FlipYMode,
    pub dithering: bool,
    pub stop_nans: bool,
    pub invert_face_culling: bool,
    pub probe_layer_mask: u32,
    pub probe_range_compression_factor: f32,
    pub has_persistent_history: bool,
}

impl ResolvedCameraSettings {
    pub fn resolve(desc: &CameraDescriptor) -> Self {
        match &desc.overrides {
            Some(o) => Self {
                clear_depth: o.clear_depth,
                clear_color_mode: o.clear_color_mode,
                background_color_hdr: o.background_color_hdr,
                flip_y_mode: o.flip_y_mode,
                dithering: o.dithering,
                stop_nans: o.stop_nans,
                invert_face_culling: o.invert_face_culling,
                probe_layer_mask: o.probe_layer_mask,
                probe_range_compression_factor: o.probe_range_compression_factor,
                has_persistent_history: o.has_persistent_history,
            },
            None => {
                let bg = desc.background_color;
                Self {
                    clear_depth: desc.clear_flags != ClearFlags::Nothing,
                    clear_color_mode: match desc.clear_flags {
                        ClearFlags::Skybox => ClearColorMode::Sky,
                        ClearFlags::SolidColor => ClearColorMode::Color,
                        ClearFlags::DepthOnly | ClearFlags::Nothing => ClearColorMode::None,
                    },
                    background_color_hdr: Vec4::new(
                        srgb_to_linear(bg.x),
                        srgb_to_linear(bg.y),
                        srgb_to_linear(bg.z),
                        bg.w,
                    ),
                    flip_y_mode: FlipYMode::Automatic,
                    dithering: false,
                    stop_nans: false,
                    invert_face_culling: false,
                    probe_layer_mask: !0,
                    probe_range_compression_factor: 1.0,
                    has_persistent_history: false,
                }
            }
        }
    }
}

bitflags! {
    /// Optional effects enabled for a render.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameSettings: u32 {
        const POSTPROCESS = 1 << 0;
        const ROUGH_REFRACTION = 1 << 1;
        const DISTORTION = 1 << 2;
        const SSR = 1 << 3;
        const VOLUMETRICS = 1 << 4;
        const REPROJECTION_FOR_VOLUMETRICS = 1 << 5;
    }
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self::POSTPROCESS
    }
}

/// One eye of an XR pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XrView {
    /// OpenGL-convention projection.
    pub projection: Mat4,
    /// World-to-view matrix.
    pub view: Mat4,
}

impl XrView {
    /// World-space position of the view.
    pub fn position(&self) -> Vec3 {
        let inv = aperture_core::math::mat4_inverse(&self.view);
        Vec3::new(inv[(0, 3)], inv[(1, 3)], inv[(2, 3)])
    }
}

/// Multi-view rendering for the current render.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XrPass {
    pub enabled: bool,
    /// All views rendered by one submission.
    pub single_pass: bool,
    pub views: Vec<XrView>,
    pub viewport: PixelRect,
    /// Projection enclosing every view, for culling.
    pub culling_projection: Option<Mat4>,
    /// World-to-view matrix paired with `culling_projection`.
    pub culling_view: Option<Mat4>,
}

impl XrPass {
    /// Views rendered by this pass; zero when XR is off.
    pub fn view_count(&self) -> usize {
        if self.enabled { self.views.len() } else { 0 }
    }
}

/// Pipeline-wide settings for camera state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub clip_space: ClipSpaceConvention,
    pub camera_relative: bool,
    /// Antialiasing used by editor viewports.
    pub scene_view_antialiasing: AntialiasingMode,
    pub history_format: TextureFormat,
    /// Layer mask of the sky lighting override; excluded from default volume masks.
    pub sky_lighting_override_mask: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clip_space: ClipSpaceConvention::default(),
            camera_relative: true,
            scene_view_antialiasing: AntialiasingMode::Taa,
            history_format: TextureFormat::Rg11b10Float,
            sky_lighting_override_mask: 0,
        }
    }
}

impl PipelineConfig {
    pub fn with_clip_space(mut self, clip_space: ClipSpaceConvention) -> Self {
        self.clip_space = clip_space;
        self
    }

    pub fn with_camera_relative(mut self, camera_relative: bool) -> Self {
        self.camera_relative = camera_relative;
        self
    }

    pub fn with_scene_view_antialiasing(mut self, mode: AntialiasingMode) -> Self {
        self.scene_view_antialiasing = mode;
        self
    }

    pub fn with_history_format(mut self, format: TextureFormat) -> Self {
        self.history_format = format;
        self
    }

    pub fn with_sky_lighting_override_mask(mut self, mask: u32) -> Self {
        self.sky_lighting_override_mask = mask;
        self
    }
}

/// Per-render inputs of [`CameraState::update`](super::CameraState::update).
#[derive(Debug)]
pub struct UpdateContext<'a> {
    pub frame_settings: FrameSettings,
    pub msaa: MsaaSamples,
    pub xr: &'a XrPass,
    /// Pipeline-wide render targets; receives this camera's reference size.
    pub render_targets: &'a mut crate::resources::RenderTargetSystem,
    /// Applied to the main game view only.
    pub dynamic_resolution_scale: f32,
    /// Used by editor viewports when resolving volume parameters.
    pub main_camera_overrides: Option<&'a CameraOverrides>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_core::math::transform_point;

    #[test]
    fn lens_shift_moves_center() {
        let centered = Projection::default();
        let shifted = Projection::Perspective {
            vertical_fov: 60f32.to_radians(),
            near: 0.3,
            far: 1000.0,
            lens_shift: Vec2::new(0.5, 0.0),
        };
        let p = Vec3::new(0.0, 0.0, -10.0);
        let a = transform_point(&centered.matrix(1.5), &p);
        let b = transform_point(&shifted.matrix(1.5), &p);
        assert!(a.x.abs() < 1e-6);
        // The frustum moves right, so the view axis lands on the left edge.
        assert!((b.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn orthographic_matrix_covers_size() {
        let proj = Projection::Orthographic {
            size: 5.0,
            near: 0.1,
            far: 100.0,
        };
        let m = proj.matrix(2.0);
        let corner = transform_point(&m, &Vec3::new(10.0, 5.0, -1.0));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
        assert_eq!(proj.near(), 0.1);
        assert_eq!(proj.far(), 100.0);
    }

    #[test]
    fn overrides_default_to_medium_smaa() {
        let overrides = CameraOverrides::default();
        assert_eq!(overrides.smaa_quality, SmaaQuality::Medium);
        assert_eq!(overrides.antialiasing, AntialiasingMode::None);
        assert_eq!(overrides.taa_sharpen_strength, 0.6);
    }

    #[test]
    fn resolve_without_overrides_follows_clear_flags() {
        let mut desc = CameraDescriptor::new(CameraId(1), 64, 64);
        desc.clear_flags = ClearFlags::SolidColor;
        desc.background_color = Vec4::new(1.0, 0.0, 0.5, 1.0);
        let s = ResolvedCameraSettings::resolve(&desc);
        assert!(s.clear_depth);
        assert_eq!(s.clear_color_mode, ClearColorMode::Color);
        assert_eq!(s.background_color_hdr.x, 1.0);
        assert!((s.background_color_hdr.z - 0.214).abs() < 1e-3);
        assert_eq!(s.probe_layer_mask, !0);

        desc.clear_flags = ClearFlags::Nothing;
        let s = ResolvedCameraSettings::resolve(&desc);
        assert!(!s.clear_depth);
        assert_eq!(s.clear_color_mode, ClearColorMode::None);
    }

    #[test]
    fn resolve_with_overrides_uses_record() {
        let overrides = CameraOverrides {
            clear_depth: false,
            stop_nans: true,
            probe_range_compression_factor: 0.25,
            has_persistent_history: true,
            ..Default::default()
        };
        let desc = CameraDescriptor::new(CameraId(2), 64, 64).with_overrides(overrides);
        let s = ResolvedCameraSettings::resolve(&desc);
        assert!(!s.clear_depth);
        assert!(s.stop_nans);
        assert_eq!(s.probe_range_compression_factor, 0.25);
        assert!(s.has_persistent_history);
    }

    #[test]
    fn xr_view_count_is_zero_when_disabled() {
        let view = XrView {
            projection: Mat4::identity(),
            view: view_from_pose(Vec3::new(1.0, 2.0, 3.0), Quat::identity()),
        };
        let mut xr = XrPass {
            views: vec![view, view],
            ..Default::default()
        };
        assert_eq!(xr.view_count(), 0);
        xr.enabled = true;
        assert_eq!(xr.view_count(), 2);
        assert!((view.position() - Vec3::new(1.0, 2.0, 3.0)).norm() < 1e-5);
    }
}
