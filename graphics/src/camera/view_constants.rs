//! Per-view transform set consumed by shaders.
//!
//! [`ViewConstantsComputer`] turns a raw (OpenGL-convention) projection and a
//! world-to-view matrix into the GPU-ready matrices of one view, and links
//! them with the previous render for motion vectors and reprojection.
//!
//! # Camera-relative rendering
//!
//! With camera-relative rendering enabled, world positions reach shaders
//! already offset by the camera position, so the view matrix carries no
//! translation. The previous frame's view-projection is then rebased so it
//! transforms positions relative to the *current* camera:
//!
//! ```text
//! prev_view_proj = prev_view_proj * translation(current_pos - prev_pos)
//! ```
//!
//! and the stored previous position becomes `prev_pos - current_pos`.

use aperture_core::math::{
    ClipSpaceConvention, Mat4, Vec2, Vec3, Vec4, gpu_projection, mat4_from_translation,
    mat4_inverse, mat4_without_translation,
};

/// GPU-ready transforms of one logical view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewConstants {
    pub view: Mat4,
    pub inv_view: Mat4,
    pub proj: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub non_jittered_view_proj: Mat4,
    pub prev_view_proj: Mat4,
    pub prev_inv_view_proj: Mat4,
    pub prev_view_proj_no_camera_trans: Mat4,
    /// Maps `(pixel_x, pixel_y, 1, 1)` to a world-space view direction.
    pub pixel_coord_to_view_dir_ws: Mat4,
    pub world_space_camera_pos: Vec3,
    /// Offset of this view from the main view (XR eyes).
    pub world_space_camera_pos_view_offset: Vec3,
    /// Relative to `world_space_camera_pos` under camera-relative rendering.
    pub prev_world_space_camera_pos: Vec3,
}

impl Default for ViewConstants {
    fn default() -> Self {
        Self {
            view: Mat4::identity(),
            inv_view: Mat4::identity(),
            proj: Mat4::identity(),
            inv_proj: Mat4::identity(),
            view_proj: Mat4::identity(),
            inv_view_proj: Mat4::identity(),
            non_jittered_view_proj: Mat4::identity(),
            prev_view_proj: Mat4::identity(),
            prev_inv_view_proj: Mat4::identity(),
            prev_view_proj_no_camera_trans: Mat4::identity(),
            pixel_coord_to_view_dir_ws: Mat4::identity(),
            world_space_camera_pos: Vec3::zeros(),
            world_space_camera_pos_view_offset: Vec3::zeros(),
            prev_world_space_camera_pos: Vec3::zeros(),
        }
    }
}

/// How previous-frame fields are treated by one computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviousFrameUpdate {
    /// Keep the previous-frame snapshot. Used for repeat updates within one render.
    Preserve,
    /// Move the current state into the previous-frame slots.
    ///
    /// On the first frame there is no history, so previous is seeded with
    /// current to avoid a spurious motion spike.
    Advance { first_frame: bool },
}

/// Source of the pixel-to-view-direction matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelDirection {
    /// Symmetric perspective camera with optional lens shift.
    Perspective { vertical_fov: f32, lens_shift: Vec2 },
    /// Any projection, derived from the inverse view-projection. Used for XR
    /// views whose projections are asymmetric.
    Generic,
}

/// Raw inputs of one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewInput {
    /// OpenGL-convention projection without jitter.
    pub projection: Mat4,
    /// OpenGL-convention projection with TAA jitter, if any.
    pub jittered_projection: Option<Mat4>,
    /// World-to-view matrix.
    pub view: Mat4,
    /// World-space position of the view.
    pub camera_position: Vec3,
}

/// Computes [`ViewConstants`] for a fixed backend convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewConstantsComputer {
    pub clip_space: ClipSpaceConvention,
    pub camera_relative: bool,
}

impl ViewConstantsComputer {
    pub fn new(clip_space: ClipSpaceConvention, camera_relative: bool) -> Self {
        Self {
            clip_space,
            camera_relative,
        }
    }

    /// Recompute `constants` from `input`.
    ///
    /// `screen_size` is `(width, height, 1 / width, 1 / height)`.
    pub fn compute(
        &self,
        constants: &mut ViewConstants,
        input: &ViewInput,
        previous: PreviousFrameUpdate,
        pixel_direction: PixelDirection,
        screen_size: Vec4,
    ) {
        let camera_proj = input.jittered_projection.unwrap_or(input.projection);
        let gpu_proj = gpu_projection(&camera_proj, self.clip_space);
        let gpu_non_jittered_proj = gpu_projection(&input.projection, self.clip_space);
        let gpu_view = if self.camera_relative {
            mat4_without_translation(&input.view)
        } else {
            input.view
        };
        let gpu_vp = gpu_non_jittered_proj * gpu_view;
        let position = input.camera_position;

        match previous {
            PreviousFrameUpdate::Advance { first_frame: true } => {
                constants.prev_world_space_camera_pos = position;
                constants.prev_view_proj = gpu_vp;
                constants.prev_view_proj_no_camera_trans =
                    gpu_non_jittered_proj * mat4_without_translation(&input.view);
            }
            PreviousFrameUpdate::Advance { first_frame: false } => {
                constants.prev_world_space_camera_pos = constants.world_space_camera_pos;
                constants.prev_view_proj = constants.non_jittered_view_proj;
                constants.prev_view_proj_no_camera_trans = constants.prev_view_proj;
            }
            PreviousFrameUpdate::Preserve => {}
        }

        constants.view = gpu_view;
        constants.inv_view = mat4_inverse(&gpu_view);
        constants.proj = gpu_proj;
        constants.inv_proj = mat4_inverse(&gpu_proj);
        constants.view_proj = gpu_proj * gpu_view;
        constants.inv_view_proj = mat4_inverse(&constants.view_proj);
        constants.non_jittered_view_proj = gpu_vp;
        constants.world_space_camera_pos = position;
        constants.world_space_camera_pos_view_offset = Vec3::zeros();
        constants.pixel_coord_to_view_dir_ws = pixel_coord_to_view_dir_matrix(
            constants,
            pixel_direction,
            screen_size,
            self.clip_space.flip_y,
        );

        match previous {
            PreviousFrameUpdate::Advance { .. } => {
                if self.camera_relative {
                    let displacement = position - constants.prev_world_space_camera_pos;
                    constants.prev_world_space_camera_pos -= position;
                    constants.prev_view_proj *= mat4_from_translation(displacement);
                }
                constants.prev_inv_view_proj = mat4_inverse(&constants.prev_view_proj);
            }
            PreviousFrameUpdate::Preserve => {
                constants.prev_view_proj_no_camera_trans =
                    gpu_non_jittered_proj * mat4_without_translation(&input.view);
            }
        }
    }
}

/// Matrix mapping `(pixel_x, pixel_y, 1, 1)` to a world-space view direction.
///
/// Pixel `(0, 0)` is the bottom-left corner. `flip_y` must match the clip
/// space the constants were computed for. Stored transposed for row-vector
/// shader multiplication; see [`pixel_view_direction`].
pub fn pixel_coord_to_view_dir_matrix(
    constants: &ViewConstants,
    pixel_direction: PixelDirection,
    screen_size: Vec4,
    flip_y: bool,
) -> Mat4 {
    match pixel_direction {
        PixelDirection::Generic => {
            let ndc_y = if flip_y { -1.0 } else { 1.0 };
            let transform = Mat4::new_nonuniform_scaling(&Vec3::new(-1.0, -1.0, -1.0))
                * constants.inv_view_proj
                * Mat4::new_nonuniform_scaling(&Vec3::new(1.0, ndc_y, 1.0))
                * mat4_from_translation(Vec3::new(-1.0, -1.0, 0.0))
                * Mat4::new_nonuniform_scaling(&Vec3::new(
                    2.0 * screen_size.z,
                    2.0 * screen_size.w,
                    1.0,
                ));
            transform.transpose()
        }
        PixelDirection::Perspective {
            vertical_fov,
            lens_shift,
        } => {
            let tan_half_fov = (0.5 * vertical_fov).tan();
            let aspect = screen_size.x / screen_size.y;

            let m21 = (1.0 - 2.0 * lens_shift.y) * tan_half_fov;
            let m11 = -2.0 * screen_size.w * tan_half_fov;
            let m20 = (1.0 - 2.0 * lens_shift.x) * tan_half_fov * aspect;
            let m00 = -2.0 * screen_size.z * tan_half_fov * aspect;

            #[rustfmt::skip]
            let raster = Mat4::new(
                m00, 0.0, m20,  0.0,
                0.0, m11, m21,  0.0,
                0.0, 0.0, -1.0, 0.0,
                0.0, 0.0, 0.0,  1.0,
            );

            // Rotation only, flipped to a left-handed basis.
            let mut world_to_view = mat4_without_translation(&constants.view);
            let row2 = -world_to_view.row(2);
            world_to_view.set_row(2, &row2);

            (world_to_view.transpose() * raster).transpose()
        }
    }
}

/// World-space direction from the camera through pixel `(x, y)`.
pub fn pixel_view_direction(matrix: &Mat4, x: f32, y: f32) -> Vec3 {
    let h = matrix.transpose() * Vec4::new(x, y, 1.0, 1.0);
    (-h.xyz()).normalize()
}
