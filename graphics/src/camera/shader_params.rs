//! Per-view shader parameter block.
//!
//! [`GlobalShaderParams`] is the GPU layout of everything a camera publishes
//! to shaders each render. It is written in one call through a
//! [`ShaderParamSink`].

use aperture_core::math::{Vec3, Vec4, mat4_to_cols_array_2d};

use super::view_constants::ViewConstants;

/// Views with their own block in [`GlobalShaderParams::xr_views`].
pub const MAX_XR_VIEWS: usize = 2;

pub(crate) fn gpu_vec4(v: Vec4) -> [f32; 4] {
    [v.x, v.y, v.z, v.w]
}

fn point(v: Vec3) -> [f32; 4] {
    [v.x, v.y, v.z, 0.0]
}

/// GPU layout of [`ViewConstants`].
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuViewConstants {
    pub view: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub non_jittered_view_proj: [[f32; 4]; 4],
    pub prev_view_proj: [[f32; 4]; 4],
    pub prev_inv_view_proj: [[f32; 4]; 4],
    pub prev_view_proj_no_camera_trans: [[f32; 4]; 4],
    pub pixel_coord_to_view_dir_ws: [[f32; 4]; 4],
    pub world_space_camera_pos: [f32; 4],
    pub world_space_camera_pos_view_offset: [f32; 4],
    pub prev_world_space_camera_pos: [f32; 4],
}

impl From<&ViewConstants> for GpuViewConstants {
    fn from(c: &ViewConstants) -> Self {
        let m = mat4_to_cols_array_2d;
        Self {
            view: m(&c.view),
            inv_view: m(&c.inv_view),
            proj: m(&c.proj),
            inv_proj: m(&c.inv_proj),
            view_proj: m(&c.view_proj),
            inv_view_proj: m(&c.inv_view_proj),
            non_jittered_view_proj: m(&c.non_jittered_view_proj),
            prev_view_proj: m(&c.prev_view_proj),
            prev_inv_view_proj: m(&c.prev_inv_view_proj),
            prev_view_proj_no_camera_trans: m(&c.prev_view_proj_no_camera_trans),
            pixel_coord_to_view_dir_ws: m(&c.pixel_coord_to_view_dir_ws),
            world_space_camera_pos: point(c.world_space_camera_pos),
            world_space_camera_pos_view_offset: point(c.world_space_camera_pos_view_offset),
            prev_world_space_camera_pos: point(c.prev_world_space_camera_pos),
        }
    }
}

/// Everything a camera publishes to shaders for one render.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalShaderParams {
    pub main: GpuViewConstants,
    /// `(width, height, 1 / width, 1 / height)`.
    pub screen_size: [f32; 4],
    pub rt_handle_scale: [f32; 4],
    pub rt_handle_scale_history: [f32; 4],
    pub z_buffer_params: [f32; 4],
    pub projection_params: [f32; 4],
    pub ortho_params: [f32; 4],
    /// `(width, height, 1 + 1 / width, 1 + 1 / height)`.
    pub screen_params: [f32; 4],
    /// `(sharpen_strength, 0, frame_index, taa_enabled)`.
    pub taa_frame_info: [f32; 4],
    pub taa_jitter_strength: [f32; 4],
    pub frustum_planes: [[f32; 4]; 6],
    /// `(t / 20, t, 2t, 3t)`.
    pub time: [f32; 4],
    /// Sine of `(t / 8, t / 4, t / 2, t)`.
    pub sin_time: [f32; 4],
    /// Cosine of `(t / 8, t / 4, t / 2, t)`.
    pub cos_time: [f32; 4],
    /// `(dt, 1 / dt, smooth_dt, 1 / smooth_dt)`.
    pub delta_time: [f32; 4],
    /// `(t, sin t, cos t, 0)`.
    pub time_parameters: [f32; 4],
    pub last_time_parameters: [f32; 4],
    pub frame_count: i32,
    pub probe_exposure_scale: f32,
    pub xr_view_count: u32,
    pub _padding: u32,
    pub xr_views: [GpuViewConstants; MAX_XR_VIEWS],
}

static_assertions::const_assert_eq!(std::mem::size_of::<GpuViewConstants>() % 16, 0);
static_assertions::const_assert_eq!(std::mem::size_of::<GlobalShaderParams>() % 16, 0);

/// Clock values for one render.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTiming {
    /// Seconds since start.
    pub time: f32,
    /// `time` of the previous render.
    pub last_time: f32,
    pub delta_time: f32,
    pub smooth_delta_time: f32,
    pub frame_count: i32,
}

impl FrameTiming {
    /// Timing for a fixed-step clock.
    pub fn fixed_step(frame_count: i32, step: f32) -> Self {
        let time = frame_count as f32 * step;
        Self {
            time,
            last_time: (time - step).max(0.0),
            delta_time: step,
            smooth_delta_time: step,
            frame_count,
        }
    }
}

pub(crate) struct TimeVectors {
    pub time: [f32; 4],
    pub sin_time: [f32; 4],
    pub cos_time: [f32; 4],
    pub time_parameters: [f32; 4],
}

pub(crate) fn time_vectors(t: f32) -> TimeVectors {
    TimeVectors {
        time: [t * 0.05, t, t * 2.0, t * 3.0],
        sin_time: [
            (t * 0.125).sin(),
            (t * 0.25).sin(),
            (t * 0.5).sin(),
            t.sin(),
        ],
        cos_time: [
            (t * 0.125).cos(),
            (t * 0.25).cos(),
            (t * 0.5).cos(),
            t.cos(),
        ],
        time_parameters: [t, t.sin(), t.cos(), 0.0],
    }
}

pub(crate) fn delta_time_vector(timing: &FrameTiming) -> [f32; 4] {
    [
        timing.delta_time,
        1.0 / timing.delta_time,
        timing.smooth_delta_time,
        1.0 / timing.smooth_delta_time,
    ]
}

/// Destination of [`GlobalShaderParams`].
pub trait ShaderParamSink {
    fn write_global_params(&mut self, params: &GlobalShaderParams);
}

/// Raw upload bytes; each write replaces the contents.
impl ShaderParamSink for Vec<u8> {
    fn write_global_params(&mut self, params: &GlobalShaderParams) {
        self.clear();
        self.extend_from_slice(bytemuck::bytes_of(params));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_vectors_follow_layout() {
        let v = time_vectors(2.0);
        assert_eq!(v.time, [0.1, 2.0, 4.0, 6.0]);
        assert_eq!(v.sin_time[3], 2f32.sin());
        assert_eq!(v.cos_time[0], 0.25f32.cos());
        assert_eq!(v.time_parameters, [2.0, 2f32.sin(), 2f32.cos(), 0.0]);
    }

    #[test]
    fn gpu_view_constants_are_column_major() {
        let mut c = ViewConstants::default();
        c.view[(0, 3)] = 5.0;
        c.world_space_camera_pos = Vec3::new(1.0, 2.0, 3.0);
        let gpu = GpuViewConstants::from(&c);
        assert_eq!(gpu.view[3][0], 5.0);
        assert_eq!(gpu.world_space_camera_pos, [1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn byte_sink_holds_one_block() {
        let params: GlobalShaderParams = bytemuck::Zeroable::zeroed();
        let mut sink = vec![1u8; 3];
        sink.write_global_params(&params);
        assert_eq!(sink.len(), std::mem::size_of::<GlobalShaderParams>());
        assert!(sink.iter().all(|&b| b == 0));
    }

    #[test]
    fn fixed_step_timing() {
        let t = FrameTiming::fixed_step(10, 0.5);
        assert_eq!(t.time, 5.0);
        assert_eq!(t.last_time, 4.5);
        assert_eq!(delta_time_vector(&t), [0.5, 2.0, 0.5, 2.0]);
    }
}
