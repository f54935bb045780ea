//! Math type aliases and helper functions.
//!
//! Projection helpers build matrices in the OpenGL clip-space convention
//! (right-handed view space looking down -Z, depth in [-1, 1]). Conversion to
//! the convention a GPU backend expects goes through [`gpu_projection`].

pub use nalgebra;

/// 2D vector (f32).
pub type Vec2 = nalgebra::Vector2<f32>;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4D vector (f32).
pub type Vec4 = nalgebra::Vector4<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Quaternion (f32). Stored as `[x, y, z, w]` in memory.
/// Construct with `Quaternion::new(w, x, y, z)` or [`quat_from_rotation_y`].
pub type Quat = nalgebra::Quaternion<f32>;

// ===== Clip space =====

/// Clip-space conventions of a GPU backend.
///
/// Source projections are always OpenGL style; this describes how they are
/// remapped before reaching shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipSpaceConvention {
    /// Depth range is [0, 1] instead of [-1, 1].
    pub zero_to_one: bool,
    /// Near plane maps to the far end of the depth range.
    pub reversed_z: bool,
    /// Clip-space Y points down (render-to-texture on some backends).
    pub flip_y: bool,
}

impl ClipSpaceConvention {
    /// OpenGL: depth in [-1, 1], not reversed.
    pub const OPENGL: Self = Self {
        zero_to_one: false,
        reversed_z: false,
        flip_y: false,
    };

    /// Direct3D/Vulkan/Metal style: depth in [0, 1] with reversed Z.
    pub const REVERSED_ZERO_TO_ONE: Self = Self {
        zero_to_one: true,
        reversed_z: true,
        flip_y: false,
    };

    /// Depth in [0, 1], not reversed (WebGPU default).
    pub const ZERO_TO_ONE: Self = Self {
        zero_to_one: true,
        reversed_z: false,
        flip_y: false,
    };

    /// Enable or disable the Y flip.
    pub fn with_flip_y(mut self, flip_y: bool) -> Self {
        self.flip_y = flip_y;
        self
    }
}

impl Default for ClipSpaceConvention {
    fn default() -> Self {
        Self::REVERSED_ZERO_TO_ONE
    }
}

/// Convert an OpenGL-convention projection into the given GPU convention.
pub fn gpu_projection(proj: &Mat4, convention: ClipSpaceConvention) -> Mat4 {
    let mut m = *proj;
    let row3 = m.row(3).into_owned();
    if convention.zero_to_one {
        let row2 = m.row(2).into_owned();
        m.set_row(2, &(row2 * 0.5 + row3 * 0.5));
    }
    if convention.reversed_z {
        let row2 = m.row(2).into_owned();
        if convention.zero_to_one {
            m.set_row(2, &(row3 - row2));
        } else {
            m.set_row(2, &(-row2));
        }
    }
    if convention.flip_y {
        let row1 = m.row(1).into_owned();
        m.set_row(1, &(-row1));
    }
    m
}

// ===== Projections =====

/// Near-plane extents and clip distances of a projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumPlanes {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub z_near: f32,
    pub z_far: f32,
}

/// Right-handed perspective projection, OpenGL depth range.
pub fn perspective_gl(yfov: f32, aspect: f32, znear: f32, zfar: f32) -> Mat4 {
    let f = 1.0 / (yfov / 2.0).tan();
    let nf = 1.0 / (znear - zfar);
    #[rustfmt::skip]
    let result = Mat4::new(
        f / aspect, 0.0, 0.0,                   0.0,
        0.0,        f,   0.0,                   0.0,
        0.0,        0.0, (zfar + znear) * nf,   2.0 * znear * zfar * nf,
        0.0,        0.0, -1.0,                  0.0,
    );
    result
}

/// Off-center perspective projection from near-plane extents, OpenGL depth range.
pub fn frustum_gl(planes: &FrustumPlanes) -> Mat4 {
    let FrustumPlanes {
        left: l,
        right: r,
        bottom: b,
        top: t,
        z_near: n,
        z_far: f,
    } = *planes;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 * n / (r - l), 0.0,               (r + l) / (r - l),  0.0,
        0.0,               2.0 * n / (t - b), (t + b) / (t - b),  0.0,
        0.0,               0.0,               -(f + n) / (f - n), -2.0 * f * n / (f - n),
        0.0,               0.0,               -1.0,               0.0,
    );
    result
}

/// Right-handed orthographic projection, OpenGL depth range.
pub fn orthographic_gl(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rml = right - left;
    let tmb = top - bottom;
    let fmn = far - near;
    #[rustfmt::skip]
    let result = Mat4::new(
        2.0 / rml, 0.0,       0.0,         -(right + left) / rml,
        0.0,       2.0 / tmb, 0.0,         -(top + bottom) / tmb,
        0.0,       0.0,       -2.0 / fmn,  -(far + near) / fmn,
        0.0,       0.0,       0.0,          1.0,
    );
    result
}

/// Recover near-plane extents and clip distances from an OpenGL perspective projection.
pub fn decompose_perspective(m: &Mat4) -> FrustumPlanes {
    let z_near = m[(2, 3)] / (m[(2, 2)] - 1.0);
    let z_far = m[(2, 3)] / (m[(2, 2)] + 1.0);
    FrustumPlanes {
        left: z_near * (m[(0, 2)] - 1.0) / m[(0, 0)],
        right: z_near * (m[(0, 2)] + 1.0) / m[(0, 0)],
        bottom: z_near * (m[(1, 2)] - 1.0) / m[(1, 1)],
        top: z_near * (m[(1, 2)] + 1.0) / m[(1, 1)],
        z_near,
        z_far,
    }
}

/// Returns true if the projection has no perspective divide.
pub fn is_orthographic(m: &Mat4) -> bool {
    m[(3, 2)] == 0.0 && m[(3, 3)] != 0.0
}

// ===== Transforms =====

/// World-to-view matrix of a camera placed at `position` with `rotation`.
pub fn view_from_pose(position: Vec3, rotation: Quat) -> Mat4 {
    let r = nalgebra::UnitQuaternion::new_unchecked(rotation);
    let iso = nalgebra::Isometry3::from_parts(nalgebra::Translation3::from(position), r);
    iso.inverse().to_homogeneous()
}

/// Build a translation-only 4x4 matrix.
pub fn mat4_from_translation(t: Vec3) -> Mat4 {
    Mat4::new_translation(&t)
}

/// Copy of `m` with the translation column reset to `(0, 0, 0, 1)`.
pub fn mat4_without_translation(m: &Mat4) -> Mat4 {
    let mut out = *m;
    out.set_column(3, &Vec4::new(0.0, 0.0, 0.0, 1.0));
    out
}

/// Invert a matrix, yielding NaNs for singular input.
///
/// Degenerate camera setups are not rejected; their matrices propagate
/// non-finite values instead.
pub fn mat4_inverse(m: &Mat4) -> Mat4 {
    m.try_inverse().unwrap_or_else(|| Mat4::from_element(f32::NAN))
}

/// Transform a point with perspective divide.
pub fn transform_point(m: &Mat4, p: &Vec3) -> Vec3 {
    let h = m * Vec4::new(p.x, p.y, p.z, 1.0);
    h.xyz() / h.w
}

/// Create a quaternion from rotation around the Y axis.
pub fn quat_from_rotation_y(angle: f32) -> Quat {
    nalgebra::UnitQuaternion::from_axis_angle(&nalgebra::Vector3::y_axis(), angle).into_inner()
}

/// Convert a 4x4 matrix to a column-major `[[f32; 4]; 4]` array.
pub fn mat4_to_cols_array_2d(m: &Mat4) -> [[f32; 4]; 4] {
    let s = m.as_slice();
    [
        [s[0], s[1], s[2], s[3]],
        [s[4], s[5], s[6], s[7]],
        [s[8], s[9], s[10], s[11]],
        [s[12], s[13], s[14], s[15]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn translation_matrix() {
        let t = Vec3::new(1.0, 2.0, 3.0);
        let m = mat4_from_translation(t);
        assert_eq!(m[(0, 3)], 1.0);
        assert_eq!(m[(1, 3)], 2.0);
        assert_eq!(m[(2, 3)], 3.0);
    }

    #[test]
    fn camera_turned_90_degrees_looks_down_negative_x() {
        let view = view_from_pose(Vec3::zeros(), quat_from_rotation_y(FRAC_PI_2));
        let p = transform_point(&view, &Vec3::new(-1.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-5);
        assert!((p.z + 1.0).abs() < 1e-5);
    }

    #[test]
    fn view_from_pose_moves_camera_to_origin() {
        let pos = Vec3::new(3.0, -2.0, 5.0);
        let view = view_from_pose(pos, quat_from_rotation_y(0.7));
        let p = transform_point(&view, &pos);
        assert!(p.norm() < 1e-5);
    }

    #[test]
    fn perspective_maps_near_and_far_to_gl_range() {
        let proj = perspective_gl(1.0, 1.5, 0.5, 100.0);
        let near = transform_point(&proj, &Vec3::new(0.0, 0.0, -0.5));
        let far = transform_point(&proj, &Vec3::new(0.0, 0.0, -100.0));
        assert!((near.z + 1.0).abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn decompose_matches_frustum() {
        let planes = FrustumPlanes {
            left: -0.3,
            right: 0.5,
            bottom: -0.2,
            top: 0.25,
            z_near: 0.3,
            z_far: 500.0,
        };
        let back = decompose_perspective(&frustum_gl(&planes));
        assert!((back.left - planes.left).abs() < 1e-4);
        assert!((back.right - planes.right).abs() < 1e-4);
        assert!((back.bottom - planes.bottom).abs() < 1e-4);
        assert!((back.top - planes.top).abs() < 1e-4);
        assert!((back.z_near - planes.z_near).abs() < 1e-4);
        assert!((back.z_far - planes.z_far).abs() / planes.z_far < 1e-3);
    }

    #[test]
    fn gpu_projection_reversed_zero_to_one() {
        let proj = perspective_gl(1.0, 1.0, 1.0, 10.0);
        let gpu = gpu_projection(&proj, ClipSpaceConvention::REVERSED_ZERO_TO_ONE);
        let near = transform_point(&gpu, &Vec3::new(0.0, 0.0, -1.0));
        let far = transform_point(&gpu, &Vec3::new(0.0, 0.0, -10.0));
        assert!((near.z - 1.0).abs() < 1e-5);
        assert!(far.z.abs() < 1e-5);
    }

    #[test]
    fn gpu_projection_flip_y() {
        let proj = perspective_gl(1.0, 1.0, 1.0, 10.0);
        let conv = ClipSpaceConvention::OPENGL.with_flip_y(true);
        let gpu = gpu_projection(&proj, conv);
        assert_eq!(gpu[(1, 1)], -proj[(1, 1)]);
        assert_eq!(gpu[(2, 2)], proj[(2, 2)]);
    }

    #[test]
    fn orthographic_detection() {
        assert!(is_orthographic(&orthographic_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0)));
        assert!(!is_orthographic(&perspective_gl(1.0, 1.0, 0.1, 10.0)));
    }

    #[test]
    fn without_translation_keeps_rotation() {
        let m = view_from_pose(Vec3::new(4.0, 5.0, 6.0), quat_from_rotation_y(0.3));
        let stripped = mat4_without_translation(&m);
        assert_eq!(stripped.column(3).into_owned(), Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(
            stripped.fixed_view::<3, 3>(0, 0).into_owned(),
            m.fixed_view::<3, 3>(0, 0).into_owned()
        );
    }

    #[test]
    fn cols_array_2d_identity() {
        let m = Mat4::identity();
        let cols = mat4_to_cols_array_2d(&m);
        assert_eq!(cols[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(cols[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
