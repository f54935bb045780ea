//! Frustum planes, corners and depth-linearization parameters.
//!
//! Planes are extracted from a view-projection matrix with the
//! Gribb/Hartmann method. The rows that bound the depth range depend on the
//! clip-space convention the matrix was built for, so the convention is
//! classified from the projection first.

use aperture_core::math::{Mat4, Vec3, Vec4, is_orthographic, transform_point};

/// Number of frustum planes.
pub const FRUSTUM_PLANE_COUNT: usize = 6;

/// Number of frustum corners.
pub const FRUSTUM_CORNER_COUNT: usize = 8;

/// Plane in Hessian normal form. Points with `normal.dot(p) + distance >= 0`
/// lie on the inner side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Build a plane from raw `(a, b, c, d)` coefficients, normalizing them.
    pub fn from_coefficients(v: Vec4) -> Self {
        let normal = v.xyz();
        let len = normal.norm();
        Self {
            normal: normal / len,
            distance: v.w / len,
        }
    }

    /// Signed distance from the plane to `point`.
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// The plane as `(nx, ny, nz, d)`, the layout shaders consume.
    pub fn to_vec4(&self) -> Vec4 {
        Vec4::new(self.normal.x, self.normal.y, self.normal.z, self.distance)
    }
}

/// Depth conventions of a GPU projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthConvention {
    /// Near maps to the far end of the depth range.
    pub reversed_z: bool,
    /// Depth range is [0, 1] rather than [-1, 1].
    pub zero_to_one: bool,
}

impl DepthConvention {
    /// NDC depth of the near plane.
    pub fn near_ndc(&self) -> f32 {
        match (self.reversed_z, self.zero_to_one) {
            (false, true) => 0.0,
            (false, false) => -1.0,
            (true, _) => 1.0,
        }
    }

    /// NDC depth of the far plane.
    pub fn far_ndc(&self) -> f32 {
        match (self.reversed_z, self.zero_to_one) {
            (false, _) => 1.0,
            (true, true) => 0.0,
            (true, false) => -1.0,
        }
    }
}

/// Six planes (left, right, top, bottom, near, far) and eight corners.
///
/// Corner index bits: bit 0 set for right, bit 1 set for top, bit 2 set for far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; FRUSTUM_PLANE_COUNT],
    pub corners: [Vec3; FRUSTUM_CORNER_COUNT],
}

impl Default for Frustum {
    fn default() -> Self {
        let plane = Plane {
            normal: Vec3::zeros(),
            distance: 0.0,
        };
        Self {
            planes: [plane; FRUSTUM_PLANE_COUNT],
            corners: [Vec3::zeros(); FRUSTUM_CORNER_COUNT],
        }
    }
}

impl Frustum {
    /// Extract the frustum of `view_proj` built for `convention`.
    pub fn from_view_projection(view_proj: &Mat4, convention: DepthConvention) -> Self {
        let r0 = view_proj.row(0).transpose();
        let r1 = view_proj.row(1).transpose();
        let r2 = view_proj.row(2).transpose();
        let r3 = view_proj.row(3).transpose();

        let (near, far) = match (convention.reversed_z, convention.zero_to_one) {
            (false, true) => (r2, r3 - r2),
            (false, false) => (r3 + r2, r3 - r2),
            (true, true) => (r3 - r2, r2),
            (true, false) => (r3 - r2, r3 + r2),
        };

        let planes = [
            Plane::from_coefficients(r3 + r0),
            Plane::from_coefficients(r3 - r0),
            Plane::from_coefficients(r3 - r1),
            Plane::from_coefficients(r3 + r1),
            Plane::from_coefficients(near),
            Plane::from_coefficients(far),
        ];

        let inv = aperture_core::math::mat4_inverse(view_proj);
        let (zn, zf) = (convention.near_ndc(), convention.far_ndc());
        let corners = std::array::from_fn(|i| {
            let x = if i & 1 != 0 { 1.0 } else { -1.0 };
            let y = if i & 2 != 0 { 1.0 } else { -1.0 };
            let z = if i & 4 != 0 { zf } else { zn };
            transform_point(&inv, &Vec3::new(x, y, z))
        });

        Self { planes, corners }
    }

    /// Planes as `(nx, ny, nz, d)` in left, right, top, bottom, near, far order.
    pub fn plane_equations(&self) -> [Vec4; FRUSTUM_PLANE_COUNT] {
        self.planes.map(|p| p.to_vec4())
    }

    /// Returns true if `point` is inside or on every plane.
    pub fn contains(&self, point: &Vec3) -> bool {
        self.planes
            .iter()
            .all(|p| p.signed_distance(point) >= -1e-4)
    }
}

/// Classify the depth convention of a GPU projection.
///
/// Perspective projections store `±(1|2) * f * n / (f - n)` in `[2][3]`; the
/// magnitude gives the depth range and the sign the direction. Orthographic
/// projections are classified by projecting the near and far planes.
pub fn classify_depth(proj: &Mat4, near: f32, far: f32) -> DepthConvention {
    if is_orthographic(proj) {
        let zn = transform_point(proj, &Vec3::new(0.0, 0.0, -near)).z;
        let zf = transform_point(proj, &Vec3::new(0.0, 0.0, -far)).z;
        return DepthConvention {
            reversed_z: zn > zf,
            zero_to_one: zn.min(zf) > -0.5,
        };
    }

    let scale = proj[(2, 3)] / (far * near) * (far - near);
    DepthConvention {
        reversed_z: scale > 0.0,
        zero_to_one: scale.abs() < 1.5,
    }
}

/// Everything derived from a projection for culling and depth reconstruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumExtraction {
    pub frustum: Frustum,
    pub convention: DepthConvention,
    /// Linear depth reconstruction terms.
    pub z_buffer_params: Vec4,
    /// `(flip ? -1 : 1, near, far, 1 / far)`.
    pub projection_params: Vec4,
    /// `(ortho_width, ortho_height, 0, is_ortho)`.
    pub ortho_params: Vec4,
}

/// Orthographic extents, when the camera is orthographic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoExtent {
    /// Half of the vertical extent.
    pub size: f32,
    /// Width over height.
    pub aspect: f32,
}

/// Classify `proj` and derive the frustum of `view_proj` plus shader parameters.
pub fn extract_frustum(
    proj: &Mat4,
    inv_proj: &Mat4,
    view_proj: &Mat4,
    near: f32,
    far: f32,
    ortho: Option<OrthoExtent>,
) -> FrustumExtraction {
    let (n, f) = (near, far);
    let convention = classify_depth(proj, n, f);
    let flip = transform_point(inv_proj, &Vec3::new(0.0, 1.0, 0.0)).y < 0.0;

    // Ref: http://www.humus.name/temp/Linearize%20depth.txt
    let z_buffer_params = if convention.reversed_z {
        Vec4::new(-1.0 + f / n, 1.0, -1.0 / f + 1.0 / n, 1.0 / f)
    } else {
        Vec4::new(1.0 - f / n, f / n, 1.0 / f - 1.0 / n, 1.0 / n)
    };

    let projection_params = Vec4::new(if flip { -1.0 } else { 1.0 }, n, f, 1.0 / f);

    let ortho_params = match ortho {
        Some(extent) => {
            let height = 2.0 * extent.size;
            Vec4::new(height * extent.aspect, height, 0.0, 1.0)
        }
        None => Vec4::zeros(),
    };

    FrustumExtraction {
        frustum: Frustum::from_view_projection(view_proj, convention),
        convention,
        z_buffer_params,
        projection_params,
        ortho_params,
    }
}
