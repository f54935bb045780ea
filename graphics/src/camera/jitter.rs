//! Sub-pixel jitter for temporal anti-aliasing.
//!
//! Each render offsets the projection by a fraction of a pixel taken from the
//! Halton(2, 3) low-discrepancy sequence. TAA accumulates the jittered frames
//! into a supersampled result.

use std::num::NonZeroU32;

use aperture_core::math::{FrustumPlanes, Mat4, Vec2, decompose_perspective, frustum_gl, orthographic_gl};

/// Number of distinct jitter positions before the sequence repeats.
pub const JITTER_SAMPLE_COUNT: u32 = 8;

/// Radical inverse of `index` in `base`. Result lies in `[0, 1)`.
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut result = 0.0f32;
    let mut f = 1.0f32;
    let inv_base = 1.0 / base as f32;
    while index > 0 {
        f *= inv_base;
        result += f * (index % base) as f32;
        index /= base;
    }
    result
}

/// Deterministic Halton(2, 3) sample source.
///
/// Index 0 would yield `(0, 0)`, a visibly different sample from the rest
/// that destabilizes shadow maps, so indices start at 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct JitterSequence;

impl JitterSequence {
    /// The `index`-th sample, both components in `[0, 1)`.
    pub fn sample(index: NonZeroU32) -> Vec2 {
        Vec2::new(halton(index.get(), 2), halton(index.get(), 3))
    }

    /// Sample for a TAA frame counter, centered on the pixel (`[-0.5, 0.5)`).
    pub fn centered_offset(frame_index: u32) -> Vec2 {
        let index = NonZeroU32::MIN.saturating_add(frame_index & 1023);
        Self::sample(index) - Vec2::new(0.5, 0.5)
    }
}

/// Projection shape needed to jitter it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JitterTarget {
    /// Perspective projection; the near plane is sheared.
    Perspective,
    /// Orthographic projection with the given half height and aspect ratio.
    Orthographic {
        size: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
}

/// Offset an OpenGL-convention projection by `jitter` pixels.
///
/// `width` and `height` are the viewport size the jitter is expressed in.
pub fn jitter_projection(
    projection: &Mat4,
    jitter: Vec2,
    target: JitterTarget,
    width: f32,
    height: f32,
) -> Mat4 {
    match target {
        JitterTarget::Perspective => {
            let planes = decompose_perspective(projection);
            let vertical = planes.top.abs() + planes.bottom.abs();
            let horizontal = planes.left.abs() + planes.right.abs();
            let dx = jitter.x * horizontal / width;
            let dy = jitter.y * vertical / height;
            frustum_gl(&FrustumPlanes {
                left: planes.left + dx,
                right: planes.right + dx,
                bottom: planes.bottom + dy,
                top: planes.top + dy,
                ..planes
            })
        }
        JitterTarget::Orthographic {
            size,
            aspect,
            near,
            far,
        } => {
            let vertical = size;
            let horizontal = size * aspect;
            let dx = jitter.x * horizontal / (0.5 * width);
            let dy = jitter.y * vertical / (0.5 * height);
            orthographic_gl(
                dx - horizontal,
                dx + horizontal,
                dy - vertical,
                dy + vertical,
                near,
                far,
            )
        }
    }
}
