//! Format enums and usage flags for graphics resources.

mod texture;

pub use texture::{Extent3d, MsaaSamples, TextureFormat, TextureUsage};
