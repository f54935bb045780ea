//! # Aperture Core
//!
//! Math aliases, projection helpers and profiling macros shared by the
//! Aperture camera pipeline.

pub mod math;
pub mod profiling;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core crate version. Call once at startup.
pub fn init() {
    log::info!("Aperture Core v{} initialized", VERSION);
}
