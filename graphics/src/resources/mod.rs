//! GPU resource bookkeeping.

mod render_target;

pub use render_target::{
    DummyRenderTargetBackend, GpuRenderTarget, RenderTarget, RenderTargetAllocation,
    RenderTargetBackend, RenderTargetDescriptor, RenderTargetHandle, RenderTargetSize,
    RenderTargetSystem,
};
