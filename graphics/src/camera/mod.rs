//! Per-camera render state and temporal history.
//!
//! Each frame the pipeline looks up a [`CameraState`] in its
//! [`CameraStateRegistry`], calls [`CameraState::update`] with the camera's
//! [`CameraDescriptor`], then [`CameraState::begin_render`] right before the
//! camera's passes run. The passes read view constants, the frustum and
//! history render targets from the state.

mod capture;
mod descriptor;
mod frustum;
mod history;
mod jitter;
mod registry;
mod shader_params;
mod state;
mod view_constants;

pub use capture::{CaptureAction, CaptureContext, CaptureQueue};
pub use descriptor::{
    AntialiasingMode, CameraDescriptor, CameraId, CameraOverrides, CameraTransform, CameraType,
    ClearColorMode, ClearFlags, FlipYMode, FrameSettings, PipelineConfig, PixelRect, Projection,
    ResolvedCameraSettings, SmaaQuality, UpdateContext, XrPass, XrView,
};
pub use frustum::{
    DepthConvention, FRUSTUM_CORNER_COUNT, FRUSTUM_PLANE_COUNT, Frustum, FrustumExtraction,
    OrthoExtent, Plane, classify_depth, extract_frustum,
};
pub use history::{HistoryBufferSystem, HistoryId};
pub use jitter::{JITTER_SAMPLE_COUNT, JitterSequence, JitterTarget, halton, jitter_projection};
pub use registry::{CameraLookup, CameraStateRegistry, CameraStatus};
pub use shader_params::{
    FrameTiming, GlobalShaderParams, GpuViewConstants, MAX_XR_VIEWS, ShaderParamSink,
};
pub use state::{CameraState, TemporalPhase};
pub use view_constants::{
    PixelDirection, PreviousFrameUpdate, ViewConstants, ViewConstantsComputer, ViewInput,
    pixel_coord_to_view_dir_matrix, pixel_view_direction,
};
