//! Pool of camera states owned by the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use super::descriptor::{CameraDescriptor, CameraId, CameraType, PipelineConfig};
use super::state::CameraState;
use crate::resources::RenderTargetBackend;

/// What the registry needs to know about a live camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraStatus {
    pub active: bool,
    pub camera_type: CameraType,
    pub has_persistent_history: bool,
}

impl From<&CameraDescriptor> for CameraStatus {
    fn from(desc: &CameraDescriptor) -> Self {
        Self {
            active: desc.active,
            camera_type: desc.camera_type,
            has_persistent_history: desc
                .overrides
                .as_ref()
                .is_some_and(|o| o.has_persistent_history),
        }
    }
}

/// Resolves camera ids to their current status. `None` means the camera is gone.
pub trait CameraLookup {
    fn status(&self, id: CameraId) -> Option<CameraStatus>;
}

impl<F> CameraLookup for F
where
    F: Fn(CameraId) -> Option<CameraStatus>,
{
    fn status(&self, id: CameraId) -> Option<CameraStatus> {
        self(id)
    }
}

impl CameraLookup for [CameraDescriptor] {
    fn status(&self, id: CameraId) -> Option<CameraStatus> {
        self.iter().find(|d| d.id == id).map(CameraStatus::from)
    }
}

/// Camera states keyed by camera and multi-pass index.
pub struct CameraStateRegistry {
    config: PipelineConfig,
    backend: Arc<dyn RenderTargetBackend>,
    states: HashMap<(CameraId, u32), CameraState>,
    cleanup: Vec<(CameraId, u32)>,
}

impl CameraStateRegistry {
    pub fn new(config: PipelineConfig, backend: Arc<dyn RenderTargetBackend>) -> Self {
        Self {
            config,
            backend,
            states: HashMap::new(),
            cleanup: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The state of `camera`, created on first use.
    pub fn get_or_create(&mut self, camera: CameraId, multipass_index: u32) -> &mut CameraState {
        self.states
            .entry((camera, multipass_index))
            .or_insert_with(|| {
                log::debug!("CameraStateRegistry: new state for {camera:?}/{multipass_index}");
                CameraState::new(camera, multipass_index, self.config, self.backend.clone())
            })
    }

    pub fn get(&self, camera: CameraId, multipass_index: u32) -> Option<&CameraState> {
        self.states.get(&(camera, multipass_index))
    }

    pub fn get_mut(&mut self, camera: CameraId, multipass_index: u32) -> Option<&mut CameraState> {
        self.states.get_mut(&(camera, multipass_index))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CameraState> {
        self.states.values()
    }

    /// Drop states of cameras that are gone or inactive.
    ///
    /// Editor viewports are never dropped. Previews and cameras with
    /// persistent history survive while inactive. Returns the number dropped.
    pub fn clean_unused<L: CameraLookup + ?Sized>(&mut self, lookup: &L) -> usize {
        aperture_core::profile_function!();

        for (key, state) in &self.states {
            let keep = match lookup.status(key.0) {
                None => false,
                Some(status) if status.camera_type == CameraType::SceneView => true,
                Some(status) => {
                    status.active
                        || status.camera_type == CameraType::Preview
                        || status.has_persistent_history
                }
            };
            if !keep {
                log::debug!("CameraStateRegistry: dropping unused state of {}", state.name());
                self.cleanup.push(*key);
            }
        }

        let count = self.cleanup.len();
        for key in self.cleanup.drain(..) {
            if let Some(mut state) = self.states.remove(&key) {
                state.dispose();
            }
        }
        aperture_core::profile_plot!("camera_states", self.states.len());
        count
    }

    /// Release every state.
    pub fn clear_all(&mut self) {
        for (_, mut state) in self.states.drain() {
            state.dispose();
        }
        self.cleanup.clear();
    }
}

impl Drop for CameraStateRegistry {
    fn drop(&mut self) {
        self.clear_all();
    }
}

impl std::fmt::Debug for CameraStateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStateRegistry")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("states", &self.states.len())
            .finish()
    }
}
