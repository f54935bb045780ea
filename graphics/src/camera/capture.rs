//! Frame capture hooks.
//!
//! Recorders register actions that receive the camera's final colour. The
//! input may be larger than the camera (scaled render targets), so actions
//! are handed a temporary target of exactly the camera's size together with
//! the scale needed to sample the valid region of the input.

use std::collections::VecDeque;
use std::fmt;

use aperture_core::math::Vec2;

use crate::error::GraphicsError;
use crate::resources::{RenderTargetDescriptor, RenderTargetHandle, RenderTargetSystem};
use crate::types::TextureUsage;

/// What a capture action gets to work with.
pub struct CaptureContext<'a> {
    /// Final colour of the camera, possibly larger than the camera.
    pub source: RenderTargetHandle,
    /// Temporary target of the camera's size. Released after all actions ran.
    pub target: RenderTargetHandle,
    /// Fraction of `source` covered by the camera.
    pub viewport_scale: Vec2,
    pub render_targets: &'a RenderTargetSystem,
}

/// A single capture callback.
pub type CaptureAction = Box<dyn FnMut(&CaptureContext<'_>) + Send + Sync>;

/// Pending capture actions of one camera.
#[derive(Default)]
pub struct CaptureQueue {
    actions: VecDeque<CaptureAction>,
}

impl CaptureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: CaptureAction) {
        self.actions.push_back(action);
    }

    pub fn has_pending(&self) -> bool {
        !self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Take the oldest pending action.
    pub fn next_action(&mut self) -> Option<CaptureAction> {
        self.actions.pop_front()
    }

    /// Drop every pending action without running it.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Run every pending action against `source`.
    ///
    /// Does nothing (and allocates nothing) when the queue is empty. Returns
    /// the number of actions run.
    pub fn execute(
        &mut self,
        source: RenderTargetHandle,
        render_targets: &mut RenderTargetSystem,
        width: u32,
        height: u32,
    ) -> Result<usize, GraphicsError> {
        if self.actions.is_empty() {
            return Ok(0);
        }

        let format = render_targets
            .get(source)
            .map(|target| target.descriptor().format)
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!(
                    "capture source {source:?} is not a live render target"
                ))
            })?;
        let scale = render_targets.rt_handle_scale();

        let target = render_targets.allocate(
            RenderTargetDescriptor::fixed(width, height, format)
                .with_label("TempCaptureActions")
                .with_usage(TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC),
        )?;

        let context = CaptureContext {
            source,
            target,
            viewport_scale: Vec2::new(scale.x, scale.y),
            render_targets: &*render_targets,
        };
        let mut count = 0;
        while let Some(mut action) = self.actions.pop_front() {
            action(&context);
            count += 1;
        }

        render_targets.release(target);
        log::trace!("CaptureQueue: ran {count} capture actions");
        Ok(count)
    }
}

impl fmt::Debug for CaptureQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureQueue")
            .field("pending", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::DummyRenderTargetBackend;
    use crate::types::TextureFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn system() -> (Arc<DummyRenderTargetBackend>, RenderTargetSystem) {
        let backend = Arc::new(DummyRenderTargetBackend::new());
        let mut rts = RenderTargetSystem::new(backend.clone());
        rts.set_reference_size(1920, 1080, Default::default()).unwrap();
        (backend, rts)
    }

    #[test]
    fn empty_queue_allocates_nothing() {
        let (backend, mut rts) = system();
        let source = rts
            .allocate(RenderTargetDescriptor::scaled(1.0, 1.0, TextureFormat::Rgba16Float))
            .unwrap();
        let before = backend.created_count();
        let mut queue = CaptureQueue::new();
        assert_eq!(queue.execute(source, &mut rts, 1280, 720).unwrap(), 0);
        assert_eq!(backend.created_count(), before);
    }

    #[test]
    fn actions_receive_camera_sized_target() {
        let (backend, mut rts) = system();
        rts.set_reference_size(1280, 720, Default::default()).unwrap();
        let source = rts
            .allocate(RenderTargetDescriptor::scaled(1.0, 1.0, TextureFormat::Rgba16Float))
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut queue = CaptureQueue::new();
        for _ in 0..2 {
            let seen = seen.clone();
            let calls = calls.clone();
            queue.push(Box::new(move |ctx: &CaptureContext<'_>| {
                let extent = ctx.render_targets.extent(ctx.target).unwrap();
                let format = ctx.render_targets.get(ctx.target).unwrap().descriptor().format;
                seen.lock().unwrap().push((extent.width, extent.height, format, ctx.viewport_scale));
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert!(queue.has_pending());

        let live_before = backend.live_count();
        assert_eq!(queue.execute(source, &mut rts, 1280, 720).unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!queue.has_pending());
        assert_eq!(backend.live_count(), live_before);

        let seen = seen.lock().unwrap();
        let (w, h, format, scale) = seen[0];
        assert_eq!((w, h), (1280, 720));
        assert_eq!(format, TextureFormat::Rgba16Float);
        assert!((scale.x - 1280.0 / 1920.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_source_is_an_error() {
        let (_backend, mut rts) = system();
        let mut queue = CaptureQueue::new();
        queue.push(Box::new(|_: &CaptureContext<'_>| {}));
        assert!(matches!(
            queue.execute(RenderTargetHandle(99), &mut rts, 8, 8),
            Err(GraphicsError::InvalidParameter(_))
        ));
        assert!(queue.has_pending());
    }

    #[test]
    fn next_action_is_fifo() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut queue = CaptureQueue::new();
        for i in 0..3 {
            let order = order.clone();
            queue.push(Box::new(move |_: &CaptureContext<'_>| order.lock().unwrap().push(i)));
        }
        let (_backend, rts) = system();
        let ctx = CaptureContext {
            source: RenderTargetHandle(0),
            target: RenderTargetHandle(1),
            viewport_scale: Vec2::new(1.0, 1.0),
            render_targets: &rts,
        };
        while let Some(mut action) = queue.next_action() {
            action(&ctx);
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }
}
