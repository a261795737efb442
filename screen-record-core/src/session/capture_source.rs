use crate::models::config::VideoSize;
use crate::models::display::{DisplayGeometry, ProjectionRect};
use crate::models::error::RecordError;
use crate::processing::projection::compute_projection;
use crate::traits::capture_surface::{CaptureHandle, CaptureSurfaceProvider};
use crate::traits::video_encoder::InputSurface;

/// Virtual display mirroring the physical display into the encoder surface.
///
/// Tracks the display orientation it was projected for and re-projects when
/// a newer geometry reports a different one.
pub struct CaptureSource<C: CaptureSurfaceProvider> {
    provider: C,
    handle: Option<CaptureHandle>,
    geometry: DisplayGeometry,
    projection: Option<ProjectionRect>,
    size: VideoSize,
    rotate: bool,
}

impl<C: CaptureSurfaceProvider> CaptureSource<C> {
    pub fn new(provider: C) -> Self {
        Self {
            provider,
            handle: None,
            geometry: DisplayGeometry::default(),
            projection: None,
            size: VideoSize::new(0, 0),
            rotate: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn projection(&self) -> Option<ProjectionRect> {
        self.projection
    }

    pub fn provider(&self) -> &C {
        &self.provider
    }

    /// Bind a virtual display to `surface` and apply the initial projection.
    pub fn start(
        &mut self,
        surface: &InputSurface,
        geometry: DisplayGeometry,
        size: VideoSize,
        rotate: bool,
    ) -> Result<ProjectionRect, RecordError> {
        if self.handle.is_some() {
            return Err(RecordError::CaptureSetup("capture source already started".into()));
        }

        let handle = self
            .provider
            .bind_to_input_surface(surface, geometry.layer_stack)
            .map_err(|e| setup_error("create virtual display", e))?;

        let projection = compute_projection(&geometry, size, rotate);
        if let Err(e) = self.provider.apply_projection(handle, &projection) {
            self.provider.release(handle);
            return Err(setup_error("set display projection", e));
        }

        self.handle = Some(handle);
        self.geometry = geometry;
        self.projection = Some(projection);
        self.size = size;
        self.rotate = rotate;
        Ok(projection)
    }

    /// Re-project if `geometry` has a different orientation than the one
    /// last applied. Returns whether a new projection was applied.
    pub fn update_geometry(&mut self, geometry: DisplayGeometry) -> Result<bool, RecordError> {
        let Some(handle) = self.handle else {
            return Ok(false);
        };
        if geometry.orientation == self.geometry.orientation {
            return Ok(false);
        }

        log::info!("orientation changed, now {}", geometry.orientation);
        let projection = compute_projection(&geometry, self.size, self.rotate);
        self.provider.apply_projection(handle, &projection)?;
        self.geometry = geometry;
        self.projection = Some(projection);
        Ok(true)
    }

    /// Detach from the encoder surface and destroy the virtual display.
    /// Idempotent.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::debug!("Destroying virtual display {:?}", handle);
            self.projection = None;
            self.provider.release(handle);
        }
    }
}

impl<C: CaptureSurfaceProvider> Drop for CaptureSource<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn setup_error(stage: &str, e: RecordError) -> RecordError {
    match e {
        RecordError::CaptureSetup(_) => e,
        other => RecordError::CaptureSetup(format!("unable to {}: {}", stage, other)),
    }
}
