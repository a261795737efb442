use crate::models::display::ProjectionRect;
use crate::models::error::RecordError;
use crate::traits::video_encoder::InputSurface;

/// Handle to a virtual display created by a [`CaptureSurfaceProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureHandle(pub u64);

/// Interface for the compositor-side capture mechanism.
///
/// Implementations create a virtual display that mirrors `layer_stack` into
/// the encoder's input surface.
pub trait CaptureSurfaceProvider: Send {
    /// Create a virtual display rendering `layer_stack` into `surface`.
    fn bind_to_input_surface(
        &mut self,
        surface: &InputSurface,
        layer_stack: u32,
    ) -> Result<CaptureHandle, RecordError>;

    /// Apply a projection to the virtual display as a single transaction.
    fn apply_projection(
        &mut self,
        handle: CaptureHandle,
        projection: &ProjectionRect,
    ) -> Result<(), RecordError>;

    /// Destroy the virtual display.
    fn release(&mut self, handle: CaptureHandle);
}
