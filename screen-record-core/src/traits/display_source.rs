use crate::models::display::DisplayGeometry;
use crate::models::error::RecordError;

/// Interface for reading the state of the physical display being recorded.
pub trait DisplaySource: Send {
    /// Current geometry. Called once at startup and again for every
    /// non-empty output buffer to catch orientation changes.
    fn display_geometry(&self) -> Result<DisplayGeometry, RecordError>;

    /// Refresh rate of the active display mode, in Hz.
    fn refresh_rate(&self) -> Result<f32, RecordError>;
}
