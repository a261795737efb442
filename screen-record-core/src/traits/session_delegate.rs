use crate::models::error::RecordError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;

/// Event delegate for recording session notifications.
///
/// All methods are called from the thread running the session loop.
pub trait SessionDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: SessionState);

    /// Called when the session fails, after teardown has been attempted.
    fn on_error(&self, error: &RecordError);

    /// Called once the output is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
