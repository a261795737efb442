use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request shared with the recording loop.
///
/// Clones share one flag. Raising it is a single atomic store, so it can be
/// done from another thread or a signal handler; the loop notices it at the
/// top of its next iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// The underlying flag, for handing to code that only knows `AtomicBool`.
    pub fn as_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.requested)
    }
}
