/// Recording session state machine.
///
/// State transitions:
/// ```text
/// configuring → capturing → draining → stopped
///      │                                  ↑
///      └──────────── (setup failure) ─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Encoder, capture source and output sink are being set up.
    #[default]
    Configuring,
    /// The poll loop is running.
    Capturing,
    /// The loop has exited; metadata and teardown are in progress.
    Draining,
    Stopped,
}

impl SessionState {
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuring => "configuring",
            Self::Capturing => "capturing",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}
