/// Errors surfaced by the transport and message-bus collaborators. The
/// routing/dispatch path itself never fails: declaration problems produce
/// inert config, handler failures are isolated and logged, and
/// unresolvable publish targets are silent no-ops.
#[derive(Debug, thiserror::Error)]
pub enum SwitchboardError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("message bus error: {0}")]
    Bus(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwitchboardError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Bus(_) => "bus",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }
}
