use crate::snapshot::OutputSnapshot;

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full output snapshot after a state mutation.
    StateChanged(OutputSnapshot),
    /// Human-readable engine message, also appended to the message log.
    EngineMessage(String),
    /// Error notification (engine-reported or recovery).
    Error(String),
}
