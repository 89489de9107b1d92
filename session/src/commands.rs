use engine::Cell;
use tokio::sync::{broadcast, oneshot};

use crate::events::SessionEvent;
use crate::settings::SearchSettings;
use crate::snapshot::OutputSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Engine is not ready")]
    EngineNotReady,
    #[error("Engine failed to restart: {0}")]
    Reinitialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Balanced-opening search variants (`YXBALANCEONE` / `YXBALANCETWO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceMode {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThinkOptions {
    /// When set, search for a balanced opening instead of the best move.
    pub balance_mode: Option<BalanceMode>,
    pub balance_bias: i64,
}

/// Reply slot for a think request. Held by the session as the one pending
/// continuation; sending consumes it, so resolution is one-shot by
/// construction.
pub(crate) type ThinkReply = oneshot::Sender<Result<Option<Cell>, SessionError>>;

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
pub(crate) enum SessionCommand {
    Think {
        position: Vec<Cell>,
        board_size: u8,
        options: ThinkOptions,
        reply: ThinkReply,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    Restart {
        reply: oneshot::Sender<()>,
    },
    ForceRestart {
        reply: oneshot::Sender<bool>,
    },
    CheckForbid {
        position: Vec<Cell>,
        board_size: u8,
        reply: oneshot::Sender<()>,
    },
    UpdateSettings {
        settings: SearchSettings,
        reply: oneshot::Sender<()>,
    },
    GetSnapshot {
        reply: oneshot::Sender<OutputSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<(OutputSnapshot, broadcast::Receiver<SessionEvent>)>,
    },
    Shutdown,
}
