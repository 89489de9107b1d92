use engine::Cell;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::commands::{SessionCommand, SessionError, ThinkOptions};
use crate::events::SessionEvent;
use crate::settings::SearchSettings;
use crate::snapshot::OutputSnapshot;

/// Cheap, cloneable handle to a session actor.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub(crate) fn new(cmd_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Submit a position and wait for the engine's move.
    ///
    /// Resolves with `Ok(None)` when the think was superseded, stopped, or
    /// recovered from a fault; rejects immediately with
    /// [`SessionError::EngineNotReady`] when the engine is not up.
    pub async fn think(
        &self,
        position: Vec<Cell>,
        board_size: u8,
        options: ThinkOptions,
    ) -> Result<Option<Cell>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Think {
            position,
            board_size,
            options,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))?
    }

    /// Interrupt an in-flight think. Returns `true` iff the engine had to be
    /// hard-terminated.
    pub async fn stop(&self) -> Result<bool, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Stop { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    /// Schedule a fresh engine session before the next think.
    pub async fn restart(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Restart { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    /// Tear the engine down and start it again. Returns `false` when
    /// re-initialization failed; the session stays not-ready in that case.
    pub async fn force_restart(&self) -> Result<bool, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::ForceRestart { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    /// Query forbidden cells for a position. The result arrives through the
    /// event stream and lands in the output snapshot.
    pub async fn check_forbid(
        &self,
        position: Vec<Cell>,
        board_size: u8,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::CheckForbid {
            position,
            board_size,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn update_settings(&self, settings: SearchSettings) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::UpdateSettings {
            settings,
            reply: tx,
        })
        .await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn get_snapshot(&self) -> Result<OutputSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetSnapshot { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn subscribe(
        &self,
    ) -> Result<(OutputSnapshot, broadcast::Receiver<SessionEvent>), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe { reply: tx }).await?;
        rx.await
            .map_err(|_| SessionError::Internal("Reply dropped".into()))
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Internal("Session actor closed".into()))
    }
}
