use engine::{Cell, EngineCommand, EngineEvent, EngineOptions, GomokuEngine};
use std::collections::VecDeque;
use tokio::time::Instant;

use crate::commands::{SessionError, ThinkReply};
use crate::settings::SearchSettings;
use crate::snapshot::OutputSnapshot;
use crate::variations::VariationTable;
use crate::watchdog::WatchdogTimer;

/// Bounded message log capacity. Oldest entries are dropped.
const MESSAGE_LOG_CAP: usize = 128;

/// Published output owned by the session. Callers only ever see copies.
#[derive(Debug, Default)]
pub(crate) struct Outputs {
    pub position: Option<Cell>,
    pub swap_requested: bool,
    pub current_pv_index: usize,
    pub total_nodes: u64,
    pub speed_nps: u64,
    pub total_time_ms: u64,
    pub last_message: Option<String>,
    pub realtime_best: Vec<Cell>,
    pub realtime_lost: Vec<Cell>,
    pub forbid_cells: Vec<Cell>,
    pub last_error: Option<String>,
}

/// Internal mutable state, owned entirely by the session actor. No locks.
pub(crate) struct SessionState {
    pub engine_options: EngineOptions,
    pub engine: Option<GomokuEngine>,
    pub settings: SearchSettings,
    pub ready: bool,
    pub thinking: bool,
    pub restart_pending: bool,
    pub engine_faulted: bool,
    /// Board size of the engine's current `START` session.
    pub start_size: u8,
    pub last_think_position: Vec<Cell>,
    pub time_used_ms: u64,
    think_started_at: Option<Instant>,
    /// Idempotence keys for the config/hash re-sends.
    pub current_config: Option<usize>,
    pub hash_size_mb: Option<u32>,
    pub loading_progress: f64,
    pub outputs: Outputs,
    pub table: VariationTable,
    pub watchdog: WatchdogTimer,
    /// The single pending think continuation. Resolving it always goes
    /// through [`Self::resolve_pending`], which clears the slot first.
    pub pending: Option<ThinkReply>,
    messages: VecDeque<String>,
}

impl SessionState {
    pub fn new(engine_options: EngineOptions, settings: SearchSettings) -> Self {
        let start_size = engine_options.board_size;
        Self {
            engine_options,
            engine: None,
            settings,
            ready: false,
            thinking: false,
            restart_pending: false,
            engine_faulted: false,
            start_size,
            last_think_position: Vec::new(),
            time_used_ms: 0,
            think_started_at: None,
            current_config: None,
            hash_size_mb: None,
            loading_progress: 0.0,
            outputs: Outputs::default(),
            table: VariationTable::default(),
            watchdog: WatchdogTimer::default(),
            pending: None,
            messages: VecDeque::new(),
        }
    }

    /// Build a full snapshot of the published output.
    pub fn snapshot(&self) -> OutputSnapshot {
        OutputSnapshot {
            position: self.outputs.position,
            swap_requested: self.outputs.swap_requested,
            current_pv_index: self.outputs.current_pv_index,
            variations: self.table.slots().to_vec(),
            total_nodes: self.outputs.total_nodes,
            speed_nps: self.outputs.speed_nps,
            total_time_ms: self.outputs.total_time_ms,
            last_message: self.outputs.last_message.clone(),
            realtime_best: self.outputs.realtime_best.clone(),
            realtime_lost: self.outputs.realtime_lost.clone(),
            forbid_cells: self.outputs.forbid_cells.clone(),
            last_error: self.outputs.last_error.clone(),
            board_size: self.start_size,
            ready: self.ready,
            thinking: self.thinking,
            loading_progress: self.loading_progress,
        }
    }

    /// Try to receive the next engine event; pends while no engine exists.
    pub async fn next_engine_event(&mut self) -> Option<EngineEvent> {
        match self.engine.as_mut() {
            Some(engine) => engine.recv_event().await,
            None => std::future::pending().await,
        }
    }

    /// Queue a command for the engine. Send failures are absorbed here;
    /// the watchdog covers the case of an engine that stopped listening.
    pub async fn send(&self, cmd: EngineCommand) {
        match self.engine.as_ref() {
            Some(engine) => {
                if let Err(e) = engine.send_command(cmd).await {
                    tracing::error!("Failed to queue engine command: {}", e);
                }
            }
            None => tracing::warn!("No engine attached, dropping command: {:?}", cmd),
        }
    }

    /// Resolve the pending think continuation exactly once. The slot is
    /// cleared before the send so a re-entrant event cannot double-resolve.
    pub fn resolve_pending(&mut self, result: Result<Option<Cell>, SessionError>) {
        if let Some(reply) = self.pending.take() {
            let _ = reply.send(result);
        }
    }

    pub fn push_message(&mut self, message: impl Into<String>) {
        if self.messages.len() == MESSAGE_LOG_CAP {
            self.messages.pop_front();
        }
        self.messages.push_back(message.into());
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    #[cfg(test)]
    pub fn messages(&self) -> &VecDeque<String> {
        &self.messages
    }

    pub fn set_think_start(&mut self) {
        self.think_started_at = Some(Instant::now());
    }

    /// Fold the elapsed portion of the current think into the used-time
    /// account.
    pub fn add_used_time(&mut self) {
        if let Some(started) = self.think_started_at.take() {
            self.time_used_ms += started.elapsed().as_millis() as u64;
        }
    }

    pub fn clear_used_time(&mut self) {
        self.time_used_ms = 0;
        self.think_started_at = None;
    }

    /// Reseed the streamed output for a fresh think. Forbid marks persist
    /// until the next explicit forbid check.
    pub fn clear_output(&mut self) {
        self.table.reset();
        self.outputs.position = None;
        self.outputs.current_pv_index = 0;
        self.outputs.total_nodes = 0;
        self.outputs.speed_nps = 0;
        self.outputs.realtime_best.clear();
        self.outputs.realtime_lost.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> SessionState {
        SessionState::new(EngineOptions::new("test-engine"), SearchSettings::default())
    }

    #[test]
    fn test_initial_snapshot() {
        let state = test_state();
        let snap = state.snapshot();
        assert!(!snap.ready);
        assert!(!snap.thinking);
        assert_eq!(snap.variations.len(), 1);
        assert_eq!(snap.variations[0].eval, "-");
        assert_eq!(snap.board_size, engine::DEFAULT_BOARD_SIZE);
    }

    #[test]
    fn test_clear_output_keeps_forbid_cells() {
        let mut state = test_state();
        state.outputs.forbid_cells = vec![Cell::new(1, 1)];
        state.outputs.position = Some(Cell::new(7, 7));
        state.outputs.realtime_best = vec![Cell::new(7, 7)];
        state.clear_output();
        assert_eq!(state.outputs.forbid_cells, vec![Cell::new(1, 1)]);
        assert!(state.outputs.position.is_none());
        assert!(state.outputs.realtime_best.is_empty());
    }

    #[test]
    fn test_message_log_is_bounded() {
        let mut state = test_state();
        for i in 0..(MESSAGE_LOG_CAP + 10) {
            state.push_message(format!("msg {}", i));
        }
        assert_eq!(state.messages().len(), MESSAGE_LOG_CAP);
        assert_eq!(state.messages().front().unwrap(), "msg 10");
    }

    #[tokio::test]
    async fn test_resolve_pending_is_one_shot() {
        let mut state = test_state();
        let (tx, rx) = tokio::sync::oneshot::channel();
        state.pending = Some(tx);
        state.resolve_pending(Ok(Some(Cell::new(3, 4))));
        assert!(state.pending.is_none());
        // Second resolution is a no-op.
        state.resolve_pending(Ok(None));
        assert_eq!(rx.await.unwrap().unwrap(), Some(Cell::new(3, 4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_used_time_accumulates_across_thinks() {
        let mut state = test_state();
        state.set_think_start();
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        state.add_used_time();
        state.set_think_start();
        tokio::time::advance(std::time::Duration::from_millis(750)).await;
        state.add_used_time();
        assert_eq!(state.time_used_ms, 1_000);
        // add_used_time without a running think is a no-op.
        state.add_used_time();
        assert_eq!(state.time_used_ms, 1_000);
    }
}
