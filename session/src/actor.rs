use engine::{
    Cell, EngineCommand, EngineError, EngineEvent, GomokuEngine, RealtimeKind, StatEvent,
    DEFAULT_BOARD_SIZE,
};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, Instant};

use crate::commands::{BalanceMode, SessionCommand, SessionError, ThinkOptions, ThinkReply};
use crate::events::SessionEvent;
use crate::state::SessionState;

/// Upper bound on engine response latency for one think.
const WATCHDOG_BUDGET: Duration = Duration::from_secs(30);

/// Evaluation string an engine emits when its internal state is poisoned:
/// a loss in zero plies. Treated like a watchdog expiry.
const FAULT_EVAL: &str = "-M0";

/// The main session actor loop.
/// Owns all mutable state. Processes commands, engine events, and watchdog
/// expiry sequentially — nothing else touches the state.
pub(crate) async fn run_session_actor(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    if state.engine.is_none() {
        if let Err(e) = init_engine(&mut state).await {
            tracing::error!("Initial engine start failed: {}", e);
            state.push_message(format!("Engine failed to start: {}", e));
            let _ = event_tx.send(SessionEvent::Error(format!("Engine failed to start: {}", e)));
        }
    }

    loop {
        // Copied out so the select arm does not hold a borrow on the state.
        let watchdog_deadline = state.watchdog.deadline();

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Shutdown) | None => {
                        tracing::info!("Session actor shutting down");
                        state.resolve_pending(Ok(None));
                        if let Some(engine) = state.engine.take() {
                            engine.shutdown().await;
                        }
                        break;
                    }
                    Some(cmd) => handle_command(&mut state, cmd, &event_tx).await,
                }
            }

            Some(engine_event) = state.next_engine_event() => {
                handle_engine_event(&mut state, engine_event, &event_tx).await;
            }

            _ = sleep_until_or_forever(watchdog_deadline), if watchdog_deadline.is_some() => {
                tracing::warn!("Watchdog expired, recovering");
                enter_fault(&mut state, &event_tx, "engine did not respond in time");
            }
        }
    }

    tracing::info!("Session actor exited");
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn handle_command(
    state: &mut SessionState,
    cmd: SessionCommand,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match cmd {
        SessionCommand::Think {
            position,
            board_size,
            options,
            reply,
        } => {
            handle_think(state, position, board_size, options, reply).await;
            let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
        }
        SessionCommand::Stop { reply } => {
            let hard = handle_stop(state).await;
            let _ = reply.send(hard);
            let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
        }
        SessionCommand::Restart { reply } => {
            handle_restart(state);
            let _ = reply.send(());
            let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
        }
        SessionCommand::ForceRestart { reply } => {
            let ok = handle_force_restart(state, event_tx).await;
            let _ = reply.send(ok);
            let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
        }
        SessionCommand::CheckForbid {
            position,
            board_size,
            reply,
        } => {
            check_forbid(state, &position, board_size).await;
            let _ = reply.send(());
        }
        SessionCommand::UpdateSettings { settings, reply } => {
            state.settings = settings;
            let _ = reply.send(());
        }
        SessionCommand::GetSnapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
        SessionCommand::Subscribe { reply } => {
            let _ = reply.send((state.snapshot(), event_tx.subscribe()));
        }
        SessionCommand::Shutdown => unreachable!(),
    }
}

/// Start a think cycle: reconfigure, restart the engine session if the
/// board changed, submit the position, kick off the search, arm the
/// watchdog, and park the reply as the pending continuation.
async fn handle_think(
    state: &mut SessionState,
    position: Vec<Cell>,
    board_size: u8,
    options: ThinkOptions,
    reply: ThinkReply,
) {
    tracing::debug!(
        stones = position.len(),
        board_size,
        "Think requested (ready={}, thinking={})",
        state.ready,
        state.thinking
    );

    if !state.ready {
        state.push_message("Engine is not ready!");
        let _ = reply.send(Err(SessionError::EngineNotReady));
        return;
    }

    // A superseded request must still resolve; its caller cannot be left
    // waiting on a continuation slot we are about to reuse.
    state.resolve_pending(Ok(None));

    if position != state.last_think_position
        || state.restart_pending
        || state.start_size != board_size
    {
        tracing::debug!("Board changed since last think, forcing session restart");
        state.restart_pending = true;
    }

    state.thinking = true;
    state.engine_faulted = false;
    state.outputs.swap_requested = false;
    state.clear_messages();

    reload_config(state).await;
    update_hash_size(state).await;
    send_info(state).await;

    if state.restart_pending || state.start_size != board_size {
        state.send(EngineCommand::Start { size: board_size }).await;
        state.restart_pending = false;
        state.start_size = board_size;
        state.clear_used_time();
    }

    let time_left = state
        .settings
        .match_time_ms
        .saturating_sub(state.time_used_ms)
        .max(1);
    state
        .send(EngineCommand::Info {
            key: "TIME_LEFT".into(),
            value: time_left.to_string(),
        })
        .await;

    state
        .send(EngineCommand::Board {
            position: position.clone(),
            immediate: false,
        })
        .await;
    state.set_think_start();
    state.last_think_position = position;
    state.clear_output();

    match options.balance_mode {
        Some(BalanceMode::One) => {
            state
                .send(EngineCommand::BalanceOne(options.balance_bias))
                .await
        }
        Some(BalanceMode::Two) => {
            state
                .send(EngineCommand::BalanceTwo(options.balance_bias))
                .await
        }
        None => state.send(EngineCommand::NBest(state.settings.nbest)).await,
    }

    state.watchdog.arm(WATCHDOG_BUDGET);
    state.pending = Some(reply);
}

/// Interrupt the current think. Returns `true` iff the engine had to be
/// hard-terminated.
async fn handle_stop(state: &mut SessionState) -> bool {
    state.watchdog.disarm();
    // Resolve and clear the continuation first so no late engine event can
    // reach a caller that asked to stop.
    state.resolve_pending(Ok(None));

    if !state.thinking {
        state.restart_pending = true;
        return false;
    }

    state.outputs.realtime_best.clear();
    state.outputs.realtime_lost.clear();

    let hard = match state.engine.as_mut() {
        Some(engine) => engine.stop_thinking().await,
        None => false,
    };
    if hard {
        tracing::info!("Engine hard-terminated by stop");
        state.ready = false;
        state.current_config = None;
        state.hash_size_mb = None;
    }

    state.add_used_time();
    state.table.sort(state.outputs.position);
    state.thinking = false;
    state.restart_pending = true;
    hard
}

fn handle_restart(state: &mut SessionState) {
    state.restart_pending = true;
    state.clear_used_time();
    state.clear_output();
}

/// Full reset: tear the engine down, wipe every cached identifier, and
/// start over. Re-initialization failure is reported, not fatal.
async fn handle_force_restart(
    state: &mut SessionState,
    event_tx: &broadcast::Sender<SessionEvent>,
) -> bool {
    state.watchdog.disarm();
    state.resolve_pending(Ok(None));
    state.thinking = false;
    state.restart_pending = true;
    state.outputs.realtime_best.clear();
    state.outputs.realtime_lost.clear();
    state.ready = false;
    state.engine_faulted = false;
    state.current_config = None;
    state.hash_size_mb = None;
    state.start_size = DEFAULT_BOARD_SIZE;
    state.engine_options.board_size = DEFAULT_BOARD_SIZE;
    state.clear_used_time();

    if let Some(engine) = state.engine.take() {
        engine.shutdown().await;
    }

    match init_engine(state).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Engine restart failed: {}", e);
            state.push_message(format!("Engine restart failed: {}", e));
            let _ = event_tx.send(SessionEvent::Error(format!("Engine restart failed: {}", e)));
            false
        }
    }
}

async fn init_engine(state: &mut SessionState) -> Result<(), EngineError> {
    state.loading_progress = 0.0;
    state.ready = false;
    let engine = GomokuEngine::spawn(state.engine_options.clone()).await?;
    state.push_message(format!("Engine: {}", engine.label()));
    state.engine = Some(engine);
    Ok(())
}

/// Query forbidden cells for the given position. Stale marks are cleared
/// up front; the fresh list arrives later through the event stream.
async fn check_forbid(state: &mut SessionState, position: &[Cell], board_size: u8) {
    state.outputs.forbid_cells.clear();
    if !state.ready {
        tracing::debug!("Forbid check skipped, engine not ready");
        return;
    }
    if !state.settings.rule.has_forbidden_moves() {
        return;
    }

    send_info(state).await;
    if state.restart_pending || state.start_size != board_size {
        state.send(EngineCommand::Start { size: board_size }).await;
        state.restart_pending = false;
        state.start_size = board_size;
    }
    state
        .send(EngineCommand::Board {
            position: position.to_vec(),
            immediate: false,
        })
        .await;
    state.send(EngineCommand::ShowForbid).await;
}

/// Send the full `INFO` block derived from the current settings.
async fn send_info(state: &SessionState) {
    let s = &state.settings;
    let fields = [
        ("RULE", s.rule.code().to_string()),
        ("THREAD_NUM", s.threads.max(1).to_string()),
        ("CAUTION_FACTOR", s.caution_factor.to_string()),
        ("STRENGTH", s.strength.to_string()),
        ("TIMEOUT_TURN", s.turn_time_ms.to_string()),
        ("TIMEOUT_MATCH", s.match_time_ms.to_string()),
        ("MAX_DEPTH", s.max_depth.to_string()),
        ("MAX_NODE", s.max_nodes.to_string()),
        ("SHOW_DETAIL", if s.show_detail { "3" } else { "2" }.into()),
        ("PONDERING", if s.pondering { "1" } else { "0" }.into()),
        ("SWAPABLE", if s.swapable { "1" } else { "0" }.into()),
    ];
    for (key, value) in fields {
        state
            .send(EngineCommand::Info {
                key: key.into(),
                value,
            })
            .await;
    }
}

/// Ask the engine to reload its config preset, skipped when unchanged.
async fn reload_config(state: &mut SessionState) {
    if state.current_config == Some(state.settings.config_index) {
        return;
    }
    state.current_config = Some(state.settings.config_index);
    state
        .send(EngineCommand::ReloadConfig(
            state.settings.config_name().to_string(),
        ))
        .await;
}

/// Re-send the hash size, skipped when unchanged.
async fn update_hash_size(state: &mut SessionState) {
    if state.hash_size_mb == Some(state.settings.hash_size_mb) {
        return;
    }
    let hash_mb = state.settings.hash_size_mb;
    state.hash_size_mb = Some(hash_mb);
    state
        .send(EngineCommand::Info {
            key: "HASH_SIZE".into(),
            value: (u64::from(hash_mb) * 1024).to_string(),
        })
        .await;
    state.push_message(format!("Hash size reset to {} MB.", hash_mb));
}

async fn handle_engine_event(
    state: &mut SessionState,
    event: EngineEvent,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match event {
        EngineEvent::Ready => {
            // A process engine answers every START; only the not-ready →
            // ready transition is a lifecycle change.
            if !state.ready {
                tracing::info!("Engine ready");
                state.ready = true;
                state.loading_progress = 1.0;
                state.push_message("Engine ready.");
                let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
                if state.settings.rule.has_forbidden_moves() {
                    let position = state.last_think_position.clone();
                    let board_size = state.start_size;
                    check_forbid(state, &position, board_size).await;
                }
            }
        }
        EngineEvent::Progress(progress) => {
            state.loading_progress = progress;
        }
        EngineEvent::Realtime { kind, cell } => {
            // Markers from a superseded search would point at stale board
            // state; only track them while a think is in flight.
            if state.thinking {
                match kind {
                    RealtimeKind::Best => {
                        state.outputs.realtime_best.clear();
                        state.outputs.realtime_best.push(cell);
                    }
                    RealtimeKind::Lost => state.outputs.realtime_lost.push(cell),
                }
            }
        }
        EngineEvent::Stat(stat) => handle_stat(state, stat, event_tx),
        EngineEvent::TerminalMove(cell) => handle_terminal_move(state, cell, event_tx),
        EngineEvent::Swap(requested) => {
            state.outputs.swap_requested = requested;
        }
        EngineEvent::ForbidList(cells) => {
            state.outputs.forbid_cells = cells;
            let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
        }
        EngineEvent::Error(message) => {
            tracing::error!("Engine error: {}", message);
            state.outputs.last_error = Some(message.clone());
            state.push_message(format!("Error: {}", message));
            let _ = event_tx.send(SessionEvent::Error(message));
        }
        EngineEvent::Message(text) => {
            state.outputs.last_message = Some(text.clone());
            state.push_message(text.clone());
            let _ = event_tx.send(SessionEvent::EngineMessage(text));
        }
    }
}

fn handle_stat(
    state: &mut SessionState,
    stat: StatEvent,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match stat {
        StatEvent::PvIndex(index) => {
            state.outputs.current_pv_index = index.unwrap_or(0);
        }
        StatEvent::TotalNodes(nodes) => state.outputs.total_nodes = nodes,
        StatEvent::TotalTimeMs(ms) => state.outputs.total_time_ms = ms,
        StatEvent::Speed(nps) => state.outputs.speed_nps = nps,
        StatEvent::Eval(ref eval) => {
            state
                .table
                .set_field(state.outputs.current_pv_index, &stat);
            // The sentinel is handled once; repeats from the same broken
            // search are ignored.
            if eval == FAULT_EVAL && state.thinking && !state.engine_faulted {
                enter_fault(state, event_tx, "engine reported a poisoned evaluation");
            }
        }
        StatEvent::Depth(_)
        | StatEvent::Seldepth(_)
        | StatEvent::Nodes(_)
        | StatEvent::Winrate(_)
        | StatEvent::BestLine(_) => {
            state
                .table
                .set_field(state.outputs.current_pv_index, &stat);
        }
    }
}

/// The search answered. Resolve the pending continuation with the reported
/// cell, falling back to the top variation's first move when the engine had
/// none to report (forced-mate lines).
fn handle_terminal_move(
    state: &mut SessionState,
    cell: Option<Cell>,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    if !state.thinking {
        tracing::debug!("Dropping stale terminal move: {:?}", cell);
        return;
    }

    state.watchdog.disarm();

    let final_cell =
        cell.or_else(|| state.table.get(0).and_then(|v| v.best_line.first().copied()));
    if cell.is_none() && final_cell.is_some() {
        tracing::debug!("Empty terminal move, using top best line: {:?}", final_cell);
    }

    state.outputs.position = final_cell;
    state.add_used_time();
    if let Some(resolved) = final_cell {
        state.outputs.realtime_best = vec![resolved];
    }
    state.outputs.realtime_lost.clear();
    state.table.sort(state.outputs.position);
    state.thinking = false;

    state.resolve_pending(Ok(final_cell));
    let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
}

/// Shared recovery for watchdog expiry and the sentinel evaluation: abort
/// the think, mark the engine faulted, and schedule a session restart.
fn enter_fault(
    state: &mut SessionState,
    event_tx: &broadcast::Sender<SessionEvent>,
    reason: &str,
) {
    state.watchdog.disarm();
    state.engine_faulted = true;
    state.thinking = false;
    state.ready = false;
    state.restart_pending = true;
    state.outputs.realtime_best.clear();
    state.outputs.realtime_lost.clear();
    state.add_used_time();
    state.resolve_pending(Ok(None));
    state.push_message(format!("Engine fault: {}", reason));
    let _ = event_tx.send(SessionEvent::Error(format!("Engine fault: {}", reason)));
    let _ = event_tx.send(SessionEvent::StateChanged(state.snapshot()));
}
