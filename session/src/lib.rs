//! Orchestration core for a single external Gomoku engine.
//!
//! One actor task owns all mutable state; caller commands, engine events,
//! and the think watchdog are serialized through its `select!` loop. The
//! cloneable [`SessionHandle`] is the public API.

pub mod commands;
pub mod events;
pub mod handle;
pub mod settings;
pub mod snapshot;
pub mod variations;

mod actor;
mod state;
mod watchdog;

use engine::{EngineOptions, GomokuEngine};
use tokio::sync::{broadcast, mpsc};

use actor::run_session_actor;
pub use commands::{BalanceMode, SessionError, ThinkOptions};
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use settings::{Rule, SearchSettings, CONFIGS};
pub use snapshot::OutputSnapshot;
pub use variations::{Variation, VariationTable};

use state::SessionState;

/// Spawn a session that starts its own engine process.
pub fn spawn(engine_options: EngineOptions, settings: SearchSettings) -> SessionHandle {
    spawn_state(SessionState::new(engine_options, settings))
}

/// Spawn a session around an already-connected engine (e.g. one built with
/// [`GomokuEngine::from_channels`]).
pub fn spawn_with_engine(engine: GomokuEngine, settings: SearchSettings) -> SessionHandle {
    let mut state = SessionState::new(engine.options().clone(), settings);
    state.engine = Some(engine);
    spawn_state(state)
}

fn spawn_state(state: SessionState) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(100);
    tokio::spawn(run_session_actor(state, cmd_rx, event_tx));
    SessionHandle::new(cmd_tx)
}
