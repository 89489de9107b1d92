pub mod piskvork;
pub mod process;

pub use piskvork::{encode_command, parse_engine_message, ProtocolError};
pub use process::GomokuEngine;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Board size sent with the initial `START` and restored on a forced restart.
pub const DEFAULT_BOARD_SIZE: u8 = 15;

/// A zero-based board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: u8,
    pub y: u8,
}

impl Cell {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Display form: column letter from `x`, row counted down from the top
    /// edge (`board_size - y`).
    pub fn to_display(self, board_size: u8) -> String {
        let col = (b'A' + self.x) as char;
        format!("{}{}", col, board_size.saturating_sub(self.y))
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// How to reach and manage an engine instance.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub path: PathBuf,
    /// Board size for the `START` issued right after spawn.
    pub board_size: u8,
    /// Full builds run an input-polling thread and honor `STOP` mid-search.
    /// Reduced builds do not; stopping them means killing the process.
    pub full_engine: bool,
    pub label: Option<String>,
}

impl EngineOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            board_size: DEFAULT_BOARD_SIZE,
            full_engine: true,
            label: None,
        }
    }
}

/// Commands sent to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Start { size: u8 },
    Info { key: String, value: String },
    /// Send the whole position as a move list. The encoder alternates the
    /// side marker from the parity of the position length.
    Board { position: Vec<Cell>, immediate: bool },
    NBest(u32),
    BalanceOne(i64),
    BalanceTwo(i64),
    ShowForbid,
    ReloadConfig(String),
    Stop,
    Quit,
}

/// Events received from the engine, one per protocol line.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Weight-loading progress, `0.0..=1.0`.
    Progress(f64),
    /// Lifecycle ok — the engine accepted `START` and is ready for queries.
    Ready,
    Realtime { kind: RealtimeKind, cell: Cell },
    Stat(StatEvent),
    /// The searched move. `None` when the engine had no cell to report
    /// (e.g. a forced mate already on the board).
    TerminalMove(Option<Cell>),
    Swap(bool),
    ForbidList(Vec<Cell>),
    Error(String),
    Message(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeKind {
    Best,
    Lost,
}

/// A single streamed search statistic. Each protocol line carries at most
/// one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum StatEvent {
    /// `None` means the multipv block is done and the index resets to 0.
    PvIndex(Option<usize>),
    Depth(u32),
    Seldepth(u32),
    Nodes(u64),
    TotalNodes(u64),
    TotalTimeMs(u64),
    Speed(u64),
    /// Raw evaluation string: signed decimal, `+M<k>`/`-M<k>` mate
    /// notation, or `-` when unknown.
    Eval(String),
    Winrate(f64),
    BestLine(Vec<Cell>),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Engine has no {0}")]
    MissingStdio(&'static str),
    #[error("Engine command channel closed")]
    ChannelClosed,
}
