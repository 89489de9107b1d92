use engine::Cell;
use serde::{Deserialize, Serialize};

use crate::variations::Variation;

/// Complete, immutable copy of the session's published output.
/// Handed to callers on request and broadcast on every state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSnapshot {
    /// The move chosen by the last completed think, if any.
    pub position: Option<Cell>,
    pub swap_requested: bool,
    /// Slot the next streamed per-variation stat will land in.
    pub current_pv_index: usize,
    pub variations: Vec<Variation>,
    pub total_nodes: u64,
    pub speed_nps: u64,
    pub total_time_ms: u64,
    pub last_message: Option<String>,
    pub realtime_best: Vec<Cell>,
    pub realtime_lost: Vec<Cell>,
    pub forbid_cells: Vec<Cell>,
    pub last_error: Option<String>,
    pub board_size: u8,
    pub ready: bool,
    pub thinking: bool,
    pub loading_progress: f64,
}

impl OutputSnapshot {
    /// The best line of one variation in display coordinates
    /// (`A<col><row>`, row counted from the top edge), space-separated.
    pub fn best_line_str(&self, pv_index: usize) -> String {
        let Some(variation) = self.variations.get(pv_index) else {
            return String::new();
        };
        variation
            .best_line
            .iter()
            .map(|cell| cell.to_display(self.board_size))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
