use serde::{Deserialize, Serialize};

/// Config presets the engine can be asked to reload, indexed by
/// [`SearchSettings::config_index`].
pub const CONFIGS: &[&str] = &["", "rapid.toml", "quality.toml"];

/// Game rule variant. Only [`Rule::Renju`] has forbidden cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    Freestyle,
    Standard,
    Renju,
}

impl Rule {
    /// Numeric code used on the wire (`INFO RULE`).
    pub fn code(self) -> u8 {
        match self {
            Rule::Freestyle => 0,
            Rule::Standard => 1,
            Rule::Renju => 4,
        }
    }

    pub fn has_forbidden_moves(self) -> bool {
        matches!(self, Rule::Renju)
    }
}

/// Search configuration sent to the engine as an `INFO` block before every
/// think. Updatable at runtime; idempotence of the config/hash re-sends is
/// tracked by the session, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub rule: Rule,
    pub threads: u32,
    pub strength: u32,
    pub caution_factor: u32,
    /// Per-turn budget in milliseconds (`TIMEOUT_TURN`).
    pub turn_time_ms: u64,
    /// Whole-game budget in milliseconds (`TIMEOUT_MATCH`).
    pub match_time_ms: u64,
    pub max_depth: u32,
    pub max_nodes: u64,
    /// How many ranked variations to search for (`YXNBEST`).
    pub nbest: u32,
    pub hash_size_mb: u32,
    /// Index into [`CONFIGS`].
    pub config_index: usize,
    pub show_detail: bool,
    pub pondering: bool,
    pub swapable: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            rule: Rule::Freestyle,
            threads: 1,
            strength: 100,
            caution_factor: 0,
            turn_time_ms: 5_000,
            match_time_ms: 180_000,
            max_depth: 64,
            max_nodes: 0,
            nbest: 1,
            hash_size_mb: 128,
            config_index: 0,
            show_detail: true,
            pondering: false,
            swapable: false,
        }
    }
}

impl SearchSettings {
    pub fn config_name(&self) -> &'static str {
        CONFIGS.get(self.config_index).copied().unwrap_or("")
    }
}
