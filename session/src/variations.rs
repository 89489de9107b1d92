use engine::{Cell, StatEvent};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One ranked candidate line of play. Fields stream in incrementally while
/// the engine searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub depth: u32,
    pub seldepth: u32,
    pub nodes: u64,
    /// Raw evaluation string: decimal, `+M<k>`/`-M<k>`, or `-` when unknown.
    pub eval: String,
    pub winrate: f64,
    pub best_line: Vec<Cell>,
}

impl Default for Variation {
    fn default() -> Self {
        Self {
            depth: 0,
            seldepth: 0,
            nodes: 0,
            eval: "-".to_string(),
            winrate: 0.0,
            best_line: Vec::new(),
        }
    }
}

/// One slot per observed principal-variation index. A fresh table holds
/// exactly one default slot.
#[derive(Debug, Clone)]
pub struct VariationTable {
    slots: Vec<Variation>,
}

impl Default for VariationTable {
    fn default() -> Self {
        Self {
            slots: vec![Variation::default()],
        }
    }
}

impl VariationTable {
    /// Replace the table with a single default slot.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.slots.push(Variation::default());
    }

    pub fn get(&self, pv_index: usize) -> Option<&Variation> {
        self.slots.get(pv_index)
    }

    pub fn slots(&self) -> &[Variation] {
        &self.slots
    }

    /// Overwrite one field of the slot at `pv_index`, growing the table with
    /// default slots when the index is past the end.
    pub fn set_field(&mut self, pv_index: usize, field: &StatEvent) {
        if pv_index >= self.slots.len() {
            self.slots.resize_with(pv_index + 1, Variation::default);
        }
        let slot = &mut self.slots[pv_index];
        match field {
            StatEvent::Depth(d) => slot.depth = *d,
            StatEvent::Seldepth(d) => slot.seldepth = *d,
            StatEvent::Nodes(n) => slot.nodes = *n,
            StatEvent::Eval(e) => slot.eval = e.clone(),
            StatEvent::Winrate(w) => slot.winrate = *w,
            StatEvent::BestLine(line) => slot.best_line = line.clone(),
            // Aggregate stats and the pv cursor live on the session, not here.
            StatEvent::PvIndex(_)
            | StatEvent::TotalNodes(_)
            | StatEvent::TotalTimeMs(_)
            | StatEvent::Speed(_) => {}
        }
    }

    /// Rank in place: variations whose line starts at `current` first, the
    /// rest by descending evaluation. The sort is stable, so equal keys keep
    /// their streamed order.
    pub fn sort(&mut self, current: Option<Cell>) {
        self.slots.sort_by(|a, b| {
            let a_matches = current.is_some() && a.best_line.first().copied() == current;
            let b_matches = current.is_some() && b.best_line.first().copied() == current;
            match (a_matches, b_matches) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => eval_score(&b.eval)
                    .partial_cmp(&eval_score(&a.eval))
                    .unwrap_or(Ordering::Equal),
            }
        });
    }

    /// Ranked copy of the table, leaving the streamed order untouched.
    pub fn rank(&self, current: Option<Cell>) -> Vec<Variation> {
        let mut ranked = self.clone();
        ranked.sort(current);
        ranked.slots
    }
}

/// Map an evaluation string onto a sortable score. Mates rank outside the
/// numeric scale: `+M<k>` approaches `40000` as `k` shrinks, `-M<k>`
/// approaches `-40000`. Unparseable evals (including `-`) sort last.
pub fn eval_score(eval: &str) -> f64 {
    if let Ok(value) = eval.parse::<f64>() {
        return value;
    }
    if let Some(plies) = eval.strip_prefix("+M").and_then(|k| k.parse::<f64>().ok()) {
        return 40_000.0 - plies;
    }
    if let Some(plies) = eval.strip_prefix("-M").and_then(|k| k.parse::<f64>().ok()) {
        return -40_000.0 + plies;
    }
    -80_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_table_has_one_default_slot() {
        let table = VariationTable::default();
        assert_eq!(table.slots().len(), 1);
        assert_eq!(table.get(0).unwrap().eval, "-");
        assert!(table.get(0).unwrap().best_line.is_empty());
    }

    #[test]
    fn test_set_field_grows_sparse_indices() {
        let mut table = VariationTable::default();
        table.set_field(2, &StatEvent::Depth(9));
        assert_eq!(table.slots().len(), 3);
        assert_eq!(table.get(1).unwrap().eval, "-");
        assert_eq!(table.get(2).unwrap().depth, 9);
    }

    #[test]
    fn test_eval_score_total_order() {
        // "+M1" > "+M5" > "100" > "0" > "-100" > "-M5" > "-M1" > "-"
        let chain = ["+M1", "+M5", "100", "0", "-100", "-M5", "-M1", "-"];
        for pair in chain.windows(2) {
            assert!(
                eval_score(pair[0]) > eval_score(pair[1]),
                "expected {} > {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_mate_score_values() {
        let mut table = VariationTable::default();
        table.set_field(0, &StatEvent::Eval("+M3".into()));
        table.set_field(0, &StatEvent::Eval("+M3".into()));
        let ranked = table.rank(None);
        assert_eq!(ranked[0].eval, "+M3");
        assert_eq!(eval_score(&ranked[0].eval), 39_997.0);
    }

    #[test]
    fn test_rank_by_descending_eval() {
        let mut table = VariationTable::default();
        table.set_field(0, &StatEvent::Eval("-20".into()));
        table.set_field(1, &StatEvent::Eval("+M2".into()));
        table.set_field(2, &StatEvent::Eval("55".into()));
        let ranked = table.rank(None);
        let evals: Vec<&str> = ranked.iter().map(|v| v.eval.as_str()).collect();
        assert_eq!(evals, ["+M2", "55", "-20"]);
    }

    #[test]
    fn test_rank_puts_current_position_first() {
        let mut table = VariationTable::default();
        table.set_field(0, &StatEvent::Eval("300".into()));
        table.set_field(0, &StatEvent::BestLine(vec![Cell::new(1, 1)]));
        table.set_field(1, &StatEvent::Eval("-5".into()));
        table.set_field(1, &StatEvent::BestLine(vec![Cell::new(7, 7)]));
        let ranked = table.rank(Some(Cell::new(7, 7)));
        assert_eq!(ranked[0].best_line[0], Cell::new(7, 7));
        assert_eq!(ranked[1].eval, "300");
    }

    #[test]
    fn test_rank_is_stable_for_equal_keys() {
        let mut table = VariationTable::default();
        table.set_field(0, &StatEvent::Eval("10".into()));
        table.set_field(0, &StatEvent::Depth(1));
        table.set_field(1, &StatEvent::Eval("10".into()));
        table.set_field(1, &StatEvent::Depth(2));
        table.set_field(2, &StatEvent::Eval("10".into()));
        table.set_field(2, &StatEvent::Depth(3));
        let ranked = table.rank(None);
        let depths: Vec<u32> = ranked.iter().map(|v| v.depth).collect();
        assert_eq!(depths, [1, 2, 3]);
    }

    #[test]
    fn test_rank_preserves_order_among_matching_entries() {
        let mut table = VariationTable::default();
        table.set_field(0, &StatEvent::BestLine(vec![Cell::new(7, 7)]));
        table.set_field(0, &StatEvent::Eval("1".into()));
        table.set_field(1, &StatEvent::BestLine(vec![Cell::new(7, 7)]));
        table.set_field(1, &StatEvent::Eval("99".into()));
        let ranked = table.rank(Some(Cell::new(7, 7)));
        // Both match the current position; streamed order wins over eval.
        assert_eq!(ranked[0].eval, "1");
        assert_eq!(ranked[1].eval, "99");
    }

    #[test]
    fn test_reset_discards_accumulated_slots() {
        let mut table = VariationTable::default();
        table.set_field(3, &StatEvent::Depth(5));
        table.reset();
        assert_eq!(table.slots().len(), 1);
        assert_eq!(*table.get(0).unwrap(), Variation::default());
    }
}
