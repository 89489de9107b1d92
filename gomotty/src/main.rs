//! Command-line front end for the Gomoku analysis session.
//!
//! Spawns an engine process, submits one position, streams search output to
//! the log, and prints the chosen move (plain text or JSON).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use engine::{Cell, EngineOptions};
use serde::Serialize;
use session::{
    OutputSnapshot, Rule, SearchSettings, SessionEvent, SessionHandle, ThinkOptions,
};

/// Analyze a Gomoku position with an external engine.
#[derive(Parser)]
#[command(name = "gomotty", about = "Gomoku engine analysis driver")]
struct Cli {
    /// Path to the engine executable.
    #[arg(long)]
    engine: PathBuf,

    /// Moves already on the board, in play order, as zero-based `x,y` pairs.
    moves: Vec<String>,

    /// Board side length.
    #[arg(long, default_value_t = engine::DEFAULT_BOARD_SIZE)]
    board_size: u8,

    /// Game rule the engine should apply.
    #[arg(long, value_enum, default_value_t = RuleArg::Freestyle)]
    rule: RuleArg,

    /// Number of principal variations to search.
    #[arg(long, default_value_t = 1)]
    nbest: u32,

    /// Per-move time budget in milliseconds.
    #[arg(long, default_value_t = 5_000)]
    turn_time: u64,

    /// Whole-game time budget in milliseconds.
    #[arg(long, default_value_t = 180_000)]
    match_time: u64,

    /// Search threads.
    #[arg(long, default_value_t = 1)]
    threads: u32,

    /// The engine is a reduced build without an input-polling thread.
    #[arg(long)]
    reduced: bool,

    /// How long to wait for the engine to come up.
    #[arg(long, default_value_t = 60)]
    ready_timeout: u64,

    /// Emit the result as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleArg {
    Freestyle,
    Standard,
    Renju,
}

impl From<RuleArg> for Rule {
    fn from(arg: RuleArg) -> Self {
        match arg {
            RuleArg::Freestyle => Rule::Freestyle,
            RuleArg::Standard => Rule::Standard,
            RuleArg::Renju => Rule::Renju,
        }
    }
}

/// Machine-readable analysis result for `--json`.
#[derive(Serialize)]
struct AnalysisReport {
    best_move: Option<Cell>,
    best_move_display: Option<String>,
    snapshot: OutputSnapshot,
}

fn parse_moves(raw: &[String], board_size: u8) -> anyhow::Result<Vec<Cell>> {
    raw.iter()
        .map(|token| {
            let (x, y) = token
                .split_once(',')
                .with_context(|| format!("Move '{}' is not an x,y pair", token))?;
            let x: u8 = x
                .trim()
                .parse()
                .with_context(|| format!("Move '{}' has a bad x coordinate", token))?;
            let y: u8 = y
                .trim()
                .parse()
                .with_context(|| format!("Move '{}' has a bad y coordinate", token))?;
            if x >= board_size || y >= board_size {
                bail!("Move '{}' is off a {}x{} board", token, board_size, board_size);
            }
            Ok(Cell::new(x, y))
        })
        .collect()
}

/// Consume session events until the engine reports ready.
async fn wait_for_ready(
    handle: &SessionHandle,
    timeout: Duration,
) -> anyhow::Result<()> {
    let (snapshot, mut events) = handle
        .subscribe()
        .await
        .context("Session closed before startup")?;
    if snapshot.ready {
        return Ok(());
    }

    let wait = async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::StateChanged(snapshot)) if snapshot.ready => return Ok(()),
                Ok(SessionEvent::Error(message)) => {
                    tracing::warn!("Engine reported during startup: {}", message);
                }
                Ok(_) => {}
                Err(_) => bail!("Session event stream closed before the engine was ready"),
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .context("Timed out waiting for the engine to become ready")?
}

fn print_text_report(report: &AnalysisReport) {
    match &report.best_move_display {
        Some(display) => println!("Best move: {}", display),
        None => println!("No move (game decided or search interrupted)"),
    }

    let snapshot = &report.snapshot;
    for (index, variation) in snapshot.variations.iter().enumerate() {
        println!(
            "  PV{} depth {}-{} eval {} winrate {:.1}% | {}",
            index + 1,
            variation.depth,
            variation.seldepth,
            variation.eval,
            variation.winrate * 100.0,
            snapshot.best_line_str(index),
        );
    }
    if snapshot.total_nodes > 0 {
        println!(
            "  {} nodes in {} ms ({} n/s)",
            snapshot.total_nodes, snapshot.total_time_ms, snapshot.speed_nps
        );
    }
    if !snapshot.forbid_cells.is_empty() {
        let marks: Vec<String> = snapshot
            .forbid_cells
            .iter()
            .map(|cell| cell.to_display(snapshot.board_size))
            .collect();
        println!("  Forbidden: {}", marks.join(" "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let position = parse_moves(&cli.moves, cli.board_size)?;

    let settings = SearchSettings {
        rule: cli.rule.into(),
        threads: cli.threads,
        turn_time_ms: cli.turn_time,
        match_time_ms: cli.match_time,
        nbest: cli.nbest,
        ..SearchSettings::default()
    };

    let engine_options = EngineOptions {
        board_size: cli.board_size,
        full_engine: !cli.reduced,
        ..EngineOptions::new(cli.engine.clone())
    };

    tracing::info!(
        "Starting session (engine: {}, board: {}, stones: {})",
        cli.engine.display(),
        cli.board_size,
        position.len()
    );
    let handle = session::spawn(engine_options, settings);

    wait_for_ready(&handle, Duration::from_secs(cli.ready_timeout)).await?;
    tracing::info!("Engine ready, thinking...");

    let best_move = handle
        .think(position, cli.board_size, ThinkOptions::default())
        .await
        .context("Think failed")?;
    let snapshot = handle
        .get_snapshot()
        .await
        .context("Session closed before reporting")?;

    let report = AnalysisReport {
        best_move,
        best_move_display: best_move.map(|cell| cell.to_display(cli.board_size)),
        snapshot,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text_report(&report);
    }

    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moves(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_moves_accepts_pairs() {
        let cells = parse_moves(&moves(&["7,7", "7,8", "8,8"]), 15).unwrap();
        assert_eq!(
            cells,
            vec![Cell::new(7, 7), Cell::new(7, 8), Cell::new(8, 8)]
        );
    }

    #[test]
    fn test_parse_moves_rejects_bad_tokens() {
        assert!(parse_moves(&moves(&["77"]), 15).is_err());
        assert!(parse_moves(&moves(&["a,b"]), 15).is_err());
        assert!(parse_moves(&moves(&["7,"]), 15).is_err());
    }

    #[test]
    fn test_parse_moves_rejects_off_board() {
        assert!(parse_moves(&moves(&["15,0"]), 15).is_err());
        assert!(parse_moves(&moves(&["0,15"]), 15).is_err());
        assert!(parse_moves(&moves(&["14,14"]), 15).is_ok());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "gomotty",
            "--engine",
            "/usr/bin/rapfi",
            "--rule",
            "renju",
            "--nbest",
            "3",
            "7,7",
            "7,8",
        ])
        .unwrap();
        assert_eq!(cli.nbest, 3);
        assert!(matches!(cli.rule, RuleArg::Renju));
        assert_eq!(cli.moves, vec!["7,7", "7,8"]);
    }
}
