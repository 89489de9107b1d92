use crate::{Cell, EngineEvent, RealtimeKind, StatEvent};

use super::ProtocolError;

/// Classify one engine output line.
///
/// Every line maps to exactly one [`EngineEvent`]; lines that match none of
/// the known forms come back as [`ProtocolError::UnknownMessage`] and the
/// caller drops them. A line carries at most one meaningful field, so the
/// first matching form wins.
pub fn parse_engine_message(line: &str) -> Result<EngineEvent, ProtocolError> {
    let line = line.trim();
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"MESSAGE") => parse_message_line(line, &tokens[1..]),

        Some(&"NONE") => Ok(EngineEvent::TerminalMove(None)),

        Some(&"SWAP") => Ok(EngineEvent::Swap(true)),

        Some(&"FORBID") => {
            let cells = parse_cell_list(&tokens[1..])?;
            Ok(EngineEvent::ForbidList(cells))
        }

        Some(&"ERROR") => Ok(EngineEvent::Error(tokens[1..].join(" "))),

        Some(&"OK") => Ok(EngineEvent::Ready),

        Some(&"LOADING") => {
            let progress = tokens
                .get(1)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| ProtocolError::MalformedMessage(line.to_string()))?;
            Ok(EngineEvent::Progress(progress))
        }

        // A bare coordinate is the terminal search answer.
        Some(first) if tokens.len() == 1 && first.contains(',') => {
            Ok(EngineEvent::TerminalMove(Some(parse_cell(first)?)))
        }

        _ => Err(ProtocolError::UnknownMessage(line.to_string())),
    }
}

/// Parse the payload of a `MESSAGE` line. Structured fields are recognized
/// first; anything else is a free-form text message.
fn parse_message_line(line: &str, tokens: &[&str]) -> Result<EngineEvent, ProtocolError> {
    let malformed = || ProtocolError::MalformedMessage(line.to_string());

    match tokens.first() {
        Some(&"REALTIME") => {
            let kind = match tokens.get(1) {
                Some(&"BEST") => RealtimeKind::Best,
                Some(&"LOST") => RealtimeKind::Lost,
                _ => return Err(malformed()),
            };
            let cell = parse_cell(tokens.get(2).ok_or_else(malformed)?)?;
            Ok(EngineEvent::Realtime { kind, cell })
        }
        Some(&"MULTIPV") => {
            let idx = match tokens.get(1) {
                Some(&"DONE") => None,
                Some(s) => Some(s.parse::<usize>().map_err(|_| malformed())?),
                None => return Err(malformed()),
            };
            Ok(EngineEvent::Stat(StatEvent::PvIndex(idx)))
        }
        Some(&"DEPTH") => Ok(EngineEvent::Stat(StatEvent::Depth(
            parse_number(tokens.get(1)).ok_or_else(malformed)?,
        ))),
        Some(&"SELDEPTH") => Ok(EngineEvent::Stat(StatEvent::Seldepth(
            parse_number(tokens.get(1)).ok_or_else(malformed)?,
        ))),
        Some(&"NODES") => Ok(EngineEvent::Stat(StatEvent::Nodes(
            parse_number(tokens.get(1)).ok_or_else(malformed)?,
        ))),
        Some(&"TOTALNODES") => Ok(EngineEvent::Stat(StatEvent::TotalNodes(
            parse_number(tokens.get(1)).ok_or_else(malformed)?,
        ))),
        Some(&"TOTALTIME") => Ok(EngineEvent::Stat(StatEvent::TotalTimeMs(
            parse_number(tokens.get(1)).ok_or_else(malformed)?,
        ))),
        Some(&"SPEED") => Ok(EngineEvent::Stat(StatEvent::Speed(
            parse_number(tokens.get(1)).ok_or_else(malformed)?,
        ))),
        Some(&"EVAL") => {
            let eval = tokens.get(1).ok_or_else(malformed)?;
            Ok(EngineEvent::Stat(StatEvent::Eval(eval.to_string())))
        }
        Some(&"WINRATE") => {
            let rate = tokens
                .get(1)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(malformed)?;
            Ok(EngineEvent::Stat(StatEvent::Winrate(rate)))
        }
        Some(&"BESTLINE") => {
            let cells = parse_cell_list(&tokens[1..])?;
            Ok(EngineEvent::Stat(StatEvent::BestLine(cells)))
        }
        Some(_) => Ok(EngineEvent::Message(tokens.join(" "))),
        None => Err(malformed()),
    }
}

fn parse_number<T: std::str::FromStr>(token: Option<&&str>) -> Option<T> {
    token.and_then(|s| s.parse().ok())
}

/// Parse an `x,y` coordinate token.
pub fn parse_cell(token: &str) -> Result<Cell, ProtocolError> {
    let (x, y) = token
        .split_once(',')
        .ok_or_else(|| ProtocolError::InvalidCell(token.to_string()))?;
    let x = x
        .parse::<u8>()
        .map_err(|_| ProtocolError::InvalidCell(token.to_string()))?;
    let y = y
        .parse::<u8>()
        .map_err(|_| ProtocolError::InvalidCell(token.to_string()))?;
    Ok(Cell::new(x, y))
}

fn parse_cell_list(tokens: &[&str]) -> Result<Vec<Cell>, ProtocolError> {
    tokens.iter().map(|t| parse_cell(t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terminal_move() {
        let event = parse_engine_message("7,8").unwrap();
        assert_eq!(event, EngineEvent::TerminalMove(Some(Cell::new(7, 8))));
    }

    #[test]
    fn test_parse_terminal_none() {
        assert_eq!(
            parse_engine_message("NONE").unwrap(),
            EngineEvent::TerminalMove(None)
        );
    }

    #[test]
    fn test_parse_lifecycle_ok() {
        assert_eq!(parse_engine_message("OK").unwrap(), EngineEvent::Ready);
    }

    #[test]
    fn test_parse_loading_progress() {
        assert_eq!(
            parse_engine_message("LOADING 0.35").unwrap(),
            EngineEvent::Progress(0.35)
        );
    }

    #[test]
    fn test_parse_realtime_best() {
        let event = parse_engine_message("MESSAGE REALTIME BEST 3,4").unwrap();
        assert_eq!(
            event,
            EngineEvent::Realtime {
                kind: RealtimeKind::Best,
                cell: Cell::new(3, 4)
            }
        );
    }

    #[test]
    fn test_parse_multipv_and_done() {
        assert_eq!(
            parse_engine_message("MESSAGE MULTIPV 2").unwrap(),
            EngineEvent::Stat(StatEvent::PvIndex(Some(2)))
        );
        assert_eq!(
            parse_engine_message("MESSAGE MULTIPV DONE").unwrap(),
            EngineEvent::Stat(StatEvent::PvIndex(None))
        );
    }

    #[test]
    fn test_parse_stats() {
        assert_eq!(
            parse_engine_message("MESSAGE DEPTH 12").unwrap(),
            EngineEvent::Stat(StatEvent::Depth(12))
        );
        assert_eq!(
            parse_engine_message("MESSAGE EVAL +M3").unwrap(),
            EngineEvent::Stat(StatEvent::Eval("+M3".into()))
        );
        assert_eq!(
            parse_engine_message("MESSAGE WINRATE 0.731").unwrap(),
            EngineEvent::Stat(StatEvent::Winrate(0.731))
        );
        assert_eq!(
            parse_engine_message("MESSAGE SPEED 125000").unwrap(),
            EngineEvent::Stat(StatEvent::Speed(125_000))
        );
    }

    #[test]
    fn test_parse_bestline() {
        let event = parse_engine_message("MESSAGE BESTLINE 7,7 8,8 6,6").unwrap();
        assert_eq!(
            event,
            EngineEvent::Stat(StatEvent::BestLine(vec![
                Cell::new(7, 7),
                Cell::new(8, 8),
                Cell::new(6, 6),
            ]))
        );
    }

    #[test]
    fn test_parse_forbid_list() {
        let event = parse_engine_message("FORBID 1,2 3,4").unwrap();
        assert_eq!(
            event,
            EngineEvent::ForbidList(vec![Cell::new(1, 2), Cell::new(3, 4)])
        );
        assert_eq!(
            parse_engine_message("FORBID").unwrap(),
            EngineEvent::ForbidList(vec![])
        );
    }

    #[test]
    fn test_parse_error_and_message() {
        assert_eq!(
            parse_engine_message("ERROR hash table too small").unwrap(),
            EngineEvent::Error("hash table too small".into())
        );
        assert_eq!(
            parse_engine_message("MESSAGE reloaded weights").unwrap(),
            EngineEvent::Message("reloaded weights".into())
        );
    }

    #[test]
    fn test_unknown_line_is_rejected_not_misparsed() {
        assert!(matches!(
            parse_engine_message("DEBUG internal counters"),
            Err(ProtocolError::UnknownMessage(_))
        ));
        assert!(matches!(
            parse_engine_message(""),
            Err(ProtocolError::UnknownMessage(_))
        ));
    }

    #[test]
    fn test_malformed_cell() {
        assert!(parse_engine_message("MESSAGE REALTIME BEST x,y").is_err());
        assert!(parse_engine_message("MESSAGE BESTLINE 7,7 oops").is_err());
    }
}
