use crate::EngineCommand;

/// Encode one command as a protocol line (no trailing newline).
pub fn encode_command(cmd: &EngineCommand) -> String {
    match cmd {
        EngineCommand::Start { size } => format!("START {}", size),
        EngineCommand::Info { key, value } => format!("INFO {} {}", key, value),
        EngineCommand::Board {
            position,
            immediate,
        } => {
            let mut line = String::from(if *immediate { "BOARD" } else { "YXBOARD" });
            // Side markers alternate from the parity of the move count: an
            // even count means the side to move placed the first listed stone.
            let mut side = if position.len() % 2 == 0 { 1 } else { 2 };
            for cell in position {
                line.push_str(&format!(" {},{},{}", cell.x, cell.y, side));
                side = 3 - side;
            }
            line.push_str(" DONE");
            line
        }
        EngineCommand::NBest(n) => format!("YXNBEST {}", n),
        EngineCommand::BalanceOne(bias) => format!("YXBALANCEONE {}", bias),
        EngineCommand::BalanceTwo(bias) => format!("YXBALANCETWO {}", bias),
        EngineCommand::ShowForbid => "YXSHOWFORBID".to_string(),
        EngineCommand::ReloadConfig(name) => format!("RELOADCONFIG {}", name),
        EngineCommand::Stop => "STOP".to_string(),
        EngineCommand::Quit => "END".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cell;

    #[test]
    fn test_encode_board_alternates_sides() {
        let cmd = EngineCommand::Board {
            position: vec![Cell::new(7, 7), Cell::new(7, 8)],
            immediate: false,
        };
        assert_eq!(encode_command(&cmd), "YXBOARD 7,7,1 7,8,2 DONE");
    }

    #[test]
    fn test_encode_board_odd_parity_starts_with_two() {
        let cmd = EngineCommand::Board {
            position: vec![Cell::new(7, 7), Cell::new(7, 8), Cell::new(8, 8)],
            immediate: true,
        };
        assert_eq!(encode_command(&cmd), "BOARD 7,7,2 7,8,1 8,8,2 DONE");
    }

    #[test]
    fn test_encode_empty_board() {
        let cmd = EngineCommand::Board {
            position: vec![],
            immediate: false,
        };
        assert_eq!(encode_command(&cmd), "YXBOARD DONE");
    }

    #[test]
    fn test_encode_simple_commands() {
        assert_eq!(
            encode_command(&EngineCommand::Start { size: 15 }),
            "START 15"
        );
        assert_eq!(
            encode_command(&EngineCommand::Info {
                key: "TIME_LEFT".into(),
                value: "29500".into()
            }),
            "INFO TIME_LEFT 29500"
        );
        assert_eq!(encode_command(&EngineCommand::NBest(3)), "YXNBEST 3");
        assert_eq!(
            encode_command(&EngineCommand::BalanceTwo(-50)),
            "YXBALANCETWO -50"
        );
        assert_eq!(encode_command(&EngineCommand::ShowForbid), "YXSHOWFORBID");
        assert_eq!(
            encode_command(&EngineCommand::ReloadConfig("rapid.toml".into())),
            "RELOADCONFIG rapid.toml"
        );
        assert_eq!(encode_command(&EngineCommand::Stop), "STOP");
        assert_eq!(encode_command(&EngineCommand::Quit), "END");
    }
}
