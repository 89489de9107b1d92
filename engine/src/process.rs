use crate::piskvork::{encode_command, parse_engine_message};
use crate::{EngineCommand, EngineError, EngineEvent, EngineOptions};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

/// A running engine instance, reachable through a command queue and an
/// asynchronous event stream.
///
/// Spawned engines own an OS process; [`GomokuEngine::from_channels`] wires
/// the same interface over an arbitrary transport (the reduced web build
/// talks to a worker instead of a process).
pub struct GomokuEngine {
    process: Option<Child>,
    options: EngineOptions,
    command_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl GomokuEngine {
    /// Spawn the engine process and start the protocol tasks.
    ///
    /// Returns once the event stream is live. The engine's `OK` reply to the
    /// initial `START` arrives asynchronously through [`Self::recv_event`].
    #[tracing::instrument(level = "info", skip(options), fields(path = %options.path.display()))]
    pub async fn spawn(options: EngineOptions) -> Result<Self, EngineError> {
        tracing::info!("Spawning engine process (options: {:?})", options);

        let mut process = tokio::process::Command::new(&options.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                e
            })?;

        let mut stdin = process
            .stdin
            .take()
            .ok_or(EngineError::MissingStdio("stdin"))?;
        let stdout = process
            .stdout
            .take()
            .ok_or(EngineError::MissingStdio("stdout"))?;

        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(64);

        // Output reader task: one protocol line per event. Unrecognized
        // lines are logged and dropped, never surfaced to the session.
        tracing::debug!("Spawning output reader task");
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Engine stdout EOF - engine closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        tracing::trace!("<< {}", trimmed);
                        match parse_engine_message(trimmed) {
                            Ok(event) => {
                                if event_tx.send(event).await.is_err() {
                                    tracing::debug!("Event receiver dropped, reader exiting");
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::trace!("Dropping unrecognized line: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Output reader task exiting");
        });

        // Stdin writer task: serializes all writes to the engine.
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(64);
        tracing::debug!("Spawning stdin writer task");
        tokio::spawn(async move {
            while let Some(line) = stdin_rx.recv().await {
                tracing::trace!(">> {}", line.trim_end());
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    tracing::error!("Failed to write to engine stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush engine stdin: {}", e);
                    break;
                }
            }
            tracing::info!("Stdin writer task exiting");
        });

        // Command processor task: encodes commands onto the stdin queue.
        let (command_tx, mut command_rx) = mpsc::channel::<EngineCommand>(64);
        tracing::debug!("Spawning command processor task");
        let stdin_tx_for_commands = stdin_tx.clone();
        tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                tracing::debug!("Processing engine command: {:?}", cmd);
                let quit = matches!(cmd, EngineCommand::Quit);
                let mut line = encode_command(&cmd);
                line.push('\n');
                if stdin_tx_for_commands.send(line).await.is_err() {
                    tracing::error!("Stdin writer gone, dropping command");
                    break;
                }
                if quit {
                    break;
                }
            }
            tracing::info!("Command processor task exiting");
        });

        // Open the session. The OK reply flows through the event stream.
        let _ = command_tx
            .send(EngineCommand::Start {
                size: options.board_size,
            })
            .await;

        tracing::info!("Engine spawned");
        Ok(Self {
            process: Some(process),
            options,
            command_tx,
            event_rx,
        })
    }

    /// Wrap an engine reachable over a command/event channel pair.
    pub fn from_channels(
        options: EngineOptions,
        command_tx: mpsc::Sender<EngineCommand>,
        event_rx: mpsc::Receiver<EngineEvent>,
    ) -> Self {
        Self {
            process: None,
            options,
            command_tx,
            event_rx,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn label(&self) -> &str {
        self.options
            .label
            .as_deref()
            .unwrap_or_else(|| self.options.path.to_str().unwrap_or("engine"))
    }

    /// Queue a command for the engine. Fire-and-forget from the caller's
    /// perspective; ordering is preserved.
    pub async fn send_command(&self, cmd: EngineCommand) -> Result<(), EngineError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Receive the next engine event.
    pub async fn recv_event(&mut self) -> Option<EngineEvent> {
        self.event_rx.recv().await
    }

    /// Interrupt an in-flight search.
    ///
    /// Returns `true` when the engine had to be hard-terminated (reduced
    /// builds cannot honor `STOP` mid-search), `false` when it was
    /// soft-signaled and will wind down on its own.
    pub async fn stop_thinking(&mut self) -> bool {
        if self.options.full_engine || self.process.is_none() {
            tracing::info!("Sending STOP to engine");
            let _ = self.send_command(EngineCommand::Stop).await;
            false
        } else {
            tracing::warn!("Engine cannot be interrupted, killing process");
            if let Some(process) = self.process.as_mut() {
                let _ = process.start_kill();
            }
            true
        }
    }

    /// Shut the engine down, escalating from `END` to a kill.
    pub async fn shutdown(mut self) {
        let _ = self.send_command(EngineCommand::Quit).await;
        if let Some(mut process) = self.process.take() {
            let _ =
                tokio::time::timeout(std::time::Duration::from_secs(1), process.wait()).await;
            let _ = process.kill().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cell;

    fn channel_engine() -> (
        GomokuEngine,
        mpsc::Receiver<EngineCommand>,
        mpsc::Sender<EngineEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);
        let engine = GomokuEngine::from_channels(
            EngineOptions::new("test-engine"),
            command_tx,
            event_rx,
        );
        (engine, command_rx, event_tx)
    }

    #[tokio::test]
    async fn test_send_command_preserves_order() {
        let (engine, mut command_rx, _event_tx) = channel_engine();
        engine
            .send_command(EngineCommand::Start { size: 15 })
            .await
            .unwrap();
        engine
            .send_command(EngineCommand::Board {
                position: vec![Cell::new(7, 7)],
                immediate: false,
            })
            .await
            .unwrap();
        assert_eq!(
            command_rx.recv().await.unwrap(),
            EngineCommand::Start { size: 15 }
        );
        assert!(matches!(
            command_rx.recv().await.unwrap(),
            EngineCommand::Board { .. }
        ));
    }

    #[tokio::test]
    async fn test_recv_event_passes_through() {
        let (mut engine, _command_rx, event_tx) = channel_engine();
        event_tx.send(EngineEvent::Ready).await.unwrap();
        assert_eq!(engine.recv_event().await, Some(EngineEvent::Ready));
    }

    #[tokio::test]
    async fn test_stop_thinking_without_process_is_soft() {
        let (mut engine, mut command_rx, _event_tx) = channel_engine();
        assert!(!engine.stop_thinking().await);
        assert_eq!(command_rx.recv().await.unwrap(), EngineCommand::Stop);
    }

    #[tokio::test]
    async fn test_send_command_after_receiver_dropped_errors() {
        let (engine, command_rx, _event_tx) = channel_engine();
        drop(command_rx);
        assert!(matches!(
            engine.send_command(EngineCommand::Stop).await,
            Err(EngineError::ChannelClosed)
        ));
    }
}
