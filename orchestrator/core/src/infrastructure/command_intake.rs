// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON-lines command intake and reply sink.
//!
//! The intake side turns decoded intents (one JSON object per line) into
//! [`Command`]s on an mpsc channel. Malformed lines are logged and skipped;
//! nothing reaches the supervisor for them.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::command::{Command, CommandReply};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeStats {
    pub accepted: usize,
    pub rejected: usize,
}

/// Reads until EOF or until the supervisor side hangs up. Blank lines and
/// `#` comments are ignored.
pub async fn pump_commands<R>(reader: R, tx: mpsc::Sender<Command>) -> std::io::Result<IntakeStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IntakeStats::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match Command::parse_json(trimmed) {
            Ok(command) => {
                debug!(line = line_no, kind = command.kind(), "Command accepted");
                if tx.send(command).await.is_err() {
                    debug!("Command channel closed; stopping intake");
                    break;
                }
                stats.accepted += 1;
            }
            Err(e) => {
                warn!(line = line_no, error = %e, "Ignoring malformed command");
                stats.rejected += 1;
            }
        }
    }
    Ok(stats)
}

/// Writes each reply as one JSON line until the channel closes.
pub async fn write_replies<W>(mut rx: mpsc::Receiver<CommandReply>, mut writer: W) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(reply) = rx.recv().await {
        let mut line = serde_json::to_string(&reply)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        written += 1;
    }
    Ok(written)
}
