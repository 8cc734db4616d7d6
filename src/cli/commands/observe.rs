//! Implementation of the `rsc-cache observe` command.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::InboundCommand;
use crate::infrastructure::mirror::{MirrorObserver, ObservedMessage, ObserverError, ObserverSession};

/// Arguments of `rsc-cache observe`.
#[derive(Args, Debug)]
pub struct ObserveArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:18998")]
    pub bind: String,

    /// Exit when the first cache disconnects
    #[arg(long)]
    pub once: bool,
}

/// One printed snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotOutput {
    /// The snapshot with its receive time.
    #[serde(flatten)]
    pub observed: ObservedMessage,
}

impl CommandOutput for SnapshotOutput {
    fn to_human(&self) -> String {
        let message = &self.observed.message;
        let entries = &message.payload.full_cache;
        let mut lines = vec![format!(
            "[{}] {} ({} entr{}){}",
            self.observed.received_at.format("%H:%M:%S%.3f"),
            message.id,
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            message
                .payload
                .updated_key
                .as_ref()
                .map(|key| format!(" updated: {key}"))
                .unwrap_or_default(),
        )];
        for (key, value) in entries {
            lines.push(format!("  {key}: {}", truncate(&value.to_string(), 100)));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Parse one console line into a command for the cache.
///
/// Accepts `delete <key>`, `clear`, `enable` and `disable`; blank lines
/// yield `None`.
pub fn parse_console_command(line: &str) -> Result<Option<InboundCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    let command = match verb {
        "delete" if !rest.is_empty() => InboundCommand::delete(rest),
        "delete" => bail!("Usage: delete <key>"),
        "clear" => InboundCommand::Clear,
        "enable" => InboundCommand::Enable,
        "disable" => InboundCommand::Disable,
        other => bail!("Unknown command '{other}'. Expected delete <key>, clear, enable or disable"),
    };
    Ok(Some(command))
}

/// Accept caches one after another, printing snapshots and forwarding stdin commands.
pub async fn execute(args: ObserveArgs, json_mode: bool) -> Result<()> {
    let observer = MirrorObserver::bind(&args.bind).await?;
    info!(endpoint = %observer.endpoint()?, "Waiting for a cache to connect");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let mut session = observer.accept().await?;
        info!(peer = %session.peer(), "Observing cache");
        run_session(&mut session, &mut stdin, &mut stdin_open, json_mode).await?;
        info!(peer = %session.peer(), "Cache disconnected");
        if args.once {
            return Ok(());
        }
    }
}

async fn run_session<R>(
    session: &mut ObserverSession,
    stdin: &mut tokio::io::Lines<R>,
    stdin_open: &mut bool,
    json_mode: bool,
) -> Result<()>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        tokio::select! {
            message = session.next_message() => match message {
                Ok(Some(observed)) => output(&SnapshotOutput { observed }, json_mode),
                Ok(None) => return Ok(()),
                Err(ObserverError::InvalidMessage(err)) => {
                    warn!(error = %err, "Ignoring undecodable message from cache");
                }
                Err(err) => return Err(err.into()),
            },
            line = stdin.next_line(), if *stdin_open => match line? {
                Some(line) => match parse_console_command(&line) {
                    Ok(Some(command)) => {
                        info!(command = %command, "Sending command to cache");
                        session.send_command(&command).await?;
                    }
                    Ok(None) => {}
                    Err(err) => warn!("{err}"),
                },
                None => *stdin_open = false,
            },
        }
    }
}
