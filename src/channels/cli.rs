//! CLI channel: a stdin/stdout REPL for local testing.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::assistant::SessionRouter;
use crate::error::ChannelError;

/// Identity used for every REPL turn.
pub const CLI_IDENTITY: &str = "local-user";

/// Reads commands line by line and prints each reply.
pub struct CliChannel {
    router: Arc<SessionRouter>,
}

impl CliChannel {
    pub fn new(router: Arc<SessionRouter>) -> Self {
        Self { router }
    }

    /// Run on the process's stdin/stdout until EOF.
    pub async fn run(&self) -> Result<(), ChannelError> {
        let reader = BufReader::new(tokio::io::stdin());
        self.run_with(reader, tokio::io::stdout()).await
    }

    /// Run over arbitrary streams until the reader is exhausted.
    pub async fn run_with<R, W>(&self, reader: R, mut writer: W) -> Result<(), ChannelError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let reply = self.router.handle_turn(CLI_IDENTITY, line).await;
            writer
                .write_all(format!("\n{reply}\n\n").as_bytes())
                .await
                .and(writer.flush().await)
                .map_err(|e| ChannelError::SendFailed {
                    name: "cli".into(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}
