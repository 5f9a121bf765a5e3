//! The program run for every verified message.

use std::io;
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct MessageCommand {
    bin: String,
    args: Vec<String>,
}

impl MessageCommand {
    pub fn new(bin: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            bin: bin.into(),
            args,
        }
    }

    /// Run to completion with `input` on stdin, collecting stdout and stderr.
    ///
    /// A program that exits without reading all of its input is not an error.
    pub async fn run(&self, input: &[u8]) -> io::Result<Output> {
        let mut child = tokio::process::Command::new(&self.bin)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        if let Err(e) = fed {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(e);
            }
        }
        output
    }

    /// Run in the background for the subscription `name`, logging the
    /// outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, name: String, input: Vec<u8>) {
        let command = self.clone();
        tokio::spawn(async move {
            tracing::info!(name = %name, bin = %command.bin, args = ?command.args, "running");

            match command.run(&input).await {
                Ok(output) => {
                    tracing::debug!(
                        name = %name,
                        stdout = %String::from_utf8_lossy(&output.stdout),
                        stderr = %String::from_utf8_lossy(&output.stderr),
                        "command output"
                    );
                    if !output.status.success() {
                        tracing::error!(name = %name, status = %output.status, "command failed");
                    }
                }
                Err(e) => tracing::error!(name = %name, error = %e, "failed to run command"),
            }
        });
    }
}
