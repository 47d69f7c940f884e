//! Bounded yes/no questions to the operator.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::DEFAULT_AFFIRMATIVE;
use crate::interrupt::{InterruptListener, Interrupts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    /// Anything other than the exact affirmative token.
    No,
    TimedOut,
    /// The operator interrupted the wait (Ctrl-C).
    Interrupted,
}

#[async_trait]
pub trait AcknowledgmentPrompt: Send {
    /// Ask `prompt` and wait at most `timeout` for an answer.
    async fn ask(&mut self, prompt: &str, timeout: Duration) -> Answer;
}

/// Line-based prompt over a reader/writer pair, normally the controlling terminal.
///
/// The reader is kept across questions so a line typed between two prompts
/// answers the next one rather than being lost.
pub struct TerminalPrompt<R, W> {
    lines: Lines<BufReader<R>>,
    out: W,
    affirmative: String,
    interrupts: Option<Interrupts>,
    closed: bool,
}

impl TerminalPrompt<tokio::io::Stdin, tokio::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> TerminalPrompt<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, out: W) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            out,
            affirmative: DEFAULT_AFFIRMATIVE.to_owned(),
            interrupts: None,
            closed: false,
        }
    }

    pub fn with_affirmative(mut self, affirmative: impl Into<String>) -> Self {
        self.affirmative = affirmative.into();
        self
    }

    /// Let operator interrupts end a wait with [`Answer::Interrupted`].
    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    fn classify(&self, line: &str) -> Answer {
        if line.trim_end_matches('\r') == self.affirmative {
            Answer::Yes
        } else {
            Answer::No
        }
    }

    async fn show(&mut self, prompt: &str) {
        let written = async {
            self.out.write_all(prompt.as_bytes()).await?;
            self.out.flush().await
        };
        if let Err(e) = written.await {
            debug!(error = %e, "Failed to write prompt");
        }
    }
}

async fn next_interrupt(listener: &mut Option<InterruptListener>) {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl<R, W> AcknowledgmentPrompt for TerminalPrompt<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(&mut self, prompt: &str, timeout: Duration) -> Answer {
        let deadline = Instant::now() + timeout;
        let mut listener = self.interrupts.as_ref().map(Interrupts::listen);
        self.show(prompt).await;

        loop {
            let read = tokio::select! {
                biased;
                _ = next_interrupt(&mut listener) => return Answer::Interrupted,
                _ = tokio::time::sleep_until(deadline) => return Answer::TimedOut,
                read = self.lines.next_line(), if !self.closed => read,
            };

            match read {
                Ok(Some(line)) => return self.classify(&line),
                Ok(None) => {
                    warn!("Operator input closed, waiting out acknowledgment timeouts");
                    self.closed = true;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read operator input");
                    self.closed = true;
                }
            }
        }
    }
}
