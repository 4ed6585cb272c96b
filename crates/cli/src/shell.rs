//! Line-oriented shell over a [`Storefront`].
//!
//! Every input line is split into words and parsed with clap, so the shell
//! and one-shot invocations share one command grammar.

use std::io::{self, Write};

use bazaar_storefront::Storefront;
use bazaar_storefront::checkout::PendingPayment;
use bazaar_storefront::models::PendingVerification;
use clap::Parser;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::sync::CancellationToken;

use crate::commands::{CommandError, CommandLine, Flow};

const PROMPT: &str = "bazaar> ";

/// A line that could not be split into words.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unterminated {0} quote")]
pub struct SplitError(char);

/// Split a line into words, honoring single and double quotes.
pub fn split_words(line: &str) -> Result<Vec<String>, SplitError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(SplitError(q));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Interactive shell state.
pub struct Shell<R, W> {
    pub(crate) storefront: Storefront,
    pub(crate) pending_verification: Option<PendingVerification>,
    pub(crate) pending_payment: Option<PendingPayment>,
    input: Lines<R>,
    out: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    pub fn new(storefront: Storefront, input: R, out: W) -> Self {
        Self {
            storefront,
            pending_verification: None,
            pending_payment: None,
            input: input.lines(),
            out,
        }
    }

    /// Read and execute lines until `exit`, end of input or cancellation.
    pub async fn run(&mut self, cancel: &CancellationToken) -> io::Result<bool> {
        writeln!(
            self.out,
            "Welcome to Bazaar. Type `help` for commands, `exit` to leave."
        )?;

        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            let line = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                line = self.input.next_line() => line?,
            };
            let Some(line) = line else {
                writeln!(self.out)?;
                break;
            };

            let words = match split_words(&line) {
                Ok(words) if words.is_empty() => continue,
                Ok(words) => words,
                Err(e) => {
                    writeln!(self.out, "error: {e}")?;
                    continue;
                }
            };
            if let Flow::Exit = self.execute(words).await?.0 {
                break;
            }
        }
        Ok(true)
    }

    /// Execute one already-split command. Returns whether it succeeded.
    pub async fn run_once(&mut self, words: Vec<String>) -> io::Result<bool> {
        Ok(self.execute(words).await?.1)
    }

    async fn execute(&mut self, words: Vec<String>) -> io::Result<(Flow, bool)> {
        let command = match CommandLine::try_parse_from(words) {
            Ok(line) => line.command,
            Err(e) => {
                let ok = !e.use_stderr();
                write!(self.out, "{}", e.render())?;
                return Ok((Flow::Continue, ok));
            }
        };

        match self.dispatch(command).await {
            Ok(flow) => Ok((flow, true)),
            Err(CommandError::Io(e)) => Err(e),
            Err(e) => {
                if e.is_reportable() {
                    tracing::error!(error = %e, "Command failed");
                } else {
                    tracing::debug!(error = %e, "Command refused");
                }
                writeln!(self.out, "error: {}", e.user_message())?;
                if let Some(fields) = e.field_errors() {
                    for (field, message) in fields.iter() {
                        writeln!(self.out, "  {field}: {message}")?;
                    }
                }
                Ok((Flow::Continue, false))
            }
        }
    }

    /// Write one line of command output.
    pub(crate) fn say(&mut self, line: impl std::fmt::Display) -> Result<(), CommandError> {
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    /// Prompt for a line of input. End of input counts as cancellation.
    pub(crate) async fn ask(&mut self, prompt: &str) -> Result<String, CommandError> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        self.input
            .next_line()
            .await?
            .map(|line| line.trim().to_string())
            .ok_or(CommandError::Aborted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Arc;

    use bazaar_storefront::{MemoryStorage, StorefrontConfig};

    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(
            split_words("  cart add p1 --qty 2 ").unwrap(),
            vec!["cart", "add", "p1", "--qty", "2"]
        );
        assert_eq!(
            split_words(r#"review p1 --rating 5 --comment "Fits well, great fabric""#).unwrap(),
            vec!["review", "p1", "--rating", "5", "--comment", "Fits well, great fabric"]
        );
        assert_eq!(split_words("say ''").unwrap(), vec!["say", ""]);
        assert!(split_words("").unwrap().is_empty());
    }

    #[test]
    fn test_split_words_unterminated() {
        assert_eq!(split_words("search 'linen").unwrap_err(), SplitError('\''));
    }

    /// A storefront whose backend is unreachable.
    pub(crate) fn offline_storefront() -> Storefront {
        let config = StorefrontConfig::from_vars(|key| {
            (key == "BAZAAR_API_URL").then(|| "http://127.0.0.1:9/api/".to_string())
        })
        .unwrap();
        Storefront::with_storage(config, Arc::new(MemoryStorage::new())).unwrap()
    }

    pub(crate) async fn run_script(storefront: Storefront, script: &str) -> String {
        let mut out = Vec::new();
        let mut shell = Shell::new(storefront, script.as_bytes(), &mut out);
        shell.run(&CancellationToken::new()).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_exit_stops_reading() {
        let output = run_script(offline_storefront(), "exit\nwhoami\n").await;
        assert!(!output.contains("Not signed in"));
    }

    #[tokio::test]
    async fn test_parse_errors_are_reported() {
        let output = run_script(offline_storefront(), "frobnicate\ncart add\n").await;
        assert!(output.contains("unrecognized subcommand"));
        assert!(output.contains("required"));
    }

    #[tokio::test]
    async fn test_run_once_reports_failure() {
        let mut out = Vec::new();
        let mut shell = Shell::new(offline_storefront(), &b""[..], &mut out);

        assert!(shell.run_once(vec!["whoami".to_string()]).await.unwrap());
        assert!(
            !shell
                .run_once(vec!["checkout".to_string()])
                .await
                .unwrap()
        );
    }
}
