//! User-facing terminal I/O.
//!
//! The peer engine talks to the user only through [`Console`], so the
//! whole interactive flow can be scripted in tests.

use std::io::Write;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::socket::BoxFuture;

/// Line-oriented user interface.
pub trait Console: Send {
    /// Prints a line.
    fn show(&mut self, text: &str);

    /// Clears the screen.
    fn clear(&mut self);

    /// Prints `label` and waits for a line. Fails with
    /// [`ClientError::Closed`] once input is exhausted.
    fn prompt<'a>(&'a mut self, label: &'a str) -> BoxFuture<'a, ClientResult<String>>;

    /// Like [`Console::prompt`], but gives up after `window` and returns
    /// `None`.
    fn prompt_within<'a>(
        &'a mut self,
        label: &'a str,
        window: Duration,
    ) -> BoxFuture<'a, ClientResult<Option<String>>>;
}

/// Console over stdin and stdout.
///
/// Stdin is read by a background task so that a prompt with a deadline can
/// be abandoned without losing the line the user eventually types.
pub struct StdConsole {
    lines: mpsc::Receiver<String>,
}

impl StdConsole {
    /// Starts the stdin reader task.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            debug!("Stdin reader stopped");
        });
        Self { lines: rx }
    }

    fn print_label(label: &str) {
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}", label);
        let _ = stdout.flush();
    }
}

impl Console for StdConsole {
    fn show(&mut self, text: &str) {
        println!("{}", text);
    }

    fn clear(&mut self) {
        print!("\x1B[2J\x1B[1;1H");
        let _ = std::io::stdout().flush();
    }

    fn prompt<'a>(&'a mut self, label: &'a str) -> BoxFuture<'a, ClientResult<String>> {
        Box::pin(async move {
            Self::print_label(label);
            self.lines.recv().await.ok_or(ClientError::Closed)
        })
    }

    fn prompt_within<'a>(
        &'a mut self,
        label: &'a str,
        window: Duration,
    ) -> BoxFuture<'a, ClientResult<Option<String>>> {
        Box::pin(async move {
            Self::print_label(label);
            match tokio::time::timeout(window, self.lines.recv()).await {
                Ok(Some(line)) => Ok(Some(line)),
                Ok(None) => Err(ClientError::Closed),
                Err(_) => {
                    println!();
                    Ok(None)
                }
            }
        })
    }
}
