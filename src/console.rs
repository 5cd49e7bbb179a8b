//! Operator prompts on stdin.
//!
//! Reading a line blocks, so the link prompt runs on its own thread and the
//! crawl side polls the stop flag while it waits for an answer.

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(100);

/// Answer that ends an operator link session
pub const END_OF_LINKS: &str = "1";

/// Ask on stdout, read one trimmed line from stdin. End of input is an error.
pub fn prompt(question: &str) -> anyhow::Result<String> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    anyhow::ensure!(read > 0, "input closed");
    Ok(line.trim().to_string())
}

pub fn parse_answer<T>(question: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let answer = prompt(question)?;
    answer
        .parse()
        .map_err(|e| anyhow::anyhow!("{:?} is not accepted: {}", answer, e))
}

/// Lines asked for one at a time from a reader thread.
///
/// Iteration ends on the end-of-links answer, on end of input, or as soon
/// as the stop flag is raised, even while the reader is still blocked.
pub struct LinkSource {
    requests: Sender<()>,
    lines: Receiver<String>,
    stop: Arc<AtomicBool>,
    waiting: bool,
}

impl LinkSource {
    /// Prompt with `question` on stdin for every link
    pub fn stdin(question: &'static str, stop: Arc<AtomicBool>) -> Self {
        let (requests, request_rx) = mpsc::channel::<()>();
        let (line_tx, lines) = mpsc::channel();

        thread::spawn(move || {
            while request_rx.recv().is_ok() {
                let Ok(line) = prompt(question) else {
                    break;
                };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self::new(requests, lines, stop)
    }

    fn new(requests: Sender<()>, lines: Receiver<String>, stop: Arc<AtomicBool>) -> Self {
        Self {
            requests,
            lines,
            stop,
            waiting: false,
        }
    }
}

impl Iterator for LinkSource {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if !self.waiting {
            self.requests.send(()).ok()?;
            self.waiting = true;
        }

        loop {
            if self.stop.load(Ordering::SeqCst) {
                return None;
            }
            match self.lines.recv_timeout(POLL) {
                Ok(line) if line == END_OF_LINKS => return None,
                Ok(line) => {
                    self.waiting = false;
                    return Some(line);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}
