//! Human-readable text output
//!
//! One line per reportable result. Redirect lines are only written when
//! redirect reporting is enabled.

use super::{log_write_error, report_result, ResultsManager, ScanResult, SinkWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct PlainResults {
    writer: SinkWriter,
    redirs: bool,
}

impl PlainResults {
    pub fn new(writer: SinkWriter, redirs: bool) -> Self {
        Self { writer, redirs }
    }
}

impl ResultsManager for PlainResults {
    fn run(mut self: Box<Self>, mut rx: mpsc::Receiver<ScanResult>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                if !report_result(&result) {
                    continue;
                }
                let line = match &result.redirect {
                    None if result.length >= 0 => {
                        format!("{} {} ({} bytes)\n", result.code, result.url, result.length)
                    }
                    None => format!("{} {}\n", result.code, result.url),
                    Some(redirect) if self.redirs => {
                        format!("{} {} -> {}\n", result.code, result.url, redirect)
                    }
                    Some(_) => continue,
                };
                if let Err(err) = self.writer.write_all(line.as_bytes()) {
                    log_write_error(err);
                }
            }
            if let Err(err) = self.writer.flush() {
                log_write_error(err);
            }
        })
    }
}
