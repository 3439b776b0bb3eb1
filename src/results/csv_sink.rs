//! CSV output
//!
//! Header row plus one record per reportable result. The content length
//! column is left empty when unknown.

use super::{report_result, ResultsManager, ScanResult, SinkWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct CsvResults {
    writer: csv::Writer<SinkWriter>,
}

impl CsvResults {
    pub fn new(writer: SinkWriter) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    fn write_record(&mut self, result: &ScanResult) -> csv::Result<()> {
        let length = if result.length >= 0 {
            result.length.to_string()
        } else {
            String::new()
        };
        let redirect = result
            .redirect
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default();
        self.writer.write_record([
            result.code.to_string(),
            result.url.to_string(),
            length,
            redirect,
        ])
    }
}

impl ResultsManager for CsvResults {
    fn run(mut self: Box<Self>, mut rx: mpsc::Receiver<ScanResult>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(err) = self
                .writer
                .write_record(["code", "url", "content_length", "redirect_url"])
            {
                tracing::warn!("error writing results: {err}");
            }
            while let Some(result) = rx.recv().await {
                if !report_result(&result) {
                    continue;
                }
                if let Err(err) = self.write_record(&result) {
                    tracing::warn!("error writing results: {err}");
                }
            }
            if let Err(err) = self.writer.flush() {
                tracing::warn!("error writing results: {err}");
            }
        })
    }
}
