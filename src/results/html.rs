//! HTML table output
//!
//! A static header with the first scope root in the title, one table row per
//! reportable non-redirect result, and a static footer written when the
//! stream closes.

use super::{html_escape, log_write_error, report_result, ResultsManager, ScanResult, SinkWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct HtmlResults {
    writer: SinkWriter,
    base_url: String,
}

impl HtmlResults {
    pub fn new(writer: SinkWriter, base_url: &str) -> Self {
        Self {
            writer,
            base_url: base_url.to_string(),
        }
    }

    fn write_header(&mut self) {
        let base = html_escape(&self.base_url);
        let header = format!(
            "<html><head><title>burrow: {base}</title></head><body>\
             <h2>Results for <a href=\"{base}\">{base}</a></h2>\
             <table><tr><th>Code</th><th>URL</th><th>Size</th><th>Content-Type</th></tr>\n"
        );
        if let Err(err) = self.writer.write_all(header.as_bytes()) {
            log_write_error(err);
        }
    }

    fn write_result(&mut self, result: &ScanResult) {
        let url = html_escape(result.url.as_str());
        let length = if result.length >= 0 {
            result.length.to_string()
        } else {
            String::new()
        };
        let row = format!(
            "<tr><td>{}</td><td><a href=\"{url}\">{url}</a></td><td>{length}</td><td>{}</td></tr>\n",
            result.code,
            html_escape(&result.content_type),
        );
        if let Err(err) = self.writer.write_all(row.as_bytes()) {
            log_write_error(err);
        }
    }

    fn write_footer(&mut self) {
        if let Err(err) = self.writer.write_all(b"</table></body></html>\n") {
            log_write_error(err);
        }
    }
}

impl ResultsManager for HtmlResults {
    fn run(mut self: Box<Self>, mut rx: mpsc::Receiver<ScanResult>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.write_header();
            while let Some(result) = rx.recv().await {
                if !report_result(&result) || result.redirect.is_some() {
                    continue;
                }
                self.write_result(&result);
            }
            self.write_footer();
            if let Err(err) = self.writer.flush() {
                log_write_error(err);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use reqwest::header::HeaderMap;
    use std::sync::{Arc, Mutex};
    use url::Url;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_html_document_shape() {
        let buf = SharedBuf::default();
        let sink = Box::new(HtmlResults::new(Box::new(buf.clone()), "http://x/"));
        let (tx, rx) = mpsc::channel(8);
        let handle = sink.run(rx);

        let task = Task::from_url(Url::parse("http://x/a").unwrap(), &HeaderMap::new());
        let mut found = ScanResult::for_task(&task);
        found.code = 200;
        found.length = 7;
        found.content_type = "text/html".to_string();
        tx.send(found).await.unwrap();

        let mut redirected = ScanResult::for_task(&task);
        redirected.code = 301;
        redirected.redirect = Some(Url::parse("http://x/b").unwrap());
        tx.send(redirected).await.unwrap();

        drop(tx);
        handle.await.unwrap();

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(output.starts_with("<html>"));
        assert!(output.contains("<title>burrow: http://x/</title>"));
        assert!(output.contains("<td>200</td>"));
        assert!(output.contains("http://x/a"));
        // Redirects are skipped by the HTML sink.
        assert!(!output.contains("301"));
        assert!(output.ends_with("</table></body></html>\n"));
    }
}
