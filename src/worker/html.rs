//! HTML page worker
//!
//! Parses `text/html` bodies and feeds the discovered links back into the
//! queue: each resolved link is enqueued along with every ancestor directory
//! of its path, so a single deep link also probes the directories above it.

use crate::client::{ProbeResponse, BODY_LIMIT};
use crate::results::LinkType;
use crate::scope::parent_paths;
use crate::task::Task;
use crate::workqueue::QueueHandle;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use url::Url;

pub struct HtmlWorker {
    queue: QueueHandle,
}

impl HtmlWorker {
    pub fn new(queue: QueueHandle) -> Self {
        Self { queue }
    }

    /// A response is parseable when its bare media type is exactly
    /// `text/html` and the declared length is unknown or within the body
    /// limit.
    pub fn eligible(&self, resp: &ProbeResponse) -> bool {
        let bare = resp
            .content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if bare != "text/html" {
            return false;
        }
        resp.length < 0 || resp.length <= BODY_LIMIT as i64
    }

    /// Extracts links from the body, enqueues them (with ancestors), and
    /// returns the resolved link map for the result.
    pub async fn handle(&self, task: &Task, body: &[u8]) -> HashMap<String, LinkType> {
        let capped = &body[..body.len().min(BODY_LIMIT)];
        let html = String::from_utf8_lossy(capped);
        let (base_href, raw_links) = extract_links(&html);

        let base_url = base_href
            .and_then(|href| task.url.join(&href).ok())
            .unwrap_or_else(|| task.url.clone());

        let mut links: HashMap<String, LinkType> = HashMap::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut tasks: Vec<Task> = Vec::new();
        for (raw, link_type) in raw_links {
            let resolved = match base_url.join(&raw) {
                Ok(mut resolved) => {
                    resolved.set_fragment(None);
                    resolved
                }
                Err(err) => {
                    tracing::info!("error parsing URL ({raw}): {err}");
                    continue;
                }
            };
            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                continue;
            }
            links.insert(resolved.to_string(), link_type);

            let mut found = parent_paths(&resolved);
            found.insert(0, resolved);
            for url in found {
                if queued.insert(url.to_string()) {
                    let mut derived = task.clone();
                    derived.url = url;
                    tasks.push(derived);
                }
            }
        }
        self.queue.add_tasks(tasks).await;
        links
    }
}

/// Pulls the `<base href>` and the link attributes out of a document. Pure
/// parsing, no I/O; the DOM never crosses an await point.
fn extract_links(html: &str) -> (Option<String>, Vec<(String, LinkType)>) {
    let document = Html::parse_document(html);

    let mut base_href = None;
    if let Ok(base_selector) = Selector::parse("base[href]") {
        base_href = document
            .select(&base_selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(str::to_string);
    }

    let sources = [
        ("a[href]", "href", LinkType::Href),
        ("img[src]", "src", LinkType::Img),
        ("script[src]", "src", LinkType::Script),
        ("style[src]", "src", LinkType::Style),
    ];
    let mut links = Vec::new();
    for (selector, attr, link_type) in sources {
        if let Ok(selector) = Selector::parse(selector) {
            for element in document.select(&selector) {
                if let Some(value) = element.value().attr(attr) {
                    links.push((value.to_string(), link_type));
                }
            }
        }
    }
    (base_href, links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workqueue::WorkQueue;
    use reqwest::header::HeaderMap;

    fn worker_and_queue() -> (HtmlWorker, WorkQueue) {
        let queue = WorkQueue::new(64, &[Url::parse("http://x/").unwrap()], false);
        (HtmlWorker::new(queue.handle()), queue)
    }

    fn task(s: &str) -> Task {
        Task::from_url(Url::parse(s).unwrap(), &HeaderMap::new())
    }

    fn probe(content_type: &str, length: i64) -> ProbeResponse {
        ProbeResponse {
            code: 200,
            length,
            content_type: content_type.to_string(),
            headers: HeaderMap::new(),
            redirect: None,
            body: Vec::new(),
        }
    }

    #[test]
    fn test_eligible_content_types() {
        let (worker, _queue) = worker_and_queue();
        assert!(worker.eligible(&probe("text/html", 100)));
        assert!(worker.eligible(&probe("text/html; charset=utf-8", 100)));
        assert!(worker.eligible(&probe("TEXT/HTML", -1)));
        assert!(!worker.eligible(&probe("application/json", 100)));
        assert!(!worker.eligible(&probe("", 100)));
    }

    #[test]
    fn test_eligible_length_limit() {
        let (worker, _queue) = worker_and_queue();
        assert!(worker.eligible(&probe("text/html", BODY_LIMIT as i64)));
        assert!(!worker.eligible(&probe("text/html", BODY_LIMIT as i64 + 1)));
        assert!(worker.eligible(&probe("text/html", 0)));
        assert!(worker.eligible(&probe("text/html", -1)));
    }

    #[test]
    fn test_extract_links_all_sources() {
        let html = r#"<html><body>
            <a href="/a/page.html">a</a>
            <img src="/img/logo.png">
            <script src="/js/app.js"></script>
            <style src="/css/site.css"></style>
            <a>no href</a>
        </body></html>"#;
        let (base, links) = extract_links(html);
        assert!(base.is_none());
        assert_eq!(
            links,
            vec![
                ("/a/page.html".to_string(), LinkType::Href),
                ("/img/logo.png".to_string(), LinkType::Img),
                ("/js/app.js".to_string(), LinkType::Script),
                ("/css/site.css".to_string(), LinkType::Style),
            ]
        );
    }

    #[test]
    fn test_extract_base() {
        let html = r#"<html><head><base href="/deep/"></head><body><a href="page">x</a></body></html>"#;
        let (base, links) = extract_links(html);
        assert_eq!(base.as_deref(), Some("/deep/"));
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn test_handle_enqueues_links_and_ancestors() {
        let (worker, mut queue) = worker_and_queue();
        let mut work = queue.take_work_chan();
        queue.run_in_background();

        let body = br#"<html><body><a href="/a/b/c/page.html">x</a></body></html>"#;
        let links = worker.handle(&task("http://x/"), body).await;
        assert_eq!(links.len(), 1);
        assert!(links.contains_key("http://x/a/b/c/page.html"));

        let mut queued = Vec::new();
        for _ in 0..4 {
            queued.push(work.recv().await.unwrap().url.path().to_string());
            queue.counter().done(1);
        }
        assert_eq!(queued, vec!["/a/b/c/page.html", "/a", "/a/b", "/a/b/c"]);
        queue.wait_pipe().await;
    }

    #[tokio::test]
    async fn test_handle_resolves_against_base() {
        let (worker, mut queue) = worker_and_queue();
        let mut work = queue.take_work_chan();
        queue.run_in_background();

        let body = br#"<html><head><base href="http://x/root/"></head><body><a href="page">x</a></body></html>"#;
        let links = worker.handle(&task("http://x/"), body).await;
        assert!(links.contains_key("http://x/root/page"));

        let first = work.recv().await.unwrap();
        assert_eq!(first.url.path(), "/root/page");
    }

    #[tokio::test]
    async fn test_handle_skips_foreign_schemes_and_dedupes() {
        let (worker, mut queue) = worker_and_queue();
        let _work = queue.take_work_chan();
        queue.run_in_background();

        let body = br#"<html><body>
            <a href="mailto:a@example.com">m</a>
            <a href="javascript:void(0)">j</a>
            <a href="/only">one</a>
            <a href="/only">two</a>
        </body></html>"#;
        let links = worker.handle(&task("http://x/"), body).await;
        assert_eq!(links.len(), 1);
        // One unique URL queued once.
        assert_eq!(queue.counter().counts(), (0, 1));
    }

    #[tokio::test]
    async fn test_handle_preserves_task_headers() {
        let (_, mut queue) = worker_and_queue();
        let worker = HtmlWorker::new(queue.handle());
        let mut work = queue.take_work_chan();
        queue.run_in_background();

        let mut header = HeaderMap::new();
        header.insert("x-probe", "yes".parse().unwrap());
        let source = Task::from_url(Url::parse("http://x/").unwrap(), &header);

        let body = br#"<a href="/found">x</a>"#;
        worker.handle(&source, body).await;
        let queued = work.recv().await.unwrap();
        assert_eq!(queued.header.get("x-probe").unwrap(), "yes");
    }
}
