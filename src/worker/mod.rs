//! The worker pool
//!
//! Workers drain the filtered task channel, issue the probes, classify the
//! responses, and emit results. A probe can create new work: directory hits
//! in the spiderable code set are re-enqueued for further expansion,
//! trapped redirects are enqueued as fresh tasks, and HTML bodies are handed
//! to the page worker for link extraction. Derivative probes (extensions,
//! backup-file mangles) happen inline and are accounted under the original
//! task.

pub mod html;

pub use html::HtmlWorker;

use crate::client::{Client, ClientFactory};
use crate::config::{RunMode, Settings};
use crate::results::ScanResult;
use crate::scope::{url_has_extension, url_is_dir};
use crate::task::Task;
use crate::workqueue::QueueHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

/// The settings slice a worker needs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub extensions: Vec<String>,
    pub mangle: bool,
    pub sleep_time: Duration,
    pub spider_codes: Vec<u16>,
    pub dot_product: bool,
}

impl WorkerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            extensions: settings.extensions.clone(),
            mangle: settings.mangle,
            sleep_time: settings.sleep_time,
            spider_codes: settings.spider_codes.clone(),
            dot_product: settings.run_mode == RunMode::DotProduct,
        }
    }
}

/// A single worker; a pool of these shares one task channel.
pub struct Worker<C: Client> {
    client: C,
    config: WorkerConfig,
    queue: QueueHandle,
    results: mpsc::Sender<ScanResult>,
    page_worker: Option<HtmlWorker>,
}

impl<C: Client + 'static> Worker<C> {
    pub fn new(
        client: C,
        config: WorkerConfig,
        queue: QueueHandle,
        results: mpsc::Sender<ScanResult>,
    ) -> Self {
        Self {
            client,
            config,
            queue,
            results,
            page_worker: None,
        }
    }

    pub fn set_page_worker(&mut self, page_worker: HtmlWorker) {
        self.page_worker = Some(page_worker);
    }

    /// Consumes tasks until the channel closes or the stop signal fires.
    pub async fn run(mut self, src: Arc<Mutex<mpsc::Receiver<Task>>>, mut stop: watch::Receiver<bool>) {
        loop {
            let task = tokio::select! {
                _ = stop.changed() => return,
                task = async { src.lock().await.recv().await } => task,
            };
            match task {
                Some(task) => {
                    self.handle_task(&task).await;
                    self.queue.done(1);
                }
                None => return,
            }
        }
    }

    async fn handle_task(&mut self, task: &Task) {
        tracing::debug!("trying raw URL (unmangled): {task}");
        let spider = self.try_task(task).await;
        if url_is_dir(&task.url) {
            return;
        }
        if spider {
            self.try_mangle_task(task).await;
        }
        if !url_has_extension(&task.url) {
            for ext in self.config.extensions.clone() {
                let mut derived = task.clone();
                let path = format!("{}.{}", task.url.path(), ext);
                derived.url.set_path(&path);
                if self.try_task(&derived).await {
                    self.try_mangle_task(&derived).await;
                }
            }
        }
    }

    /// Probes for backup/swap siblings of the task's basename.
    async fn try_mangle_task(&mut self, task: &Task) {
        if !self.config.mangle {
            return;
        }
        let path = task.url.path().to_string();
        let Some(slash) = path.rfind('/') else {
            return;
        };
        let (dirname, basename) = (&path[..slash], &path[slash + 1..]);
        for newname in mangle(basename) {
            let mut derived = task.clone();
            derived.url.set_path(&format!("{dirname}/{newname}"));
            self.try_task(&derived).await;
        }
    }

    /// Issues one probe and emits its result. Returns whether the response
    /// code warrants spidering deeper.
    async fn try_task(&mut self, task: &Task) -> bool {
        tracing::info!("trying: {task}");
        let response = self
            .client
            .request(&task.url, task.host.as_deref(), &task.header)
            .await;

        let spider = match response {
            Err(err) => {
                let mut result = ScanResult::for_task(task);
                result.error = Some(err.to_string());
                let _ = self.results.send(result).await;
                false
            }
            Ok(resp) => {
                if url_is_dir(&task.url) && self.keep_spidering(resp.code) {
                    tracing::debug!("referring {task} back for spidering");
                    self.queue.add_task(task.clone()).await;
                }
                if let Some(redirect) = &resp.redirect {
                    tracing::debug!("referring redirect {redirect} back");
                    let mut derived = task.clone();
                    derived.url = redirect.clone();
                    self.queue.add_task(derived).await;
                }

                let mut result = ScanResult::for_task(task);
                result.code = resp.code;
                result.redirect = resp.redirect.clone();
                result.length = resp.length;
                result.content_type = resp.content_type.clone();
                result.response_header = resp.headers.clone();
                if let Some(page_worker) = &self.page_worker {
                    if page_worker.eligible(&resp) {
                        result.links = page_worker.handle(task, &resp.body).await;
                    }
                }
                let _ = self.results.send(result).await;
                self.keep_spidering(resp.code)
            }
        };

        if !self.config.sleep_time.is_zero() {
            tokio::time::sleep(self.config.sleep_time).await;
        }
        spider
    }

    /// Should we keep spidering from this code?
    fn keep_spidering(&self, code: u16) -> bool {
        if self.config.dot_product {
            return false;
        }
        self.config.spider_codes.contains(&code)
    }
}

/// The fixed backup-filename rewrites applied to a basename.
pub fn mangle(basename: &str) -> Vec<String> {
    vec![
        format!(".{basename}.swp"),
        format!("{basename}~"),
        format!("{basename}.bak"),
        format!("{basename}.orig"),
    ]
}

/// Starts the worker pool over a shared task channel. Each worker gets its
/// own client from the factory.
pub fn start_workers<F: ClientFactory>(
    settings: &Settings,
    factory: &F,
    src: mpsc::Receiver<Task>,
    queue: QueueHandle,
    results: mpsc::Sender<ScanResult>,
    stop: watch::Receiver<bool>,
) -> crate::Result<Vec<JoinHandle<()>>> {
    let shared = Arc::new(Mutex::new(src));
    let config = WorkerConfig::from_settings(settings);
    let mut handles = Vec::with_capacity(settings.workers);
    for _ in 0..settings.workers {
        let client = factory.build()?;
        let mut worker = Worker::new(client, config.clone(), queue.clone(), results.clone());
        if settings.parse_html {
            worker.set_page_worker(HtmlWorker::new(queue.clone()));
        }
        handles.push(tokio::spawn(worker.run(shared.clone(), stop.clone())));
    }
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockClientFactory, MockResponse};
    use crate::workqueue::WorkQueue;
    use reqwest::header::HeaderMap;
    use url::Url;

    fn config() -> WorkerConfig {
        WorkerConfig {
            extensions: Vec::new(),
            mangle: false,
            sleep_time: Duration::ZERO,
            spider_codes: vec![200],
            dot_product: false,
        }
    }

    fn task(s: &str) -> Task {
        Task::from_url(Url::parse(s).unwrap(), &HeaderMap::new())
    }

    struct Rig {
        factory: MockClientFactory,
        queue: WorkQueue,
        results: mpsc::Receiver<ScanResult>,
        results_tx: mpsc::Sender<ScanResult>,
    }

    fn rig() -> Rig {
        let (results_tx, results) = mpsc::channel(64);
        Rig {
            factory: MockClientFactory::new(),
            queue: WorkQueue::new(64, &[Url::parse("http://x/").unwrap()], false),
            results,
            results_tx,
        }
    }

    impl Rig {
        fn worker(&self, config: WorkerConfig) -> Worker<crate::client::mock::MockClient> {
            Worker::new(
                self.factory.build().unwrap(),
                config,
                self.queue.handle(),
                self.results_tx.clone(),
            )
        }
    }

    #[test]
    fn test_mangle_rules() {
        assert_eq!(
            mangle("index"),
            vec![".index.swp", "index~", "index.bak", "index.orig"]
        );
    }

    #[tokio::test]
    async fn test_mangle_probes_backup_names() {
        let r = rig();
        r.factory.respond_default(MockResponse::status(404));
        let mut cfg = config();
        cfg.mangle = true;
        let mut worker = r.worker(cfg);

        worker.try_mangle_task(&task("http://x/dir/index")).await;
        assert_eq!(
            r.factory.request_urls(),
            vec![
                "http://x/dir/.index.swp",
                "http://x/dir/index~",
                "http://x/dir/index.bak",
                "http://x/dir/index.orig",
            ]
        );
    }

    #[tokio::test]
    async fn test_mangle_disabled_is_noop() {
        let r = rig();
        r.factory.respond_default(MockResponse::status(404));
        let mut worker = r.worker(config());
        worker.try_mangle_task(&task("http://x/dir/index")).await;
        assert!(r.factory.request_urls().is_empty());
    }

    #[tokio::test]
    async fn test_extensions_probed_for_plain_files() {
        let r = rig();
        r.factory.respond_default(MockResponse::status(404));
        let mut cfg = config();
        cfg.extensions = vec!["html".to_string(), "php".to_string()];
        let mut worker = r.worker(cfg);

        worker.handle_task(&task("http://x/foo")).await;
        assert_eq!(
            r.factory.request_urls(),
            vec!["http://x/foo", "http://x/foo.html", "http://x/foo.php"]
        );
    }

    #[tokio::test]
    async fn test_directory_skips_mangle_and_extensions() {
        let r = rig();
        r.factory.respond_default(MockResponse::status(404));
        let mut cfg = config();
        cfg.mangle = true;
        cfg.extensions = vec!["html".to_string()];
        let mut worker = r.worker(cfg);

        worker.handle_task(&task("http://x/dir/")).await;
        assert_eq!(r.factory.request_urls(), vec!["http://x/dir/"]);
    }

    #[tokio::test]
    async fn test_spiderable_directory_reenqueued() {
        let mut r = rig();
        let mut work = r.queue.take_work_chan();
        r.queue.run_in_background();
        r.factory
            .respond("http://x/dir/", MockResponse::status(200));
        let mut worker = r.worker(config());

        // The task itself was announced by the test.
        r.queue.counter().add(1);
        worker.handle_task(&task("http://x/dir/")).await;
        r.queue.counter().done(1);

        let fed_back = work.recv().await.unwrap();
        assert_eq!(fed_back.url.as_str(), "http://x/dir/");
    }

    #[tokio::test]
    async fn test_redirect_fed_back_and_reported() {
        let mut r = rig();
        let mut work = r.queue.take_work_chan();
        r.queue.run_in_background();
        r.factory.respond(
            "http://x/old",
            MockResponse::redirect(301, Url::parse("http://x/new").unwrap()),
        );
        let mut worker = r.worker(config());

        worker.handle_task(&task("http://x/old")).await;

        let fed_back = work.recv().await.unwrap();
        assert_eq!(fed_back.url.as_str(), "http://x/new");

        let result = r.results.recv().await.unwrap();
        assert_eq!(result.code, 301);
        assert_eq!(result.redirect.unwrap().as_str(), "http://x/new");
    }

    #[tokio::test]
    async fn test_transport_error_reported_with_code_zero() {
        let mut r = rig();
        let mut worker = r.worker(config());
        worker.handle_task(&task("http://x/unreachable")).await;

        let result = r.results.recv().await.unwrap();
        assert_eq!(result.code, 0);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_dot_product_never_spiders() {
        let mut r = rig();
        r.factory.respond_default(MockResponse::status(200));
        let mut cfg = config();
        cfg.dot_product = true;
        let mut worker = r.worker(cfg);
        assert!(!worker.keep_spidering(200));
        worker.handle_task(&task("http://x/dir/")).await;
        // Only the raw probe; no spider feedback was queued.
        assert_eq!(r.factory.request_urls(), vec!["http://x/dir/"]);
        assert_eq!(r.queue.counter().counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_worker_pool_drains_and_exits() {
        let r = rig();
        r.factory.respond_default(MockResponse::status(404));
        let (task_tx, task_rx) = mpsc::channel(16);
        let (_stop_tx, stop_rx) = watch::channel(false);

        let counter = r.queue.counter();
        counter.add(3);
        for path in ["a", "b", "c"] {
            task_tx.send(task(&format!("http://x/{path}"))).await.unwrap();
        }
        drop(task_tx);

        let worker = r.worker(config());
        let handle = tokio::spawn(worker.run(Arc::new(Mutex::new(task_rx)), stop_rx));
        handle.await.unwrap();
        assert_eq!(counter.counts(), (3, 3));
    }
}
