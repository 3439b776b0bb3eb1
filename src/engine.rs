//! Pipeline orchestration
//!
//! Wires the queue, expanders, filter, worker pool, and result sink
//! together, seeds the scope roots, and waits for the work counter to
//! settle. Shutdown is a cascade: closing the queue ingress drains the
//! transfer loop, each stage closes its output when its input closes, the
//! workers exit on the final close, and the sink finishes when the last
//! result sender is gone.

use crate::client::{ClientFactory, HttpClientFactory};
use crate::config::{RobotsMode, RunMode, Settings};
use crate::filter::{DotProductExpander, ExtensionExpander, HeaderExpander, WordlistExpander, WorkFilter};
use crate::results;
use crate::task::Task;
use crate::wordlist;
use crate::worker;
use crate::workqueue::WorkQueue;
use crate::Result;
use tokio::sync::{mpsc, watch};

/// Runs a scan with the real HTTP transport.
pub async fn run(settings: Settings) -> Result<()> {
    let mut factory = HttpClientFactory::new(
        &settings.proxies,
        settings.timeout,
        &settings.user_agent,
    )?;
    factory.set_credentials(settings.http_username.clone(), settings.http_password.clone());
    run_with_factory(settings, factory).await
}

/// Runs a scan against any client factory (tests inject their own).
pub async fn run_with_factory<F: ClientFactory>(mut settings: Settings, factory: F) -> Result<()> {
    settings.validate()?;
    if settings.run_mode == RunMode::LinkCheck {
        // Link checking is meaningless without the page worker.
        settings.parse_html = true;
    }
    let scopes = settings.scopes()?;
    let default_header = settings.default_header()?;
    let optional_header = settings.optional_header_map()?;
    let words = wordlist::load_wordlist(settings.wordlist.as_deref())?;
    let queue_size = settings.queue_size;

    tracing::debug!("starting work queue");
    let mut queue = WorkQueue::new(queue_size, &scopes, settings.allow_upgrade);
    let counter = queue.counter();
    let mut work_chan = queue.take_work_chan();
    let queue_loop = queue.run_in_background();

    tracing::debug!("starting expansion and filtering");
    work_chan = match settings.run_mode {
        RunMode::Enumeration => {
            let mut expander = WordlistExpander::new(
                words,
                settings.add_slashes,
                settings.mangle_cases,
                queue_size,
                counter.clone(),
            );
            expander.process_wordlist();
            expander.expand(work_chan)
        }
        RunMode::DotProduct => {
            DotProductExpander::new(words, queue_size, counter.clone()).expand(work_chan)
        }
        RunMode::LinkCheck => work_chan,
    };
    work_chan = HeaderExpander::new(optional_header, queue_size, counter.clone()).expand(work_chan);
    work_chan =
        ExtensionExpander::new(settings.extensions.clone(), queue_size, counter.clone())
            .expand(work_chan);

    let mut work_filter = WorkFilter::new(
        &settings.exclude_paths,
        &settings.user_agent,
        queue_size,
        counter.clone(),
    );
    if settings.robots_mode == RobotsMode::Obey {
        work_filter.add_robots_filter(&scopes, &factory).await;
    }
    let filtered = work_filter.run_filter(work_chan);

    tracing::debug!("creating results manager");
    let (result_tx, result_rx) = mpsc::channel(queue_size);
    let sink = results::results_manager(&settings)?;
    let sink_handle = sink.run(result_rx);

    tracing::debug!("starting {} workers", settings.workers);
    let (stop_tx, stop_rx) = watch::channel(false);
    let workers = worker::start_workers(
        &settings,
        &factory,
        filtered,
        queue.handle(),
        result_tx,
        stop_rx,
    )?;

    tracing::debug!("adding starting URLs: {scopes:?}");
    let seeds: Vec<Task> = scopes
        .iter()
        .map(|root| Task::from_url(root.clone(), &default_header))
        .collect();
    queue.handle().add_tasks(seeds).await;

    if settings.robots_mode == RobotsMode::Seed {
        queue.seed_from_robots(&scopes, &factory, &default_header).await;
    }

    tracing::debug!("main task waiting for work");
    queue.wait_pipe().await;
    tracing::debug!("work done");

    queue.input_finished();
    let _ = queue_loop.await;
    for handle in workers {
        let _ = handle.await;
    }
    drop(stop_tx);

    tracing::debug!("waiting for results manager");
    let _ = sink_handle.await;
    tracing::debug!("done");
    Ok(())
}
