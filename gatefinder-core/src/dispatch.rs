//! Fan-out of crawl events into bounded detection tasks.
//!
//! Each event is admitted (or not) synchronously against the
//! [`ResultStore`]; admitted URLs get one detection task each. Tasks run on a
//! [`JoinSet`] under a global [`Semaphore`], so the number of pages being
//! classified at once never exceeds `max_in_flight` no matter how many hosts
//! the crawl touches. [`Dispatcher::drain`] is the completion barrier.

use crate::config::DetectorConfig;
use crate::heuristic::StaticClassifier;
use crate::probe::DynamicClassifier;
use crate::store::{ResultStore, hostname_of};
use gatefinder_scanner::{Artifact, CrawlEvent, LivePage, PageFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

/// What happened to an event at the admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// URL could not be parsed into a host; nothing recorded.
    Discarded,
    /// Host already at cap; nothing recorded.
    Dropped,
    /// Recorded and handed to a detection task.
    Admitted,
}

/// Terminal state of one detection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Classified { login: bool },
    TimedOut,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub discarded: usize,
    pub dropped: usize,
    pub admitted: usize,
    pub login_pages: usize,
    pub not_login: usize,
    pub timed_out: usize,
    pub failed: usize,
}

impl DispatchSummary {
    pub fn finished(&self) -> usize {
        self.login_pages + self.not_login + self.timed_out + self.failed
    }
}

pub struct Dispatcher {
    store: Arc<ResultStore>,
    static_classifier: StaticClassifier,
    dynamic_classifier: DynamicClassifier,
    pages: Option<Arc<dyn PageFactory>>,
    task_timeout: Duration,
    permits: Arc<Semaphore>,
    tasks: JoinSet<TaskOutcome>,
    summary: DispatchSummary,
}

impl Dispatcher {
    pub fn new(store: Arc<ResultStore>, config: &DetectorConfig) -> Self {
        Self {
            store,
            static_classifier: StaticClassifier::default(),
            dynamic_classifier: DynamicClassifier::new(config.settle_delay),
            pages: None,
            task_timeout: config.task_timeout,
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            tasks: JoinSet::new(),
            summary: DispatchSummary::default(),
        }
    }

    /// Browser used to render events that arrive as [`Artifact::Render`].
    pub fn with_page_factory(mut self, pages: Arc<dyn PageFactory>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_static_classifier(mut self, classifier: StaticClassifier) -> Self {
        self.static_classifier = classifier;
        self
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn summary(&self) -> DispatchSummary {
        self.summary
    }

    /// Admit one crawl event and, if admitted, start its detection task.
    /// Waits for a free slot when `max_in_flight` tasks are already running.
    pub async fn dispatch(&mut self, event: CrawlEvent) -> Disposition {
        let CrawlEvent { url, artifact } = event;
        debug!("Processing URL: {} ({})", url, artifact.kind());

        let host = match hostname_of(&url) {
            Ok(host) => host,
            Err(e) => {
                debug!("Discarding event: {}", e);
                release(artifact).await;
                self.summary.discarded += 1;
                return Disposition::Discarded;
            }
        };

        if !self.store.record_discovery(&host, &url) {
            debug!("{} is at its cap, dropping {}", host, url);
            release(artifact).await;
            self.summary.dropped += 1;
            return Disposition::Dropped;
        }
        self.summary.admitted += 1;

        while let Some(joined) = self.tasks.try_join_next() {
            self.tally(joined);
        }

        let permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                debug!("Detection pool closed, not classifying {}: {}", url, e);
                release(artifact).await;
                self.summary.failed += 1;
                return Disposition::Admitted;
            }
        };

        let task = DetectionTask {
            url,
            host,
            artifact,
            store: self.store.clone(),
            static_classifier: self.static_classifier,
            dynamic_classifier: self.dynamic_classifier,
            pages: self.pages.clone(),
            budget: self.task_timeout,
            _permit: permit,
        };
        self.tasks.spawn(task.run());

        Disposition::Admitted
    }

    /// Completion barrier: wait until every launched task is terminal.
    pub async fn drain(&mut self) -> DispatchSummary {
        while let Some(joined) = self.tasks.join_next().await {
            self.tally(joined);
        }
        self.summary
    }

    /// Consume events until every sender is gone (the crawl has returned),
    /// then drain outstanding detection work.
    pub async fn run(mut self, mut events: mpsc::Receiver<CrawlEvent>) -> DispatchSummary {
        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }
        info!(
            "Traversal complete, waiting for {} detection tasks",
            self.in_flight()
        );
        let summary = self.drain().await;
        info!("All login page detection finished");
        summary
    }

    fn tally(&mut self, joined: Result<TaskOutcome, JoinError>) {
        match joined {
            Ok(TaskOutcome::Classified { login: true }) => self.summary.login_pages += 1,
            Ok(TaskOutcome::Classified { login: false }) => self.summary.not_login += 1,
            Ok(TaskOutcome::TimedOut) => self.summary.timed_out += 1,
            Ok(TaskOutcome::Failed) => self.summary.failed += 1,
            Err(e) => {
                debug!("Detection task aborted: {}", e);
                self.summary.failed += 1;
            }
        }
    }
}

/// One admitted URL on its way to a verdict. Holds its pool slot until it
/// is dropped.
struct DetectionTask {
    url: String,
    host: String,
    artifact: Artifact,
    store: Arc<ResultStore>,
    static_classifier: StaticClassifier,
    dynamic_classifier: DynamicClassifier,
    pages: Option<Arc<dyn PageFactory>>,
    budget: Duration,
    _permit: OwnedSemaphorePermit,
}

impl DetectionTask {
    async fn run(mut self) -> TaskOutcome {
        let deadline = Instant::now() + self.budget;
        let outcome = match self.render(deadline).await {
            Some(outcome) => outcome,
            None => self.classify(deadline).await,
        };
        release(std::mem::replace(&mut self.artifact, Artifact::Render)).await;

        match outcome {
            TaskOutcome::Classified { login: true } => {
                self.store.record_login_url(&self.host, &self.url);
                info!("Login page found: {}", self.url);
            }
            TaskOutcome::TimedOut => debug!("Detection timed out: {}", self.url),
            TaskOutcome::Failed => debug!("Detection failed: {}", self.url),
            TaskOutcome::Classified { login: false } => {}
        }
        outcome
    }

    /// Open a page for a render request and keep it in `self.artifact`, so
    /// it is released on every exit path. Returns an outcome only when no
    /// page could be opened.
    async fn render(&mut self, deadline: Instant) -> Option<TaskOutcome> {
        if !matches!(self.artifact, Artifact::Render) {
            return None;
        }
        let Some(pages) = self.pages.clone() else {
            debug!("No browser to render {}", self.url);
            return Some(TaskOutcome::Failed);
        };

        match timeout_at(deadline, pages.open(&self.url)).await {
            Ok(Ok(page)) => {
                self.artifact = Artifact::Page(page);
                None
            }
            Ok(Err(e)) => {
                debug!("Creating page for {} failed: {}", self.url, e);
                Some(TaskOutcome::Failed)
            }
            Err(_) => Some(TaskOutcome::TimedOut),
        }
    }

    async fn classify(&self, deadline: Instant) -> TaskOutcome {
        match &self.artifact {
            Artifact::Body(body) => TaskOutcome::Classified {
                login: self.static_classifier.is_login_page(body),
            },
            Artifact::Page(page) => self.probe(&**page, deadline).await,
            Artifact::Render => TaskOutcome::Failed,
        }
    }

    async fn probe(&self, page: &dyn LivePage, deadline: Instant) -> TaskOutcome {
        match timeout_at(deadline, self.dynamic_classifier.is_login_page(page)).await {
            Ok(login) => TaskOutcome::Classified { login },
            Err(_) => TaskOutcome::TimedOut,
        }
    }
}

impl Drop for DetectionTask {
    fn drop(&mut self) {
        // Only reached with a page still open when the task was aborted or
        // panicked mid-probe.
        if let Artifact::Page(_) = &self.artifact {
            let artifact = std::mem::replace(&mut self.artifact, Artifact::Render);
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(release(artifact));
            }
        }
    }
}

async fn release(artifact: Artifact) {
    if let Artifact::Page(page) = artifact {
        close_page(&*page).await;
    }
}

async fn close_page(page: &dyn LivePage) {
    if let Err(e) = page.close().await {
        debug!("Closing page failed: {}", e);
    }
}
