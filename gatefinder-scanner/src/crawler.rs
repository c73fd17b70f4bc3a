use crate::error::{Result, ScanError};
use crate::event::CrawlEvent;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use url::Url;

pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// File extensions never worth fetching: media, styles, scripts, fonts,
/// office documents, archives and binaries.
pub const DEFAULT_EXTENSION_FILTER: &[&str] = &[
    "jpg", "png", "gif", "jpeg", "ico", "svg", "css", "js", "woff", "woff2", "eot", "ttf", "otf",
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "rar", "7z", "tar", "gz", "bz2",
    "exe", "dll", "msi", "iso", "img", "bin", "dat",
];

/// Path fragments that mark asset trees rather than pages.
pub const DEFAULT_OUT_OF_SCOPE: &[&str] = &["static", "assets", "img"];

/// How the crawl engine hands pages to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Attach the fetched response body to every event.
    Static,
    /// Emit bare URLs; the detector renders them in a browser.
    Headless,
}

impl FromStr for CrawlMode {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "static" => Ok(CrawlMode::Static),
            "headless" | "dynamic" => Ok(CrawlMode::Headless),
            other => Err(ScanError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub max_depth: usize,
    pub timeout_secs: u64,
    pub mode: CrawlMode,
    pub ignore_query: bool,
    pub extension_filter: Vec<String>,
    pub out_of_scope: Vec<String>,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            timeout_secs: 30,
            mode: CrawlMode::Static,
            ignore_query: true,
            extension_filter: DEFAULT_EXTENSION_FILTER.iter().map(|s| s.to_string()).collect(),
            out_of_scope: DEFAULT_OUT_OF_SCOPE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Reference crawl engine. Walks one site with a pool of workers and emits a
/// [`CrawlEvent`] per fetched URL. Returning from [`Crawler::crawl`] drops
/// every sender clone it holds, which is the traversal-complete signal.
pub struct Crawler {
    client: Client,
    visited: Arc<Mutex<HashSet<String>>>,
    options: CrawlerOptions,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(options: CrawlerOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Gatefinder/0.1 (https://github.com/trapdoorsec/gatefinder)")
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs((options.timeout_secs / 2).max(1)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            visited: Arc::new(Mutex::new(HashSet::new())),
            options,
            progress_callback: None,
        })
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawl from `start_url` with `workers` concurrent fetchers, sending
    /// events into `events`. Returns the number of events emitted.
    pub async fn crawl(
        &self,
        start_url: &str,
        workers: usize,
        events: mpsc::Sender<CrawlEvent>,
    ) -> Result<usize> {
        let workers = workers.max(1);
        info!("Starting crawl of {} with {} workers", start_url, workers);

        let parsed_url = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;

        let base_domain = parsed_url
            .host_str()
            .ok_or_else(|| ScanError::InvalidUrl(format!("{} has no host", start_url)))?
            .to_string();

        {
            let mut visited = self.visited.lock().await;
            visited.insert(Self::dedup_key(&parsed_url, self.options.ignore_query));
        }

        // Each worker owns a queue of (url, depth); new links are spread
        // round-robin. `pending` counts queued plus in-progress items, so the
        // crawl is over exactly when it reaches zero.
        let worker_queues: Arc<Vec<Mutex<VecDeque<(String, usize)>>>> =
            Arc::new((0..workers).map(|_| Mutex::new(VecDeque::new())).collect());
        let pending = Arc::new(AtomicUsize::new(1));
        let emitted = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicBool::new(false));

        {
            let mut queue = worker_queues[0].lock().await;
            queue.push_back((start_url.to_string(), 0));
        }

        let mut worker_handles = Vec::new();

        for worker_id in 0..workers {
            let client = self.client.clone();
            let base_domain = base_domain.clone();
            let progress_cb = self.progress_callback.clone();
            let options = self.options.clone();
            let visited = self.visited.clone();
            let worker_queues = worker_queues.clone();
            let pending = pending.clone();
            let emitted = emitted.clone();
            let stopped = stopped.clone();
            let events = events.clone();

            let handle = tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                let mut target_worker = worker_id;

                loop {
                    if stopped.load(Ordering::Acquire) {
                        break;
                    }

                    let work_item = {
                        let mut queue = worker_queues[worker_id].lock().await;
                        queue.pop_front()
                    };

                    let Some((url, depth)) = work_item else {
                        if pending.load(Ordering::Acquire) == 0 {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        continue;
                    };

                    if let Some(ref callback) = progress_cb {
                        callback(worker_id, url.clone());
                    }

                    match Self::fetch_and_parse(&client, &url, &base_domain, &options).await {
                        Ok((body, new_urls)) => {
                            let event = match options.mode {
                                CrawlMode::Static => CrawlEvent::with_body(url.clone(), body),
                                CrawlMode::Headless => CrawlEvent::render(url.clone()),
                            };
                            if events.send(event).await.is_err() {
                                warn!("Event receiver dropped, worker {} stopping", worker_id);
                                stopped.store(true, Ordering::Release);
                                break;
                            }
                            emitted.fetch_add(1, Ordering::Relaxed);

                            if depth + 1 < options.max_depth {
                                for new_url in new_urls {
                                    let Ok(parsed) = Url::parse(&new_url) else {
                                        continue;
                                    };
                                    let key = Self::dedup_key(&parsed, options.ignore_query);
                                    let should_queue = visited.lock().await.insert(key);

                                    if should_queue {
                                        debug!("[Worker {}] Queuing {} to worker {}", worker_id, new_url, target_worker);
                                        pending.fetch_add(1, Ordering::AcqRel);
                                        let mut queue = worker_queues[target_worker].lock().await;
                                        queue.push_back((new_url, depth + 1));
                                        drop(queue);
                                        target_worker = (target_worker + 1) % worker_queues.len();
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Crawl error for {}: {}", url, e);
                        }
                    }

                    pending.fetch_sub(1, Ordering::AcqRel);
                }

                debug!("Worker {} finished", worker_id);
            });

            worker_handles.push(handle);
        }

        // Workers hold their own clones; ours goes now so the receiver sees
        // the channel close as soon as the last worker exits.
        drop(events);

        for handle in worker_handles {
            handle.await?;
        }

        let total = emitted.load(Ordering::Relaxed);
        info!("Crawl complete. Emitted {} pages", total);
        Ok(total)
    }

    async fn fetch_and_parse(
        client: &Client,
        url: &str,
        base_domain: &str,
        options: &CrawlerOptions,
    ) -> Result<(String, Vec<String>)> {
        debug!("Fetching {}", url);

        let response = client.get(url).send().await?;
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        let is_html = content_type
            .as_ref()
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        let links = if is_html {
            Self::extract_links(&body, url, base_domain, options)?
        } else {
            Vec::new()
        };

        Ok((body, links))
    }

    fn extract_links(
        html: &str,
        current_url: &str,
        base_domain: &str,
        options: &CrawlerOptions,
    ) -> Result<Vec<String>> {
        let document = Html::parse_document(html);
        let link_selector =
            Selector::parse("a[href]").map_err(|e| ScanError::Other(e.to_string()))?;
        let mut links = Vec::new();

        for element in document.select(&link_selector) {
            if let Some(href) = element.value().attr("href")
                && let Some(absolute_url) = resolve_url(current_url, href)
            {
                if !is_same_domain(&absolute_url, base_domain) {
                    debug!("  -> {} is off-domain, skipping", absolute_url);
                    continue;
                }
                if is_filtered(&absolute_url, options) {
                    debug!("  -> {} is filtered, skipping", absolute_url);
                    continue;
                }
                links.push(absolute_url);
            }
        }

        Ok(links)
    }

    fn dedup_key(url: &Url, ignore_query: bool) -> String {
        let mut key = url.clone();
        key.set_fragment(None);
        if ignore_query {
            key.set_query(None);
        }
        key.to_string()
    }

    pub async fn visited_count(&self) -> usize {
        self.visited.lock().await.len()
    }
}

pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut url = base_url.join(href).ok()?;
    url.set_fragment(None);

    Some(url.to_string())
}

pub fn is_same_domain(url: &str, base_domain: &str) -> bool {
    if let Ok(parsed) = Url::parse(url)
        && let Some(host) = parsed.host_str()
    {
        return host == base_domain || host.ends_with(&format!(".{}", base_domain));
    }
    false
}

/// True when the URL's extension or path puts it outside the crawl.
pub fn is_filtered(url: &str, options: &CrawlerOptions) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return true;
    };
    let path = parsed.path().to_lowercase();

    let last = path.rsplit('/').next().unwrap_or("");
    if let Some((_, ext)) = last.rsplit_once('.')
        && options.extension_filter.iter().any(|f| f == ext)
    {
        return true;
    }

    options.out_of_scope.iter().any(|token| path.contains(token.as_str()))
}
