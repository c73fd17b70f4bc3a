// Scripted stand-ins for the browser layer

#![allow(dead_code)]

use async_trait::async_trait;
use gatefinder_scanner::error::{Result, ScanError};
use gatefinder_scanner::{LivePage, PageFactory};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub enum Load {
    Ready,
    Fails,
    Hangs,
    /// The renderer blows up mid-load.
    Panics,
    /// Ready after the given delay.
    Slow(Duration),
}

/// Tracks how many pages are loading at the same moment.
#[derive(Debug, Default)]
pub struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct FakePage {
    url: String,
    load: Load,
    matches: HashSet<&'static str>,
    failing: HashSet<&'static str>,
    pub closed: Arc<AtomicBool>,
    pub queries: Arc<Mutex<Vec<String>>>,
    gauge: Option<Arc<Gauge>>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            load: Load::Ready,
            matches: HashSet::new(),
            failing: HashSet::new(),
            closed: Arc::new(AtomicBool::new(false)),
            queries: Arc::new(Mutex::new(Vec::new())),
            gauge: None,
        }
    }

    pub fn login_form(url: &str) -> Self {
        Self::new(url)
            .matching("input[type='password']")
            .matching("input[type='text']")
    }

    pub fn matching(mut self, selector: &'static str) -> Self {
        self.matches.insert(selector);
        self
    }

    pub fn failing(mut self, selector: &'static str) -> Self {
        self.failing.insert(selector);
        self
    }

    pub fn load(mut self, load: Load) -> Self {
        self.load = load;
        self
    }

    pub fn gauge(mut self, gauge: Arc<Gauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LivePage for FakePage {
    async fn wait_for_load(&self) -> Result<()> {
        match self.load {
            Load::Ready => Ok(()),
            Load::Fails => Err(ScanError::Browser("navigation failed".to_string())),
            Load::Hangs => std::future::pending().await,
            Load::Panics => panic!("renderer crashed loading {}", self.url),
            Load::Slow(delay) => {
                if let Some(gauge) = &self.gauge {
                    let now = gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
                    gauge.peak.fetch_max(now, Ordering::SeqCst);
                }
                tokio::time::sleep(delay).await;
                if let Some(gauge) = &self.gauge {
                    gauge.active.fetch_sub(1, Ordering::SeqCst);
                }
                Ok(())
            }
        }
    }

    async fn count_matches(&self, selector: &str) -> Result<usize> {
        self.queries.lock().unwrap().push(selector.to_string());
        if self.failing.contains(selector) {
            return Err(ScanError::Browser(format!("bad selector {selector}")));
        }
        Ok(if self.matches.contains(selector) { 1 } else { 0 })
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens a clone of a template page for every URL, remembering each one.
pub struct FakeBrowser {
    template: Option<FakePage>,
    pub opened: Mutex<Vec<FakePage>>,
}

impl FakeBrowser {
    pub fn serving(template: FakePage) -> Self {
        Self {
            template: Some(template),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn broken() -> Self {
        Self {
            template: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<FakePage> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFactory for FakeBrowser {
    async fn open(&self, url: &str) -> Result<Box<dyn LivePage>> {
        let Some(template) = &self.template else {
            return Err(ScanError::Browser("cannot create target".to_string()));
        };
        let mut page = template.clone();
        page.url = url.to_string();
        page.closed = Arc::new(AtomicBool::new(false));
        page.queries = Arc::new(Mutex::new(Vec::new()));
        self.opened.lock().unwrap().push(page.clone());
        Ok(Box::new(page))
    }
}
