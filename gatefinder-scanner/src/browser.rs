use crate::error::{Result, ScanError};
use crate::handoff::Handoff;
use crate::page::{LivePage, PageFactory};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task;
use tracing::debug;

/// A single shared headless Chrome; every detection task gets its own tab.
pub struct HeadlessBrowser {
    browser: Arc<Browser>,
    load_timeout: Duration,
}

impl HeadlessBrowser {
    pub fn launch(load_timeout: Duration) -> Result<Self> {
        let launch_opts = LaunchOptions::default_builder()
            .headless(true)
            .idle_browser_timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ScanError::Browser(format!("building LaunchOptions: {e}")))?;

        let browser = Browser::new(launch_opts)
            .map_err(|e| ScanError::Browser(format!("starting headless chrome: {e}")))?;

        Ok(Self {
            browser: Arc::new(browser),
            load_timeout,
        })
    }
}

/// Owns the caller's end of a tab handoff. Dropped before claiming (the
/// open timed out or its task was aborted), it closes whatever tab the
/// worker already delivered; a later delivery is closed by the worker.
struct PendingTab {
    handoff: Arc<Handoff<Arc<Tab>>>,
}

impl Drop for PendingTab {
    fn drop(&mut self) {
        if let Some(tab) = self.handoff.abandon() {
            close_detached(tab);
        }
    }
}

fn close_detached(tab: Arc<Tab>) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(move || {
                if let Err(e) = tab.close(true) {
                    debug!("Closing abandoned tab failed: {}", e);
                }
            });
        }
        Err(_) => debug!("No runtime to close an abandoned tab"),
    }
}

#[async_trait]
impl PageFactory for HeadlessBrowser {
    /// Creates the tab only. Navigation happens in `wait_for_load`, so
    /// everything slow runs after the page is owned by its caller.
    async fn open(&self, url: &str) -> Result<Box<dyn LivePage>> {
        let browser = self.browser.clone();
        let load_timeout = self.load_timeout;
        let pending = PendingTab {
            handoff: Handoff::new(),
        };
        let handoff = pending.handoff.clone();

        task::spawn_blocking(move || -> Result<()> {
            let tab = browser
                .new_tab()
                .map_err(|e| ScanError::Browser(format!("new_tab: {e}")))?;
            tab.set_default_timeout(load_timeout);
            if let Some(orphan) = handoff.deliver(tab) {
                debug!("Tab created after its caller gave up, closing it");
                let _ = orphan.close(true);
            }
            Ok(())
        })
        .await??;

        let tab = pending
            .handoff
            .claim()
            .ok_or_else(|| ScanError::Browser("new_tab: no tab delivered".to_string()))?;

        Ok(Box::new(ChromePage {
            tab,
            url: url.to_string(),
        }))
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
    url: String,
}

#[async_trait]
impl LivePage for ChromePage {
    async fn wait_for_load(&self) -> Result<()> {
        let tab = self.tab.clone();
        let url = self.url.clone();
        task::spawn_blocking(move || {
            tab.navigate_to(&url)
                .map_err(|e| ScanError::Browser(format!("navigate_to({url}): {e}")))?;
            tab.wait_until_navigated()
                .map(|_| ())
                .map_err(|e| ScanError::Browser(format!("wait_until_navigated: {e}")))
        })
        .await?
    }

    async fn count_matches(&self, selector: &str) -> Result<usize> {
        let tab = self.tab.clone();
        let selector = selector.to_string();
        task::spawn_blocking(move || {
            tab.find_elements(&selector)
                .map(|elements| elements.len())
                .map_err(|e| ScanError::Browser(format!("find_elements({selector}): {e}")))
        })
        .await?
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    async fn close(&self) -> Result<()> {
        let tab = self.tab.clone();
        let closed = task::spawn_blocking(move || tab.close(true))
            .await?
            .map_err(|e| ScanError::Browser(format!("close: {e}")))?;
        debug!("Tab closed: {}", closed);
        Ok(())
    }
}
