//! The narrow slice of a browser runtime the detector needs.
//!
//! A [`LivePage`] is one rendered tab. It is owned by a single detection task
//! and must be closed by that task whatever the outcome.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LivePage: Send + Sync {
    /// Resolve once the page has fired its load event.
    async fn wait_for_load(&self) -> Result<()>;

    /// Number of elements matching a CSS selector.
    async fn count_matches(&self, selector: &str) -> Result<usize>;

    /// The URL the page currently shows (after redirects).
    async fn current_url(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}

/// Opens pages on demand, one per detection task.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn LivePage>>;
}
