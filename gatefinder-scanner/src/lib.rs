pub mod crawler;
pub mod error;
pub mod event;
pub mod handoff;
pub mod page;

#[cfg(feature = "headless")]
pub mod browser;

pub use crawler::{CrawlMode, Crawler, CrawlerOptions, ProgressCallback};
pub use error::ScanError;
pub use event::{Artifact, CrawlEvent};
pub use handoff::Handoff;
pub use page::{LivePage, PageFactory};

#[cfg(feature = "headless")]
pub use browser::HeadlessBrowser;
