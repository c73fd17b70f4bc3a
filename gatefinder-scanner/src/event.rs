use crate::page::LivePage;
use std::fmt;

/// What the crawl layer hands over for a discovered URL.
pub enum Artifact {
    /// Raw response body, for the static classifier.
    Body(String),
    /// An already rendered page, for the dynamic classifier.
    Page(Box<dyn LivePage>),
    /// Nothing yet; the detector renders the URL itself through its browser.
    Render,
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Body(_) => "body",
            Artifact::Page(_) => "page",
            Artifact::Render => "render",
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Body(body) => f.debug_tuple("Body").field(&body.len()).finish(),
            Artifact::Page(_) => f.write_str("Page(..)"),
            Artifact::Render => f.write_str("Render"),
        }
    }
}

/// One discovered URL, as emitted by the crawl engine.
#[derive(Debug)]
pub struct CrawlEvent {
    pub url: String,
    pub artifact: Artifact,
}

impl CrawlEvent {
    pub fn with_body(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            artifact: Artifact::Body(body.into()),
        }
    }

    pub fn with_page(url: impl Into<String>, page: Box<dyn LivePage>) -> Self {
        Self {
            url: url.into(),
            artifact: Artifact::Page(page),
        }
    }

    pub fn render(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            artifact: Artifact::Render,
        }
    }
}
