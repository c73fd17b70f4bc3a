//! Dynamic login-page detection against a rendered page.

use gatefinder_scanner::LivePage;
use std::time::Duration;
use tracing::debug;

pub const PASSWORD_SELECTORS: &[&str] = &[
    "input[type='password']",
    "input[name*='pass']",
    "input[id*='pass']",
    "input[name*='pwd']",
    "input[id*='pwd']",
];

pub const USERNAME_SELECTORS: &[&str] = &[
    "input[type='text']",
    "input[type='email']",
    "input[name*='username']",
    "input[id*='username']",
    "input[name*='userid']",
    "input[id*='userid']",
    "input[name*='email']",
    "input[id*='email']",
    "input[name*='account']",
    "input[id*='account']",
];

#[derive(Debug, Clone, Copy)]
pub struct DynamicClassifier {
    settle_delay: Duration,
}

impl DynamicClassifier {
    pub fn new(settle_delay: Duration) -> Self {
        Self { settle_delay }
    }

    /// A page is a login page when it shows a password field and a username
    /// field. Pages that never load are not login pages. The caller owns the
    /// page and the deadline.
    pub async fn is_login_page(&self, page: &dyn LivePage) -> bool {
        if let Err(e) = page.wait_for_load().await {
            debug!("Page never loaded: {}", e);
            return false;
        }

        // client-side frameworks keep mutating the DOM after load
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let Some(password) = first_match(page, PASSWORD_SELECTORS).await else {
            return false;
        };
        debug!("Found password field: {}", password);

        let Some(username) = first_match(page, USERNAME_SELECTORS).await else {
            return false;
        };
        debug!("Found username field: {}", username);

        if let Ok(url) = page.current_url().await {
            debug!("Complete login form at {}", url);
        }
        true
    }
}

/// First selector with at least one element. A failing query counts as no
/// match for that selector only.
async fn first_match(page: &dyn LivePage, selectors: &[&'static str]) -> Option<&'static str> {
    for selector in selectors {
        match page.count_matches(selector).await {
            Ok(n) if n > 0 => return Some(*selector),
            Ok(_) => {}
            Err(e) => debug!("Selector {} failed: {}", selector, e),
        }
    }
    None
}
