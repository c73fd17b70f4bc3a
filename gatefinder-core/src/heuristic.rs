//! Static login-page scoring over raw response HTML.
//!
//! Matching is substring and regex based, never a DOM parse, so malformed
//! markup is scored just like well-formed markup. This is a pre-filter: it
//! will misjudge some pages.

use crate::indicators::{DEFAULT_INDICATORS, LoginIndicators};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Score at or above which a body is called a login page.
pub const LOGIN_SCORE_THRESHOLD: i32 = 6;

const CAPTCHA_MARKERS: &[&str] = &["captcha", "验证码"];

static FORM_WITH_PASSWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<form[^>]*>[\s\S]*?<input[^>]*type=["']password["'][^>]*>[\s\S]*?</form>"#)
        .expect("form/password pattern is valid")
});

#[derive(Debug, Clone, Copy)]
pub struct StaticClassifier {
    indicators: LoginIndicators,
    threshold: i32,
}

impl Default for StaticClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_INDICATORS)
    }
}

impl StaticClassifier {
    pub fn new(indicators: LoginIndicators) -> Self {
        Self {
            indicators,
            threshold: LOGIN_SCORE_THRESHOLD,
        }
    }

    /// Score a body. `None` means the form/password gate was not passed and
    /// no scoring happened.
    pub fn score(&self, body: &str) -> Option<i32> {
        let body = body.to_lowercase();

        if !body.contains("<form") || !body.contains(r#"type="password""#) {
            return None;
        }

        let table = &self.indicators;
        let mut score = 0;

        score += 2 * count_present(&body, table.form_attributes);

        let input_types = table
            .input_types
            .iter()
            .filter(|name| body.contains(&format!(r#"type="{}""#, name)))
            .count();
        if input_types >= 2 {
            score += 3;
        }

        score += 2 * count_present(&body, table.button_texts);
        score += count_present(&body, table.keywords);

        if count_present(&body, table.exclusions) > 2 {
            score -= 3;
        }

        if FORM_WITH_PASSWORD.is_match(&body) {
            score += 3;
        }

        if CAPTCHA_MARKERS.iter().any(|marker| body.contains(*marker)) {
            score += 1;
        }

        Some(score)
    }

    pub fn is_login_page(&self, body: &str) -> bool {
        match self.score(body) {
            Some(score) => {
                debug!("Login page detection score: {}", score);
                score >= self.threshold
            }
            None => false,
        }
    }
}

fn count_present(body: &str, needles: &[&str]) -> i32 {
    needles.iter().filter(|needle| body.contains(**needle)).count() as i32
}
