use crate::error::{DetectError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use url::Url;

pub const DEFAULT_HOST_CAP: usize = 500;

/// Everything recorded for one hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResult {
    /// Admitted URLs in discovery order.
    #[serde(rename = "url")]
    pub urls: Vec<String>,
    /// URLs classified as login pages, in classification order.
    #[serde(rename = "login_url")]
    pub login_urls: Vec<String>,
    pub count: usize,
}

pub type Snapshot = BTreeMap<String, HostResult>;

/// Per-host aggregation behind a single reader/writer lock. Every method
/// takes the lock once, so operations are atomic with respect to each other.
#[derive(Debug)]
pub struct ResultStore {
    cap: usize,
    hosts: RwLock<HashMap<String, HostResult>>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_CAP)
    }
}

impl ResultStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Admit `url` under `host` unless the host is already at the cap.
    /// Only admitted URLs are ever classified.
    pub fn record_discovery(&self, host: &str, url: &str) -> bool {
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        let entry = hosts.entry(host.to_string()).or_default();
        if entry.count >= self.cap {
            return false;
        }
        entry.urls.push(url.to_string());
        entry.count += 1;
        true
    }

    /// Append a login URL. Not cap-gated: a task admitted just before the
    /// host filled up may still land here afterwards.
    pub fn record_login_url(&self, host: &str, url: &str) {
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        hosts
            .entry(host.to_string())
            .or_default()
            .login_urls
            .push(url.to_string());
    }

    pub fn host(&self, host: &str) -> Option<HostResult> {
        let hosts = self.hosts.read().unwrap_or_else(PoisonError::into_inner);
        hosts.get(host).cloned()
    }

    /// Copy of the whole store, ordered by hostname. Only meaningful once
    /// detection has drained.
    pub fn snapshot(&self) -> Snapshot {
        let hosts = self.hosts.read().unwrap_or_else(PoisonError::into_inner);
        hosts
            .iter()
            .map(|(host, result)| (host.clone(), result.clone()))
            .collect()
    }
}

/// Aggregation key for a URL: its host, without port or IPv6 brackets.
pub fn hostname_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| DetectError::InvalidUrl(format!("{}: {}", url, e)))?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DetectError::MissingHost(url.to_string()))?;
    Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_until_cap() {
        let store = ResultStore::new(2);
        assert_eq!(store.cap(), 2);
        assert!(store.record_discovery("a.test", "http://a.test/1"));
        assert!(store.record_discovery("a.test", "http://a.test/2"));
        assert!(!store.record_discovery("a.test", "http://a.test/3"));

        let host = store.host("a.test").unwrap();
        assert_eq!(host.count, 2);
        assert_eq!(host.urls, vec!["http://a.test/1", "http://a.test/2"]);
    }

    #[test]
    fn test_hosts_are_capped_independently() {
        let store = ResultStore::new(1);
        assert!(store.record_discovery("a.test", "http://a.test/"));
        assert!(store.record_discovery("b.test", "http://b.test/"));
        assert!(!store.record_discovery("a.test", "http://a.test/x"));
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_zero_cap_creates_empty_entry() {
        let store = ResultStore::new(0);
        assert!(!store.record_discovery("a.test", "http://a.test/"));
        assert_eq!(store.host("a.test"), Some(HostResult::default()));
    }

    #[test]
    fn test_login_url_for_unknown_host_is_tolerated() {
        let store = ResultStore::default();
        store.record_login_url("ghost.test", "http://ghost.test/login");
        let host = store.host("ghost.test").unwrap();
        assert_eq!(host.login_urls, vec!["http://ghost.test/login"]);
        assert_eq!(host.count, 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = ResultStore::default();
        store.record_discovery("a.test", "http://a.test/");
        let before = store.snapshot();
        store.record_discovery("a.test", "http://a.test/more");
        assert_eq!(before["a.test"].count, 1);
        assert_eq!(store.snapshot()["a.test"].count, 2);
    }

    #[test]
    fn test_hostname_of() {
        assert_eq!(hostname_of("https://Example.test:8443/x?y").unwrap(), "example.test");
        assert_eq!(hostname_of("http://[::1]:8080/").unwrap(), "::1");
        assert!(matches!(hostname_of("not a url"), Err(DetectError::InvalidUrl(_))));
        assert!(matches!(hostname_of("mailto:a@b.test"), Err(DetectError::MissingHost(_))));
    }
}
