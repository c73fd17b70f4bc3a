// Report generation from a drained result store

use crate::error::Result;
use crate::store::{HostResult, Snapshot, hostname_of};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// `<start-host>_<YYYYMMDDHHMMSS>.json`, or `default_...` when the start URL
/// has no host.
pub fn report_file_name(start_url: &str, captured_at: DateTime<Local>) -> String {
    let stamp = captured_at.format("%Y%m%d%H%M%S");
    match hostname_of(start_url) {
        Ok(host) => format!("{}_{}.json", sanitize(&host), stamp),
        Err(_) => format!("default_{}.json", stamp),
    }
}

fn sanitize(host: &str) -> String {
    host.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

pub fn render_json(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

pub fn parse_json(document: &str) -> Result<Snapshot> {
    Ok(serde_json::from_str(document)?)
}

/// Write the snapshot under `dir`, creating it first. An existing file with
/// the same name is never overwritten; a numeric suffix is added instead.
pub fn write_report(
    snapshot: &Snapshot,
    start_url: &str,
    dir: &Path,
    captured_at: DateTime<Local>,
) -> Result<PathBuf> {
    let document = render_json(snapshot)?;
    fs::create_dir_all(dir)?;

    let file_name = report_file_name(start_url, captured_at);
    let stem = file_name.trim_end_matches(".json");

    let mut attempt = 0usize;
    loop {
        let path = if attempt == 0 {
            dir.join(&file_name)
        } else {
            dir.join(format!("{}_{}.json", stem, attempt))
        };

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(document.as_bytes())?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

pub fn read_report(path: &Path) -> Result<Snapshot> {
    let document = fs::read_to_string(path)?;
    parse_json(&document)
}

/// Human readable summary of the login pages found, grouped by host.
pub fn generate_summary(snapshot: &Snapshot) -> String {
    let total_urls: usize = snapshot.values().map(|r| r.count).sum();
    let total_logins: usize = snapshot.values().map(|r| r.login_urls.len()).sum();

    let mut report = String::new();
    report.push_str(&format!("{}\n", "━".repeat(52)));
    report.push_str(&format!("{}\n", "# Summary:".bold()));
    report.push_str(&format!("  Hosts: {}\n", snapshot.len()));
    report.push_str(&format!("  URLs admitted: {}\n", total_urls));
    report.push_str(&format!("  Login pages: {}\n", total_logins.to_string().green()));
    report.push_str(&format!("{}\n\n", "━".repeat(52)));

    for (host, result) in snapshot.iter().filter(|(_, r)| !r.login_urls.is_empty()) {
        report.push_str(&host_section(host, result));
    }

    report
}

fn host_section(host: &str, result: &HostResult) -> String {
    let mut section = format!("## {}\n", host.bright_white().bold());
    section.push_str(&format!(
        "  {} of {} pages look like login pages\n\n",
        result.login_urls.len(),
        result.count
    ));
    for url in &result.login_urls {
        section.push_str(&format!("  {} {}\n", "→".green(), url));
    }
    section.push('\n');
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 12, 5, 7).single().unwrap()
    }

    #[test]
    fn test_file_name_uses_host_and_timestamp() {
        assert_eq!(
            report_file_name("https://www.example.test:8443/start", noon()),
            "www.example.test_20240309120507.json"
        );
    }

    #[test]
    fn test_file_name_without_host() {
        assert_eq!(
            report_file_name("not a url", noon()),
            "default_20240309120507.json"
        );
    }

    #[test]
    fn test_json_field_names() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "a.test".to_string(),
            HostResult {
                urls: vec!["http://a.test/".to_string()],
                login_urls: vec![],
                count: 1,
            },
        );
        let value: serde_json::Value =
            serde_json::from_str(&render_json(&snapshot).unwrap()).unwrap();
        assert_eq!(value["a.test"]["url"][0], "http://a.test/");
        assert_eq!(value["a.test"]["login_url"].as_array().unwrap().len(), 0);
        assert_eq!(value["a.test"]["count"], 1);
    }

    #[test]
    fn test_summary_lists_only_hosts_with_logins() {
        colored::control::set_override(false);
        let mut snapshot = Snapshot::new();
        snapshot.insert(
            "quiet.test".to_string(),
            HostResult {
                urls: vec!["http://quiet.test/".to_string()],
                login_urls: vec![],
                count: 1,
            },
        );
        snapshot.insert(
            "auth.test".to_string(),
            HostResult {
                urls: vec!["http://auth.test/".into(), "http://auth.test/login".into()],
                login_urls: vec!["http://auth.test/login".into()],
                count: 2,
            },
        );

        let summary = generate_summary(&snapshot);
        assert!(summary.contains("Hosts: 2"));
        assert!(summary.contains("URLs admitted: 3"));
        assert!(summary.contains("Login pages: 1"));
        assert!(summary.contains("## auth.test"));
        assert!(summary.contains("http://auth.test/login"));
        assert!(!summary.contains("## quiet.test"));
    }
}
