pub mod config;
pub mod dispatch;
pub mod error;
pub mod heuristic;
pub mod indicators;
pub mod probe;
pub mod report;
pub mod store;

pub use config::DetectorConfig;
pub use dispatch::{DispatchSummary, Dispatcher, Disposition, TaskOutcome};
pub use error::DetectError;
pub use heuristic::StaticClassifier;
pub use indicators::{DEFAULT_INDICATORS, LoginIndicators};
pub use probe::DynamicClassifier;
pub use store::{HostResult, ResultStore, Snapshot};

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
   ____       _       __ _           _
  / ___| __ _| |_ ___/ _(_)_ __   __| | ___ _ __
 | |  _ / _` | __/ _ \ |_| | '_ \ / _` |/ _ \ '__|
 | |_| | (_| | ||  __/  _| | | | | (_| |  __/ |
  \____|\__,_|\__\___|_| |_|_| |_|\__,_|\___|_|
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} v{}\n",
        "login page finder".bright_white(),
        env!("CARGO_PKG_VERSION")
    );
}
