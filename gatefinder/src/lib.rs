pub mod commands;
pub mod handlers;

pub use commands::command_argument_builder;
pub use handlers::{
    ScanOutcome, ScanSettings, extract_url_path, handle_scan, init_tracing, parse_target,
    run_scan,
};
