//! Logging setup: human-readable output on stdout plus a per-run log file
//! under `logs/`.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::Result;

/// Initializes the global subscriber. The file layer writes to
/// `logs/log_YYYY_MM_DD-HH_MM.log`; the filter honors `RUST_LOG` and
/// defaults to `info`.
pub fn init() -> Result<()> {
    let logs_dir = Path::new("logs");
    fs::create_dir_all(logs_dir)?;
    let filename = chrono::Local::now()
        .format("log_%Y_%m_%d-%H_%M.log")
        .to_string();
    let file = File::create(logs_dir.join(filename))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}
