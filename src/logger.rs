//! Logging setup (§14 ambient logging): a rolling file appender under
//! `{db_name}_logs/{db_name}.log`, with the returned [`Logger`] keeping
//! enough state that `set_log_level` can reconfigure the root level at
//! runtime without losing the appender.
//!
//! Grounded on the teacher's `utils/logger.rs::init_for_db_in`, trimmed to
//! the single app-log appender this crate needs (the teacher also wires up
//! separate audit/metrics loggers for its own HTTP surface, which is out of
//! scope here).

use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::PathBuf;

/// Holds the live log4rs handle plus the appender's target path, so the
/// level can be changed later by rebuilding the same config with a new
/// `Root` level.
pub struct Logger {
    handle: Handle,
    log_path: PathBuf,
}

impl Logger {
    /// Initializes logging to `{base_dir}/{db_name}_logs/{db_name}.log`.
    ///
    /// # Errors
    /// Returns an error if the log directory can't be created or the
    /// appender can't be built.
    pub fn init_for_db(base_dir: &std::path::Path, db_name: &str, level: LevelFilter) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = base_dir.join(format!("{db_name}_logs"));
        std::fs::create_dir_all(&dir)?;
        let log_path = dir.join(format!("{db_name}.log"));

        let config = build_config(&log_path, level)?;
        let handle = log4rs::init_config(config)?;
        Ok(Self { handle, log_path })
    }

    /// Adjusts the root log level at runtime, re-pointing the handle at a
    /// freshly built config that keeps the same file appender.
    pub fn set_log_level(&self, level: LevelFilter) {
        if let Ok(config) = build_config(&self.log_path, level) {
            self.handle.set_config(config);
        }
    }
}

fn build_config(log_path: &std::path::Path, level: LevelFilter) -> Result<Config, Box<dyn std::error::Error>> {
    let encoder = Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}"));
    let appender = FileAppender::builder().encoder(encoder).build(log_path)?;
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(Root::builder().appender("file").build(level))?;
    Ok(config)
}
