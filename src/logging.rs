//! Console and file logging.
//!
//! Every module logs through `tracing`; this installs the subscriber that
//! writes to stdout and to a daily-rotated file under `logs/`.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global logger. `RUST_LOG` overrides `level`.
pub fn init_logging(log_dir: &Path, level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    // File logging is best-effort; console output still works without it.
    let file_layer = std::fs::create_dir_all(log_dir).ok().map(|_| {
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "gym-ocr.log");
        fmt::layer().with_writer(appender).with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Logs panics (with location) before the default handler runs.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        tracing::error!("[PANIC]{} {}", location, msg);
        default_hook(panic_info);
    }));
}
