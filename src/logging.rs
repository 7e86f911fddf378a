//! # Structured Logging
//!
//! Console output plus an optional JSON log file, so checkpoint and sync
//! activity can be followed across reconnects and restarts.
//!
//! | Variable            | Effect                                        |
//! |---------------------|-----------------------------------------------|
//! | `RUST_LOG`          | Overrides the per-environment default filter  |
//! | `WAYPOINT_ENV`      | Selects the default filter (see below)        |
//! | `WAYPOINT_LOG_DIR`  | Directory for JSON log files, default `log`   |
//! | `WAYPOINT_LOG_FILE` | `false` disables the file layer               |

use chrono::Utc;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once; later calls are no-ops
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = current_environment();
        let default_filter = default_filter_for(&environment);
        let filter = || {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
        };

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(environment != "production")
            .with_filter(filter());

        let log_file = file_output_enabled().then(|| log_file_path(&environment));
        let file_layer = log_file.as_ref().and_then(|path| {
            let directory = path.parent()?;
            if let Err(error) = std::fs::create_dir_all(directory) {
                eprintln!("Log directory {} unavailable: {error}", directory.display());
                return None;
            }
            let appender = tracing_appender::rolling::never(directory, path.file_name()?);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // flushed on process exit
            std::mem::forget(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_current_span(false)
                    .with_filter(filter()),
            )
        });

        let file_enabled = file_layer.is_some();
        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Tracing subscriber already installed, keeping it");
        }

        tracing::info!(
            environment = %environment,
            default_filter = default_filter,
            log_file = ?log_file.filter(|_| file_enabled),
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn current_environment() -> String {
    std::env::var("WAYPOINT_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

fn default_filter_for(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "test" => "waypoint_core=debug,sqlx=warn",
        _ => "waypoint_core=debug,info",
    }
}

fn file_output_enabled() -> bool {
    std::env::var("WAYPOINT_LOG_FILE").map_or(true, |value| value != "false")
}

/// `{dir}/{environment}.{pid}.{timestamp}.log`
fn log_file_path(environment: &str) -> PathBuf {
    let directory = std::env::var("WAYPOINT_LOG_DIR").unwrap_or_else(|_| "log".to_string());
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(directory).join(format!(
        "{environment}.{}.{timestamp}.log",
        std::process::id()
    ))
}

/// One line per submitted checkpoint and its result
pub fn log_checkpoint_operation(
    operation: &str,
    checkpoint_id: Option<&str>,
    route_id: Option<&str>,
    stop_id: Option<&str>,
    status: &str,
    outcome_kind: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        checkpoint_id = checkpoint_id,
        route_id = route_id,
        stop_id = stop_id,
        status = %status,
        outcome_kind = outcome_kind,
        "📍 CHECKPOINT_OPERATION"
    );
}

/// One line per drain pass
pub fn log_sync_operation(
    operation: &str,
    trigger: Option<&str>,
    queued: Option<usize>,
    status: &str,
    duration_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        trigger = trigger,
        queued = queued,
        status = %status,
        duration_ms = duration_ms,
        details = details,
        "🔄 SYNC_OPERATION"
    );
}

pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        "❌ ERROR"
    );
}
