//! ---
//! dss_section: "03-logging"
//! dss_subsection: "module"
//! dss_type: "source"
//! dss_scope: "code"
//! dss_description: "Tracing subscriber setup and lifecycle event helpers."
//! dss_version: "v0.0.0-prealpha"
//! dss_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "WTP_DSS_LOG";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Available log formats for stdout output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    StructuredJson,
    #[default]
    Pretty,
}

/// Initialize the tracing subscriber based on configuration and environment variables.
///
/// * `WTP_DSS_LOG` overrides the filter (e.g. `info`, `debug,wtp_dss_panel=trace`).
///   When unset `RUST_LOG` is honoured, finally defaulting to `info`.
/// * A rolling daily JSON file is always written under `config.directory`; stdout
///   output is optional so terminal hosts can keep the screen clean.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config
        .file_prefix
        .clone()
        .unwrap_or_else(|| service_name.to_owned());

    let file_appender = daily(&config.directory, format!("{prefix}.log"));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = FILE_GUARD.set(file_guard);

    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); defaulting to info logging");
            EnvFilter::new("info")
        }),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let stdout_layer = if config.stdout {
        let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
        let _ = STDOUT_GUARD.set(stdout_guard);
        Some(match config.format {
            LogFormat::StructuredJson => fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .with_writer(stdout_writer)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(stdout_writer)
                .boxed(),
        })
    } else {
        None
    };

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(service = %service_name, log_dir = %config.directory.display(), format = ?config.format, stdout = config.stdout, "tracing initialised");
    Ok(())
}

/// High-level outcome used when emitting panel lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl PanelEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            PanelEventOutcome::Success => "success",
            PanelEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized panel event with a success/fault outcome.
pub fn log_panel_event(event: &str, message: &str, outcome: PanelEventOutcome) {
    // `tracing::event!` needs a constant level, hence the split.
    match outcome {
        PanelEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            message = %message
        ),
        PanelEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            message = %message
        ),
    }
}
