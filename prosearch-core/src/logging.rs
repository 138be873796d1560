//! Structured logging for research runs
//!
//! Every crate logs through `tracing`. The binary installs one subscriber at
//! startup from [`LoggingConfig`]; `RUST_LOG` overrides the configured level.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
    pub target: LogTarget,
    /// Print source file and line with each event
    pub include_location: bool,
    /// Emit a close event with busy/idle timings for every span, which
    /// includes each dispatched task and each wave
    pub span_timings: bool,
    /// Extra `EnvFilter` directives, e.g. `prosearch_rag=debug`
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Where log lines go. Stdout is left to the answer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogTarget {
    Stderr,
    File { path: PathBuf },
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            target: LogTarget::Stderr,
            include_location: false,
            span_timings: false,
            filter_directives: ["prosearch_cli", "prosearch_agent", "prosearch_rag", "prosearch_core"]
                .iter()
                .map(|krate| format!("{}=info", krate))
                .collect(),
        }
    }
}

impl LoggingConfig {
    /// Debug everywhere, dropping the per-crate directives
    pub fn verbose(mut self) -> Self {
        self.level = "debug".to_string();
        self.filter_directives.clear();
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        let mut filter = EnvFilter::new(&self.level);
        for directive in &self.filter_directives {
            filter = filter.add_directive(directive.parse()?);
        }
        Ok(filter)
    }
}

// fmt layers with different formatters have different types
macro_rules! install_layer {
    ($registry:expr, $layer:expr, $config:expr) => {{
        let spans = if $config.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = $layer
            .with_span_events(spans)
            .with_file($config.include_location)
            .with_line_number($config.include_location);

        match &$config.target {
            LogTarget::Stderr => $registry.with(layer.with_writer(std::io::stderr)).try_init()?,
            LogTarget::File { path } => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                $registry
                    .with(layer.with_ansi(false).with_writer(std::sync::Mutex::new(file)))
                    .try_init()?
            }
        }
    }};
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = tracing_subscriber::registry().with(config.env_filter()?);

    match config.format {
        LogFormat::Json => install_layer!(registry, fmt::layer().json(), config),
        LogFormat::Pretty => install_layer!(registry, fmt::layer().pretty(), config),
        LogFormat::Compact => install_layer!(registry, fmt::layer().compact(), config),
    }

    Ok(())
}

pub mod timing {
    use std::future::Future;
    use std::time::Instant;
    use tracing::{info_span, Instrument};

    /// Run `future` inside a `stage` span and log how long it took
    pub async fn timed<F, T>(stage: &str, future: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let result = future.instrument(info_span!("stage", name = stage)).await;

        tracing::debug!(
            stage,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stage finished"
        );
        result
    }
}

/// `log_run_start!("research", question = %q)`
#[macro_export]
macro_rules! log_run_start {
    ($run:expr $(, $($field:tt)*)?) => {
        tracing::info!(run = $run, $($($field)*,)? "Run started")
    };
}

#[macro_export]
macro_rules! log_run_finished {
    ($run:expr $(, $($field:tt)*)?) => {
        tracing::info!(run = $run, $($($field)*,)? "Run finished")
    };
}

#[macro_export]
macro_rules! log_run_failed {
    ($run:expr, $error:expr $(, $($field:tt)*)?) => {
        tracing::error!(run = $run, error = %$error, $($($field)*,)? "Run failed")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_every_crate() {
        let config = LoggingConfig::default();
        assert_eq!(config.target, LogTarget::Stderr);
        assert!(config
            .filter_directives
            .contains(&"prosearch_agent=info".to_string()));
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_verbose_clears_directives() {
        let config = LoggingConfig::default().verbose();
        assert_eq!(config.level, "debug");
        assert!(config.filter_directives.is_empty());
    }

    #[test]
    fn test_file_target_from_toml() {
        let config: LoggingConfig = toml::from_str(
            r#"
            format = "json"
            target = { kind = "file", path = "/tmp/prosearch.log" }
            "#,
        )
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(
            config.target,
            LogTarget::File {
                path: PathBuf::from("/tmp/prosearch.log")
            }
        );
        assert!(!config.span_timings);
    }
}
