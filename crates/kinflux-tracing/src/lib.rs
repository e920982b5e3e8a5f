//! Shared tracing configuration for the kinflux workspace.
//!
//! Executables, integration tests, and benches all install their `tracing`
//! subscriber through this crate so the logging surface stays consistent and
//! builder logic isn't copy-pasted across binaries.

use std::env;

pub use tracing::{debug, error, info, trace, warn};
use tracing::Subscriber;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

/// Output format choices for the formatter layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration describing how the shared subscriber should behave.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Optional tracing directives (e.g. `kinflux_backends=debug,info`). When
    /// absent the crate falls back to `RUST_LOG` and finally to
    /// `default_directive`.
    pub directives: Option<String>,
    /// Fallback directive used when neither `directives` nor `RUST_LOG`
    /// resolve to a valid filter.
    pub default_directive: String,
    /// Controls whether event targets (module paths) appear in output.
    pub include_targets: bool,
    /// Controls ANSI formatting. Disable for CI logs that strip colour codes.
    pub ansi: bool,
    /// Output format for the formatter layer.
    pub output: TracingOutput,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Configuration tuned for local development (compact, ANSI-enabled).
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            output: TracingOutput::Compact,
        }
    }

    /// Configuration tuned for CI or log collection (JSON, no ANSI).
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            output: TracingOutput::Json,
        }
    }

    /// Build a configuration from environment hints.
    ///
    /// # Environment Variables
    ///
    /// - `KINFLUX_TRACING_PROFILE` - preset: `local` (default) or `ci`
    /// - `KINFLUX_TRACING_DIRECTIVES` - overrides tracing directives
    /// - `KINFLUX_TRACING_FORMAT` - `compact`, `pretty`, or `json`
    pub fn from_env() -> Self {
        let profile = env::var("KINFLUX_TRACING_PROFILE")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();

        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var("KINFLUX_TRACING_DIRECTIVES") {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Ok(format) = env::var("KINFLUX_TRACING_FORMAT") {
            if let Some(parsed) = TracingOutput::from_env_value(&format) {
                config.output = parsed;
                if matches!(config.output, TracingOutput::Json) {
                    config.ansi = false;
                }
            }
        }

        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        if let Some(directives) = &self.directives {
            EnvFilter::try_new(directives)
                .map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
        } else {
            match EnvFilter::try_from_default_env() {
                Ok(filter) => Ok(filter),
                Err(_) => Ok(EnvFilter::new(self.default_directive.clone())),
            }
        }
    }
}

/// Errors surfaced when configuring the shared subscriber fails.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    /// The provided directive string could not be parsed.
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),

    /// Installing the global subscriber failed (usually because one is
    /// already set).
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Build a `tracing` subscriber using the provided configuration.
pub fn build_subscriber(
    config: &TracingConfig,
) -> Result<Box<dyn Subscriber + Send + Sync>, TracingSetupError> {
    let filter = config.resolve_filter()?;
    let builder = tracing_fmt::fmt()
        .with_env_filter(filter)
        .with_target(config.include_targets)
        .with_ansi(config.ansi);

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.output {
        TracingOutput::Compact => Box::new(builder.compact().finish()),
        TracingOutput::Pretty => Box::new(builder.pretty().finish()),
        TracingOutput::Json => Box::new(builder.json().finish()),
    };

    Ok(subscriber)
}

/// Install the configured subscriber as the process-wide default.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    let subscriber = build_subscriber(config)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| TracingSetupError::SubscriberInit(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes environment-variable tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn reset_env(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn rejects_invalid_directive() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env(&["KINFLUX_TRACING_DIRECTIVES", "RUST_LOG"]);
        let config = TracingConfig {
            directives: Some("=::invalid".to_string()),
            ..TracingConfig::default()
        };
        let result = build_subscriber(&config);
        assert!(matches!(result, Err(TracingSetupError::InvalidFilter(_))));
    }

    #[test]
    fn builds_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env(&["RUST_LOG"]);
        let config = TracingConfig::default();
        assert!(build_subscriber(&config).is_ok());
    }

    #[test]
    fn from_env_respects_profile_and_format() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env(&[
            "KINFLUX_TRACING_PROFILE",
            "KINFLUX_TRACING_FORMAT",
            "KINFLUX_TRACING_DIRECTIVES",
        ]);

        env::set_var("KINFLUX_TRACING_PROFILE", "ci");
        env::set_var("KINFLUX_TRACING_FORMAT", "compact");
        env::set_var("KINFLUX_TRACING_DIRECTIVES", "kinflux_runtime=debug");

        let config = TracingConfig::from_env();
        assert_eq!(config.directives.as_deref(), Some("kinflux_runtime=debug"));
        assert!(!config.ansi);
        assert!(matches!(config.output, TracingOutput::Compact));

        reset_env(&[
            "KINFLUX_TRACING_PROFILE",
            "KINFLUX_TRACING_FORMAT",
            "KINFLUX_TRACING_DIRECTIVES",
        ]);
    }
}
