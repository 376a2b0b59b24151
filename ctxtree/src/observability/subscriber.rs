//! `tracing-subscriber` setup.

use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "CTXTREE_LOG_FORMAT";

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitively. Unknown names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Subscriber configuration.
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Filter directives such as `ctxtree=debug`. Falls back to `RUST_LOG`,
    /// then to `info`.
    pub filter: Option<String>,
    /// Output format.
    pub format: LogFormat,
}

impl TracingConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the format from `CTXTREE_LOG_FORMAT`; the filter comes from
    /// `RUST_LOG` at install time.
    #[must_use]
    pub fn from_env() -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        Self {
            filter: None,
            format,
        }
    }

    /// Sets the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        self.filter
            .as_deref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

/// Installs a global `fmt` subscriber.
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(config: &TracingConfig) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(config.env_filter());
    let result = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_filter("ctxtree=debug")
            .with_format(LogFormat::Json);
        assert_eq!(config.filter.as_deref(), Some("ctxtree=debug"));
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_valid_filter_is_used() {
        let config = TracingConfig::new().with_filter("ctxtree=debug");
        assert_eq!(config.env_filter().to_string(), "ctxtree=debug");
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        let config = TracingConfig::new().with_filter("[[[not a filter");
        let expected = EnvFilter::try_from_default_env()
            .map_or_else(|_| "info".to_string(), |f| f.to_string());
        assert_eq!(config.env_filter().to_string(), expected);
    }

    #[test]
    fn test_init_twice_reports_existing() {
        let config = TracingConfig::new().with_filter("off");
        let _ = init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
