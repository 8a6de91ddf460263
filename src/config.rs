#[cfg(feature = "cli")]
use clap::Parser;
use url::Url;

/// Default base URL of the ZhipuAI open platform.
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "glm-4";

/// Default sampling temperature used when a request does not set one.
pub const DEFAULT_TEMPERATURE: f64 = 0.95;

/// Default nucleus sampling parameter used when a request does not set one.
pub const DEFAULT_TOP_P: f64 = 0.7;

/// # Client Configuration
///
/// Configuration for the ZhipuAI client, loadable from command-line
/// arguments, environment variables, and a `.env` file (feature `cli`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "zhipu-llm"))]
#[cfg_attr(feature = "cli", command(about = "Client for the ZhipuAI (GLM) open platform API"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // API CONFIGURATION
    // =============================================================================

    /// API key for the ZhipuAI open platform
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_API_KEY"))]
    pub api_key: Option<String>,

    /// Base URL of the API
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_BASE_URL", default_value = DEFAULT_BASE_URL))]
    pub base_url: String,

    /// Default chat model
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_MODEL", default_value = DEFAULT_CHAT_MODEL))]
    pub model: String,

    // =============================================================================
    // HTTP CLIENT
    // =============================================================================

    /// HTTP request timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_HTTP_TIMEOUT", default_value = "30"))]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_CONNECT_TIMEOUT", default_value = "10"))]
    pub connect_timeout: u64,

    /// Maximum idle connections kept per host
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_MAX_IDLE_PER_HOST", default_value = "10"))]
    pub max_idle_per_host: usize,

    /// Streaming read timeout in seconds (SSE responses stay open far
    /// longer than ordinary requests)
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_STREAMING_TIMEOUT", default_value = "300"))]
    pub streaming_timeout: u64,

    // =============================================================================
    // RETRIES
    // =============================================================================

    /// Maximum request attempts for retryable failures
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_RETRY_ATTEMPTS", default_value = "3"))]
    pub retry_attempts: u32,

    /// Base retry backoff delay in milliseconds
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_RETRY_BASE_DELAY_MS", default_value = "100"))]
    pub retry_base_delay_ms: u64,

    /// Maximum retry backoff delay in milliseconds
    #[cfg_attr(feature = "cli", arg(long, env = "ZHIPU_RETRY_MAX_DELAY_MS", default_value = "5000"))]
    pub retry_max_delay_ms: u64,

    // =============================================================================
    // LOGGING
    // =============================================================================

    /// Log level (error, warn, info, debug, trace)
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            http_timeout: 30,
            connect_timeout: 10,
            max_idle_per_host: 10,
            streaming_timeout: 300,
            retry_attempts: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments and environment
    /// variables, loading a `.env` file first if one exists, then validate
    /// and set up logging.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();

        let config = Self::parse();
        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a configuration for an API key with everything else at
    /// defaults.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Test configuration pointing at a local endpoint.
    pub fn for_test() -> Self {
        Self {
            api_key: Some("test-key".to_string()),
            base_url: "http://localhost:8000".to_string(),
            model: "test-model".to_string(),
            retry_attempts: 1,
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        Url::parse(&self.base_url).map_err(|err| format!("invalid base URL: {}", err))?;

        if self.api_key.as_deref().is_some_and(str::is_empty) {
            return Err("api_key must not be empty when set".to_string());
        }
        if self.retry_attempts == 0 {
            return Err("retry_attempts must be at least 1".to_string());
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err("retry_base_delay_ms must not exceed retry_max_delay_ms".to_string());
        }

        Ok(())
    }

    /// Initialize the tracing subscriber from the configured log level,
    /// deferring to `RUST_LOG` when present.
    #[cfg(feature = "cli")]
    pub fn setup_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_CHAT_MODEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_test_points_at_localhost() {
        let config = Config::for_test();
        assert!(config.base_url.starts_with("http://localhost"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = Config {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let config = Config {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let config = Config {
            retry_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
