use crate::core::errors::ConfigError;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Local inpaint strategy configuration
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Luminance threshold for overlay detection, valid range [150, 250].
    /// Higher = tighter mask (may leave fragments), lower = larger mask
    /// (may erase bright background).
    pub brightness_threshold: u8,
    /// Number of 3x3 dilation passes applied to the mask.
    pub dilation_iterations: u32,
    /// Sampling radius for region filling, >= 1.
    pub inpaint_radius: u32,
}

/// Remote restoration API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub restoration_model: String,
    pub endpoint_base: String,
    pub request_timeout: Duration,
}

/// Retry/backoff configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delays: Vec<Duration>,
}

/// Batch processing configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Ceiling on in-flight items. 1 = strictly sequential (the default;
    /// the remote service enforces a shared rate-limit budget).
    pub concurrency: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub local: LocalConfig,
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub log_level: Level,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        let delays = match env::var("RETRY_DELAYS_SECONDS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| {
                    s.trim()
                        .parse::<u64>()
                        .map(Duration::from_secs)
                        .map_err(|e| {
                            ConfigError::EnvVarError(format!("RETRY_DELAYS_SECONDS: {}", e))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => default_retry_delays(),
        };

        Ok(Self {
            local: LocalConfig {
                brightness_threshold: env::var("BRIGHTNESS_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(215),
                dilation_iterations: env::var("DILATION_ITERATIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
                inpaint_radius: env::var("INPAINT_RADIUS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            },
            api: ApiConfig {
                api_key: env::var("GEMINI_API_KEY")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                restoration_model: env::var("RESTORATION_MODEL")
                    .unwrap_or_else(|_| "gemini-2.5-flash-image".to_string()),
                endpoint_base: env::var("RESTORATION_ENDPOINT").unwrap_or_else(|_| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                request_timeout: Duration::from_secs(
                    env::var("API_TIMEOUT_SECONDS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(60),
                ),
            },
            retry: RetryConfig {
                max_attempts: env::var("MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
                delays,
            },
            batch: BatchConfig {
                concurrency: env::var("CONCURRENCY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            },
            log_level,
        })
    }

    /// Re-run after mutating fields (CLI flag overrides).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(150..=250).contains(&u32::from(self.local.brightness_threshold)) {
            return Err(ConfigError::InvalidBrightnessThreshold(u32::from(
                self.local.brightness_threshold,
            )));
        }

        if self.local.inpaint_radius == 0 {
            return Err(ConfigError::InvalidInpaintRadius(self.local.inpaint_radius));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy(
                "max_attempts must be > 0".to_string(),
            ));
        }
        if self.retry.delays.is_empty() {
            return Err(ConfigError::InvalidRetryPolicy(
                "delay list must not be empty".to_string(),
            ));
        }

        if self.batch.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(self.batch.concurrency));
        }

        Ok(())
    }

    /// Fails if the remote strategy is selected without credentials.
    /// Surfaced once, before any item is attempted.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn brightness_threshold(&self) -> u8 {
        self.local.brightness_threshold
    }

    pub fn dilation_iterations(&self) -> u32 {
        self.local.dilation_iterations
    }

    pub fn inpaint_radius(&self) -> u32 {
        self.local.inpaint_radius
    }

    pub fn restoration_model(&self) -> &str {
        &self.api.restoration_model
    }

    pub fn concurrency(&self) -> usize {
        self.batch.concurrency
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }
}

pub fn default_retry_delays() -> Vec<Duration> {
    [2, 4, 8, 16, 32].iter().map(|&s| Duration::from_secs(s)).collect()
}

// Note: No Default implementation because Config::new() can fail.
// Callers should explicitly call Config::new()? and handle errors.
