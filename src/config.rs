use dotenvy::dotenv;
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Page size used by ListMessages when the caller does not supply one.
    pub page_size_default: usize,
    /// Hard cap on a single ListMessages page.
    pub page_size_max: usize,
    /// Bounded fan-out queue per subscriber connection. A subscriber that
    /// falls this many frames behind is dropped and must poll to catch up.
    pub subscriber_buffer: usize,
    /// Whether fan-out pushes a new message back to the sender's own
    /// connections. Off by default.
    pub echo_to_sender: bool,
    /// Character budget for the cached last-message preview.
    pub preview_max_chars: usize,
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let config = Config {
            port,
            page_size_default: env_usize("PAGE_SIZE_DEFAULT", 50),
            page_size_max: env_usize("PAGE_SIZE_MAX", 200),
            subscriber_buffer: env_usize("SUBSCRIBER_BUFFER", 64),
            echo_to_sender: env::var("ECHO_TO_SENDER")
                .map(|v| v == "true")
                .unwrap_or(false),
            preview_max_chars: env_usize("PREVIEW_MAX_CHARS", 80),
        };

        if config.subscriber_buffer == 0 {
            return Err(AppError::Config("SUBSCRIBER_BUFFER must be positive".into()));
        }
        if config.page_size_default == 0 || config.page_size_max == 0 {
            return Err(AppError::Config("page sizes must be positive".into()));
        }
        if config.page_size_default > config.page_size_max {
            return Err(AppError::Config(
                "PAGE_SIZE_DEFAULT must not exceed PAGE_SIZE_MAX".into(),
            ));
        }

        Ok(config)
    }

    pub fn test_defaults() -> Self {
        Config {
            port: 0,
            page_size_default: 50,
            page_size_max: 200,
            subscriber_buffer: 8,
            echo_to_sender: false,
            preview_max_chars: 80,
        }
    }
}
