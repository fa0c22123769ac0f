use super::models::Config;
use crate::humanize::HumanDuration;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on poll retries; beyond this a dead service looks alive for minutes
const MAX_POLL_RETRIES: u32 = 10;

/// Longest retention window accepted for computing artifact expiry
const MAX_ARTIFACT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid service base_url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Unsupported base_url scheme '{scheme}', expected 'http' or 'https'")]
    UnsupportedScheme { scheme: String },

    #[error("Duration must be positive: {field}")]
    ZeroDuration { field: &'static str },

    #[error("polling.max_retries ({actual}) exceeds limit of {limit}")]
    TooManyRetries { actual: u32, limit: u32 },

    #[error("{field} ({actual}) exceeds limit of {limit}")]
    DurationTooLong {
        field: &'static str,
        actual: HumanDuration,
        limit: HumanDuration,
    },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_service(config)?;
    validate_polling(config)?;
    validate_timers(config)?;
    Ok(())
}

fn validate_service(config: &Config) -> Result<(), ValidationError> {
    let url = Url::parse(&config.service.base_url).map_err(|e| ValidationError::InvalidBaseUrl {
        url: config.service.base_url.clone(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::UnsupportedScheme {
                scheme: other.to_string(),
            });
        }
    }

    if config.service.request_timeout.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "service.request_timeout",
        });
    }

    Ok(())
}

fn validate_polling(config: &Config) -> Result<(), ValidationError> {
    let polling = &config.polling;

    if polling.interval.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "polling.interval",
        });
    }

    if polling.max_retries > MAX_POLL_RETRIES {
        return Err(ValidationError::TooManyRetries {
            actual: polling.max_retries,
            limit: MAX_POLL_RETRIES,
        });
    }

    if polling.max_retries > 0 && polling.retry_backoff.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "polling.retry_backoff",
        });
    }

    Ok(())
}

fn validate_timers(config: &Config) -> Result<(), ValidationError> {
    if config.reset.delay.is_zero() {
        return Err(ValidationError::ZeroDuration { field: "reset.delay" });
    }

    if config.retention.artifact_ttl.is_zero() {
        return Err(ValidationError::ZeroDuration {
            field: "retention.artifact_ttl",
        });
    }

    if config.retention.artifact_ttl.as_duration() > MAX_ARTIFACT_TTL {
        return Err(ValidationError::DurationTooLong {
            field: "retention.artifact_ttl",
            actual: config.retention.artifact_ttl,
            limit: HumanDuration(MAX_ARTIFACT_TTL),
        });
    }

    Ok(())
}
