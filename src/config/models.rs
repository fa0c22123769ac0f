use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Remote conversion service connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Root URL under which `/api/download` and `/api/progress` live
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("clipfetch/{}", env!("CARGO_PKG_VERSION"))
}

/// Progress polling policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Delay between a resolved poll and the next request
    #[serde(default = "default_poll_interval")]
    pub interval: HumanDuration,
    /// Extra attempts after a failed poll request (0 = fail on first error)
    #[serde(default)]
    pub max_retries: u32,
    /// Base delay for exponential backoff between retry attempts
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_retries: 0,
            retry_backoff: default_retry_backoff(),
        }
    }
}

fn default_poll_interval() -> HumanDuration {
    HumanDuration::from_secs(1)
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration::from_millis(500)
}

/// Delayed return to idle after the artifact has been retrieved
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResetConfig {
    #[serde(default = "default_reset_delay")]
    pub delay: HumanDuration,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            delay: default_reset_delay(),
        }
    }
}

fn default_reset_delay() -> HumanDuration {
    HumanDuration::from_secs(3)
}

/// Retention window the service applies to finished artifacts (informational)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    #[serde(default = "default_artifact_ttl")]
    pub artifact_ttl: HumanDuration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            artifact_ttl: default_artifact_ttl(),
        }
    }
}

fn default_artifact_ttl() -> HumanDuration {
    HumanDuration::from_secs(15 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.service.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.polling.interval.as_duration(), Duration::from_secs(1));
        assert_eq!(config.polling.max_retries, 0);
        assert_eq!(config.reset.delay.as_duration(), Duration::from_secs(3));
        assert_eq!(config.retention.artifact_ttl.as_duration(), Duration::from_secs(900));
        assert!(config.service.user_agent.starts_with("clipfetch/"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
[polling]
interval = "250ms"
        "#,
        )
        .unwrap();

        assert_eq!(config.polling.interval.as_duration(), Duration::from_millis(250));
        assert_eq!(config.reset.delay.as_duration(), Duration::from_secs(3));
    }
}
