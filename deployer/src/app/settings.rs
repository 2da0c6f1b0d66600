//! Process configuration

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;

use crate::errors::DeployerError;
use crate::generate::completions;
use crate::hosting::github;
use crate::logs::LogLevel;
use crate::notify::RetryPolicy;
use crate::utils::CooldownOptions;

pub const SECRET_VAR: &str = "STUDENT_SECRET";
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const GITHUB_USERNAME_VAR: &str = "GITHUB_USERNAME";
pub const LLM_TOKEN_VAR: &str = "AIPROXY_TOKEN";

/// Deployer settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Shared secret expected in every request
    pub secret: SecretString,

    /// Hosting credential
    pub github_token: SecretString,

    /// Account that owns the generated repositories
    pub github_username: String,

    /// Generation credential
    pub llm_token: SecretString,

    pub github_api_url: String,
    pub llm_api_url: String,
    pub llm_model: String,

    /// Address to bind
    pub host: String,
    pub port: u16,

    pub log_level: LogLevel,
    pub json_logs: bool,

    pub notify_max_attempts: u32,
    pub notify_base_delay: Duration,
    pub pages_settle_delay: Duration,

    /// Keep repositories in memory instead of calling GitHub
    pub dry_run: bool,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, DeployerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DeployerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = [SECRET_VAR, GITHUB_TOKEN_VAR, GITHUB_USERNAME_VAR, LLM_TOKEN_VAR]
            .into_iter()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(DeployerError::ConfigError(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }
        let require = |key: &str| {
            get(key).ok_or_else(|| DeployerError::ConfigError(format!("Missing {}", key)))
        };

        Ok(Self {
            secret: SecretString::from(require(SECRET_VAR)?),
            github_token: SecretString::from(require(GITHUB_TOKEN_VAR)?),
            github_username: require(GITHUB_USERNAME_VAR)?,
            llm_token: SecretString::from(require(LLM_TOKEN_VAR)?),
            github_api_url: get("GITHUB_API_URL").unwrap_or_else(|| github::DEFAULT_API_URL.to_string()),
            llm_api_url: get("LLM_API_URL").unwrap_or_else(|| completions::DEFAULT_API_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| completions::DEFAULT_MODEL.to_string()),
            host: get("DEPLOYER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("DEPLOYER_PORT"), "DEPLOYER_PORT", 8000)?,
            log_level: match get("LOG_LEVEL") {
                Some(level) => level.parse().map_err(DeployerError::ConfigError)?,
                None => LogLevel::Info,
            },
            json_logs: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            notify_max_attempts: parse_or(get("NOTIFY_MAX_ATTEMPTS"), "NOTIFY_MAX_ATTEMPTS", 5)?,
            notify_base_delay: Duration::from_secs(parse_or(
                get("NOTIFY_BASE_DELAY_SECS"),
                "NOTIFY_BASE_DELAY_SECS",
                1,
            )?),
            pages_settle_delay: Duration::from_secs(parse_or(
                get("PAGES_SETTLE_SECS"),
                "PAGES_SETTLE_SECS",
                2,
            )?),
            dry_run: get("DRY_RUN").is_some_and(|v| is_truthy(&v)),
        })
    }

    /// Apply `--key=value` command line flags
    pub fn apply_cli_args(&mut self, args: &HashMap<String, String>) -> Result<(), DeployerError> {
        if let Some(host) = args.get("host") {
            self.host = host.clone();
        }
        if let Some(port) = args.get("port") {
            self.port = parse_or(Some(port.clone()), "--port", self.port)?;
        }
        if let Some(level) = args.get("log-level") {
            self.log_level = level.parse().map_err(DeployerError::ConfigError)?;
        }
        if let Some(flag) = args.get("dry-run") {
            self.dry_run = is_truthy(flag);
        }
        Ok(())
    }

    /// Notification retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.notify_max_attempts,
            cooldown: CooldownOptions {
                base_delay: self.notify_base_delay,
                ..Default::default()
            },
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, DeployerError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| DeployerError::ConfigError(format!("Invalid value for {}: {}", key, v))),
        None => Ok(default),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
