use serde::Deserialize;
use std::fmt;

use crate::lifecycle::TransitionPolicy;

/// Address shown to submitters whenever the form itself cannot deliver.
pub const DEFAULT_FALLBACK_CONTACT: &str = "info@everknitting.com";

/// Default Resend-compatible API endpoint.
pub const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Direct-contact address surfaced in every failure message.
    pub fallback_contact: String,
    /// Whether WON/LOST leads may be moved back into the funnel.
    pub allow_reopen_closed_leads: bool,
    /// Create a CRM lead for every inquiry that was delivered.
    pub promote_inquiries: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            fallback_contact: std::env::var("INQUIRY_FALLBACK_EMAIL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| DEFAULT_FALLBACK_CONTACT.to_string()),
            allow_reopen_closed_leads: parse_flag("LEAD_ALLOW_REOPEN", true)?,
            promote_inquiries: parse_flag("INQUIRY_PROMOTE_TO_LEAD", false)?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::debug!(
            "Database URL: {}...",
            database_url_prefix(&config.database_url)
        );
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!("Fallback contact: {}", config.fallback_contact);
        tracing::debug!(
            "Lead reopen allowed: {}, inquiry promotion: {}",
            config.allow_reopen_closed_leads,
            config.promote_inquiries
        );

        Ok(config)
    }

    pub fn transition_policy(&self) -> TransitionPolicy {
        TransitionPolicy {
            allow_reopen_closed: self.allow_reopen_closed_leads,
        }
    }
}

/// First 20 characters of the URL, for logs.
fn database_url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

fn parse_flag(key: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got '{}'", key, other),
        },
        Err(_) => Ok(default),
    }
}

/// Credentials and addressing for the transactional e-mail provider.
///
/// Resolved on every submission rather than at startup, so rotated keys take
/// effect without a restart.
#[derive(Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub api_key: String,
    pub from: String,
    pub to: String,
    pub base_url: String,
}

/// A required delivery setting that was absent or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSetting(pub &'static str);

impl fmt::Display for MissingSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is missing", self.0)
    }
}

impl std::error::Error for MissingSetting {}

impl DeliveryConfig {
    pub fn from_env() -> Result<Self, MissingSetting> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MissingSetting>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(MissingSetting(key))
        };

        let api_key = required("RESEND_API_KEY")?;
        let from = required("RESEND_FROM")?;
        let to = required("INQUIRY_TO")?;

        let base_url = lookup("RESEND_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| url::Url::parse(v).is_ok())
            .unwrap_or_else(|| DEFAULT_RESEND_BASE_URL.to_string());

        Ok(Self {
            api_key,
            from,
            to,
            base_url,
        })
    }
}

impl fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryConfig")
            .field("api_key", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("base_url", &self.base_url)
            .finish()
    }
}
