//! Dispatch settings loaded via OrthoConfig.
//!
//! Values come from `DISPATCH_*` environment variables (or a config file).
//! Raw fields stay optional; accessors apply defaults and validate.

use std::fmt;
use std::time::Duration;

use chrono::FixedOffset;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

use crate::domain::projections::ProjectionContext;
use crate::domain::{DEFAULT_SUPPORT_ADDRESS, EmailAddress, Locale, RoleResolver};
use crate::outbound::gateway::RestGatewayConfig;

const DEFAULT_ADMIN_FUNCTION: &str = "admin-actions";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Errors raised while interpreting loaded settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    MissingGatewayUrl,
    MissingApiKey,
    InvalidGatewayUrl { value: String, reason: String },
    InvalidSupportAddress { value: String },
    UnsupportedLocale { value: String },
    InvalidUtcOffset { minutes: i32 },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingGatewayUrl => {
                write!(f, "DISPATCH_GATEWAY_URL is required unless demo mode is on")
            }
            Self::MissingApiKey => {
                write!(f, "DISPATCH_API_KEY is required unless demo mode is on")
            }
            Self::InvalidGatewayUrl { value, reason } => {
                write!(f, "gateway url '{value}' is invalid: {reason}")
            }
            Self::InvalidSupportAddress { value } => {
                write!(f, "support address '{value}' is not an email address")
            }
            Self::UnsupportedLocale { value } => write!(f, "unsupported locale '{value}'"),
            Self::InvalidUtcOffset { minutes } => {
                write!(f, "utc offset of {minutes} minutes is out of range")
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// Configuration for reaching the gateway and presenting projections.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DISPATCH")]
pub struct DispatchSettings {
    /// Project root of the hosted gateway.
    pub gateway_url: Option<String>,
    /// Public API key.
    pub api_key: Option<String>,
    /// Session access token; requests use the API key as bearer when absent.
    pub access_token: Option<String>,
    /// Edge function handling admin actions.
    pub admin_function: Option<String>,
    pub request_timeout_secs: Option<u64>,
    /// Comma-separated addresses that always resolve to admin.
    pub support_addresses: Option<String>,
    /// Locale code for labels and dates (`pt-BR` or `en`).
    pub locale: Option<String>,
    /// Offset from UTC, in minutes, used to render schedules.
    pub utc_offset_minutes: Option<i32>,
    /// Use the in-memory demo gateway instead of the hosted one.
    #[ortho_config(default = false)]
    pub demo: bool,
}

impl DispatchSettings {
    pub fn admin_function(&self) -> &str {
        self.admin_function
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_ADMIN_FUNCTION)
    }

    /// Request timeout; zero is raised to one second.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
        )
    }

    /// Configured support addresses, or the built-in default when unset.
    pub fn support_addresses(&self) -> Result<Vec<EmailAddress>, SettingsError> {
        let raw = self
            .support_addresses
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(DEFAULT_SUPPORT_ADDRESS);
        raw.split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| {
                EmailAddress::new(value).map_err(|_| SettingsError::InvalidSupportAddress {
                    value: value.to_owned(),
                })
            })
            .collect()
    }

    pub fn role_resolver(&self) -> Result<RoleResolver, SettingsError> {
        self.support_addresses().map(RoleResolver::new)
    }

    pub fn locale(&self) -> Result<Locale, SettingsError> {
        match self.locale.as_deref() {
            None => Ok(Locale::default()),
            Some(code) => code
                .parse()
                .map_err(|_| SettingsError::UnsupportedLocale {
                    value: code.to_owned(),
                }),
        }
    }

    pub fn projection_context(&self) -> Result<ProjectionContext, SettingsError> {
        let minutes = self.utc_offset_minutes.unwrap_or(0);
        let offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(SettingsError::InvalidUtcOffset { minutes })?;
        Ok(ProjectionContext::new(self.locale()?, offset))
    }

    pub fn gateway_url(&self) -> Result<Url, SettingsError> {
        let raw = self
            .gateway_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(SettingsError::MissingGatewayUrl)?;
        Url::parse(raw).map_err(|error| SettingsError::InvalidGatewayUrl {
            value: raw.to_owned(),
            reason: error.to_string(),
        })
    }

    /// Connection settings for the REST gateway adapter.
    pub fn rest_gateway_config(&self) -> Result<RestGatewayConfig, SettingsError> {
        let base_url = self.gateway_url()?;
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SettingsError::MissingApiKey)?;
        Ok(RestGatewayConfig {
            base_url,
            api_key: Zeroizing::new(api_key.to_owned()),
            access_token: self
                .access_token
                .as_deref()
                .filter(|token| !token.trim().is_empty())
                .map(|token| Zeroizing::new(token.to_owned())),
            admin_function: self.admin_function().to_owned(),
            timeout: self.request_timeout(),
        })
    }
}
