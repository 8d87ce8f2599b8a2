//! Dashboard configuration, read from the environment (a `.env` file is
//! loaded first when present).
//!
//! - `PORT` - listen port (default: 8080)
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY` - hosted store; set both or neither.
//!   Without them the dashboard runs against an in-memory store.
//! - `STORE_TIMEOUT_SECS` - per-request timeout for the hosted store (default: none)
//! - `CREDIT_LIMIT` - balance at which a client is flagged (default: 500)
//! - `CURRENCY` - label used in statements and totals (default: EGP)
//! - `COUNTRY_CODE` - replaces a leading `0` in phone numbers (default: 20)
//! - `LOGIN_DOMAIN` - appended to usernames at sign-in (default: cafe.com)
//! - `DEMO_USERNAME`, `DEMO_PASSWORD` - in-memory store account (default: admin/admin)
//! - `GROUP_ITEMS_CASE_INSENSITIVE` - fold case when ranking drinks (default: false)
//!
//! The server holds a single staff session for the whole process. Once
//! someone signs in, every browser that can reach the port acts as that
//! user, so keep the dashboard on a trusted network (bind it to a private
//! interface or put an authenticating proxy in front of it).

use crate::ledger::DEFAULT_CREDIT_LIMIT;
use crate::session::DEFAULT_LOGIN_DOMAIN;
use crate::statement::{DEFAULT_COUNTRY_CODE, DEFAULT_CURRENCY};
use std::{env, net::SocketAddr, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("{0} is set but {1} is missing")]
    Incomplete(String, String),
}

#[derive(Debug, Clone)]
pub struct Backend {
    pub url: String,
    pub anon_key: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` runs against the in-memory store.
    pub backend: Option<Backend>,
    pub credit_limit: f64,
    pub currency: String,
    pub country_code: String,
    pub login_domain: String,
    pub demo_username: String,
    pub demo_password: String,
    pub fold_item_case: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            backend: None,
            credit_limit: DEFAULT_CREDIT_LIMIT,
            currency: DEFAULT_CURRENCY.to_string(),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            login_domain: DEFAULT_LOGIN_DOMAIN.to_string(),
            demo_username: "admin".to_string(),
            demo_password: "admin".to_string(),
            fold_item_case: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(Backend {
                url,
                anon_key,
                timeout: parsed(&get, "STORE_TIMEOUT_SECS")?.map(Duration::from_secs),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    "SUPABASE_URL".into(),
                    "SUPABASE_ANON_KEY".into(),
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(
                    "SUPABASE_ANON_KEY".into(),
                    "SUPABASE_URL".into(),
                ));
            }
            (None, None) => None,
        };

        let credit_limit: f64 = parsed(&get, "CREDIT_LIMIT")?.unwrap_or(defaults.credit_limit);
        if !credit_limit.is_finite() || credit_limit <= 0.0 {
            return Err(ConfigError::InvalidEnvVar(
                "CREDIT_LIMIT".into(),
                "must be a positive number".into(),
            ));
        }

        Ok(Self {
            port: parsed(&get, "PORT")?.unwrap_or(defaults.port),
            backend,
            credit_limit,
            currency: get("CURRENCY").unwrap_or(defaults.currency),
            country_code: get("COUNTRY_CODE").unwrap_or(defaults.country_code),
            login_domain: get("LOGIN_DOMAIN").unwrap_or(defaults.login_domain),
            demo_username: get("DEMO_USERNAME").unwrap_or(defaults.demo_username),
            demo_password: get("DEMO_PASSWORD").unwrap_or(defaults.demo_password),
            fold_item_case: parsed(&get, "GROUP_ITEMS_CASE_INSENSITIVE")?.unwrap_or(false),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}
