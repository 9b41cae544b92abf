use crate::models::site::Site;
use std::env;

pub const DEFAULT_CONFIRMATION_DAYS: i64 = 1;
pub const DEFAULT_PASSWORD_RESET_HOURS: i64 = 72;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpEncryption {
    Tls,
    StartTls,
    None,
}

impl SmtpEncryption {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "tls" => Some(SmtpEncryption::Tls),
            "starttls" => Some(SmtpEncryption::StartTls),
            "none" => Some(SmtpEncryption::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub encryption: SmtpEncryption,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// `None` when `SITE_DOMAIN` is unset; confirmation mail cannot be
    /// issued without it.
    pub site: Option<Site>,
    pub confirmation_days: i64,
    pub password_reset_hours: i64,
    /// `None` when `SMTP_HOST` is unset; mail is then only logged.
    pub smtp: Option<SmtpSettings>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or("PORT", get("PORT"), 8080u16)?;
        let environment = get("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let site = get("SITE_DOMAIN").map(|domain| {
            let name = get("SITE_NAME").unwrap_or_else(|| domain.clone());
            Site::new(domain, name)
        });

        let confirmation_days = parse_or(
            "EMAIL_CONFIRMATION_DAYS",
            get("EMAIL_CONFIRMATION_DAYS"),
            DEFAULT_CONFIRMATION_DAYS,
        )?;
        if confirmation_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "EMAIL_CONFIRMATION_DAYS",
                value: confirmation_days.to_string(),
            });
        }

        let password_reset_hours = parse_or(
            "PASSWORD_RESET_HOURS",
            get("PASSWORD_RESET_HOURS"),
            DEFAULT_PASSWORD_RESET_HOURS,
        )?;
        if password_reset_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "PASSWORD_RESET_HOURS",
                value: password_reset_hours.to_string(),
            });
        }

        let smtp = match get("SMTP_HOST") {
            Some(smtp_host) => {
                let encryption_raw = get("SMTP_ENCRYPTION").unwrap_or_else(|| "starttls".into());
                let encryption =
                    SmtpEncryption::parse(&encryption_raw).ok_or(ConfigError::Invalid {
                        key: "SMTP_ENCRYPTION",
                        value: encryption_raw.clone(),
                    })?;

                Some(SmtpSettings {
                    host: smtp_host,
                    port: parse_or("SMTP_PORT", get("SMTP_PORT"), 587u16)?,
                    username: get("SMTP_USERNAME").ok_or(ConfigError::Missing("SMTP_USERNAME"))?,
                    password: get("SMTP_PASSWORD").ok_or(ConfigError::Missing("SMTP_PASSWORD"))?,
                    from_email: get("SMTP_FROM_EMAIL")
                        .ok_or(ConfigError::Missing("SMTP_FROM_EMAIL"))?,
                    from_name: get("SMTP_FROM_NAME")
                        .or_else(|| site.as_ref().map(|s| s.name.clone()))
                        .unwrap_or_else(|| "extuser".to_string()),
                    encryption,
                })
            }
            None => None,
        };

        Ok(Settings {
            database_url,
            host,
            port,
            environment,
            site,
            confirmation_days,
            password_reset_hours,
            smtp,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn confirmation_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.confirmation_days)
    }

    pub fn password_reset_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.password_reset_hours)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
