//! Startup configuration for the governance layer.

use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;
use tracing::warn;

use coachgate_auth::{Feature, RateLimit};
use coachgate_core::UserId;

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key}: unknown feature '{name}'")]
    UnknownFeature { key: &'static str, name: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Admin account seeded into the directory at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceConfig {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    pub per_principal: RateLimit,
    pub global: RateLimit,
    pub disabled_features: Vec<Feature>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            per_principal: RateLimit::per_minute(20),
            global: RateLimit::per_minute(100),
            disabled_features: Vec::new(),
            bootstrap_admin: None,
        }
    }
}

impl GovernanceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take their defaults;
    /// set-but-invalid keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("BIND_ADDR", &raw, format!("{e}")))?,
            None => defaults.bind_addr,
        };

        let per_principal = RateLimit::new(
            positive(&get, "RATE_LIMIT_PER_PRINCIPAL", defaults.per_principal.limit)?,
            Duration::seconds(i64::from(positive(
                &get,
                "RATE_LIMIT_PRINCIPAL_WINDOW_SECS",
                window_secs(defaults.per_principal),
            )?)),
        );
        let global = RateLimit::new(
            positive(&get, "RATE_LIMIT_GLOBAL", defaults.global.limit)?,
            Duration::seconds(i64::from(positive(
                &get,
                "RATE_LIMIT_GLOBAL_WINDOW_SECS",
                window_secs(defaults.global),
            )?)),
        );

        let disabled_features = match get("DISABLED_FEATURES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|name| {
                    Feature::known(name).ok_or_else(|| ConfigError::UnknownFeature {
                        key: "DISABLED_FEATURES",
                        name: name.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let bootstrap_admin = match get("BOOTSTRAP_ADMIN_ID") {
            Some(raw) => {
                let id = raw
                    .trim()
                    .parse::<UserId>()
                    .map_err(|e| ConfigError::invalid("BOOTSTRAP_ADMIN_ID", &raw, e.to_string()))?;
                let email = get("BOOTSTRAP_ADMIN_EMAIL").unwrap_or_else(|| "admin@localhost".into());
                Some(BootstrapAdmin { id, email })
            }
            None => None,
        };

        Ok(Self {
            jwt_secret,
            bind_addr,
            per_principal,
            global,
            disabled_features,
            bootstrap_admin,
        })
    }
}

fn window_secs(limit: RateLimit) -> u32 {
    u32::try_from(limit.window.num_seconds()).unwrap_or(u32::MAX)
}

fn positive(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::invalid(key, &raw, "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::invalid(key, &raw, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<GovernanceConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        GovernanceConfig::from_lookup(|k| map.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(load(&[]).unwrap(), GovernanceConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let admin = UserId::new();
        let admin_str = admin.to_string();
        let cfg = load(&[
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("RATE_LIMIT_PER_PRINCIPAL", "5"),
            ("RATE_LIMIT_PRINCIPAL_WINDOW_SECS", "10"),
            ("RATE_LIMIT_GLOBAL", "50"),
            ("DISABLED_FEATURES", "ai-generation, "),
            ("BOOTSTRAP_ADMIN_ID", admin_str.as_str()),
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.com"),
        ])
        .unwrap();

        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.per_principal, RateLimit::new(5, Duration::seconds(10)));
        assert_eq!(cfg.global, RateLimit::new(50, Duration::seconds(60)));
        assert_eq!(cfg.disabled_features, vec![Feature::AI_GENERATION]);
        assert_eq!(
            cfg.bootstrap_admin,
            Some(BootstrapAdmin {
                id: admin,
                email: "root@example.com".into()
            })
        );
    }

    #[test]
    fn zero_and_garbage_limits_are_rejected() {
        assert!(matches!(
            load(&[("RATE_LIMIT_GLOBAL", "0")]),
            Err(ConfigError::Invalid { key: "RATE_LIMIT_GLOBAL", .. })
        ));
        assert!(matches!(
            load(&[("RATE_LIMIT_PER_PRINCIPAL", "lots")]),
            Err(ConfigError::Invalid { key: "RATE_LIMIT_PER_PRINCIPAL", .. })
        ));
    }

    #[test]
    fn unknown_feature_is_rejected_at_startup() {
        assert_eq!(
            load(&[("DISABLED_FEATURES", "ai_generation,teleport")]),
            Err(ConfigError::UnknownFeature {
                key: "DISABLED_FEATURES",
                name: "teleport".into()
            })
        );
    }

    #[test]
    fn bad_admin_id_is_rejected() {
        assert!(load(&[("BOOTSTRAP_ADMIN_ID", "not-a-uuid")]).is_err());
    }
}
