//! Feature-flag sources backing the kill switch.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use coachgate_auth::{Feature, FeatureFlagSource, StoreError};

/// Runtime-togglable flags, optionally layered over another source.
///
/// A flag set here (by an admin) overrides whatever the fallback reports.
#[derive(Default)]
pub struct InMemoryFeatureFlags {
    flags: RwLock<BTreeMap<Feature, bool>>,
    fallback: Option<Arc<dyn FeatureFlagSource>>,
}

impl InMemoryFeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: Arc<dyn FeatureFlagSource>) -> Self {
        Self {
            flags: RwLock::new(BTreeMap::new()),
            fallback: Some(fallback),
        }
    }

    pub fn set_enabled(&self, feature: Feature, enabled: bool) -> Result<(), StoreError> {
        let mut flags = self
            .flags
            .write()
            .map_err(|_| StoreError::Corrupt("feature flag lock poisoned".into()))?;
        info!(target: "audit", feature = %feature, enabled, "feature flag changed");
        flags.insert(feature, enabled);
        Ok(())
    }

    /// Effective state of every known feature.
    pub fn snapshot(&self) -> Result<BTreeMap<Feature, bool>, StoreError> {
        Feature::KNOWN
            .into_iter()
            .map(|f| {
                let enabled = self.flag(&f)?.unwrap_or(true);
                Ok((f, enabled))
            })
            .collect()
    }
}

impl FeatureFlagSource for InMemoryFeatureFlags {
    fn flag(&self, feature: &Feature) -> Result<Option<bool>, StoreError> {
        let local = self
            .flags
            .read()
            .map_err(|_| StoreError::Corrupt("feature flag lock poisoned".into()))?
            .get(feature)
            .copied();
        match (local, &self.fallback) {
            (Some(v), _) => Ok(Some(v)),
            (None, Some(fallback)) => fallback.flag(feature),
            (None, None) => Ok(None),
        }
    }
}

/// Flags read from `FEATURE_<NAME>` variables on every check.
///
/// Accepts `1/true/on/enabled` and `0/false/off/disabled`; anything else is
/// reported as a source error so the kill switch fails open.
pub struct EnvFeatureFlags {
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvFeatureFlags {
    pub fn from_env() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl FeatureFlagSource for EnvFeatureFlags {
    fn flag(&self, feature: &Feature) -> Result<Option<bool>, StoreError> {
        let key = feature.env_key();
        let Some(raw) = (self.lookup)(&key) else {
            return Ok(None);
        };
        parse_flag(&raw)
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("{key}={raw} is not a boolean flag")))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "enabled" => Some(true),
        "0" | "false" | "off" | "disabled" => Some(false),
        _ => None,
    }
}
