use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::StoreError;

/// Name of an operator-controllable feature (e.g. `ai_generation`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Feature(Cow<'static, str>);

impl Feature {
    pub const AI_GENERATION: Feature = Feature(Cow::Borrowed("ai_generation"));

    /// Features the process knows how to gate.
    pub const KNOWN: [Feature; 1] = [Feature::AI_GENERATION];

    /// Resolve a name against [`Feature::KNOWN`], accepting kebab case.
    pub fn known(name: &str) -> Option<Feature> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Feature::KNOWN.into_iter().find(|f| f.as_str() == normalized)
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-snake form used for environment variables (`FEATURE_AI_GENERATION`).
    pub fn env_key(&self) -> String {
        format!("FEATURE_{}", self.0.to_ascii_uppercase().replace(['-', '.'], "_"))
    }
}

impl core::fmt::Display for Feature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where feature flags are read from.
///
/// `Ok(None)` means "no flag set for this feature".
pub trait FeatureFlagSource: Send + Sync {
    fn flag(&self, feature: &Feature) -> Result<Option<bool>, StoreError>;
}

/// Process-wide gate for feature-scoped route groups.
///
/// Opt-out semantics: a feature is enabled unless a flag explicitly disables
/// it, and an unreadable source fails open.
#[derive(Clone)]
pub struct KillSwitch {
    source: Arc<dyn FeatureFlagSource>,
}

impl KillSwitch {
    pub fn new(source: Arc<dyn FeatureFlagSource>) -> Self {
        Self { source }
    }

    pub fn is_enabled(&self, feature: &Feature) -> bool {
        match self.source.flag(feature) {
            Ok(Some(enabled)) => enabled,
            Ok(None) => true,
            Err(e) => {
                warn!(feature = %feature, error = %e, "feature flag source unreachable; failing open");
                true
            }
        }
    }
}
