//! Infrastructure adapters for the governance layer: in-memory collaborators
//! and configuration loading.

pub mod audit;
pub mod config;
pub mod directory;
pub mod feature_flags;
pub mod permission_store;

pub use audit::InMemoryAuditSink;
pub use config::{BootstrapAdmin, ConfigError, GovernanceConfig};
pub use directory::InMemoryUserDirectory;
pub use feature_flags::{EnvFeatureFlags, InMemoryFeatureFlags};
pub use permission_store::{
    GrantFilter, GrantPage, GrantStats, InMemoryPermissionStore, NewGrant, PageRequest,
};
