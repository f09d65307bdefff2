//! `coachgate-core`: shared building blocks for the access-governance crates.
//!
//! This crate contains **pure** primitives (no IO, no transport concerns).

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{GrantId, UserId};
