//! Shared types for certkeeper.
//!
//! Holds what both the configuration crate and the renewal manager need:
//! the authority's rate limits, identifier newtypes and notification
//! category tags.

pub mod category;
pub mod ids;
pub mod limits;

pub use ids::{CycleId, NotifierName, ServerId};
pub use limits::{ExclusionReason, RateLimits};
