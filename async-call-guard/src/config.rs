//! Guard configuration types
//!
//! The only configurable aspect of the guard is the lock policy. It is a
//! runtime value picked once, at guard construction, and fixed for the
//! lifetime of the owner.

use crate::types::GuardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mutual-exclusion policy for a guard's critical sections.
///
/// The default is [`LockPolicy::Mutex`]; the no-op policy must be asked
/// for explicitly, since it is only sound when the integration contract
/// guarantees that the callback and the owner's destruction can never run
/// concurrently (i.e. everything happens on one thread).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockPolicy {
    /// Real mutex: resolution and invalidation are totally ordered, so the
    /// external API may fire the callback on any thread.
    #[default]
    Mutex,
    /// No serialization at all. Valid only for strictly single-threaded
    /// delivery.
    Noop,
}

impl fmt::Display for LockPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockPolicy::Mutex => write!(f, "mutex"),
            LockPolicy::Noop => write!(f, "noop"),
        }
    }
}

impl FromStr for LockPolicy {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mutex" => Ok(LockPolicy::Mutex),
            "noop" | "no-op" => Ok(LockPolicy::Noop),
            other => Err(GuardError::UnknownLockPolicy(other.to_string())),
        }
    }
}
