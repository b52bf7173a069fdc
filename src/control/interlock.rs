//! Declarative relay interlocks, checked before any physical *On* toggle.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::records::RelayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterlockRule {
    /// The two relays may never be on at the same time (shared supply,
    /// shared circuit).
    MutuallyExclusive(RelayId, RelayId),
}

impl InterlockRule {
    /// The relay that blocks switching `requested` on, if any.
    pub fn conflict(&self, requested: RelayId, states: &[bool; RelayId::COUNT]) -> Option<RelayId> {
        match *self {
            Self::MutuallyExclusive(a, b) if a == b => None,
            Self::MutuallyExclusive(a, b) if requested == a && states[b.index()] => Some(b),
            Self::MutuallyExclusive(a, b) if requested == b && states[a.index()] => Some(a),
            Self::MutuallyExclusive(..) => None,
        }
    }
}

/// Check every rule for switching `requested` on.
pub fn check(
    rules: &[InterlockRule],
    requested: RelayId,
    states: &[bool; RelayId::COUNT],
) -> Result<(), RelayError> {
    for rule in rules {
        if let Some(conflicting) = rule.conflict(requested, states) {
            return Err(RelayError::InterlockViolation {
                requested,
                conflicting,
            });
        }
    }
    Ok(())
}
