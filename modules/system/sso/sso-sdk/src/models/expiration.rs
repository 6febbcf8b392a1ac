use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TicketMeta;

/// Time elapsed between two instants, clamped to zero when `now` is earlier.
#[must_use]
pub fn elapsed_since(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Validity rule attached to every ticket.
///
/// Evaluation is a pure function of the ticket metadata and the current
/// time. Once [`ExpirationPolicy::is_expired`] returns true for a ticket it
/// stays true: usage timestamps are only advanced on tickets that are still
/// valid, and every variant except `NeverExpires` has a hard ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ExpirationPolicy {
    /// Reserved for system tickets.
    NeverExpires,
    /// Absolute lifetime counted from creation.
    TimeToLive {
        #[serde(with = "crate::humantime_serde")]
        time_to_live: Duration,
    },
    /// Idle window bounded by an absolute ceiling.
    Sliding {
        #[serde(with = "crate::humantime_serde")]
        idle_timeout: Duration,
        #[serde(with = "crate::humantime_serde")]
        max_time_to_live: Duration,
    },
    /// Absolute lifetime plus a minimum spacing between consecutive uses.
    ThrottledUse {
        #[serde(with = "crate::humantime_serde")]
        time_to_live: Duration,
        #[serde(with = "crate::humantime_serde")]
        min_spacing: Duration,
    },
}

impl ExpirationPolicy {
    #[must_use]
    pub fn is_expired(&self, meta: &TicketMeta, now: DateTime<Utc>) -> bool {
        let age = elapsed_since(meta.creation_time, now);
        match self {
            Self::NeverExpires => false,
            Self::TimeToLive { time_to_live } | Self::ThrottledUse { time_to_live, .. } => {
                age > *time_to_live
            }
            Self::Sliding {
                idle_timeout,
                max_time_to_live,
            } => {
                let idle = elapsed_since(meta.last_used_time, now);
                age > *max_time_to_live || idle > *idle_timeout
            }
        }
    }

    /// Whether a use right now would come too soon after the previous one.
    ///
    /// Throttling is transient and does not make the ticket expired.
    #[must_use]
    pub fn is_throttled(&self, meta: &TicketMeta, now: DateTime<Utc>) -> bool {
        match self {
            Self::ThrottledUse { min_spacing, .. } => {
                meta.count_of_uses > 0 && elapsed_since(meta.last_used_time, now) < *min_spacing
            }
            _ => false,
        }
    }

    /// Upper bound on the ticket lifetime, for backends that support native TTLs.
    #[must_use]
    pub fn max_time_to_live(&self) -> Option<Duration> {
        match self {
            Self::NeverExpires => None,
            Self::TimeToLive { time_to_live } | Self::ThrottledUse { time_to_live, .. } => {
                Some(*time_to_live)
            }
            Self::Sliding {
                max_time_to_live, ..
            } => Some(*max_time_to_live),
        }
    }
}
