//! Daily quota reset policy.

use serde::{Deserialize, Serialize};

/// When the daily usage counters of a provider start over.
///
/// Providers rarely document which convention they use, so it is configurable
/// per provider.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum DailyResetPolicy {
    /// Reset at every UTC calendar-day boundary
    #[default]
    #[display("utc_midnight")]
    UtcMidnight,
    /// Reset 24 hours after the first request of the current daily window
    #[display("rolling")]
    Rolling,
}
