//! Rate limit cause taxonomy.

use serde::{Deserialize, Serialize};

/// Why a provider call was throttled or refused.
///
/// The taxonomy is provider-agnostic: free-text and structured provider errors
/// are both mapped onto these variants before any retry decision is made.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateLimitCause {
    /// Per-minute request ceiling reached
    #[display("REQUESTS_PER_MINUTE")]
    RequestsPerMinute,
    /// Per-minute token ceiling reached
    #[display("TOKENS_PER_MINUTE")]
    TokensPerMinute,
    /// Daily request quota exhausted
    #[display("DAILY_QUOTA")]
    DailyQuota,
    /// Provider reported overload, unavailability or a timeout
    #[display("TEMPORARY_OVERLOAD")]
    TemporaryOverload,
    /// Failure that matched no known pattern
    #[display("UNKNOWN")]
    Unknown,
}

impl RateLimitCause {
    /// Convert to the canonical string form used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitCause::RequestsPerMinute => "REQUESTS_PER_MINUTE",
            RateLimitCause::TokensPerMinute => "TOKENS_PER_MINUTE",
            RateLimitCause::DailyQuota => "DAILY_QUOTA",
            RateLimitCause::TemporaryOverload => "TEMPORARY_OVERLOAD",
            RateLimitCause::Unknown => "UNKNOWN",
        }
    }

    /// Whether waiting and retrying can succeed for this cause.
    ///
    /// Daily quotas do not reset within the lifetime of a single request.
    /// The same split decides circuit accounting: an exhausted daily quota is
    /// not a provider failure and never counts toward opening a circuit.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RateLimitCause::DailyQuota)
    }

    /// Whether this cause clears when the current minute window rolls over.
    pub fn is_minute_window(&self) -> bool {
        matches!(
            self,
            RateLimitCause::RequestsPerMinute | RateLimitCause::TokensPerMinute
        )
    }
}

impl std::str::FromStr for RateLimitCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REQUESTS_PER_MINUTE" => Ok(RateLimitCause::RequestsPerMinute),
            "TOKENS_PER_MINUTE" => Ok(RateLimitCause::TokensPerMinute),
            "DAILY_QUOTA" => Ok(RateLimitCause::DailyQuota),
            "TEMPORARY_OVERLOAD" => Ok(RateLimitCause::TemporaryOverload),
            "UNKNOWN" => Ok(RateLimitCause::Unknown),
            _ => Err(format!("Unknown rate limit cause: {}", s)),
        }
    }
}
