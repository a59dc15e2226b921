//! Mapping provider failures onto the rate limit taxonomy.
//!
//! Text-only providers are classified with case-insensitive substring
//! heuristics. Providers that return structured error codes get an exact-match
//! table, configured per provider, that falls back to the heuristics.

use crate::ProviderConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tollgate_core::RateLimitCause;

/// Classifies the error message of a failed provider call.
///
/// Implementations must be pure: the same message always yields the same cause.
pub trait ErrorClassifier: Send + Sync + fmt::Debug {
    /// Map an error message to a rate limit cause.
    fn classify(&self, message: &str) -> RateLimitCause;
}

/// Case-insensitive substring heuristics for free-text provider errors.
///
/// Patterns are tried in order and the first match wins:
/// 1. "daily quota" or "quota exceeded" => `DailyQuota`
/// 2. "rate limit" and "token" => `TokensPerMinute`
/// 3. "rate limit" => `RequestsPerMinute`
/// 4. "overloaded", "unavailable" or "timeout" => `TemporaryOverload`
/// 5. anything else => `Unknown`
///
/// # Example
///
/// ```
/// use tollgate_core::RateLimitCause;
/// use tollgate_rate_limit::{ErrorClassifier, SubstringClassifier};
///
/// let cause = SubstringClassifier.classify("Rate limit reached for tokens per min");
/// assert_eq!(cause, RateLimitCause::TokensPerMinute);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl ErrorClassifier for SubstringClassifier {
    fn classify(&self, message: &str) -> RateLimitCause {
        classify(message)
    }
}

/// Classify a free-text error message with the substring heuristics.
pub fn classify(message: &str) -> RateLimitCause {
    let message = message.to_lowercase();
    let has = |pattern: &str| message.contains(pattern);

    if has("daily quota") || has("quota exceeded") {
        RateLimitCause::DailyQuota
    } else if has("rate limit") && has("token") {
        RateLimitCause::TokensPerMinute
    } else if has("rate limit") {
        RateLimitCause::RequestsPerMinute
    } else if has("overloaded") || has("unavailable") || has("timeout") {
        RateLimitCause::TemporaryOverload
    } else {
        RateLimitCause::Unknown
    }
}

/// Exact error-code table for providers with structured errors.
///
/// A code matches the whole trimmed message, or the part before the first
/// `:` (as in `"RESOURCE_EXHAUSTED: quota for model"`). Codes compare
/// case-insensitively. Messages without a known code fall back to
/// [`SubstringClassifier`].
///
/// # Example
///
/// ```
/// use tollgate_core::RateLimitCause;
/// use tollgate_rate_limit::{ErrorClassifier, ExactMatchClassifier};
///
/// let classifier = ExactMatchClassifier::new()
///     .with_code("insufficient_quota", RateLimitCause::DailyQuota);
///
/// assert_eq!(
///     classifier.classify("insufficient_quota: You exceeded your plan"),
///     RateLimitCause::DailyQuota
/// );
/// assert_eq!(classifier.classify("model overloaded"), RateLimitCause::TemporaryOverload);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExactMatchClassifier {
    codes: HashMap<String, RateLimitCause>,
    fallback: SubstringClassifier,
}

impl ExactMatchClassifier {
    /// Create a classifier with no codes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier from `(code, cause)` pairs.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = (S, RateLimitCause)>,
        S: AsRef<str>,
    {
        codes
            .into_iter()
            .fold(Self::new(), |classifier, (code, cause)| classifier.with_code(code, cause))
    }

    /// Add a code to the table.
    pub fn with_code(mut self, code: impl AsRef<str>, cause: RateLimitCause) -> Self {
        self.codes.insert(code.as_ref().trim().to_lowercase(), cause);
        self
    }

    /// Number of codes in the table.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Returns true if the table has no codes.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn lookup(&self, candidate: &str) -> Option<RateLimitCause> {
        self.codes.get(&candidate.trim().to_lowercase()).copied()
    }
}

impl ErrorClassifier for ExactMatchClassifier {
    fn classify(&self, message: &str) -> RateLimitCause {
        self.lookup(message)
            .or_else(|| {
                message
                    .split_once(':')
                    .and_then(|(code, _)| self.lookup(code))
            })
            .unwrap_or_else(|| self.fallback.classify(message))
    }
}

/// The classifier a provider's configuration calls for.
///
/// Providers with an `error_codes` table get an [`ExactMatchClassifier`],
/// everyone else the substring heuristics.
pub fn classifier_for(config: &ProviderConfig) -> Arc<dyn ErrorClassifier> {
    if config.error_codes.is_empty() {
        Arc::new(SubstringClassifier)
    } else {
        Arc::new(ExactMatchClassifier::from_codes(
            config
                .error_codes
                .iter()
                .map(|(code, cause)| (code.as_str(), *cause)),
        ))
    }
}
