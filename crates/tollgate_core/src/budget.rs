//! Budget multipliers that scale provider ceilings.

use serde::{Deserialize, Serialize};

/// Budget multipliers for throttling provider usage below the published limits.
///
/// Multipliers scale the effective ceilings of every provider without editing
/// the provider tables. All multipliers are in the range (0.0, 1.0] where 1.0
/// means the full published quota is used.
///
/// # Examples
///
/// ```
/// use tollgate_core::BudgetConfig;
///
/// // Leave headroom for other tenants of the same API key
/// let shared = BudgetConfig::builder()
///     .rpm_multiplier(0.5)
///     .rpd_multiplier(0.8)
///     .build();
/// assert_eq!(shared.scale_requests_per_minute(10), 5);
///
/// let full = BudgetConfig::default();
/// assert_eq!(*full.rpm_multiplier(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Multiplier for requests per minute (0.0-1.0, default 1.0).
    #[serde(default = "default_multiplier")]
    rpm_multiplier: f64,

    /// Multiplier for tokens per minute (0.0-1.0, default 1.0).
    #[serde(default = "default_multiplier")]
    tpm_multiplier: f64,

    /// Multiplier for the daily request quota (0.0-1.0, default 1.0).
    #[serde(default = "default_multiplier")]
    rpd_multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            rpm_multiplier: default_multiplier(),
            tpm_multiplier: default_multiplier(),
            rpd_multiplier: default_multiplier(),
        }
    }
}

impl BudgetConfig {
    /// Creates a new budget config builder.
    pub fn builder() -> BudgetConfigBuilder {
        BudgetConfigBuilder::default()
    }

    /// Validates that all multipliers are in the range (0.0, 1.0].
    ///
    /// # Errors
    ///
    /// Returns a description of the first multiplier that is out of range.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("rpm_multiplier", self.rpm_multiplier),
            ("tpm_multiplier", self.tpm_multiplier),
            ("rpd_multiplier", self.rpd_multiplier),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(format!("{} must be in (0.0, 1.0], got {}", name, value));
            }
        }
        Ok(())
    }

    /// Scales a requests-per-minute ceiling. Never returns less than 1.
    pub fn scale_requests_per_minute(&self, rpm: u32) -> u32 {
        scale(u64::from(rpm), self.rpm_multiplier).min(u64::from(u32::MAX)) as u32
    }

    /// Scales a tokens-per-minute ceiling. Never returns less than 1.
    pub fn scale_tokens_per_minute(&self, tpm: u64) -> u64 {
        scale(tpm, self.tpm_multiplier)
    }

    /// Scales a daily request quota. Never returns less than 1.
    pub fn scale_daily_quota(&self, quota: u32) -> u32 {
        scale(u64::from(quota), self.rpd_multiplier).min(u64::from(u32::MAX)) as u32
    }

    /// Merges this budget with another, taking the minimum of each multiplier.
    ///
    /// Useful for combining a process-wide budget with a narrower override.
    pub fn merge(&self, other: &BudgetConfig) -> BudgetConfig {
        BudgetConfig {
            rpm_multiplier: self.rpm_multiplier.min(other.rpm_multiplier),
            tpm_multiplier: self.tpm_multiplier.min(other.tpm_multiplier),
            rpd_multiplier: self.rpd_multiplier.min(other.rpd_multiplier),
        }
    }
}

fn scale(limit: u64, multiplier: f64) -> u64 {
    ((limit as f64 * multiplier).round() as u64).max(1)
}

/// Builder for `BudgetConfig`.
#[derive(Debug, Default)]
pub struct BudgetConfigBuilder {
    rpm_multiplier: Option<f64>,
    tpm_multiplier: Option<f64>,
    rpd_multiplier: Option<f64>,
}

impl BudgetConfigBuilder {
    /// Sets the requests-per-minute multiplier.
    pub fn rpm_multiplier(mut self, value: f64) -> Self {
        self.rpm_multiplier = Some(value);
        self
    }

    /// Sets the tokens-per-minute multiplier.
    pub fn tpm_multiplier(mut self, value: f64) -> Self {
        self.tpm_multiplier = Some(value);
        self
    }

    /// Sets the daily quota multiplier.
    pub fn rpd_multiplier(mut self, value: f64) -> Self {
        self.rpd_multiplier = Some(value);
        self
    }

    /// Builds the `BudgetConfig`.
    pub fn build(self) -> BudgetConfig {
        BudgetConfig {
            rpm_multiplier: self.rpm_multiplier.unwrap_or(1.0),
            tpm_multiplier: self.tpm_multiplier.unwrap_or(1.0),
            rpd_multiplier: self.rpd_multiplier.unwrap_or(1.0),
        }
    }
}
