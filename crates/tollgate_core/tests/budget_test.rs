//! Tests for budget multipliers.

use tollgate_core::BudgetConfig;

#[test]
fn test_default_budget_uses_full_quota() {
    let budget = BudgetConfig::default();
    assert_eq!(*budget.rpm_multiplier(), 1.0);
    assert_eq!(*budget.tpm_multiplier(), 1.0);
    assert_eq!(*budget.rpd_multiplier(), 1.0);
    assert_eq!(budget.scale_requests_per_minute(60), 60);
}

#[test]
fn test_validate_rejects_out_of_range_multipliers() {
    for bad in [0.0, -0.1, 1.5, f64::NAN] {
        let budget = BudgetConfig::builder().tpm_multiplier(bad).build();
        assert!(budget.validate().is_err(), "{} should be rejected", bad);
    }

    let ok = BudgetConfig::builder()
        .rpm_multiplier(0.8)
        .tpm_multiplier(0.5)
        .rpd_multiplier(1.0)
        .build();
    assert!(ok.validate().is_ok());
}

#[test]
fn test_scaling_rounds_and_never_reaches_zero() {
    let budget = BudgetConfig::builder()
        .rpm_multiplier(0.25)
        .tpm_multiplier(0.5)
        .rpd_multiplier(0.01)
        .build();

    assert_eq!(budget.scale_requests_per_minute(10), 3); // 2.5 rounds up
    assert_eq!(budget.scale_tokens_per_minute(250_000), 125_000);
    assert_eq!(budget.scale_daily_quota(20), 1); // 0.2 clamps to 1
}

#[test]
fn test_merge_takes_minimum() {
    let process = BudgetConfig::builder().rpm_multiplier(0.8).build();
    let narrower = BudgetConfig::builder()
        .rpm_multiplier(0.5)
        .rpd_multiplier(0.3)
        .build();

    let merged = process.merge(&narrower);

    assert_eq!(*merged.rpm_multiplier(), 0.5);
    assert_eq!(*merged.tpm_multiplier(), 1.0);
    assert_eq!(*merged.rpd_multiplier(), 0.3);
}

#[test]
fn test_deserializes_with_defaults() {
    let budget: BudgetConfig = serde_json::from_str(r#"{"rpm_multiplier": 0.5}"#).unwrap();
    assert_eq!(*budget.rpm_multiplier(), 0.5);
    assert_eq!(*budget.rpd_multiplier(), 1.0);

    let unknown = serde_json::from_str::<BudgetConfig>(r#"{"cost_multiplier": 0.5}"#);
    assert!(unknown.is_err());
}
