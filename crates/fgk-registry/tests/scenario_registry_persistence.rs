//! Registry persistence: atomic JSON file, reload on construction.

use fgk_registry::{AccountType, RegistrationRegistry, RegistrationStatus, StrategyType};

#[test]
fn registry_state_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");

    {
        let mut reg = RegistrationRegistry::with_persistence(&path).unwrap();
        reg.register_account("acc_001", AccountType::Programmatic, "ops", "ops@desk", 1_000.0)
            .unwrap();
        reg.register_strategy(
            "acc_001",
            "strat_001",
            StrategyType::MarketMaking,
            "mm v1",
            "1.0.0",
            "deadbeef",
            1_100.0,
        )
        .unwrap();
        reg.update_registration_status(
            "acc_001",
            RegistrationStatus::Approved,
            "checks passed",
            "supervisor",
            1_200.0,
        )
        .unwrap();
    }

    let reloaded = RegistrationRegistry::with_persistence(&path).unwrap();
    assert!(reloaded.is_account_approved("acc_001"));
    assert_eq!(reloaded.strategy_count(), 1);
    assert_eq!(reloaded.strategies_of("acc_001").len(), 1);
    assert!(reloaded.version() >= 3);

    // The persisted layout carries the four top-level keys.
    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    for key in ["registrations", "strategies", "account_strategies", "version"] {
        assert!(value.get(key).is_some(), "missing key {key}");
    }
}

#[test]
fn persistence_file_is_valid_json_after_every_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");

    let mut reg = RegistrationRegistry::with_persistence(&path).unwrap();
    for i in 0..5 {
        reg.register_account(
            &format!("acc_{i:03}"),
            AccountType::Quantitative,
            "ops",
            "",
            1_000.0 + i as f64,
        )
        .unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&raw).is_ok());
    }
    assert_eq!(reg.registration_count(), 5);
}
