//! Config Validation Tests
//!
//! Typo detection (unknown keys with suggestions) and range validation,
//! exercised through the public config API.

use ueflow::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use ueflow::config::{ClockMode, ConfigError, EngineConfig, StoreBackend};
use ueflow::{FlowHandler, FlowRegistry, ProcedureType};

// ============================================================================
// Typo Detection Tests
// ============================================================================

#[test]
fn typo_in_flow_key_warns_with_suggestion() {
    let toml_str = r#"
[flows.xn_handover]
merge_treshold = 40
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("merge_treshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("flows.xn_handover.merge_threshold")
    );
}

#[test]
fn typo_in_section_name_warns() {
    let toml_str = r#"
[pipline]
workers = 8
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.iter().any(|w| w.field == "pipline"));
    assert!(warnings
        .iter()
        .any(|w| w.suggestion.as_deref() == Some("pipeline")));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[engine]
clock = "wall"

[flows.initial_access]
merge_threshold = 40
require_strong_success = true

[flows.cu_internal_handover]
end_grace_ms = 10000

[store]
backend = "sled"
path = "/var/lib/ueflow/db"
archive = "memory"

[pipeline]
workers = 8
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn far_off_key_gets_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("completely.unrelated.thing", &known), None);
}

#[test]
fn every_flow_section_is_known() {
    let known = known_config_keys();
    for section in [
        "initial_access",
        "xn_handover",
        "n2_handover",
        "rrc_reestablishment",
        "rrc_state_transfer",
        "cu_internal_handover",
    ] {
        assert!(known.contains(&format!("flows.{section}.end_grace_ms")), "{section}");
    }
}

// ============================================================================
// Range Validation Tests
// ============================================================================

#[test]
fn defaults_pass_range_validation() {
    let (errors, warnings) = validate_ranges(&EngineConfig::default());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty());
}

#[test]
fn impossible_values_are_rejected() {
    let toml_str = r#"
[flows.rrc_state_transfer]
merge_threshold = -1

[pipeline]
workers = 0
"#;
    match EngineConfig::from_toml_str(toml_str) {
        Err(ConfigError::Invalid(errors)) => {
            assert_eq!(errors.len(), 2, "{errors:?}");
            assert!(errors.iter().any(|e| e.contains("merge_threshold")));
            assert!(errors.iter().any(|e| e.contains("workers")));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn unreachable_threshold_is_a_warning_only() {
    let toml_str = r#"
[flows.n2_handover]
merge_threshold = 500
"#;
    let config = EngineConfig::from_toml_str(toml_str).unwrap();
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "flows.n2_handover.merge_threshold");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    assert!(matches!(
        EngineConfig::from_toml_str("[store\nbackend ="),
        Err(ConfigError::Parse(..))
    ));
}

// ============================================================================
// Config → engine wiring
// ============================================================================

#[test]
fn overrides_reach_the_registry() {
    let toml_str = r#"
[engine]
clock = "wall"

[flows.rrc_reestablishment]
merge_threshold = 50

[store]
backend = "sled"
"#;
    let config = EngineConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.engine.clock, ClockMode::Wall);
    assert_eq!(config.store.backend, StoreBackend::Sled);

    let registry = FlowRegistry::from_config(&config.flows);
    let rre = registry.handler_for(ProcedureType::RrcReestablishment).unwrap();
    assert_eq!(rre.merge_threshold(), 50);
    let rst = registry.handler_for(ProcedureType::RrcStateTransfer).unwrap();
    assert_eq!(rst.merge_threshold(), 25);
}
