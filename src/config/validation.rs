//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::{EngineConfig, FlowsConfig};

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

const FLOW_KEYS: &[&str] = &[
    "merge_threshold",
    "max_idle_ms",
    "end_grace_ms",
    "require_strong_success",
];

const FIXED_KEYS: &[&str] = &[
    "engine",
    "engine.clock",
    "flows",
    "store",
    "store.backend",
    "store.path",
    "store.archive",
    "store.archive_path",
    "store.active_ttl_ms",
    "pipeline",
    "pipeline.workers",
    "pipeline.queue_capacity",
    "pipeline.reaper_interval_secs",
];

/// The complete set of valid dotted key paths for `EngineConfig`.
///
/// Flow tables are generated from [`FlowsConfig::SECTIONS`]; any new field
/// on the other sections must be added to `FIXED_KEYS`.
pub fn known_config_keys() -> HashSet<String> {
    let mut keys: HashSet<String> = FIXED_KEYS.iter().map(|k| (*k).to_string()).collect();
    for (section, _) in FlowsConfig::SECTIONS {
        keys.insert(format!("flows.{section}"));
        for key in FLOW_KEYS {
            keys.insert(format!("flows.{section}.{key}"));
        }
    }
    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3; ties go to the
/// lexicographically smaller key.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), k))
        .filter(|(d, _)| *d <= 3)
        .min()
        .map(|(_, k)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new(); // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Highest score a single message can reach (anchor, key, end, next phase,
/// recency, affinity); a threshold above it disables merging.
const MAX_REACHABLE_SCORE: i32 = 125;

/// Validate value ranges on a parsed `EngineConfig`.
///
/// Returns (errors, warnings): errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_ranges(config: &EngineConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (section, o) in config.flows.iter() {
        if let Some(t) = o.merge_threshold {
            if t < 0 {
                errors.push(format!("flows.{section}.merge_threshold = {t} cannot be negative"));
            } else if t > MAX_REACHABLE_SCORE {
                warnings.push(ValidationWarning {
                    field: format!("flows.{section}.merge_threshold"),
                    message: format!(
                        "merge_threshold = {t} is above any reachable score; every message will open a new procedure"
                    ),
                    suggestion: None,
                });
            }
        }
        if let Some(ms) = o.max_idle_ms {
            if ms <= 0 {
                errors.push(format!("flows.{section}.max_idle_ms = {ms} must be > 0"));
            }
        }
        if let Some(ms) = o.end_grace_ms {
            if ms <= 0 {
                errors.push(format!("flows.{section}.end_grace_ms = {ms} must be > 0"));
            } else if ms > config.store.active_ttl_ms {
                warnings.push(ValidationWarning {
                    field: format!("flows.{section}.end_grace_ms"),
                    message: format!(
                        "end_grace_ms = {ms} exceeds store.active_ttl_ms; the reaper expires procedures first"
                    ),
                    suggestion: None,
                });
            }
        }
    }

    if config.store.active_ttl_ms <= 0 {
        errors.push(format!(
            "store.active_ttl_ms = {} must be > 0",
            config.store.active_ttl_ms
        ));
    }

    let p = &config.pipeline;
    if p.workers == 0 {
        errors.push("pipeline.workers must be >= 1".to_string());
    } else if p.workers > 256 {
        warnings.push(ValidationWarning {
            field: "pipeline.workers".to_string(),
            message: format!("workers = {} is unusually high", p.workers),
            suggestion: None,
        });
    }
    if p.queue_capacity == 0 {
        errors.push("pipeline.queue_capacity must be >= 1".to_string());
    }
    if p.reaper_interval_secs == 0 {
        errors.push("pipeline.reaper_interval_secs must be >= 1".to_string());
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("workers", "workers"), 0);
        assert_eq!(levenshtein("worker", "workers"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let value: toml::Value = "[flows.xn_handover]\nmerge_threshold = 30".parse().unwrap();
        let keys = walk_toml_keys(&value, "");
        assert!(keys.contains(&"flows".to_string()));
        assert!(keys.contains(&"flows.xn_handover".to_string()));
        assert!(keys.contains(&"flows.xn_handover.merge_threshold".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys("[flows.initial_access]\nmerge_treshold = 30\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("flows.initial_access.merge_threshold")
        );
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[engine]
clock = "wall"

[flows.rrc_state_transfer]
merge_threshold = 25
end_grace_ms = 10000

[store]
backend = "sled"
archive = "memory"

[pipeline]
workers = 2
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_flow_section_is_reported() {
        let warnings = validate_unknown_keys("[flows.service_request]\nmerge_threshold = 20\n");
        assert!(warnings.iter().any(|w| w.field == "flows.service_request"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_defaults_are_clean() {
        let (errors, warnings) = validate_ranges(&EngineConfig::default());
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_range_errors() {
        let mut config = EngineConfig::default();
        config.flows.n2_handover.merge_threshold = Some(-1);
        config.flows.initial_access.end_grace_ms = Some(0);
        config.pipeline.workers = 0;
        let (errors, _) = validate_ranges(&config);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("flows.n2_handover.merge_threshold")));
    }

    #[test]
    fn test_unreachable_threshold_warns() {
        let mut config = EngineConfig::default();
        config.flows.cu_internal_handover.merge_threshold = Some(500);
        let (errors, warnings) = validate_ranges(&config);
        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
