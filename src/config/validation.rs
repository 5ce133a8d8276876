//! Config validation: unknown-key detection with Levenshtein suggestions
//! and checks for legal but suspicious settings.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

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

/// Returns the complete set of valid dotted key paths for PipelineConfig.
///
/// Maintained by hand to match the section structs in pipeline_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [window]
        "window",
        "window.sequence_length",
        "window.stride",
        // [labeling]
        "labeling",
        "labeling.max_rul",
        // [split]
        "split",
        "split.train",
        "split.validation",
        "split.test",
        "split.seed",
        // [scaler]
        "scaler",
        "scaler.kind",
        // [scoring]
        "scoring",
        "scoring.early_divisor",
        "scoring.late_divisor",
        "scoring.histogram_bins",
        "scoring.fault_horizon_max",
        "scoring.fault_horizon_steps",
        "scoring.unexpected_break_weight",
        "scoring.unexploited_lifetime_weight",
        // [ingestion]
        "ingestion",
        "ingestion.unit_column",
        "ingestion.cycle_column",
        "ingestion.operating_columns",
        "ingestion.sensor_columns",
        "ingestion.min_samples",
        // [preprocessing]
        "preprocessing",
        "preprocessing.impute",
        "preprocessing.imputer",
        "preprocessing.rolling_window",
        // [model]
        "model",
        "model.epochs",
        "model.learning_rate",
        "model.lr_decay",
        "model.lr_floor",
        "model.batch_size",
        "model.seed",
        // [output]
        "output",
        "output.dir",
        "output.save_tensors",
    ];
    keys.iter().copied().collect()
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
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Suspicious Settings
// ============================================================================

/// Settings that are legal but rarely intended.
pub fn suspicious_settings(config: &super::PipelineConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if config.window.stride > config.window.sequence_length && config.window.sequence_length > 0 {
        warnings.push(ValidationWarning {
            field: "window.stride".to_string(),
            message: format!(
                "window.stride ({}) exceeds window.sequence_length ({}); samples between windows are skipped",
                config.window.stride, config.window.sequence_length
            ),
            suggestion: None,
        });
    }

    let s = &config.scoring;
    if s.early_divisor.is_finite() && s.late_divisor.is_finite() && s.early_divisor < s.late_divisor {
        warnings.push(ValidationWarning {
            field: "scoring.early_divisor".to_string(),
            message: format!(
                "scoring.early_divisor ({}) < scoring.late_divisor ({}): early predictions will be penalized harder than late ones",
                s.early_divisor, s.late_divisor
            ),
            suggestion: None,
        });
    }

    if config.split.train < config.split.validation || config.split.train < config.split.test {
        warnings.push(ValidationWarning {
            field: "split.train".to_string(),
            message: format!(
                "split.train ({}) is smaller than another split ratio",
                config.split.train
            ),
            suggestion: None,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("stride", "stride"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("sequense_length", "sequence_length"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [window]
            stride = 5
        "#
        .parse()
        .expect("valid toml");
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"window".to_string()));
        assert!(keys.contains(&"window.stride".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[labeling]
max_rull = 130
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "labeling.max_rull");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("labeling.max_rul"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[window]
sequence_length = 30
stride = 10

[split]
train = 0.8
validation = 0.1
test = 0.1

[ingestion]
sensor_columns = ["s_2", "s_3"]
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {warnings:?}");
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[wndow]\nstride = 1\n");
        assert!(warnings.iter().any(|w| w.field == "wndow"));
        assert_eq!(
            warnings.iter().find(|w| w.field == "wndow").and_then(|w| w.suggestion.clone()),
            Some("window".to_string())
        );
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_known_keys_match_serialized_default() {
        // Every key the default config serializes must be known
        let text = PipelineConfig::default().to_toml().expect("serializes");
        let value: toml::Value = text.parse().expect("parses");
        let known = known_config_keys();
        for key in walk_toml_keys(&value, "") {
            assert!(known.contains(key.as_str()), "missing known key {key}");
        }
    }

    #[test]
    fn test_defaults_not_suspicious() {
        assert!(suspicious_settings(&PipelineConfig::default()).is_empty());
    }

    #[test]
    fn test_inverted_divisors_flagged() {
        let mut config = PipelineConfig::default();
        config.scoring.early_divisor = 5.0;
        let warnings = suspicious_settings(&config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "scoring.early_divisor");
    }
}
