use crate::analysis::classifier::ClassifierPolicy;
use crate::analysis::scoring::ScoringConfig;
use crate::models::evaluation::ScoreWeights;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: i64 = 2;

/// Typed view of settings.json used by evaluation passes.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSettings {
    pub score_window_days: u32,
    pub active_window_hours: u32,
    pub policy: ClassifierPolicy,
    pub scoring: ScoringConfig,
    pub git_history_days: u32,
    pub snapshot_retention: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            score_window_days: 7,
            active_window_hours: 48,
            policy: ClassifierPolicy::default(),
            scoring: ScoringConfig::default(),
            git_history_days: 30,
            snapshot_retention: 52,
        }
    }
}

pub async fn get_settings(workspace_path: String) -> Result<Value, String> {
    load_settings_from_disk(&workspace_path)
}

pub async fn save_settings(workspace_path: String, settings: Value) -> Result<Value, String> {
    save_settings_to_disk(&workspace_path, settings)
}

pub fn load_effective_evaluation_settings(
    workspace_path: &str,
) -> Result<EvaluationSettings, String> {
    let settings = load_settings_from_disk(workspace_path)?;
    Ok(effective_settings(&settings))
}

fn effective_settings(settings: &Value) -> EvaluationSettings {
    let defaults = EvaluationSettings::default();
    let number = |key: &str, fallback: u64| {
        settings.get(key).and_then(Value::as_u64).unwrap_or(fallback)
    };
    let float = |key: &str, fallback: f64| {
        settings.get(key).and_then(Value::as_f64).unwrap_or(fallback)
    };

    let default_weights = ScoreWeights::default();
    let weights = settings.get("weights");
    let weight = |key: &str, fallback: f64| {
        weights
            .and_then(|w| w.get(key))
            .and_then(Value::as_f64)
            .unwrap_or(fallback)
    };

    EvaluationSettings {
        score_window_days: number("scoreWindowDays", defaults.score_window_days as u64) as u32,
        active_window_hours: number("activeWindowHours", defaults.active_window_hours as u64)
            as u32,
        policy: ClassifierPolicy {
            active_threshold: number("activeThreshold", defaults.policy.active_threshold as u64)
                as u32,
        },
        scoring: ScoringConfig {
            weights: ScoreWeights {
                commit: weight("commit", default_weights.commit),
                pr: weight("pr", default_weights.pr),
                review: weight("review", default_weights.review),
            },
            default_score: float("defaultScore", defaults.scoring.default_score),
            stalled_floor: float("stalledScoreFloor", defaults.scoring.stalled_floor),
        },
        git_history_days: number("gitHistoryDays", defaults.git_history_days as u64) as u32,
        snapshot_retention: number("snapshotRetention", defaults.snapshot_retention as u64)
            as usize,
    }
}

pub fn load_settings_from_disk(workspace_path: &str) -> Result<Value, String> {
    let path = settings_path(workspace_path);
    ensure_ghostbuster_dir(workspace_path)?;

    let original = if path.exists() {
        let raw = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings.json: {e}"))?;
        serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            log::warn!("settings.json is not valid JSON, falling back to defaults: {e}");
            json!({})
        })
    } else {
        json!({})
    };

    let migrated = migrate_settings(original.clone());
    if migrated != original || !path.exists() {
        write_settings_file(&path, &migrated)?;
    }

    Ok(migrated)
}

pub fn save_settings_to_disk(workspace_path: &str, settings: Value) -> Result<Value, String> {
    let path = settings_path(workspace_path);
    ensure_ghostbuster_dir(workspace_path)?;

    let mut merged = load_settings_from_disk(workspace_path).unwrap_or_else(|_| default_settings());
    merge_settings(&mut merged, &settings);

    let migrated = migrate_settings(merged);
    write_settings_file(&path, &migrated)?;
    Ok(migrated)
}

fn settings_path(workspace_path: &str) -> PathBuf {
    Path::new(workspace_path)
        .join(".ghostbuster")
        .join("settings.json")
}

fn ensure_ghostbuster_dir(workspace_path: &str) -> Result<(), String> {
    let dir = Path::new(workspace_path).join(".ghostbuster");
    fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create .ghostbuster directory: {e}"))
}

fn write_settings_file(path: &Path, settings: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {e}"))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write settings.json: {e}"))
}

fn migrate_settings(input: Value) -> Value {
    let mut out = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Map::new()),
    };

    let version = out
        .get("schema_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    if version < 1 {
        migrate_active_window_days(&mut out);
    }

    if version < 2 {
        // V2 lets blocked members keep a minimum score.
        ensure_key(&mut out, "stalledScoreFloor", json!(50));
    }

    deep_merge_defaults(&mut out, &default_settings());
    sanitize_settings(&mut out);
    if let Some(obj) = out.as_object_mut() {
        obj.insert("schema_version".to_string(), json!(SETTINGS_SCHEMA_VERSION));
    }

    out
}

fn default_settings() -> Value {
    json!({
        "schema_version": SETTINGS_SCHEMA_VERSION,
        "scoreWindowDays": 7,
        "activeWindowHours": 48,
        "activeThreshold": 1,
        "weights": { "commit": 1.0, "pr": 3.0, "review": 2.0 },
        "defaultScore": 50,
        "stalledScoreFloor": 50,
        "gitHistoryDays": 30,
        "snapshotRetention": 52
    })
}

fn deep_merge_defaults(target: &mut Value, defaults: &Value) {
    let (Some(target_obj), Some(default_obj)) = (target.as_object_mut(), defaults.as_object())
    else {
        return;
    };

    for (key, default_value) in default_obj {
        match target_obj.get_mut(key) {
            Some(existing) => {
                if existing.is_object() && default_value.is_object() {
                    deep_merge_defaults(existing, default_value);
                }
            }
            None => {
                target_obj.insert(key.clone(), default_value.clone());
            }
        }
    }
}

fn ensure_key(target: &mut Value, key: &str, value: Value) {
    if let Some(obj) = target.as_object_mut() {
        obj.entry(key.to_string()).or_insert(value);
    }
}

fn merge_settings(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_obj), Value::Object(incoming_obj)) => {
            for (key, value) in incoming_obj {
                if let Some(existing) = target_obj.get_mut(key) {
                    merge_settings(existing, value);
                } else {
                    target_obj.insert(key.clone(), value.clone());
                }
            }
        }
        (target_slot, incoming_value) => {
            *target_slot = incoming_value.clone();
        }
    }
}

/// Pre-v1 files stored the active window in whole days.
fn migrate_active_window_days(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    if let Some(days) = obj.remove("activeWindowDays").and_then(|v| v.as_u64()) {
        obj.entry("activeWindowHours".to_string())
            .or_insert_with(|| json!(days * 24));
    }
}

fn sanitize_settings(settings: &mut Value) {
    let Some(obj) = settings.as_object_mut() else {
        return;
    };

    clamp_u64(obj, "scoreWindowDays", 1, 90, 7);
    clamp_u64(obj, "activeWindowHours", 1, 720, 48);
    clamp_u64(obj, "activeThreshold", 1, 100, 1);
    clamp_f64(obj, "defaultScore", 0.0, 100.0, 50.0);
    clamp_f64(obj, "stalledScoreFloor", 0.0, 100.0, 50.0);
    clamp_u64(obj, "gitHistoryDays", 1, 365, 30);
    clamp_u64(obj, "snapshotRetention", 1, 520, 52);

    let default_weights = ScoreWeights::default();
    let weights = obj
        .entry("weights".to_string())
        .or_insert_with(|| json!({}));

    if let Some(weight_obj) = weights.as_object_mut() {
        for (key, default_value) in [
            ("commit", default_weights.commit),
            ("pr", default_weights.pr),
            ("review", default_weights.review),
        ] {
            let current = weight_obj.get(key).and_then(Value::as_f64).unwrap_or(default_value);
            weight_obj.insert(key.to_string(), json!(current.clamp(0.0, 10.0)));
        }
    } else {
        *weights = json!({
            "commit": default_weights.commit,
            "pr": default_weights.pr,
            "review": default_weights.review
        });
    }
}

fn clamp_u64(map: &mut Map<String, Value>, key: &str, min: u64, max: u64, default: u64) {
    let raw = map.get(key).and_then(Value::as_u64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

fn clamp_f64(map: &mut Map<String, Value>, key: &str, min: f64, max: f64, default: f64) {
    let raw = map.get(key).and_then(Value::as_f64).unwrap_or(default);
    map.insert(key.to_string(), json!(raw.clamp(min, max)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_legacy_day_window_to_hours() {
        let migrated = migrate_settings(json!({ "activeWindowDays": 3 }));

        assert_eq!(migrated["activeWindowHours"], json!(72));
        assert!(migrated.get("activeWindowDays").is_none());
        assert_eq!(migrated["stalledScoreFloor"], json!(50));
        assert_eq!(migrated["schema_version"], json!(SETTINGS_SCHEMA_VERSION));
    }

    #[test]
    fn clamps_out_of_range_values() {
        let migrated = migrate_settings(json!({
            "schema_version": 2,
            "activeWindowHours": 0,
            "scoreWindowDays": 1000,
            "weights": { "pr": 99.0, "review": -1.0 }
        }));

        assert_eq!(migrated["activeWindowHours"], json!(1));
        assert_eq!(migrated["scoreWindowDays"], json!(90));
        assert_eq!(migrated["weights"]["pr"], json!(10.0));
        assert_eq!(migrated["weights"]["review"], json!(0.0));
        assert_eq!(migrated["weights"]["commit"], json!(1.0));
    }

    #[test]
    fn merges_partial_settings_without_losing_existing_values() {
        let mut existing = default_settings();
        let partial = json!({ "activeWindowHours": 24, "weights": { "pr": 5.0 } });
        merge_settings(&mut existing, &partial);
        let migrated = migrate_settings(existing);

        assert_eq!(migrated["activeWindowHours"], json!(24));
        assert_eq!(migrated["weights"]["pr"], json!(5.0));
        assert_eq!(migrated["weights"]["review"], json!(2.0));
        assert_eq!(migrated["snapshotRetention"], json!(52));
    }

    #[test]
    fn fractional_score_settings_are_kept() {
        let migrated = migrate_settings(json!({
            "schema_version": 2,
            "defaultScore": 37.5,
            "stalledScoreFloor": 142.5
        }));

        let effective = effective_settings(&migrated);
        assert_eq!(effective.scoring.default_score, 37.5);
        assert_eq!(effective.scoring.stalled_floor, 100.0);
    }

    #[test]
    fn defaults_produce_default_evaluation_settings() {
        let effective = effective_settings(&migrate_settings(json!({})));
        assert_eq!(effective, EvaluationSettings::default());
    }
}
