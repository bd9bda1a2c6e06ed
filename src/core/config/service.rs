use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::default_config;
use super::paths::AppPaths;
use super::settings::RagSettings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "bearer",
    "jwt",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "token_count", "tokens"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("INTELLIDESK_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn config_write_path(&self) -> PathBuf {
        if let Ok(path) = env::var("INTELLIDESK_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        self.paths.user_data_dir.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Defaults, then `config.yml`, then `secrets.yaml`, then environment fallbacks.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let mut merged = deep_merge(&default_config(), &self.load_file_config());
        apply_env_fallbacks(&mut merged);

        validate_config(&merged)?;
        Ok(merged)
    }

    /// Merges `patch` into the stored configuration. Redacted placeholders keep
    /// their stored value; sensitive keys are written to `secrets.yaml`.
    /// Takes effect on the next start.
    pub fn update_config(&self, patch: Value) -> Result<(), ApiError> {
        if !patch.is_object() {
            return Err(ApiError::BadRequest(
                "Configuration update must be an object".to_string(),
            ));
        }

        let current = self.load_file_config();
        let restored = restore_redacted_values(&patch, &current);
        let to_save = deep_merge(&current, &restored);

        validate_config(&deep_merge(&default_config(), &to_save))?;
        save_config_files(self, &to_save)
    }

    pub fn load_settings(&self) -> Result<RagSettings, ApiError> {
        let config = self.load_config()?;
        RagSettings::from_config(&config, &self.paths)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }

    fn load_file_config(&self) -> Value {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        deep_merge(&public_config, &secrets_config)
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value) => match value {
                Value::Object(_) => value,
                _ => Value::Object(Map::new()),
            },
            Err(err) => {
                tracing::warn!("Ignoring unreadable config file {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn save_config_files(service: &ConfigService, config: &Value) -> Result<(), ApiError> {
    let (public_config, secrets_config) = split_config(config);

    let config_path = service.config_write_path();
    if let Some(parent) = config_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let public_yaml = serde_yaml::to_string(&public_config).map_err(ApiError::internal)?;
    fs::write(&config_path, public_yaml).map_err(ApiError::internal)?;

    let secrets_path = service.secrets_path();
    if let Some(parent) = secrets_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let secrets_yaml = serde_yaml::to_string(&secrets_config).map_err(ApiError::internal)?;
    fs::write(&secrets_path, secrets_yaml).map_err(ApiError::internal)?;

    Ok(())
}

fn apply_env_fallbacks(config: &mut Value) {
    let Ok(key) = env::var("OPENAI_API_KEY") else {
        return;
    };
    if key.trim().is_empty() {
        return;
    }
    let Some(models) = config.get_mut("models").and_then(|v| v.as_object_mut()) else {
        return;
    };
    let configured = models
        .get("api_key")
        .and_then(|v| v.as_str())
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    if !configured {
        models.insert("api_key".to_string(), Value::String(key));
    }
}

pub(crate) fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn split_config(config: &Value) -> (Value, Value) {
    match config {
        Value::Object(map) => {
            let mut public_map = Map::new();
            let mut secret_map = Map::new();

            for (key, value) in map {
                if value.is_object() {
                    let (public_sub, secret_sub) = split_config(value);
                    if !is_empty_object(&public_sub) {
                        public_map.insert(key.clone(), public_sub);
                    }
                    if !is_empty_object(&secret_sub) {
                        secret_map.insert(key.clone(), secret_sub);
                    }
                } else if is_sensitive_key(key) && !value.is_null() {
                    secret_map.insert(key.clone(), value.clone());
                } else {
                    public_map.insert(key.clone(), value.clone());
                }
            }

            (Value::Object(public_map), Value::Object(secret_map))
        }
        _ => (config.clone(), Value::Object(Map::new())),
    }
}

fn restore_redacted_values(new_value: &Value, original: &Value) -> Value {
    let Value::Object(map) = new_value else {
        return new_value.clone();
    };

    let original_map = original.as_object();
    let mut restored = Map::new();
    for (key, value) in map {
        let orig_val = original_map.and_then(|m| m.get(key));
        if value.as_str() == Some(REDACT_PLACEHOLDER) {
            if let Some(orig) = orig_val {
                restored.insert(key.clone(), orig.clone());
            }
            continue;
        }
        restored.insert(
            key.clone(),
            restore_redacted_values(value, orig_val.unwrap_or(&Value::Null)),
        );
    }
    Value::Object(restored)
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
