use std::path::PathBuf;
use std::str::FromStr;

use crate::secret::Secret;

use super::Config;

pub const EMBEDDING_API_KEY: &str = "QUARRY_EMBEDDING_API_KEY";
pub const CONTEXT_API_KEY: &str = "QUARRY_CONTEXT_API_KEY";

/// Parsed value of `key`, or `None` when unset or unparsable.
fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    if let Ok(parsed) = v.trim().parse() {
        Some(parsed)
    } else {
        tracing::warn!("ignoring invalid {key} value: {v}");
        None
    }
}

fn list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_embedding();
        self.apply_env_overrides_workspace();
        self.resolve_env_secrets();
    }

    fn apply_env_overrides_embedding(&mut self) {
        if let Some(model) = parsed("QUARRY_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(v) = std::env::var("QUARRY_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Some(n) = parsed("QUARRY_EMBEDDING_BATCH_SIZE") {
            self.embedding.max_batch_size = n;
        }
        if let Some(rpm) = parsed("QUARRY_EMBEDDING_RPM") {
            self.embedding.requests_per_minute = rpm;
        }
        if let Some(enabled) = parsed("QUARRY_CONTEXT_ENABLED") {
            self.context.enabled = enabled;
        }
        if let Some(n) = parsed("QUARRY_CONTEXT_BATCH_SIZE") {
            self.context.batch_size = n;
        }
        if let Some(ms) = parsed("QUARRY_FILE_DELAY_MS") {
            self.context.file_delay_ms = ms;
        }
    }

    fn apply_env_overrides_workspace(&mut self) {
        if let Ok(v) = std::env::var("QUARRY_STORAGE_HOST") {
            self.storage.host = v;
        }
        if let Some(port) = parsed("QUARRY_STORAGE_PORT") {
            self.storage.port = port;
        }
        if let Some(n) = parsed("QUARRY_STORAGE_BATCH_SIZE") {
            self.storage.batch_size = n;
        }
        if let Ok(v) = std::env::var("QUARRY_WORKSPACE_ID") {
            self.workspace.id = Some(v);
        }
        if let Some(include) = list("QUARRY_INCLUDE") {
            self.workspace.include = include;
        }
        if let Some(exclude) = list("QUARRY_EXCLUDE") {
            self.workspace.exclude = exclude;
        }
        if let Some(respect) = parsed("QUARRY_RESPECT_IGNORE_FILES") {
            self.workspace.respect_ignore_files = respect;
        }
        if let Some(max) = parsed("QUARRY_MAX_FILES") {
            self.workspace.max_files = Some(max);
        }
        if let Ok(v) = std::env::var("QUARRY_SNAPSHOT_DIR") {
            self.workspace.snapshot_dir = Some(PathBuf::from(v));
        }
    }

    fn resolve_env_secrets(&mut self) {
        self.secrets.embedding_api_key = Secret::from_env(EMBEDDING_API_KEY);
        self.secrets.context_api_key = Secret::from_env(CONTEXT_API_KEY);
    }
}
