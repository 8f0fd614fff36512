use std::io::Write;
use std::path::Path;

use quarry_embed::EmbeddingModel;
use serial_test::serial;

use super::*;
use crate::secret::Secret;

const ENV_KEYS: [&str; 19] = [
    "QUARRY_EMBEDDING_API_KEY",
    "QUARRY_CONTEXT_API_KEY",
    "QUARRY_EMBEDDING_MODEL",
    "QUARRY_EMBEDDING_BASE_URL",
    "QUARRY_EMBEDDING_BATCH_SIZE",
    "QUARRY_EMBEDDING_RPM",
    "QUARRY_STORAGE_HOST",
    "QUARRY_STORAGE_PORT",
    "QUARRY_STORAGE_BATCH_SIZE",
    "QUARRY_WORKSPACE_ID",
    "QUARRY_INCLUDE",
    "QUARRY_EXCLUDE",
    "QUARRY_MAX_FILES",
    "QUARRY_RESPECT_IGNORE_FILES",
    "QUARRY_CONTEXT_BATCH_SIZE",
    "QUARRY_CONTEXT_ENABLED",
    "QUARRY_FILE_DELAY_MS",
    "QUARRY_SNAPSHOT_DIR",
    "QUARRY_CONFIG",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn valid() -> Config {
    let mut config = Config::default();
    config.secrets.embedding_api_key = Some(Secret::new("pa-test"));
    config
}

#[test]
fn defaults() {
    let config = Config::default();
    assert_eq!(config.embedding.base_url, "https://api.voyageai.com/v1");
    assert_eq!(config.embedding.model, EmbeddingModel::Code);
    assert_eq!(config.embedding.max_batch_size, 128);
    assert_eq!(config.embedding.requests_per_minute, 300);
    assert_eq!(config.embedding.cache_ttl_secs, 86_400);
    assert_eq!(config.embedding.dimension, 1024);
    assert!(config.context.enabled);
    assert_eq!(config.context.batch_size, 10);
    assert_eq!(config.context.file_delay_ms, 1000);
    assert_eq!(config.storage.url(), "http://localhost:6334");
    assert_eq!(config.storage.batch_size, 100);
    assert_eq!((config.chunker.target_tokens, config.chunker.max_tokens), (512, 1024));
    assert!(config.workspace.include.contains(&"*.py".to_owned()));
    assert!(config.workspace.exclude.contains(&"node_modules/".to_owned()));
    assert!(config.workspace.respect_ignore_files);
}

#[test]
#[serial]
fn missing_file_yields_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/quarry.toml")).unwrap();
    assert_eq!(config.storage.port, 6334);
    assert!(config.secrets.embedding_api_key.is_none());
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quarry.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
[embedding]
model = "long-context"
requests_per_minute = 60

[embedding.pricing]
long-context = 0.12

[context]
enabled = false

[storage]
host = "qdrant.internal"
port = 7334
collection_prefix = "acme"

[workspace]
id = "monorepo"
include = ["*.rs"]
max_files = 500

[chunker]
target_tokens = 256
"#
    )
    .unwrap();

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.embedding.model, EmbeddingModel::LongContext);
    assert_eq!(config.embedding.requests_per_minute, 60);
    assert_eq!(config.embedding.max_batch_size, 128);
    assert!(!config.context.enabled);
    assert_eq!(config.storage.url(), "http://qdrant.internal:7334");
    assert_eq!(config.storage.collection_prefix, "acme");
    assert_eq!(config.workspace.id.as_deref(), Some("monorepo"));
    assert_eq!(config.workspace.include, vec!["*.rs"]);
    assert_eq!(config.workspace.max_files, Some(500));
    assert_eq!(config.chunker.target_tokens, 256);
    assert_eq!(config.chunker.max_tokens, 1024);

    let prices = config.price_table();
    assert!((prices.price_per_million(EmbeddingModel::LongContext) - 0.12).abs() < 1e-12);
    assert!((prices.price_per_million(EmbeddingModel::Fast) - 0.02).abs() < 1e-12);
}

#[test]
#[serial]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[storage\nport = ").unwrap();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn env_overrides() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("QUARRY_EMBEDDING_MODEL", "fast");
        std::env::set_var("QUARRY_STORAGE_PORT", "7000");
        std::env::set_var("QUARRY_INCLUDE", "*.go, *.rs ,");
        std::env::set_var("QUARRY_MAX_FILES", "25");
        std::env::set_var("QUARRY_CONTEXT_ENABLED", "false");
        std::env::set_var("QUARRY_SNAPSHOT_DIR", "/tmp/snaps");
        std::env::set_var("QUARRY_RESPECT_IGNORE_FILES", "false");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.embedding.model, EmbeddingModel::Fast);
    assert_eq!(config.storage.port, 7000);
    assert_eq!(config.workspace.include, vec!["*.go", "*.rs"]);
    assert_eq!(config.workspace.max_files, Some(25));
    assert!(!config.context.enabled);
    assert!(!config.workspace.respect_ignore_files);
    assert_eq!(
        config.workspace.resolved_snapshot_dir(),
        std::path::PathBuf::from("/tmp/snaps")
    );
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("QUARRY_STORAGE_PORT", "not-a-port");
        std::env::set_var("QUARRY_EMBEDDING_RPM", "-5");
        std::env::set_var("QUARRY_EMBEDDING_MODEL", "huge");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.storage.port, 6334);
    assert_eq!(config.embedding.requests_per_minute, 300);
    assert_eq!(config.embedding.model, EmbeddingModel::Code);
}

#[test]
#[serial]
fn secrets_come_from_env_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quarry.toml");
    std::fs::write(&path, "[secrets]\nembedding_api_key = \"from-file\"\n").unwrap();

    clear_env();
    unsafe { std::env::set_var("QUARRY_EMBEDDING_API_KEY", "from-env") };
    let config = Config::load(&path).unwrap();
    clear_env();

    let key = config.secrets.embedding_api_key.as_ref().unwrap();
    assert_eq!(key.expose(), "from-env");
    assert!(config.secrets.context_api_key.is_none());
    assert!(!format!("{config:?}").contains("from-env"));
}

#[test]
fn validate_accepts_defaults_with_key() {
    valid().validate().unwrap();
}

#[test]
fn validate_requires_embedding_key() {
    let err = Config::default().validate().unwrap_err();
    assert!(err.to_string().contains("QUARRY_EMBEDDING_API_KEY"));
}

#[test]
fn validate_rejects_zero_sizes() {
    let mut config = valid();
    config.embedding.max_batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = valid();
    config.storage.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = valid();
    config.context.batch_size = 0;
    assert!(config.validate().is_err());

    let mut config = valid();
    config.embedding.requests_per_minute = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_inverted_token_bounds() {
    let mut config = valid();
    config.chunker.target_tokens = 2048;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_empty_include_and_unknown_price_model() {
    let mut config = valid();
    config.workspace.include.clear();
    assert!(config.validate().is_err());

    let mut config = valid();
    config.embedding.pricing.insert("giant".into(), 1.0);
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn config_path_resolution() {
    clear_env();
    assert_eq!(
        resolve_config_path(None),
        std::path::PathBuf::from("quarry.toml")
    );
    unsafe { std::env::set_var("QUARRY_CONFIG", "/etc/quarry.toml") };
    assert_eq!(
        resolve_config_path(None),
        std::path::PathBuf::from("/etc/quarry.toml")
    );
    assert_eq!(
        resolve_config_path(Some(Path::new("cli.toml"))),
        std::path::PathBuf::from("cli.toml")
    );
    clear_env();
}
