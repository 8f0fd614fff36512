mod env;
mod types;

#[cfg(test)]
mod tests;

pub use env::{CONTEXT_API_KEY, EMBEDDING_API_KEY};
pub use types::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use quarry_embed::{EmbeddingModel, PriceTable};

pub const DEFAULT_CONFIG_PATH: &str = "quarry.toml";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist. Secrets are only
    /// read from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject configurations that cannot run.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secrets.embedding_api_key.is_none() {
            bail!("{EMBEDDING_API_KEY} is not set");
        }
        if self.embedding.max_batch_size == 0 {
            bail!("embedding.max_batch_size must be at least 1");
        }
        if self.embedding.requests_per_minute == 0 {
            bail!("embedding.requests_per_minute must be at least 1");
        }
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be at least 1");
        }
        if self.context.batch_size == 0 {
            bail!("context.batch_size must be at least 1");
        }
        if self.storage.batch_size == 0 {
            bail!("storage.batch_size must be at least 1");
        }
        if self.chunker.target_tokens == 0 || self.chunker.target_tokens > self.chunker.max_tokens
        {
            bail!(
                "chunker.target_tokens ({}) must be between 1 and chunker.max_tokens ({})",
                self.chunker.target_tokens,
                self.chunker.max_tokens
            );
        }
        if self.workspace.include.is_empty() {
            bail!("workspace.include must list at least one pattern");
        }
        for key in self.embedding.pricing.keys() {
            key.parse::<EmbeddingModel>()
                .map_err(|e| anyhow::anyhow!("embedding.pricing: {e}"))?;
        }
        Ok(())
    }

    /// Published prices with the configured overrides applied.
    #[must_use]
    pub fn price_table(&self) -> PriceTable {
        self.embedding
            .pricing
            .iter()
            .fold(PriceTable::default(), |table, (name, price)| {
                match name.parse::<EmbeddingModel>() {
                    Ok(model) => table.with_price(model, *price),
                    Err(e) => {
                        tracing::warn!("ignoring price override: {e}");
                        table
                    }
                }
            })
    }
}

/// `--config` argument, then `QUARRY_CONFIG`, then `quarry.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("QUARRY_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
