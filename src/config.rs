use std::path::PathBuf;

use anyhow::Result;
use config::Config;
use serde::Deserialize;

/// Runtime configuration. Every field has a default and can be overridden
/// via an `RU_`-prefixed environment variable, e.g. `RU_DB_PATH`.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Base URL the dated bulletin PDFs hang off of.
    pub base_url: String,
    pub db_path: PathBuf,
    /// Directory for raw PDF bytes, keyed by filename derived from the URL.
    pub cache_dir: PathBuf,
    /// Name of the environment variable holding the provider API key.
    pub api_key_env: String,
    pub text_model: String,
    pub image_model: String,
    /// Character budget for extracted text handed to the model.
    pub max_chars: usize,
    /// Approximate word budget for the citizen summary.
    pub max_summary_words: usize,
    pub max_glossary_entries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ru.muenchen.de/pdf".into(),
            db_path: "data/umschau.sqlite".into(),
            cache_dir: "data/pdf".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            text_model: "gemini-2.5-flash".into(),
            image_model: "gemini-2.5-flash-image".into(),
            max_chars: 25_000,
            max_summary_words: 200,
            max_glossary_entries: 5,
        }
    }
}

impl PipelineConfig {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let cfg = Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("db_path", defaults.db_path.to_string_lossy().to_string())?
            .set_default("cache_dir", defaults.cache_dir.to_string_lossy().to_string())?
            .set_default("api_key_env", defaults.api_key_env)?
            .set_default("text_model", defaults.text_model)?
            .set_default("image_model", defaults.image_model)?
            .set_default("max_chars", defaults.max_chars as i64)?
            .set_default("max_summary_words", defaults.max_summary_words as i64)?
            .set_default("max_glossary_entries", defaults.max_glossary_entries as i64)?
            .add_source(config::Environment::with_prefix("RU"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PipelineConfig::default();
        assert!(cfg.base_url.starts_with("https://"));
        assert_eq!(cfg.max_chars, 25_000);
        assert_eq!(cfg.api_key_env, "GEMINI_API_KEY");
    }
}
