//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys are addressed with `__` in env names (`APP_RETRIEVAL__MAX_EVIDENCE`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::SourceId;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`Config::load`] but looks for the TOML files under `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of the whole configuration; every field has a default.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if let "prod" | "production" = env {
            let settings = self.settings()?;
            if settings.judge.models.is_empty() {
                anyhow::bail!("judge.models must not be empty in production");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub judge: JudgeSettings,
    pub batch: BatchSettings,
    pub sources: Vec<SourceSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data: DataSettings::default(),
            chunking: ChunkingSettings::default(),
            embedding: EmbeddingSettings::default(),
            retrieval: RetrievalSettings::default(),
            judge: JudgeSettings::default(),
            batch: BatchSettings::default(),
            sources: vec![
                SourceSettings {
                    id: SourceId::new("monte_cristo"),
                    title: "The Count of Monte Cristo".to_string(),
                    file: "The Count of Monte Cristo.txt".to_string(),
                    store_dir: "monte_cristo".to_string(),
                    aliases: vec!["Monte Cristo".to_string()],
                },
                SourceSettings {
                    id: SourceId::new("castaways"),
                    title: "In Search of the Castaways".to_string(),
                    file: "In search of the castaways.txt".to_string(),
                    store_dir: "castaways".to_string(),
                    aliases: vec!["Castaways".to_string()],
                },
            ],
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k_per_query == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k_per_query must be > 0".into()));
        }
        if self.retrieval.max_evidence == 0 {
            return Err(Error::InvalidConfig("retrieval.max_evidence must be > 0".into()));
        }
        if self.judge.max_attempts == 0 {
            return Err(Error::InvalidConfig("judge.max_attempts must be > 0".into()));
        }
        for (i, s) in self.sources.iter().enumerate() {
            if s.id.as_str().trim().is_empty() || s.file.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("sources[{i}] needs an id and a file")));
            }
            if self.sources[..i].iter().any(|other| other.id == s.id) {
                return Err(Error::InvalidConfig(format!("duplicate source id '{}'", s.id)));
            }
        }
        Ok(())
    }

    pub fn source(&self, id: &SourceId) -> Option<&SourceSettings> {
        self.sources.iter().find(|s| &s.id == id)
    }

    /// Directory holding the paired artifacts of `source`.
    pub fn store_dir(&self, source: &SourceSettings) -> PathBuf {
        let root = expand_path(&self.data.store_root);
        resolve_with_base(&root, &source.store_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub raw_txt_dir: String,
    pub store_root: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { raw_txt_dir: "./data".to_string(), store_root: "./stores".to_string() }
    }
}

/// Window sizes for the recursive splitter, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl ChunkingSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be > 0".into()));
        }
        if self.chunk_overlap > self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) is larger than chunking.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: String,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: "./models/all-MiniLM-L6-v2".to_string(), max_len: 256, batch_size: 32 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    /// The whole claim is the only query.
    #[default]
    Story,
    /// The claim is split into atomic facts, one query each.
    Facts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k_per_query: usize,
    pub max_evidence: usize,
    pub strategy: RetrievalStrategy,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k_per_query: 3, max_evidence: 10, strategy: RetrievalStrategy::Story }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeSettings {
    /// Base URL of an OpenAI-compatible API (without `/v1`).
    pub endpoint: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    /// Models in priority order.
    pub models: Vec<String>,
    pub max_attempts: usize,
    pub pacing_ms: u64,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            models: vec![
                "qwen/qwen3-32b".to_string(),
                "llama-3.1-8b-instant".to_string(),
                "openai/gpt-oss-120b".to_string(),
                "llama-3.3-70b-versatile".to_string(),
            ],
            max_attempts: 3,
            pacing_ms: 4000,
            retry_backoff_ms: 5000,
            timeout_secs: 60,
            max_tokens: 1000,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub input_csv: String,
    pub output_csv: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { input_csv: "train.csv".to_string(), output_csv: "results.csv".to_string() }
    }
}

/// One reference document and the store built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub id: SourceId,
    pub title: String,
    /// File name of the document as produced by the loader.
    pub file: String,
    /// Store directory, relative to `data.store_root` unless absolute.
    pub store_dir: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
