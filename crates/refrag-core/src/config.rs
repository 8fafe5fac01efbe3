//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `refrag.toml` + `refrag.<env>.toml`
//! + `REFRAG_*` env vars. Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Every tunable of the retrieval pipeline, enumerated once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Chunk budget in word tokens.
    pub chunk_size: usize,
    /// Trailing words of the previous chunk carried into the next one.
    pub chunk_overlap: usize,
    /// Candidates requested from vector search.
    pub top_k_retrieval: usize,
    /// Highest-ranked candidates kept verbatim by the compressor.
    pub top_k_keep_full: usize,
    /// Target summary length as a fraction of the original chunk length.
    pub compression_ratio: f64,
    /// Weight of the dense score in the fused score.
    pub fusion_alpha: f32,
    /// Placeholder price per token used only for relative cost comparisons.
    pub cost_per_token: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
            top_k_retrieval: 10,
            top_k_keep_full: 3,
            compression_ratio: 0.1,
            fusion_alpha: 0.7,
            cost_per_token: 0.000_001,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k_retrieval == 0 {
            return Err(Error::InvalidConfig("top_k_retrieval must be positive".into()));
        }
        if !(self.compression_ratio > 0.0 && self.compression_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!("compression_ratio must be in (0, 1], got {}", self.compression_ratio)));
        }
        if !(0.0..=1.0).contains(&self.fusion_alpha) {
            return Err(Error::InvalidConfig(format!("fusion_alpha must be in [0, 1], got {}", self.fusion_alpha)));
        }
        if !self.cost_per_token.is_finite() || self.cost_per_token < 0.0 {
            return Err(Error::InvalidConfig(format!("cost_per_token must be a non-negative number, got {}", self.cost_per_token)));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Defaults {
    pipeline: PipelineConfig,
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

/// Corpus directory used when `data.txt_dir` is not configured.
pub const DEFAULT_TXT_DIR: &str = "data/txt";

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    /// Load with `refrag.toml` files looked up in `dir`.
    pub fn load_from(dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Defaults { pipeline: PipelineConfig::default() }))
            .merge(Toml::file(dir.join("refrag.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("refrag.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("refrag.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("refrag.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("REFRAG_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.pipeline()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// `data.txt_dir`, resolved against the directory the config was loaded from.
    pub fn data_dir(&self) -> PathBuf {
        let dir = self.get::<String>("data.txt_dir").unwrap_or_else(|_| DEFAULT_TXT_DIR.to_string());
        resolve_with_base(&self.base_dir, dir)
    }

    pub fn pipeline(&self) -> Result<PipelineConfig> {
        let pipeline: PipelineConfig = self.get("pipeline")?;
        pipeline.validate()?;
        Ok(pipeline)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
