use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::retry::{RandomJitter, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    pub url: String,
    pub anon_key: String,
    pub schema: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Upload {
    pub endpoint: String,
    pub cdn_base: String,
    pub max_size: u32,
    pub quality: f32,
}

/// Media array limits. Reads keep at most `read_cap` URLs per drop while
/// writes accept up to `write_cap`; the composer attaches `composer_max_files`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MediaLimits {
    pub read_cap: usize,
    pub write_cap: usize,
    pub composer_max_files: usize,
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self {
            read_cap: 3,
            write_cap: 10,
            composer_max_files: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retry {
    pub attempts: u32,
    pub base_ms: u64,
    pub jitter_ms: u64,
}

impl Retry {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts,
            Duration::from_millis(self.base_ms),
            Arc::new(RandomJitter {
                max: Duration::from_millis(self.jitter_ms),
            }),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub backend: Backend,
    pub upload: Upload,
    pub media: MediaLimits,
    pub retry: Retry,
}

const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("OMD_BACKEND_URL", "backend.url"),
    ("OMD_ANON_KEY", "backend.anon_key"),
    ("OMD_SCHEMA", "backend.schema"),
    ("OMD_UPLOAD_ENDPOINT", "upload.endpoint"),
    ("OMD_CDN_BASE", "upload.cdn_base"),
];

impl Settings {
    /// Load `omd.toml` from the working directory (if any), then apply
    /// `OMD_*` environment overrides. `.env` is read first.
    pub fn new() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load(Some(Path::new("omd.toml")), |key| std::env::var(key).ok())
    }

    /// Build settings from an optional file and an environment lookup.
    pub fn load(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("backend.url", "http://localhost:54321")?
            .set_default("backend.anon_key", "")?
            .set_default("backend.schema", "omd")?
            .set_default("upload.endpoint", "http://localhost:8787/upload")?
            .set_default("upload.cdn_base", "http://localhost:8787")?
            .set_default("upload.max_size", 1280)?
            .set_default("upload.quality", 0.82)?
            .set_default("media.read_cap", 3)?
            .set_default("media.write_cap", 10)?
            .set_default("media.composer_max_files", 3)?
            .set_default("retry.attempts", 3)?
            .set_default("retry.base_ms", 250)?
            .set_default("retry.jitter_ms", 120)?;

        if let Some(path) = file {
            let path = PathBuf::from(path);
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        // Environment variables have the highest priority
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = env(var).filter(|v| !v.trim().is_empty()) {
                builder = builder.set_override(*key, value)?;
            }
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.upload.quality) {
            return Err(ConfigError::Message(format!(
                "upload.quality must be between 0 and 1, got {}",
                self.upload.quality
            )));
        }
        if self.upload.max_size == 0 {
            return Err(ConfigError::Message("upload.max_size must be positive".into()));
        }
        Ok(())
    }
}
