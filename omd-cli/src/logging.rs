use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "omd=info,omd_client=info";

/// Logging configuration for the omd CLI
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Master switch
    pub enabled: bool,
    /// Write to this file instead of stderr
    pub log_file: Option<PathBuf>,
    /// Truncate `log_file` before writing
    pub clear_on_startup: bool,
    /// Filter directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_file: None,
            clear_on_startup: false,
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LogConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Only warnings and errors
    pub fn minimal() -> Self {
        Self {
            filter: "omd=warn,omd_client=warn".to_string(),
            ..Default::default()
        }
    }

    /// Everything from our crates, including request tracing
    pub fn verbose() -> Self {
        Self {
            filter: "omd=debug,omd_client=debug".to_string(),
            ..Default::default()
        }
    }

    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    if !config.enabled {
        return Ok(());
    }

    match &config.log_file {
        Some(path) => {
            if config.clear_on_startup {
                File::create(path)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;

            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()?;

            tracing::info!("Logging initialized: file={}", path.display());
        }
        None => {
            tracing_subscriber::registry()
                .with(config.env_filter())
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(!LogConfig::disabled().enabled);
        assert_eq!(LogConfig::default().filter, DEFAULT_FILTER);
        assert!(LogConfig::verbose().filter.contains("debug"));
        assert!(LogConfig::minimal().filter.contains("warn"));
    }

    #[test]
    fn test_disabled_is_noop() {
        init_logging(&LogConfig::disabled()).unwrap();
    }
}
