use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// ConfigFile — deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    #[serde(default)]
    pub viewer: ViewerConfigFile,
    #[serde(default)]
    pub cache: CacheConfigFile,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub scroll_step: Option<u32>,
    pub frame_budget_ms: Option<u64>,
    /// How many terminal rows of scrolling advance the animation by one frame.
    pub rows_per_frame: Option<u32>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CacheConfigFile {
    pub capacity: Option<usize>,
    pub load_concurrency: Option<usize>,
    pub first_batch: Option<usize>,
}

// ---------------------------------------------------------------------------
// Config — resolved (all fields concrete)
// ---------------------------------------------------------------------------

pub struct Config {
    pub viewer: ViewerConfig,
    pub cache: CacheConfig,
}

pub struct ViewerConfig {
    pub scroll_step: u32,
    pub frame_budget: Duration,
    pub rows_per_frame: u32,
}

pub struct CacheConfig {
    /// Decoded frames kept in memory at once.
    pub capacity: usize,
    /// Fetch workers / outstanding loads.
    pub load_concurrency: usize,
    /// Frames loaded eagerly before the first draw.
    pub first_batch: usize,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, rows_per_frame: Option<u32>, concurrency: Option<usize>) {
        if let Some(v) = rows_per_frame {
            debug!("config: CLI override rows_per_frame={v}");
            self.viewer.rows_per_frame = rows_per_frame;
        }
        if let Some(v) = concurrency {
            debug!("config: CLI override load_concurrency={v}");
            self.cache.load_concurrency = concurrency;
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Config {
        let config = Config {
            viewer: ViewerConfig {
                scroll_step: self.viewer.scroll_step.unwrap_or(3),
                frame_budget: Duration::from_millis(self.viewer.frame_budget_ms.unwrap_or(32)),
                rows_per_frame: self.viewer.rows_per_frame.unwrap_or(2).max(1),
            },
            cache: CacheConfig {
                capacity: self.cache.capacity.unwrap_or(80).max(1),
                load_concurrency: self.cache.load_concurrency.unwrap_or(3).clamp(1, 16),
                first_batch: self.cache.first_batch.unwrap_or(10),
            },
        };
        info!(
            "config: resolved scroll_step={}, frame_budget={}ms, rows_per_frame={}, \
             capacity={}, load_concurrency={}, first_batch={}",
            config.viewer.scroll_step,
            config.viewer.frame_budget.as_millis(),
            config.viewer.rows_per_frame,
            config.cache.capacity,
            config.cache.load_concurrency,
            config.cache.first_batch,
        );
        config
    }
}

/// Resolve the XDG config path for flipbook.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("flipbook").join("config.toml"))
}

/// Load config file. Returns `ConfigFile::default()` if no file exists.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
            return Ok(ConfigFile::default());
        }
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}
