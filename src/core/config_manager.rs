use crate::app::config::FitadsConfig;
use anyhow::{Error, anyhow};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Owns the config file location and the last successfully
/// loaded config. A failed reload keeps the previous config
pub struct ConfigManager {
    path: PathBuf,
    cfg: RwLock<Option<Arc<FitadsConfig>>>,
}

impl ConfigManager {
    pub fn new(cfg_path: PathBuf) -> ConfigManager {
        ConfigManager {
            path: cfg_path,
            cfg: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads and validates the config file
    pub fn reload(&self) -> Result<Arc<FitadsConfig>, Error> {
        let cfg = Arc::new(FitadsConfig::load(&self.path)?);
        *self.cfg.write() = Some(cfg.clone());

        info!("Loaded config from {}", self.path.display());

        Ok(cfg)
    }

    /// The current config, erroring if nothing was loaded yet
    pub fn get(&self) -> Result<Arc<FitadsConfig>, Error> {
        self.cfg
            .read()
            .clone()
            .ok_or_else(|| anyhow!("config {} not loaded yet", self.path.display()))
    }
}
