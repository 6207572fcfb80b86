use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use trackgrid_map::{
    GridConfig, GridError, GridRegistry, GridResult, GridStore, ObliqueCylindrical, StoreKey, ViewProjection,
};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Names the dataset in [`StoreKey`]s, so stores for different datasets are never shared.
    pub dataset: String,
    pub grid: GridConfig,
    /// Where `grid-export` writes chunk files.
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset: "default".to_owned(),
            grid: GridConfig::default(),
            export_dir: PathBuf::from("GRIDS"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

impl Config {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = std::fs::File::open(path)?;

        Ok(ron::de::from_reader(reader)?)
    }

    /// The registry key of the store described by this config.
    pub fn store_key(&self) -> GridResult<StoreKey> {
        Ok(StoreKey {
            dataset: self.dataset.clone(),
            projection: self.grid.projection.build()?.cache_key(),
        })
    }

    /// A registry that builds stores for this config's dataset from its grid settings.
    ///
    /// Each store takes its projection from the requested key, so one registry serves any number of views. Keys naming
    /// another dataset are refused.
    pub fn registry(&self) -> GridRegistry<StoreKey> {
        let dataset = self.dataset.clone();
        let grid = self.grid.clone();
        GridRegistry::new(move |key: &StoreKey| {
            if key.dataset != dataset {
                return Err(GridError::Config(format!(
                    "registry serves dataset {:?}, not {:?}",
                    dataset, key.dataset
                )));
            }
            let projection = ObliqueCylindrical::from_cache_key(&key.projection).ok_or_else(|| {
                GridError::Config(format!("{:?} does not describe a projection", key.projection))
            })?;
            Ok(GridStore::from_config(&grid)?.with_projection(Arc::new(projection)))
        })
    }

    /// Shortcut for a one-off store outside any registry.
    pub fn store(&self) -> GridResult<Arc<GridStore>> {
        GridStore::from_config(&self.grid).map(Arc::new)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
