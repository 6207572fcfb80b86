use crate::projection::ProjectionConfig;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct GridConfig {
    /// World position of grid sample `(0, 0)`.
    pub origin: [f64; 2],
    /// World distance between adjacent samples on each axis.
    pub spacing: [f64; 2],
    pub source: SourceConfig,
    pub loader: LoaderConfig,
    pub projection: ProjectionConfig,
    /// [`GridStore::min_y`](crate::GridStore::min_y) and [`GridStore::max_y`](crate::GridStore::max_y) look for the first
    /// row whose sample latitude reaches this magnitude.
    pub latitude_limit_deg: f64,
    /// How many rows the latitude scan may visit before giving up.
    pub latitude_scan_rows: i32,
    pub prefetch: PrefetchConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            origin: [0.0, 0.0],
            spacing: [400.0, 20.0],
            source: SourceConfig::default(),
            loader: LoaderConfig::default(),
            projection: ProjectionConfig::default(),
            latitude_limit_deg: 80.0,
            latitude_scan_rows: 1000,
            prefetch: PrefetchConfig::default(),
        }
    }
}

/// Where chunks come from.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum SourceConfig {
    /// A grid server queried with `format=c&xmin=...&key=...`.
    Http {
        base_url: String,
        /// Authorization token sent as the `key` parameter.
        key: String,
        timeout_ms: u64,
    },
    /// A directory of chunk files written by `grid-export`.
    Directory { path: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Http {
            base_url: "http://localhost:8080/grid".to_owned(),
            key: String::new(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Attempts per chunk before falling back.
    pub max_attempts: u32,
    /// Pause after each failed attempt.
    pub retry_pause_ms: u64,
    /// Directory of previously exported chunks to try once the source gives up.
    pub fallback_dir: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            retry_pause_ms: 100,
            fallback_dir: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub num_threads: usize,
    /// The maximum number of pending prefetch requests.
    pub max_pending: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            num_threads: 2,
            max_pending: 64,
        }
    }
}
