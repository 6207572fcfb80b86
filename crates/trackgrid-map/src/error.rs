use crate::chunk::{ChunkKey, RecordError};

use std::io;
use thiserror::Error;
use trackgrid_core::glam::IVec2;
use trackgrid_core::ilattice::prelude::Extent;

pub type GridResult<T> = Result<T, GridError>;

/// Failures surfaced to callers of a [`GridStore`](crate::GridStore).
///
/// Connection problems never show up here: they are retried and then papered over with the shared zero chunk.
#[derive(Debug, Error)]
pub enum GridError {
    /// The chunk's byte stream broke after it started. The chunk is not cached, so a later request fetches it again.
    #[error("chunk {key:?} failed mid-stream: {source}")]
    Stream {
        key: ChunkKey,
        #[source]
        source: RecordError,
    },

    /// A super cell must be exactly one cell wide.
    #[error("super cell {extent:?} is {width} cells wide; only single-column merges are supported")]
    SuperCellTooWide { extent: Extent<IVec2>, width: i32 },

    /// The index is outside the addressable range; see [`MAX_INDEX`](crate::MAX_INDEX).
    #[error("grid index {0} is out of range")]
    OutOfRange(IVec2),

    /// A prefetch was cancelled before the chunk arrived.
    #[error("fetch of chunk {0:?} was cancelled")]
    Cancelled(ChunkKey),

    /// The prefetch pool shut down before answering.
    #[error("prefetch worker for chunk {0:?} went away")]
    WorkerGone(ChunkKey),

    #[error("invalid grid configuration: {0}")]
    Config(String),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failure of one fetch attempt, before any chunk data arrived.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The source definitively has no such chunk. Not retried.
    #[error("chunk not found at {0}")]
    NotFound(String),

    /// The request URL could not be built. Counts against the retry budget like any other failed attempt.
    #[error("malformed chunk URL {url:?}: {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("chunk source unreachable: {0}")]
    Unreachable(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::NotFound(_))
    }
}
