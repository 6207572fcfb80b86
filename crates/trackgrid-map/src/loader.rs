use crate::chunk::{ChunkKey, VectorChunk, XCOUNT, YCOUNT};
use crate::config::{LoaderConfig, SourceConfig};
use crate::coordinates::GridCoordinates;
use crate::error::{GridError, GridResult, TransportError};

use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// The parameters of one chunk fetch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkRequest {
    pub key: ChunkKey,
    pub xmin: f64,
    pub xcount: i32,
    pub xdelta: f64,
    pub ymin: f64,
    pub ycount: i32,
    pub ydelta: f64,
}

impl ChunkRequest {
    pub fn new(coords: &GridCoordinates, key: ChunkKey) -> Self {
        let origin = coords.chunk_origin(key).0;
        Self {
            key,
            xmin: origin.x,
            xcount: XCOUNT,
            xdelta: coords.spacing.x,
            ymin: origin.y,
            ycount: YCOUNT,
            ydelta: coords.spacing.y,
        }
    }

    /// The query string understood by the grid server.
    pub fn query(&self, token: &str) -> String {
        format!(
            "format=c&xmin={}&xcount={}&xdelta={}&ymin={}&ycount={}&ydelta={}&key={}",
            self.xmin, self.xcount, self.xdelta, self.ymin, self.ycount, self.ydelta, token
        )
    }

    /// Name of the local cache file for this chunk, from its rounded world origin.
    pub fn cache_file_name(&self) -> String {
        format!("g_{}_{}", self.xmin.round() as i64, self.ymin.round() as i64)
    }
}

/// Opens the byte stream for one chunk.
///
/// An `Err` means no data arrived and the attempt may be retried. Failures while reading the returned stream are the
/// caller's problem.
pub trait ChunkTransport: Send + Sync {
    fn open(&self, request: &ChunkRequest) -> Result<Box<dyn Read + Send>, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, key: &str, timeout: Duration) -> GridResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_owned(),
            key: key.to_owned(),
        })
    }

    pub fn url(&self, request: &ChunkRequest) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.base_url, separator, request.query(&self.key))
    }
}

impl ChunkTransport for HttpTransport {
    fn open(&self, request: &ChunkRequest) -> Result<Box<dyn Read + Send>, TransportError> {
        let url = self.url(request);
        let parsed = Url::parse(&url).map_err(|e| TransportError::MalformedUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let response = self
            .client
            .get(parsed)
            .send()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(TransportError::NotFound(url)),
            status if !status.is_success() => {
                Err(TransportError::Unreachable(format!("{} returned {}", url, status)))
            }
            _ => Ok(Box::new(response)),
        }
    }
}

/// Serves chunks from a directory of flat files named by [`ChunkRequest::cache_file_name`].
pub struct FileTransport {
    dir: PathBuf,
}

impl FileTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, request: &ChunkRequest) -> PathBuf {
        self.dir.join(request.cache_file_name())
    }

    /// Persists `chunk` where [`FileTransport::open`] will find it.
    pub fn write_chunk(&self, request: &ChunkRequest, chunk: &VectorChunk) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let file = File::create(self.path_for(request))?;
        chunk.write_records(BufWriter::new(file))
    }
}

impl ChunkTransport for FileTransport {
    fn open(&self, request: &ChunkRequest) -> Result<Box<dyn Read + Send>, TransportError> {
        let path = self.path_for(request);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(TransportError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(TransportError::Unreachable(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}

pub fn transport_from_config(config: &SourceConfig) -> GridResult<Arc<dyn ChunkTransport>> {
    Ok(match config {
        SourceConfig::Http {
            base_url,
            key,
            timeout_ms,
        } => Arc::new(HttpTransport::new(
            base_url,
            key,
            Duration::from_millis(*timeout_ms),
        )?),
        SourceConfig::Directory { path } => Arc::new(FileTransport::new(path.clone())),
    })
}

/// Fetches chunks with a bounded number of attempts and a fixed pause after each failure.
pub struct ChunkLoader {
    transport: Arc<dyn ChunkTransport>,
    fallback: Option<FileTransport>,
    max_attempts: u32,
    retry_pause: Duration,
}

impl ChunkLoader {
    pub fn new(transport: Arc<dyn ChunkTransport>, config: &LoaderConfig) -> Self {
        Self {
            transport,
            fallback: config.fallback_dir.clone().map(FileTransport::new),
            max_attempts: config.max_attempts.max(1),
            retry_pause: Duration::from_millis(config.retry_pause_ms),
        }
    }

    /// Loads the chunk for `request`.
    ///
    /// `Ok(None)` means every source gave up before sending data; the caller substitutes the zero chunk. A stream that
    /// breaks after it opened is an `Err` and is never retried. `cancel` is checked before each attempt.
    pub fn load(
        &self,
        request: &ChunkRequest,
        cancel: Option<&AtomicBool>,
    ) -> GridResult<Option<VectorChunk>> {
        let key = request.key;
        let mut exhausted = true;
        for attempt in 1..=self.max_attempts {
            if cancel.map_or(false, |c| c.load(Ordering::Acquire)) {
                return Err(GridError::Cancelled(key));
            }
            match self.transport.open(request) {
                Ok(stream) => return read_chunk(key, stream).map(Some),
                Err(e) if !e.is_retryable() => {
                    log::debug!("No data for chunk {:?}: {}", key, e);
                    exhausted = false;
                    break;
                }
                Err(e) => {
                    log::warn!(
                        "Attempt {}/{} for chunk {:?} failed: {}",
                        attempt,
                        self.max_attempts,
                        key,
                        e
                    );
                    thread::sleep(self.retry_pause);
                }
            }
        }

        if let Some(fallback) = self.fallback.as_ref() {
            match fallback.open(request) {
                Ok(stream) => {
                    log::info!("Chunk {:?} served from {}", key, fallback.dir().display());
                    return read_chunk(key, stream).map(Some);
                }
                Err(e) => log::debug!("No cached copy of chunk {:?}: {}", key, e),
            }
        }

        if exhausted {
            log::error!(
                "Giving up on chunk {:?} after {} attempts; substituting zero data",
                key,
                self.max_attempts
            );
        }
        Ok(None)
    }
}

fn read_chunk(key: ChunkKey, stream: Box<dyn Read + Send>) -> GridResult<VectorChunk> {
    VectorChunk::read_records(stream).map_err(|source| GridError::Stream { key, source })
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
