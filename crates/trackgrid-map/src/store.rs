use crate::cell::{Cell, SphericalRange};
use crate::chunk::{is_addressable, linearize, zero_chunk, ChunkKey, VectorChunk, CHUNK_SIZE};
use crate::config::GridConfig;
use crate::coordinates::{GridCoordinates, WorldRect};
use crate::error::{GridError, GridResult};
use crate::loader::{transport_from_config, ChunkLoader, ChunkRequest};
use crate::projection::ViewProjection;
use crate::slot::SlotMap;
use crate::units::*;

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use trackgrid_core::geometry::SphereVector;
use trackgrid_core::glam::{DVec2, DVec3, IVec2};
use trackgrid_core::ilattice::prelude::Extent;

/// Lazily built cells for the indices covered by one chunk key.
struct CellChunk {
    cells: Box<[OnceLock<Option<Arc<Cell>>>]>,
}

impl CellChunk {
    fn new() -> Self {
        Self {
            cells: (0..CHUNK_SIZE).map(|_| OnceLock::new()).collect(),
        }
    }

    fn slot(&self, key: ChunkKey, cell: CellUnits<IVec2>) -> &OnceLock<Option<Arc<Cell>>> {
        let offset = key.local_offset(cell);
        &self.cells[linearize(offset)]
    }
}

/// A sparse, lazily populated grid of sample directions, and the cells between them.
///
/// Sample chunks are fetched through a [`ChunkLoader`] the first time any index in them is needed and kept for the life
/// of the store. A chunk that cannot be fetched is replaced with the shared [`zero_chunk`], and cells touching it are
/// dead (`None`).
pub struct GridStore {
    coords: GridCoordinates,
    loader: ChunkLoader,
    projection: Arc<dyn ViewProjection>,
    chunks: SlotMap<Arc<VectorChunk>>,
    cells: SlotMap<Arc<CellChunk>>,
    latitude_limit_deg: f64,
    latitude_scan_rows: i32,
}

impl GridStore {
    pub fn new(
        coords: GridCoordinates,
        loader: ChunkLoader,
        projection: Arc<dyn ViewProjection>,
    ) -> Self {
        let defaults = GridConfig::default();
        Self {
            coords,
            loader,
            projection,
            chunks: SlotMap::default(),
            cells: SlotMap::default(),
            latitude_limit_deg: defaults.latitude_limit_deg,
            latitude_scan_rows: defaults.latitude_scan_rows,
        }
    }

    pub fn from_config(config: &GridConfig) -> GridResult<Self> {
        let spacing = DVec2::from_array(config.spacing);
        if !spacing.cmpgt(DVec2::ZERO).all() {
            return Err(GridError::Config(format!(
                "spacing must be positive, got {:?}",
                config.spacing
            )));
        }
        let projection = config.projection.build()?;
        let transport = transport_from_config(&config.source)?;

        let mut store = Self::new(
            GridCoordinates::new(DVec2::from_array(config.origin), spacing),
            ChunkLoader::new(transport, &config.loader),
            Arc::new(projection),
        );
        store.latitude_limit_deg = config.latitude_limit_deg;
        store.latitude_scan_rows = config.latitude_scan_rows;
        Ok(store)
    }

    /// Replaces the projection used for [`GridStore::cell_world_range`].
    pub fn with_projection(mut self, projection: Arc<dyn ViewProjection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_latitude_scan(mut self, limit_deg: f64, max_rows: i32) -> Self {
        self.latitude_limit_deg = limit_deg;
        self.latitude_scan_rows = max_rows;
        self
    }

    pub fn coordinates(&self) -> &GridCoordinates {
        &self.coords
    }

    pub fn projection(&self) -> &dyn ViewProjection {
        &*self.projection
    }

    /// The chunk at `key`, fetching it on first use.
    pub fn chunk(&self, key: ChunkKey) -> GridResult<Arc<VectorChunk>> {
        self.chunk_with_cancel(key, None)
    }

    /// Same as [`GridStore::chunk`], giving up with [`GridError::Cancelled`] if `cancel` is set before a fetch attempt.
    pub fn chunk_with_cancel(
        &self,
        key: ChunkKey,
        cancel: Option<&AtomicBool>,
    ) -> GridResult<Arc<VectorChunk>> {
        self.chunks.get_or_try_insert_with(key, || {
            log::debug!("Chunk {:?} not cached; fetching", key);
            let request = ChunkRequest::new(&self.coords, key);
            Ok(match self.loader.load(&request, cancel)? {
                Some(chunk) => Arc::new(chunk),
                None => zero_chunk(),
            })
        })
    }

    /// The chunk at `key` only if it is already cached.
    pub fn cached_chunk(&self, key: ChunkKey) -> Option<Arc<VectorChunk>> {
        self.chunks.get(key)
    }

    pub fn num_cached_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// The sample direction at grid index `(i, j)`. Zero if its chunk could not be fetched.
    pub fn grid_data(&self, i: i32, j: i32) -> GridResult<DVec3> {
        let cell = addressable(i, j)?;
        let key = ChunkKey::containing(cell);
        Ok(self.chunk(key)?.get(key.local_offset(cell)))
    }

    /// The cell whose south-west corner is sample `(i, j)`, or `None` if any of its corners is missing.
    pub fn cell(&self, i: i32, j: i32) -> GridResult<Option<Arc<Cell>>> {
        let cell = addressable(i, j)?;
        let key = ChunkKey::containing(cell);
        let cell_chunk = self
            .cells
            .get_or_try_insert_with::<GridError>(key, || Ok(Arc::new(CellChunk::new())))?;

        let slot = cell_chunk.slot(key, cell);
        if let Some(built) = slot.get() {
            return Ok(built.clone());
        }

        let sw = self.grid_data(i, j)?;
        let se = self.grid_data(i + 1, j)?;
        let ne = self.grid_data(i + 1, j + 1)?;
        let nw = self.grid_data(i, j + 1)?;
        let built = Cell::new(sw, se, ne, nw).map(Arc::new);

        Ok(slot.get_or_init(|| built).clone())
    }

    /// The cell spanning every row of `range`, which must be exactly one cell wide.
    ///
    /// A single-row range yields the ordinary cell. Taller ranges stack the bottom and top cells, keeping the bottom
    /// cell's east and west walls. `None` if the range is empty or a constituent cell is dead.
    pub fn super_cell(&self, range: CellUnits<Extent<IVec2>>) -> GridResult<Option<Arc<Cell>>> {
        let CellUnits(extent) = range;
        if extent.shape.x != 1 {
            log::error!(
                "Refusing super cell {:?}: it is {} cells wide, only single columns can be merged",
                extent,
                extent.shape.x
            );
            return Err(GridError::SuperCellTooWide {
                extent,
                width: extent.shape.x,
            });
        }
        if extent.shape.y <= 0 {
            return Ok(None);
        }

        let min = extent.minimum;
        let max = extent.max();
        let bottom = match self.cell(min.x, min.y)? {
            Some(cell) => cell,
            None => return Ok(None),
        };
        if min.y == max.y {
            return Ok(Some(bottom));
        }
        let top = match self.cell(min.x, max.y)? {
            Some(cell) => cell,
            None => return Ok(None),
        };
        Ok(Cell::merge_vertical(&bottom, &top).map(Arc::new))
    }

    /// Bounding box of cell `(i, j)` in this store's world coordinates.
    pub fn cell_world_range(&self, i: i32, j: i32) -> GridResult<Option<SphericalRange>> {
        Ok(self
            .cell(i, j)?
            .map(|cell| cell.world_range(&*self.projection)))
    }

    pub fn cell_point(&self, p: WorldUnits<DVec2>) -> CellUnits<IVec2> {
        self.coords.cell_point(p)
    }

    pub fn cell_offset(&self, p: WorldUnits<DVec2>) -> DVec2 {
        self.coords.cell_offset(p)
    }

    pub fn cell_offset_in(&self, p: WorldUnits<DVec2>, cell: CellUnits<IVec2>) -> DVec2 {
        self.coords.cell_offset_in(p, cell)
    }

    pub fn world_point(&self, cell: CellUnits<IVec2>, offset: Option<DVec2>) -> WorldUnits<DVec2> {
        self.coords.world_point(cell, offset)
    }

    pub fn cell_range(&self, rect: WorldUnits<WorldRect>) -> CellUnits<Extent<IVec2>> {
        self.coords.cell_range(rect)
    }

    /// The first row at or below row zero whose column-zero sample is at or south of the latitude limit.
    ///
    /// `None` if no such row is found within the configured number of rows.
    pub fn min_y(&self) -> GridResult<Option<i32>> {
        let limit = -self.latitude_limit_deg;
        self.scan_rows(-1, |lat| lat <= limit)
    }

    /// The first row at or above row zero whose column-zero sample is at or north of the latitude limit.
    pub fn max_y(&self) -> GridResult<Option<i32>> {
        let limit = self.latitude_limit_deg;
        self.scan_rows(1, |lat| lat >= limit)
    }

    fn scan_rows(&self, step: i32, crossed: impl Fn(f64) -> bool) -> GridResult<Option<i32>> {
        for row in 0..self.latitude_scan_rows {
            let j = row * step;
            let v = self.grid_data(0, j)?;
            if !v.is_null() && crossed(v.lat_deg()) {
                return Ok(Some(j));
            }
        }
        Ok(None)
    }
}

fn addressable(i: i32, j: i32) -> GridResult<CellUnits<IVec2>> {
    let cell = CellUnits(IVec2::new(i, j));
    if !is_addressable(cell) {
        return Err(GridError::OutOfRange(cell.0));
    }
    Ok(cell)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
