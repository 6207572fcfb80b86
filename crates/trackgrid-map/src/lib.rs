//! The trackgrid data model.
//!
//! # Samples
//!
//! A grid is a lattice of unit vectors (directions on the sphere) indexed by integer `(i, j)`. Sample `(i, j)` is
//! displayed at world position `origin + (i, j) * spacing`. Samples are fetched from a grid server in fixed
//! [`XCOUNT`](crate::XCOUNT) x [`YCOUNT`](crate::YCOUNT) [`VectorChunk`](crate::VectorChunk)s. Chunk boundaries are offset by
//! half a chunk from the origin, so index `0` sits in the middle of its chunk rather than on an edge.
//!
//! A chunk that cannot be fetched is replaced with one shared all-zero chunk. Zero samples are never valid directions, so
//! they mark missing data wherever they show up.
//!
//! # Cells
//!
//! Four neighbouring samples bound a [`Cell`](crate::Cell), a quadrilateral of great-circle arcs. Cells answer which
//! fraction of the way across the cell a direction is ([`Cell::uninterpolate`](crate::Cell::uninterpolate)) and how far the
//! cell extends in longitude and latitude, including cells that straddle the 0/360 seam or contain a pole.
//!
//! # Stores
//!
//! A [`GridStore`](crate::GridStore) caches chunks and cells for one dataset and projection. Stores are handed out by a
//! caller-owned [`GridRegistry`](crate::GridRegistry), and a [`PrefetchPool`](crate::PrefetchPool) can warm them in the
//! background.

mod cell;
mod chunk;
mod config;
mod coordinates;
mod error;
mod loader;
mod prefetch;
mod projection;
mod registry;
mod slot;
mod store;
mod units;

pub use cell::*;
pub use chunk::*;
pub use config::*;
pub use coordinates::*;
pub use error::*;
pub use loader::*;
pub use prefetch::*;
pub use projection::*;
pub use registry::*;
pub use store::*;
pub use units::*;
