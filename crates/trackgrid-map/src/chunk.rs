use crate::units::CellUnits;

use ndshape::{ConstShape, ConstShape2u32};
use std::io::{self, Read, Write};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use trackgrid_core::glam::{DVec3, IVec2};
use trackgrid_core::static_assertions::const_assert_eq;

/// Samples per chunk along the x axis.
pub const XCOUNT: i32 = 20;
/// Samples per chunk along the y axis.
pub const YCOUNT: i32 = 10;

/// The standard 2D array shape for chunks.
pub type ChunkShape = ConstShape2u32<20, 10>;
const_assert_eq!(ChunkShape::SIZE, (XCOUNT * YCOUNT) as u32);
pub const CHUNK_SIZE: usize = (XCOUNT * YCOUNT) as usize;
pub const CHUNK_SHAPE_IVEC2: IVec2 = IVec2::new(XCOUNT, YCOUNT);

/// Largest magnitude of a grid index the store will address. Keeps chunk keys, their neighbours and the `+ 1` corners of
/// a cell inside `i32`.
pub const MAX_INDEX: i32 = i32::MAX / 2;

/// `true` if both components of `cell` are within [`MAX_INDEX`] of zero.
pub fn is_addressable(cell: CellUnits<IVec2>) -> bool {
    let CellUnits(p) = cell;
    p.cmpge(IVec2::splat(-MAX_INDEX)).all() && p.cmple(IVec2::splat(MAX_INDEX)).all()
}

/// Bytes in one serialized vector record: three big-endian `f64`s.
pub const RECORD_BYTES: usize = 24;

/// Identifies a chunk by the grid index of its first sample.
///
/// Chunk boundaries are offset by half a chunk, so the chunk containing index `i` on an axis of `COUNT` samples starts at
/// `floor((i + COUNT / 2) / COUNT) * COUNT - COUNT / 2` and covers `[start, start + COUNT)`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
}

impl ChunkKey {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The key of the chunk that holds the sample at `cell`.
    pub fn containing(cell: CellUnits<IVec2>) -> Self {
        let CellUnits(p) = cell;
        Self::new(chunk_base(p.x, XCOUNT), chunk_base(p.y, YCOUNT))
    }

    /// The first sample index covered by this chunk.
    pub fn minimum(&self) -> CellUnits<IVec2> {
        CellUnits(IVec2::new(self.x, self.y))
    }

    /// Offset of `cell` relative to the first sample of this chunk. Only meaningful when this chunk contains `cell`.
    pub fn local_offset(&self, cell: CellUnits<IVec2>) -> IVec2 {
        cell.0 - self.minimum().0
    }

    pub fn contains(&self, cell: CellUnits<IVec2>) -> bool {
        let offset = self.local_offset(cell);
        offset.cmpge(IVec2::ZERO).all() && offset.cmplt(CHUNK_SHAPE_IVEC2).all()
    }

    /// The key of the chunk `chunks` chunks away from this one.
    pub fn neighbor(&self, chunks: IVec2) -> Self {
        Self::new(self.x + chunks.x * XCOUNT, self.y + chunks.y * YCOUNT)
    }
}

fn chunk_base(index: i32, count: i32) -> i32 {
    let (index, count) = (i64::from(index), i64::from(count));
    let base = (index + count / 2).div_euclid(count) * count - count / 2;
    // Only indices near the ends of the `i32` range, which are not addressable, need clamping.
    base.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// A fixed-size block of sample directions, immutable once loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorChunk {
    vectors: Box<[DVec3]>,
}

/// The chunk stream ended or failed after `records` complete records.
#[derive(Debug, Error)]
#[error("chunk stream failed after {records} of {} records: {source}", CHUNK_SIZE)]
pub struct RecordError {
    pub records: usize,
    #[source]
    pub source: io::Error,
}

impl VectorChunk {
    /// Samples must be given in linear [`ChunkShape`] order.
    pub fn from_vectors(vectors: Vec<DVec3>) -> Self {
        assert_eq!(vectors.len(), CHUNK_SIZE);
        Self {
            vectors: vectors.into_boxed_slice(),
        }
    }

    /// Builds a chunk by evaluating `f` at every local offset.
    pub fn from_fn(mut f: impl FnMut(IVec2) -> DVec3) -> Self {
        let mut vectors = vec![DVec3::ZERO; CHUNK_SIZE];
        for y in 0..YCOUNT {
            for x in 0..XCOUNT {
                vectors[linearize(IVec2::new(x, y))] = f(IVec2::new(x, y));
            }
        }
        Self::from_vectors(vectors)
    }

    fn zeroed() -> Self {
        Self::from_vectors(vec![DVec3::ZERO; CHUNK_SIZE])
    }

    #[inline]
    pub fn get(&self, offset: IVec2) -> DVec3 {
        self.vectors[linearize(offset)]
    }

    pub fn vectors(&self) -> &[DVec3] {
        &self.vectors
    }

    /// Deserializes exactly [`CHUNK_SIZE`] records. The x index varies in the outer loop, y in the inner loop.
    pub fn read_records(mut reader: impl Read) -> Result<Self, RecordError> {
        let mut vectors = vec![DVec3::ZERO; CHUNK_SIZE];
        let mut records = 0;
        let mut buf = [0; RECORD_BYTES];
        for x in 0..XCOUNT {
            for y in 0..YCOUNT {
                reader
                    .read_exact(&mut buf)
                    .map_err(|source| RecordError { records, source })?;
                vectors[linearize(IVec2::new(x, y))] = decode_record(&buf);
                records += 1;
            }
        }
        Ok(Self::from_vectors(vectors))
    }

    /// Serializes all records in the same order [`VectorChunk::read_records`] expects.
    pub fn write_records(&self, mut writer: impl Write) -> io::Result<()> {
        for x in 0..XCOUNT {
            for y in 0..YCOUNT {
                writer.write_all(&encode_record(self.get(IVec2::new(x, y))))?;
            }
        }
        writer.flush()
    }
}

/// The placeholder handed out whenever a chunk cannot be fetched. There is exactly one instance per process.
pub fn zero_chunk() -> Arc<VectorChunk> {
    static ZERO_CHUNK: OnceLock<Arc<VectorChunk>> = OnceLock::new();
    ZERO_CHUNK
        .get_or_init(|| Arc::new(VectorChunk::zeroed()))
        .clone()
}

pub fn is_zero_chunk(chunk: &Arc<VectorChunk>) -> bool {
    Arc::ptr_eq(chunk, &zero_chunk())
}

#[inline]
pub(crate) fn linearize(offset: IVec2) -> usize {
    debug_assert!(offset.cmpge(IVec2::ZERO).all() && offset.cmplt(CHUNK_SHAPE_IVEC2).all());
    ChunkShape::linearize([offset.x as u32, offset.y as u32]) as usize
}

fn decode_record(buf: &[u8; RECORD_BYTES]) -> DVec3 {
    let mut c = [0.0; 3];
    for (i, c) in c.iter_mut().enumerate() {
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&buf[8 * i..8 * (i + 1)]);
        *c = f64::from_be_bytes(bytes);
    }
    DVec3::from_array(c)
}

fn encode_record(v: DVec3) -> [u8; RECORD_BYTES] {
    let mut buf = [0; RECORD_BYTES];
    for (i, c) in v.to_array().iter().enumerate() {
        buf[8 * i..8 * (i + 1)].copy_from_slice(&c.to_be_bytes());
    }
    buf
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
