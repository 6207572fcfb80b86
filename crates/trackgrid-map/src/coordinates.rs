use crate::chunk::{ChunkKey, MAX_INDEX, XCOUNT, YCOUNT};
use crate::units::*;

use trackgrid_core::glam::{DVec2, IVec2};
use trackgrid_core::ilattice::prelude::Extent;

/// The largest `f64` strictly below one.
const ONE_BELOW: f64 = 1.0 - f64::EPSILON / 2.0;

/// Keys of every chunk holding at least one sample in `extent`, in ascending order.
pub fn chunk_keys(extent: &Extent<IVec2>) -> Vec<ChunkKey> {
    if extent.shape.cmple(IVec2::ZERO).any() {
        return Vec::new();
    }
    let min_key = ChunkKey::containing(CellUnits(extent.minimum));
    let max_key = ChunkKey::containing(CellUnits(extent.max()));
    (min_key.y..=max_key.y)
        .step_by(YCOUNT as usize)
        .flat_map(|y| {
            (min_key.x..=max_key.x)
                .step_by(XCOUNT as usize)
                .map(move |x| ChunkKey::new(x, y))
        })
        .collect()
}

/// An axis-aligned rectangle in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldRect {
    pub min: DVec2,
    pub max: DVec2,
}

impl WorldRect {
    /// The rectangle spanned by two opposite corners, in any order.
    pub fn from_corners(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

/// Maps between world coordinates and the integer lattice of grid samples.
///
/// Sample `(i, j)` sits at `origin + (i, j) * spacing`. The cell `(i, j)` is the quadrilateral with that sample as its
/// south-west corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCoordinates {
    pub origin: DVec2,
    pub spacing: DVec2,
}

impl GridCoordinates {
    pub fn new(origin: DVec2, spacing: DVec2) -> Self {
        assert!(
            spacing.cmpgt(DVec2::ZERO).all(),
            "grid spacing must be positive: {:?}",
            spacing
        );
        Self { origin, spacing }
    }

    #[inline]
    fn lattice(&self, p: WorldUnits<DVec2>) -> DVec2 {
        (p.0 - self.origin) / self.spacing
    }

    /// The cell containing `p`.
    pub fn cell_point(&self, p: WorldUnits<DVec2>) -> CellUnits<IVec2> {
        CellUnits(self.lattice(p).floor().as_ivec2())
    }

    /// The fractional position of `p` inside the cell containing it, each component in `[0, 1)`.
    pub fn cell_offset(&self, p: WorldUnits<DVec2>) -> DVec2 {
        self.cell_offset_in(p, self.cell_point(p))
    }

    /// Same as [`GridCoordinates::cell_offset`] when the caller already knows `cell = cell_point(p)`.
    pub fn cell_offset_in(&self, p: WorldUnits<DVec2>, cell: CellUnits<IVec2>) -> DVec2 {
        // Rounding can push a value that is a hair below an integer onto the next one.
        (self.lattice(p) - cell.0.as_dvec2()).clamp(DVec2::ZERO, DVec2::splat(ONE_BELOW))
    }

    /// The world position at `offset` inside `cell`; `None` means the south-west corner.
    pub fn world_point(&self, cell: CellUnits<IVec2>, offset: Option<DVec2>) -> WorldUnits<DVec2> {
        let offset = offset.unwrap_or(DVec2::ZERO);
        WorldUnits(self.origin + (cell.0.as_dvec2() + offset) * self.spacing)
    }

    /// The cells needed to cover `rect`: floor of the minimum corner, ceiling of the maximum corner (exclusive). Corners are
    /// clamped to the addressable index range.
    pub fn cell_range(&self, rect: WorldUnits<WorldRect>) -> CellUnits<Extent<IVec2>> {
        let limit = f64::from(MAX_INDEX);
        let clamped = |p: DVec2| p.clamp(DVec2::splat(-limit), DVec2::splat(limit));
        let WorldUnits(rect) = rect;
        let min = clamped(self.lattice(WorldUnits(rect.min)).floor()).as_ivec2();
        let lub = clamped(self.lattice(WorldUnits(rect.max)).ceil()).as_ivec2();
        CellUnits(Extent::from_min_and_lub(min, lub))
    }

    /// World position of the first sample of the chunk at `key`.
    pub fn chunk_origin(&self, key: ChunkKey) -> WorldUnits<DVec2> {
        self.world_point(key.minimum(), None)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use trackgrid_core::approx::assert_relative_eq;

    fn grid() -> GridCoordinates {
        GridCoordinates::new(DVec2::new(-1000.0, 7.5), DVec2::new(400.0, 20.0))
    }

    #[test]
    fn cell_point_floors_per_axis() {
        let g = grid();
        assert_eq!(g.cell_point(WorldUnits(DVec2::new(-1000.0, 7.5))), CellUnits(IVec2::ZERO));
        assert_eq!(g.cell_point(WorldUnits(DVec2::new(-999.0, 27.4))), CellUnits(IVec2::new(0, 0)));
        assert_eq!(g.cell_point(WorldUnits(DVec2::new(-1001.0, 27.5))), CellUnits(IVec2::new(-1, 1)));
    }

    #[test]
    fn world_point_round_trip() {
        let g = grid();
        let mut x = -5123.25;
        while x < 5000.0 {
            let mut y = -301.0;
            while y < 300.0 {
                let p = WorldUnits(DVec2::new(x, y));
                let cell = g.cell_point(p);
                let offset = g.cell_offset_in(p, cell);
                assert!(offset.cmpge(DVec2::ZERO).all() && offset.cmplt(DVec2::ONE).all());
                assert_eq!(offset, g.cell_offset(p));
                assert_relative_eq!(g.world_point(cell, Some(offset)).0, p.0, epsilon = 1e-9);
                y += 13.7;
            }
            x += 377.3;
        }
    }

    #[test]
    fn missing_offset_is_the_corner() {
        let g = grid();
        let cell = CellUnits(IVec2::new(2, -3));
        assert_eq!(g.world_point(cell, None), WorldUnits(DVec2::new(-200.0, -52.5)));
    }

    #[test]
    fn offset_never_reaches_one() {
        let g = GridCoordinates::new(DVec2::ZERO, DVec2::new(0.1, 0.1));
        let p = WorldUnits(DVec2::new(-1e-18, -1e-18));
        let offset = g.cell_offset(p);
        assert!(offset.x < 1.0 && offset.y < 1.0, "{:?}", offset);
    }

    #[test]
    fn cell_range_brackets_rect() {
        let g = GridCoordinates::new(DVec2::ZERO, DVec2::new(400.0, 20.0));
        let rect = WorldRect::from_corners(DVec2::new(1900.0, 65.0), DVec2::new(-10.0, 5.0));
        let CellUnits(range) = g.cell_range(WorldUnits(rect));
        assert_eq!(range.minimum, IVec2::new(-1, 0));
        assert_eq!(range.least_upper_bound(), IVec2::new(5, 4));
        assert_eq!(range.max(), IVec2::new(4, 3));
        assert_eq!(range.volume(), 24);
        assert_eq!(range.iter2().count(), 24);
    }

    #[test]
    fn extent_chunk_keys_cover_the_extent() {
        let extent = Extent::from_min_and_max(IVec2::new(-11, 0), IVec2::new(10, 4));
        assert_eq!(
            chunk_keys(&extent),
            vec![ChunkKey::new(-30, -5), ChunkKey::new(-10, -5), ChunkKey::new(10, -5)]
        );
        assert!(chunk_keys(&Extent::from_min_and_shape(IVec2::ZERO, IVec2::new(0, 3))).is_empty());
    }

    #[test]
    fn huge_rect_is_clamped() {
        let g = GridCoordinates::new(DVec2::ZERO, DVec2::ONE);
        let rect = WorldRect::from_corners(DVec2::splat(-1e20), DVec2::splat(1e20));
        let CellUnits(range) = g.cell_range(WorldUnits(rect));
        assert_eq!(range.minimum, IVec2::splat(-MAX_INDEX));
        assert_eq!(range.least_upper_bound(), IVec2::splat(MAX_INDEX));
    }
}
