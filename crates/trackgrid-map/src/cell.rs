use crate::projection::ViewProjection;

use smallvec::SmallVec;
use std::f64::consts::PI;
use std::sync::OnceLock;
use trackgrid_core::geometry::{sign, SphereVector, GEODETIC};
use trackgrid_core::glam::{DVec2, DVec3};

/// A bounding box on the sphere in `(longitude, latitude)` degrees, or the equivalent in a projection's world
/// coordinates.
///
/// Longitudes live in `[0, 360)`. When the box crosses the 0/360 seam, `min.x > max.x` and the box covers
/// `[min.x, 360) + [0, max.x]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalRange {
    pub min: DVec2,
    pub max: DVec2,
    /// The box contains the pole (or, in world coordinates, the projection's up axis or its antipode). Longitude then
    /// spans the full `[0, 360)`.
    pub contains_pole: bool,
}

impl SphericalRange {
    pub fn wraps(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Longitude extent in degrees, accounting for the seam.
    pub fn lon_span(&self) -> f64 {
        if self.wraps() {
            360.0 - self.min.x + self.max.x
        } else {
            self.max.x - self.min.x
        }
    }

    pub fn contains(&self, lon_lat: DVec2) -> bool {
        let lat_ok = lon_lat.y >= self.min.y && lon_lat.y <= self.max.y;
        let lon_ok = if self.wraps() {
            lon_lat.x >= self.min.x || lon_lat.x <= self.max.x
        } else {
            lon_lat.x >= self.min.x && lon_lat.x <= self.max.x
        };
        lat_ok && lon_ok
    }
}

/// The geometry of one grid quadrilateral on the unit sphere.
///
/// The four corners are joined by great-circle arcs. Each wall is described by the unit normal of its great circle,
/// oriented so that it points into the cell. Opposite walls meet along an axis (`we_plane`, `sn_plane`); the great
/// circles through an axis sweep the cell from one wall to the other, which is what [`Cell::uninterpolate`] measures.
#[derive(Clone, Debug)]
pub struct Cell {
    chain: [DVec3; 5],
    clockwise: bool,
    pub s: DVec3,
    pub e: DVec3,
    pub n: DVec3,
    pub w: DVec3,
    pub we_plane: DVec3,
    pub sn_plane: DVec3,
    pub we_span: f64,
    pub sn_span: f64,
    geo_range: SphericalRange,
    world_range: OnceLock<SphericalRange>,
}

impl Cell {
    /// Builds the cell with corners `sw, se, ne, nw`. Corners may wind either way around the cell.
    ///
    /// Returns `None` for a degenerate quadrilateral: a zero (placeholder) corner, or corners that do not span an area.
    pub fn new(sw: DVec3, se: DVec3, ne: DVec3, nw: DVec3) -> Option<Self> {
        if [sw, se, ne, nw].iter().any(|v| v.is_null()) {
            return None;
        }

        let chain = [sw, se, ne, nw, sw];

        let provisional_s = sw.cross(se).normalize();
        let clockwise = provisional_s.dot(ne) < 0.0;
        let (s, e, n, w) = if clockwise {
            (
                -provisional_s,
                ne.cross(se).normalize(),
                nw.cross(ne).normalize(),
                sw.cross(nw).normalize(),
            )
        } else {
            (
                provisional_s,
                se.cross(ne).normalize(),
                ne.cross(nw).normalize(),
                nw.cross(sw).normalize(),
            )
        };

        let we_plane = e.cross(w).normalize();
        let sn_plane = n.cross(s).normalize();
        let we_span = PI - e.separation(w);
        let sn_span = PI - s.separation(n);

        let finite = [s, e, n, w, we_plane, sn_plane].iter().all(|v| v.is_finite());
        if !finite || we_span <= 0.0 || sn_span <= 0.0 {
            return None;
        }

        let geo_range = bounding_range(&chain, [s, e, n, w], GEODETIC.up, |v| {
            GEODETIC.to_lon_lat_deg(v)
        });

        Some(Self {
            chain,
            clockwise,
            s,
            e,
            n,
            w,
            we_plane,
            sn_plane,
            we_span,
            sn_span,
            geo_range,
            world_range: OnceLock::new(),
        })
    }

    /// Stacks `upper` on top of `lower` without recomputing the east and west walls, which the two cells are assumed to
    /// share (as cells in one column of a ground track do).
    pub fn merge_vertical(lower: &Cell, upper: &Cell) -> Option<Self> {
        let chain = [
            lower.sw(),
            lower.se(),
            upper.ne(),
            upper.nw(),
            lower.sw(),
        ];
        let (s, n) = (lower.s, upper.n);
        let sn_plane = n.cross(s).normalize();
        let sn_span = PI - s.separation(n);
        if !sn_plane.is_finite() || sn_span <= 0.0 {
            return None;
        }

        let walls = [s, lower.e, n, lower.w];
        let geo_range = bounding_range(&chain, walls, GEODETIC.up, |v| GEODETIC.to_lon_lat_deg(v));

        Some(Self {
            chain,
            clockwise: lower.clockwise,
            s,
            e: lower.e,
            n,
            w: lower.w,
            we_plane: lower.we_plane,
            sn_plane,
            we_span: lower.we_span,
            sn_span,
            geo_range,
            world_range: OnceLock::new(),
        })
    }

    /// The closed boundary `[sw, se, ne, nw, sw]`.
    pub fn chain(&self) -> &[DVec3; 5] {
        &self.chain
    }

    pub fn sw(&self) -> DVec3 {
        self.chain[0]
    }

    pub fn se(&self) -> DVec3 {
        self.chain[1]
    }

    pub fn ne(&self) -> DVec3 {
        self.chain[2]
    }

    pub fn nw(&self) -> DVec3 {
        self.chain[3]
    }

    /// `true` when `sw -> se -> ne -> nw` winds clockwise seen from outside the sphere.
    pub fn is_clockwise(&self) -> bool {
        self.clockwise
    }

    /// Inward wall normals in `s, e, n, w` order.
    pub fn walls(&self) -> [DVec3; 4] {
        [self.s, self.e, self.n, self.w]
    }

    pub fn center(&self) -> DVec3 {
        (self.chain[0] + self.chain[1] + self.chain[2] + self.chain[3]).normalize()
    }

    /// `true` if `p` is on the inner side of all four walls.
    pub fn contains(&self, p: DVec3) -> bool {
        self.walls().iter().all(|wall| wall.dot(p) >= 0.0)
    }

    /// Geodetic bounding box.
    pub fn geo_range(&self) -> SphericalRange {
        self.geo_range
    }

    /// Bounding box in `projection`'s world coordinates. Computed on first use and cached; a cell must only ever be
    /// asked about one projection, which holds for cells handed out by a [`GridStore`](crate::GridStore).
    pub fn world_range(&self, projection: &dyn ViewProjection) -> SphericalRange {
        *self.world_range.get_or_init(|| {
            bounding_range(&self.chain, self.walls(), projection.up(), |v| {
                projection.spatial_to_world(v)
            })
        })
    }

    /// Maps the direction `p` to cell-relative coordinates: `(0, 0)` at the south-west corner, `(1, 1)` at the
    /// north-east corner.
    ///
    /// Only the x coordinate is sign-corrected for points west of the west wall. A point south of the south wall yields
    /// a positive y mirrored about the wall; downstream consumers depend on this.
    pub fn uninterpolate(&self, p: DVec3) -> DVec2 {
        let x = self.we_plane.cross(p).normalize().separation(self.w) / self.we_span;
        let y = self.sn_plane.cross(p).normalize().separation(self.s) / self.sn_span;
        DVec2::new(x * sign(p.dot(self.w)), y)
    }

    /// The direction at cell-relative coordinates `unit`. Inverse of [`Cell::uninterpolate`] inside the cell.
    pub fn interpolate(&self, unit: DVec2) -> DVec3 {
        let we_angle = unit.x * self.we_span;
        let sn_angle = unit.y * self.sn_span;
        let we_normal = self.w * we_angle.cos() + self.we_plane.cross(self.w) * we_angle.sin();
        let sn_normal = self.s * sn_angle.cos() + self.sn_plane.cross(self.s) * sn_angle.sin();
        let p = we_normal.cross(sn_normal).normalize();
        if p.dot(self.center()) < 0.0 {
            -p
        } else {
            p
        }
    }
}

/// Bounds the quadrilateral `chain` in the `(lon, lat)`-like coordinates produced by `to_2d`, whose latitude is measured
/// toward `pole`.
fn bounding_range(
    chain: &[DVec3; 5],
    walls: [DVec3; 4],
    pole: DVec3,
    to_2d: impl Fn(DVec3) -> DVec2,
) -> SphericalRange {
    let corners: SmallVec<[DVec2; 4]> = chain[..4].iter().map(|&v| to_2d(v)).collect();

    let mut min = DVec2::splat(f64::INFINITY);
    let mut max = DVec2::splat(f64::NEG_INFINITY);
    for c in corners.iter() {
        min = min.min(*c);
        max = max.max(*c);
    }

    // An arc can bulge past both of its endpoints in latitude. The extreme point lies in the plane spanned by the pole
    // and the arc's normal, so the arc reaches it iff the endpoints sit on opposite sides of that plane.
    for edge in chain.windows(2) {
        let (a, b) = (edge[0], edge[1]);
        let normal = a.cross(b);
        let axis = normal.cross(pole);
        if axis.length_squared() < 1e-24 {
            // The arc lies on a circle of constant latitude.
            continue;
        }
        if axis.dot(a) * axis.dot(b) >= 0.0 {
            continue;
        }
        let normal = normal.normalize();
        let mut extreme = (pole - normal * normal.dot(pole)).normalize();
        if extreme.dot(a + b) < 0.0 {
            extreme = -extreme;
        }
        let lat = to_2d(extreme).y;
        min.y = min.y.min(lat);
        max.y = max.y.max(lat);
    }

    let pole_signs: SmallVec<[f64; 4]> = walls.iter().map(|wall| sign(wall.dot(pole))).collect();
    let pole_sign = pole_signs[0];
    let contains_pole = pole_sign != 0.0 && pole_signs.iter().all(|&s| s == pole_sign);

    if contains_pole {
        min.x = 0.0;
        max.x = 360.0;
        if pole_sign > 0.0 {
            max.y = 90.0;
        } else {
            min.y = -90.0;
        }
    } else if max.x - min.x > 180.0 {
        // The raw span is the complement of the real one: the cell straddles the seam.
        min.x = corners
            .iter()
            .map(|c| c.x)
            .filter(|&lon| lon >= 180.0)
            .fold(f64::INFINITY, f64::min);
        max.x = corners
            .iter()
            .map(|c| c.x)
            .filter(|&lon| lon < 180.0)
            .fold(f64::NEG_INFINITY, f64::max);
    }

    SphericalRange {
        min,
        max,
        contains_pole,
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
    use crate::projection::ObliqueCylindrical;

    use trackgrid_core::approx::{assert_abs_diff_eq, assert_relative_eq};

    fn ll(lon: f64, lat: f64) -> DVec3 {
        DVec3::from_lon_lat_deg(lon, lat)
    }

    /// A one-degree cell with its south-west corner at `(lon, lat)`.
    fn degree_cell(lon: f64, lat: f64) -> Cell {
        Cell::new(
            ll(lon, lat),
            ll(lon + 1.0, lat),
            ll(lon + 1.0, lat + 1.0),
            ll(lon, lat + 1.0),
        )
        .unwrap()
    }

    #[test]
    fn chain_is_closed() {
        let cell = degree_cell(10.0, 20.0);
        assert_eq!(cell.chain()[0], cell.chain()[4]);
        assert_eq!(cell.sw(), ll(10.0, 20.0));
        assert_eq!(cell.nw(), ll(10.0, 21.0));
    }

    #[test]
    fn walls_point_inward_for_both_windings() {
        let ccw = degree_cell(10.0, 20.0);
        assert!(!ccw.is_clockwise());

        let cw = Cell::new(ll(10.0, 20.0), ll(10.0, 21.0), ll(11.0, 21.0), ll(11.0, 20.0)).unwrap();
        assert!(cw.is_clockwise());

        for cell in [ccw, cw] {
            let center = cell.center();
            for wall in cell.walls() {
                assert!(wall.dot(center) >= 0.0);
                assert_relative_eq!(wall.length(), 1.0, epsilon = 1e-12);
            }
            assert!(cell.contains(center));
            assert!(cell.we_span > 0.0 && cell.we_span <= PI);
            assert!(cell.sn_span > 0.0 && cell.sn_span <= PI);
        }
    }

    #[test]
    fn spans_are_the_swept_angles() {
        let cell = degree_cell(0.0, 0.0);
        // East and west walls are meridians one degree apart.
        assert_relative_eq!(cell.we_span, 1f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(cell.sn_span, 1f64.to_radians(), epsilon = 1e-5);
    }

    #[test]
    fn uninterpolate_corners_and_center() {
        let cell = degree_cell(30.0, -40.0);
        assert_abs_diff_eq!(cell.uninterpolate(cell.sw()), DVec2::ZERO, epsilon = 1e-9);
        assert_abs_diff_eq!(cell.uninterpolate(cell.se()), DVec2::new(1.0, 0.0), epsilon = 1e-9);
        assert_abs_diff_eq!(cell.uninterpolate(cell.ne()), DVec2::ONE, epsilon = 1e-9);
        assert_abs_diff_eq!(cell.uninterpolate(cell.nw()), DVec2::new(0.0, 1.0), epsilon = 1e-9);
        assert_abs_diff_eq!(cell.uninterpolate(ll(30.5, -39.5)), DVec2::splat(0.5), epsilon = 1e-2);
    }

    #[test]
    fn interpolate_inverts_uninterpolate() {
        for cell in [degree_cell(100.0, 60.0), degree_cell(359.5, -10.0)] {
            for &unit in &[DVec2::new(0.25, 0.75), DVec2::new(0.9, 0.1), DVec2::splat(0.5)] {
                let p = cell.interpolate(unit);
                assert!(cell.contains(p));
                assert_abs_diff_eq!(cell.uninterpolate(p), unit, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn only_x_is_sign_corrected() {
        let cell = degree_cell(0.0, 0.0);

        let west = cell.uninterpolate(ll(-0.5, 0.5));
        assert_abs_diff_eq!(west.x, -0.5, epsilon = 1e-2);

        let south = cell.uninterpolate(ll(0.5, -0.5));
        assert_abs_diff_eq!(south.y, 0.5, epsilon = 1e-2);
    }

    #[test]
    fn zero_corner_is_dead() {
        assert!(Cell::new(DVec3::ZERO, DVec3::ZERO, DVec3::ZERO, DVec3::ZERO).is_none());
        assert!(Cell::new(ll(0.0, 0.0), ll(1.0, 0.0), DVec3::ZERO, ll(0.0, 1.0)).is_none());
        // Collapsed to a point.
        assert!(Cell::new(ll(0.0, 0.0), ll(0.0, 0.0), ll(0.0, 0.0), ll(0.0, 0.0)).is_none());
    }

    #[test]
    fn geo_range_of_plain_cell() {
        let range = degree_cell(10.0, 20.0).geo_range();
        assert!(!range.contains_pole);
        assert!(!range.wraps());
        assert_relative_eq!(range.min, DVec2::new(10.0, 20.0), epsilon = 1e-9);
        assert_relative_eq!(range.max.x, 11.0, epsilon = 1e-9);
        // The northern arc bulges poleward between its corners.
        assert!(range.max.y > 21.0 && range.max.y < 21.01, "{}", range.max.y);
        assert!(range.contains(DVec2::new(10.5, 20.5)));
    }

    #[test]
    fn cell_around_north_pole() {
        let cell = Cell::new(ll(0.0, 80.0), ll(90.0, 80.0), ll(180.0, 80.0), ll(270.0, 80.0)).unwrap();
        let range = cell.geo_range();
        assert!(range.contains_pole);
        assert_eq!(range.min.x, 0.0);
        assert_eq!(range.max.x, 360.0);
        assert_eq!(range.max.y, 90.0);
        assert_relative_eq!(range.min.y, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn cell_around_south_pole() {
        let cell =
            Cell::new(ll(0.0, -80.0), ll(270.0, -80.0), ll(180.0, -80.0), ll(90.0, -80.0)).unwrap();
        let range = cell.geo_range();
        assert!(range.contains_pole);
        assert_eq!(range.min.y, -90.0);
        assert_eq!((range.min.x, range.max.x), (0.0, 360.0));
    }

    #[test]
    fn cell_across_the_seam_wraps() {
        let cell = Cell::new(ll(359.0, 0.0), ll(1.0, 0.0), ll(1.0, 1.0), ll(359.0, 1.0)).unwrap();
        let range = cell.geo_range();
        assert!(!range.contains_pole);
        assert!(range.wraps());
        assert_relative_eq!(range.min.x, 359.0, epsilon = 1e-9);
        assert_relative_eq!(range.max.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(range.lon_span(), 2.0, epsilon = 1e-9);
        assert!(range.contains(DVec2::new(0.0, 0.5)));
        assert!(!range.contains(DVec2::new(180.0, 0.5)));
    }

    #[test]
    fn world_range_uses_projection_pole() {
        let cell = Cell::new(ll(0.0, 80.0), ll(90.0, 80.0), ll(180.0, 80.0), ll(270.0, 80.0)).unwrap();

        // Tilt the projection so the geographic pole sits on the world equator.
        let tilted = ObliqueCylindrical::new(DVec3::X, DVec3::Z).unwrap();
        let range = cell.world_range(&tilted);
        assert!(!range.contains_pole);
        assert!(range.min.y > -11.0 && range.max.y < 11.0, "{:?}", range);

        // Cached on first use.
        assert_eq!(cell.world_range(&ObliqueCylindrical::default()), range);
    }

    #[test]
    fn merged_cell_spans_both() {
        let lower = degree_cell(5.0, 0.0);
        let upper = degree_cell(5.0, 1.0);
        let merged = Cell::merge_vertical(&lower, &upper).unwrap();

        assert_eq!(merged.sw(), lower.sw());
        assert_eq!(merged.ne(), upper.ne());
        assert_eq!(merged.we_plane, lower.we_plane);
        assert_relative_eq!(merged.sn_span, 2f64.to_radians(), epsilon = 1e-5);
        assert_abs_diff_eq!(merged.uninterpolate(upper.nw()), DVec2::new(0.0, 1.0), epsilon = 1e-9);
        assert_relative_eq!(merged.geo_range().min.y, 0.0, epsilon = 1e-9);
        assert!(merged.geo_range().max.y > 2.0);
    }
}
