use crate::glam::{DVec2, DVec3};

/// Operations on directions in 3-space that are treated as points on the unit sphere.
pub trait SphereVector: Copy {
    /// The angle between `self` and `other` in radians, in `[0, pi]`.
    ///
    /// Uses `atan2(|a x b|, a . b)`, which keeps full precision for nearly parallel and nearly antiparallel inputs where
    /// `acos` does not.
    fn separation(self, other: Self) -> f64;

    /// Geodetic longitude in degrees east, normalized to `[0, 360)`.
    fn lon_deg(self) -> f64;

    /// Geodetic latitude in degrees.
    fn lat_deg(self) -> f64;

    fn from_lon_lat_deg(lon: f64, lat: f64) -> Self;

    /// `true` for the all-zero placeholder direction.
    fn is_null(self) -> bool;
}

impl SphereVector for DVec3 {
    #[inline]
    fn separation(self, other: Self) -> f64 {
        self.cross(other).length().atan2(self.dot(other))
    }

    #[inline]
    fn lon_deg(self) -> f64 {
        GEODETIC.to_lon_lat_deg(self).x
    }

    #[inline]
    fn lat_deg(self) -> f64 {
        GEODETIC.to_lon_lat_deg(self).y
    }

    #[inline]
    fn from_lon_lat_deg(lon: f64, lat: f64) -> Self {
        GEODETIC.from_lon_lat_deg(DVec2::new(lon, lat))
    }

    #[inline]
    fn is_null(self) -> bool {
        self == DVec3::ZERO
    }
}

/// An orthonormal frame with a "pole" axis. Longitude is measured from `meridian` toward `up x meridian`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalFrame {
    pub up: DVec3,
    pub meridian: DVec3,
    pub east: DVec3,
}

/// The planet-fixed frame: north pole on +Z, prime meridian on +X.
pub const GEODETIC: SphericalFrame = SphericalFrame {
    up: DVec3::Z,
    meridian: DVec3::X,
    east: DVec3::Y,
};

impl SphericalFrame {
    /// Builds a frame with pole `up` whose zero longitude passes as close as possible to `toward`.
    ///
    /// Returns `None` when `toward` is parallel to `up`.
    pub fn new(up: DVec3, toward: DVec3) -> Option<Self> {
        let up = up.normalize();
        let meridian = toward - up * up.dot(toward);
        if meridian.length_squared() < 1e-24 {
            return None;
        }
        let meridian = meridian.normalize();
        Some(Self {
            up,
            meridian,
            east: up.cross(meridian),
        })
    }

    /// `(lon, lat)` in degrees with `lon` in `[0, 360)`.
    pub fn to_lon_lat_deg(&self, v: DVec3) -> DVec2 {
        let lon = v.dot(self.east).atan2(v.dot(self.meridian)).to_degrees();
        let lat = v
            .dot(self.up)
            .atan2((v.dot(self.meridian).powi(2) + v.dot(self.east).powi(2)).sqrt())
            .to_degrees();
        DVec2::new(normalize_lon_deg(lon), lat)
    }

    pub fn from_lon_lat_deg(&self, lon_lat: DVec2) -> DVec3 {
        let (lon, lat) = (lon_lat.x.to_radians(), lon_lat.y.to_radians());
        (self.meridian * lon.cos() + self.east * lon.sin()) * lat.cos() + self.up * lat.sin()
    }
}

/// Wraps `lon` into `[0, 360)`.
pub fn normalize_lon_deg(lon: f64) -> f64 {
    let lon = lon.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if lon >= 360.0 {
        0.0
    } else {
        lon
    }
}

/// `-1`, `0` or `1`. Unlike [`f64::signum`], zero maps to zero.
#[inline]
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
