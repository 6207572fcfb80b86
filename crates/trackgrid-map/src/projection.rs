use crate::error::{GridError, GridResult};

use serde::{Deserialize, Serialize};
use trackgrid_core::geometry::{SphericalFrame, GEODETIC};
use trackgrid_core::glam::{DVec2, DVec3};

/// The view layer's mapping from sphere directions to rendered (world) coordinates.
pub trait ViewProjection: Send + Sync {
    /// The direction that maps to the top of the rendered coordinate space. Plays the role of the pole when bounding
    /// cells in world coordinates.
    fn up(&self) -> DVec3;

    /// World coordinates of the direction `v`; `x` wraps at 360.
    fn spatial_to_world(&self, v: DVec3) -> DVec2;

    fn world_to_spatial(&self, p: DVec2) -> DVec3;

    /// Distinguishes projections for [`GridRegistry`](crate::GridRegistry) keys. Projections that map identically must
    /// return equal keys.
    fn cache_key(&self) -> ProjectionKey;
}

/// Bit-exact identity of a projection's parameters.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ProjectionKey([u64; 6]);

/// A cylindrical projection about an arbitrary pole: world `x` is longitude and world `y` latitude, both in degrees,
/// measured in a frame whose pole is `up`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObliqueCylindrical {
    frame: SphericalFrame,
}

impl Default for ObliqueCylindrical {
    /// The plain geodetic cylindrical projection.
    fn default() -> Self {
        Self { frame: GEODETIC }
    }
}

impl ObliqueCylindrical {
    /// Returns `None` when `center` is parallel to `up`.
    pub fn new(up: DVec3, center: DVec3) -> Option<Self> {
        SphericalFrame::new(up, center).map(|frame| Self { frame })
    }

    pub fn from_config(config: &ProjectionConfig) -> Option<Self> {
        Self::new(
            DVec3::from_array(config.up),
            DVec3::from_array(config.center),
        )
    }

    /// Rebuilds the projection whose [`cache_key`](ViewProjection::cache_key) is `key`.
    ///
    /// Returns `None` unless the key holds an orthonormal pole and meridian.
    pub fn from_cache_key(key: &ProjectionKey) -> Option<Self> {
        let ProjectionKey(bits) = *key;
        let [ux, uy, uz, mx, my, mz] = bits.map(f64::from_bits);
        let up = DVec3::new(ux, uy, uz);
        let meridian = DVec3::new(mx, my, mz);
        let unit = |v: DVec3| v.is_finite() && (v.length_squared() - 1.0).abs() < 1e-9;
        if !unit(up) || !unit(meridian) || up.dot(meridian).abs() > 1e-9 {
            return None;
        }
        Some(Self {
            frame: SphericalFrame {
                up,
                meridian,
                east: up.cross(meridian),
            },
        })
    }
}

impl ViewProjection for ObliqueCylindrical {
    fn up(&self) -> DVec3 {
        self.frame.up
    }

    fn spatial_to_world(&self, v: DVec3) -> DVec2 {
        self.frame.to_lon_lat_deg(v)
    }

    fn world_to_spatial(&self, p: DVec2) -> DVec3 {
        self.frame.from_lon_lat_deg(p)
    }

    fn cache_key(&self) -> ProjectionKey {
        let SphericalFrame { up, meridian, .. } = self.frame;
        ProjectionKey([
            up.x.to_bits(),
            up.y.to_bits(),
            up.z.to_bits(),
            meridian.x.to_bits(),
            meridian.y.to_bits(),
            meridian.z.to_bits(),
        ])
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ProjectionConfig {
    /// Pole of the projection.
    pub up: [f64; 3],
    /// Direction that maps to world `x = 0`.
    pub center: [f64; 3],
}

impl ProjectionConfig {
    pub fn build(&self) -> GridResult<ObliqueCylindrical> {
        ObliqueCylindrical::from_config(self).ok_or_else(|| {
            GridError::Config(format!(
                "projection center {:?} is parallel to its pole {:?}",
                self.center, self.up
            ))
        })
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            up: [0.0, 0.0, 1.0],
            center: [1.0, 0.0, 0.0],
        }
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
    use trackgrid_core::geometry::SphereVector;

    #[test]
    fn default_projection_is_geodetic() {
        let proj = ObliqueCylindrical::default();
        let v = DVec3::from_lon_lat_deg(123.0, -45.0);
        assert_relative_eq!(proj.spatial_to_world(v), DVec2::new(123.0, -45.0), epsilon = 1e-9);
        assert_eq!(proj, ObliqueCylindrical::from_config(&ProjectionConfig::default()).unwrap());
    }

    #[test]
    fn oblique_round_trip() {
        let proj = ObliqueCylindrical::new(DVec3::from_lon_lat_deg(80.0, 20.0), DVec3::X).unwrap();
        let p = DVec2::new(271.0, 33.0);
        assert_relative_eq!(proj.spatial_to_world(proj.world_to_spatial(p)), p, epsilon = 1e-9);
    }

    #[test]
    fn cache_keys_distinguish_poles() {
        let a = ObliqueCylindrical::default();
        let b = ObliqueCylindrical::new(DVec3::from_lon_lat_deg(0.0, 60.0), DVec3::X).unwrap();
        assert_eq!(a.cache_key(), ObliqueCylindrical::default().cache_key());
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn rebuilt_from_cache_key() {
        let proj = ObliqueCylindrical::new(DVec3::from_lon_lat_deg(30.0, 60.0), DVec3::Y).unwrap();
        let rebuilt = ObliqueCylindrical::from_cache_key(&proj.cache_key()).unwrap();
        assert_eq!(rebuilt.cache_key(), proj.cache_key());
        let p = DVec2::new(12.0, -40.0);
        assert_relative_eq!(rebuilt.world_to_spatial(p), proj.world_to_spatial(p), epsilon = 1e-12);

        let bogus = ProjectionKey([0.0f64.to_bits(); 6]);
        assert!(ObliqueCylindrical::from_cache_key(&bogus).is_none());
    }

    #[test]
    fn parallel_config_is_an_error() {
        let config = ProjectionConfig {
            up: [1.0, 0.0, 0.0],
            center: [2.0, 0.0, 0.0],
        };
        assert!(matches!(config.build(), Err(GridError::Config(_))));
    }
}
