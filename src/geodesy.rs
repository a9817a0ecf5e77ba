use nalgebra::{Vector2, Vector3};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

/// Outer radius of the reference sphere (meters)
pub const R_OUTER: f64 = 6_371_000.0;

/// Radii below this are treated as the center of the sphere
const R_TINY: f64 = 1e-9;

/// Outer radius of the reference sphere (meters)
pub fn r_outer() -> f64 {
    R_OUTER
}

/// Geocentric colatitude (radians) of a geographic latitude (degrees).
///
/// The sphere carries no ellipticity, so `depth` does not alter the result.
///
/// ```
/// use sem_earth::geodesy::lat_to_theta;
///
/// assert!((lat_to_theta(90.0, 0.0)).abs() < 1e-15);
/// assert!((lat_to_theta(0.0, 1e5) - std::f64::consts::FRAC_PI_2).abs() < 1e-15);
/// ```
pub fn lat_to_theta(lat: f64, _depth: f64) -> f64 {
    FRAC_PI_2 - lat.to_radians()
}

/// Azimuth (radians, in `[0, 2π)`) of a geographic longitude (degrees)
///
/// ```
/// use sem_earth::geodesy::lon_to_phi;
///
/// assert!((lon_to_phi(-90.0) - 1.5 * std::f64::consts::PI).abs() < 1e-12);
/// ```
pub fn lon_to_phi(lon: f64) -> f64 {
    lon.to_radians().rem_euclid(2.0 * PI)
}

/// Colatitude of a point in the meridional (s, z) plane, measured from the +z axis
pub fn theta_sz(sz: Vector2<f64>) -> f64 {
    if sz.norm() < R_TINY {
        0.0
    } else {
        sz[0].atan2(sz[1])
    }
}

/// A location in spherical coordinates: radius (m), colatitude (rad), azimuth (rad)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalPoint {
    pub r: f64,
    pub theta: f64,
    pub phi: f64,
}

impl SphericalPoint {
    pub const fn new(r: f64, theta: f64, phi: f64) -> Self {
        Self { r, theta, phi }
    }

    /// Location of a geographic point at some depth (meters) below the outer surface
    pub fn from_geographic(lat: f64, lon: f64, depth: f64) -> Self {
        Self {
            r: R_OUTER - depth,
            theta: lat_to_theta(lat, depth),
            phi: lon_to_phi(lon),
        }
    }

    pub fn to_cartesian(&self) -> Vector3<f64> {
        let s = self.r * self.theta.sin();
        Vector3::new(
            s * self.phi.cos(),
            s * self.phi.sin(),
            self.r * self.theta.cos(),
        )
    }

    /// Inverse of [SphericalPoint::to_cartesian]. The origin maps to `(0, 0, 0)` and
    /// points on the z-axis get an azimuth of zero.
    pub fn from_cartesian(xyz: &Vector3<f64>) -> Self {
        let r = xyz.norm();
        if r < R_TINY {
            return Self::new(0.0, 0.0, 0.0);
        }

        let theta = (xyz[2] / r).clamp(-1.0, 1.0).acos();
        let phi = if xyz[0].abs() < R_TINY && xyz[1].abs() < R_TINY {
            0.0
        } else {
            xyz[1].atan2(xyz[0]).rem_euclid(2.0 * PI)
        };

        Self::new(r, theta, phi)
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        (self.to_cartesian() - other.to_cartesian()).norm()
    }
}

impl fmt::Display for SphericalPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(r: {:.3} km, θ: {:.5}°, φ: {:.5}°)",
            self.r / 1e3,
            self.theta.to_degrees(),
            self.phi.to_degrees()
        )
    }
}
