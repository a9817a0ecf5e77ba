mod gll;

pub use gll::{gll_derivatives, gll_points};

use super::{CMatPP, ElementError, Point, RMatPP, N_PNT_EDGE, N_PNT_ELEM, N_POL};
use num_complex::Complex64;

/// Elements narrower than this (m) in either direction are degenerate
const MIN_ELEM_WIDTH: f64 = 1e-9;

/// Spectral gradient operator over an axis-aligned element in the meridional (s, z) plane.
///
/// Point `i * N_PNT_EDGE + j` sits at the `i`th GLL point along s and the `j`th along z.
#[derive(Clone, Debug)]
pub struct Gradient {
    /// `d[(i, k)] = l_k'(ξ_i)` / (ds/dξ)
    ds: CMatPP,
    /// `d[(j, k)] = l_k'(η_j)` / (dz/dη)
    dz: CMatPP,
    /// integration weights including the axisymmetric `s` factor and the jacobian
    weights: RMatPP,
    /// distance from the axis of each point
    s: RMatPP,
}

impl Gradient {
    /// Build the operator over the bounding box of the element's points
    pub fn new(points: &[&Point]) -> Result<Self, ElementError> {
        if points.len() != N_PNT_ELEM {
            return Err(ElementError::PointCount {
                expected: N_PNT_ELEM,
                found: points.len(),
            });
        }

        let (s_min, s_max, z_min, z_max) = points.iter().fold(
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
            |(s_min, s_max, z_min, z_max), p| {
                (
                    s_min.min(p.s()),
                    s_max.max(p.s()),
                    z_min.min(p.z()),
                    z_max.max(p.z()),
                )
            },
        );

        let ds_dxi = (s_max - s_min) / 2.0;
        let dz_deta = (z_max - z_min) / 2.0;
        if !(ds_dxi > MIN_ELEM_WIDTH && dz_deta > MIN_ELEM_WIDTH) {
            return Err(ElementError::DegenerateGeometry(format!(
                "bounding box s: [{}, {}], z: [{}, {}]",
                s_min, s_max, z_min, z_max
            )));
        }
        if s_min < 0.0 {
            return Err(ElementError::DegenerateGeometry(format!(
                "points cross the axis (s_min = {})",
                s_min
            )));
        }

        let (xi, w) = gll_points(N_POL);
        let d = gll_derivatives(&xi);

        let s = RMatPP::from_fn(|i, j| points[i * N_PNT_EDGE + j].s());

        Ok(Self {
            ds: CMatPP::from_fn(|i, k| Complex64::from(d[(i, k)] / ds_dxi)),
            dz: CMatPP::from_fn(|j, k| Complex64::from(d[(j, k)] / dz_deta)),
            weights: RMatPP::from_fn(|i, j| w[i] * w[j] * ds_dxi * dz_deta * s[(i, j)]),
            s,
        })
    }

    /// Derivatives of a field along s and z: `[du/ds, du/dz]`
    pub fn compute_grad(&self, u: &CMatPP) -> [CMatPP; 2] {
        [self.ds * u, u * self.dz.transpose()]
    }

    /// Weak-form divergence: the sum over all points of `w * (f_s * dl/ds + f_z * dl/dz)`
    /// for the Lagrange interpolant `l` of each point
    pub fn compute_quad(&self, f_s: &CMatPP, f_z: &CMatPP) -> CMatPP {
        let weighted_s = f_s.zip_map(&self.weights, |f, w| f * w);
        let weighted_z = f_z.zip_map(&self.weights, |f, w| f * w);

        self.ds.transpose() * weighted_s + weighted_z * self.dz
    }

    pub fn weights(&self) -> &RMatPP {
        &self.weights
    }

    pub fn s(&self) -> &RMatPP {
        &self.s
    }
}
