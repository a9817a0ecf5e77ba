use super::{ElementError, N_PNT_ELEM};
use nalgebra::Matrix2;
use num_complex::Complex64;

/// Per-point correction applied to meridional gradients before the constitutive relation
/// (and, transposed, to the resulting fluxes afterwards).
///
/// Corrections come from the mesher, e.g. rotations of the local frame or the
/// deformation of an element under topography.
#[derive(Clone, Debug)]
pub struct Prt {
    corrections: Vec<Matrix2<f64>>,
}

impl Prt {
    pub fn new(corrections: Vec<Matrix2<f64>>) -> Result<Self, ElementError> {
        if corrections.len() != N_PNT_ELEM {
            return Err(ElementError::CorrectionCount {
                expected: N_PNT_ELEM,
                found: corrections.len(),
            });
        }

        Ok(Self { corrections })
    }

    /// The same rotation (by `angle` radians in the s-z plane) at every point
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            corrections: vec![Matrix2::new(cos, -sin, sin, cos); N_PNT_ELEM],
        }
    }

    pub fn correction(&self, ipnt: usize) -> &Matrix2<f64> {
        &self.corrections[ipnt]
    }

    pub fn apply(&self, ipnt: usize, [g_s, g_z]: [Complex64; 2]) -> [Complex64; 2] {
        let c = &self.corrections[ipnt];
        [
            g_s * c[(0, 0)] + g_z * c[(0, 1)],
            g_s * c[(1, 0)] + g_z * c[(1, 1)],
        ]
    }

    pub fn apply_transpose(&self, ipnt: usize, [f_0, f_1]: [Complex64; 2]) -> [Complex64; 2] {
        let c = &self.corrections[ipnt];
        [
            f_0 * c[(0, 0)] + f_1 * c[(1, 0)],
            f_0 * c[(0, 1)] + f_1 * c[(1, 1)],
        ]
    }
}
