use super::isotropic::check_property_count;
use super::{
    ElasticProperties, Element, ElementCore, ElementError, FieldMatrix, Gradient, Point, Prt,
    Rheology, N_PNT_EDGE, N_PNT_ELEM,
};
use num_complex::Complex64;
use std::fmt;

/// An element with a radial symmetry axis: shear along the radius uses `μ_v = ρ vsv²`,
/// shear across it uses `μ_h = ρ vsh²`.
///
/// The radial direction at each Point is fixed by its colatitude in the meridional plane.
#[derive(Debug)]
pub struct TransverselyIsotropicElement<'m> {
    core: ElementCore<'m>,
    mu_v: [f64; N_PNT_ELEM],
    mu_h: [f64; N_PNT_ELEM],
    sin_theta: [f64; N_PNT_ELEM],
    cos_theta: [f64; N_PNT_ELEM],
}

impl<'m> TransverselyIsotropicElement<'m> {
    pub fn new(
        gradient: &'m Gradient,
        prt: Option<&'m Prt>,
        points: &[&'m Point],
        properties: &[ElasticProperties],
    ) -> Result<Self, ElementError> {
        let core = ElementCore::new(gradient, prt, points)?;
        check_property_count(properties)?;

        let mut mu_v = [0.0; N_PNT_ELEM];
        let mut mu_h = [0.0; N_PNT_ELEM];
        for (ipnt, props) in properties.iter().enumerate() {
            mu_v[ipnt] = props.mu_v();
            mu_h[ipnt] = props.mu_h();
        }

        let theta = core.form_theta_mat();
        let mut sin_theta = [0.0; N_PNT_ELEM];
        let mut cos_theta = [1.0; N_PNT_ELEM];
        for i in 0..N_PNT_EDGE {
            for j in 0..N_PNT_EDGE {
                let (sin, cos) = theta[(i, j)].sin_cos();
                sin_theta[i * N_PNT_EDGE + j] = sin;
                cos_theta[i * N_PNT_EDGE + j] = cos;
            }
        }

        Ok(Self {
            core,
            mu_v,
            mu_h,
            sin_theta,
            cos_theta,
        })
    }
}

impl Rheology for TransverselyIsotropicElement<'_> {
    fn meridional_flux(&self, ipnt: usize, [g_s, g_z]: [Complex64; 2]) -> [Complex64; 2] {
        let (sin, cos) = (self.sin_theta[ipnt], self.cos_theta[ipnt]);

        // radial and tangential components
        let g_r = g_s * sin + g_z * cos;
        let g_t = g_s * cos - g_z * sin;

        let f_r = g_r * self.mu_v[ipnt];
        let f_t = g_t * self.mu_h[ipnt];

        [f_r * sin + f_t * cos, f_r * cos - f_t * sin]
    }

    fn azimuthal_modulus(&self, ipnt: usize) -> f64 {
        self.mu_h[ipnt]
    }
}

impl<'m> Element<'m> for TransverselyIsotropicElement<'m> {
    fn core(&self) -> &ElementCore<'m> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore<'m> {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "TransverselyIsotropic"
    }

    fn stiffness(&self, displ: &[FieldMatrix]) -> Vec<FieldMatrix> {
        self.core.stiffness_with(displ, self)
    }
}

impl fmt::Display for TransverselyIsotropicElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TransverselyIsotropicElement (max nr: {}, axial: {}, PRT: {}, domain: {})",
            self.core.max_nr(),
            self.core.axial(),
            self.core.has_prt(),
            self.core.domain_tag()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::tests::{grid_points, uniform_properties};
    use crate::element::IsotropicElement;

    fn anisotropic(rho: f64, vsv: f64, vsh: f64) -> Vec<ElasticProperties> {
        vec![
            ElasticProperties {
                rho,
                vpv: 2.0 * vsv,
                vph: 2.0 * vsh,
                vsv,
                vsh,
            };
            N_PNT_ELEM
        ]
    }

    fn probe(points: &[Point]) -> Vec<FieldMatrix> {
        points
            .iter()
            .enumerate()
            .map(|(ipnt, p)| {
                FieldMatrix::from_fn(p.nu() + 1, 3, |alpha, comp| {
                    Complex64::new(((ipnt * 3 + alpha * 2 + comp) as f64).sin(), alpha as f64 * 0.2)
                })
            })
            .collect()
    }

    #[test]
    fn matches_isotropic_without_anisotropy() {
        let points = grid_points(6, [0.0, 2.0], [1.0, 3.0]);
        let refs: Vec<&Point> = points.iter().collect();
        let gradient = Gradient::new(&refs).unwrap();
        let props = uniform_properties(2.0, 5.0, 3.0);

        let iso = IsotropicElement::new(&gradient, None, &refs, &props).unwrap();
        let tiso = TransverselyIsotropicElement::new(&gradient, None, &refs, &props).unwrap();

        let displ = probe(&points);
        let k_iso = iso.stiffness(&displ);
        let k_tiso = tiso.stiffness(&displ);
        let scale = k_iso.iter().map(|k| k.norm()).fold(0.0, f64::max);

        for (a, b) in k_iso.iter().zip(k_tiso.iter()) {
            assert!((a - b).norm() < 1e-12 * scale);
        }
    }

    #[test]
    fn radial_shear_uses_mu_v() {
        // near the pole the radius points along z, so a field varying with z shears radially
        let points = grid_points(1, [1.0e-3, 1.1e-2], [1.0, 1.01]);
        let refs: Vec<&Point> = points.iter().collect();
        let gradient = Gradient::new(&refs).unwrap();
        let (mu_v, mu_h) = (4.0, 9.0);
        let elem =
            TransverselyIsotropicElement::new(&gradient, None, &refs, &anisotropic(1.0, 2.0, 3.0))
                .unwrap();

        let displ: Vec<FieldMatrix> = points
            .iter()
            .map(|p| FieldMatrix::from_fn(1, 3, |_, comp| Complex64::from(if comp == 0 { p.z() } else { 0.0 })))
            .collect();
        let stiff = elem.stiffness(&displ);

        let energy: f64 = displ
            .iter()
            .zip(stiff.iter())
            .map(|(u, k)| (u[(0, 0)] * k[(0, 0)]).re)
            .sum();
        let volume = gradient.weights().sum();

        assert!((energy + mu_v * volume).abs() < 1e-3 * mu_v * volume);
        assert!((energy + mu_h * volume).abs() > 0.1 * mu_v * volume);
    }

    #[test]
    fn self_consistent() {
        let props = anisotropic(3300.0, 4400.0, 4600.0);
        let prt = Prt::rotation(0.25);

        for (s_range, nr) in [([0.0, 5.0e4], 5), ([3.0e5, 3.5e5], 9)] {
            let points = grid_points(nr, s_range, [6.0e6, 6.05e6]);
            let refs: Vec<&Point> = points.iter().collect();
            let gradient = Gradient::new(&refs).unwrap();

            let plain = TransverselyIsotropicElement::new(&gradient, None, &refs, &props).unwrap();
            let rotated =
                TransverselyIsotropicElement::new(&gradient, Some(&prt), &refs, &props).unwrap();

            assert!(plain.test().is_ok(), "{} failed its self test", plain);
            assert!(rotated.test().is_ok(), "{} failed its self test", rotated);
        }
    }

    #[test]
    fn property_count() {
        let points = grid_points(3, [1.0, 2.0], [0.0, 1.0]);
        let refs: Vec<&Point> = points.iter().collect();
        let gradient = Gradient::new(&refs).unwrap();

        assert!(matches!(
            TransverselyIsotropicElement::new(&gradient, None, &refs, &[]),
            Err(ElementError::PropertyCount { expected: 25, found: 0 })
        ));
    }
}
