use super::{
    ElasticProperties, Element, ElementCore, ElementError, FieldMatrix, Gradient, Point, Prt,
    Rheology, N_PNT_ELEM,
};
use num_complex::Complex64;
use std::fmt;

/// An element with an isotropic shear modulus at each Point
#[derive(Debug)]
pub struct IsotropicElement<'m> {
    core: ElementCore<'m>,
    mu: [f64; N_PNT_ELEM],
}

impl<'m> IsotropicElement<'m> {
    pub fn new(
        gradient: &'m Gradient,
        prt: Option<&'m Prt>,
        points: &[&'m Point],
        properties: &[ElasticProperties],
    ) -> Result<Self, ElementError> {
        let core = ElementCore::new(gradient, prt, points)?;
        check_property_count(properties)?;

        let mut mu = [0.0; N_PNT_ELEM];
        for (mu, props) in mu.iter_mut().zip(properties.iter()) {
            *mu = props.mu();
        }

        Ok(Self { core, mu })
    }

    pub fn mu(&self, ipnt: usize) -> f64 {
        self.mu[ipnt]
    }
}

pub(super) fn check_property_count(properties: &[ElasticProperties]) -> Result<(), ElementError> {
    if properties.len() == N_PNT_ELEM {
        Ok(())
    } else {
        Err(ElementError::PropertyCount {
            expected: N_PNT_ELEM,
            found: properties.len(),
        })
    }
}

impl Rheology for IsotropicElement<'_> {
    fn meridional_flux(&self, ipnt: usize, [g_s, g_z]: [Complex64; 2]) -> [Complex64; 2] {
        let mu = self.mu[ipnt];
        [g_s * mu, g_z * mu]
    }

    fn azimuthal_modulus(&self, ipnt: usize) -> f64 {
        self.mu[ipnt]
    }
}

impl<'m> Element<'m> for IsotropicElement<'m> {
    fn core(&self) -> &ElementCore<'m> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore<'m> {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "Isotropic"
    }

    fn stiffness(&self, displ: &[FieldMatrix]) -> Vec<FieldMatrix> {
        self.core.stiffness_with(displ, self)
    }
}

impl fmt::Display for IsotropicElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IsotropicElement (max nr: {}, axial: {}, PRT: {}, domain: {})",
            self.core.max_nr(),
            self.core.axial(),
            self.core.has_prt(),
            self.core.domain_tag()
        )
    }
}
