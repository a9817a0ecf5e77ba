/// Spectral gradient operator and GLL quadrature
pub mod gradient;
/// Isotropic elements
pub mod isotropic;
/// Geometric nodes shared between elements
pub mod point;
/// Optional per-point gradient corrections
pub mod prt;
/// Transversely isotropic elements
pub mod tiso;

pub use gradient::Gradient;
pub use isotropic::IsotropicElement;
pub use point::{Point, AXIS_TOLERANCE};
pub use prt::Prt;
pub use tiso::TransverselyIsotropicElement;

use crate::geodesy::theta_sz;
use nalgebra::{DMatrix, SMatrix, Vector3};
use num_complex::Complex64;
use std::fmt;
use std::time::Instant;
use thiserror::Error;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};

/// Polynomial order of an element along each edge
pub const N_POL: usize = 4;
/// GLL points along each edge
pub const N_PNT_EDGE: usize = N_POL + 1;
/// GLL points in an element
pub const N_PNT_ELEM: usize = N_PNT_EDGE * N_PNT_EDGE;

/// Relative tolerance of the self-consistency checks run by [Element::test]
pub const TEST_TOLERANCE: f64 = 1e-9;

/// A real value at each point of an element (`[(i, j)]` for point `i * N_PNT_EDGE + j`)
pub type RMatPP = SMatrix<f64, N_PNT_EDGE, N_PNT_EDGE>;
/// A complex value at each point of an element
pub type CMatPP = SMatrix<Complex64, N_PNT_EDGE, N_PNT_EDGE>;
/// Fourier coefficients of a field at one point. Rows are orders `0..=nu`; columns are the s, φ and z components.
pub type FieldMatrix = DMatrix<Complex64>;

/// Elastic parameters at one point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElasticProperties {
    pub rho: f64,
    pub vpv: f64,
    pub vph: f64,
    pub vsv: f64,
    pub vsh: f64,
}

impl ElasticProperties {
    pub const fn isotropic(rho: f64, vp: f64, vs: f64) -> Self {
        Self {
            rho,
            vpv: vp,
            vph: vp,
            vsv: vs,
            vsh: vs,
        }
    }

    /// Shear modulus for vertically polarized shear waves (L)
    pub fn mu_v(&self) -> f64 {
        self.rho * self.vsv * self.vsv
    }

    /// Shear modulus for horizontally polarized shear waves (N)
    pub fn mu_h(&self) -> f64 {
        self.rho * self.vsh * self.vsh
    }

    /// Mean shear modulus
    pub fn mu(&self) -> f64 {
        (self.mu_v() + self.mu_h()) / 2.0
    }
}

impl fmt::Display for ElasticProperties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(ρ: {}, vpv: {}, vph: {}, vsv: {}, vsh: {})",
            self.rho, self.vpv, self.vph, self.vsv, self.vsh
        )
    }
}

#[derive(Debug, Error)]
pub enum ElementError {
    #[error("Expected {expected} Points per element; found {found}!")]
    PointCount { expected: usize, found: usize },
    #[error("Expected {expected} sets of ElasticProperties per element; found {found}!")]
    PropertyCount { expected: usize, found: usize },
    #[error("Expected {expected} PRT corrections per element; found {found}!")]
    CorrectionCount { expected: usize, found: usize },
    #[error("Degenerate element geometry: {0}")]
    DegenerateGeometry(String),
    #[error("Element failed the '{check}' check; residual {residual:e} exceeds {tolerance:e}")]
    InconsistentOperator {
        check: &'static str,
        residual: f64,
        tolerance: f64,
    },
}

/// Elements with equal signatures cost the same to compute; used to avoid re-measuring equivalent elements
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CostSignature {
    pub kind: &'static str,
    pub max_nr: usize,
    pub axial: bool,
    pub has_prt: bool,
}

impl CostSignature {
    /// Produce a Json Object that describes this CostSignature
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "kind": self.kind,
            "max_nr": self.max_nr,
            "axial": self.axial,
            "prt": self.has_prt,
        }
    }
}

impl fmt::Display for CostSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}$NR={}$AXIAL={}$PRT={}",
            self.kind,
            self.max_nr,
            if self.axial { "T" } else { "F" },
            if self.has_prt { "T" } else { "F" }
        )
    }
}

/// Constitutive behaviour of a concrete element type at each of its points
pub trait Rheology {
    /// Flux `[f_s, f_z]` produced by the meridional gradient `[g_s, g_z]` at point `ipnt`
    fn meridional_flux(&self, ipnt: usize, grad: [Complex64; 2]) -> [Complex64; 2];

    /// Modulus of the azimuthal-derivative term at point `ipnt`
    fn azimuthal_modulus(&self, ipnt: usize) -> f64;
}

/// State and operations shared by every element type.
///
/// The Points, Gradient and Prt are borrowed from the mesh, which must outlive the element.
#[derive(Debug)]
pub struct ElementCore<'m> {
    max_nu: usize,
    max_nr: usize,
    points: [&'m Point; N_PNT_ELEM],
    gradient: &'m Gradient,
    prt: Option<&'m Prt>,
    domain_tag: i32,
}

impl<'m> ElementCore<'m> {
    pub fn new(
        gradient: &'m Gradient,
        prt: Option<&'m Prt>,
        points: &[&'m Point],
    ) -> Result<Self, ElementError> {
        let points: [&'m Point; N_PNT_ELEM] =
            points.try_into().map_err(|_| ElementError::PointCount {
                expected: N_PNT_ELEM,
                found: points.len(),
            })?;

        Ok(Self {
            max_nu: points.iter().map(|p| p.nu()).max().unwrap_or(0),
            max_nr: points.iter().map(|p| p.nr()).max().unwrap_or(0),
            points,
            gradient,
            prt,
            domain_tag: 0,
        })
    }

    /// Retrieve one of the element's Points; panics if `index >= N_PNT_ELEM`
    pub fn point(&self, index: usize) -> &'m Point {
        assert!(
            index < N_PNT_ELEM,
            "Point index {} is out of range; elements have {} Points!",
            index,
            N_PNT_ELEM
        );
        self.points[index]
    }

    pub fn points(&self) -> &[&'m Point; N_PNT_ELEM] {
        &self.points
    }

    pub fn gradient(&self) -> &'m Gradient {
        self.gradient
    }

    pub fn prt(&self) -> Option<&'m Prt> {
        self.prt
    }

    pub fn has_prt(&self) -> bool {
        self.prt.is_some()
    }

    pub fn max_nu(&self) -> usize {
        self.max_nu
    }

    pub fn max_nr(&self) -> usize {
        self.max_nr
    }

    /// True if any of the element's Points lies on the axis
    pub fn axial(&self) -> bool {
        self.points.iter().any(|p| p.axial())
    }

    /// Colatitude of each Point in the meridional plane
    pub fn form_theta_mat(&self) -> RMatPP {
        RMatPP::from_fn(|i, j| theta_sz(self.points[i * N_PNT_EDGE + j].coords()))
    }

    pub fn cost_signature(&self, kind: &'static str) -> CostSignature {
        CostSignature {
            kind,
            max_nr: self.max_nr,
            axial: self.axial(),
            has_prt: self.has_prt(),
        }
    }

    /// Add a source force (one [FieldMatrix] per Point) to the Points' stiffness
    pub fn add_source_term(&self, source: &[FieldMatrix]) {
        assert_eq!(
            source.len(),
            N_PNT_ELEM,
            "Source terms need one FieldMatrix per Point!"
        );

        for (point, point_source) in self.points.iter().zip(source.iter()) {
            point.add_to_stiff(point_source);
        }
    }

    pub fn set_domain_tag(&mut self, tag: i32) {
        self.domain_tag = tag;
    }

    pub fn domain_tag(&self) -> i32 {
        self.domain_tag
    }

    /// Copy the displacement out of each Point
    pub fn gather_displ(&self) -> Vec<FieldMatrix> {
        self.points.iter().map(|p| p.displ()).collect()
    }

    /// Add a stiffness force (one [FieldMatrix] per Point) into each Point
    pub fn scatter_stiff(&self, stiff: &[FieldMatrix]) {
        for (point, point_stiff) in self.points.iter().zip(stiff.iter()) {
            point.add_to_stiff(point_stiff);
        }
    }

    /// Stiffness force of `displ` under some [Rheology].
    ///
    /// Each Fourier order and component is treated independently: the meridional gradient passes
    /// through the PRT (if any) and the rheology, and is integrated back against the test functions.
    /// Orders above `alpha = 0` add an azimuthal term `alpha² μ u / s²`, which is dropped on the axis.
    pub fn stiffness_with<R: Rheology + ?Sized>(
        &self,
        displ: &[FieldMatrix],
        rheology: &R,
    ) -> Vec<FieldMatrix> {
        assert_eq!(
            displ.len(),
            N_PNT_ELEM,
            "Displacement fields need one FieldMatrix per Point!"
        );

        let mut stiff: Vec<FieldMatrix> = self
            .points
            .iter()
            .map(|p| FieldMatrix::zeros(p.nu() + 1, 3))
            .collect();

        let weights = self.gradient.weights();
        let s = self.gradient.s();

        for alpha in 0..=self.max_nu {
            let alpha_sq = (alpha * alpha) as f64;

            for comp in 0..3 {
                let u = CMatPP::from_fn(|i, j| {
                    let ipnt = i * N_PNT_EDGE + j;
                    if alpha <= self.points[ipnt].nu() && alpha < displ[ipnt].nrows() {
                        displ[ipnt][(alpha, comp)]
                    } else {
                        Complex64::from(0.0)
                    }
                });

                let [g_s, g_z] = self.gradient.compute_grad(&u);

                let mut f_s = CMatPP::zeros();
                let mut f_z = CMatPP::zeros();
                for i in 0..N_PNT_EDGE {
                    for j in 0..N_PNT_EDGE {
                        let ipnt = i * N_PNT_EDGE + j;

                        let mut grad = [g_s[(i, j)], g_z[(i, j)]];
                        if let Some(prt) = self.prt {
                            grad = prt.apply(ipnt, grad);
                        }

                        let mut flux = rheology.meridional_flux(ipnt, grad);
                        if let Some(prt) = self.prt {
                            flux = prt.apply_transpose(ipnt, flux);
                        }

                        f_s[(i, j)] = flux[0];
                        f_z[(i, j)] = flux[1];
                    }
                }

                let mut force = self.gradient.compute_quad(&f_s, &f_z);

                if alpha > 0 {
                    for i in 0..N_PNT_EDGE {
                        for j in 0..N_PNT_EDGE {
                            let s_ij = s[(i, j)];
                            if s_ij > AXIS_TOLERANCE {
                                let modulus = rheology.azimuthal_modulus(i * N_PNT_EDGE + j);
                                force[(i, j)] += u[(i, j)] * (alpha_sq * modulus * weights[(i, j)] / (s_ij * s_ij));
                            }
                        }
                    }
                }

                for i in 0..N_PNT_EDGE {
                    for j in 0..N_PNT_EDGE {
                        let point_stiff = &mut stiff[i * N_PNT_EDGE + j];
                        if alpha < point_stiff.nrows() {
                            point_stiff[(alpha, comp)] = -force[(i, j)];
                        }
                    }
                }
            }
        }

        stiff
    }

    /// A deterministic, non-trivial field shaped to fit each Point
    fn probe_field(&self, seed: usize) -> Vec<FieldMatrix> {
        self.points
            .iter()
            .enumerate()
            .map(|(ipnt, p)| {
                FieldMatrix::from_fn(p.nu() + 1, 3, |alpha, comp| {
                    let phase = (ipnt * 13 + alpha * 5 + comp * 3 + seed * 7) as f64;
                    Complex64::new((phase * 0.7548).sin(), (phase * 0.5698).cos())
                })
            })
            .collect()
    }

    /// A unit translation in every component (order zero only)
    fn translation_field(&self) -> Vec<FieldMatrix> {
        self.points
            .iter()
            .map(|p| {
                let mut field = FieldMatrix::zeros(p.nu() + 1, 3);
                field.row_mut(0).fill(Complex64::from(1.0));
                field
            })
            .collect()
    }
}

/// The largest magnitude in a field
fn max_norm(field: &[FieldMatrix]) -> f64 {
    field
        .iter()
        .flat_map(|m| m.iter())
        .fold(0.0, |acc, c| acc.max(c.norm()))
}

/// `∑ a * b` over every coefficient of two fields
fn bilinear(a: &[FieldMatrix], b: &[FieldMatrix]) -> Complex64 {
    a.iter().zip(b.iter()).map(|(a, b)| a.component_mul(b).sum()).sum()
}

fn check(check: &'static str, residual: f64) -> Result<(), ElementError> {
    if residual > TEST_TOLERANCE {
        log::warn!(
            "element failed the '{}' check (residual: {:e})",
            check,
            residual
        );
        Err(ElementError::InconsistentOperator {
            check,
            residual,
            tolerance: TEST_TOLERANCE,
        })
    } else {
        Ok(())
    }
}

/// A spectral element.
///
/// Concrete types supply their stiffness kernel; everything else can be shared.
/// Mutating calls on one element (`compute_stiff`, `add_source_term`) must not overlap.
pub trait Element<'m>: fmt::Display + Send + Sync {
    fn core(&self) -> &ElementCore<'m>;

    fn core_mut(&mut self) -> &mut ElementCore<'m>;

    /// Name of the element type; shared by every element with the same physics
    fn kind(&self) -> &'static str;

    /// Stiffness force of a displacement field (one [FieldMatrix] per Point) without touching the Points
    fn stiffness(&self, displ: &[FieldMatrix]) -> Vec<FieldMatrix>;

    /// Compute the stiffness force of the Points' current displacement and add it to their stiffness
    fn compute_stiff(&self) {
        let displ = self.core().gather_displ();
        let stiff = self.stiffness(&displ);
        self.core().scatter_stiff(&stiff);
    }

    /// Average time (seconds) of `count` stiffness computations. The Points are left untouched.
    fn measure(&self, count: usize) -> f64 {
        let displ = self.core().gather_displ();

        let start = Instant::now();
        for _ in 0..count {
            std::hint::black_box(self.stiffness(std::hint::black_box(&displ)));
        }
        let elapsed = start.elapsed().as_secs_f64() / count.max(1) as f64;

        log::trace!("{}: {:e} s per stiffness computation", self.cost_signature(), elapsed);
        elapsed
    }

    /// Check the stiffness kernel for internal consistency:
    ///
    /// * a uniform order-zero translation produces no force
    /// * the operator is symmetric on two probe fields
    fn test(&self) -> Result<(), ElementError> {
        let core = self.core();

        let u = core.probe_field(1);
        let v = core.probe_field(2);
        let k_u = self.stiffness(&u);
        let k_v = self.stiffness(&v);

        let scale = max_norm(&k_u).max(max_norm(&k_v));
        if scale == 0.0 {
            return Ok(());
        }

        let k_translation = self.stiffness(&core.translation_field());
        check("translation", max_norm(&k_translation) / scale)?;

        let v_k_u = bilinear(&v, &k_u);
        let u_k_v = bilinear(&u, &k_v);
        let magnitude = v_k_u.norm().max(u_k_v.norm()).max(f64::MIN_POSITIVE);
        check("symmetry", (v_k_u - u_k_v).norm() / magnitude)
    }

    /// Displacement `[u_s, u_φ, u_z]` at azimuth `phi`, interpolated over the Points with `weights`
    fn compute_ground_motion(&self, phi: f64, weights: &RMatPP) -> Vector3<f64> {
        let mut u_spz = Vector3::zeros();

        for i in 0..N_PNT_EDGE {
            for j in 0..N_PNT_EDGE {
                let weight = weights[(i, j)];
                if weight == 0.0 {
                    continue;
                }

                let displ = self.core().point(i * N_PNT_EDGE + j).displ();
                for alpha in 0..displ.nrows() {
                    let factor = if alpha == 0 { 1.0 } else { 2.0 };
                    let phase = Complex64::from_polar(1.0, alpha as f64 * phi);
                    for comp in 0..3 {
                        u_spz[comp] += weight * factor * (displ[(alpha, comp)] * phase).re;
                    }
                }
            }
        }

        u_spz
    }

    /// Retrieve one of the element's Points; panics if `index >= N_PNT_ELEM`
    fn point(&self, index: usize) -> &'m Point {
        self.core().point(index)
    }

    /// Add a source force (one [FieldMatrix] per Point) to the Points' stiffness.
    /// Repeated calls accumulate.
    fn add_source_term(&self, source: &[FieldMatrix]) {
        self.core().add_source_term(source)
    }

    fn max_nr(&self) -> usize {
        self.core().max_nr()
    }

    fn cost_signature(&self) -> CostSignature {
        self.core().cost_signature(self.kind())
    }

    fn axial(&self) -> bool {
        self.core().axial()
    }

    fn form_theta_mat(&self) -> RMatPP {
        self.core().form_theta_mat()
    }

    fn set_domain_tag(&mut self, tag: i32) {
        self.core_mut().set_domain_tag(tag)
    }

    fn domain_tag(&self) -> i32 {
        self.core().domain_tag()
    }
}
