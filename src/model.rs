/// Gaussian "bubble" heterogeneity
pub mod bubble;
/// Ordered collections of heterogeneities loaded from configuration files
pub mod library;

pub use bubble::Bubble;
pub use library::{Contribution, HeterogeneityLibrary};

use crate::geodesy::SphericalPoint;
use std::fmt;
use thiserror::Error;

/// Values at or below this are read as "off" in flag parameters
pub const TINY_DOUBLE: f64 = 1e-100;

/// How a perturbation is meant to be combined with the background model.
///
/// The combination itself belongs to whoever consumes the perturbations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Absolute,
    Reference1D,
    ReferenceDiff,
    Reference3D,
}

impl ReferenceType {
    /// Bucket a real-valued selector: `[0, 0.5)`, `[0.5, 1.5)`, `[1.5, 2.5)`, `[2.5, ∞)`
    pub fn from_code(code: f64) -> Self {
        if code < 0.5 {
            Self::Absolute
        } else if code < 1.5 {
            Self::Reference1D
        } else if code < 2.5 {
            Self::ReferenceDiff
        } else {
            Self::Reference3D
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Absolute => "Absolute",
            Self::Reference1D => "Reference1D",
            Self::ReferenceDiff => "ReferenceDiff",
            Self::Reference3D => "Reference3D",
        }
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Perturbations of the elastic parameters and density at one location
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Perturbation {
    pub dvpv: f64,
    pub dvph: f64,
    pub dvsv: f64,
    pub dvsh: f64,
    pub drho: f64,
}

impl Perturbation {
    pub const fn zero() -> Self {
        Self {
            dvpv: 0.0,
            dvph: 0.0,
            dvsv: 0.0,
            dvsh: 0.0,
            drho: 0.0,
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.dvpv, self.dvph, self.dvsv, self.dvsh, self.drho]
    }

    /// True if every quantity is exactly zero
    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|d| *d == 0.0)
    }
}

impl fmt::Display for Perturbation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "(dvpv: {}, dvph: {}, dvsv: {}, dvsh: {}, drho: {})",
            self.dvpv, self.dvph, self.dvsv, self.dvsh, self.drho
        )
    }
}

/// A source of 3D volumetric heterogeneity.
///
/// Implementors are immutable once built and are sampled concurrently from many threads.
pub trait Volumetric3D: fmt::Display + Send + Sync {
    /// Short identifier used in configuration files
    fn model_name(&self) -> &'static str;

    fn reference_type(&self) -> ReferenceType;

    /// Perturbation at a point, or `None` if the point is outside this heterogeneity's range.
    ///
    /// `r_elem_center` is the radius of the center of the element containing the point;
    /// models without radial discontinuities may ignore it.
    fn perturbation_at(&self, point: &SphericalPoint, r_elem_center: f64) -> Option<Perturbation>;
}

/// Construct a boxed [Volumetric3D] from its model name and flat parameter list
pub fn build(model: &str, params: &[f64]) -> Result<Box<dyn Volumetric3D>, VolumetricError> {
    match model.trim().to_lowercase().as_str() {
        "bubble" => Ok(Box::new(Bubble::initialize(params)?)),
        _ => Err(VolumetricError::UnknownModel(model.to_string())),
    }
}

#[derive(Debug, Error)]
pub enum VolumetricError {
    #[error("Not enough parameters to initialize a {model} model; expected at least {required}, found {found}!")]
    NotEnoughParameters {
        model: &'static str,
        required: usize,
        found: usize,
    },
    #[error("Invalid {parameter} ({value}) for a {model} model; {reason}")]
    InvalidShape {
        model: &'static str,
        parameter: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("Unknown Volumetric3D model: '{0}'")]
    UnknownModel(String),
    #[error("Malformed Volumetric3D configuration: {0}")]
    Config(String),
    #[error("Unable to read Volumetric3D configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse Volumetric3D configuration as JSON: {0}")]
    Json(#[from] json::Error),
}
