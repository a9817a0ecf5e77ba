/// Coordinate conventions for a spherical Earth
pub mod geodesy;
/// Volumetric 3D heterogeneities and their perturbations
pub mod model;
/// Spectral elements in the meridional plane
pub mod element;

pub use element::{
    CostSignature, ElasticProperties, Element, ElementError, FieldMatrix, Gradient,
    IsotropicElement, Point, Prt, TransverselyIsotropicElement,
};
pub use geodesy::SphericalPoint;
pub use model::{
    Bubble, HeterogeneityLibrary, Perturbation, ReferenceType, Volumetric3D, VolumetricError,
};
