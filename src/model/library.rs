use super::{build, Perturbation, ReferenceType, Volumetric3D, VolumetricError};
use crate::geodesy::SphericalPoint;
use json::JsonValue;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::fmt;
use std::fs::read_to_string;

/// Most points fall inside only a handful of heterogeneities
pub const EXPECTED_NUM_CONTRIBUTIONS: usize = 4;

pub type Contributions = SmallVec<[Contribution; EXPECTED_NUM_CONTRIBUTIONS]>;

/// The perturbation one heterogeneity applies at a point, tagged with how it should be combined
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contribution {
    /// position of the contributing heterogeneity in its library
    pub source: usize,
    pub reference_type: ReferenceType,
    pub perturbation: Perturbation,
}

/// An ordered collection of [Volumetric3D] heterogeneities
#[derive(Default)]
pub struct HeterogeneityLibrary {
    sources: Vec<Box<dyn Volumetric3D>>,
}

impl HeterogeneityLibrary {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Load a library from a JSON file with the following format
    ///
    /// ```JSON
    /// {
    ///     "Volumetric3D": [
    ///         {
    ///             "model": "bubble",
    ///             "parameters": [depth_km, lat, lon, radius_km, hwhm_km, max, reference_code, vp, vs, rho]
    ///         },
    ///         {
    ///             "model": "bubble",
    ///             "parameters": [100.0, 0.0, 0.0, 50.0, 20.0, 0.05, 0]
    ///         }
    ///     ]
    /// }
    /// ```
    ///
    /// Heterogeneities are kept in the order they appear in the file.
    pub fn from_file(path: impl AsRef<str>) -> Result<Self, VolumetricError> {
        let contents = read_to_string(path.as_ref())?;
        let library = Self::from_json(&json::parse(&contents)?)?;

        log::info!(
            "Loaded {} Volumetric3D model(s) from '{}'",
            library.len(),
            path.as_ref()
        );

        Ok(library)
    }

    pub fn from_json(config: &JsonValue) -> Result<Self, VolumetricError> {
        let entries = &config["Volumetric3D"];
        if !entries.is_array() {
            return Err(VolumetricError::Config(String::from(
                "expected a 'Volumetric3D' array",
            )));
        }

        let mut library = Self::new();
        for (idx, entry) in entries.members().enumerate() {
            let model = entry["model"].as_str().ok_or_else(|| {
                VolumetricError::Config(format!("entry {} has no 'model' name", idx))
            })?;

            if !entry["parameters"].is_array() {
                return Err(VolumetricError::Config(format!(
                    "entry {} ({}) has no 'parameters' array",
                    idx, model
                )));
            }
            let params = entry["parameters"]
                .members()
                .map(|p| p.as_f64())
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| {
                    VolumetricError::Config(format!(
                        "entry {} ({}) has non-numeric parameters",
                        idx, model
                    ))
                })?;

            library.push(build(model, &params)?);
        }

        Ok(library)
    }

    pub fn push(&mut self, source: Box<dyn Volumetric3D>) {
        log::debug!("{}", source);
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate over all heterogeneities in order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Volumetric3D> + '_ {
        self.sources.iter().map(|s| s.as_ref())
    }

    /// Contributions of every heterogeneity whose range includes `point`, in library order
    pub fn contributions_at(&self, point: &SphericalPoint, r_elem_center: f64) -> Contributions {
        self.sources
            .iter()
            .enumerate()
            .filter_map(|(idx, source)| {
                source
                    .perturbation_at(point, r_elem_center)
                    .map(|perturbation| Contribution {
                        source: idx,
                        reference_type: source.reference_type(),
                        perturbation,
                    })
            })
            .collect()
    }

    /// Same as `contributions_at` over many points, computed in parallel using the Rayon Global ThreadPool.
    ///
    /// Each point is paired with the radius of its element's center.
    pub fn par_contributions(&self, points: &[(SphericalPoint, f64)]) -> Vec<Contributions> {
        points
            .par_iter()
            .map(|(point, r_elem_center)| self.contributions_at(point, *r_elem_center))
            .collect()
    }
}

impl fmt::Display for HeterogeneityLibrary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for source in self.sources.iter() {
            write!(f, "{}", source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::R_OUTER;
    use crate::model::Bubble;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn load_library_file() {
        let library = HeterogeneityLibrary::from_file("./test_input/volumetric_bubbles.json").unwrap();

        assert_eq!(library.len(), 3);
        let reference_types: Vec<ReferenceType> =
            library.iter().map(|s| s.reference_type()).collect();
        assert_eq!(
            reference_types,
            vec![
                ReferenceType::Absolute,
                ReferenceType::Reference1D,
                ReferenceType::Reference3D
            ]
        );
        assert!(library.iter().all(|s| s.model_name() == "bubble"));
    }

    #[test]
    fn contributions_in_order() {
        let library = HeterogeneityLibrary::from_file("./test_input/volumetric_bubbles.json").unwrap();

        // center of the first two (co-located) bubbles
        let point = SphericalPoint::new(R_OUTER - 100e3, FRAC_PI_2, 0.0);
        let contributions = library.contributions_at(&point, point.r);

        assert_eq!(contributions.len(), 2);
        assert_eq!(contributions[0].source, 0);
        assert_eq!(contributions[0].reference_type, ReferenceType::Absolute);
        assert_eq!(contributions[0].perturbation.dvsv, 0.05);
        assert_eq!(contributions[1].source, 1);
        assert_eq!(contributions[1].reference_type, ReferenceType::Reference1D);
        assert_eq!(contributions[1].perturbation.dvpv, 0.0);
        assert_eq!(contributions[1].perturbation.drho, -0.02);

        // on the far side of the earth, nothing applies
        let antipode = SphericalPoint::new(R_OUTER - 100e3, FRAC_PI_2, std::f64::consts::PI);
        assert!(library.contributions_at(&antipode, antipode.r).is_empty());
    }

    #[test]
    fn parallel_matches_serial() {
        let library = HeterogeneityLibrary::from_file("./test_input/volumetric_bubbles.json").unwrap();

        let points: Vec<(SphericalPoint, f64)> = (0..500)
            .map(|i| {
                let p = SphericalPoint::new(R_OUTER - i as f64 * 1e3, FRAC_PI_2 - i as f64 * 1e-4, 0.0);
                (p, p.r)
            })
            .collect();

        let serial: Vec<Contributions> = points
            .iter()
            .map(|(p, r)| library.contributions_at(p, *r))
            .collect();

        assert_eq!(serial, library.par_contributions(&points));
        assert!(serial.iter().any(|c| !c.is_empty()));
    }

    #[test]
    fn malformed_configurations() {
        let missing = json::parse(r#"{"Models": []}"#).unwrap();
        assert!(matches!(
            HeterogeneityLibrary::from_json(&missing),
            Err(VolumetricError::Config(_))
        ));

        let no_name = json::parse(r#"{"Volumetric3D": [{"parameters": [1, 2, 3, 4, 5, 6, 7]}]}"#).unwrap();
        assert!(matches!(
            HeterogeneityLibrary::from_json(&no_name),
            Err(VolumetricError::Config(_))
        ));

        let text_params =
            json::parse(r#"{"Volumetric3D": [{"model": "bubble", "parameters": [1, "a", 3, 4, 5, 6, 7]}]}"#)
                .unwrap();
        assert!(matches!(
            HeterogeneityLibrary::from_json(&text_params),
            Err(VolumetricError::Config(_))
        ));

        let short = json::parse(r#"{"Volumetric3D": [{"model": "bubble", "parameters": [1, 2, 3]}]}"#).unwrap();
        assert!(matches!(
            HeterogeneityLibrary::from_json(&short),
            Err(VolumetricError::NotEnoughParameters { found: 3, .. })
        ));

        let unknown = json::parse(r#"{"Volumetric3D": [{"model": "blob", "parameters": []}]}"#).unwrap();
        assert!(matches!(
            HeterogeneityLibrary::from_json(&unknown),
            Err(VolumetricError::UnknownModel(_))
        ));

        assert!(matches!(
            HeterogeneityLibrary::from_file("./test_input/does_not_exist.json"),
            Err(VolumetricError::Io(_))
        ));
    }

    #[test]
    fn describe_all_sources() {
        let mut library = HeterogeneityLibrary::new();
        assert!(library.is_empty());
        assert!(library.to_string().is_empty());

        library.push(Box::new(Bubble::initialize(&[10.0, 0.0, 0.0, 1.0, 1.0, 0.1, 0.0]).unwrap()));
        library.push(Box::new(Bubble::initialize(&[20.0, 0.0, 0.0, 1.0, 1.0, 0.1, 3.0]).unwrap()));

        let text = library.to_string();
        assert_eq!(text.matches("Model Name").count(), 2);
        assert!(text.contains("Reference3D"));
    }

    #[cfg(feature = "json_export")]
    #[test]
    fn export_bubble_json() {
        let bubble = Bubble::initialize(&[100.0, 10.0, -20.0, 50.0, 20.0, 0.05, 2.0, 1.0]).unwrap();
        let exported = bubble.to_json();

        assert_eq!(exported["model"], "bubble");
        assert_eq!(exported["reference_type"], "ReferenceDiff");
        assert_eq!(exported["hwhm"].as_f64(), Some(20e3));
        assert_eq!(exported["affects"][2].as_bool(), Some(true));
    }
}
