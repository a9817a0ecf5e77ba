use super::{Perturbation, ReferenceType, Volumetric3D, VolumetricError, TINY_DOUBLE};
use crate::geodesy::SphericalPoint;
use nalgebra::Vector3;
use std::fmt;

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};

/// Number of parameters required before the optional flags
pub const NUM_REQUIRED_PARAMS: usize = 7;

/// Beyond this many HWHMs from the core edge a bubble has no effect
pub const CUTOFF_HWHM: f64 = 4.0;

/// A localized Gaussian anomaly with a flat-topped core.
///
/// Inside `radius` of its center the perturbation is saturated at `max`; outside, it decays as a
/// Gaussian with half-width-at-half-maximum `hwhm`, measured from the core edge, and is cut to
/// zero beyond `4 * hwhm`.
#[derive(Clone, Debug)]
pub struct Bubble {
    /// depth of the center (m)
    depth: f64,
    /// latitude of the center (deg)
    lat: f64,
    /// longitude of the center (deg)
    lon: f64,
    /// radius of the saturated core (m)
    radius: f64,
    /// half-width-at-half-maximum of the Gaussian shoulder (m)
    hwhm: f64,
    /// perturbation at the center
    max: f64,
    reference_type: ReferenceType,
    change_vp: bool,
    change_vs: bool,
    change_rho: bool,
    /// cartesian location of the center
    center: Vector3<f64>,
}

impl Bubble {
    /// Build a Bubble from a flat parameter list:
    ///
    /// `[depth (km), lat (deg), lon (deg), radius (km), hwhm (km), max, reference code, (vp), (vs), (rho)]`
    ///
    /// The three trailing flags are optional. Each one that is present switches its quantity on if
    /// it is greater than [TINY_DOUBLE]; any that are missing leave their quantity switched **on**.
    pub fn initialize(params: &[f64]) -> Result<Self, VolumetricError> {
        if params.len() < NUM_REQUIRED_PARAMS {
            return Err(VolumetricError::NotEnoughParameters {
                model: "bubble",
                required: NUM_REQUIRED_PARAMS,
                found: params.len(),
            });
        }

        let depth = params[0] * 1e3;
        let lat = params[1];
        let lon = params[2];

        let radius = params[3] * 1e3;
        let hwhm = params[4] * 1e3;
        let max = params[5];

        let reference_type = ReferenceType::from_code(params[6]);

        if !(radius >= 0.0 && radius.is_finite()) {
            return Err(VolumetricError::InvalidShape {
                model: "bubble",
                parameter: "radius",
                value: radius,
                reason: "must be finite and non-negative",
            });
        }
        if !(hwhm > 0.0 && hwhm.is_finite()) {
            return Err(VolumetricError::InvalidShape {
                model: "bubble",
                parameter: "hwhm",
                value: hwhm,
                reason: "must be finite and positive",
            });
        }

        let mut flags = [true; 3];
        for (flag, value) in flags.iter_mut().zip(params.iter().skip(NUM_REQUIRED_PARAMS)) {
            *flag = *value > TINY_DOUBLE;
        }
        if params.len() < NUM_REQUIRED_PARAMS + flags.len() {
            log::debug!(
                "bubble at ({}, {}) given {} of 3 quantity flags; the rest default to on",
                lat,
                lon,
                params.len() - NUM_REQUIRED_PARAMS
            );
        }
        let [change_vp, change_vs, change_rho] = flags;

        Ok(Self {
            depth,
            lat,
            lon,
            radius,
            hwhm,
            max,
            reference_type,
            change_vp,
            change_vs,
            change_rho,
            center: SphericalPoint::from_geographic(lat, lon, depth).to_cartesian(),
        })
    }

    /// Standard deviation of the Gaussian shoulder
    pub fn std_dev(&self) -> f64 {
        self.hwhm / (2.0 * 2.0_f64.ln()).sqrt()
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn hwhm(&self) -> f64 {
        self.hwhm
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Which quantities are perturbed: `[vp, vs, rho]`
    pub fn affects(&self) -> [bool; 3] {
        [self.change_vp, self.change_vs, self.change_rho]
    }

    /// Distance past the core edge, floored at zero
    fn clamped_distance(&self, point: &SphericalPoint) -> f64 {
        let distance = (self.center - point.to_cartesian()).norm() - self.radius;
        distance.max(0.0)
    }

    /// Produce a Json Object that describes this Bubble
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "model": self.model_name(),
            "depth": self.depth,
            "lat": self.lat,
            "lon": self.lon,
            "radius": self.radius,
            "hwhm": self.hwhm,
            "max": self.max,
            "reference_type": self.reference_type.name(),
            "affects": array![self.change_vp, self.change_vs, self.change_rho],
        }
    }
}

impl Volumetric3D for Bubble {
    fn model_name(&self) -> &'static str {
        "bubble"
    }

    fn reference_type(&self) -> ReferenceType {
        self.reference_type
    }

    fn perturbation_at(&self, point: &SphericalPoint, _r_elem_center: f64) -> Option<Perturbation> {
        let distance = self.clamped_distance(point);

        // hard cutoff; no taper
        if distance > CUTOFF_HWHM * self.hwhm {
            return None;
        }

        let std_dev = self.std_dev();
        let gaussian = self.max * (-distance * distance / (std_dev * std_dev * 2.0)).exp();

        let mut perturbation = Perturbation::zero();
        if self.change_vp {
            perturbation.dvpv = gaussian;
            perturbation.dvph = gaussian;
        }
        if self.change_vs {
            perturbation.dvsv = gaussian;
            perturbation.dvsh = gaussian;
        }
        if self.change_rho {
            perturbation.drho = gaussian;
        }

        Some(perturbation)
    }
}

impl fmt::Display for Bubble {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let yes_no = |flag: bool| if flag { "YES" } else { "NO" };

        writeln!(f)?;
        writeln!(f, "==================== Volumetric3D ====================")?;
        writeln!(f, "  Model Name            =   {}", self.model_name())?;
        writeln!(f, "  Depth (km)            =   {}", self.depth / 1e3)?;
        writeln!(f, "  Latitude (deg)        =   {}", self.lat)?;
        writeln!(f, "  Longitude (deg)       =   {}", self.lon)?;
        writeln!(f, "  Core Radius (km)      =   {}", self.radius / 1e3)?;
        writeln!(f, "  HWHM (km)             =   {}", self.hwhm / 1e3)?;
        writeln!(f, "  Maximum at Center     =   {}", self.max)?;
        writeln!(f, "  Reference Type        =   {}", self.reference_type)?;
        writeln!(f, "  Affects VP            =   {}", yes_no(self.change_vp))?;
        writeln!(f, "  Affects VS            =   {}", yes_no(self.change_vs))?;
        writeln!(f, "  Affects Density       =   {}", yes_no(self.change_rho))?;
        writeln!(f, "==================== Volumetric3D ====================")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::R_OUTER;
    use std::f64::consts::FRAC_PI_2;

    // 100 km deep at (0, 0); 50 km core; 20 km hwhm; 5% maximum; absolute
    const EXAMPLE: [f64; 7] = [100.0, 0.0, 0.0, 50.0, 20.0, 0.05, 0.0];

    // a point on the same radial line as the example bubble's center, `below` meters deeper
    fn below_center(below: f64) -> SphericalPoint {
        SphericalPoint::new(R_OUTER - 100e3 - below, FRAC_PI_2, 0.0)
    }

    #[test]
    fn parameter_parsing() {
        let bubble = Bubble::initialize(&EXAMPLE).unwrap();

        assert_eq!(bubble.depth(), 100e3);
        assert_eq!(bubble.radius(), 50e3);
        assert_eq!(bubble.hwhm(), 20e3);
        assert_eq!(bubble.max(), 0.05);
        assert_eq!(bubble.reference_type(), ReferenceType::Absolute);
        assert_eq!(bubble.affects(), [true, true, true]);
    }

    #[test]
    fn too_few_parameters() {
        for n in 0..NUM_REQUIRED_PARAMS {
            match Bubble::initialize(&EXAMPLE[0..n]) {
                Err(VolumetricError::NotEnoughParameters { required, found, .. }) => {
                    assert_eq!(required, 7);
                    assert_eq!(found, n);
                }
                _ => panic!("expected a NotEnoughParameters error for {} parameters", n),
            }
        }
    }

    #[test]
    fn invalid_shapes() {
        let mut params = EXAMPLE;
        params[4] = 0.0;
        assert!(matches!(
            Bubble::initialize(&params),
            Err(VolumetricError::InvalidShape { parameter: "hwhm", .. })
        ));

        let mut params = EXAMPLE;
        params[3] = -1.0;
        assert!(matches!(
            Bubble::initialize(&params),
            Err(VolumetricError::InvalidShape { parameter: "radius", .. })
        ));

        // a zero-radius core is allowed
        let mut params = EXAMPLE;
        params[3] = 0.0;
        assert!(Bubble::initialize(&params).is_ok());
    }

    #[test]
    fn partial_flags_default_on() {
        let mut params = EXAMPLE.to_vec();

        params.push(0.0);
        let bubble = Bubble::initialize(&params).unwrap();
        assert_eq!(bubble.affects(), [false, true, true]);

        params.push(1.0);
        let bubble = Bubble::initialize(&params).unwrap();
        assert_eq!(bubble.affects(), [false, true, true]);

        params.push(1e-200);
        let bubble = Bubble::initialize(&params).unwrap();
        assert_eq!(bubble.affects(), [false, true, false]);

        // anything past the third flag is ignored
        params.push(0.0);
        let bubble = Bubble::initialize(&params).unwrap();
        assert_eq!(bubble.affects(), [false, true, false]);
    }

    #[test]
    fn saturated_inside_core() {
        let bubble = Bubble::initialize(&EXAMPLE).unwrap();

        for below in [0.0, 1e3, 25e3, 49.9e3, -40e3] {
            let p = bubble.perturbation_at(&below_center(below), 0.0).unwrap();
            assert_eq!(p.as_array(), [0.05; 5]);
        }
    }

    #[test]
    fn example_end_to_end() {
        let bubble = Bubble::initialize(&EXAMPLE).unwrap();

        let anchor = SphericalPoint::from_geographic(0.0, 0.0, 100e3);
        let at_anchor = bubble.perturbation_at(&anchor, anchor.r).unwrap();
        assert_eq!(at_anchor.as_array(), [0.05; 5]);

        assert!(bubble.perturbation_at(&below_center(250e3), 0.0).is_none());
    }

    #[test]
    fn half_maximum_at_one_hwhm() {
        let bubble = Bubble::initialize(&EXAMPLE).unwrap();
        let p = bubble.perturbation_at(&below_center(50e3 + 20e3), 0.0).unwrap();

        for d in p.as_array() {
            assert!((d - 0.025).abs() < 1e-12);
        }
    }

    #[test]
    fn hard_cutoff() {
        let bubble = Bubble::initialize(&EXAMPLE).unwrap();

        // clamped distance of exactly 4 hwhm is still in range
        let edge = bubble.perturbation_at(&below_center(50e3 + 80e3), 0.0).unwrap();
        let residual = 0.05 * 2.0_f64.powi(-16);
        assert!(edge.dvpv > 0.0);
        assert!((edge.dvpv - residual).abs() < 1e-15);

        // just beyond is out of range entirely
        assert!(bubble.perturbation_at(&below_center(50e3 + 80e3 + 1.0), 0.0).is_none());
    }

    #[test]
    fn monotonic_decay() {
        let bubble = Bubble::initialize(&EXAMPLE).unwrap();

        let mut last = f64::MAX;
        for step in 0..=130 {
            let p = bubble.perturbation_at(&below_center(step as f64 * 1e3), 0.0).unwrap();
            assert!(p.dvsh <= last);
            last = p.dvsh;
        }
    }

    #[test]
    fn negative_magnitude() {
        let mut params = EXAMPLE;
        params[5] = -0.1;
        let bubble = Bubble::initialize(&params).unwrap();

        let p = bubble.perturbation_at(&below_center(70e3), 0.0).unwrap();
        assert!((p.drho + 0.05).abs() < 1e-12);
    }

    #[test]
    fn in_range_without_effect() {
        let mut params = EXAMPLE.to_vec();
        params.extend([0.0, 0.0, 0.0]);
        let bubble = Bubble::initialize(&params).unwrap();

        let p = bubble.perturbation_at(&below_center(0.0), 0.0).unwrap();
        assert!(p.is_zero());
    }

    #[test]
    fn unaffected_quantities_stay_zero() {
        let mut params = EXAMPLE.to_vec();
        params.extend([1.0, 0.0, 1.0]);
        let bubble = Bubble::initialize(&params).unwrap();

        let p = bubble.perturbation_at(&below_center(10e3), 0.0).unwrap();
        assert_eq!(p.dvpv, 0.05);
        assert_eq!(p.dvph, 0.05);
        assert_eq!(p.dvsv, 0.0);
        assert_eq!(p.dvsh, 0.0);
        assert_eq!(p.drho, 0.05);
    }

    #[test]
    fn description() {
        let mut params = EXAMPLE.to_vec();
        params[6] = 2.0;
        params.push(0.0);
        let text = Bubble::initialize(&params).unwrap().to_string();

        assert!(text.contains("bubble"));
        assert!(text.contains("ReferenceDiff"));
        assert!(text.contains("Affects VP            =   NO"));
        assert!(text.contains("Affects Density       =   YES"));
        assert!(text.contains("HWHM (km)             =   20"));
    }

    #[test]
    fn concurrent_sampling() {
        use rayon::prelude::*;

        let bubble = Bubble::initialize(&EXAMPLE).unwrap();
        let serial: Vec<Option<Perturbation>> = (0..1000)
            .map(|i| bubble.perturbation_at(&below_center(i as f64 * 200.0), 0.0))
            .collect();
        let parallel: Vec<Option<Perturbation>> = (0..1000)
            .into_par_iter()
            .map(|i| bubble.perturbation_at(&below_center(i as f64 * 200.0), 0.0))
            .collect();

        assert_eq!(serial, parallel);
    }
}
