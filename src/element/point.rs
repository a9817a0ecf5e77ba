use super::FieldMatrix;
use nalgebra::Vector2;
use num_complex::Complex64;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Points closer than this (m) to the axis are on it
pub const AXIS_TOLERANCE: f64 = 1e-9;

/// A GLL node in the meridional (s, z) plane.
///
/// A Point carries the Fourier coefficients (orders `0..=nu`, components s, φ, z) of the
/// displacement and of the accumulated stiffness force. Points are shared by neighbouring
/// elements, so both buffers sit behind a lock.
#[derive(Debug)]
pub struct Point {
    nr: usize,
    coords: Vector2<f64>,
    displ: Mutex<FieldMatrix>,
    stiff: Mutex<FieldMatrix>,
}

impl Point {
    /// Construct a Point with `nr` azimuthal samples at `[s, z]`
    pub fn new(nr: usize, [s, z]: [f64; 2]) -> Self {
        assert!(nr > 0, "A Point needs at least one azimuthal sample!");
        let nu = nr / 2;

        Self {
            nr,
            coords: Vector2::new(s, z),
            displ: Mutex::new(FieldMatrix::zeros(nu + 1, 3)),
            stiff: Mutex::new(FieldMatrix::zeros(nu + 1, 3)),
        }
    }

    pub fn nr(&self) -> usize {
        self.nr
    }

    /// Highest Fourier order resolved at this Point
    pub fn nu(&self) -> usize {
        self.nr / 2
    }

    pub fn coords(&self) -> Vector2<f64> {
        self.coords
    }

    /// Distance from the axis
    pub fn s(&self) -> f64 {
        self.coords[0]
    }

    pub fn z(&self) -> f64 {
        self.coords[1]
    }

    pub fn axial(&self) -> bool {
        self.coords[0].abs() < AXIS_TOLERANCE
    }

    /// Overwrite the displacement. Orders beyond `displ`'s rows are zeroed; orders beyond `nu` are dropped.
    pub fn set_displ(&self, displ: &FieldMatrix) {
        let mut current = lock(&self.displ);
        current.fill(Complex64::from(0.0));
        copy_overlap(&mut current, displ, |dst, src| *dst = src);
    }

    pub fn displ(&self) -> FieldMatrix {
        lock(&self.displ).clone()
    }

    /// Accumulate a stiffness contribution over the orders both matrices share
    pub fn add_to_stiff(&self, contribution: &FieldMatrix) {
        copy_overlap(&mut lock(&self.stiff), contribution, |dst, src| *dst += src);
    }

    pub fn stiff(&self) -> FieldMatrix {
        lock(&self.stiff).clone()
    }

    pub fn reset_stiff(&self) {
        lock(&self.stiff).fill(Complex64::from(0.0));
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Point (s: {:.3}, z: {:.3}, nr: {})",
            self.coords[0], self.coords[1], self.nr
        )
    }
}

fn lock(buffer: &Mutex<FieldMatrix>) -> MutexGuard<'_, FieldMatrix> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

fn copy_overlap<F>(dst: &mut FieldMatrix, src: &FieldMatrix, op: F)
where
    F: Fn(&mut Complex64, Complex64),
{
    assert_eq!(
        src.ncols(),
        3,
        "Point fields have 3 components; cannot combine with a {}-component field!",
        src.ncols()
    );

    let rows = std::cmp::min(dst.nrows(), src.nrows());
    for alpha in 0..rows {
        for comp in 0..3 {
            op(&mut dst[(alpha, comp)], src[(alpha, comp)]);
        }
    }
}
