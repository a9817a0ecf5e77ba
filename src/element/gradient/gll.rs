use nalgebra::{DMatrix, SymmetricEigen};

/// Gauss-Lobatto-Legendre points and weights over `[-1, 1]` for a polynomial order of `n_pol`.
///
/// The interior points are the roots of the Jacobi polynomial P<sup>(1,1)</sup><sub>n_pol - 1</sub>,
/// found as the eigenvalues of its symmetric recurrence matrix.
///
/// ```
/// use sem_earth::element::gradient::gll_points;
///
/// let (points, weights) = gll_points(4);
///
/// assert!((points[1] + (3.0_f64 / 7.0).sqrt()).abs() < 1e-12);
/// assert!(points[2].abs() < 1e-12);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-12);
/// ```
pub fn gll_points(n_pol: usize) -> (Vec<f64>, Vec<f64>) {
    assert!(n_pol > 0, "GLL points require a polynomial order of at least 1!");

    let n_inner = n_pol - 1;
    let mut points = Vec::with_capacity(n_pol + 1);
    points.push(-1.0);

    if n_inner > 0 {
        let betas: Vec<f64> = (1..n_inner)
            .map(|k| {
                let k = k as f64;
                (k * (k + 2.0) / ((2.0 * k + 1.0) * (2.0 * k + 3.0))).sqrt()
            })
            .collect();

        let polymat: DMatrix<f64> = DMatrix::from_fn(n_inner, n_inner, |r, c| {
            if r == c + 1 {
                betas[c]
            } else if c == r + 1 {
                betas[r]
            } else {
                0.0
            }
        });

        let mut inner: Vec<f64> = SymmetricEigen::new(polymat)
            .eigenvalues
            .iter()
            .cloned()
            .collect();
        inner.sort_by(|a, b| a.total_cmp(b));

        points.extend(inner);
    }

    points.push(1.0);

    let n = n_pol as f64;
    let weights = points
        .iter()
        .map(|x| 2.0 / (n * (n + 1.0) * legendre(n_pol, *x).powi(2)))
        .collect();

    (points, weights)
}

/// Derivative matrix `D[(i, j)] = l_j'(x_i)` of the Lagrange interpolants through the GLL points
pub fn gll_derivatives(points: &[f64]) -> DMatrix<f64> {
    let n_pol = points.len() - 1;
    let corner = (n_pol * (n_pol + 1)) as f64 / 4.0;
    let p_n: Vec<f64> = points.iter().map(|x| legendre(n_pol, *x)).collect();

    DMatrix::from_fn(n_pol + 1, n_pol + 1, |i, j| {
        if i != j {
            p_n[i] / (p_n[j] * (points[i] - points[j]))
        } else if i == 0 {
            -corner
        } else if i == n_pol {
            corner
        } else {
            0.0
        }
    })
}

/// Legendre polynomial of order `n` at `x` (three-term recurrence)
fn legendre(n: usize, x: f64) -> f64 {
    let (mut p_prev, mut p) = (1.0, x);
    if n == 0 {
        return p_prev;
    }

    for k in 1..n {
        let k = k as f64;
        let p_next = ((2.0 * k + 1.0) * x * p - k * p_prev) / (k + 1.0);
        p_prev = p;
        p = p_next;
    }
    p
}
