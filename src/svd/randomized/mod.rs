//! Randomized range finder (Halko, Martinsson & Tropp, algorithm 4.4).

use anyhow::bail;
use log::trace;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::LinalgError;
use crate::svd::exact::orthonormalize;
use crate::utils::LinearOperator;

/// Draws an `nrows × ncols` Gaussian test matrix.
pub fn gaussian_matrix<R: Rng + ?Sized>(nrows: usize, ncols: usize, rng: &mut R) -> Array2<f64> {
    Array2::from_shape_fn((nrows, ncols), |_| StandardNormal.sample(&mut *rng))
}

/// Approximates the dominant column space of `a` by an `m × size` matrix
/// with orthonormal columns.
///
/// `size` is the sketch width (target rank plus oversampling) and must lie in
/// `1..=min(m, n)`. Each power iteration re-orthonormalizes before and after
/// the transposed product so repeated multiplication cannot collapse the
/// numerical rank of the sketch.
pub fn randomized_range_finder<A, R>(
    a: &A,
    size: usize,
    n_power_iterations: usize,
    rng: &mut R,
) -> anyhow::Result<Array2<f64>>
where
    A: LinearOperator + ?Sized,
    R: Rng + ?Sized,
{
    let (m, n) = a.shape();
    if size == 0 || size > m.min(n) {
        bail!(LinalgError::invalid(format!(
            "Sketch size {} must be between 1 and min({}, {})",
            size, m, n
        )));
    }

    let omega = gaussian_matrix(n, size, rng);
    let mut y = a.mul_dense(omega.view());

    for iteration in 0..n_power_iterations {
        let q = orthonormalize(y.view())?;
        let z = orthonormalize(a.t_mul_dense(q.view()).view())?;
        y = a.mul_dense(z.view());
        trace!("power iteration {}/{} done", iteration + 1, n_power_iterations);
    }

    orthonormalize(y.view())
}
