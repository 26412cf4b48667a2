use ndarray::{Array2, ArrayView2};

use crate::error::LinalgError;

/// Read-only matrix capability that every input representation implements.
///
/// The randomized range finder, `svd_fast` and the CCA driver only ever touch
/// raw input data through these two products, so they are written once and
/// never branch on whether the input is dense, a collection of sparse rows or
/// a CSR matrix.
pub trait LinearOperator {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    /// Computes `A·X` for a dense `X` with `ncols()` rows.
    ///
    /// Panics if `x.nrows() != self.ncols()`.
    fn mul_dense(&self, x: ArrayView2<f64>) -> Array2<f64>;

    /// Computes `Aᵗ·Y` for a dense `Y` with `nrows()` rows.
    ///
    /// Panics if `y.nrows() != self.nrows()`.
    fn t_mul_dense(&self, y: ArrayView2<f64>) -> Array2<f64>;

    fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
}

impl<T: LinearOperator + ?Sized> LinearOperator for &T {
    fn nrows(&self) -> usize {
        (**self).nrows()
    }

    fn ncols(&self) -> usize {
        (**self).ncols()
    }

    fn mul_dense(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (**self).mul_dense(x)
    }

    fn t_mul_dense(&self, y: ArrayView2<f64>) -> Array2<f64> {
        (**self).t_mul_dense(y)
    }
}

/// Fails with `InvalidArgument` unless `x` can be right-multiplied onto `op`.
pub(crate) fn check_mul_shape<A: LinearOperator + ?Sized>(
    op: &A,
    x: &ArrayView2<f64>,
) -> anyhow::Result<()> {
    if x.nrows() != op.ncols() {
        return Err(LinalgError::invalid(format!(
            "Cannot multiply a {}x{} matrix by a {}x{} matrix",
            op.nrows(),
            op.ncols(),
            x.nrows(),
            x.ncols()
        ))
        .into());
    }
    Ok(())
}

/// Largest absolute deviation of `QᵗQ` from the identity.
pub(crate) fn orthonormality_error(q: ArrayView2<f64>) -> f64 {
    let gram = q.t().dot(&q);
    gram.indexed_iter()
        .map(|((i, j), &v)| if i == j { (v - 1.0).abs() } else { v.abs() })
        .fold(0.0, f64::max)
}
