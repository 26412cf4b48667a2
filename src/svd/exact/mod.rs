//! Small dense factorizations.
//!
//! These only ever see the reduced sketches produced by the randomized code
//! paths (a few dozen columns), so a full decomposition is cheap. QR goes
//! through nalgebra, the SVD through faer.

use anyhow::bail;
use faer_ext::{IntoFaer, IntoNdarray};
use nalgebra::linalg::QR;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::error::LinalgError;

/// Largest accepted `max|A - U·diag(s)·Vᵗ|` relative to `max|A|`.
const RECONSTRUCTION_TOLERANCE: f64 = 1e-10;

fn to_nalgebra(a: ArrayView2<f64>) -> DMatrix<f64> {
    a.into_nalgebra().clone_owned()
}

fn max_abs<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

fn ensure_finite<'a>(values: impl IntoIterator<Item = &'a f64>, what: &str) -> anyhow::Result<()> {
    if values.into_iter().any(|v| !v.is_finite()) {
        bail!(LinalgError::numerical(format!("{} contains non-finite values", what)));
    }
    Ok(())
}

/// Returns an `m × min(m, l)` matrix with orthonormal columns spanning the
/// column space of the `m × l` input (Householder QR, thin Q).
pub fn orthonormalize(y: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
    ensure_finite(y.iter(), "Sketch matrix")?;
    let q = QR::new(to_nalgebra(y)).q();
    let q = q.into_ndarray2();
    ensure_finite(q.iter(), "Orthonormal basis")?;
    Ok(q)
}

/// Thin SVD `A = U·diag(s)·Vᵗ` of a small dense matrix.
///
/// For an `m × n` input the factors are `U: m × p`, `s: p`, `V: n × p` with
/// `p = min(m, n)` and `s` sorted in descending order. Factors that do not
/// reproduce `A` are rejected with a `NumericalFailure`.
pub fn exact_svd(a: ArrayView2<f64>) -> anyhow::Result<(Array2<f64>, Array1<f64>, Array2<f64>)> {
    ensure_finite(a.iter(), "SVD input")?;
    let (m, n) = a.dim();
    if m == 0 || n == 0 {
        return Ok((Array2::zeros((m, 0)), Array1::zeros(0), Array2::zeros((n, 0))));
    }
    let p = m.min(n);

    let svd = a.into_faer().svd();
    let s_diag = svd.s_diagonal();
    let s: Vec<f64> = (0..p).map(|i| s_diag.read(i)).collect();

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&i, &j| s[j].total_cmp(&s[i]));

    let u = svd.u().into_ndarray().select(Axis(1), &order);
    let v = svd.v().into_ndarray().select(Axis(1), &order);
    let s = Array1::from_iter(order.iter().map(|&i| s[i].max(0.0)));

    ensure_finite(u.iter().chain(v.iter()).chain(s.iter()), "SVD factors")?;

    let residual = max_abs((&a - &(&u * &s).dot(&v.t())).iter());
    let scale = max_abs(a.iter());
    if residual > RECONSTRUCTION_TOLERANCE * scale {
        bail!(LinalgError::numerical(format!(
            "SVD of a {}x{} matrix misses the input by {:e} (max entry {:e})",
            m, n, residual, scale
        )));
    }
    Ok((u, s, v))
}
