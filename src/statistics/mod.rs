use anyhow::bail;
use ndarray::{Array1, ArrayView2};

use crate::error::LinalgError;

/// Column-wise correlation between two matrices with the same number of rows.
///
/// Entry `i` is `xᵢ·yᵢ / (‖xᵢ‖·‖yᵢ‖)` for column `i` of `x` and `y`, i.e. the
/// Pearson formula taken about the origin, which is the quantity `cca`
/// maximizes on its (uncentered) inputs. Columns are paired by index only and
/// the result has `min(x.ncols(), y.ncols())` entries. A column with zero norm
/// has correlation 0.
///
/// # Returns
/// - `Ok(Array1<f64>)`: correlations, each in `[-1, 1]`
/// - `Err`: `InvalidArgument` if the row counts differ
pub fn compute_correlations(x: ArrayView2<f64>, y: ArrayView2<f64>) -> anyhow::Result<Array1<f64>> {
    if x.nrows() != y.nrows() {
        bail!(LinalgError::invalid(format!(
            "Row count of x ({}) does not match row count of y ({})",
            x.nrows(),
            y.nrows()
        )));
    }

    let result = x
        .columns()
        .into_iter()
        .zip(y.columns())
        .map(|(xc, yc)| {
            let norm = (xc.dot(&xc) * yc.dot(&yc)).sqrt();
            if norm > 0.0 {
                (xc.dot(&yc) / norm).clamp(-1.0, 1.0)
            } else {
                0.0
            }
        })
        .collect::<Array1<f64>>();
    Ok(result)
}
