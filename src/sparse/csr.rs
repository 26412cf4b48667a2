use nalgebra_sparse::CsrMatrix;
use ndarray::{Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;

use crate::utils::LinearOperator;

impl LinearOperator for CsrMatrix<f64> {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn mul_dense(&self, x: ArrayView2<f64>) -> Array2<f64> {
        assert_eq!(x.nrows(), CsrMatrix::ncols(self), "inner dimensions must agree");
        let mut out = Array2::zeros((CsrMatrix::nrows(self), x.ncols()));
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut out_row)| {
                let row = self.row(i);
                for (&col, &value) in row.col_indices().iter().zip(row.values()) {
                    out_row.scaled_add(value, &x.row(col));
                }
            });
        out
    }

    fn t_mul_dense(&self, y: ArrayView2<f64>) -> Array2<f64> {
        assert_eq!(y.nrows(), CsrMatrix::nrows(self), "inner dimensions must agree");
        let mut out = Array2::zeros((CsrMatrix::ncols(self), y.ncols()));
        Zip::from(out.columns_mut())
            .and(y.columns())
            .par_for_each(|mut out_col, y_col| {
                for (row, &scale) in self.row_iter().zip(y_col.iter()) {
                    if scale == 0.0 {
                        continue;
                    }
                    for (&col, &value) in row.col_indices().iter().zip(row.values()) {
                        out_col[col] += scale * value;
                    }
                }
            });
        out
    }
}
