use ndarray::{Array2, ArrayBase, ArrayView2, Data, Ix2};

use crate::utils::LinearOperator;

impl<S> LinearOperator for ArrayBase<S, Ix2>
where
    S: Data<Elem = f64>,
{
    fn nrows(&self) -> usize {
        self.len_of(ndarray::Axis(0))
    }

    fn ncols(&self) -> usize {
        self.len_of(ndarray::Axis(1))
    }

    fn mul_dense(&self, x: ArrayView2<f64>) -> Array2<f64> {
        self.dot(&x)
    }

    fn t_mul_dense(&self, y: ArrayView2<f64>) -> Array2<f64> {
        self.t().dot(&y)
    }
}
