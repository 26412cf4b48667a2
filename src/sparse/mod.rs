//! # Sparse rows
//!
//! A sparse data point is a mapping from column index to value, absent keys
//! being zero. A slice of such rows is a sparse matrix whose row count is the
//! slice length and whose column count is either inferred from the largest
//! index present or supplied by the caller.
//!
//! `nalgebra_sparse::CsrMatrix<f64>` is supported as well, see [`csr`].

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use anyhow::bail;
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use rayon::prelude::*;

use crate::error::LinalgError;
use crate::utils::LinearOperator;

pub mod csr;

/// One sparse row: a map from column index to value.
///
/// Every operation costs O(nnz) and treats missing indices as zero.
pub trait SparseVector {
    /// Iterates the stored `(index, value)` pairs. The order is implementation
    /// defined but stable for an unmodified row.
    fn entries(&self) -> impl Iterator<Item = (usize, f64)> + '_;

    fn get(&self, index: usize) -> f64;

    fn nnz(&self) -> usize;

    fn dot(&self, other: &Self) -> f64 {
        if self.nnz() <= other.nnz() {
            self.entries().map(|(i, v)| v * other.get(i)).sum()
        } else {
            other.entries().map(|(i, v)| v * self.get(i)).sum()
        }
    }

    /// Dot product with a dense vector. Indices past the end of `x` are ignored.
    fn dot_dense(&self, x: ArrayView1<f64>) -> f64 {
        self.entries()
            .filter_map(|(i, v)| x.get(i).map(|&xi| v * xi))
            .sum()
    }

    /// `out += scale * self`
    fn add_scaled_to(&self, scale: f64, mut out: ArrayViewMut1<f64>) {
        for (i, v) in self.entries() {
            if let Some(o) = out.get_mut(i) {
                *o += scale * v;
            }
        }
    }

    fn max_index(&self) -> Option<usize> {
        self.entries().map(|(i, _)| i).max()
    }
}

impl SparseVector for BTreeMap<usize, f64> {
    fn entries(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.iter().map(|(&i, &v)| (i, v))
    }

    fn get(&self, index: usize) -> f64 {
        BTreeMap::get(self, &index).copied().unwrap_or(0.0)
    }

    fn nnz(&self) -> usize {
        self.len()
    }

    fn max_index(&self) -> Option<usize> {
        self.keys().next_back().copied()
    }
}

impl<S: BuildHasher> SparseVector for HashMap<usize, f64, S> {
    fn entries(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.iter().map(|(&i, &v)| (i, v))
    }

    fn get(&self, index: usize) -> f64 {
        HashMap::get(self, &index).copied().unwrap_or(0.0)
    }

    fn nnz(&self) -> usize {
        self.len()
    }
}

/// Borrowed view of a slice of sparse rows as an `nrows × ncols` matrix.
#[derive(Debug, Clone, Copy)]
pub struct SparseRows<'a, V> {
    rows: &'a [V],
    ncols: usize,
}

impl<'a, V: SparseVector> SparseRows<'a, V> {
    /// Wraps `rows`, inferring the column count as one past the largest index.
    pub fn new(rows: &'a [V]) -> Self {
        let ncols = max_index_plus_one(rows);
        Self { rows, ncols }
    }

    /// Wraps `rows` with an explicit column count.
    pub fn with_ncols(rows: &'a [V], ncols: usize) -> anyhow::Result<Self> {
        let needed = max_index_plus_one(rows);
        if needed > ncols {
            bail!(LinalgError::invalid(format!(
                "Sparse row index {} does not fit into {} columns",
                needed - 1,
                ncols
            )));
        }
        Ok(Self { rows, ncols })
    }

    pub fn rows(&self) -> &'a [V] {
        self.rows
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseVector::nnz).sum()
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.rows.len(), self.ncols));
        for (row, out) in self.rows.iter().zip(dense.axis_iter_mut(Axis(0))) {
            row.add_scaled_to(1.0, out);
        }
        dense
    }
}

/// Column count implied by the largest index present, 0 for empty rows.
pub fn max_index_plus_one<V: SparseVector>(rows: &[V]) -> usize {
    rows.iter()
        .filter_map(SparseVector::max_index)
        .max()
        .map_or(0, |i| i + 1)
}

impl<V> LinearOperator for SparseRows<'_, V>
where
    V: SparseVector + Sync,
{
    fn nrows(&self) -> usize {
        self.rows.len()
    }

    fn ncols(&self) -> usize {
        self.ncols
    }

    fn mul_dense(&self, x: ArrayView2<f64>) -> Array2<f64> {
        assert_eq!(x.nrows(), self.ncols, "inner dimensions must agree");
        let mut out = Array2::zeros((self.rows.len(), x.ncols()));
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(self.rows.par_iter())
            .for_each(|(mut out_row, row)| {
                for (i, v) in row.entries() {
                    out_row.scaled_add(v, &x.row(i));
                }
            });
        out
    }

    fn t_mul_dense(&self, y: ArrayView2<f64>) -> Array2<f64> {
        assert_eq!(y.nrows(), self.rows.len(), "inner dimensions must agree");
        let mut out = Array2::zeros((self.ncols, y.ncols()));
        Zip::from(out.columns_mut())
            .and(y.columns())
            .par_for_each(|mut out_col, y_col| {
                for (row, &scale) in self.rows.iter().zip(y_col.iter()) {
                    if scale != 0.0 {
                        row.add_scaled_to(scale, out_col.view_mut());
                    }
                }
            });
        out
    }
}
