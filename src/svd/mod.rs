//! # Randomized singular value decomposition
//!
//! `svd_fast` computes a rank-`k` factorization `A ≈ U·diag(s)·Vᵗ` of a dense
//! matrix, a slice of sparse rows or a CSR matrix. The input is only touched
//! through [`LinearOperator`] products: a Gaussian sketch is orthonormalized by
//! the range finder, `A` is projected onto it and the small projected matrix is
//! decomposed exactly.

use anyhow::bail;
use log::debug;
use ndarray::{s, Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::LinalgError;
use crate::utils::{orthonormality_error, LinearOperator};

pub mod exact;
pub mod randomized;

pub use randomized::randomized_range_finder;

const ORTHONORMALITY_TOLERANCE: f64 = 1e-8;

/// Result of a (truncated) singular value decomposition.
#[derive(Debug, Clone)]
pub struct SvdResult {
    u: Array2<f64>,
    s: Array1<f64>,
    v: Array2<f64>,
}

impl SvdResult {
    /// `m × k` left singular vectors.
    pub fn u(&self) -> &Array2<f64> {
        &self.u
    }

    /// Singular values in descending order.
    pub fn s(&self) -> &Array1<f64> {
        &self.s
    }

    /// `n × k` right singular vectors.
    pub fn v(&self) -> &Array2<f64> {
        &self.v
    }

    pub fn rank(&self) -> usize {
        self.s.len()
    }

    // U·diag(s)·Vᵗ
    pub fn reconstruct(&self) -> Array2<f64> {
        let scaled = &self.u * &self.s;
        scaled.dot(&self.v.t())
    }

    pub fn into_parts(self) -> (Array2<f64>, Array1<f64>, Array2<f64>) {
        (self.u, self.s, self.v)
    }
}

/// Configuration for a randomized SVD.
///
/// # Example Usage
/// ```ignore
/// let svd = RandomizedSvd::new(10)
///     .n_oversamples(10)
///     .n_power_iterations(2)
///     .random_seed(42)
///     .compute(&matrix)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomizedSvd {
    rank: usize,
    n_oversamples: usize,
    n_power_iterations: usize,
    random_seed: Option<u64>,
}

impl RandomizedSvd {
    /// Creates a configuration for a rank-`rank` decomposition.
    ///
    /// Default values:
    /// - `n_oversamples`: 10
    /// - `n_power_iterations`: 2
    /// - `random_seed`: none (fresh entropy per call)
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            n_oversamples: 10,
            n_power_iterations: 2,
            random_seed: None,
        }
    }

    /// Extra sketch columns drawn beyond `rank`. They never show up in the
    /// result, which is truncated back to `rank` columns.
    pub fn n_oversamples(mut self, n_oversamples: usize) -> Self {
        self.n_oversamples = n_oversamples;
        self
    }

    pub fn n_power_iterations(mut self, n_power_iterations: usize) -> Self {
        self.n_power_iterations = n_power_iterations;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Runs the decomposition with a generator seeded from `random_seed`, or
    /// from the thread-local generator when no seed was configured.
    pub fn compute<A: LinearOperator + ?Sized>(&self, a: &A) -> anyhow::Result<SvdResult> {
        let mut rng = match self.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        self.compute_with_rng(a, &mut rng)
    }

    /// Runs the decomposition drawing the sketch from `rng`.
    pub fn compute_with_rng<A, R>(&self, a: &A, rng: &mut R) -> anyhow::Result<SvdResult>
    where
        A: LinearOperator + ?Sized,
        R: Rng + ?Sized,
    {
        let (m, n) = a.shape();
        let k = self.rank;
        if k == 0 {
            bail!(LinalgError::invalid("Requested rank must be positive"));
        }
        if k > m.min(n) {
            bail!(LinalgError::invalid(format!(
                "Requested rank {} exceeds min({}, {}) of the input",
                k, m, n
            )));
        }

        let size = (k + self.n_oversamples).min(m).min(n);
        debug!(
            "svd_fast: {}x{} input, rank {}, sketch width {}, {} power iterations",
            m, n, k, size, self.n_power_iterations
        );

        let q = randomized_range_finder(a, size, self.n_power_iterations, rng)?;

        // B = Qᵗ·A, formed as (Aᵗ·Q)ᵗ so only the transposed product touches A.
        let b = a.t_mul_dense(q.view()).reversed_axes();
        let (u_b, s_b, v_b) = exact::exact_svd(b.view())?;

        let u = q.dot(&u_b.slice(s![.., ..k]));
        let s = s_b.slice(s![..k]).to_owned();
        let v = v_b.slice(s![.., ..k]).to_owned();

        let u_err = orthonormality_error(u.view());
        let v_err = orthonormality_error(v.view());
        if u_err > ORTHONORMALITY_TOLERANCE || v_err > ORTHONORMALITY_TOLERANCE {
            bail!(LinalgError::numerical(format!(
                "Singular vectors lost orthonormality (U: {:e}, V: {:e})",
                u_err, v_err
            )));
        }

        Ok(SvdResult { u, s, v })
    }
}

/// Rank-`rank` randomized SVD of `a` with `n_power_iterations` power
/// iterations and the default oversampling.
///
/// # Returns
/// - `Ok(SvdResult)`: `U` (`m × rank`), descending `s` (`rank`), `V` (`n × rank`)
/// - `Err`: `InvalidArgument` for `rank == 0` or `rank > min(m, n)`,
///   `NumericalFailure` if a factorization breaks down
pub fn svd_fast<A: LinearOperator + ?Sized>(
    a: &A,
    rank: usize,
    n_power_iterations: usize,
) -> anyhow::Result<SvdResult> {
    RandomizedSvd::new(rank)
        .n_power_iterations(n_power_iterations)
        .compute(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::SparseRows;
    use approx::assert_abs_diff_eq;
    use nalgebra_sparse::{CooMatrix, CsrMatrix};
    use ndarray::array;
    use std::collections::BTreeMap;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn randm(m: usize, n: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        Array2::from_shape_fn((m, n), |_| rng.random::<f64>())
    }

    fn mat_to_sparse(a: &Array2<f64>) -> Vec<BTreeMap<usize, f64>> {
        a.rows()
            .into_iter()
            .map(|r| r.iter().copied().enumerate().collect())
            .collect()
    }

    fn mat_to_csr(a: &Array2<f64>) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(a.nrows(), a.ncols());
        for ((i, j), &v) in a.indexed_iter() {
            if v != 0.0 {
                coo.push(i, j, v);
            }
        }
        CsrMatrix::from(&coo)
    }

    fn max_abs(a: &Array2<f64>) -> f64 {
        a.iter().map(|v| v.abs()).fold(0.0, f64::max)
    }

    fn check_factors(res: &SvdResult, a: &Array2<f64>, rank: usize, tol: f64) {
        let (m, n) = a.dim();
        assert_eq!(res.u().dim(), (m, rank));
        assert_eq!(res.s().len(), rank);
        assert_eq!(res.v().dim(), (n, rank));
        assert!(orthonormality_error(res.u().view()) < 1e-13);
        assert!(orthonormality_error(res.v().view()) < 1e-13);
        assert!(res.s().windows(2).into_iter().all(|w| w[0] >= w[1]));
        assert!(res.s().iter().all(|&v| v >= 0.0));
        let err = max_abs(&(a - &res.reconstruct()));
        assert!(err < tol, "reconstruction error {:e} >= {:e}", err, tol);
    }

    /// Runs `svd_fast` on an exact rank-`rank` matrix through every code path.
    fn check_exact_rank(rank: usize, m: usize, n: usize, rng: &mut ChaCha8Rng) {
        let a = randm(m, rank, rng).dot(&randm(rank, n, rng));
        let rows = mat_to_sparse(&a);
        let sparse = SparseRows::new(&rows);
        let csr = mat_to_csr(&a);

        let run = |op: &dyn LinearOperator, k: usize, q: usize, rng: &mut ChaCha8Rng| {
            RandomizedSvd::new(k)
                .n_power_iterations(q)
                .compute_with_rng(op, rng)
                .unwrap()
        };

        check_factors(&run(&a, rank, 2, &mut *rng), &a, rank, 1e-13);
        check_factors(&run(&sparse, rank, 2, &mut *rng), &a, rank, 1e-13);
        check_factors(&run(&a, rank, 0, &mut *rng), &a, rank, 1e-9);
        check_factors(&run(&sparse, rank, 0, &mut *rng), &a, rank, 1e-11);

        // surplus rank, only where the input is large enough to allow it
        let k = rank + 5;
        if k <= m.min(n) {
            let res = run(&a, k, 0, &mut *rng);
            check_factors(&res, &a, k, 1e-11);
            assert!(res.s()[rank] < 1e-10 * res.s()[0]);
            check_factors(&run(&sparse, k, 0, &mut *rng), &a, k, 1e-11);
            check_factors(&run(&a, k, 1, &mut *rng), &a, k, 1e-12);
            check_factors(&run(&sparse, k, 1, &mut *rng), &a, k, 1e-12);
            check_factors(&run(&csr, k, 1, &mut *rng), &a, k, 1e-12);
        }
    }

    #[test]
    fn test_svd_fast_exact_rank_dense_and_sparse() {
        init();
        let mut rng = ChaCha8Rng::seed_from_u64(1234);
        for _ in 0..1000 {
            let rank = rng.random_range(1..=10);
            let m = rank + rng.random_range(0..10);
            let n = rank + rng.random_range(0..10);
            check_exact_rank(rank, m, n, &mut rng);
        }
        for (m, n) in [(1, 1), (2, 2), (1, 2), (2, 1)] {
            check_exact_rank(1, m, n, &mut rng);
        }
    }

    #[test]
    fn test_svd_fast_rank_above_true_rank() {
        init();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..20 {
            let rank = rng.random_range(1..=5);
            let m = rank + 5 + rng.random_range(0..6);
            let n = rank + 5 + rng.random_range(0..6);
            check_exact_rank(rank, m, n, &mut rng);
        }
    }

    #[test]
    fn test_svd_fast_full_rank_is_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a = randm(7, 4, &mut rng);
        let res = svd_fast(&a, 4, 0).unwrap();
        check_factors(&res, &a, 4, 1e-12);

        let wide = a.t().to_owned();
        let res = svd_fast(&wide, 4, 1).unwrap();
        check_factors(&res, &wide, 4, 1e-12);
    }

    #[test]
    fn test_svd_fast_degenerate_shapes() {
        let a = array![[5.0]];
        let res = svd_fast(&a, 1, 0).unwrap();
        assert_abs_diff_eq!(res.s()[0], 5.0, epsilon = 1e-14);
        assert_abs_diff_eq!(res.u()[[0, 0]].abs(), 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(res.v()[[0, 0]].abs(), 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(res.reconstruct()[[0, 0]], 5.0, epsilon = 1e-14);

        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for (m, n) in [(1, 1), (2, 2), (1, 2), (2, 1)] {
            let a = randm(m, 1, &mut rng).dot(&randm(1, n, &mut rng));
            let res = svd_fast(&a, 1, 2).unwrap();
            check_factors(&res, &a, 1, 1e-13);

            let rows = mat_to_sparse(&a);
            let res = svd_fast(&SparseRows::new(&rows), 1, 2).unwrap();
            check_factors(&res, &a, 1, 1e-13);
        }
    }

    #[test]
    fn test_power_iterations_do_not_hurt_accuracy() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let (m, n) = (60, 40);
        // geometrically decaying spectrum
        let q1 = exact::orthonormalize(randm(m, n, &mut rng).view()).unwrap();
        let q2 = exact::orthonormalize(randm(n, n, &mut rng).view()).unwrap();
        let spectrum = Array1::from_iter((0..n).map(|i| 0.7f64.powi(i as i32)));
        let a = (&q1 * &spectrum).dot(&q2.t());

        let frob = |res: &SvdResult| {
            (&a - &res.reconstruct())
                .iter()
                .map(|v| v * v)
                .sum::<f64>()
                .sqrt()
        };

        let coarse = RandomizedSvd::new(5)
            .n_oversamples(2)
            .n_power_iterations(0)
            .random_seed(1)
            .compute(&a)
            .unwrap();
        let sharp = RandomizedSvd::new(5)
            .n_oversamples(2)
            .n_power_iterations(4)
            .random_seed(1)
            .compute(&a)
            .unwrap();

        let optimal = spectrum.slice(s![5..]).iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!(frob(&sharp) <= frob(&coarse) * (1.0 + 1e-6));
        assert!(frob(&sharp) <= optimal * 1.01);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let a = randm(30, 20, &mut rng);
        let svd = RandomizedSvd::new(3).random_seed(7);
        let first = svd.compute(&a).unwrap();
        let second = svd.compute(&a).unwrap();
        assert_eq!(first.u(), second.u());
        assert_eq!(first.s(), second.s());
    }

    #[test]
    fn test_invalid_rank() {
        let a = Array2::<f64>::ones((3, 2));
        for rank in [0, 3] {
            let err = svd_fast(&a, rank, 1).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<LinalgError>(),
                Some(LinalgError::InvalidArgument(_))
            ));
        }
    }
}
