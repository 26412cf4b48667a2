//! # Canonical Correlation Analysis
//!
//! Finds paired projections `Ltrans`, `Rtrans` of two data sets that share
//! their rows (samples) such that the columns of `L·Ltrans` and `R·Rtrans`
//! are maximally correlated. Both sides are first reduced with the randomized
//! SVD, which whitens them (`L ≈ Ul·diag(Dl)·Vlᵗ` with orthonormal `Ul`). The
//! canonical directions are then the singular vectors of the small cross
//! matrix `Ulᵗ·Ur`, and its singular values are the canonical correlations.
//!
//! Works on dense arrays, sparse rows and CSR matrices alike.

use anyhow::bail;
use log::{debug, warn};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::LinalgError;
use crate::svd::exact::exact_svd;
use crate::svd::RandomizedSvd;
use crate::utils::{check_mul_shape, LinearOperator};

/// Relative threshold below which singular values and correlations count as zero.
const ZERO_TOLERANCE: f64 = 100.0 * f64::EPSILON;

/// Projection matrices and canonical correlations produced by [`Cca::fit`].
#[derive(Debug, Clone)]
pub struct CcaResult {
    l_trans: Array2<f64>,
    r_trans: Array2<f64>,
    correlations: Array1<f64>,
}

impl CcaResult {
    fn empty(n1: usize, n2: usize) -> Self {
        Self {
            l_trans: Array2::zeros((n1, 0)),
            r_trans: Array2::zeros((n2, 0)),
            correlations: Array1::zeros(0),
        }
    }

    /// `n1 × d` projection for the left data set.
    pub fn l_trans(&self) -> &Array2<f64> {
        &self.l_trans
    }

    /// `n2 × d` projection for the right data set.
    pub fn r_trans(&self) -> &Array2<f64> {
        &self.r_trans
    }

    /// Canonical correlations in `[0, 1]`, sorted in descending order.
    pub fn correlations(&self) -> &Array1<f64> {
        &self.correlations
    }

    pub fn n_components(&self) -> usize {
        self.correlations.len()
    }

    /// Projects left-side data (`m × n1`) into the canonical space, `L·Ltrans`.
    pub fn transform_left<A: LinearOperator + ?Sized>(&self, l: &A) -> anyhow::Result<Array2<f64>> {
        let trans = self.l_trans.view();
        check_mul_shape(l, &trans)?;
        Ok(l.mul_dense(trans))
    }

    /// Projects right-side data (`m × n2`) into the canonical space, `R·Rtrans`.
    pub fn transform_right<A: LinearOperator + ?Sized>(&self, r: &A) -> anyhow::Result<Array2<f64>> {
        let trans = self.r_trans.view();
        check_mul_shape(r, &trans)?;
        Ok(r.mul_dense(trans))
    }

    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>, Array1<f64>) {
        (self.l_trans, self.r_trans, self.correlations)
    }
}

/// Canonical Correlation Analysis configuration. Build one with [`CcaBuilder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cca {
    n_components: usize,
    extra_rank: Option<usize>,
    n_power_iterations: usize,
    regularization: f64,
    random_seed: Option<u64>,
}

impl Cca {
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Rank cushion added to `n_components` for the per-side SVDs.
    pub fn extra_rank(&self) -> usize {
        self.extra_rank.unwrap_or(self.n_components)
    }

    /// Computes the canonical projections of `l` (`m × n1`) and `r` (`m × n2`).
    ///
    /// # Returns
    /// - `Ok(CcaResult)`: `Ltrans` (`n1 × d`), `Rtrans` (`n2 × d`) and `d`
    ///   descending correlations
    /// - `Err`: `InvalidArgument` when the row counts differ, `d` exceeds
    ///   `min(n1, n2)` or the regularization is negative; `NumericalFailure`
    ///   if one of the decompositions breaks down
    pub fn fit<L, R>(&self, l: &L, r: &R) -> anyhow::Result<CcaResult>
    where
        L: LinearOperator + ?Sized,
        R: LinearOperator + ?Sized,
    {
        let mut rng = match self.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        self.fit_with_rng(l, r, &mut rng)
    }

    /// Same as [`Cca::fit`], drawing both sketches from `rng`.
    pub fn fit_with_rng<L, R, G>(&self, l: &L, r: &R, rng: &mut G) -> anyhow::Result<CcaResult>
    where
        L: LinearOperator + ?Sized,
        R: LinearOperator + ?Sized,
        G: Rng + ?Sized,
    {
        let (m, n1) = l.shape();
        let (m_r, n2) = r.shape();
        let d = self.n_components;

        if m != m_r {
            bail!(LinalgError::invalid(format!(
                "Left data has {} rows but right data has {}",
                m, m_r
            )));
        }
        if d > n1.min(n2) {
            bail!(LinalgError::invalid(format!(
                "Requested {} correlations but the inputs only have {} and {} columns",
                d, n1, n2
            )));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            bail!(LinalgError::invalid(format!(
                "Regularization must be finite and non-negative, got {}",
                self.regularization
            )));
        }
        if d == 0 {
            return Ok(CcaResult::empty(n1, n2));
        }
        if m == 0 {
            bail!(LinalgError::invalid("Cannot correlate data sets without rows"));
        }

        let target = d + self.extra_rank();
        let rank_l = target.min(m).min(n1);
        let rank_r = target.min(m).min(n2);
        debug!(
            "cca: {} samples, {} vs {} features, {} correlations, side ranks {}/{}",
            m, n1, n2, d, rank_l, rank_r
        );

        let (ul, dl, vl) = RandomizedSvd::new(rank_l)
            .n_power_iterations(self.n_power_iterations)
            .compute_with_rng(l, rng)?
            .into_parts();
        let (ur, dr, vr) = RandomizedSvd::new(rank_r)
            .n_power_iterations(self.n_power_iterations)
            .compute_with_rng(r, rng)?
            .into_parts();

        let largest = dl.iter().chain(dr.iter()).copied().fold(0.0, f64::max);
        let eps = ZERO_TOLERANCE * largest;
        let dl = round_zeros(&dl.mapv(|v| v + self.regularization), eps);
        let dr = round_zeros(&dr.mapv(|v| v + self.regularization), eps);

        // Cross matrix of the whitened bases, restricted to the directions
        // with non-zero singular values on both sides.
        let mut cross = ul.t().dot(&ur);
        mask_zeroed(&mut cross, Axis(0), dl.view());
        mask_zeroed(&mut cross, Axis(1), dr.view());

        let (u, corr, v) = exact_svd(cross.view())?;
        let available = corr.len().min(d);
        if available < d {
            warn!(
                "cca: only {} canonical directions available, padding {} of {} requested with zeros",
                available,
                d - available,
                d
            );
        }

        let mut correlations = Array1::zeros(d);
        let mut l_trans = Array2::zeros((n1, d));
        let mut r_trans = Array2::zeros((n2, d));

        let kept = corr
            .iter()
            .take(available)
            .map(|&c| c.clamp(0.0, 1.0))
            .take_while(|&c| c > ZERO_TOLERANCE)
            .count();

        for (dst, &c) in correlations.iter_mut().zip(corr.iter().take(kept)) {
            *dst = c.clamp(0.0, 1.0);
        }
        l_trans
            .slice_mut(s![.., ..kept])
            .assign(&lift(&vl, &dl, &u.slice(s![.., ..kept]).to_owned()));
        r_trans
            .slice_mut(s![.., ..kept])
            .assign(&lift(&vr, &dr, &v.slice(s![.., ..kept]).to_owned()));

        Ok(CcaResult {
            l_trans,
            r_trans,
            correlations,
        })
    }
}

/// Replaces values at or below `eps` by zero.
fn round_zeros(values: &Array1<f64>, eps: f64) -> Array1<f64> {
    values.mapv(|v| if v.abs() <= eps { 0.0 } else { v })
}

/// Zeroes the lanes of `matrix` along `axis` whose singular value was rounded to zero.
fn mask_zeroed(matrix: &mut Array2<f64>, axis: Axis, singular_values: ArrayView1<f64>) {
    for (mut lane, &sv) in matrix.axis_iter_mut(axis).zip(singular_values.iter()) {
        if sv == 0.0 {
            lane.fill(0.0);
        }
    }
}

/// `V·diag(1/D)·W`, with a zero reciprocal for zeroed singular values.
fn lift(v: &Array2<f64>, singular_values: &Array1<f64>, directions: &Array2<f64>) -> Array2<f64> {
    let reciprocal = singular_values
        .mapv(|s| if s == 0.0 { 0.0 } else { 1.0 / s })
        .insert_axis(Axis(1));
    v.dot(&(directions * &reciprocal))
}

/// Builder for configuring and creating [`Cca`] instances.
///
/// # Example Usage
/// ```ignore
/// let result = CcaBuilder::new(5)
///     .extra_rank(5)
///     .n_power_iterations(2)
///     .random_seed(42)
///     .build()
///     .fit(&left, &right)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcaBuilder {
    n_components: usize,
    extra_rank: Option<usize>,
    n_power_iterations: usize,
    regularization: f64,
    random_seed: Option<u64>,
}

impl CcaBuilder {
    /// Creates a builder for `n_components` canonical correlations.
    ///
    /// Default values:
    /// - `extra_rank`: equal to `n_components`
    /// - `n_power_iterations`: 2
    /// - `regularization`: 0.0
    /// - `random_seed`: none
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            extra_rank: None,
            n_power_iterations: 2,
            regularization: 0.0,
            random_seed: None,
        }
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }

    /// Oversamples the per-side SVDs by this many ranks. Larger values make the
    /// correlations more accurate when the inputs have a high rank.
    pub fn extra_rank(mut self, extra_rank: usize) -> Self {
        self.extra_rank = Some(extra_rank);
        self
    }

    pub fn n_power_iterations(mut self, n_power_iterations: usize) -> Self {
        self.n_power_iterations = n_power_iterations;
        self
    }

    /// Added to every singular value of both sides before whitening. With a
    /// non-zero value the reported correlations become approximate.
    pub fn regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn build(self) -> Cca {
        Cca {
            n_components: self.n_components,
            extra_rank: self.extra_rank,
            n_power_iterations: self.n_power_iterations,
            regularization: self.regularization,
            random_seed: self.random_seed,
        }
    }
}

/// Canonical Correlation Analysis of `l` and `r` with default settings.
///
/// `extra_rank` defaults to `d` when `None`.
pub fn cca<L, R>(l: &L, r: &R, d: usize, extra_rank: Option<usize>) -> anyhow::Result<CcaResult>
where
    L: LinearOperator + ?Sized,
    R: LinearOperator + ?Sized,
{
    let mut builder = CcaBuilder::new(d);
    if let Some(extra) = extra_rank {
        builder = builder.extra_rank(extra);
    }
    builder.build().fit(l, r)
}
