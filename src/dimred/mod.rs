//! # Dimensionality Reduction
//!
//! Algorithms that project paired, high-dimensional data sets onto a small
//! number of informative directions.
//!
//! ## Currently Available
//! - **CCA** ([`cca`]): Canonical Correlation Analysis of two data sets sharing their samples,
//!   built on the randomized SVD in [`crate::svd`]

pub mod cca;
