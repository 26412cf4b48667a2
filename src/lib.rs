pub mod dense;
pub mod dimred;
pub mod error;
pub mod sparse;
pub mod statistics;
pub mod svd;
mod utils;

pub use dimred::cca::{cca, Cca, CcaBuilder, CcaResult};
pub use error::LinalgError;
pub use sparse::{SparseRows, SparseVector};
pub use statistics::compute_correlations;
pub use svd::{svd_fast, RandomizedSvd, SvdResult};
pub use utils::LinearOperator;
