//! Scoring resolved answers against gold labels.
//!
//! A [`Metric`] turns positionally matched gold and predicted [`Answer`](crate::Answer)s
//! into a [`MetricResult`]. The [`Evaluator`] runs a list of metrics, derives the
//! extras each metric declares, and can split the population into named subsets
//! (e.g. answerable vs unanswerable questions).

pub mod evaluator;
pub mod metrics;
pub mod result;

pub use evaluator::*;
pub use metrics::*;
pub use result::*;
