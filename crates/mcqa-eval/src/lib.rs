//! Multiple-choice QA evaluation with a tunable no-answer threshold.
//!
//! Predicted [`Answer`]s resolve raw option scores to a [`Decision`], abstaining
//! when the top score does not clear the record's threshold. [`Metric`]s score
//! resolved answers against gold labels, the [`Evaluator`] runs several metrics
//! (optionally per subpopulation), and [`Threshold`] sweeps every score
//! breakpoint for the threshold that maximizes a metric.
//!
//! ```
//! use mcqa_eval::{Answer, CAt1, Decision, Evaluator, apply_threshold};
//!
//! let gold = vec![Answer::gold("q1", 0), Answer::gold("q2", 1)];
//! let mut answers = vec![
//!     Answer::builder().example_id("q1").probs(vec![0.8, 0.2]).label(0).build(),
//!     Answer::builder().example_id("q2").probs(vec![0.55, 0.45]).label(1).build(),
//! ];
//! apply_threshold(&mut answers, 0.6);
//! assert_eq!(answers[1].resolve(true), Decision::Abstain);
//!
//! let evaluator = Evaluator::new(vec![Box::new(CAt1::default())]);
//! let results = evaluator.evaluate(&gold, &answers)?;
//! assert_eq!(results["c_at_1"].value, 0.75);
//! # Ok::<(), mcqa_eval::EvalError>(())
//! ```

pub mod core;
pub mod data;
pub mod evaluate;
pub mod optimizer;
pub mod report;
pub mod utils;

pub use crate::core::*;
pub use crate::data::*;
pub use crate::evaluate::*;
pub use crate::optimizer::*;
pub use crate::report::{OutputOptions, Report, RunConfig};
pub use crate::utils::*;
