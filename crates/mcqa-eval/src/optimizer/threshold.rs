use bon::Builder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{Answer, EvalError, apply_threshold};
use crate::evaluate::Metric;
use crate::utils::{argmax, sorted_unique};

/// Outcome of a threshold sweep: every candidate with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Sorted, deduplicated candidate thresholds.
    pub candidates: Vec<f64>,
    /// `scores[i]` is the metric value with every record at `candidates[i]`.
    pub scores: Vec<f64>,
    pub best_index: usize,
    pub best_threshold: f64,
    pub best_score: f64,
}

/// Exhaustive search for the no-answer threshold that maximizes a metric.
///
/// Every decision changes only when the threshold crosses some record's top
/// score, so the candidates are `0` plus each record's max score and nothing in
/// between needs testing.
///
/// Small answer sets are swept on the calling thread. Above `parallel_breakpoint`
/// records, the candidates are cut into contiguous batches run on a dedicated
/// pool of `workers` threads. Every batch scores its own clone of the predicted
/// records, and batches are reassembled by position, so the result is identical
/// to the sequential sweep.
///
/// The records passed in are never mutated. Apply the winning threshold yourself
/// with [`apply_threshold`](crate::apply_threshold) if it should stick.
///
/// ```
/// use mcqa_eval::{Answer, Average, Threshold};
///
/// let gold = vec![Answer::gold("q1", 0), Answer::gold("q2", 1)];
/// let answers = vec![
///     Answer::builder().example_id("q1").probs(vec![0.9, 0.1]).label(0).build(),
///     Answer::builder().example_id("q2").probs(vec![0.6, 0.4]).label(1).build(),
/// ];
///
/// let threshold = Threshold::builder().build();
/// let best = threshold.find_best_threshold(&Average, &gold, &answers)?;
/// assert_eq!(best, 0.0);
/// # Ok::<(), mcqa_eval::EvalError>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct Threshold {
    /// Worker threads for the parallel sweep.
    #[builder(default = 8)]
    pub workers: usize,
    /// Sweeps over more records than this go parallel.
    #[builder(default = 5000)]
    pub parallel_breakpoint: usize,
    /// Candidates per batch. Defaults to an even split across `workers`.
    pub batch_size: Option<usize>,
}

impl Threshold {
    /// Candidate thresholds for `answers`: `{0}` ∪ max scores, sorted and deduplicated.
    pub fn candidates(answers: &[Answer]) -> Vec<f64> {
        sorted_unique(std::iter::once(0.0).chain(answers.iter().filter_map(Answer::max_score)))
    }

    #[tracing::instrument(
        name = "mcqa.threshold.find",
        level = "info",
        skip_all,
        fields(metric = metric.name(), records = answers.len())
    )]
    pub fn find_best_threshold(
        &self,
        metric: &dyn Metric,
        gold: &[Answer],
        answers: &[Answer],
    ) -> Result<f64, EvalError> {
        let report = self.sweep(metric, gold, answers)?;
        info!(
            threshold = report.best_threshold,
            score = report.best_score,
            candidates = report.candidates.len(),
            "best threshold selected"
        );
        Ok(report.best_threshold)
    }

    /// Scores every candidate and selects the first best.
    ///
    /// Any metric failure aborts the whole sweep.
    pub fn sweep(
        &self,
        metric: &dyn Metric,
        gold: &[Answer],
        answers: &[Answer],
    ) -> Result<SweepReport, EvalError> {
        let candidates = Self::candidates(answers);
        let scores = if self.is_parallel(answers.len()) {
            self.sweep_parallel(metric, gold, answers, &candidates)?
        } else {
            sweep_batch(metric, gold, answers, &candidates)?
        };

        // `candidates` always holds 0.0, so `scores` is never empty.
        let best_index = argmax(&scores).unwrap_or_default();
        Ok(SweepReport {
            best_threshold: candidates[best_index],
            best_score: scores[best_index],
            best_index,
            candidates,
            scores,
        })
    }

    fn is_parallel(&self, records: usize) -> bool {
        self.batch_size.is_some() || records > self.parallel_breakpoint
    }

    fn batch_len(&self, candidates: usize) -> usize {
        self.batch_size
            .unwrap_or_else(|| candidates.div_ceil(self.workers.max(1)))
            .max(1)
    }

    fn sweep_parallel(
        &self,
        metric: &dyn Metric,
        gold: &[Answer],
        answers: &[Answer],
        candidates: &[f64],
    ) -> Result<Vec<f64>, EvalError> {
        let batch_len = self.batch_len(candidates.len());
        debug!(
            workers = self.workers,
            batch_len,
            candidates = candidates.len(),
            "starting parallel sweep"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.max(1))
            .thread_name(|idx| format!("mcqa-sweep-{idx}"))
            .build()?;

        // Indexed parallel iterators collect in slice order, not completion order.
        let batches: Vec<Vec<f64>> = pool.install(|| {
            candidates
                .par_chunks(batch_len)
                .map(|batch| sweep_batch(metric, gold, answers, batch))
                .collect::<Result<Vec<_>, EvalError>>()
        })?;
        Ok(batches.into_iter().flatten().collect())
    }
}

/// Scores `candidates` in order on one private clone of `answers`.
fn sweep_batch(
    metric: &dyn Metric,
    gold: &[Answer],
    answers: &[Answer],
    candidates: &[f64],
) -> Result<Vec<f64>, EvalError> {
    if let (Some(first), Some(last)) = (candidates.first(), candidates.last()) {
        debug!(first, last, size = candidates.len(), "sweeping batch");
    }
    let mut working = answers.to_vec();
    candidates
        .iter()
        .map(|&candidate| {
            apply_threshold(&mut working, candidate);
            let value = metric.score(gold, &working)?.value;
            tracing::trace!(candidate, value, "candidate scored");
            Ok(value)
        })
        .collect()
}
