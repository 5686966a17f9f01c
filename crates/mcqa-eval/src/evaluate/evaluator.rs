use indexmap::IndexMap;
use tracing::debug;

use crate::core::{Answer, EvalError};
use crate::evaluate::metrics::Metric;
use crate::evaluate::result::MetricResult;
use crate::utils::reduce_by_mask;

/// Metric name (optionally prefixed by a subpopulation) to result, in the order
/// the results were produced.
pub type Results = IndexMap<String, MetricResult>;

/// A named subpopulation: only positions flagged `true` are scored.
#[derive(Debug, Clone, PartialEq)]
pub struct Subset {
    pub prefix: String,
    pub mask: Vec<bool>,
}

impl Subset {
    pub fn new(prefix: impl Into<String>, mask: Vec<bool>) -> Self {
        Self {
            prefix: prefix.into(),
            mask,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|keep| *keep)
    }
}

/// Applies a fixed list of metrics to gold/predicted record pairs.
///
/// Scoring runs in two passes. The first computes every metric's primary result
/// in list order; the second gives each metric a read-only view of all primaries
/// to derive its extras. Extras never see other metrics' extras, so adding or
/// removing a metric cannot change how the rest are computed.
pub struct Evaluator {
    metrics: Vec<Box<dyn Metric>>,
}

impl Evaluator {
    pub fn new(metrics: Vec<Box<dyn Metric>>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &[Box<dyn Metric>] {
        &self.metrics
    }

    #[tracing::instrument(
        name = "mcqa.evaluate",
        level = "debug",
        skip_all,
        fields(records = answers.len(), metrics = self.metrics.len())
    )]
    pub fn evaluate(&self, gold: &[Answer], answers: &[Answer]) -> Result<Results, EvalError> {
        let mut primaries = Results::with_capacity(self.metrics.len());
        for metric in &self.metrics {
            let result = metric.score(gold, answers)?;
            debug!(metric = metric.name(), value = result.value, "metric scored");
            primaries.insert(metric.name().to_string(), result);
        }

        let mut results = Results::with_capacity(primaries.len());
        for (name, result) in &primaries {
            let metric = self.metrics.iter().find(|metric| metric.name() == name);
            let result = match metric.and_then(|metric| metric.extras(result, &primaries)) {
                Some(extras) => result.clone().with_extras(extras),
                None => result.clone(),
            };
            results.insert(name.clone(), result);
        }
        Ok(results)
    }

    /// Scores only the positions flagged in `mask`.
    ///
    /// Returns `Ok(None)` when the mask selects nothing, rather than failing on
    /// empty input.
    pub fn evaluate_masked(
        &self,
        gold: &[Answer],
        answers: &[Answer],
        mask: &[bool],
    ) -> Result<Option<Results>, EvalError> {
        if mask.len() != gold.len() || mask.len() != answers.len() {
            return Err(EvalError::MaskMismatch {
                records: gold.len().max(answers.len()),
                mask: mask.len(),
            });
        }

        let gold = reduce_by_mask(gold, mask);
        if gold.is_empty() {
            return Ok(None);
        }
        let answers = reduce_by_mask(answers, mask);
        debug!(kept = gold.len(), of = mask.len(), "reduced by mask");
        self.evaluate(&gold, &answers).map(Some)
    }

    /// Scores each subpopulation under `<prefix>_<metric>` keys, then the whole
    /// population under bare metric names.
    ///
    /// Subsets that select no records are skipped.
    #[tracing::instrument(
        name = "mcqa.evaluate_subsets",
        level = "debug",
        skip_all,
        fields(records = answers.len(), subsets = subsets.len())
    )]
    pub fn evaluate_subsets(
        &self,
        gold: &[Answer],
        answers: &[Answer],
        subsets: &[Subset],
    ) -> Result<Results, EvalError> {
        let mut results = Results::new();
        for subset in subsets {
            match self.evaluate_masked(gold, answers, &subset.mask)? {
                Some(subset_results) => {
                    results.extend(
                        subset_results
                            .into_iter()
                            .map(|(name, result)| (format!("{}_{name}", subset.prefix), result)),
                    );
                }
                None => debug!(prefix = %subset.prefix, "subset is empty, skipping"),
            }
        }

        results.extend(self.evaluate(gold, answers)?);
        Ok(results)
    }
}
