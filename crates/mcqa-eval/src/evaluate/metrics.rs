use anyhow::{Context, anyhow};
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use crate::core::{Answer, DEFAULT_ABSTAIN_CODE, Decision, EvalError};
use crate::evaluate::result::{ConfusionCounts, Extras, MetricResult};

/// A scoring function over positionally matched gold and predicted records.
///
/// Implementations are pure: configuration is fixed at construction, and
/// [`score`](Metric::score) reads nothing but its arguments. The trait is
/// object safe so an [`Evaluator`](crate::Evaluator) can hold a heterogeneous
/// list, and `Send + Sync` so a parallel threshold sweep can share one instance
/// across workers.
pub trait Metric: Send + Sync {
    /// Key of this metric's entry in evaluation results.
    fn name(&self) -> &str;

    /// Whether the metric scores abstention as its own outcome.
    ///
    /// Metrics that do not need a no-answer sentinel resolve with
    /// `accept_abstention = false`, which lets an abstention land on the option
    /// whose text is the no-answer marker.
    fn needs_no_answer(&self) -> bool {
        false
    }

    /// Configured abstention sentinel, if any.
    fn no_answer(&self) -> Option<i64> {
        None
    }

    fn score(&self, gold: &[Answer], answers: &[Answer]) -> Result<MetricResult, EvalError>;

    /// Names of metrics whose primary results [`extras`](Metric::extras) reads.
    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    /// Derives auxiliary fields from primary results of this evaluation.
    ///
    /// Returns `None` when a dependency is missing.
    fn extras(
        &self,
        _own: &MetricResult,
        _primaries: &IndexMap<String, MetricResult>,
    ) -> Option<Extras> {
        None
    }
}

fn check_inputs(metric: &str, gold: &[Answer], answers: &[Answer]) -> Result<(), EvalError> {
    if gold.len() != answers.len() {
        return Err(EvalError::LengthMismatch {
            gold: gold.len(),
            predicted: answers.len(),
        });
    }
    if gold.is_empty() {
        return Err(EvalError::EmptyInput {
            metric: metric.to_string(),
        });
    }
    Ok(())
}

/// Correct / unanswered / incorrect split shared by the accuracy-style metrics.
///
/// Decisions are compared by their integer code under the metric's sentinel,
/// so an option whose index equals the sentinel counts as an abstention. A pair
/// is `unanswered` when the prediction's code is the sentinel and it was not
/// correct, so an abstention that matches the gold decision counts as correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tally {
    total: usize,
    correct: usize,
    unanswered: usize,
}

impl Tally {
    fn count(
        gold: &[Answer],
        answers: &[Answer],
        accept_abstention: bool,
        no_answer: i64,
    ) -> Self {
        let mut tally = Self {
            total: gold.len(),
            correct: 0,
            unanswered: 0,
        };
        for (gold_answer, answer) in gold.iter().zip(answers) {
            let expected = gold_answer.resolve(true).code(no_answer);
            let predicted = answer.resolve(accept_abstention).code(no_answer);
            if predicted == expected {
                tally.correct += 1;
            } else if predicted == no_answer {
                tally.unanswered += 1;
            }
        }
        tally
    }

    fn incorrect(&self) -> usize {
        self.total - self.correct - self.unanswered
    }

    fn answered(&self) -> usize {
        self.total - self.unanswered
    }

    fn result(&self, value: f64) -> MetricResult {
        MetricResult::builder()
            .value(value)
            .total(self.total)
            .correct(self.correct)
            .incorrect(self.incorrect())
            .unanswered(self.unanswered)
            .build()
    }
}

/// Accuracy that rewards abstaining instead of guessing wrong (C@1).
///
/// `(correct + correct / total * unanswered) / total`: each unanswered question
/// is credited at the accuracy of the whole set, as if the model had answered it
/// with that same accuracy.
#[derive(Debug, Clone)]
pub struct CAt1 {
    no_answer: i64,
}

impl CAt1 {
    pub const NAME: &'static str = "c_at_1";

    pub fn new(no_answer: i64) -> Self {
        Self { no_answer }
    }
}

impl Default for CAt1 {
    fn default() -> Self {
        Self::new(DEFAULT_ABSTAIN_CODE)
    }
}

impl Metric for CAt1 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn needs_no_answer(&self) -> bool {
        true
    }

    fn no_answer(&self) -> Option<i64> {
        Some(self.no_answer)
    }

    fn score(&self, gold: &[Answer], answers: &[Answer]) -> Result<MetricResult, EvalError> {
        check_inputs(self.name(), gold, answers)?;
        let tally = Tally::count(gold, answers, true, self.no_answer);
        let total = tally.total as f64;
        let correct = tally.correct as f64;
        let value = (correct + (correct / total) * tally.unanswered as f64) / total;
        Ok(tally.result(value))
    }

    fn dependencies(&self) -> &[&'static str] {
        &[Average::NAME]
    }

    /// Splits `unanswered` using the text-remapped accuracy of [`Average`]: every
    /// extra correct answer over C@1 is an abstention that hit the no-answer option.
    fn extras(
        &self,
        own: &MetricResult,
        primaries: &IndexMap<String, MetricResult>,
    ) -> Option<Extras> {
        let average_correct = primaries.get(Average::NAME)?.correct?;
        let unanswered_correct = average_correct.saturating_sub(own.correct?);
        let unanswered_incorrect = own.unanswered?.saturating_sub(unanswered_correct);
        Some(Extras {
            unanswered_correct: Some(unanswered_correct),
            unanswered_incorrect: Some(unanswered_incorrect),
        })
    }
}

/// Plain accuracy, `correct / total`.
///
/// Abstentions are remapped to the no-answer option when the records carry
/// option texts and a marker, so an abstention on an unanswerable question is
/// correct.
#[derive(Debug, Clone, Default)]
pub struct Average;

impl Average {
    pub const NAME: &'static str = "avg";
}

impl Metric for Average {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn score(&self, gold: &[Answer], answers: &[Answer]) -> Result<MetricResult, EvalError> {
        check_inputs(self.name(), gold, answers)?;
        let tally = Tally::count(gold, answers, self.needs_no_answer(), DEFAULT_ABSTAIN_CODE);
        Ok(tally.result(tally.correct as f64 / tally.total as f64))
    }
}

/// Weights of the utility metric, applied per question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilityWeights {
    pub unanswered: f64,
    pub incorrect: f64,
    pub correct: f64,
}

impl UtilityWeights {
    pub fn new(unanswered: f64, incorrect: f64, correct: f64) -> Self {
        Self {
            unanswered,
            incorrect,
            correct,
        }
    }
}

impl fmt::Display for UtilityWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.unanswered, self.incorrect, self.correct)
    }
}

impl FromStr for UtilityWeights {
    type Err = anyhow::Error;

    /// Parses `"unanswered,incorrect,correct"`, e.g. `"0,-0.25,1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let weights = s
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .with_context(|| format!("invalid utility weight `{part}`"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        match weights.as_slice() {
            [unanswered, incorrect, correct] => Ok(Self::new(*unanswered, *incorrect, *correct)),
            _ => Err(anyhow!(
                "expected 3 comma-separated utility weights, got {}",
                weights.len()
            )),
        }
    }
}

/// Linear utility `(w_u * unanswered + w_i * incorrect + w_c * correct) / total`.
///
/// Each weight triple is its own metric, named `utility_<u>_<i>_<c>`, so several
/// triples can be reported side by side.
#[derive(Debug, Clone)]
pub struct Utility {
    weights: UtilityWeights,
    no_answer: i64,
    name: String,
}

impl Utility {
    pub fn new(weights: UtilityWeights) -> Self {
        Self {
            name: format!("utility_{weights}"),
            weights,
            no_answer: DEFAULT_ABSTAIN_CODE,
        }
    }

    pub fn with_no_answer(mut self, no_answer: i64) -> Self {
        self.no_answer = no_answer;
        self
    }

    pub fn weights(&self) -> UtilityWeights {
        self.weights
    }
}

impl Metric for Utility {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs_no_answer(&self) -> bool {
        true
    }

    fn no_answer(&self) -> Option<i64> {
        Some(self.no_answer)
    }

    fn score(&self, gold: &[Answer], answers: &[Answer]) -> Result<MetricResult, EvalError> {
        check_inputs(self.name(), gold, answers)?;
        let tally = Tally::count(gold, answers, true, self.no_answer);
        let UtilityWeights {
            unanswered,
            incorrect,
            correct,
        } = self.weights;
        let value = (unanswered * tally.unanswered as f64
            + incorrect * tally.incorrect() as f64
            + correct * tally.correct as f64)
            / tally.total as f64;
        Ok(tally.result(value))
    }
}

/// Binary confusion matrix; `value` is the accuracy over the two classes.
#[derive(Debug, Clone, Default)]
pub struct ConfusionMatrix;

impl ConfusionMatrix {
    pub const NAME: &'static str = "confusion_matrix";
}

impl Metric for ConfusionMatrix {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn score(&self, gold: &[Answer], answers: &[Answer]) -> Result<MetricResult, EvalError> {
        check_inputs(self.name(), gold, answers)?;
        let accept = self.needs_no_answer();
        let pairs: Vec<(Decision, Decision)> = gold
            .iter()
            .zip(answers)
            .map(|(g, a)| (g.resolve(accept), a.resolve(accept)))
            .collect();

        let abstain_code = answers
            .first()
            .map_or(DEFAULT_ABSTAIN_CODE, |answer| answer.abstain_code);
        let mut labels: Vec<i64> = pairs
            .iter()
            .flat_map(|(g, p)| [g.code(abstain_code), p.code(abstain_code)])
            .collect();
        labels.sort_unstable();
        labels.dedup();
        if labels.len() > 2 {
            return Err(EvalError::UnsupportedLabelSpace {
                metric: self.name().to_string(),
                observed: labels.len(),
            });
        }

        let mut counts = ConfusionCounts {
            labels: labels.clone(),
            tp: vec![0; labels.len()],
            fp: vec![0; labels.len()],
            tn: vec![0; labels.len()],
            fn_: vec![0; labels.len()],
        };
        for (expected, predicted) in &pairs {
            let (expected, predicted) = (expected.code(abstain_code), predicted.code(abstain_code));
            for (class, &label) in labels.iter().enumerate() {
                match (predicted == label, expected == label) {
                    (true, true) => counts.tp[class] += 1,
                    (true, false) => counts.fp[class] += 1,
                    (false, true) => counts.fn_[class] += 1,
                    (false, false) => counts.tn[class] += 1,
                }
            }
        }

        let total = pairs.len();
        let correct = pairs.iter().filter(|(g, p)| g == p).count();
        Ok(MetricResult::builder()
            .value(correct as f64 / total as f64)
            .total(total)
            .correct(correct)
            .incorrect(total - correct)
            .confusion(counts)
            .build())
    }
}

/// F1 of answering relative to the no-answer class.
///
/// Precision is `correct / answered`, recall is `correct / total`: abstaining
/// costs recall but never precision.
#[derive(Debug, Clone, Default)]
pub struct F1 {
    no_answer: Option<i64>,
}

impl F1 {
    pub const NAME: &'static str = "f1";

    pub fn new(no_answer: Option<i64>) -> Self {
        Self { no_answer }
    }
}

impl Metric for F1 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn needs_no_answer(&self) -> bool {
        true
    }

    fn no_answer(&self) -> Option<i64> {
        self.no_answer
    }

    fn score(&self, gold: &[Answer], answers: &[Answer]) -> Result<MetricResult, EvalError> {
        let Some(no_answer) = self.no_answer else {
            return Err(EvalError::MissingConfiguration {
                metric: self.name().to_string(),
            });
        };
        check_inputs(self.name(), gold, answers)?;

        let tally = Tally::count(gold, answers, true, no_answer);
        let correct = tally.correct as f64;
        let precision = match tally.answered() {
            0 => 0.0,
            answered => correct / answered as f64,
        };
        let recall = correct / tally.total as f64;
        let value = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Ok(tally.result(value))
    }
}

/// Names accepted wherever metrics are chosen by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum MetricKind {
    #[strum(serialize = "c_at_1")]
    CAt1,
    #[strum(serialize = "avg")]
    Average,
    #[strum(serialize = "f1")]
    F1,
    #[strum(serialize = "confusion_matrix")]
    ConfusionMatrix,
    #[strum(serialize = "utility")]
    Utility,
}

/// Instantiates metrics in the requested order.
///
/// Metrics that need a sentinel get `no_answer`. `utility` expands to one
/// metric per weight triple and requires at least one.
pub fn build_metrics(
    kinds: &[MetricKind],
    utility_weights: &[UtilityWeights],
    no_answer: i64,
) -> Result<Vec<Box<dyn Metric>>, EvalError> {
    let mut metrics: Vec<Box<dyn Metric>> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        match kind {
            MetricKind::CAt1 => metrics.push(Box::new(CAt1::new(no_answer))),
            MetricKind::Average => metrics.push(Box::new(Average)),
            MetricKind::F1 => metrics.push(Box::new(F1::new(Some(no_answer)))),
            MetricKind::ConfusionMatrix => metrics.push(Box::new(ConfusionMatrix)),
            MetricKind::Utility => {
                if utility_weights.is_empty() {
                    return Err(EvalError::MissingConfiguration {
                        metric: kind.to_string(),
                    });
                }
                metrics.extend(
                    utility_weights
                        .iter()
                        .map(|weights| {
                            Box::new(Utility::new(*weights).with_no_answer(no_answer))
                                as Box<dyn Metric>
                        }),
                );
            }
        }
    }
    Ok(metrics)
}
