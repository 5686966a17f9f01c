use bon::Builder;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::EvalError;
use crate::utils::argmax;

/// Default integer written for an abstention.
pub const DEFAULT_ABSTAIN_CODE: i64 = -1;

/// A resolved answer: one of the options, or no answer at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Choice(usize),
    Abstain,
}

impl Decision {
    /// Maps an integer id to a decision, treating `abstain_code` (and any other
    /// negative id) as abstention.
    pub fn from_id(id: i64, abstain_code: i64) -> Self {
        if id == abstain_code || id < 0 {
            Self::Abstain
        } else {
            Self::Choice(id as usize)
        }
    }

    /// Integer form used in reports: the option index, or `abstain_code`.
    pub fn code(self, abstain_code: i64) -> i64 {
        match self {
            Self::Choice(index) => index as i64,
            Self::Abstain => abstain_code,
        }
    }

    pub fn is_abstain(self) -> bool {
        matches!(self, Self::Abstain)
    }
}

/// Which score vector on an [`Answer`] is "the" scores.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreField {
    #[default]
    Probs,
    Logits,
    /// The arbitrary-named alternate field, see [`NamedScores`].
    Custom,
}

impl FromStr for ScoreField {
    type Err = std::convert::Infallible;

    /// `probs` and `logits` select the built-in fields; any other name selects the
    /// custom field.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "probs" => Self::Probs,
            "logits" => Self::Logits,
            _ => Self::Custom,
        })
    }
}

/// A score vector read from a prediction field that is neither `probs` nor `logits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedScores {
    pub name: String,
    pub values: Vec<f64>,
}

/// Per-question decision record.
///
/// Holds the raw option scores, the gold label, and the no-answer configuration,
/// and resolves to a [`Decision`] through [`resolve`](Answer::resolve). Both gold
/// and predicted collections are built from this type; a gold record simply has
/// no scores and a `pred_label` equal to its `label`.
///
/// ```
/// use mcqa_eval::{Answer, Decision};
///
/// let mut answer = Answer::builder()
///     .example_id("q1")
///     .probs(vec![0.4, 0.6])
///     .label(0)
///     .build();
/// assert_eq!(answer.resolve(true), Decision::Choice(1));
///
/// answer.set_threshold(0.6);
/// assert_eq!(answer.resolve(true), Decision::Abstain);
/// ```
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Answer {
    #[builder(into)]
    pub example_id: String,
    pub probs: Option<Vec<f64>>,
    pub logits: Option<Vec<f64>>,
    pub custom: Option<NamedScores>,
    #[builder(default)]
    pub active_score_field: ScoreField,
    /// Gold option index.
    pub label: usize,
    /// Hard prediction, used when no score vector is available.
    pub pred_label: Option<Decision>,
    pub option_texts: Option<Vec<String>>,
    #[builder(into)]
    pub no_answer_text: Option<String>,
    #[builder(default)]
    pub threshold: f64,
    #[builder(default = DEFAULT_ABSTAIN_CODE)]
    pub abstain_code: i64,
    #[builder(default)]
    pub is_no_answer: bool,
}

impl Answer {
    /// Gold record: resolves to `label` regardless of threshold.
    pub fn gold(example_id: impl Into<String>, label: usize) -> Self {
        Self::builder()
            .example_id(example_id)
            .label(label)
            .pred_label(Decision::Choice(label))
            .build()
    }

    /// Rejects empty score vectors.
    pub fn validate(&self) -> Result<(), EvalError> {
        let empty = [self.probs.as_deref(), self.logits.as_deref()]
            .into_iter()
            .chain(std::iter::once(self.custom.as_ref().map(|c| c.values.as_slice())))
            .flatten()
            .any(|scores| scores.is_empty());
        if empty {
            return Err(EvalError::EmptyScores {
                example_id: self.example_id.clone(),
            });
        }
        Ok(())
    }

    /// The score vector selected by `active_score_field`, if present.
    pub fn scores(&self) -> Option<&[f64]> {
        match self.active_score_field {
            ScoreField::Probs => self.probs.as_deref(),
            ScoreField::Logits => self.logits.as_deref(),
            ScoreField::Custom => self.custom.as_ref().map(|c| c.values.as_slice()),
        }
        .filter(|scores| !scores.is_empty())
    }

    pub fn max_score(&self) -> Option<f64> {
        self.scores()
            .map(|scores| scores.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    pub fn min_score(&self) -> Option<f64> {
        self.scores()
            .map(|scores| scores.iter().copied().fold(f64::INFINITY, f64::min))
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn set_score_field(&mut self, field: ScoreField) {
        self.active_score_field = field;
    }

    /// Resolves the record to a single decision.
    ///
    /// Forced abstentions win; otherwise the first option achieving the top score
    /// is accepted only when that score is strictly above `threshold`. Without
    /// scores the hard `pred_label` is returned as is. When the outcome is an
    /// abstention and `accept_abstention` is false, the option whose text matches
    /// `no_answer_text` (case-insensitive) is returned instead, if there is one.
    pub fn resolve(&self, accept_abstention: bool) -> Decision {
        let decision = if self.is_no_answer {
            Decision::Abstain
        } else if let Some(scores) = self.scores() {
            match (self.max_score(), argmax(scores)) {
                (Some(top), Some(index)) if top > self.threshold => Decision::Choice(index),
                _ => Decision::Abstain,
            }
        } else {
            self.pred_label.unwrap_or(Decision::Abstain)
        };

        if decision.is_abstain() && !accept_abstention {
            if let Some(index) = self.no_answer_option() {
                return Decision::Choice(index);
            }
        }
        decision
    }

    /// Index of the option whose text is the configured no-answer marker.
    pub fn no_answer_option(&self) -> Option<usize> {
        let marker = self.no_answer_text.as_deref()?.to_lowercase();
        self.option_texts
            .as_ref()?
            .iter()
            .position(|text| text.to_lowercase() == marker)
    }

    /// Whether the text of this record's gold option marks it unanswerable,
    /// see [`is_no_answer_text`].
    pub fn has_no_answer_label(&self) -> bool {
        let gold_text = self
            .option_texts
            .as_ref()
            .and_then(|texts| texts.get(self.label));
        match (gold_text, self.no_answer_text.as_deref()) {
            (Some(text), Some(marker)) => is_no_answer_text(text, marker),
            _ => false,
        }
    }
}

/// Gold-side marker test: the option text contains the marker, ignoring case.
///
/// Used wherever a gold example is classified as unanswerable. Resolution of a
/// prediction instead needs the one option that *is* the marker, see
/// [`Answer::no_answer_option`].
pub fn is_no_answer_text(option_text: &str, marker: &str) -> bool {
    option_text.to_lowercase().contains(&marker.to_lowercase())
}

pub fn apply_threshold(answers: &mut [Answer], threshold: f64) {
    for answer in answers {
        answer.set_threshold(threshold);
    }
}

pub fn apply_score_field(answers: &mut [Answer], field: ScoreField) {
    for answer in answers {
        answer.set_score_field(field);
    }
}

/// Lowest score across all records' active vectors.
pub fn min_score(answers: &[Answer]) -> Option<f64> {
    answers
        .iter()
        .filter_map(Answer::min_score)
        .reduce(f64::min)
}

/// Marks predictions that picked the gold no-answer option as forced abstentions.
///
/// A record is marked when its gold option text contains the marker text and the
/// prediction resolves to that same option. Returns how many were marked.
pub fn apply_no_answer(
    gold: &[Answer],
    answers: &mut [Answer],
    no_answer_text: &str,
) -> Result<usize, EvalError> {
    if gold.len() != answers.len() {
        return Err(EvalError::LengthMismatch {
            gold: gold.len(),
            predicted: answers.len(),
        });
    }

    let mut marked = 0;
    for (gold_answer, answer) in gold.iter().zip(answers.iter_mut()) {
        let gold_text = gold_answer
            .option_texts
            .as_ref()
            .and_then(|texts| texts.get(gold_answer.label));
        let found = gold_text.is_some_and(|text| is_no_answer_text(text, no_answer_text));
        if found && answer.resolve(true) == Decision::Choice(gold_answer.label) {
            tracing::debug!(example_id = %answer.example_id, "applying no answer");
            answer.is_no_answer = true;
            marked += 1;
        }
    }
    Ok(marked)
}
