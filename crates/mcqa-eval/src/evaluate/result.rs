use bon::Builder;
use serde::{Deserialize, Serialize};

/// Output of one metric invocation: the score plus whatever counters the
/// metric tracks.
///
/// Counters a metric does not track stay `None` and are left out of the
/// serialized form, so a report only shows what was actually measured.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct MetricResult {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorrect: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unanswered: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unanswered_correct: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unanswered_incorrect: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confusion: Option<ConfusionCounts>,
}

impl MetricResult {
    /// Returns a copy carrying the derived fields of an extras pass.
    pub fn with_extras(self, extras: Extras) -> Self {
        Self {
            unanswered_correct: extras.unanswered_correct.or(self.unanswered_correct),
            unanswered_incorrect: extras.unanswered_incorrect.or(self.unanswered_incorrect),
            ..self
        }
    }
}

/// Per-class confusion counts over a binary label space.
///
/// `labels[i]` is the integer code of class `i` (an option index, or the
/// abstain code); the count vectors are indexed the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub labels: Vec<i64>,
    pub tp: Vec<usize>,
    pub fp: Vec<usize>,
    pub tn: Vec<usize>,
    #[serde(rename = "fn")]
    pub fn_: Vec<usize>,
}

/// Auxiliary fields derived after all primary results exist.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Extras {
    pub unanswered_correct: Option<usize>,
    pub unanswered_incorrect: Option<usize>,
}
