use anyhow::anyhow;
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::Label;

/// Joins a context id and a sub-question index into a flat example id.
pub const ID_SEPARATOR: char = '-';

/// Flat example id for sub-question `index` of `context`.
///
/// The index is zero-padded to two digits so ids sort the same as strings and
/// as numbers for up to 100 sub-questions.
pub fn nested_id(context: &str, index: usize) -> String {
    format!("{context}{ID_SEPARATOR}{index:02}")
}

/// A structured prediction: scores plus the labels the model run recorded.
///
/// Fields other than `probs` and `logits` are kept in `extra`, so an arbitrary
/// named score field can be selected later.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoredPrediction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probs: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logits: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pred_label: Option<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl ScoredPrediction {
    /// Reads `name` from the extra fields as a score vector.
    pub fn extra_scores(&self, name: &str) -> Option<Vec<f64>> {
        self.extra
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// One prediction for one example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Scored(ScoredPrediction),
    Label(Label),
}

/// A prediction as it may appear in a predictions file: either one prediction,
/// or a list of predictions for the sub-questions of one context.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawPrediction {
    Single(Prediction),
    Grouped(Vec<RawPrediction>),
}

/// Accepted layouts of a predictions file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PredictionFile {
    /// `[{"id": ..., "probs": [...], ...}, ...]`
    List(Vec<ScoredPrediction>),
    /// `{"<id>": <prediction or list of predictions>, ...}`
    Map(IndexMap<String, RawPrediction>),
}

impl PredictionFile {
    /// Flattens the file into `example id -> prediction`, in file order.
    pub fn into_flat(self) -> anyhow::Result<IndexMap<String, Prediction>> {
        let mut flat = IndexMap::new();
        match self {
            Self::List(predictions) => {
                for (position, prediction) in predictions.into_iter().enumerate() {
                    let id = prediction
                        .id
                        .clone()
                        .ok_or_else(|| anyhow!("prediction at position {position} has no `id`"))?;
                    flat.insert(id, Prediction::Scored(prediction));
                }
            }
            Self::Map(predictions) => {
                for (id, raw) in predictions {
                    flatten_into(&mut flat, id, raw);
                }
            }
        }
        Ok(flat)
    }
}

fn flatten_into(flat: &mut IndexMap<String, Prediction>, id: String, raw: RawPrediction) {
    match raw {
        RawPrediction::Single(prediction) => {
            flat.insert(id, prediction);
        }
        RawPrediction::Grouped(group) => {
            for (index, raw) in group.into_iter().enumerate() {
                flatten_into(flat, nested_id(&id, index), raw);
            }
        }
    }
}

/// How to fabricate scores for an example that has no prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillStrategy {
    /// Equal mass on every option.
    Uniform,
    /// One-hot on a random option.
    Random,
    /// The same score on every option.
    Value(f64),
}

impl FillStrategy {
    pub fn fill(&self, num_options: usize, rng: &mut impl Rng) -> Vec<f64> {
        match *self {
            Self::Uniform => vec![1.0 / num_options as f64; num_options],
            Self::Random => {
                let mut scores = vec![0.0; num_options];
                scores[rng.gen_range(0..num_options)] = 1.0;
                scores
            }
            Self::Value(value) => vec![value; num_options],
        }
    }
}

impl FromStr for FillStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "random" => Ok(Self::Random),
            other => other.parse::<f64>().map(Self::Value).map_err(|_| {
                anyhow!("unknown fill strategy `{s}` (expected uniform, random or a number)")
            }),
        }
    }
}
