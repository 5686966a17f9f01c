use serde::{Deserialize, Serialize};

use crate::core::{Answer, Decision, EvalError, Label, is_no_answer_text};
use crate::evaluate::Subset;

pub const HAS_ANSWER_PREFIX: &str = "has_ans";
pub const NO_ANSWER_PREFIX: &str = "no_has_ans";

/// A gold multiple-choice example as handed over by a dataset processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldExample {
    #[serde(alias = "id")]
    pub example_id: String,
    pub label: Label,
    /// Literal text of each option.
    #[serde(default, alias = "options")]
    pub endings: Option<Vec<String>>,
}

impl GoldExample {
    pub fn new(example_id: impl Into<String>, label: impl Into<Label>) -> Self {
        Self {
            example_id: example_id.into(),
            label: label.into(),
            endings: None,
        }
    }

    pub fn with_endings(mut self, endings: Vec<String>) -> Self {
        self.endings = Some(endings);
        self
    }

    /// Gold option index. Gold labels never abstain.
    pub fn label_index(&self) -> Result<usize, EvalError> {
        match self.label.to_id()? {
            id if id >= 0 => Ok(id as usize),
            _ => Err(EvalError::InvalidLabel {
                label: self.label.to_string(),
            }),
        }
    }

    pub fn num_options(&self) -> Option<usize> {
        self.endings.as_ref().map(Vec::len)
    }

    /// Builds the gold decision record, carrying option texts and the no-answer
    /// marker when given.
    pub fn to_answer(&self, no_answer_text: Option<&str>) -> Result<Answer, EvalError> {
        let label = self.label_index()?;
        Ok(Answer::builder()
            .example_id(self.example_id.clone())
            .label(label)
            .pred_label(Decision::Choice(label))
            .maybe_option_texts(self.endings.clone())
            .maybe_no_answer_text(no_answer_text)
            .build())
    }
}

/// An ordered split of gold examples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub examples: Vec<GoldExample>,
}

impl Dataset {
    pub fn new(examples: Vec<GoldExample>) -> Self {
        Self { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn gold_answers(&self, no_answer_text: Option<&str>) -> Result<Vec<Answer>, EvalError> {
        self.examples
            .iter()
            .map(|example| example.to_answer(no_answer_text))
            .collect()
    }

    /// One mask entry per example, `true` where `test` holds.
    pub fn find_mask(&self, test: impl Fn(&GoldExample) -> bool) -> Vec<bool> {
        self.examples.iter().map(test).collect()
    }

    /// `has_ans` / `no_has_ans` subsets: whether the gold option's text
    /// contains the no-answer marker (case-insensitive).
    pub fn answerability_subsets(&self, no_answer_text: &str) -> Vec<Subset> {
        let is_unanswerable = |example: &GoldExample| {
            let gold_text = example.label_index().ok().and_then(|label| {
                example
                    .endings
                    .as_ref()
                    .and_then(|endings| endings.get(label))
            });
            gold_text.is_some_and(|text| is_no_answer_text(text, no_answer_text))
        };

        vec![
            Subset::new(HAS_ANSWER_PREFIX, self.find_mask(|ex| !is_unanswerable(ex))),
            Subset::new(NO_ANSWER_PREFIX, self.find_mask(is_unanswerable)),
        ]
    }
}
