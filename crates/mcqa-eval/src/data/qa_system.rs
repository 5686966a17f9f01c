use bon::Builder;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::core::{
    Answer, DEFAULT_ABSTAIN_CODE, Decision, EvalError, NamedScores, ScoreField,
};
use crate::data::example::GoldExample;
use crate::data::prediction::{FillStrategy, Prediction, ScoredPrediction};
use crate::utils::argmax;

/// Offline question-answering system: answers are looked up from predictions
/// produced by an earlier model run.
///
/// ```
/// use indexmap::IndexMap;
/// use mcqa_eval::{GoldExample, Label, Prediction, QASystem};
///
/// let predictions = IndexMap::from([("q1".to_string(), Prediction::Label(Label::from("B")))]);
/// let qa_system = QASystem::builder().predictions(predictions).build();
///
/// let gold = [GoldExample::new("q1", "B"), GoldExample::new("q2", "A")];
/// let (answers, missing) = qa_system.get_answers(&gold)?;
/// assert_eq!(answers.len(), 1);
/// assert_eq!(missing, vec!["q2".to_string()]);
/// # Ok::<(), mcqa_eval::EvalError>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct QASystem {
    predictions: IndexMap<String, Prediction>,
    /// Fabricate scores for examples without a prediction.
    pub fill_missing: Option<FillStrategy>,
    /// Seed for [`FillStrategy::Random`]; fresh entropy when unset.
    pub seed: Option<u64>,
    /// Extra prediction field to load as the custom score vector.
    #[builder(into)]
    pub score_field_name: Option<String>,
    /// Marker text of the no-answer option, copied onto every record.
    #[builder(into)]
    pub no_answer_text: Option<String>,
    #[builder(default = DEFAULT_ABSTAIN_CODE)]
    pub abstain_code: i64,
}

impl QASystem {
    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn get_prediction(&self, example_id: &str) -> Option<&Prediction> {
        self.predictions.get(example_id)
    }

    /// Builds one predicted record per gold example, in gold order.
    ///
    /// Examples with no prediction are skipped and their ids returned as the
    /// second element, unless a fill strategy is configured and the example's
    /// option count is known. Callers decide whether missing answers are fatal.
    #[tracing::instrument(
        name = "mcqa.qa_system.get_answers",
        level = "debug",
        skip_all,
        fields(examples = gold.len(), predictions = self.predictions.len())
    )]
    pub fn get_answers(
        &self,
        gold: &[GoldExample],
    ) -> Result<(Vec<Answer>, Vec<String>), EvalError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut answers = Vec::with_capacity(gold.len());
        let mut missing = Vec::new();
        for example in gold {
            let label = example.label_index()?;
            let answer = match self.predictions.get(&example.example_id) {
                Some(prediction) => Some(self.answer_from_prediction(example, label, prediction)?),
                None => self.fill(example, label, &mut rng),
            };

            match answer {
                Some(answer) => answers.push(answer),
                None => {
                    warn!(example_id = %example.example_id, "example not found in predictions");
                    missing.push(example.example_id.clone());
                }
            }
        }
        Ok((answers, missing))
    }

    fn base_answer(&self, example: &GoldExample, label: usize) -> Answer {
        Answer::builder()
            .example_id(example.example_id.clone())
            .label(label)
            .maybe_option_texts(example.endings.clone())
            .maybe_no_answer_text(self.no_answer_text.clone())
            .abstain_code(self.abstain_code)
            .build()
    }

    fn answer_from_prediction(
        &self,
        example: &GoldExample,
        label: usize,
        prediction: &Prediction,
    ) -> Result<Answer, EvalError> {
        let mut answer = self.base_answer(example, label);
        match prediction {
            Prediction::Label(pred_label) => {
                answer.pred_label = Some(Decision::from_id(pred_label.to_id()?, self.abstain_code));
            }
            Prediction::Scored(scored) => self.apply_scored(&mut answer, scored)?,
        }
        answer.validate()?;
        Ok(answer)
    }

    fn apply_scored(&self, answer: &mut Answer, scored: &ScoredPrediction) -> Result<(), EvalError> {
        answer.probs = scored.probs.clone();
        answer.logits = scored.logits.clone();

        if let Some(name) = self.score_field_name.as_deref() {
            let field = ScoreField::from_str(name).unwrap_or_default();
            if field == ScoreField::Custom {
                answer.custom = scored.extra_scores(name).map(|values| NamedScores {
                    name: name.to_string(),
                    values,
                });
            }
        }

        answer.pred_label = match &scored.pred_label {
            Some(pred_label) => Some(Decision::from_id(pred_label.to_id()?, self.abstain_code)),
            None => answer
                .probs
                .as_deref()
                .and_then(argmax)
                .map(Decision::Choice),
        };
        Ok(())
    }

    fn fill(&self, example: &GoldExample, label: usize, rng: &mut StdRng) -> Option<Answer> {
        let strategy = self.fill_missing?;
        let num_options = example.num_options().filter(|n| *n > 0)?;
        let probs = strategy.fill(num_options, rng);
        debug!(example_id = %example.example_id, ?strategy, "filled missing answer");

        let mut answer = self.base_answer(example, label);
        answer.pred_label = argmax(&probs).map(Decision::Choice);
        answer.probs = Some(probs);
        Some(answer)
    }
}
