mod answer;
mod errors;
mod labels;

pub use answer::{
    Answer, DEFAULT_ABSTAIN_CODE, Decision, NamedScores, ScoreField, apply_no_answer,
    apply_score_field, apply_threshold, is_no_answer_text, min_score,
};
pub use errors::{ErrorClass, EvalError};
pub use labels::{Label, label_to_id};
