use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::EvalError;

/// An option identifier as it appears in datasets and prediction files.
///
/// Either an ordinal (`2`, `"2"`) or a letter code (`"C"`, `"c"`). Use
/// [`Label::to_id`] to normalize it to an option index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Index(i64),
    Text(String),
}

impl Label {
    /// Normalizes the label to an integer id.
    ///
    /// Numeric strings parse as integers, single letters map to their alphabet
    /// position (`A` → 0). Negative ids are kept so an abstain code written into a
    /// prediction file round-trips.
    pub fn to_id(&self) -> Result<i64, EvalError> {
        match self {
            Self::Index(index) => Ok(*index),
            Self::Text(text) => label_to_id(text),
        }
    }
}

impl From<usize> for Label {
    fn from(index: usize) -> Self {
        Self::Index(index as i64)
    }
}

impl From<&str> for Label {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

pub fn label_to_id(label: &str) -> Result<i64, EvalError> {
    let trimmed = label.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(id);
    }

    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => {
            Ok((letter.to_ascii_uppercase() as u8 - b'A') as i64)
        }
        _ => Err(EvalError::InvalidLabel {
            label: label.to_string(),
        }),
    }
}
