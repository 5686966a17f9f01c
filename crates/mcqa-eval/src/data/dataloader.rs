use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

use crate::data::example::{Dataset, GoldExample};
use crate::data::prediction::{Prediction, PredictionFile};

/// Reads gold splits and prediction files from disk.
pub struct DataLoader;

impl DataLoader {
    /// Loads gold examples from a JSON array or from JSON lines.
    #[tracing::instrument(name = "mcqa.data.load_gold", level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_gold(path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read gold examples from {}", path.display()))?;

        let examples: Vec<GoldExample> = if data.trim_start().starts_with('[') {
            serde_json::from_str(&data)
                .with_context(|| format!("invalid gold examples in {}", path.display()))?
        } else {
            data.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(idx, line)| {
                    serde_json::from_str(line).with_context(|| {
                        format!("invalid gold example on line {} of {}", idx + 1, path.display())
                    })
                })
                .collect::<Result<_>>()?
        };
        tracing::debug!(examples = examples.len(), "gold examples loaded");
        Ok(Dataset::new(examples))
    }

    /// Loads a predictions file, flattening per-context groups into
    /// `<context>-<NN>` ids.
    #[tracing::instrument(name = "mcqa.data.load_predictions", level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_predictions(path: impl AsRef<Path>) -> Result<IndexMap<String, Prediction>> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read predictions from {}", path.display()))?;
        let file: PredictionFile = serde_json::from_str(&data)
            .with_context(|| format!("invalid predictions in {}", path.display()))?;
        let predictions = file.into_flat()?;
        tracing::debug!(predictions = predictions.len(), "predictions loaded");
        Ok(predictions)
    }
}
