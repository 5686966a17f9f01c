//! End-to-end evaluation run: baseline scores, scores at a fixed threshold, and
//! scores at each metric's best threshold, assembled into one JSON-ready map.

use anyhow::{Context, Result, bail};
use bon::Builder;
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::core::{
    Answer, DEFAULT_ABSTAIN_CODE, ScoreField, apply_score_field, apply_threshold, min_score,
};
use crate::data::{Dataset, QASystem};
use crate::evaluate::{Evaluator, MetricKind, Results, Subset, UtilityWeights, build_metrics};
use crate::optimizer::Threshold;

/// Result key to serialized result or result group.
pub type Report = IndexMap<String, Value>;

/// What a run computes.
#[derive(Debug, Clone, Builder)]
pub struct RunConfig {
    pub metrics: Vec<MetricKind>,
    #[builder(default)]
    pub utility_weights: Vec<UtilityWeights>,
    /// Also report every metric at this fixed threshold.
    pub threshold: Option<f64>,
    /// Search the best threshold for every metric.
    #[builder(default)]
    pub find_threshold: bool,
    /// Marker text of the no-answer option. Enables text remapping and the
    /// `has_ans` / `no_has_ans` breakdown.
    #[builder(into)]
    pub no_answer_text: Option<String>,
    /// Score field to evaluate instead of `probs`.
    #[builder(into)]
    pub probs_field: Option<String>,
    #[builder(default = DEFAULT_ABSTAIN_CODE)]
    pub no_answer: i64,
    #[builder(default = Threshold::builder().build())]
    pub search: Threshold,
}

/// Runs the configured evaluation over `dataset` with answers from `qa_system`.
///
/// Fails when any gold example has no answer; configure a fill strategy on the
/// [`QASystem`] to tolerate that.
#[tracing::instrument(name = "mcqa.report.run", level = "info", skip_all, fields(examples = dataset.len()))]
pub fn run(config: &RunConfig, dataset: &Dataset, qa_system: &QASystem) -> Result<Report> {
    let metrics = build_metrics(&config.metrics, &config.utility_weights, config.no_answer)?;
    let evaluator = Evaluator::new(metrics);

    let no_answer_text = config.no_answer_text.as_deref();
    let gold = dataset.gold_answers(no_answer_text)?;
    let (mut answers, missing) = qa_system.get_answers(&dataset.examples)?;
    if !missing.is_empty() {
        bail!(
            "{} example(s) have no prediction (first: {})",
            missing.len(),
            missing[0]
        );
    }
    let subsets = no_answer_text
        .map(|text| dataset.answerability_subsets(text))
        .unwrap_or_default();

    if let Some(field) = config.probs_field.as_deref() {
        apply_score_field(&mut answers, ScoreField::from_str(field).unwrap_or_default());
        // An alternate field is not bounded to [0, 1]; start below its lowest
        // score so every record answers before any threshold is applied.
        match min_score(&answers) {
            Some(lowest) => apply_threshold(&mut answers, lowest - 1.0),
            None => warn!(field, "no record carries the requested score field"),
        }
    }

    let mut report = Report::new();
    report.extend(serialize(evaluator.evaluate_subsets(&gold, &answers, &subsets)?)?);

    if let Some(threshold) = config.threshold {
        let results = evaluate_at(&evaluator, &gold, &answers, &subsets, threshold)?;
        // Debug formatting keeps `1.0` from collapsing to `1`.
        report.insert(format!("threshold_{threshold:?}"), group(results, None)?);
    }

    if config.find_threshold {
        for metric in evaluator.metrics() {
            let best = config
                .search
                .find_best_threshold(&**metric, &gold, &answers)?;
            let results = evaluate_at(&evaluator, &gold, &answers, &subsets, best)?;
            report.insert(format!("{}_threshold", metric.name()), group(results, Some(best))?);
        }
    }

    info!(keys = report.len(), "evaluation finished");
    Ok(report)
}

fn evaluate_at(
    evaluator: &Evaluator,
    gold: &[Answer],
    answers: &[Answer],
    subsets: &[Subset],
    threshold: f64,
) -> Result<Results> {
    let mut thresholded = answers.to_vec();
    apply_threshold(&mut thresholded, threshold);
    Ok(evaluator.evaluate_subsets(gold, &thresholded, subsets)?)
}

fn serialize(results: Results) -> Result<Report> {
    results
        .into_iter()
        .map(|(key, result)| -> Result<(String, Value)> {
            Ok((key, serde_json::to_value(result)?))
        })
        .collect()
}

fn group(results: Results, threshold: Option<f64>) -> Result<Value> {
    let mut grouped = serialize(results)?;
    if let Some(threshold) = threshold {
        grouped.insert("threshold".to_string(), Value::from(threshold));
    }
    Ok(serde_json::to_value(grouped)?)
}

/// Where and how to write a report.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub overwrite: bool,
    /// Keep the top-level keys of an existing report, replacing those this
    /// report also has.
    pub merge: bool,
}

/// Writes `report` as pretty JSON, refusing to clobber an existing file unless
/// `overwrite` or `merge` is set.
pub fn write_report(path: &Path, report: &Report, options: &OutputOptions) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let exists = path.exists();
    if exists && !options.overwrite && !options.merge {
        bail!(
            "output file {} already exists, pass --overwrite or --merge",
            path.display()
        );
    }

    let mut output = if exists && options.merge {
        let previous = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str::<Report>(&previous)
            .with_context(|| format!("{} is not a JSON object", path.display()))?
    } else {
        Report::new()
    };
    output.extend(report.clone());

    fs::write(path, to_pretty_json(&output)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn to_pretty_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)? + "\n")
}
