use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use strum::IntoEnumIterator;

use mcqa_eval::report::{self, OutputOptions, RunConfig};
use mcqa_eval::{
    DataLoader, FillStrategy, MetricKind, QASystem, Threshold, UtilityWeights, init_tracing,
};

fn available_metrics() -> String {
    MetricKind::iter()
        .map(|kind| kind.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Parser)]
#[command(name = "mcqa-eval")]
#[command(about = "Evaluate multiple-choice QA predictions with a tunable no-answer threshold", long_about = None)]
#[command(version)]
struct Cli {
    /// Predictions from the model (JSON)
    #[arg(short, long)]
    predictions: PathBuf,

    /// Gold examples of the split to evaluate (JSON array or JSON lines)
    #[arg(short, long)]
    dataset: PathBuf,

    #[arg(short, long, num_args = 1.., required = true, help = format!("Metrics to apply (available: {})", available_metrics()))]
    metrics: Vec<MetricKind>,

    /// Weight triple `unanswered,incorrect,correct` for the utility metric;
    /// repeat the flag for several triples
    #[arg(long = "utility-weights", action = ArgAction::Append, allow_hyphen_values = true)]
    utility_weights: Vec<UtilityWeights>,

    /// Search the best threshold for every metric
    #[arg(long = "find-threshold")]
    find_threshold: bool,

    /// Also report all metrics with this threshold applied to every answer
    #[arg(short, long, allow_negative_numbers = true)]
    threshold: Option<f64>,

    /// Text of the option that marks a question as unanswerable
    #[arg(long = "no-answer-text")]
    no_answer_text: Option<String>,

    /// Prediction field to use as scores instead of `probs`
    #[arg(long = "probs-field")]
    probs_field: Option<String>,

    /// Fill missing answers: uniform, random or a constant score
    #[arg(long = "fill-missing")]
    fill_missing: Option<FillStrategy>,

    /// Seed for the random fill strategy
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for large threshold sweeps
    #[arg(long, default_value = "8")]
    workers: usize,

    /// Where to write the results (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite the output file
    #[arg(long)]
    overwrite: bool,

    /// Merge results into the existing output file
    #[arg(long)]
    merge: bool,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let dataset = DataLoader::load_gold(&cli.dataset)?;
    let predictions = DataLoader::load_predictions(&cli.predictions)?;
    let qa_system = QASystem::builder()
        .predictions(predictions)
        .maybe_fill_missing(cli.fill_missing)
        .maybe_seed(cli.seed)
        .maybe_score_field_name(cli.probs_field.clone())
        .maybe_no_answer_text(cli.no_answer_text.clone())
        .build();

    let config = RunConfig::builder()
        .metrics(cli.metrics)
        .utility_weights(cli.utility_weights)
        .maybe_threshold(cli.threshold)
        .find_threshold(cli.find_threshold)
        .maybe_no_answer_text(cli.no_answer_text)
        .maybe_probs_field(cli.probs_field)
        .search(Threshold::builder().workers(cli.workers).build())
        .build();

    let results = report::run(&config, &dataset, &qa_system)?;

    match cli.output {
        Some(path) => {
            let options = OutputOptions {
                overwrite: cli.overwrite,
                merge: cli.merge,
            };
            report::write_report(&path, &results, &options)
                .with_context(|| format!("failed to save results to {}", path.display()))?;
        }
        None => print!("{}", report::to_pretty_json(&results)?),
    }
    Ok(())
}
