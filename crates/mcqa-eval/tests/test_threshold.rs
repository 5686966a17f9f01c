use mcqa_eval::{Answer, Average, CAt1, EvalError, F1, Metric, MetricResult, Threshold};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::*;

fn scored(id: &str, probs: Vec<f64>, label: usize) -> Answer {
    Answer::builder()
        .example_id(id)
        .probs(probs)
        .label(label)
        .build()
}

/// Nine records whose max scores are 0.1, 0.2, ..., 0.9. Odd positions are
/// answered correctly, even ones are wrong.
#[fixture]
fn ladder() -> (Vec<Answer>, Vec<Answer>) {
    let mut gold = Vec::new();
    let mut answers = Vec::new();
    for step in 1..=9 {
        let top = step as f64 / 10.0;
        let label = if step % 2 == 1 { 0 } else { 1 };
        gold.push(Answer::gold(format!("q{step}"), label));
        answers.push(scored(&format!("q{step}"), vec![top, top / 2.0], label));
    }
    (gold, answers)
}

/// Scores 1.0 everywhere, so the first candidate wins.
struct Flat;

impl Metric for Flat {
    fn name(&self) -> &str {
        "flat"
    }

    fn score(&self, _gold: &[Answer], _answers: &[Answer]) -> Result<MetricResult, EvalError> {
        Ok(MetricResult::builder().value(1.0).build())
    }
}

/// Fails for any threshold above `limit`.
struct FailsAbove {
    limit: f64,
}

impl Metric for FailsAbove {
    fn name(&self) -> &str {
        "fails_above"
    }

    fn score(&self, gold: &[Answer], answers: &[Answer]) -> Result<MetricResult, EvalError> {
        if answers.iter().any(|answer| answer.threshold > self.limit) {
            return Err(EvalError::EmptyInput {
                metric: self.name().to_string(),
            });
        }
        Average.score(gold, answers)
    }
}

#[rstest]
fn test_candidates_are_zero_plus_max_scores(ladder: (Vec<Answer>, Vec<Answer>)) {
    let (_, mut answers) = ladder;
    answers.push(scored("dup", vec![0.5, 0.1], 0));
    answers.push(Answer::gold("hard", 0));

    let candidates = Threshold::candidates(&answers);
    let expected: Vec<f64> = (0..=9).map(|step| step as f64 / 10.0).collect();
    assert_eq!(candidates, expected);
}

#[rstest]
fn test_best_threshold_for_c_at_1() {
    let gold = vec![Answer::gold("q1", 0), Answer::gold("q2", 1)];
    let answers = vec![
        scored("q1", vec![0.9, 0.1], 0),
        scored("q2", vec![0.6, 0.4], 1),
    ];

    let report = Threshold::builder()
        .build()
        .sweep(&CAt1::default(), &gold, &answers)
        .unwrap();
    assert_eq!(report.candidates, vec![0.0, 0.6, 0.9]);
    assert_eq!(report.scores, vec![0.5, 0.75, 0.0]);
    assert_eq!(report.best_threshold, 0.6);
    assert_eq!(report.best_score, 0.75);
    assert_eq!(report.best_index, 1);
}

#[rstest]
fn test_ties_keep_lowest_candidate(ladder: (Vec<Answer>, Vec<Answer>)) {
    let (gold, answers) = ladder;
    let report = Threshold::builder().build().sweep(&Flat, &gold, &answers).unwrap();
    assert_eq!(report.best_index, 0);
    assert_eq!(report.best_threshold, 0.0);
}

#[rstest]
#[case(Threshold::builder().build())]
#[case(Threshold::builder().batch_size(1).build())]
#[case(Threshold::builder().batch_size(4).workers(2).build())]
#[case(Threshold::builder().parallel_breakpoint(0).workers(3).build())]
#[case(Threshold::builder().parallel_breakpoint(0).workers(32).build())]
fn test_parallel_matches_sequential(
    ladder: (Vec<Answer>, Vec<Answer>),
    #[case] search: Threshold,
) {
    let (gold, answers) = ladder;
    let sequential = Threshold::builder()
        .parallel_breakpoint(usize::MAX)
        .build()
        .sweep(&CAt1::default(), &gold, &answers)
        .unwrap();
    let report = search.sweep(&CAt1::default(), &gold, &answers).unwrap();
    assert_eq!(report, sequential);
}

#[rstest]
fn test_sweep_leaves_inputs_untouched(ladder: (Vec<Answer>, Vec<Answer>)) {
    let (gold, answers) = ladder;
    let before = answers.clone();

    for search in [
        Threshold::builder().build(),
        Threshold::builder().batch_size(2).build(),
    ] {
        search.find_best_threshold(&Average, &gold, &answers).unwrap();
        assert_eq!(answers, before);
    }
}

#[rstest]
#[case(Threshold::builder().build())]
#[case(Threshold::builder().batch_size(1).build())]
fn test_metric_failure_aborts_sweep(
    ladder: (Vec<Answer>, Vec<Answer>),
    #[case] search: Threshold,
) {
    let (gold, answers) = ladder;

    let err = search
        .find_best_threshold(&F1::new(None), &gold, &answers)
        .unwrap_err();
    assert!(matches!(err, EvalError::MissingConfiguration { .. }));

    let err = search
        .find_best_threshold(&FailsAbove { limit: 0.5 }, &gold, &answers)
        .unwrap_err();
    assert!(matches!(err, EvalError::EmptyInput { .. }));
}

#[rstest]
fn test_misaligned_inputs_fail_before_selection(ladder: (Vec<Answer>, Vec<Answer>)) {
    let (gold, answers) = ladder;
    let err = Threshold::builder()
        .build()
        .find_best_threshold(&Average, &gold[..3], &answers)
        .unwrap_err();
    assert!(matches!(err, EvalError::LengthMismatch { .. }));
}

fn answer_sets() -> impl Strategy<Value = (Vec<Answer>, Vec<Answer>)> {
    prop::collection::vec((0usize..3, prop::collection::vec(0.0f64..1.0, 3)), 1..40).prop_map(
        |records| {
            let (gold, answers): (Vec<Answer>, Vec<Answer>) = records
                .into_iter()
                .enumerate()
                .map(|(i, (label, probs))| {
                    let id = format!("q{i}");
                    (Answer::gold(id.clone(), label), scored(&id, probs, label))
                })
                .unzip();
            (gold, answers)
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_batching_never_changes_the_result(
        (gold, answers) in answer_sets(),
        batch_size in 1usize..8,
        workers in 1usize..6,
    ) {
        let sequential = Threshold::builder()
            .parallel_breakpoint(usize::MAX)
            .build()
            .sweep(&CAt1::default(), &gold, &answers)
            .unwrap();
        let batched = Threshold::builder()
            .batch_size(batch_size)
            .workers(workers)
            .build()
            .sweep(&CAt1::default(), &gold, &answers)
            .unwrap();
        prop_assert_eq!(batched, sequential);
    }

    #[test]
    fn prop_best_is_the_first_maximum(
        (gold, answers) in answer_sets(),
    ) {
        let report = Threshold::builder()
            .build()
            .sweep(&CAt1::default(), &gold, &answers)
            .unwrap();
        prop_assert!(report.scores.iter().all(|score| *score <= report.best_score));
        prop_assert!(report.scores[..report.best_index].iter().all(|score| *score < report.best_score));
        prop_assert_eq!(report.candidates[report.best_index], report.best_threshold);
    }
}
