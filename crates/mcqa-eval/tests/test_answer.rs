use mcqa_eval::{
    Answer, Decision, EvalError, NamedScores, ScoreField, apply_no_answer, apply_threshold,
    is_no_answer_text, min_score,
};
use proptest::prelude::*;
use rstest::*;

fn scored(id: &str, probs: Vec<f64>, label: usize) -> Answer {
    Answer::builder()
        .example_id(id)
        .probs(probs)
        .label(label)
        .build()
}

#[rstest]
#[case(vec![0.9, 0.1], 0.5, Decision::Choice(0))]
#[case(vec![0.2, 0.8], 0.5, Decision::Choice(1))]
#[case(vec![0.4, 0.6], 0.5, Decision::Choice(1))]
#[case(vec![0.3, 0.3], 0.5, Decision::Abstain)]
#[case(vec![0.5, 0.5], 0.5, Decision::Abstain)]
#[case(vec![0.5, 0.5], 0.0, Decision::Choice(0))]
fn test_resolve_against_threshold(
    #[case] probs: Vec<f64>,
    #[case] threshold: f64,
    #[case] expected: Decision,
) {
    let mut answer = scored("q", probs, 0);
    answer.set_threshold(threshold);
    assert_eq!(answer.resolve(true), expected);
}

#[rstest]
fn test_forced_abstention_ignores_scores() {
    let mut answer = scored("q", vec![0.99, 0.01], 0);
    answer.is_no_answer = true;
    assert_eq!(answer.resolve(true), Decision::Abstain);
}

#[rstest]
fn test_hard_label_has_no_threshold_dependence() {
    let mut answer = Answer::builder()
        .example_id("q")
        .label(0)
        .pred_label(Decision::Choice(2))
        .build();
    answer.set_threshold(100.0);
    assert_eq!(answer.resolve(true), Decision::Choice(2));
}

#[rstest]
fn test_abstention_remaps_to_no_answer_option() {
    let mut answer = Answer::builder()
        .example_id("q")
        .probs(vec![0.2, 0.3, 0.1])
        .label(2)
        .option_texts(vec![
            "Paris".to_string(),
            "Rome".to_string(),
            "Not enough information".to_string(),
        ])
        .no_answer_text("NOT ENOUGH INFORMATION")
        .build();
    answer.set_threshold(0.5);

    assert_eq!(answer.resolve(true), Decision::Abstain);
    assert_eq!(answer.resolve(false), Decision::Choice(2));
}

#[rstest]
fn test_abstention_stays_without_marker_option() {
    let mut answer = Answer::builder()
        .example_id("q")
        .probs(vec![0.2, 0.3])
        .label(0)
        .option_texts(vec!["Paris".to_string(), "Rome".to_string()])
        .no_answer_text("not enough information")
        .build();
    answer.set_threshold(0.5);
    assert_eq!(answer.resolve(false), Decision::Abstain);
}

#[rstest]
fn test_apply_no_answer_marks_matching_predictions() {
    let texts = vec![
        "Paris".to_string(),
        "Rome".to_string(),
        "There is not enough information".to_string(),
    ];
    let gold = vec![
        Answer {
            option_texts: Some(texts.clone()),
            ..Answer::gold("q0", 2)
        },
        Answer {
            option_texts: Some(texts.clone()),
            ..Answer::gold("q1", 2)
        },
        Answer {
            option_texts: Some(texts.clone()),
            ..Answer::gold("q2", 0)
        },
    ];
    let mut answers = vec![
        scored("q0", vec![0.1, 0.2, 0.7], 2),
        scored("q1", vec![0.6, 0.2, 0.2], 2),
        scored("q2", vec![0.8, 0.1, 0.1], 0),
    ];

    let marked = apply_no_answer(&gold, &mut answers, "not enough information").unwrap();
    assert_eq!(marked, 1);
    assert_eq!(
        answers.iter().map(|a| a.is_no_answer).collect::<Vec<_>>(),
        vec![true, false, false]
    );
    assert_eq!(answers[0].resolve(true), Decision::Abstain);

    let err = apply_no_answer(&gold[..2], &mut answers, "none").unwrap_err();
    assert!(matches!(err, EvalError::LengthMismatch { gold: 2, predicted: 3 }));
}

#[rstest]
fn test_no_answer_label_detection() {
    let answer = Answer::builder()
        .example_id("q")
        .label(1)
        .option_texts(vec!["yes".to_string(), "Unanswerable".to_string()])
        .no_answer_text("unanswerable")
        .build();
    assert_eq!(answer.no_answer_option(), Some(1));
    assert!(answer.has_no_answer_label());
    assert!(!Answer::gold("q", 1).has_no_answer_label());
}

#[rstest]
fn test_gold_marker_matches_by_containment() {
    let answer = Answer::builder()
        .example_id("q")
        .label(1)
        .option_texts(vec![
            "yes".to_string(),
            "There is not enough information".to_string(),
        ])
        .no_answer_text("Not enough information")
        .build();
    assert!(answer.has_no_answer_label());
    assert_eq!(answer.no_answer_option(), None);
    assert!(is_no_answer_text("NONE of the above", "none"));
    assert!(!is_no_answer_text("yes", "none"));
}

#[rstest]
fn test_score_field_switches_without_copy() {
    let mut answer = Answer::builder()
        .example_id("q")
        .probs(vec![0.9, 0.1])
        .logits(vec![-1.0, 3.0])
        .custom(NamedScores {
            name: "ensemble".to_string(),
            values: vec![0.1, 0.2, 0.7],
        })
        .label(0)
        .build();

    assert_eq!(answer.resolve(true), Decision::Choice(0));
    answer.set_score_field(ScoreField::Logits);
    assert_eq!(answer.resolve(true), Decision::Choice(1));
    assert_eq!(answer.min_score(), Some(-1.0));
    answer.set_score_field(ScoreField::Custom);
    assert_eq!(answer.resolve(true), Decision::Choice(2));
    assert_eq!(answer.max_score(), Some(0.7));

    assert_eq!("logits".parse::<ScoreField>().unwrap(), ScoreField::Logits);
    assert_eq!("ensemble".parse::<ScoreField>().unwrap(), ScoreField::Custom);
}

#[rstest]
fn test_missing_score_field_falls_back_to_pred_label() {
    let mut answer = Answer::builder()
        .example_id("q")
        .probs(vec![0.9, 0.1])
        .label(0)
        .pred_label(Decision::Choice(1))
        .build();
    answer.set_score_field(ScoreField::Logits);
    assert_eq!(answer.max_score(), None);
    assert_eq!(answer.resolve(true), Decision::Choice(1));
}

#[rstest]
fn test_batch_min_score() {
    let answers = vec![
        scored("a", vec![0.4, 0.6], 0),
        scored("b", vec![0.05, 0.95], 0),
        Answer::gold("c", 1),
    ];
    assert_eq!(min_score(&answers), Some(0.05));
}

#[rstest]
fn test_clone_is_independent() {
    let original = scored("q", vec![0.3, 0.7], 1);
    let mut clone = original.clone();
    assert_eq!(clone.resolve(true), original.resolve(true));

    clone.set_threshold(0.9);
    assert_eq!(clone.resolve(true), Decision::Abstain);
    assert_eq!(original.resolve(true), Decision::Choice(1));
    assert_eq!(original.threshold, 0.0);
}

#[rstest]
fn test_threshold_reset_reproduces_resolution() {
    let mut answers = vec![
        scored("a", vec![0.1, 0.9], 1),
        scored("b", vec![0.45, 0.55], 0),
    ];
    let before: Vec<_> = answers.iter().map(|a| a.resolve(true)).collect();

    for t in [0.2, 0.5, 0.6, 0.95] {
        apply_threshold(&mut answers, t);
    }
    apply_threshold(&mut answers, 0.0);

    let after: Vec<_> = answers.iter().map(|a| a.resolve(true)).collect();
    assert_eq!(before, after);
}

proptest! {
    // Between two consecutive breakpoints nothing can change.
    #[test]
    fn prop_resolution_constant_between_breakpoints(
        probs in prop::collection::vec(0.0f64..1.0, 1..6),
        a in 0.0f64..1.0,
        b in 0.0f64..1.0,
    ) {
        let (t1, t2) = if a <= b { (a, b) } else { (b, a) };
        let answer = scored("q", probs.clone(), 0);
        let top = answer.max_score().unwrap();
        prop_assume!(!(top > t1 && top <= t2));

        let mut low = answer.clone();
        low.set_threshold(t1);
        let mut high = answer;
        high.set_threshold(t2);
        prop_assert_eq!(low.resolve(true), high.resolve(true));
    }

    #[test]
    fn prop_clone_resolves_identically(
        probs in prop::collection::vec(0.0f64..1.0, 1..6),
        threshold in 0.0f64..1.0,
        bumped in 0.0f64..1.0,
    ) {
        let mut original = scored("q", probs, 0);
        original.set_threshold(threshold);
        let expected = original.resolve(true);

        let mut clone = original.clone();
        prop_assert_eq!(clone.resolve(true), expected);
        clone.set_threshold(bumped);
        prop_assert_eq!(original.resolve(true), expected);
    }
}
