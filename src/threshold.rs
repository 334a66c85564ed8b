use tracing::debug;

use crate::models::{round2, OutcomeSpec, QuestionMax, Threshold, Warning};

/// Resolves the maximum and minimum passing score of one outcome. Returns
/// `None` for an outcome without backing questions.
///
/// Questions missing from `maxima` count as 0 and push a warning.
pub fn resolve(
    spec: &OutcomeSpec,
    maxima: &QuestionMax,
    warnings: &mut Vec<Warning>,
) -> Option<Threshold> {
    if !spec.is_measurable() {
        return None;
    }

    let declared: Vec<f64> = spec
        .questions()
        .iter()
        .map(|question| match maxima.get(question) {
            Some(max) => max,
            None => {
                warnings.push(Warning::MissingQuestionMax {
                    outcome: spec.label().clone(),
                    question: question.clone(),
                });
                0.0
            }
        })
        .collect();

    let max_score: f64 = declared.iter().sum();
    let ratio = spec.min_ratio() / 100.0;

    // Single-question outcomes scale the mean declared maximum, multi-question
    // outcomes scale each maximum and sum. The two formulas are kept apart
    // so results match the reference figures exactly.
    let min_score = if declared.len() == 1 {
        mean(&declared) * ratio
    } else {
        declared.iter().map(|max| max * ratio).sum()
    };

    let threshold = Threshold {
        max_score: round2(max_score),
        min_score: round2(min_score),
    };
    debug!(
        outcome = %spec.label(),
        max_score = threshold.max_score,
        min_score = threshold.min_score,
        "resolved threshold"
    );
    Some(threshold)
}

/// Sum of declared maxima, unrounded, with missing entries as 0.
pub fn max_score(spec: &OutcomeSpec, maxima: &QuestionMax) -> f64 {
    spec.questions()
        .iter()
        .map(|question| maxima.get(question).unwrap_or(0.0))
        .sum()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutcomeLabel;

    fn spec(questions: &[&str], min_ratio: f64) -> OutcomeSpec {
        OutcomeSpec::new(
            OutcomeLabel::new("CLO1"),
            "",
            questions.iter().map(|q| q.to_string()).collect(),
            min_ratio,
            75.0,
        )
    }

    fn maxima(entries: &[(&str, f64)]) -> QuestionMax {
        entries.iter().map(|(q, m)| (q.to_string(), *m)).collect()
    }

    #[test]
    fn single_question_scales_its_maximum() {
        let mut warnings = Vec::new();
        let threshold = resolve(&spec(&["Q1"], 40.0), &maxima(&[("Q1", 2.5)]), &mut warnings)
            .unwrap();
        assert_eq!(threshold.max_score, 2.5);
        assert_eq!(threshold.min_score, round2(2.5 * (40.0 / 100.0)));
        assert_eq!(threshold.min_score, 1.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn multi_question_applies_ratio_per_question() {
        let mut warnings = Vec::new();
        let maxima = maxima(&[("Q1", 5.0), ("Q2", 5.0)]);
        let threshold = resolve(&spec(&["Q1", "Q2"], 40.0), &maxima, &mut warnings).unwrap();
        assert_eq!(threshold.max_score, 10.0);
        assert_eq!(threshold.min_score, 4.0);
    }

    #[test]
    fn multi_question_matches_per_question_sum_exactly() {
        let mut warnings = Vec::new();
        let maxima = maxima(&[("Q1", 0.7), ("Q2", 1.3), ("Q3", 2.9)]);
        let threshold =
            resolve(&spec(&["Q1", "Q2", "Q3"], 35.0), &maxima, &mut warnings).unwrap();
        let ratio = 35.0 / 100.0;
        assert_eq!(threshold.max_score, 4.9);
        assert_eq!(threshold.min_score, 1.71);
        assert_ne!(threshold.min_score, round2(4.9 * ratio));
    }

    #[test]
    fn multi_question_does_not_scale_the_summed_maximum() {
        // 0.1 * 0.05 + 0.6 * 0.05 lands just above 0.035, 0.7 * 0.05 just below.
        let mut warnings = Vec::new();
        let maxima = maxima(&[("Q1", 0.1), ("Q2", 0.6)]);
        let threshold = resolve(&spec(&["Q1", "Q2"], 5.0), &maxima, &mut warnings).unwrap();
        let ratio = 5.0 / 100.0;
        assert_eq!(threshold.max_score, 0.7);
        assert_eq!(threshold.min_score, 0.04);
        assert_ne!(threshold.min_score, round2((0.1 + 0.6) * ratio));
    }

    #[test]
    fn empty_outcome_has_no_threshold() {
        let mut warnings = Vec::new();
        assert!(resolve(&spec(&[], 40.0), &QuestionMax::default(), &mut warnings).is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_maximum_counts_as_zero_and_warns() {
        let mut warnings = Vec::new();
        let maxima = maxima(&[("Q1", 4.0)]);
        let threshold = resolve(&spec(&["Q1", "Q2"], 50.0), &maxima, &mut warnings).unwrap();
        assert_eq!(threshold.max_score, 4.0);
        assert_eq!(threshold.min_score, 2.0);
        assert_eq!(
            warnings,
            vec![Warning::MissingQuestionMax {
                outcome: OutcomeLabel::new("CLO1"),
                question: "Q2".to_string(),
            }]
        );
    }

    #[test]
    fn thresholds_are_rounded_to_two_decimals() {
        let mut warnings = Vec::new();
        let threshold =
            resolve(&spec(&["Q1"], 33.0), &maxima(&[("Q1", 1.1)]), &mut warnings).unwrap();
        assert_eq!(threshold.min_score, 0.36);
    }
}
