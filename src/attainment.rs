use crate::models::{
    percentage, AttainmentResult, OutcomeSpec, QuestionId, ScoreTable, Threshold, Verdict,
};

/// Per-student sum over the backing questions. Missing cells contribute 0.
pub fn aggregate_scores(table: &ScoreTable, questions: &[QuestionId]) -> Vec<f64> {
    let mut sums = vec![0.0; table.student_count()];
    for question in questions {
        let Some(cells) = table.column(question) else {
            continue;
        };
        for (sum, cell) in sums.iter_mut().zip(cells) {
            *sum += cell.unwrap_or(0.0);
        }
    }
    sums
}

/// Evaluates one outcome and appends its `__sum_` column to the working table.
pub fn evaluate(
    table: &mut ScoreTable,
    spec: &OutcomeSpec,
    threshold: Option<Threshold>,
) -> AttainmentResult {
    let Some(threshold) = threshold else {
        return not_applicable(spec);
    };

    let sums = aggregate_scores(table, spec.questions());
    let passed = sums
        .iter()
        .filter(|sum| **sum >= threshold.min_score)
        .count();
    let pass_rate = percentage(passed, table.student_count());
    table.append_derived("sum", spec.label(), sums);

    AttainmentResult {
        outcome: spec.label().clone(),
        description: spec.description().to_string(),
        max_score: Some(threshold.max_score),
        min_score: Some(threshold.min_score),
        students_passed: Some(passed),
        pass_rate: Some(pass_rate),
        expected_pass_rate: spec.expected_pass_rate(),
        verdict: Some(verdict(pass_rate, spec.expected_pass_rate())),
    }
}

pub fn verdict(pass_rate: f64, expected_pass_rate: f64) -> Verdict {
    if pass_rate >= expected_pass_rate {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

fn not_applicable(spec: &OutcomeSpec) -> AttainmentResult {
    AttainmentResult {
        outcome: spec.label().clone(),
        description: spec.description().to_string(),
        max_score: None,
        min_score: None,
        students_passed: None,
        pass_rate: None,
        expected_pass_rate: spec.expected_pass_rate(),
        verdict: None,
    }
}
