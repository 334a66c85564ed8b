use crate::attainment::aggregate_scores;
use crate::models::{
    percentage, Band, BandDistribution, OutcomeSpec, QuestionMax, ScoreTable, Warning,
};
use crate::threshold;

impl Band {
    pub const ALL: [Band; 5] = [Band::A, Band::B, Band::C, Band::D, Band::F];

    /// First match wins, so each lower bound belongs to its own band and
    /// anything above 10 still lands in A.
    pub fn classify(score: f64) -> Band {
        if score >= 8.5 {
            Band::A
        } else if score >= 7.0 {
            Band::B
        } else if score >= 5.5 {
            Band::C
        } else if score >= 4.0 {
            Band::D
        } else {
            Band::F
        }
    }

    /// A through D count as attained. Informational only.
    pub fn is_attained(self) -> bool {
        self != Band::F
    }

    pub fn index(self) -> usize {
        match self {
            Band::A => 0,
            Band::B => 1,
            Band::C => 2,
            Band::D => 3,
            Band::F => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Band::A => "A",
            Band::B => "B",
            Band::C => "C",
            Band::D => "D",
            Band::F => "F",
        }
    }
}

/// Scales aggregate scores onto 0..10. A zero maximum yields all zeros.
pub fn normalized_scores(sums: &[f64], max_score: f64) -> Vec<f64> {
    if max_score > 0.0 {
        sums.iter().map(|sum| sum / max_score * 10.0).collect()
    } else {
        vec![0.0; sums.len()]
    }
}

/// Tallies one outcome into bands and appends its `__norm_` column.
pub fn classify(
    table: &mut ScoreTable,
    spec: &OutcomeSpec,
    maxima: &QuestionMax,
    warnings: &mut Vec<Warning>,
) -> BandDistribution {
    let total = table.student_count();
    let mut counts = [0usize; 5];

    if spec.is_measurable() {
        let sums = aggregate_scores(table, spec.questions());
        let normalized = normalized_scores(&sums, threshold::max_score(spec, maxima));

        for score in &normalized {
            counts[Band::classify(*score).index()] += 1;
        }

        let above = normalized.iter().filter(|score| **score > 10.0).count();
        if above > 0 {
            warnings.push(Warning::ScoreAboveMaximum {
                outcome: spec.label().clone(),
                students: above,
            });
        }

        table.append_derived("norm", spec.label(), normalized);
    }

    BandDistribution {
        outcome: spec.label().clone(),
        total_students: total,
        counts,
        percentages: counts.map(|count| percentage(count, total)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutcomeLabel, ScoreColumn};

    fn spec(questions: &[&str]) -> OutcomeSpec {
        OutcomeSpec::new(
            OutcomeLabel::new("CLO2"),
            "",
            questions.iter().map(|q| q.to_string()).collect(),
            50.0,
            70.0,
        )
    }

    fn single_column_table(cells: Vec<Option<f64>>) -> ScoreTable {
        let ids = (1..=cells.len()).map(|i| format!("s{i}")).collect();
        ScoreTable::new(
            "Databases",
            ids,
            vec![ScoreColumn {
                question: "Q1".to_string(),
                cells,
            }],
        )
        .unwrap()
    }

    fn maxima(max: f64) -> QuestionMax {
        [("Q1".to_string(), max)].into_iter().collect()
    }

    #[test]
    fn boundaries_fall_into_the_higher_band() {
        assert_eq!(Band::classify(10.0), Band::A);
        assert_eq!(Band::classify(8.5), Band::A);
        assert_eq!(Band::classify(8.49), Band::B);
        assert_eq!(Band::classify(7.0), Band::B);
        assert_eq!(Band::classify(6.99), Band::C);
        assert_eq!(Band::classify(5.5), Band::C);
        assert_eq!(Band::classify(5.49), Band::D);
        assert_eq!(Band::classify(4.0), Band::D);
        assert_eq!(Band::classify(3.99), Band::F);
        assert_eq!(Band::classify(0.0), Band::F);
        assert_eq!(Band::classify(-1.0), Band::F);
    }

    #[test]
    fn classification_is_total_over_a_sweep() {
        for step in -20..=120 {
            let score = step as f64 / 10.0;
            let matches = Band::ALL
                .iter()
                .filter(|band| **band == Band::classify(score))
                .count();
            assert_eq!(matches, 1, "score {score}");
        }
    }

    #[test]
    fn only_f_is_not_attained() {
        assert!(Band::A.is_attained());
        assert!(Band::D.is_attained());
        assert!(!Band::F.is_attained());
    }

    #[test]
    fn zero_maximum_normalizes_to_zero() {
        assert_eq!(normalized_scores(&[3.0, 5.0], 0.0), vec![0.0, 0.0]);
        assert_eq!(normalized_scores(&[4.0], 10.0), vec![4.0]);
    }

    #[test]
    fn tallies_counts_and_percentages() {
        let mut table =
            single_column_table(vec![Some(9.0), Some(7.5), Some(6.0), Some(4.0), None]);
        let mut warnings = Vec::new();
        let distribution = classify(&mut table, &spec(&["Q1"]), &maxima(10.0), &mut warnings);

        assert_eq!(distribution.total_students, 5);
        assert_eq!(distribution.counts, [1, 1, 1, 1, 1]);
        assert_eq!(distribution.percentage(Band::F), 20.0);
        let total: f64 = distribution.percentages.iter().sum();
        assert!((total - 100.0).abs() <= 0.01);
        assert!(warnings.is_empty());
        assert_eq!(
            table.derived_column("__norm_CLO2"),
            Some(&[9.0, 7.5, 6.0, 4.0, 0.0][..])
        );
    }

    #[test]
    fn percentages_sum_within_rounding_for_thirds() {
        let mut table = single_column_table(vec![Some(9.0), Some(5.0), Some(1.0)]);
        let mut warnings = Vec::new();
        let distribution = classify(&mut table, &spec(&["Q1"]), &maxima(10.0), &mut warnings);
        let total: f64 = distribution.percentages.iter().sum();
        assert!((total - 100.0).abs() <= 0.011, "total {total}");
    }

    #[test]
    fn unmeasurable_outcome_reports_zero_bands() {
        let mut table = single_column_table(vec![Some(9.0), Some(2.0)]);
        let mut warnings = Vec::new();
        let distribution = classify(&mut table, &spec(&[]), &maxima(10.0), &mut warnings);
        assert_eq!(distribution.total_students, 2);
        assert_eq!(distribution.counts, [0; 5]);
        assert_eq!(distribution.percentages, [0.0; 5]);
        assert!(table.derived_columns().is_empty());
    }

    #[test]
    fn empty_offering_reports_zero_percentages() {
        let mut table = single_column_table(vec![]);
        let mut warnings = Vec::new();
        let distribution = classify(&mut table, &spec(&["Q1"]), &maxima(10.0), &mut warnings);
        assert_eq!(distribution.total_students, 0);
        assert_eq!(distribution.percentages, [0.0; 5]);
    }

    #[test]
    fn scores_above_maximum_land_in_a_and_warn() {
        let mut table = single_column_table(vec![Some(6.0), Some(2.0)]);
        let mut warnings = Vec::new();
        let distribution = classify(&mut table, &spec(&["Q1"]), &maxima(5.0), &mut warnings);
        assert_eq!(distribution.count(Band::A), 1);
        assert_eq!(distribution.count(Band::F), 1);
        assert_eq!(
            warnings,
            vec![Warning::ScoreAboveMaximum {
                outcome: OutcomeLabel::new("CLO2"),
                students: 1,
            }]
        );
    }
}
