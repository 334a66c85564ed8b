use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub type QuestionId = String;

/// Score sheet for one course offering: one row per student, one column per
/// graded question. Missing cells are `None`, never zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTable {
    course: String,
    student_ids: Vec<String>,
    columns: Vec<ScoreColumn>,
    derived: Vec<DerivedColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreColumn {
    pub question: QuestionId,
    pub cells: Vec<Option<f64>>,
}

/// Column appended by an analysis pass. Names always start with `__` and
/// live apart from the source columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedColumn {
    pub name: String,
    pub values: Vec<f64>,
}

impl ScoreTable {
    pub fn new(
        course: impl Into<String>,
        student_ids: Vec<String>,
        columns: Vec<ScoreColumn>,
    ) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.question.as_str()) {
                return Err(ConfigError::DuplicateColumn(column.question.clone()));
            }
            if column.cells.len() != student_ids.len() {
                return Err(ConfigError::ColumnLength {
                    question: column.question.clone(),
                    expected: student_ids.len(),
                    found: column.cells.len(),
                });
            }
        }

        Ok(Self {
            course: course.into(),
            student_ids,
            columns,
            derived: Vec::new(),
        })
    }

    pub fn course(&self) -> &str {
        &self.course
    }

    pub fn student_ids(&self) -> &[String] {
        &self.student_ids
    }

    pub fn student_count(&self) -> usize {
        self.student_ids.len()
    }

    pub fn columns(&self) -> &[ScoreColumn] {
        &self.columns
    }

    pub fn column(&self, question: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|column| column.question == question)
            .map(|column| column.cells.as_slice())
    }

    pub fn has_column(&self, question: &str) -> bool {
        self.column(question).is_some()
    }

    /// A column can back an outcome only if it holds at least one numeric
    /// value somewhere in the offering.
    pub fn is_eligible(&self, question: &str) -> bool {
        self.column(question)
            .map(|cells| cells.iter().any(Option::is_some))
            .unwrap_or(false)
    }

    pub fn eligible_questions(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|column| column.cells.iter().any(Option::is_some))
            .map(|column| column.question.as_str())
            .collect()
    }

    pub fn derived_columns(&self) -> &[DerivedColumn] {
        &self.derived
    }

    pub fn derived_column(&self, name: &str) -> Option<&[f64]> {
        self.derived
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.values.as_slice())
    }

    /// Appends `__<kind>_<label>` and returns the name actually used. Labels
    /// that sanitize to the same name get a numeric suffix.
    pub fn append_derived(&mut self, kind: &str, label: &OutcomeLabel, values: Vec<f64>) -> String {
        let base = format!("__{}_{}", kind, sanitize(label.as_str()));
        let mut name = base.clone();
        let mut suffix = 2;
        while self.derived_column(&name).is_some() {
            name = format!("{base}_{suffix}");
            suffix += 1;
        }

        self.derived.push(DerivedColumn {
            name: name.clone(),
            values,
        });
        name
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Declared maximum score per question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionMax(BTreeMap<QuestionId, f64>);

impl QuestionMax {
    pub fn insert(&mut self, question: impl Into<QuestionId>, max: f64) {
        self.0.insert(question.into(), max);
    }

    pub fn get(&self, question: &str) -> Option<f64> {
        self.0.get(question).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(question, max)| (question.as_str(), *max))
    }
}

impl FromIterator<(QuestionId, f64)> for QuestionMax {
    fn from_iter<I: IntoIterator<Item = (QuestionId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeLabel(String);

impl OutcomeLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One declared learning outcome. Ratios are percentages in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSpec {
    label: OutcomeLabel,
    description: String,
    questions: Vec<QuestionId>,
    min_ratio: f64,
    expected_pass_rate: f64,
}

impl OutcomeSpec {
    pub fn new(
        label: OutcomeLabel,
        description: impl Into<String>,
        questions: Vec<QuestionId>,
        min_ratio: f64,
        expected_pass_rate: f64,
    ) -> Self {
        let mut seen = HashSet::new();
        let questions = questions
            .into_iter()
            .filter(|question| seen.insert(question.clone()))
            .collect();

        Self {
            label,
            description: description.into(),
            questions,
            min_ratio,
            expected_pass_rate,
        }
    }

    pub fn label(&self) -> &OutcomeLabel {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn questions(&self) -> &[QuestionId] {
        &self.questions
    }

    pub fn min_ratio(&self) -> f64 {
        self.min_ratio
    }

    pub fn expected_pass_rate(&self) -> f64 {
        self.expected_pass_rate
    }

    pub fn is_measurable(&self) -> bool {
        !self.questions.is_empty()
    }
}

/// Everything one analysis pass needs. Re-declaring outcomes means building
/// a new request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub table: ScoreTable,
    pub maxima: QuestionMax,
    pub outcomes: Vec<OutcomeSpec>,
}

/// Resolved threshold, both values rounded to 2 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Threshold {
    pub max_score: f64,
    pub min_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// `None` fields mean "not applicable" (outcome without backing questions).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttainmentResult {
    pub outcome: OutcomeLabel,
    pub description: String,
    pub max_score: Option<f64>,
    pub min_score: Option<f64>,
    pub students_passed: Option<usize>,
    pub pass_rate: Option<f64>,
    pub expected_pass_rate: f64,
    pub verdict: Option<Verdict>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Band {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandDistribution {
    pub outcome: OutcomeLabel,
    pub total_students: usize,
    /// Indexed in `Band::ALL` order.
    pub counts: [usize; 5],
    pub percentages: [f64; 5],
}

impl BandDistribution {
    pub fn count(&self, band: Band) -> usize {
        self.counts[band.index()]
    }

    pub fn percentage(&self, band: Band) -> f64 {
        self.percentages[band.index()]
    }

    /// Students in bands A through D.
    pub fn attained(&self) -> usize {
        Band::ALL
            .iter()
            .filter(|band| band.is_attained())
            .map(|band| self.count(*band))
            .sum()
    }
}

/// Non-fatal data-quality findings. The pass still produces full tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    MissingQuestionMax {
        outcome: OutcomeLabel,
        question: QuestionId,
    },
    UnmeasurableOutcome {
        outcome: OutcomeLabel,
    },
    EmptyOffering {
        course: String,
    },
    ScoreAboveMaximum {
        outcome: OutcomeLabel,
        students: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingQuestionMax { outcome, question } => write!(
                f,
                "{outcome}: question {question} has no declared maximum, counted as 0"
            ),
            Warning::UnmeasurableOutcome { outcome } => {
                write!(f, "{outcome}: no backing questions, reported as not applicable")
            }
            Warning::EmptyOffering { course } => {
                write!(f, "course offering {course} has no students, all rates are 0")
            }
            Warning::ScoreAboveMaximum { outcome, students } => write!(
                f,
                "{outcome}: {students} student(s) scored above the declared maximum"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub attainment: Vec<AttainmentResult>,
    pub bands: Vec<BandDistribution>,
    pub warnings: Vec<Warning>,
    pub working_table: ScoreTable,
}

/// Rounds to 2 decimals the way Python's `round(x, 2)` does: by the exact
/// binary value, with exact halves going to the even neighbour. `value * 100`
/// alone is not exact, so the midpoint is compared through `mul_add`.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    if value < 0.0 {
        return -round2(-value);
    }

    let lower = (value * 100.0).floor();
    let midpoint = 2.0 * lower + 1.0;
    let doubled = value * 200.0;
    let residual = value.mul_add(200.0, -doubled);
    let distance = match doubled - midpoint {
        d if d != 0.0 => d,
        _ => residual,
    };

    let hundredths = if distance > 0.0 {
        lower + 1.0
    } else if distance < 0.0 {
        lower
    } else if lower % 2.0 == 0.0 {
        lower
    } else {
        lower + 1.0
    };
    hundredths / 100.0
}

/// `count / total * 100` rounded to 2 decimals; 0 for an empty offering.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(count as f64 / total as f64 * 100.0)
}
