use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::models::{
    AnalysisRequest, OutcomeLabel, OutcomeSpec, QuestionMax, ScoreColumn, ScoreTable,
};

pub const DEFAULT_MIN_RATIO: f64 = 40.0;
pub const DEFAULT_EXPECTED_PASS_RATE: f64 = 75.0;
pub const DEFAULT_QUESTION_MAX: f64 = 1.0;

/// Which columns of the uploaded sheet are identity columns rather than
/// graded questions.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub course_column: String,
    pub id_column: String,
    pub ignore_columns: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            course_column: "course".to_string(),
            id_column: "student_id".to_string(),
            ignore_columns: vec![
                "name".to_string(),
                "class".to_string(),
                "total".to_string(),
                "exam_code".to_string(),
            ],
        }
    }
}

impl IngestConfig {
    fn is_identity(&self, header: &str) -> bool {
        header == self.course_column
            || header == self.id_column
            || self.ignore_columns.iter().any(|column| column == header)
    }
}

/// Raw uploaded sheet covering every course offering.
#[derive(Debug, Clone)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

pub fn read_sheet(path: &Path) -> anyhow::Result<Sheet> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open score sheet {}", path.display()))?;
    parse_sheet(reader).with_context(|| format!("failed to read score sheet {}", path.display()))
}

pub fn parse_sheet<R: std::io::Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Sheet> {
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Sheet { headers, rows })
}

impl Sheet {
    pub fn from_csv_str(data: &str) -> anyhow::Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());
        parse_sheet(reader)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    fn course_index(&self, config: &IngestConfig) -> anyhow::Result<usize> {
        self.column_index(&config.course_column).with_context(|| {
            format!(
                "score sheet has no course column named '{}'",
                config.course_column
            )
        })
    }

    /// Distinct course offerings in first-seen order.
    pub fn courses(&self, config: &IngestConfig) -> anyhow::Result<Vec<String>> {
        let index = self.course_index(config)?;
        let mut courses: Vec<String> = Vec::new();

        for row in &self.rows {
            let course = row[index].as_str();
            if !course.is_empty() && !courses.iter().any(|known| known == course) {
                courses.push(course.to_string());
            }
        }

        Ok(courses)
    }

    /// Scopes the sheet to one offering. Every non-identity column becomes a
    /// question column; students without an id get their row number.
    pub fn offering(&self, course: &str, config: &IngestConfig) -> anyhow::Result<ScoreTable> {
        let course_index = self.course_index(config)?;
        let id_index = self.column_index(&config.id_column);
        let rows: Vec<&Vec<String>> = self
            .rows
            .iter()
            .filter(|row| row[course_index] == course)
            .collect();

        if rows.is_empty() {
            bail!("course offering '{course}' does not appear in the score sheet");
        }

        let student_ids = rows
            .iter()
            .enumerate()
            .map(|(position, row)| match id_index {
                Some(index) if !row[index].is_empty() => row[index].clone(),
                _ => format!("row-{}", position + 1),
            })
            .collect();

        let columns = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !config.is_identity(header))
            .map(|(index, header)| ScoreColumn {
                question: header.clone(),
                cells: rows.iter().map(|row| parse_score(&row[index])).collect(),
            })
            .collect();

        Ok(ScoreTable::new(course, student_ids, columns)?)
    }
}

/// Empty, non-numeric and non-finite cells are treated as not submitted.
pub fn parse_score(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[derive(Debug, Deserialize)]
struct DeclarationFile {
    #[serde(default)]
    maxima: BTreeMap<String, f64>,
    #[serde(default)]
    outcomes: Vec<OutcomeEntry>,
}

#[derive(Debug, Deserialize)]
struct OutcomeEntry {
    label: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    questions: Vec<String>,
    #[serde(default = "default_min_ratio")]
    min_ratio: f64,
    #[serde(default = "default_expected_pass_rate")]
    expected_pass_rate: f64,
}

fn default_min_ratio() -> f64 {
    DEFAULT_MIN_RATIO
}

fn default_expected_pass_rate() -> f64 {
    DEFAULT_EXPECTED_PASS_RATE
}

/// Question maxima plus the ordered outcome declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub maxima: QuestionMax,
    pub outcomes: Vec<OutcomeSpec>,
}

impl Declaration {
    pub fn into_request(self, table: ScoreTable) -> AnalysisRequest {
        AnalysisRequest {
            table,
            maxima: self.maxima,
            outcomes: self.outcomes,
        }
    }
}

pub fn load_declaration(path: &Path) -> anyhow::Result<Declaration> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read declaration {}", path.display()))?;
    parse_declaration(&content)
        .with_context(|| format!("failed to parse declaration {}", path.display()))
}

pub fn parse_declaration(content: &str) -> anyhow::Result<Declaration> {
    let file: DeclarationFile = toml::from_str(content)?;
    let outcomes = file
        .outcomes
        .into_iter()
        .map(|entry| {
            OutcomeSpec::new(
                OutcomeLabel::new(entry.label.trim()),
                entry.description,
                entry.questions,
                entry.min_ratio,
                entry.expected_pass_rate,
            )
        })
        .collect();

    Ok(Declaration {
        maxima: file.maxima.into_iter().collect(),
        outcomes,
    })
}
