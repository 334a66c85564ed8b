use std::fmt::Write;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AnalysisRequest, AnalysisResult, AttainmentResult, Band, BandDistribution};

const NOT_APPLICABLE: &str = "N/A";

/// Free-text sections appended to the markdown report.
#[derive(Debug, Clone, Default)]
pub struct ReportNotes {
    pub comments: Option<String>,
    pub recommendations: Option<String>,
}

fn score(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}"))
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

fn count(value: Option<usize>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

fn verdict(row: &AttainmentResult) -> String {
    row.verdict
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

/// Escapes pipes so free text cannot split a markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Plain-text summary printed by `analyze`.
pub fn render_summary(result: &AnalysisResult) -> String {
    let mut output = String::new();
    let table = &result.working_table;

    let _ = writeln!(
        output,
        "Attainment for {} ({} students):",
        table.course(),
        table.student_count()
    );
    for row in &result.attainment {
        let _ = writeln!(
            output,
            "- {}: max {}, min {}, {} passed, pass rate {}% (expected {:.2}%) {}",
            row.outcome,
            score(row.max_score),
            score(row.min_score),
            count(row.students_passed),
            score(row.pass_rate),
            row.expected_pass_rate,
            verdict(row)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Band distribution:");
    for row in &result.bands {
        let bands: Vec<String> = Band::ALL
            .iter()
            .map(|band| {
                format!(
                    "{} {} ({:.2}%)",
                    band.as_str(),
                    row.count(*band),
                    row.percentage(*band)
                )
            })
            .collect();
        let _ = writeln!(
            output,
            "- {}: {} (attained {}/{})",
            row.outcome,
            bands.join(", "),
            row.attained(),
            row.total_students
        );
    }

    output
}

pub fn build_report(
    request: &AnalysisRequest,
    result: &AnalysisResult,
    generated_on: NaiveDate,
    notes: &ReportNotes,
) -> String {
    let mut output = String::new();
    let table = &request.table;

    let _ = writeln!(output, "# CLO Attainment Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        table.course(),
        generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## General Information");
    let _ = writeln!(output, "- Course offering: {}", table.course());
    let _ = writeln!(output, "- Students: {}", table.student_count());
    let _ = writeln!(output);
    let _ = writeln!(output, "### Declared Outcomes");

    if request.outcomes.is_empty() {
        let _ = writeln!(output, "No outcomes declared.");
    } else {
        let _ = writeln!(
            output,
            "| Outcome | Description | Questions | Min ratio (%) | Expected pass rate (%) |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|");
        for spec in &request.outcomes {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.2} | {:.2} |",
                cell(spec.label().as_str()),
                cell(spec.description()),
                cell(&spec.questions().join(", ")),
                spec.min_ratio(),
                spec.expected_pass_rate()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outcome Attainment");

    if result.attainment.is_empty() {
        let _ = writeln!(output, "No outcomes to analyse.");
    } else {
        let _ = writeln!(
            output,
            "| # | Outcome | Max score | Min passing score | Students passed | Pass rate (%) | Result |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for (position, row) in result.attainment.iter().enumerate() {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} |",
                position + 1,
                cell(row.outcome.as_str()),
                score(row.max_score),
                score(row.min_score),
                count(row.students_passed),
                score(row.pass_rate),
                verdict(row)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Band Distribution");

    if result.bands.is_empty() {
        let _ = writeln!(output, "No outcomes to classify.");
    } else {
        let _ = writeln!(
            output,
            "| Outcome | Students | A | B | C | D | F | A (%) | B (%) | C (%) | D (%) | F (%) |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|---|---|---|");
        for row in &result.bands {
            let counts: Vec<String> = row.counts.iter().map(|c| c.to_string()).collect();
            let percentages: Vec<String> =
                row.percentages.iter().map(|p| format!("{p:.2}")).collect();
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                cell(row.outcome.as_str()),
                row.total_students,
                counts.join(" | "),
                percentages.join(" | ")
            );
        }
    }

    if !result.warnings.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Data Quality Warnings");
        for warning in &result.warnings {
            let _ = writeln!(output, "- {warning}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Comments and Recommendations");
    let _ = writeln!(
        output,
        "- Comments: {}",
        notes.comments.as_deref().unwrap_or("none")
    );
    let _ = writeln!(
        output,
        "- Recommendations: {}",
        notes.recommendations.as_deref().unwrap_or("none")
    );

    output
}

#[derive(Serialize)]
struct AttainmentRecord<'a> {
    outcome: &'a str,
    description: &'a str,
    max_score: String,
    min_score: String,
    students_passed: String,
    pass_rate: String,
    expected_pass_rate: String,
    verdict: String,
}

#[derive(Serialize)]
struct BandRecord<'a> {
    outcome: &'a str,
    total_students: usize,
    a_count: usize,
    b_count: usize,
    c_count: usize,
    d_count: usize,
    f_count: usize,
    a_pct: String,
    b_pct: String,
    c_pct: String,
    d_pct: String,
    f_pct: String,
}

pub fn write_attainment_csv<W: std::io::Write>(
    writer: W,
    rows: &[AttainmentResult],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(AttainmentRecord {
            outcome: row.outcome.as_str(),
            description: &row.description,
            max_score: score(row.max_score),
            min_score: score(row.min_score),
            students_passed: count(row.students_passed),
            pass_rate: score(row.pass_rate),
            expected_pass_rate: format!("{:.2}", row.expected_pass_rate),
            verdict: verdict(row),
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_bands_csv<W: std::io::Write>(
    writer: W,
    rows: &[BandDistribution],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let pct = |row: &BandDistribution, band: Band| format!("{:.2}", row.percentage(band));
    for row in rows {
        writer.serialize(BandRecord {
            outcome: row.outcome.as_str(),
            total_students: row.total_students,
            a_count: row.count(Band::A),
            b_count: row.count(Band::B),
            c_count: row.count(Band::C),
            d_count: row.count(Band::D),
            f_count: row.count(Band::F),
            a_pct: pct(row, Band::A),
            b_pct: pct(row, Band::B),
            c_pct: pct(row, Band::C),
            d_pct: pct(row, Band::D),
            f_pct: pct(row, Band::F),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes `attainment.csv` and `bands.csv` into `dir`.
pub fn export_csv(dir: &Path, result: &AnalysisResult) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let path = dir.join("attainment.csv");
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_attainment_csv(file, &result.attainment)?;

    let path = dir.join("bands.csv");
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_bands_csv(file, &result.bands)?;

    Ok(())
}
