use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::models::{AnalysisRequest, AnalysisResult, OutcomeSpec, Warning};
use crate::{attainment, bands, threshold};

/// Runs one full analysis pass. Configuration errors abort before any table
/// is built; data-quality issues come back as warnings.
pub fn analyze(request: &AnalysisRequest) -> Result<AnalysisResult, ConfigError> {
    validate(request)?;

    let mut working = request.table.clone();
    let mut warnings = Vec::new();
    let mut attainment_rows = Vec::with_capacity(request.outcomes.len());
    let mut band_rows = Vec::with_capacity(request.outcomes.len());

    if working.student_count() == 0 {
        warnings.push(Warning::EmptyOffering {
            course: working.course().to_string(),
        });
    }

    for spec in &request.outcomes {
        if !spec.is_measurable() {
            warnings.push(Warning::UnmeasurableOutcome {
                outcome: spec.label().clone(),
            });
        }

        let resolved = threshold::resolve(spec, &request.maxima, &mut warnings);
        attainment_rows.push(attainment::evaluate(&mut working, spec, resolved));
        band_rows.push(bands::classify(&mut working, spec, &request.maxima, &mut warnings));
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    info!(
        course = working.course(),
        students = working.student_count(),
        outcomes = request.outcomes.len(),
        warnings = warnings.len(),
        "analysis complete"
    );

    Ok(AnalysisResult {
        attainment: attainment_rows,
        bands: band_rows,
        warnings,
        working_table: working,
    })
}

pub fn validate(request: &AnalysisRequest) -> Result<(), ConfigError> {
    for (question, max) in request.maxima.iter() {
        if !(max.is_finite() && max > 0.0 && max <= 10.0) {
            return Err(ConfigError::MaxOutOfRange {
                question: question.to_string(),
                value: max,
            });
        }
    }

    let mut labels = HashSet::new();
    for (position, spec) in request.outcomes.iter().enumerate() {
        if spec.label().as_str().trim().is_empty() {
            return Err(ConfigError::EmptyLabel {
                position: position + 1,
            });
        }
        if !labels.insert(spec.label()) {
            return Err(ConfigError::DuplicateLabel(spec.label().to_string()));
        }
        check_ratio(spec, "min_ratio", spec.min_ratio())?;
        check_ratio(spec, "expected_pass_rate", spec.expected_pass_rate())?;
        check_questions(request, spec)?;
    }

    Ok(())
}

fn check_ratio(spec: &OutcomeSpec, field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::RatioOutOfRange {
        outcome: spec.label().to_string(),
        field,
        value,
    })
}

// An offering without students has no numeric cells at all; there only the
// column's presence is checked.
fn check_questions(request: &AnalysisRequest, spec: &OutcomeSpec) -> Result<(), ConfigError> {
    let table = &request.table;
    for question in spec.questions() {
        if !table.has_column(question) {
            return Err(ConfigError::UnknownQuestion {
                outcome: spec.label().to_string(),
                question: question.clone(),
            });
        }
        if table.student_count() > 0 && !table.is_eligible(question) {
            return Err(ConfigError::EmptyQuestion {
                outcome: spec.label().to_string(),
                question: question.clone(),
            });
        }
    }
    Ok(())
}
