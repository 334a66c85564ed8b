//! Course learning outcome (CLO) attainment from per-question exam scores.
//!
//! [`engine::analyze`] takes an [`models::AnalysisRequest`] (score table,
//! question maxima, declared outcomes) and returns the attainment table and
//! the A–F band distribution for each outcome.

pub mod attainment;
pub mod bands;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod models;
pub mod report;
pub mod threshold;
