use thiserror::Error;

/// Fatal problems with a declaration or score table. An analysis pass that
/// hits one of these produces no tables at all.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("outcome #{position} has an empty label")]
    EmptyLabel { position: usize },

    #[error("outcome label {0} is declared more than once")]
    DuplicateLabel(String),

    #[error("question {question}: declared maximum {value} is outside (0, 10]")]
    MaxOutOfRange { question: String, value: f64 },

    #[error("outcome {outcome}: {field} {value} is outside [0, 100]")]
    RatioOutOfRange {
        outcome: String,
        field: &'static str,
        value: f64,
    },

    #[error("outcome {outcome}: question {question} is not a column of the score table")]
    UnknownQuestion { outcome: String, question: String },

    #[error("outcome {outcome}: question {question} has no numeric scores in this offering")]
    EmptyQuestion { outcome: String, question: String },

    #[error("score table has column {0} more than once")]
    DuplicateColumn(String),

    #[error("column {question} has {found} cells, expected {expected}")]
    ColumnLength {
        question: String,
        expected: usize,
        found: usize,
    },
}
