use thiserror::Error;

/// Errors from the formula editing services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("invalid anchor cell: {0}")]
    InvalidAnchor(String),
    #[error("range fixing is not supported for R1C1 formulas")]
    R1C1Unsupported,
}
