use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PqrstError>;

/// Hard failures of a processing run. Any of these aborts the run before an
/// artifact pair is produced.
#[derive(Debug, Error)]
pub enum PqrstError {
    #[error("missing input artifact(s): {}", display_paths(.0))]
    MissingInput(Vec<PathBuf>),
    #[error("malformed record: {0}")]
    RecordFormat(String),
    #[error("invalid filter parameters: {0}")]
    InvalidFilterParameters(String),
    #[error("artifact serialization failed: {0}")]
    Serialization(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl PqrstError {
    /// Short machine-readable category reported by the processing boundary.
    pub fn category(&self) -> &'static str {
        match self {
            PqrstError::MissingInput(_) => "missing_input",
            PqrstError::RecordFormat(_) => "record_format",
            PqrstError::InvalidFilterParameters(_) => "invalid_filter_parameters",
            PqrstError::Serialization(_) => "serialization",
            PqrstError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<serde_json::Error> for PqrstError {
    fn from(err: serde_json::Error) -> Self {
        PqrstError::Serialization(err.to_string())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_lists_every_path() {
        let err = PqrstError::MissingInput(vec!["a/100.dat".into(), "a/100.atr".into()]);
        let msg = err.to_string();
        assert!(msg.contains("a/100.dat"));
        assert!(msg.contains("a/100.atr"));
        assert_eq!(err.category(), "missing_input");
    }

    #[test]
    fn request_errors_have_their_own_category() {
        let err = PqrstError::InvalidRequest("record id \"../x\"".into());
        assert_eq!(err.category(), "invalid_request");
        assert!(err.to_string().starts_with("invalid request"));
    }
}
