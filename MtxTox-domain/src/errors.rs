use thiserror::Error;

use mtx_tox_data::RepositoryError;

/// Diagnosis engine errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DiagnosisError {
    /// Unknown patient, unknown diagnosis, or no positive flag to show evidence for
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed diagnosis definition or diagnosis graph. Evaluation must not start.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Parameter outside its accepted range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any other repository failure
    #[error("Repository error: {0}")]
    Repository(String),
}

/// Map repository errors to domain errors
pub fn map_repo_error(err: RepositoryError) -> DiagnosisError {
    match err {
        RepositoryError::NotFound(patient_id) => {
            DiagnosisError::NotFound(format!("patient {}", patient_id))
        }
        RepositoryError::Validation(msg) => DiagnosisError::InvalidParameter(msg),
        _ => DiagnosisError::Repository(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err = map_repo_error(RepositoryError::NotFound("1001".to_string()));
        assert_eq!(err, DiagnosisError::NotFound("patient 1001".to_string()));
    }

    #[test]
    fn test_repository_validation_maps_to_invalid_parameter() {
        let err = map_repo_error(RepositoryError::Validation("bad unit".to_string()));
        assert!(matches!(err, DiagnosisError::InvalidParameter(_)));
    }
}
