use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Unknown project status: {0}")]
    UnknownStatus(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::new_v4();
        let error = CoreError::ProjectNotFound(id);
        assert!(error.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_validation_message() {
        let error = CoreError::validation("topic is too short");
        assert_eq!(error.to_string(), "Validation error: topic is too short");
    }
}
