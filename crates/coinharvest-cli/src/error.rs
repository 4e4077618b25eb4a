use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] coinharvest_core::ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Source(#[from] coinharvest_core::SourceError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Warehouse(#[from] coinharvest_core::WarehouseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<coinharvest_core::CoreError> for CliError {
    fn from(error: coinharvest_core::CoreError) -> Self {
        use coinharvest_core::CoreError;

        match error {
            CoreError::Validation(error) => Self::Validation(error),
            CoreError::Source(error) => Self::Source(error),
            CoreError::Serialization(error) => Self::Serialization(error),
            CoreError::Io(error) => Self::Io(error),
            CoreError::Warehouse(error) => Self::Warehouse(error),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::Source(_) => 3,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) => 7,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinharvest_core::{SourceError, ValidationError, WarehouseError};

    #[test]
    fn exit_codes_separate_input_source_and_storage_failures() {
        assert_eq!(CliError::from(ValidationError::InvalidBatchSize).exit_code(), 2);
        assert_eq!(CliError::from(SourceError::unavailable("down")).exit_code(), 3);
        assert_eq!(
            CliError::from(WarehouseError::Io(std::io::Error::other("disk full"))).exit_code(),
            7
        );
    }

    #[test]
    fn core_errors_keep_their_category() {
        let error = CliError::from(coinharvest_core::CoreError::from(
            ValidationError::InvalidTopN,
        ));

        assert!(matches!(error, CliError::Validation(ValidationError::InvalidTopN)));
    }
}
