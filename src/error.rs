//! Errors raised by resource handlers

use thiserror::Error;

use crate::api::ApiError;
use crate::schema::SchemaError;

/// Errors surfaced by resource lifecycle operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<SchemaError>),

    #[error("unknown resource type '{0}'")]
    UnknownResource(String),

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("changing {} requires replacing the resource", .0.join(", "))]
    RequiresReplacement(Vec<String>),
}

impl ProviderError {
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        ProviderError::Api {
            context: context.into(),
            source,
        }
    }

    /// The underlying API error, if any
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ProviderError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<Vec<SchemaError>> for ProviderError {
    fn from(errors: Vec<SchemaError>) -> Self {
        ProviderError::InvalidConfig(errors)
    }
}

fn join_errors(errors: &[SchemaError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Attach handler context to API errors
pub trait ApiResultExt<T> {
    fn context_with(self, context: impl FnOnce() -> String) -> Result<T, ProviderError>;
}

impl<T> ApiResultExt<T> for Result<T, ApiError> {
    fn context_with(self, context: impl FnOnce() -> String) -> Result<T, ProviderError> {
        self.map_err(|source| ProviderError::api(context(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_every_error() {
        let err = ProviderError::from(vec![
            SchemaError::MissingRequired("step_name".to_string()),
            SchemaError::UnknownAttribute("colour".to_string()),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid configuration: step_name: required attribute is missing; colour: unknown attribute"
        );
    }

    #[test]
    fn test_api_context() {
        let result: Result<(), ApiError> = Err(ApiError::not_found("projects/Projects-9"));
        let err = result
            .context_with(|| "error loading project 'Projects-9'".to_string())
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "error loading project 'Projects-9': item not found: projects/Projects-9"
        );
        assert!(err.api_error().is_some_and(ApiError::is_not_found));
    }

    #[test]
    fn test_requires_replacement() {
        let err = ProviderError::RequiresReplacement(vec!["project_id".to_string()]);
        assert_eq!(err.to_string(), "changing project_id requires replacing the resource");
    }
}
