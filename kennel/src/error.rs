//! Kennel errors.
use apollo_compiler::response::GraphQLError;
use apollo_compiler::validation::DiagnosticList;
use apollo_compiler::validation::WithErrors;
use displaydoc::Display;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub use crate::configuration::ConfigurationError;
pub use crate::graphql::Error;
use crate::graphql::ErrorExtension;
use crate::graphql::IntoGraphQLErrors;
use crate::graphql::Location as ErrorLocation;
use crate::json_ext::Path;
use crate::json_ext::Value;
pub use crate::spec::SpecError;

/// Errors raised while resolving an operation against the store.
///
/// Request-level errors abort the operation before any resolver runs. The same
/// variants are reported as field errors, with a path, when they happen below the
/// root of the selection.
#[derive(Error, Display, Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
#[ignore_extra_doc_attributes]
#[non_exhaustive]
pub enum ExecutionError {
    /// cannot query field '{field}' on type '{type_name}'
    UnknownField {
        /// The parent type.
        #[serde(rename = "type")]
        type_name: String,
        /// The requested field.
        field: String,
    },

    /// missing required argument '{argument}' on field '{field}'
    MissingArgument {
        /// The field declaring the argument.
        field: String,
        /// The argument name.
        argument: String,
    },

    /// argument '{argument}' on field '{field}' must be of type '{expected}'
    TypeMismatch {
        /// The field declaring the argument.
        field: String,
        /// The argument name.
        argument: String,
        /// The declared type of the argument.
        expected: String,
    },

    /// invalid selection on field '{field}' of type '{type_name}': {reason}
    InvalidSelection {
        /// The parent type.
        #[serde(rename = "type")]
        type_name: String,
        /// The selected field.
        field: String,
        /// Why the selection cannot be resolved.
        reason: String,
    },
}

impl ExecutionError {
    /// Convert the error to an appropriate GraphQL error.
    pub fn to_graphql_error(&self, path: Option<Path>) -> Error {
        let mut value: Value = serde_json_bytes::to_value(self).unwrap_or_default();
        if let Some(extensions) = value.as_object_mut() {
            extensions
                .entry("code")
                .or_insert_with(|| self.extension_code().into());
        }

        Error::builder()
            .message(self.to_string())
            .and_path(path)
            .extensions(value.as_object().cloned().unwrap_or_default())
            .build()
    }
}

impl ErrorExtension for ExecutionError {
    fn extension_code(&self) -> String {
        match self {
            ExecutionError::UnknownField { .. } => "UNKNOWN_FIELD",
            ExecutionError::MissingArgument { .. } => "MISSING_ARGUMENT",
            ExecutionError::TypeMismatch { .. } => "TYPE_MISMATCH",
            ExecutionError::InvalidSelection { .. } => "INVALID_SELECTION",
        }
        .to_string()
    }
}

impl IntoGraphQLErrors for ExecutionError {
    fn into_graphql_errors(self) -> Result<Vec<Error>, Self> {
        Ok(vec![self.to_graphql_error(None)])
    }
}

/// Collection of document validation errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub(crate) errors: Vec<GraphQLError>,
}

impl ValidationErrors {
    pub(crate) fn into_graphql_errors_with_code(self, code: &'static str) -> Vec<Error> {
        self.errors
            .iter()
            .map(|diagnostic| {
                Error::builder()
                    .message(diagnostic.message.to_string())
                    .locations(
                        diagnostic
                            .locations
                            .iter()
                            .map(|location| ErrorLocation {
                                line: location.line as u32,
                                column: location.column as u32,
                            })
                            .collect(),
                    )
                    .extension_code(code)
                    .build()
            })
            .collect()
    }
}

impl From<DiagnosticList> for ValidationErrors {
    fn from(errors: DiagnosticList) -> Self {
        Self {
            errors: errors.iter().map(|error| error.to_json()).collect(),
        }
    }
}

impl<T> From<WithErrors<T>> for ValidationErrors {
    fn from(WithErrors { errors, .. }: WithErrors<T>) -> Self {
        errors.into()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            if let Some(location) = error.locations.first() {
                write!(
                    f,
                    "[{}:{}] {}",
                    location.line, location.column, error.message
                )?;
            } else {
                write!(f, "{}", error.message)?;
            }
        }
        Ok(())
    }
}
