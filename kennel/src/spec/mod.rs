#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

mod field_type;
pub(crate) mod query;
mod schema;
mod selection;

use apollo_compiler::ast::OperationType;
use displaydoc::Display;
pub use field_type::FieldType;
pub use query::Query;
pub(crate) use query::TYPENAME;
pub use schema::*;
pub use selection::Selection;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::error::ValidationErrors;
use crate::graphql;
use crate::graphql::ErrorExtension;
use crate::graphql::IntoGraphQLErrors;

/// GraphQL document errors.
#[derive(Error, Debug, Display, Clone)]
#[non_exhaustive]
pub enum SpecError {
    /// selection processing recursion limit exceeded
    RecursionLimitExceeded,
    /// parsing error: {0}
    ParsingError(ValidationErrors),
    /// validation error: {0}
    ValidationError(ValidationErrors),
    /// invalid schema: {0}
    InvalidSchema(ValidationErrors),
    /// Unknown operation named "{0}"
    UnknownOperation(String),
    /// Must provide operation name if query contains multiple operations.
    MissingOperationName,
    /// Must provide query string.
    MissingQuery,
    /// invalid type for variable: '{0}'
    InvalidVariable(String),
    /// subscription operation is not supported
    SubscriptionNotSupported,
}

impl ErrorExtension for SpecError {
    fn extension_code(&self) -> String {
        match self {
            SpecError::RecursionLimitExceeded => "RECURSION_LIMIT_EXCEEDED",
            SpecError::ParsingError(_) => "GRAPHQL_PARSING_FAILED",
            SpecError::ValidationError(_) => "GRAPHQL_VALIDATION_FAILED",
            SpecError::InvalidSchema(_) => "INVALID_SCHEMA",
            SpecError::UnknownOperation(_) => "GRAPHQL_UNKNOWN_OPERATION_NAME",
            SpecError::MissingOperationName => "GRAPHQL_VALIDATION_FAILED",
            SpecError::MissingQuery => "MISSING_QUERY_STRING",
            SpecError::InvalidVariable(_) => "VALIDATION_INVALID_TYPE_VARIABLE",
            SpecError::SubscriptionNotSupported => "SUBSCRIPTION_NOT_SUPPORTED",
        }
        .to_string()
    }
}

impl IntoGraphQLErrors for SpecError {
    fn into_graphql_errors(self) -> Result<Vec<graphql::Error>, Self> {
        let code = self.extension_code();
        match self {
            SpecError::ParsingError(errors) => {
                Ok(errors.into_graphql_errors_with_code("GRAPHQL_PARSING_FAILED"))
            }
            SpecError::ValidationError(errors) => {
                Ok(errors.into_graphql_errors_with_code("GRAPHQL_VALIDATION_FAILED"))
            }
            SpecError::InvalidVariable(ref name) => Ok(vec![
                graphql::Error::builder()
                    .message(self.to_string())
                    .extension_code(code)
                    .extension("name", name.as_str())
                    .build(),
            ]),
            _ => Ok(vec![
                graphql::Error::builder()
                    .message(self.to_string())
                    .extension_code(code)
                    .build(),
            ]),
        }
    }
}

/// The kind of a GraphQL operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }

    /// The name of the root type operations of this kind select on.
    pub const fn default_type_name(&self) -> &'static str {
        match self {
            OperationKind::Query => "Query",
            OperationKind::Mutation => "Mutation",
            OperationKind::Subscription => "Subscription",
        }
    }
}

impl From<OperationType> for OperationKind {
    fn from(operation_type: OperationType) -> Self {
        match operation_type {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
