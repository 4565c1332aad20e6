//! GraphQL over HTTP: requests, responses and their errors.

mod request;
mod response;

use std::fmt;

pub use request::Request;
pub use response::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;
use crate::json_ext::Path;

/// A position in the request document, counted from 1.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// An entry of the `errors` member of a [`Response`].
///
/// Document errors carry `locations`, field errors carry the `path` of the field
/// that resolved to null. `extensions.code` classifies the error.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct Error {
    pub message: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,

    #[serde(skip_serializing_if = "Object::is_empty")]
    pub extensions: Object,
}

#[buildstructor::buildstructor]
impl Error {
    /// Builds an error. `.extension_code(code)` sets `extensions.code` unless
    /// `.extension("code", ..)` already did.
    #[builder(visibility = "pub")]
    fn new(
        message: String,
        locations: Vec<Location>,
        path: Option<Path>,
        extension_code: Option<String>,
        mut extensions: JsonMap<ByteString, Value>,
    ) -> Self {
        if let Some(code) = extension_code {
            extensions
                .entry("code")
                .or_insert_with(|| Value::from(code));
        }
        Self {
            message,
            locations,
            path,
            extensions,
        }
    }

    /// `extensions.code`, if it is a string or a number.
    pub fn extension_code(&self) -> Option<String> {
        match self.extensions.get("code")? {
            Value::String(code) => Some(code.as_str().to_string()),
            Value::Number(code) => Some(code.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.message.fmt(f)
    }
}

/// Errors that can be reported to the client. Gives the error back if it cannot.
pub(crate) trait IntoGraphQLErrors: Sized {
    fn into_graphql_errors(self) -> Result<Vec<Error>, Self>;
}

/// The `extensions.code` of an error type.
pub(crate) trait ErrorExtension {
    fn extension_code(&self) -> String;
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn error_serialization_skips_empty_members() {
        let error = Error::builder().message("something went wrong").build();
        assert_eq!(
            serde_json_bytes::to_value(&error).unwrap(),
            json!({ "message": "something went wrong" })
        );
    }

    #[test]
    fn extension_code_does_not_override_existing_code() {
        let error = Error::builder()
            .message("boom")
            .extension("code", "FIRST")
            .extension_code("SECOND")
            .location(Location { line: 1, column: 3 })
            .build();
        assert_eq!(error.extension_code().as_deref(), Some("FIRST"));
        assert_eq!(
            serde_json_bytes::to_value(&error).unwrap(),
            json!({
                "message": "boom",
                "locations": [{ "line": 1, "column": 3 }],
                "extensions": { "code": "FIRST" },
            })
        );
    }

    #[test]
    fn error_deserializes_from_response_json() {
        let error: Error = serde_json_bytes::from_value(json!({
            "message": "cannot query field 'color' on type 'Pet'",
            "path": ["pet", "color"],
            "extensions": { "code": "UNKNOWN_FIELD" }
        }))
        .unwrap();
        assert_eq!(error.to_string(), "cannot query field 'color' on type 'Pet'");
        assert_eq!(error.path.map(|path| path.to_string()).as_deref(), Some("/pet/color"));
        assert!(error.locations.is_empty());
    }
}
