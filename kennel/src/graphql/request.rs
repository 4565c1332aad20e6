use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map as JsonMap;
use serde_json_bytes::Value;

use crate::json_ext::Object;

/// A GraphQL request, from a POST body or from GET query parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Request {
    /// The document. It may hold a query or a mutation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub query: Option<String>,

    /// Picks the operation to run when the document holds several.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_name: Option<String>,

    /// Variable values, by variable name. `null` reads as no variables.
    #[serde(
        skip_serializing_if = "Object::is_empty",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub variables: Object,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Object, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Object>::deserialize(deserializer)?.unwrap_or_default())
}

/// Raw GET parameters. `variables` travels as a JSON string.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetParameters {
    query: Option<String>,
    operation_name: Option<String>,
    variables: Option<String>,
}

#[buildstructor::buildstructor]
impl Request {
    #[builder(visibility = "pub")]
    fn new(
        query: Option<String>,
        operation_name: Option<String>,
        // Not the `Object` alias, so buildstructor generates `.variable(name, value)`
        variables: JsonMap<ByteString, Value>,
    ) -> Self {
        Self {
            query,
            operation_name,
            variables,
        }
    }

    /// Reads a request from the query string of a GET request.
    ///
    /// Fails if the parameters are not url-encoded or if `variables` is not a JSON object.
    pub fn from_urlencoded_query(url_encoded_query: String) -> Result<Request, serde_json::Error> {
        let parameters: GetParameters = serde_urlencoded::from_str(&url_encoded_query)
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        let variables = match parameters.variables.as_deref() {
            Some(variables) => serde_json::from_str(variables)?,
            None => Object::new(),
        };

        Ok(Self::builder()
            .and_query(parameters.query)
            .and_operation_name(parameters.operation_name)
            .variables(variables)
            .build())
    }
}
