//! Query processing.
//!
//! Parsing and validation of GraphQL documents, and their conversion to selection trees.

use apollo_compiler::executable;
use apollo_compiler::parser::Parser;
use apollo_compiler::validation::Valid;

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::FieldType;
use crate::spec::OperationKind;
use crate::spec::Selection;
use crate::spec::SpecError;
use crate::spec::selection::value_from_ast;

pub(crate) const TYPENAME: &str = "__typename";

/// An operation of a GraphQL document, ready to be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: OperationKind,
    pub operation_name: Option<String>,
    /// The root fields, in document order, with variables substituted.
    pub root_fields: Vec<Selection>,
}

impl Query {
    /// Parses `source`, validates it against `definitions` and extracts the operation
    /// named `operation_name`.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn parse(
        source: &str,
        operation_name: Option<&str>,
        variables: &Object,
        definitions: &Valid<apollo_compiler::Schema>,
    ) -> Result<Self, SpecError> {
        let ast = Parser::new()
            .parse_ast(source, "query.graphql")
            .map_err(|invalid| {
                tracing::debug!("parsing error(s): {}", invalid.errors);
                SpecError::ParsingError(invalid.into())
            })?;
        let document = ast
            .to_executable_validate(definitions)
            .map_err(|invalid| SpecError::ValidationError(invalid.into()))?;

        let operation = document
            .operations
            .get(operation_name)
            .map_err(|_| match operation_name {
                Some(name) => SpecError::UnknownOperation(name.to_string()),
                None => SpecError::MissingOperationName,
            })?;

        let kind = OperationKind::from(operation.operation_type);
        if kind == OperationKind::Subscription {
            return Err(SpecError::SubscriptionNotSupported);
        }

        let variables = coerce_variables(operation, variables)?;
        let root_fields =
            Selection::from_selection_set(&operation.selection_set, &document, &variables)?;

        Ok(Query {
            kind,
            operation_name: operation.name.as_ref().map(|name| name.to_string()),
            root_fields,
        })
    }
}

/// Validates the request variables against the operation's declarations, and fills in
/// declared defaults.
fn coerce_variables(
    operation: &executable::Operation,
    variables: &Object,
) -> Result<Object, SpecError> {
    let mut coerced = Object::new();
    for definition in &operation.variables {
        let name = definition.name.as_str();
        let ty = FieldType::from(&*definition.ty);
        let value = variables.get(name).cloned().or_else(|| {
            definition
                .default_value
                .as_ref()
                .map(|default| value_from_ast(default, &Object::new()))
        });

        ty.validate_input_value(value.as_ref().unwrap_or(&Value::Null))
            .map_err(|_| SpecError::InvalidVariable(name.to_string()))?;
        if let Some(value) = value {
            coerced.insert(name, value);
        }
    }

    if tracing::enabled!(tracing::Level::DEBUG) {
        let unknown: Vec<_> = variables
            .keys()
            .filter(|key| !coerced.contains_key(key.as_str()))
            .map(|key| key.as_str())
            .collect();
        if !unknown.is_empty() {
            tracing::debug!("received variables unknown to the operation: {:?}", unknown);
        }
    }
    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use apollo_compiler::ExecutableDocument;
    use serde_json_bytes::json;

    use super::*;
    use crate::graphql::IntoGraphQLErrors;
    use crate::spec::Schema;

    fn definitions() -> Valid<apollo_compiler::Schema> {
        Schema::owners_and_pets().unwrap().definitions().unwrap()
    }

    fn parse(source: &str, variables: serde_json_bytes::Value) -> Result<Query, SpecError> {
        Query::parse(
            source,
            None,
            variables.as_object().unwrap(),
            &definitions(),
        )
    }

    #[test]
    fn parses_nested_selection() {
        let query = parse("{ owner(id: 4) { name pets { name } } }", json!({})).unwrap();
        assert_eq!(query.kind, OperationKind::Query);
        assert_eq!(
            query.root_fields,
            vec![
                Selection::object(
                    "owner",
                    vec![
                        Selection::field("name"),
                        Selection::object("pets", vec![Selection::field("name")]),
                    ]
                )
                .with_argument("id", 4)
            ]
        );
    }

    #[test]
    fn substitutes_variables_and_defaults() {
        let source = "query ($id: Int = 2) {
            pet(id: $id) { name }
            addNewOwner: owner(id: 1) { name }
            other: owners { n: name }
        }";
        let query = parse(source, json!({})).unwrap();
        assert_eq!(
            query.root_fields[0].arguments.get("id"),
            Some(&json!(2))
        );
        assert_eq!(query.root_fields[1].response_key(), "addNewOwner");
        assert_eq!(query.root_fields[2].response_key(), "other");
        assert_eq!(
            query.root_fields[2].selection_set.as_ref().unwrap()[0].response_key(),
            "n"
        );

        let query = parse(source, json!({ "id": 7 })).unwrap();
        assert_eq!(
            query.root_fields[0].arguments.get("id"),
            Some(&json!(7))
        );
    }

    #[test]
    fn flattens_fragments() {
        let source = "
            query {
                pets {
                    ...petFields
                    ... on Pet { owner { id } }
                    owner { name }
                }
            }
            fragment petFields on Pet { id name }
        ";
        let query = parse(source, json!({})).unwrap();
        assert_eq!(
            query.root_fields,
            vec![Selection::object(
                "pets",
                vec![
                    Selection::field("id"),
                    Selection::field("name"),
                    Selection::object(
                        "owner",
                        vec![Selection::field("id"), Selection::field("name")]
                    ),
                ]
            )]
        );
    }

    #[test]
    fn applies_skip_and_include() {
        let source = "query ($withOwner: Boolean!) {
            pets {
                id @skip(if: true)
                name @include(if: true)
                owner @include(if: $withOwner) { name }
                ... @skip(if: $withOwner) { ownerId }
            }
        }";
        let query = parse(source, json!({ "withOwner": false })).unwrap();
        assert_eq!(
            query.root_fields,
            vec![Selection::object(
                "pets",
                vec![Selection::field("name"), Selection::field("ownerId")]
            )]
        );
    }

    #[test]
    fn selects_operation_by_name() {
        let source = "query A { pets { id } } mutation B { addNewOwner(name: \"x\") { id } }";
        let query = Query::parse(source, Some("B"), &Object::new(), &definitions()).unwrap();
        assert_eq!(query.kind, OperationKind::Mutation);
        assert_eq!(query.operation_name.as_deref(), Some("B"));

        let missing = Query::parse(source, Some("C"), &Object::new(), &definitions());
        assert!(matches!(missing, Err(SpecError::UnknownOperation(name)) if name == "C"));
        let ambiguous = Query::parse(source, None, &Object::new(), &definitions());
        assert!(matches!(ambiguous, Err(SpecError::MissingOperationName)));
    }

    #[test]
    fn reports_parse_and_validation_errors() {
        let error = parse("{ pets { name }", json!({})).unwrap_err();
        assert!(matches!(error, SpecError::ParsingError(_)));
        let errors = error.into_graphql_errors().unwrap();
        assert_eq!(
            errors[0].extension_code().as_deref(),
            Some("GRAPHQL_PARSING_FAILED")
        );

        let error = parse("{ pets { color } }", json!({})).unwrap_err();
        assert!(matches!(error, SpecError::ValidationError(_)));
        let errors = error.into_graphql_errors().unwrap();
        assert_eq!(
            errors[0].extension_code().as_deref(),
            Some("GRAPHQL_VALIDATION_FAILED")
        );
        assert!(!errors[0].locations.is_empty());
    }

    #[test]
    fn rejects_invalid_variables() {
        let source = "query ($id: Int) { pet(id: $id) { name } }";
        let error = parse(source, json!({ "id": "one" })).unwrap_err();
        assert!(matches!(error, SpecError::InvalidVariable(name) if name == "id"));

        let source = "mutation ($name: String!) { addNewOwner(name: $name) { id } }";
        let error = parse(source, json!({})).unwrap_err();
        assert!(matches!(error, SpecError::InvalidVariable(name) if name == "name"));
    }

    #[test]
    fn rejects_subscriptions() {
        // The schema has no subscription root, so validation rejects the document first.
        let error = parse("subscription { pets { id } }", json!({})).unwrap_err();
        assert!(matches!(error, SpecError::ValidationError(_)));
    }

    #[test]
    fn converts_validated_documents() {
        let definitions = definitions();
        let document = ExecutableDocument::parse_and_validate(
            &definitions,
            "{ pet(id: 1) { __typename name } }",
            "query.graphql",
        )
        .unwrap();
        let operation = document.operations.get(None).unwrap();
        let selections =
            Selection::from_selection_set(&operation.selection_set, &document, &Object::new())
                .unwrap();
        let pet = &selections[0];
        assert!(pet.selection_set.as_ref().unwrap()[0].is_typename_field());
    }
}
