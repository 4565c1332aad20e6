//! From GraphQL requests to GraphQL responses.

use std::sync::Arc;

use apollo_compiler::validation::Valid;

use crate::configuration::Configuration;
use crate::error::SpecError;
use crate::execution::Executor;
use crate::graphql;
use crate::graphql::IntoGraphQLErrors;
use crate::spec::OperationKind;
use crate::spec::Query;
use crate::spec::Schema;
use crate::store::Store;

/// Parses, validates and executes GraphQL requests.
#[derive(Clone, Debug)]
pub struct GraphQLService {
    executor: Executor,
    definitions: Arc<Valid<apollo_compiler::Schema>>,
}

#[buildstructor::buildstructor]
impl GraphQLService {
    /// Binds a schema to a store.
    ///
    /// Fails if the schema does not print as valid GraphQL.
    #[builder(visibility = "pub")]
    fn new(
        schema: Arc<Schema>,
        store: Arc<Store>,
        memoize_relationships: Option<bool>,
    ) -> Result<Self, SpecError> {
        let definitions = Arc::new(schema.definitions()?);
        let executor = Executor::builder()
            .schema(schema)
            .store(store)
            .and_memoize_relationships(memoize_relationships)
            .build();
        Ok(Self {
            executor,
            definitions,
        })
    }
}

impl GraphQLService {
    /// The owners and pets service described by `configuration`.
    pub fn from_configuration(configuration: &Configuration) -> anyhow::Result<Self> {
        let schema = Schema::owners_and_pets()?;
        let id_allocation = configuration.store.id_allocation;
        let store = if configuration.store.seed {
            Store::seeded_with(id_allocation)
        } else {
            Store::with_id_allocation(id_allocation)
        };
        tracing::debug!(
            owners = store.owners().len(),
            pets = store.pets().len(),
            ?id_allocation,
            "store ready"
        );

        Ok(Self::builder()
            .schema(Arc::new(schema))
            .store(Arc::new(store))
            .memoize_relationships(configuration.execution.memoize_relationships)
            .build()?)
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Executes a request. Every failure is reported in the response.
    pub fn execute(&self, request: &graphql::Request) -> graphql::Response {
        self.execute_with_kinds(request, &[OperationKind::Query, OperationKind::Mutation])
    }

    /// Executes a request received as an HTTP GET, which may not modify the store.
    pub fn execute_get(&self, request: &graphql::Request) -> graphql::Response {
        self.execute_with_kinds(request, &[OperationKind::Query])
    }

    fn execute_with_kinds(
        &self,
        request: &graphql::Request,
        allowed: &[OperationKind],
    ) -> graphql::Response {
        let query = match self.parse(request) {
            Ok(query) => query,
            Err(error) => {
                tracing::debug!("invalid request: {error}");
                let errors = error.into_graphql_errors().unwrap_or_default();
                return graphql::Response::from_errors(errors);
            }
        };
        if !allowed.contains(&query.kind) {
            return graphql::Response::from_errors(vec![
                graphql::Error::builder()
                    .message("Mutations can only be sent over HTTP POST")
                    .extension_code("MUTATION_FORBIDDEN")
                    .build(),
            ]);
        }
        self.executor.execute_query(&query)
    }

    fn parse(&self, request: &graphql::Request) -> Result<Query, SpecError> {
        let source = request.query.as_deref().ok_or(SpecError::MissingQuery)?;
        Query::parse(
            source,
            request.operation_name.as_deref(),
            &request.variables,
            &self.definitions,
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::configuration::StoreConfig;

    fn service() -> GraphQLService {
        GraphQLService::from_configuration(&Configuration::default()).unwrap()
    }

    fn request(query: &str) -> graphql::Request {
        graphql::Request::builder().query(query.to_string()).build()
    }

    #[test]
    fn executes_documents() {
        let response = service().execute(&request("{ owner(id: 4) { name pets { name } } }"));
        insta::assert_json_snapshot!(response, @r#"
        {
          "data": {
            "owner": {
              "name": "Bob",
              "pets": [
                {
                  "name": "Bark Twain"
                },
                {
                  "name": "Jimmy Chew"
                },
                {
                  "name": "Pup Tart"
                }
              ]
            }
          }
        }
        "#);
    }

    #[test]
    fn mutations_are_visible_to_later_requests() {
        let service = service();
        let response = service.execute(&request(
            r#"mutation { addNewOwner(name: "This guy") { id name } }"#,
        ));
        assert_eq!(
            response.data,
            Some(json!({ "addNewOwner": { "id": 5, "name": "This guy" } }))
        );
        let response = service.execute(&request("{ owners { id } }"));
        let owners = response.data.unwrap();
        let owners = owners.as_object().unwrap().get("owners").unwrap().as_array().unwrap();
        assert_eq!(owners.len(), 5);
    }

    #[test]
    fn missing_query() {
        let response = service().execute(&graphql::Request::default());
        assert_eq!(response.data, None);
        assert_eq!(
            response.errors[0].extension_code().as_deref(),
            Some("MISSING_QUERY_STRING")
        );
    }

    #[test]
    fn get_requests_cannot_mutate() {
        let service = service();
        let response =
            service.execute_get(&request(r#"mutation { addNewOwner(name: "x") { id } }"#));
        assert_eq!(response.data, None);
        assert_eq!(
            response.errors[0].extension_code().as_deref(),
            Some("MUTATION_FORBIDDEN")
        );
        assert_eq!(service.executor().store().owners().len(), 4);
    }

    #[test]
    fn unseeded_store() {
        let configuration = Configuration::builder()
            .store(StoreConfig::builder().seed(false).build())
            .build();
        let service = GraphQLService::from_configuration(&configuration).unwrap();
        let response = service.execute(&request("{ pets { id } owners { id } }"));
        assert_eq!(response.data, Some(json!({ "pets": [], "owners": [] })));
    }
}
