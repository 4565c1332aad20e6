//! Execution of selection trees against the store.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub(crate) mod mutation;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ExecutionError;
use crate::graphql::Error;
use crate::graphql::Response;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::json_ext::Value;
use crate::spec::FieldDefinition;
use crate::spec::FieldResolver;
use crate::spec::OperationKind;
use crate::spec::Query;
use crate::spec::Resolved;
use crate::spec::RootField;
use crate::spec::Schema;
use crate::spec::Selection;
use crate::store::Entity;
use crate::store::Store;

/// Resolves operations against a [`Schema`] and the [`Store`] it is bound to.
#[derive(Clone, Debug)]
pub struct Executor {
    schema: Arc<Schema>,
    store: Arc<Store>,
    memoize_relationships: bool,
}

#[buildstructor::buildstructor]
impl Executor {
    #[builder(visibility = "pub")]
    fn new(schema: Arc<Schema>, store: Arc<Store>, memoize_relationships: Option<bool>) -> Self {
        Self {
            schema,
            store,
            memoize_relationships: memoize_relationships.unwrap_or_default(),
        }
    }
}

impl Executor {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Resolves one root field.
    ///
    /// The returned data is the value of the root field itself. Unknown root fields and
    /// invalid arguments are rejected before any resolver runs; errors below the root
    /// are returned in the response, with their path.
    pub fn execute(
        &self,
        kind: OperationKind,
        root_field_name: &str,
        arguments: &Object,
        selection_set: &[Selection],
    ) -> Result<Response, ExecutionError> {
        let prepared = self.prepare(kind, root_field_name, arguments, selection_set)?;
        let mut parameters = ResolveParameters::new(self.memoize_relationships);
        let mut path = Path::from_key(root_field_name);
        let data = self.resolve_root(&prepared, selection_set, &mut parameters, &mut path)?;

        Ok(Response::builder()
            .data(data)
            .errors(parameters.errors)
            .build())
    }

    /// Resolves every root field of a parsed operation, in document order.
    ///
    /// All root fields are checked first: if one of them is invalid, nothing runs and the
    /// response carries no data.
    pub fn execute_query(&self, query: &Query) -> Response {
        tracing::debug!(
            kind = %query.kind,
            operation_name = query.operation_name.as_deref().unwrap_or_default(),
            "executing operation"
        );

        let mut errors = Vec::new();
        let mut prepared = Vec::with_capacity(query.root_fields.len());
        for selection in &query.root_fields {
            if selection.is_typename_field() {
                prepared.push(None);
                continue;
            }
            match self.prepare(
                query.kind,
                &selection.name,
                &selection.arguments,
                selection.selection_set.as_deref().unwrap_or_default(),
            ) {
                Ok(root) => prepared.push(Some(root)),
                Err(error) => errors.push(
                    error.to_graphql_error(Some(Path::from_key(selection.response_key()))),
                ),
            }
        }
        if !errors.is_empty() {
            return Response::from_errors(errors);
        }

        let mut parameters = ResolveParameters::new(self.memoize_relationships);
        let mut data = Object::new();
        for (selection, root) in query.root_fields.iter().zip(prepared) {
            let value = match root {
                None => query.kind.default_type_name().into(),
                Some(root) => {
                    let mut path = Path::from_key(selection.response_key());
                    let selection_set = selection.selection_set.as_deref().unwrap_or_default();
                    self.resolve_root(&root, selection_set, &mut parameters, &mut path)
                        .unwrap_or_else(|error| {
                            parameters.push_error(&error, &path);
                            Value::Null
                        })
                }
            };
            data.insert(selection.response_key(), value);
        }

        Response::builder()
            .data(Value::Object(data))
            .errors(parameters.errors)
            .build()
    }

    /// Looks up the root field and coerces its arguments.
    fn prepare<'a>(
        &'a self,
        kind: OperationKind,
        root_field_name: &str,
        arguments: &Object,
        selection_set: &[Selection],
    ) -> Result<PreparedRoot<'a>, ExecutionError> {
        let type_name = kind.default_type_name();
        let field = self.schema.root_field(kind, root_field_name).ok_or_else(|| {
            ExecutionError::UnknownField {
                type_name: type_name.to_string(),
                field: root_field_name.to_string(),
            }
        })?;
        if selection_set.is_empty() {
            return Err(ExecutionError::InvalidSelection {
                type_name: type_name.to_string(),
                field: root_field_name.to_string(),
                reason: "a selection set is required".to_string(),
            });
        }

        let mut coerced = Object::new();
        for argument in &field.arguments {
            let value = arguments
                .get(argument.name.as_str())
                .cloned()
                .unwrap_or_default();
            if value.is_null() {
                if argument.ty.is_non_null() {
                    return Err(ExecutionError::MissingArgument {
                        field: root_field_name.to_string(),
                        argument: argument.name.clone(),
                    });
                }
                continue;
            }
            argument
                .ty
                .validate_input_value(&value)
                .map_err(|_| ExecutionError::TypeMismatch {
                    field: root_field_name.to_string(),
                    argument: argument.name.clone(),
                    expected: argument.ty.to_string(),
                })?;
            coerced.insert(argument.name.as_str(), value);
        }

        Ok(PreparedRoot {
            kind,
            field,
            arguments: coerced,
        })
    }

    fn resolve_root(
        &self,
        root: &PreparedRoot<'_>,
        selection_set: &[Selection],
        parameters: &mut ResolveParameters,
        path: &mut Path,
    ) -> Result<Value, ExecutionError> {
        tracing::debug!(kind = %root.kind, field = %root.field.name, "resolving root field");
        let resolved = root.field.resolve(&root.arguments, &self.store)?;
        Ok(self.complete_value(resolved, selection_set, parameters, path))
    }

    fn complete_value(
        &self,
        resolved: Resolved,
        selection_set: &[Selection],
        parameters: &mut ResolveParameters,
        path: &mut Path,
    ) -> Value {
        match resolved {
            Resolved::Single(None) => Value::Null,
            Resolved::Single(Some(entity)) => {
                Value::Object(self.complete_object(&entity, selection_set, parameters, path))
            }
            Resolved::List(entities) => Value::Array(
                entities
                    .iter()
                    .enumerate()
                    .map(|(index, entity)| {
                        path.push(PathElement::Index(index));
                        let value = self.complete_object(entity, selection_set, parameters, path);
                        path.pop();
                        Value::Object(value)
                    })
                    .collect(),
            ),
        }
    }

    fn complete_object(
        &self,
        entity: &Entity,
        selection_set: &[Selection],
        parameters: &mut ResolveParameters,
        path: &mut Path,
    ) -> Object {
        let type_name = entity.type_name();
        let object_type = self.schema.object_type(type_name);
        let mut output = Object::new();

        for selection in selection_set {
            let response_key = selection.response_key();
            path.push(PathElement::Key(response_key.to_string()));
            let value = if selection.is_typename_field() {
                type_name.into()
            } else {
                match object_type.and_then(|object_type| object_type.field(&selection.name)) {
                    Some(field) => self.resolve_field(entity, field, selection, parameters, path),
                    None => {
                        parameters.push_error(
                            &ExecutionError::UnknownField {
                                type_name: type_name.to_string(),
                                field: selection.name.clone(),
                            },
                            path,
                        );
                        Value::Null
                    }
                }
            };
            path.pop();
            output.insert(response_key, value);
        }
        output
    }

    fn resolve_field(
        &self,
        entity: &Entity,
        field: &FieldDefinition,
        selection: &Selection,
        parameters: &mut ResolveParameters,
        path: &mut Path,
    ) -> Value {
        let invalid_selection = |reason: &str| ExecutionError::InvalidSelection {
            type_name: entity.type_name().to_string(),
            field: field.name.clone(),
            reason: reason.to_string(),
        };

        match (&field.resolver, selection.selection_set.as_deref()) {
            (FieldResolver::Scalar(read), None) => read(entity),
            (FieldResolver::Scalar(_), Some(_)) => {
                parameters.push_error(
                    &invalid_selection("scalar fields cannot have a selection set"),
                    path,
                );
                Value::Null
            }
            (FieldResolver::Single(_) | FieldResolver::List(_), None) => {
                parameters.push_error(&invalid_selection("a selection set is required"), path);
                Value::Null
            }
            (FieldResolver::Single(rule), Some(selection_set)) => {
                let related = parameters.related(entity, &field.name, || {
                    Resolved::Single(rule(entity, self.store()))
                });
                self.complete_value(related, selection_set, parameters, path)
            }
            (FieldResolver::List(rule), Some(selection_set)) => {
                let related = parameters.related(entity, &field.name, || {
                    Resolved::List(rule(entity, self.store()))
                });
                self.complete_value(related, selection_set, parameters, path)
            }
        }
    }
}

struct PreparedRoot<'a> {
    kind: OperationKind,
    field: &'a RootField,
    arguments: Object,
}

/// (entity, field name). Keyed by the whole row since ids are not unique under `count`
/// allocation.
type RelationshipKey = (Entity, String);

/// State shared by all the fields of one execution.
struct ResolveParameters {
    errors: Vec<Error>,
    relationships: Option<HashMap<RelationshipKey, Resolved>>,
}

impl ResolveParameters {
    fn new(memoize_relationships: bool) -> Self {
        Self {
            errors: Vec::new(),
            relationships: memoize_relationships.then(HashMap::new),
        }
    }

    fn push_error(&mut self, error: &ExecutionError, path: &Path) {
        tracing::debug!(path = %path, "field error: {error}");
        self.errors.push(error.to_graphql_error(Some(path.clone())));
    }

    /// Follows a relationship, reusing an earlier lookup of the same one when memoization
    /// is enabled.
    fn related(
        &mut self,
        entity: &Entity,
        field: &str,
        resolve: impl FnOnce() -> Resolved,
    ) -> Resolved {
        let Some(relationships) = self.relationships.as_mut() else {
            return resolve();
        };
        relationships
            .entry((entity.clone(), field.to_string()))
            .or_insert_with(resolve)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use serde_json_bytes::json;

    use super::*;
    use crate::spec::FieldType;
    use crate::store::IdAllocation;
    use crate::store::Owner;
    use crate::store::Pet;

    fn executor() -> Executor {
        Executor::builder()
            .schema(Arc::new(Schema::owners_and_pets().unwrap()))
            .store(Arc::new(Store::seeded()))
            .build()
    }

    fn names(fields: &[&str]) -> Vec<Selection> {
        fields.iter().map(|name| Selection::field(*name)).collect()
    }

    fn arguments(value: serde_json_bytes::Value) -> Object {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn owner_with_pets() {
        let response = executor()
            .execute(
                OperationKind::Query,
                "owner",
                &arguments(json!({ "id": 4 })),
                &[
                    Selection::field("name"),
                    Selection::object("pets", names(&["name"])),
                ],
            )
            .unwrap();
        assert!(response.errors.is_empty());
        insta::assert_json_snapshot!(response.data, @r#"
        {
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
        "#);
    }

    #[test]
    fn pet_owner_follows_owner_id() {
        let executor = executor();
        for pet in executor.store().pets().scan_all() {
            let response = executor
                .execute(
                    OperationKind::Query,
                    "pet",
                    &arguments(json!({ "id": pet.id })),
                    &[
                        Selection::field("ownerId"),
                        Selection::object("owner", names(&["id"])),
                    ],
                )
                .unwrap();
            let data = response.data.unwrap();
            let data = data.as_object().unwrap();
            let owner = data.get("owner").and_then(|owner| owner.as_object()).unwrap();
            assert_eq!(owner.get("id"), data.get("ownerId"));
        }
    }

    #[test]
    fn absent_entities_are_null() {
        let executor = executor();
        let response = executor
            .execute(
                OperationKind::Query,
                "pet",
                &arguments(json!({ "id": 42 })),
                &names(&["name"]),
            )
            .unwrap();
        assert_eq!(response.data, Some(Value::Null));
        assert!(response.errors.is_empty());

        let response = executor
            .execute(OperationKind::Query, "owner", &Object::new(), &names(&["name"]))
            .unwrap();
        assert_eq!(response.data, Some(Value::Null));
    }

    #[test]
    fn dangling_owner_id_and_empty_pets() {
        let store = Store::seeded();
        store.pets().insert(|id| crate::store::Pet {
            id,
            name: "Stray".to_string(),
            owner_id: 99,
        });
        store.owners().insert(|id| crate::store::Owner {
            id,
            name: "Nobody".to_string(),
        });
        let executor = Executor::builder()
            .schema(Arc::new(Schema::owners_and_pets().unwrap()))
            .store(Arc::new(store))
            .build();

        let response = executor
            .execute(
                OperationKind::Query,
                "pet",
                &arguments(json!({ "id": 11 })),
                &[Selection::object("owner", names(&["name"]))],
            )
            .unwrap();
        assert_eq!(response.data, Some(json!({ "owner": null })));

        let response = executor
            .execute(
                OperationKind::Query,
                "owner",
                &arguments(json!({ "id": 5 })),
                &[Selection::object("pets", names(&["name"]))],
            )
            .unwrap();
        assert_eq!(response.data, Some(json!({ "pets": [] })));
    }

    #[test]
    fn aliases_typename_and_field_order() {
        let response = executor()
            .execute(
                OperationKind::Query,
                "pet",
                &arguments(json!({ "id": 2 })),
                &[
                    Selection::field("name").with_alias("petName"),
                    Selection::field("__typename"),
                    Selection::field("id"),
                    Selection::object("owner", names(&["__typename", "name"]))
                        .with_alias("human"),
                ],
            )
            .unwrap();
        let data = response.data.unwrap();
        assert_eq!(
            data,
            json!({
                "petName": "Bark Twain",
                "__typename": "Pet",
                "id": 2,
                "human": { "__typename": "Owner", "name": "Bob" },
            })
        );
        let keys: Vec<_> = data.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["petName", "__typename", "id", "human"]);
    }

    #[test]
    fn request_level_errors() {
        let executor = executor();
        let error = executor
            .execute(OperationKind::Query, "dogs", &Object::new(), &names(&["id"]))
            .unwrap_err();
        assert_eq!(
            error,
            ExecutionError::UnknownField {
                type_name: "Query".to_string(),
                field: "dogs".to_string(),
            }
        );

        let error = executor
            .execute(
                OperationKind::Query,
                "addNewOwner",
                &arguments(json!({ "name": "x" })),
                &names(&["id"]),
            )
            .unwrap_err();
        assert!(matches!(error, ExecutionError::UnknownField { .. }));

        let error = executor
            .execute(
                OperationKind::Mutation,
                "addNewPet",
                &arguments(json!({ "name": "Rex" })),
                &names(&["id"]),
            )
            .unwrap_err();
        assert_eq!(
            error,
            ExecutionError::MissingArgument {
                field: "addNewPet".to_string(),
                argument: "ownerId".to_string(),
            }
        );

        let error = executor
            .execute(
                OperationKind::Mutation,
                "addNewPet",
                &arguments(json!({ "name": "Rex", "ownerId": "four" })),
                &names(&["id"]),
            )
            .unwrap_err();
        assert_eq!(
            error,
            ExecutionError::TypeMismatch {
                field: "addNewPet".to_string(),
                argument: "ownerId".to_string(),
                expected: "Int!".to_string(),
            }
        );
        assert_eq!(executor.store().pets().len(), 10);
    }

    #[test]
    fn nested_errors_keep_siblings() {
        let response = executor()
            .execute(
                OperationKind::Query,
                "owners",
                &Object::new(),
                &[
                    Selection::field("name"),
                    Selection::field("color"),
                    Selection::object("id", names(&["value"])),
                    Selection::field("pets"),
                ],
            )
            .unwrap();
        let data = response.data.unwrap();
        assert_eq!(
            data.as_array().unwrap()[0],
            json!({ "name": "Joey Calamad", "color": null, "id": null, "pets": null })
        );
        assert_eq!(response.errors.len(), 12);
        assert_eq!(response.errors[0].path.as_ref().unwrap().to_string(), "/owners/0/color");
        assert_eq!(
            response.errors[0].extension_code().as_deref(),
            Some("UNKNOWN_FIELD")
        );
        assert_eq!(
            response.errors[1].extension_code().as_deref(),
            Some("INVALID_SELECTION")
        );
        assert_eq!(response.errors[2].path.as_ref().unwrap().to_string(), "/owners/0/pets");
    }

    #[test]
    fn relationships_can_be_memoized() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let mut schema = Schema::owners_and_pets().unwrap();
        let counted = lookups.clone();
        schema
            .register_field(
                "Pet",
                FieldDefinition::single("sameOwner", "Owner", move |entity, store| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    store.owners().find_by_id(entity.as_pet()?.owner_id).map(Entity::from)
                }),
            )
            .unwrap();
        let schema = Arc::new(schema);
        let selection = [Selection::object(
            "pets",
            vec![Selection::object(
                "owner",
                vec![Selection::object(
                    "pets",
                    vec![
                        Selection::object("sameOwner", names(&["id"])),
                        Selection::object("sameOwner", names(&["name"])).with_alias("again"),
                    ],
                )],
            )],
        )];

        let mut results = Vec::new();
        for memoize in [false, true] {
            lookups.store(0, Ordering::SeqCst);
            let executor = Executor::builder()
                .schema(schema.clone())
                .store(Arc::new(Store::seeded()))
                .memoize_relationships(memoize)
                .build();
            let response = executor
                .execute(OperationKind::Query, "owner", &arguments(json!({ "id": 1 })), &selection)
                .unwrap();
            results.push((response.data, lookups.load(Ordering::SeqCst)));
        }
        // Owner 1 has three pets: each pet is reached three times through owner.pets.
        assert_eq!(results[0].1, 18);
        assert_eq!(results[1].1, 3);
        assert_eq!(results[0].0, results[1].0);
    }

    #[test]
    fn memoization_tells_apart_rows_sharing_an_id() {
        let owners = vec![
            Owner {
                id: 1,
                name: "Ann".to_string(),
            },
            Owner {
                id: 2,
                name: "Ben".to_string(),
            },
        ];
        let pets = vec![
            Pet {
                id: 1,
                name: "Rex".to_string(),
                owner_id: 1,
            },
            Pet {
                id: 1,
                name: "Fido".to_string(),
                owner_id: 2,
            },
        ];
        let selection = [Selection::object(
            "pets",
            vec![Selection::object("owner", names(&["name"]))],
        )];

        let mut results = Vec::new();
        for memoize in [false, true] {
            let executor = Executor::builder()
                .schema(Arc::new(Schema::owners_and_pets().unwrap()))
                .store(Arc::new(Store::from_rows(
                    IdAllocation::Count,
                    owners.clone(),
                    pets.clone(),
                )))
                .memoize_relationships(memoize)
                .build();
            let response = executor
                .execute(OperationKind::Query, "pets", &Object::new(), &selection)
                .unwrap();
            results.push(response.data);
        }
        assert_eq!(
            results[1],
            Some(json!([{ "owner": { "name": "Ann" } }, { "owner": { "name": "Ben" } }]))
        );
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn execute_query_merges_root_fields() {
        let executor = executor();
        let query = Query {
            kind: OperationKind::Mutation,
            operation_name: None,
            root_fields: vec![
                Selection::field("__typename"),
                Selection::object("addNewOwner", names(&["id", "name"]))
                    .with_argument("name", "This guy"),
                Selection::object("addNewPet", names(&["id", "ownerId"]))
                    .with_alias("pet")
                    .with_argument("name", "Rex")
                    .with_argument("ownerId", 5),
            ],
        };
        let response = executor.execute_query(&query);
        assert!(response.errors.is_empty());
        assert_eq!(
            response.data,
            Some(json!({
                "__typename": "Mutation",
                "addNewOwner": { "id": 5, "name": "This guy" },
                "pet": { "id": 11, "ownerId": 5 },
            }))
        );
        assert_eq!(executor.store().owners().len(), 5);
    }

    #[test]
    fn execute_query_checks_every_root_first() {
        let executor = executor();
        let query = Query {
            kind: OperationKind::Mutation,
            operation_name: None,
            root_fields: vec![
                Selection::object("addNewOwner", names(&["id"]))
                    .with_argument("name", "This guy"),
                Selection::object("addNewPet", names(&["id"])).with_argument("name", "Rex"),
            ],
        };
        let response = executor.execute_query(&query);
        assert_eq!(response.data, None);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].path.as_ref().unwrap().to_string(),
            "/addNewPet"
        );
        assert_eq!(executor.store().owners().len(), 4);
    }

    #[test]
    fn custom_root_fields() {
        let mut schema = Schema::owners_and_pets().unwrap();
        schema
            .register_root_field(
                OperationKind::Query,
                RootField::new(
                    "petsNamed",
                    FieldType::list(FieldType::named("Pet")),
                    |arguments, store| {
                        let name = arguments
                            .get("name")
                            .and_then(|name| name.as_str())
                            .unwrap_or_default()
                            .to_string();
                        Ok(Resolved::List(
                            store
                                .pets()
                                .find_where(|pet| pet.name == name)
                                .into_iter()
                                .map(Entity::from)
                                .collect(),
                        ))
                    },
                )
                .argument("name", FieldType::non_null(FieldType::String)),
            )
            .unwrap();
        let executor = Executor::builder()
            .schema(Arc::new(schema))
            .store(Arc::new(Store::with_id_allocation(IdAllocation::Max)))
            .build();
        let response = executor
            .execute(
                OperationKind::Query,
                "petsNamed",
                &arguments(json!({ "name": "Rex" })),
                &names(&["id"]),
            )
            .unwrap();
        assert_eq!(response.data, Some(json!([])));
    }
}
