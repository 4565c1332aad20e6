//! GraphQL schema.
//!
//! The schema is a registry of object types and root fields. Every field carries its
//! own resolver, tagged by kind, and refers to other types by name only. Types are
//! registered first and fields afterwards, which is how `Owner.pets` and `Pet.owner`
//! can point at each other.

use std::fmt;
use std::fmt::Write;
use std::sync::Arc;

use apollo_compiler::validation::Valid;
use displaydoc::Display;
use indexmap::IndexMap;
use thiserror::Error;

use super::FieldType;
use super::OperationKind;
use super::SpecError;
use crate::error::ExecutionError;
use crate::execution::mutation;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::store::Entity;
use crate::store::Store;

/// Reads a scalar from an entity.
pub type ScalarResolver = Arc<dyn Fn(&Entity) -> Value + Send + Sync>;

/// Follows a relationship to at most one entity.
pub type SingleResolver = Arc<dyn Fn(&Entity, &Store) -> Option<Entity> + Send + Sync>;

/// Follows a relationship to any number of entities.
pub type ListResolver = Arc<dyn Fn(&Entity, &Store) -> Vec<Entity> + Send + Sync>;

/// Resolves a root field from its coerced arguments.
pub type RootResolver =
    Arc<dyn Fn(&Object, &Store) -> Result<Resolved, ExecutionError> + Send + Sync>;

/// How a field of an object type gets its value.
#[derive(Clone)]
pub enum FieldResolver {
    /// A scalar read from the entity itself.
    Scalar(ScalarResolver),
    /// A relationship to zero or one entity.
    Single(SingleResolver),
    /// A relationship to zero or more entities.
    List(ListResolver),
}

impl fmt::Debug for FieldResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldResolver::Scalar(_) => f.write_str("Scalar"),
            FieldResolver::Single(_) => f.write_str("Single"),
            FieldResolver::List(_) => f.write_str("List"),
        }
    }
}

/// The value produced by a root resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    Single(Option<Entity>),
    List(Vec<Entity>),
}

/// A field of an object type.
#[derive(Clone, Debug)]
pub struct FieldDefinition {
    pub name: String,
    pub description: Option<String>,
    pub ty: FieldType,
    pub resolver: FieldResolver,
}

impl FieldDefinition {
    pub fn scalar(
        name: impl Into<String>,
        ty: FieldType,
        read: impl Fn(&Entity) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            resolver: FieldResolver::Scalar(Arc::new(read)),
        }
    }

    /// A nullable relationship to the type named `target`.
    pub fn single(
        name: impl Into<String>,
        target: &str,
        rule: impl Fn(&Entity, &Store) -> Option<Entity> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: FieldType::named(target),
            resolver: FieldResolver::Single(Arc::new(rule)),
        }
    }

    /// A list relationship to the type named `target`.
    pub fn list(
        name: impl Into<String>,
        target: &str,
        rule: impl Fn(&Entity, &Store) -> Vec<Entity> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty: FieldType::list(FieldType::named(target)),
            resolver: FieldResolver::List(Arc::new(rule)),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_relationship(&self) -> bool {
        !matches!(self.resolver, FieldResolver::Scalar(_))
    }
}

/// An object type: a name and its fields, in declaration order.
#[derive(Clone, Debug)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    fields: IndexMap<String, FieldDefinition>,
}

impl ObjectType {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values()
    }
}

/// An argument of a root field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentDefinition {
    pub name: String,
    pub ty: FieldType,
}

/// An entry point of the schema, under `Query` or `Mutation`.
#[derive(Clone)]
pub struct RootField {
    pub name: String,
    pub description: Option<String>,
    pub ty: FieldType,
    pub arguments: Vec<ArgumentDefinition>,
    resolver: RootResolver,
}

impl fmt::Debug for RootField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootField")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

impl RootField {
    pub fn new(
        name: impl Into<String>,
        ty: FieldType,
        resolver: impl Fn(&Object, &Store) -> Result<Resolved, ExecutionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: Vec::new(),
            resolver: Arc::new(resolver),
        }
    }

    pub fn argument(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.arguments.push(ArgumentDefinition {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Runs the resolver. `arguments` must already be coerced against
    /// [`RootField::arguments`].
    pub fn resolve(&self, arguments: &Object, store: &Store) -> Result<Resolved, ExecutionError> {
        (self.resolver)(arguments, store)
    }
}

/// Errors raised while building a [`Schema`].
#[derive(Error, Display, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// type '{0}' is not registered
    UnknownType(String),
    /// type '{0}' is already registered
    DuplicateType(String),
    /// field '{field}' is already registered on type '{type_name}'
    DuplicateField { type_name: String, field: String },
    /// {0} root fields are not supported
    UnsupportedOperation(OperationKind),
    /// field '{field}' on type '{type_name}' refers to unknown type '{target}'
    UnresolvedType {
        type_name: String,
        field: String,
        target: String,
    },
}

/// A GraphQL schema: object types and the root fields of each operation kind.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    types: IndexMap<String, ObjectType>,
    query: IndexMap<String, RootField>,
    mutation: IndexMap<String, RootField>,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// The owners and pets schema, bound to the [`Store`] collections.
    pub fn owners_and_pets() -> Result<Self, SchemaError> {
        let mut schema = Self::new();
        schema.register_type("Pet", Some("This represents a pet owned by an owner"))?;
        schema.register_type("Owner", Some("This represents an owner of a pet"))?;

        let id = FieldType::non_null(FieldType::Int);
        let name = FieldType::non_null(FieldType::String);

        schema.register_field(
            "Pet",
            FieldDefinition::scalar("id", id.clone(), |entity| {
                entity.as_pet().map(|pet| pet.id.into()).unwrap_or_default()
            }),
        )?;
        schema.register_field(
            "Pet",
            FieldDefinition::scalar("name", name.clone(), |entity| {
                entity
                    .as_pet()
                    .map(|pet| pet.name.as_str().into())
                    .unwrap_or_default()
            }),
        )?;
        schema.register_field(
            "Pet",
            FieldDefinition::scalar("ownerId", id.clone(), |entity| {
                entity
                    .as_pet()
                    .map(|pet| pet.owner_id.into())
                    .unwrap_or_default()
            }),
        )?;
        schema.register_field(
            "Pet",
            FieldDefinition::single("owner", "Owner", |entity, store| {
                let pet = entity.as_pet()?;
                store.owners().find_by_id(pet.owner_id).map(Entity::from)
            }),
        )?;

        schema.register_field(
            "Owner",
            FieldDefinition::scalar("id", id, |entity| {
                entity
                    .as_owner()
                    .map(|owner| owner.id.into())
                    .unwrap_or_default()
            }),
        )?;
        schema.register_field(
            "Owner",
            FieldDefinition::scalar("name", name.clone(), |entity| {
                entity
                    .as_owner()
                    .map(|owner| owner.name.as_str().into())
                    .unwrap_or_default()
            }),
        )?;
        schema.register_field(
            "Owner",
            FieldDefinition::list("pets", "Pet", |entity, store| match entity.as_owner() {
                Some(owner) => store
                    .pets()
                    .find_where(|pet| pet.owner_id == owner.id)
                    .into_iter()
                    .map(Entity::from)
                    .collect(),
                None => Vec::new(),
            }),
        )?;

        schema.register_root_field(
            OperationKind::Query,
            RootField::new("pet", FieldType::named("Pet"), |arguments, store| {
                Ok(Resolved::Single(
                    optional_int(arguments, "id")
                        .and_then(|id| store.pets().find_by_id(id))
                        .map(Entity::from),
                ))
            })
            .argument("id", FieldType::Int)
            .description("A single pet"),
        )?;
        schema.register_root_field(
            OperationKind::Query,
            RootField::new(
                "pets",
                FieldType::list(FieldType::named("Pet")),
                |_, store| {
                    Ok(Resolved::List(
                        store.pets().scan_all().into_iter().map(Entity::from).collect(),
                    ))
                },
            )
            .description("A list of all pets"),
        )?;
        schema.register_root_field(
            OperationKind::Query,
            RootField::new("owner", FieldType::named("Owner"), |arguments, store| {
                Ok(Resolved::Single(
                    optional_int(arguments, "id")
                        .and_then(|id| store.owners().find_by_id(id))
                        .map(Entity::from),
                ))
            })
            .argument("id", FieldType::Int)
            .description("A single owner"),
        )?;
        schema.register_root_field(
            OperationKind::Query,
            RootField::new(
                "owners",
                FieldType::list(FieldType::named("Owner")),
                |_, store| {
                    Ok(Resolved::List(
                        store
                            .owners()
                            .scan_all()
                            .into_iter()
                            .map(Entity::from)
                            .collect(),
                    ))
                },
            )
            .description("A list of all owners"),
        )?;

        schema.register_root_field(
            OperationKind::Mutation,
            RootField::new("addNewPet", FieldType::named("Pet"), mutation::add_new_pet)
                .argument("name", name.clone())
                .argument("ownerId", FieldType::non_null(FieldType::Int))
                .description("Add a new pet"),
        )?;
        schema.register_root_field(
            OperationKind::Mutation,
            RootField::new(
                "addNewOwner",
                FieldType::named("Owner"),
                mutation::add_new_owner,
            )
            .argument("name", name)
            .description("Add a new owner"),
        )?;

        schema.check_references()?;
        Ok(schema)
    }

    /// Declares an object type with no fields yet.
    pub fn register_type(
        &mut self,
        name: impl Into<String>,
        description: Option<&str>,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        if self.types.contains_key(&name) {
            return Err(SchemaError::DuplicateType(name));
        }
        self.types.insert(
            name.clone(),
            ObjectType {
                name,
                description: description.map(str::to_string),
                fields: IndexMap::new(),
            },
        );
        Ok(())
    }

    /// Adds a field to a registered type.
    ///
    /// The type a relationship points to does not need to be registered yet, see
    /// [`Schema::check_references`].
    pub fn register_field(
        &mut self,
        type_name: &str,
        field: FieldDefinition,
    ) -> Result<(), SchemaError> {
        let object_type = self
            .types
            .get_mut(type_name)
            .ok_or_else(|| SchemaError::UnknownType(type_name.to_string()))?;
        if object_type.fields.contains_key(&field.name) {
            return Err(SchemaError::DuplicateField {
                type_name: type_name.to_string(),
                field: field.name,
            });
        }
        object_type.fields.insert(field.name.clone(), field);
        Ok(())
    }

    pub fn register_root_field(
        &mut self,
        kind: OperationKind,
        field: RootField,
    ) -> Result<(), SchemaError> {
        let fields = match kind {
            OperationKind::Query => &mut self.query,
            OperationKind::Mutation => &mut self.mutation,
            OperationKind::Subscription => return Err(SchemaError::UnsupportedOperation(kind)),
        };
        if fields.contains_key(&field.name) {
            return Err(SchemaError::DuplicateField {
                type_name: kind.default_type_name().to_string(),
                field: field.name,
            });
        }
        fields.insert(field.name.clone(), field);
        Ok(())
    }

    /// Checks that every type named by a field is registered.
    pub fn check_references(&self) -> Result<(), SchemaError> {
        let object_fields = self.types.values().flat_map(|object_type| {
            object_type
                .fields()
                .map(move |field| (object_type.name.as_str(), field.name.as_str(), &field.ty))
        });
        let root_fields = [OperationKind::Query, OperationKind::Mutation]
            .into_iter()
            .flat_map(move |kind| {
                self.root_fields(kind)
                    .map(move |field| (kind.default_type_name(), field.name.as_str(), &field.ty))
            });

        for (type_name, field, ty) in object_fields.chain(root_fields) {
            if let Some(target) = ty.inner_type_name()
                && !self.types.contains_key(target)
            {
                return Err(SchemaError::UnresolvedType {
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                    target: target.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    pub fn root_field(&self, kind: OperationKind, name: &str) -> Option<&RootField> {
        match kind {
            OperationKind::Query => self.query.get(name),
            OperationKind::Mutation => self.mutation.get(name),
            OperationKind::Subscription => None,
        }
    }

    pub fn root_fields(&self, kind: OperationKind) -> impl Iterator<Item = &RootField> {
        let fields = match kind {
            OperationKind::Query => Some(&self.query),
            OperationKind::Mutation => Some(&self.mutation),
            OperationKind::Subscription => None,
        };
        fields.into_iter().flat_map(|fields| fields.values())
    }

    /// Prints the schema as GraphQL SDL.
    pub fn to_sdl(&self) -> String {
        let mut sdl = String::new();
        for (kind, description) in [
            (OperationKind::Query, "Root Query"),
            (OperationKind::Mutation, "Root Mutation"),
        ] {
            let mut fields = self.root_fields(kind).peekable();
            if fields.peek().is_none() {
                continue;
            }
            write_description(&mut sdl, "", Some(description));
            let _ = writeln!(sdl, "type {} {{", kind.default_type_name());
            for field in fields {
                write_description(&mut sdl, "  ", field.description.as_deref());
                let _ = write!(sdl, "  {}", field.name);
                if !field.arguments.is_empty() {
                    let arguments: Vec<_> = field
                        .arguments
                        .iter()
                        .map(|argument| format!("{}: {}", argument.name, argument.ty))
                        .collect();
                    let _ = write!(sdl, "({})", arguments.join(", "));
                }
                let _ = writeln!(sdl, ": {}", field.ty);
            }
            sdl.push_str("}\n\n");
        }

        for object_type in self.types.values() {
            write_description(&mut sdl, "", object_type.description.as_deref());
            let _ = writeln!(sdl, "type {} {{", object_type.name);
            for field in object_type.fields() {
                write_description(&mut sdl, "  ", field.description.as_deref());
                let _ = writeln!(sdl, "  {}: {}", field.name, field.ty);
            }
            sdl.push_str("}\n\n");
        }
        sdl.truncate(sdl.trim_end().len());
        sdl.push('\n');
        sdl
    }

    /// Parses and validates the printed SDL with `apollo-compiler`.
    ///
    /// Incoming documents are validated against these definitions.
    pub fn definitions(&self) -> Result<Valid<apollo_compiler::Schema>, SpecError> {
        apollo_compiler::Schema::parse_and_validate(self.to_sdl(), "kennel.graphql")
            .map_err(|errors| SpecError::InvalidSchema(errors.into()))
    }
}

fn write_description(sdl: &mut String, indent: &str, description: Option<&str>) {
    if let Some(description) = description {
        let _ = writeln!(sdl, "{indent}\"\"\"\n{indent}{description}\n{indent}\"\"\"");
    }
}

fn optional_int(arguments: &Object, name: &str) -> Option<i64> {
    arguments.get(name).and_then(|value| value.as_graphql_int())
}
