//! Mutation root resolvers.

use crate::error::ExecutionError;
use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::json_ext::ValueExt;
use crate::spec::Resolved;
use crate::store::Owner;
use crate::store::Pet;
use crate::store::Store;

/// Appends a pet to the store. `ownerId` is not checked against the owners.
pub(crate) fn add_new_pet(arguments: &Object, store: &Store) -> Result<Resolved, ExecutionError> {
    let name = required_string(arguments, "addNewPet", "name")?;
    let owner_id = required_int(arguments, "addNewPet", "ownerId")?;

    let pet = store.pets().insert(|id| Pet { id, name, owner_id });
    tracing::debug!(id = pet.id, owner_id, "added new pet");
    Ok(Resolved::Single(Some(pet.into())))
}

/// Appends an owner to the store.
pub(crate) fn add_new_owner(
    arguments: &Object,
    store: &Store,
) -> Result<Resolved, ExecutionError> {
    let name = required_string(arguments, "addNewOwner", "name")?;

    let owner = store.owners().insert(|id| Owner { id, name });
    tracing::debug!(id = owner.id, "added new owner");
    Ok(Resolved::Single(Some(owner.into())))
}

fn required_string(
    arguments: &Object,
    field: &str,
    argument: &str,
) -> Result<String, ExecutionError> {
    match arguments.get(argument) {
        None | Some(Value::Null) => Err(missing_argument(field, argument)),
        Some(Value::String(value)) => Ok(value.as_str().to_string()),
        Some(_) => Err(type_mismatch(field, argument, "String!")),
    }
}

fn required_int(arguments: &Object, field: &str, argument: &str) -> Result<i64, ExecutionError> {
    match arguments.get(argument) {
        None | Some(Value::Null) => Err(missing_argument(field, argument)),
        Some(value) => value
            .as_graphql_int()
            .ok_or_else(|| type_mismatch(field, argument, "Int!")),
    }
}

fn missing_argument(field: &str, argument: &str) -> ExecutionError {
    ExecutionError::MissingArgument {
        field: field.to_string(),
        argument: argument.to_string(),
    }
}

fn type_mismatch(field: &str, argument: &str, expected: &str) -> ExecutionError {
    ExecutionError::TypeMismatch {
        field: field.to_string(),
        argument: argument.to_string(),
        expected: expected.to_string(),
    }
}
