use apollo_compiler::ast;
use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Value;
use crate::json_ext::ValueExt;

#[derive(Debug)]
pub(crate) struct InvalidValue;

/// A GraphQL type reference. The built-in scalars kennel uses get their own variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// An object type, by name.
    Named(String),
    List(Box<FieldType>),
    NonNull(Box<FieldType>),
    String,
    Int,
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Named(ty) => write!(f, "{ty}"),
            FieldType::List(ty) => write!(f, "[{ty}]"),
            FieldType::NonNull(ty) => write!(f, "{ty}!"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl FieldType {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn list(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn non_null(inner: FieldType) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// Checks an argument or variable value against this type.
    pub(crate) fn validate_input_value(&self, value: &Value) -> Result<(), InvalidValue> {
        match (self, value) {
            (FieldType::String, Value::String(_)) => Ok(()),
            (FieldType::Int, value) if value.is_valid_int_input() => Ok(()),
            (FieldType::Boolean, Value::Bool(_)) => Ok(()),
            (FieldType::List(inner_ty), Value::Array(vec)) => vec
                .iter()
                .try_for_each(|x| inner_ty.validate_input_value(x)),
            // A single value coerces to a list of one.
            (FieldType::List(inner_ty), val) if val != &Value::Null => {
                inner_ty.validate_input_value(val)
            }
            (FieldType::NonNull(inner_ty), value) => {
                if value.is_null() {
                    Err(InvalidValue)
                } else {
                    inner_ty.validate_input_value(value)
                }
            }
            // Nullable unless wrapped in NonNull.
            (_, Value::Null) => Ok(()),
            _ => Err(InvalidValue),
        }
    }

    /// The object type selections apply to, `Pet` for `[Pet!]`. `None` for scalars.
    pub fn inner_type_name(&self) -> Option<&str> {
        match self {
            FieldType::Named(name) => Some(name.as_str()),
            FieldType::List(inner) | FieldType::NonNull(inner) => inner.inner_type_name(),
            FieldType::String | FieldType::Int | FieldType::Boolean => None,
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, FieldType::NonNull(_))
    }
}

impl From<&'_ ast::Type> for FieldType {
    fn from(ty: &'_ ast::Type) -> Self {
        fn named(name: &ast::NamedType) -> FieldType {
            match name.as_str() {
                "String" => FieldType::String,
                "Int" => FieldType::Int,
                "Boolean" => FieldType::Boolean,
                _ => FieldType::Named(name.as_str().to_string()),
            }
        }

        match ty {
            ast::Type::Named(name) => named(name),
            ast::Type::NonNullNamed(name) => Self::non_null(named(name)),
            ast::Type::List(inner) => Self::list((&**inner).into()),
            ast::Type::NonNullList(inner) => Self::non_null(Self::list((&**inner).into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn display_matches_sdl() {
        let ty = FieldType::list(FieldType::non_null(FieldType::named("Pet")));
        assert_eq!(ty.to_string(), "[Pet!]");
        assert_eq!(FieldType::non_null(FieldType::Int).to_string(), "Int!");
        assert_eq!(ty.inner_type_name(), Some("Pet"));
        assert_eq!(FieldType::String.inner_type_name(), None);
    }

    #[test]
    fn validates_scalar_inputs() {
        let name = FieldType::non_null(FieldType::String);
        assert!(name.validate_input_value(&json!("Lucky")).is_ok());
        assert!(name.validate_input_value(&Value::Null).is_err());
        assert!(name.validate_input_value(&json!(3)).is_err());

        let id = FieldType::Int;
        assert!(id.validate_input_value(&Value::Null).is_ok());
        assert!(id.validate_input_value(&json!(3)).is_ok());
        assert!(id.validate_input_value(&json!("3")).is_err());
        assert!(id.validate_input_value(&json!(1.5)).is_err());
    }

    #[test]
    fn converts_compiler_types() {
        let ty = ast::Type::Named(apollo_compiler::name!("Int"))
            .non_null()
            .list();
        assert_eq!(
            FieldType::from(&ty),
            FieldType::list(FieldType::non_null(FieldType::Int))
        );
    }
}
