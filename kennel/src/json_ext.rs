//! JSON helpers shared by the engine and the wire types.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;
pub use serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Value>;

/// Extension trait for [`serde_json_bytes::Value`].
pub(crate) trait ValueExt {
    /// Returns `true` if the value is an integer that fits a GraphQL `Int`.
    fn is_valid_int_input(&self) -> bool;

    /// Returns the value as a GraphQL `Int`, if it is one.
    fn as_graphql_int(&self) -> Option<i64>;
}

impl ValueExt for Value {
    fn is_valid_int_input(&self) -> bool {
        self.as_graphql_int().is_some()
    }

    fn as_graphql_int(&self) -> Option<i64> {
        // https://spec.graphql.org/October2021/#sec-Int
        // Floats with no fractional part, such as `3.0`, are integers too.
        let int = match self.as_i64() {
            Some(int) => int,
            None => {
                let float = self.as_f64()?;
                if !float.is_finite() || float.fract() != 0.0 {
                    return None;
                }
                i32::try_from(float as i64).ok()?.into()
            }
        };
        i32::try_from(int).is_ok().then_some(int)
    }
}

/// A path element in a GraphQL response.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index into a list.
    Index(usize),

    /// A response key in an object.
    Key(String),
}

/// A path into a GraphQL response, as found in [`crate::graphql::Error::path`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(vec![PathElement::Key(key.into())])
    }

    pub fn push(&mut self, element: PathElement) {
        self.0.push(element)
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    #[test]
    fn path_display() {
        let mut path = Path::from_key("owner");
        path.push(PathElement::Key("pets".to_string()));
        path.push(PathElement::Index(2));
        path.push(PathElement::Key("name".to_string()));
        assert_eq!(path.to_string(), "/owner/pets/2/name");
    }

    #[test]
    fn path_serializes_as_response_path() {
        let mut path = Path::from_key("pets");
        path.push(PathElement::Index(0));
        assert_eq!(
            serde_json_bytes::to_value(&path).unwrap(),
            json!(["pets", 0])
        );
        let back: Path = serde_json_bytes::from_value(json!(["pets", 0])).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn int_input_bounds() {
        assert!(json!(4).is_valid_int_input());
        assert!(json!(-12).is_valid_int_input());
        assert!(!json!(i64::from(i32::MAX) + 1).is_valid_int_input());
        assert!(!json!(1.5).is_valid_int_input());
        assert_eq!(json!(3.0).as_graphql_int(), Some(3));
        assert_eq!(json!(-7.0).as_graphql_int(), Some(-7));
        assert!(!json!(f64::from(i32::MAX) + 1.0).is_valid_int_input());
        assert!(!json!(1e300).is_valid_int_input());
        assert!(!json!("4").is_valid_int_input());
    }
}
