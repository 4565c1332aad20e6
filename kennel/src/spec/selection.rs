use apollo_compiler::ExecutableDocument;
use apollo_compiler::ast;
use apollo_compiler::executable;
use serde::Deserialize;
use serde::Serialize;

use crate::json_ext::Object;
use crate::json_ext::Value;
use crate::spec::SpecError;
use crate::spec::TYPENAME;

/// A field of a selection tree.
///
/// Fragments are already flattened into plain fields and `@skip`/`@include` are
/// already applied, so a selection tree is exactly what the client asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Object::is_empty", default)]
    pub arguments: Object,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub selection_set: Option<Vec<Selection>>,
}

impl Selection {
    /// A leaf field.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: Object::new(),
            selection_set: None,
        }
    }

    /// A field with a nested selection.
    pub fn object(name: impl Into<String>, selection_set: Vec<Selection>) -> Self {
        Self {
            selection_set: Some(selection_set),
            ..Self::field(name)
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_argument(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.arguments.insert(name, value.into());
        self
    }

    /// The key of this field in the response: the alias if there is one, the name otherwise.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn is_typename_field(&self) -> bool {
        self.name == TYPENAME
    }

    /// Converts an executable selection set into a selection tree.
    ///
    /// `variables` must already hold the coerced variable values of the operation.
    pub(crate) fn from_selection_set(
        selection_set: &executable::SelectionSet,
        document: &ExecutableDocument,
        variables: &Object,
    ) -> Result<Vec<Self>, SpecError> {
        let mut selections = Vec::new();
        collect_fields(selection_set, document, variables, 0, &mut selections)?;
        Ok(selections)
    }

    /// Adds `other` to `self`, both having the same response key.
    fn merge(&mut self, other: Selection) {
        let Some(others) = other.selection_set else {
            return;
        };
        match &mut self.selection_set {
            Some(selections) => {
                for other in others {
                    push_merged(selections, other);
                }
            }
            None => self.selection_set = Some(others),
        }
    }
}

fn push_merged(selections: &mut Vec<Selection>, selection: Selection) {
    match selections
        .iter_mut()
        .find(|existing| existing.response_key() == selection.response_key())
    {
        Some(existing) => existing.merge(selection),
        None => selections.push(selection),
    }
}

fn collect_fields(
    selection_set: &executable::SelectionSet,
    document: &ExecutableDocument,
    variables: &Object,
    mut count: usize,
    selections: &mut Vec<Selection>,
) -> Result<(), SpecError> {
    // Deeper than any owners/pets document needs, shallow enough for the stack.
    const RECURSION_LIMIT: usize = 512;
    if count > RECURSION_LIMIT {
        tracing::error!(limit = RECURSION_LIMIT, "selection set nesting is too deep");
        return Err(SpecError::RecursionLimitExceeded);
    }
    count += 1;

    for selection in &selection_set.selections {
        match selection {
            executable::Selection::Field(field) => {
                if IncludeSkip::parse(&field.directives).should_skip(variables) {
                    continue;
                }
                let selection_set = if field.selection_set.selections.is_empty() {
                    None
                } else {
                    let mut nested = Vec::new();
                    collect_fields(&field.selection_set, document, variables, count, &mut nested)?;
                    Some(nested)
                };
                let arguments = field
                    .arguments
                    .iter()
                    .map(|argument| {
                        (
                            argument.name.as_str().into(),
                            value_from_ast(&argument.value, variables),
                        )
                    })
                    .collect();

                push_merged(
                    selections,
                    Selection {
                        name: field.name.as_str().to_string(),
                        alias: field.alias.as_ref().map(|alias| alias.as_str().to_string()),
                        arguments,
                        selection_set,
                    },
                );
            }
            executable::Selection::InlineFragment(inline_fragment) => {
                if IncludeSkip::parse(&inline_fragment.directives).should_skip(variables) {
                    continue;
                }
                collect_fields(
                    &inline_fragment.selection_set,
                    document,
                    variables,
                    count,
                    selections,
                )?;
            }
            executable::Selection::FragmentSpread(fragment_spread) => {
                if IncludeSkip::parse(&fragment_spread.directives).should_skip(variables) {
                    continue;
                }
                if let Some(fragment) = document.fragments.get(&fragment_spread.fragment_name) {
                    collect_fields(
                        &fragment.selection_set,
                        document,
                        variables,
                        count,
                        selections,
                    )?;
                }
            }
        }
    }
    Ok(())
}

/// Converts a GraphQL input value to JSON, substituting variables.
pub(crate) fn value_from_ast(value: &ast::Value, variables: &Object) -> Value {
    match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => name.as_str().into(),
        ast::Value::Variable(name) => variables
            .get(name.as_str())
            .cloned()
            .unwrap_or(Value::Null),
        ast::Value::String(string) => string.as_str().into(),
        ast::Value::Float(float) => float
            .as_str()
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        ast::Value::Int(int) => int
            .as_str()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        ast::Value::Boolean(boolean) => Value::Bool(*boolean),
        ast::Value::List(values) => Value::Array(
            values
                .iter()
                .map(|value| value_from_ast(value, variables))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.as_str().into(), value_from_ast(value, variables)))
                .collect(),
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) struct IncludeSkip {
    include: Condition,
    skip: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub(crate) enum Condition {
    Yes,
    No,
    Variable(String),
}

impl IncludeSkip {
    pub(crate) fn parse(directives: &executable::DirectiveList) -> Self {
        let include = directives
            .get("include")
            .and_then(|directive| Condition::parse(directive));
        let skip = directives
            .get("skip")
            .and_then(|directive| Condition::parse(directive));
        Self {
            include: include.unwrap_or(Condition::Yes),
            skip: skip.unwrap_or(Condition::No),
        }
    }

    pub(crate) fn should_skip(&self, variables: &Object) -> bool {
        // Variables are coerced already, a missing one means its default was null.
        self.skip.eval(variables).unwrap_or(false) || !self.include.eval(variables).unwrap_or(true)
    }
}

impl Condition {
    pub(crate) fn parse(directive: &executable::Directive) -> Option<Self> {
        match directive.specified_argument_by_name("if")?.as_ref() {
            ast::Value::Boolean(true) => Some(Condition::Yes),
            ast::Value::Boolean(false) => Some(Condition::No),
            ast::Value::Variable(variable) => {
                Some(Condition::Variable(variable.as_str().to_owned()))
            }
            _ => None,
        }
    }

    pub(crate) fn eval(&self, variables: &Object) -> Option<bool> {
        match self {
            Condition::Yes => Some(true),
            Condition::No => Some(false),
            Condition::Variable(variable_name) => variables
                .get(variable_name.as_str())
                .and_then(|v| v.as_bool()),
        }
    }
}
