//! Declared process variables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The value type a declared variable accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    /// Any JSON value.
    #[default]
    Any,
    /// `true` / `false`.
    Boolean,
    /// Whole numbers.
    Integer,
    /// Any JSON number.
    Number,
    /// Strings.
    String,
    /// JSON objects.
    Object,
    /// JSON arrays.
    Array,
}

impl VariableType {
    /// Returns `true` if `value` may be stored in a variable of this type.
    ///
    /// `null` is accepted by every type and means "unset".
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::Any => true,
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Boolean => write!(f, "boolean"),
            Self::Integer => write!(f, "integer"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Object => write!(f, "object"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// A variable declared on a process or sub-process scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    /// Variable name, unique within its scope.
    pub name: String,
    /// Accepted value type.
    #[serde(default, rename = "type")]
    pub var_type: VariableType,
    /// Value bound when the scope opens.
    #[serde(default)]
    pub default: Option<Value>,
}

impl VariableDeclaration {
    /// Declare an untyped variable without a default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_type: VariableType::Any,
            default: None,
        }
    }

    /// Restrict the accepted type.
    #[must_use]
    pub fn with_type(mut self, var_type: VariableType) -> Self {
        self.var_type = var_type;
        self
    }

    /// Bind a default when the scope opens.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(VariableType::Boolean, json!(true), true)]
    #[case(VariableType::Boolean, json!("true"), false)]
    #[case(VariableType::Integer, json!(3), true)]
    #[case(VariableType::Integer, json!(3.5), false)]
    #[case(VariableType::Number, json!(3.5), true)]
    #[case(VariableType::String, json!("x"), true)]
    #[case(VariableType::Object, json!([]), false)]
    #[case(VariableType::Array, json!([1]), true)]
    #[case(VariableType::Any, json!({"a": 1}), true)]
    #[case(VariableType::Integer, Value::Null, true)]
    fn accepts_matching_values(
        #[case] var_type: VariableType,
        #[case] value: Value,
        #[case] expected: bool,
    ) {
        assert_eq!(var_type.accepts(&value), expected);
    }

    #[test]
    fn declaration_uses_type_field_name() {
        let decl: VariableDeclaration =
            serde_json::from_str(r#"{"name": "isChecked", "type": "string", "default": "false"}"#)
                .unwrap();
        assert_eq!(decl.var_type, VariableType::String);
        assert_eq!(decl.default, Some(json!("false")));
    }
}
