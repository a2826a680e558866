//! Gateway and connection condition evaluation.

use orrery_workitem::DataMap;
use serde_json::Value;

/// Failure to evaluate a connection condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// The expression could not be parsed.
    #[error("cannot parse condition `{condition}`: {reason}")]
    Parse {
        /// The expression.
        condition: String,
        /// Parser message.
        reason: String,
    },

    /// The evaluator failed at runtime.
    #[error("condition `{condition}` failed: {reason}")]
    Evaluation {
        /// The expression.
        condition: String,
        /// Cause.
        reason: String,
    },
}

/// Decides whether a conditional connection may be taken.
///
/// Rule languages live outside the engine; hosts plug theirs in here.
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate `condition` against the variables visible from the leaving node.
    fn evaluate(&self, condition: &str, variables: &DataMap) -> Result<bool, ConditionError>;
}

/// Minimal evaluator used when the host supplies none.
///
/// Accepts `true`, `false`, `name` (truthiness), `!name`,
/// `name == <json>` and `name != <json>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableConditionEvaluator;

impl ConditionEvaluator for VariableConditionEvaluator {
    fn evaluate(&self, condition: &str, variables: &DataMap) -> Result<bool, ConditionError> {
        let expr = condition.trim();
        match expr {
            "true" => return Ok(true),
            "false" => return Ok(false),
            "" => {
                return Err(ConditionError::Parse {
                    condition: condition.to_owned(),
                    reason: "empty expression".to_owned(),
                });
            }
            _ => {}
        }

        for (op, negate) in [("!=", true), ("==", false)] {
            if let Some((lhs, rhs)) = expr.split_once(op) {
                let name = variable_name(lhs, condition)?;
                let expected: Value =
                    serde_json::from_str(rhs.trim()).map_err(|e| ConditionError::Parse {
                        condition: condition.to_owned(),
                        reason: e.to_string(),
                    })?;
                let actual = variables.get(name).unwrap_or(&Value::Null);
                return Ok((*actual == expected) != negate);
            }
        }

        match expr.strip_prefix('!') {
            Some(rest) => Ok(!truthy(variables.get(variable_name(rest, condition)?))),
            None => Ok(truthy(variables.get(variable_name(expr, condition)?))),
        }
    }
}

fn variable_name<'a>(raw: &'a str, condition: &str) -> Result<&'a str, ConditionError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ConditionError::Parse {
            condition: condition.to_owned(),
            reason: format!("`{name}` is not a variable name"),
        });
    }
    Ok(name)
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}
