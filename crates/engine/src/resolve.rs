//! # Expression Resolution
//!
//! Declarations reference the activation scope through `${ ... }` expressions. Resolution is
//! delegated to an [`ExpressionResolver`] so hosts can plug in their own expression language;
//! [`TemplateResolver`] is the default implementation.
//!
//! ## Template Syntax
//!
//! - `${variables.input}` - dot path into the scope
//! - `${result[0].statusCode}` - array index, negative indices count from the end
//! - `${true}`, `${null}`, `${42}`, `${'text'}` - literals
//!
//! A string that is exactly one expression resolves to the raw JSON value, so `${result}` keeps
//! arrays and objects intact. Expressions embedded in surrounding text are interpolated as
//! strings. Text without any `${` is returned verbatim.
//!
//! ## Usage
//!
//! ```rust
//! use bpmn_io_engine::resolve::{ExpressionResolver, TemplateResolver};
//! use serde_json::json;
//!
//! let scope = json!({"variables": {"input": 1}, "result": [[3, "ok"]]});
//! let resolver = TemplateResolver;
//!
//! assert_eq!(resolver.resolve("${variables.input}", &scope)?, Some(json!(1)));
//! assert_eq!(resolver.resolve("${result[-1][1]}", &scope)?, Some(json!("ok")));
//! assert_eq!(resolver.resolve("input is ${variables.input}", &scope)?, Some(json!("input is 1")));
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use serde_json::Value;

/// Resolves an expression string against an evaluation scope.
///
/// `Ok(None)` means the expression resolved to nothing (an undefined value); callers omit such
/// values instead of treating them as errors.
pub trait ExpressionResolver: Send + Sync {
    fn resolve(&self, expression: &str, scope: &Value) -> Result<Option<Value>>;
}

/// Default `${ ... }` resolver over JSON scopes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateResolver;

impl ExpressionResolver for TemplateResolver {
    fn resolve(&self, expression: &str, scope: &Value) -> Result<Option<Value>> {
        if let Some(inner) = single_expression(expression) {
            return Ok(evaluate_expression(inner, scope));
        }
        if !expression.contains("${") {
            return Ok(Some(Value::String(expression.to_string())));
        }
        Ok(Some(Value::String(interpolate_string(expression, scope))))
    }
}

/// Returns the inner expression when `template` is exactly one `${ ... }` block.
fn single_expression(template: &str) -> Option<&str> {
    let trimmed = template.trim();
    let inner = trimmed.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains("${") || inner.contains('}') {
        return None;
    }
    Some(inner.trim())
}

/// Evaluates a bare expression: a literal or a scope path.
pub(crate) fn evaluate_expression(expression: &str, scope: &Value) -> Option<Value> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(literal) = parse_literal(trimmed) {
        return Some(literal);
    }
    select_path(scope, trimmed)
}

fn parse_literal(expression: &str) -> Option<Value> {
    match expression {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    for quote in ['\'', '"'] {
        if expression.len() >= 2 && expression.starts_with(quote) && expression.ends_with(quote) {
            return Some(Value::String(expression[1..expression.len() - 1].to_string()));
        }
    }
    let starts_numeric = expression
        .chars()
        .next()
        .is_some_and(|character| character.is_ascii_digit() || character == '-');
    if starts_numeric && let Ok(number) = serde_json::from_str::<serde_json::Number>(expression) {
        return Some(Value::Number(number));
    }
    None
}

/// Interpolates every `${ ... }` block in `input_string`.
///
/// Unresolved expressions render as an empty string. A block without a closing `}` is kept
/// as-is together with the rest of the string.
fn interpolate_string(input_string: &str, scope: &Value) -> String {
    let mut output_string = String::new();
    let mut remaining_string = input_string;

    while let Some(template_start) = remaining_string.find("${") {
        let (string_before_template, string_after_template) = remaining_string.split_at(template_start);
        output_string.push_str(string_before_template);

        if let Some(template_end_index) = string_after_template.find('}') {
            let template_expression = &string_after_template[2..template_end_index];
            let resolved_value = evaluate_expression(template_expression, scope)
                .map(|value| format_json_value(&value))
                .unwrap_or_default();
            output_string.push_str(&resolved_value);
            remaining_string = &string_after_template[template_end_index + 1..];
        } else {
            output_string.push_str(string_after_template);
            return output_string;
        }
    }

    output_string.push_str(remaining_string);
    output_string
}

/// Select a nested JSON value by a dot path with optional indices.
///
/// Supports segments like `a`, `a.b`, `a[0].b[1]` and `a[-1]`. A leading index applies to
/// the root (`[0].id`). Returns `None` when any segment is missing or applied to the wrong
/// JSON type.
pub fn select_path(value: &Value, path: &str) -> Option<Value> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Some(value.clone());
    }

    let mut current = value;
    for segment in trimmed.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, indices) = split_indices(segment)?;
        if !key.is_empty() {
            current = current.get(key)?;
        }
        for index in indices {
            let array = current.as_array()?;
            let position = if index < 0 {
                array.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                index as usize
            };
            current = array.get(position)?;
        }
    }
    Some(current.clone())
}

fn split_indices(segment: &str) -> Option<(&str, Vec<i64>)> {
    let key_end = segment.find('[').unwrap_or(segment.len());
    let key = &segment[..key_end];
    let mut indices = Vec::new();
    let mut rest = &segment[key_end..];
    while let Some(after_open) = rest.strip_prefix('[') {
        let close = after_open.find(']')?;
        let index = after_open[..close].trim().parse::<i64>().ok()?;
        indices.push(index);
        rest = &after_open[close + 1..];
    }
    if !rest.is_empty() {
        return None;
    }
    Some((key, indices))
}

/// Formats a JSON value for string interpolation.
///
/// Strings are returned as-is, null renders empty and composite values render as JSON.
pub fn format_json_value(value: &Value) -> String {
    match value {
        Value::String(string_value) => string_value.clone(),
        Value::Number(number_value) => number_value.to_string(),
        Value::Bool(boolean_value) => boolean_value.to_string(),
        Value::Null => String::new(),
        other_value => other_value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(expression: &str, scope: &Value) -> Option<Value> {
        TemplateResolver.resolve(expression, scope).expect("resolve")
    }

    #[test]
    fn single_expression_returns_raw_value() {
        let scope = json!({"result": [1, "success"], "variables": {"user": {"name": "Ada"}}});
        assert_eq!(resolve("${result}", &scope), Some(json!([1, "success"])));
        assert_eq!(resolve("${variables.user}", &scope), Some(json!({"name": "Ada"})));
        assert_eq!(resolve(" ${ variables.user.name } ", &scope), Some(json!("Ada")));
    }

    #[test]
    fn missing_path_is_undefined() {
        let scope = json!({"variables": {}});
        assert_eq!(resolve("${variables.missing}", &scope), None);
        assert_eq!(resolve("${nothing.here}", &scope), None);
        assert_eq!(resolve("${}", &scope), None);
    }

    #[test]
    fn literals_resolve_without_scope() {
        let scope = json!({});
        assert_eq!(resolve("${true}", &scope), Some(json!(true)));
        assert_eq!(resolve("${false}", &scope), Some(json!(false)));
        assert_eq!(resolve("${null}", &scope), Some(Value::Null));
        assert_eq!(resolve("${42}", &scope), Some(json!(42)));
        assert_eq!(resolve("${-1.5}", &scope), Some(json!(-1.5)));
        assert_eq!(resolve("${'quoted'}", &scope), Some(json!("quoted")));
    }

    #[test]
    fn plain_text_is_returned_verbatim() {
        assert_eq!(resolve("Surname?", &json!({})), Some(json!("Surname?")));
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let scope = json!({"result": [[1], [3], [6], [13]]});
        assert_eq!(resolve("${result[-1][0]}", &scope), Some(json!(13)));
        assert_eq!(resolve("${result[0][0]}", &scope), Some(json!(1)));
        assert_eq!(resolve("${result[-5]}", &scope), None);
        assert_eq!(resolve("${result[9]}", &scope), None);
    }

    #[test]
    fn index_then_field_navigation() {
        let scope = json!({"result": [{"statusCode": 200}, {"statusCode": 404}]});
        assert_eq!(resolve("${result[0].statusCode}", &scope), Some(json!(200)));
        assert_eq!(resolve("${result[-1].statusCode}", &scope), Some(json!(404)));
    }

    #[test]
    fn mixed_text_interpolates() {
        let scope = json!({"variables": {"app": "myapp", "count": 2}});
        assert_eq!(resolve("Deploy ${variables.app} x${variables.count}", &scope), Some(json!("Deploy myapp x2")));
        assert_eq!(resolve("missing: [${variables.nope}]", &scope), Some(json!("missing: []")));
    }

    #[test]
    fn malformed_template_preserves_text() {
        let scope = json!({"variables": {"name": "x"}});
        assert_eq!(resolve("Value: ${variables.name", &scope), Some(json!("Value: ${variables.name")));
    }

    #[test]
    fn select_path_rejects_wrong_types() {
        let value = json!({"items": {"id": 1}});
        assert_eq!(select_path(&value, "items[0]"), None);
        assert_eq!(select_path(&value, "items.id"), Some(json!(1)));
        assert_eq!(select_path(&value, "items[x]"), None);
    }

    #[test]
    fn format_json_value_types() {
        assert_eq!(format_json_value(&json!("hello")), "hello");
        assert_eq!(format_json_value(&json!(42)), "42");
        assert_eq!(format_json_value(&json!(true)), "true");
        assert_eq!(format_json_value(&json!(null)), "");
        assert_eq!(format_json_value(&json!({"key": "value"})), r#"{"key":"value"}"#);
    }
}
