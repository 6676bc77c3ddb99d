//! Script execution seam.
//!
//! Script parameter definitions are run through a [`ScriptRunner`]. The engine never sandboxes
//! scripts itself; hosts supply a runner that evaluates the source against the scope it is
//! handed and nothing else.

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::resolve::evaluate_expression;

/// Runs a script body against an evaluation scope.
pub trait ScriptRunner: Send + Sync {
    fn run(&self, source: &str, scope: &Value) -> Result<Value>;
}

impl<F> ScriptRunner for F
where
    F: Fn(&str, &Value) -> Result<Value> + Send + Sync,
{
    fn run(&self, source: &str, scope: &Value) -> Result<Value> {
        self(source, scope)
    }
}

/// Minimal runner that treats the script body as a single path or literal expression.
///
/// `return variables.input;`, `variables.input` and `${variables.input}` all evaluate the same
/// path. An unresolved path is an error, matching a script that throws on an undefined lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionScriptRunner;

impl ScriptRunner for ExpressionScriptRunner {
    fn run(&self, source: &str, scope: &Value) -> Result<Value> {
        let body = source.trim().trim_end_matches(';').trim();
        let body = body.strip_prefix("return ").map(str::trim).unwrap_or(body);
        let body = body
            .strip_prefix("${")
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(body);
        evaluate_expression(body, scope).ok_or_else(|| anyhow!("{body} is not defined"))
    }
}
