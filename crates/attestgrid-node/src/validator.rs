//! # Rules Validator
//!
//! Domain checks applied to a task output. A failed check produces a
//! rejecting `ValidatorResult`, which is signed like any other outcome.
//!
//! Supported rules (unknown keys are ignored, so rule sets can carry
//! metadata for other consumers):
//!
//! | Rule | Type | Check |
//! |---|---|---|
//! | `required_keys` | array of strings | each key is present in an object output |
//! | `max_len` | non-negative integer | canonical byte length of the output |

use attestgrid_core::{CanonicalBytes, CanonicalizationError, ValidatorResult};
use serde_json::Value;

use crate::node::TaskOutput;

/// Applies a rule set to task outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesValidator;

impl RulesValidator {
    /// Check `output` against `rules`.
    ///
    /// Fails only if `output` cannot be canonicalized for the `max_len`
    /// check. Malformed rules are reported as validator errors.
    pub fn validate(output: &Value, rules: &Value) -> Result<ValidatorResult, CanonicalizationError> {
        let Some(rules) = rules.as_object() else {
            return Ok(if rules.is_null() {
                ValidatorResult::pass()
            } else {
                ValidatorResult::reject(vec!["Invalid rules: expected a JSON object".to_string()])
            });
        };

        let mut errors = Vec::new();

        if let Some(required) = rules.get("required_keys") {
            check_required_keys(output, required, &mut errors);
        }

        if let Some(max_len) = rules.get("max_len") {
            match max_len.as_u64() {
                Some(max) => {
                    let len = CanonicalBytes::new(output)?.len() as u64;
                    if len > max {
                        errors.push(format!("Output length {len} exceeds max_len {max}"));
                    }
                }
                None => errors.push(format!(
                    "Invalid rule max_len: expected a non-negative integer, got {max_len}"
                )),
            }
        }

        Ok(if errors.is_empty() {
            ValidatorResult::pass()
        } else {
            ValidatorResult::reject(errors)
        })
    }
}

fn check_required_keys(output: &Value, required: &Value, errors: &mut Vec<String>) {
    let Some(keys) = required.as_array() else {
        errors.push("Invalid rule required_keys: expected an array of strings".to_string());
        return;
    };
    // Non-object outputs have no keys to check.
    let Some(object) = output.as_object() else {
        return;
    };
    for key in keys {
        match key.as_str() {
            Some(k) if !object.contains_key(k) => errors.push(format!("Missing key: {k}")),
            Some(_) => {}
            None => errors.push(format!(
                "Invalid rule required_keys: entry {key} is not a string"
            )),
        }
    }
}

/// Identity task: the output is the input, validated against the rules.
pub fn passthrough_task(
    input: &Value,
    rules: &Value,
) -> Result<TaskOutput<Value>, CanonicalizationError> {
    let validator = RulesValidator::validate(input, rules)?;
    Ok(TaskOutput {
        output: input.clone(),
        validator,
    })
}
