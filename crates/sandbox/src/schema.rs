//! JSON Schema checks for capability inputs and outputs.

use serde_json::Value;

use crate::SandboxError;

/// Validate `instance` against `schema`.
///
/// A `null` schema means the capability declared none and accepts anything.
/// All violations are reported together, separated by `; `.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), SandboxError> {
    if schema.is_null() {
        return Ok(());
    }

    let validator = jsonschema::validator_for(schema)
        .map_err(|e| SandboxError::Schema(format!("invalid schema: {e}")))?;

    let violations: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SandboxError::Schema(violations.join("; ")))
    }
}
