use crate::{
    error::{PlannerError, Result},
    schemas::{CompletionSchema, SchemaHandle},
};
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use std::any::{type_name, TypeId};

const MAX_SCHEMA_ERRORS: usize = 3;

/// Validate a structured payload against a schema
pub fn validate_structured_payload(schema: &SchemaHandle, payload: &Value) -> Result<()> {
    let validator = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema.schema_json())
        .map_err(|err| {
            PlannerError::Validation(format!(
                "Failed to prepare `{}` schema for validation: {}",
                schema.schema_name(),
                err
            ))
        })?;

    if let Err(errors) = validator.validate(payload) {
        let mut details = Vec::new();
        let mut truncated = false;

        for (idx, error) in errors.enumerate() {
            if idx < MAX_SCHEMA_ERRORS {
                let mut path = error.instance_path.to_string();
                if path.is_empty() {
                    path = "<root>".to_string();
                }
                details.push(format!("{}: {}", path, error));
            } else {
                truncated = true;
                break;
            }
        }

        let mut detail_str = if details.is_empty() {
            "structured payload failed schema validation".to_string()
        } else {
            details.join("; ")
        };

        if truncated {
            detail_str.push_str("; additional errors truncated");
        }

        return Err(PlannerError::Validation(format!(
            "Structured payload does not match `{}` schema: {}",
            schema.schema_name(),
            detail_str
        )));
    }

    Ok(())
}

/// Validate `payload` against `T`'s schema and deserialize it, reporting the
/// failing path on mismatch.
pub fn parse_structured<T: CompletionSchema>(payload: &Value) -> Result<T> {
    let schema = T::schema();
    if schema.type_id() != TypeId::of::<T>() {
        return Err(PlannerError::Validation(format!(
            "schema `{}` does not match target type `{}`",
            schema.schema_name(),
            type_name::<T>(),
        )));
    }

    validate_structured_payload(schema, payload)?;

    let raw = payload.to_string();
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        let location = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        PlannerError::Validation(format!(
            "failed to deserialize `{}` at {}: {}",
            schema.schema_name(),
            location,
            err
        ))
    })
}
