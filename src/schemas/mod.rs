//! JSON schemas for payloads produced by the text generator.

pub mod schema;
pub mod validation;

pub use schema::{CompletionSchema, SchemaHandle};
pub use validation::{parse_structured, validate_structured_payload};
