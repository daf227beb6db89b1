use schemars::schema::RootSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{any::TypeId, sync::Arc};

/// Cached JSON schema handle associated with a generated payload type.
#[derive(Clone, Debug)]
pub struct SchemaHandle {
    schema_name: &'static str,
    type_id: TypeId,
    schema_json: Arc<Value>,
}

impl SchemaHandle {
    pub fn from_root_schema<T: 'static>(schema_name: &'static str, root: RootSchema) -> Self {
        // RootSchema is plain data; serialization only fails on non-string map keys.
        let schema_json = serde_json::to_value(root).unwrap_or(Value::Bool(true));

        Self {
            schema_name,
            type_id: TypeId::of::<T>(),
            schema_json: Arc::new(schema_json),
        }
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn schema_json(&self) -> &Value {
        self.schema_json.as_ref()
    }
}

/// A payload type the text generator is asked to produce.
pub trait CompletionSchema: DeserializeOwned + Send + Sync + 'static {
    fn schema() -> &'static SchemaHandle;
}

/// Implement [`CompletionSchema`] for a `JsonSchema` type, caching the schema
/// in a per-type static.
#[macro_export]
macro_rules! completion_schema {
    ($ty:ty, $name:literal) => {
        impl $crate::schemas::CompletionSchema for $ty {
            fn schema() -> &'static $crate::schemas::SchemaHandle {
                static HANDLE: std::sync::OnceLock<$crate::schemas::SchemaHandle> =
                    std::sync::OnceLock::new();
                HANDLE.get_or_init(|| {
                    $crate::schemas::SchemaHandle::from_root_schema::<$ty>(
                        $name,
                        schemars::schema_for!($ty),
                    )
                })
            }
        }
    };
}
