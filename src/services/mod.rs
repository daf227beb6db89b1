pub mod json_extract;
pub mod llm_client;

pub use json_extract::extract_json_object;
pub use llm_client::{ChatCompletionRequest, ChatGenerator, GenerateFuture, TextGenerator};
