use std::time::Duration;
use thiserror::Error;

/// Hard failures of a planning run.
///
/// Every variant is `Clone` so that a single failed build can be delivered
/// verbatim to the lock holder and to every caller that joined it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Orchestration timed out after {}s", .0.as_secs())]
    OrchestrationTimeout(Duration),

    #[error("Text generation error: {0}")]
    Generation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Planning task aborted: {0}")]
    TaskAborted(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PlannerError>;

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::Serialization(err.to_string())
    }
}

impl PlannerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlannerError::OrchestrationTimeout(_)
                | PlannerError::RateLimit { .. }
                | PlannerError::Generation(_)
                | PlannerError::TaskAborted(_)
        )
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            PlannerError::Config(_) => "CONFIG_ERROR",
            PlannerError::InvalidRequest(_) => "INVALID_REQUEST",
            PlannerError::Assembly(_) => "ASSEMBLY_ERROR",
            PlannerError::OrchestrationTimeout(_) => "ORCHESTRATION_TIMEOUT",
            PlannerError::Generation(_) => "GENERATION_ERROR",
            PlannerError::Validation(_) => "VALIDATION_ERROR",
            PlannerError::Serialization(_) => "SERIALIZATION_ERROR",
            PlannerError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            PlannerError::TaskAborted(_) => "TASK_ABORTED",
            PlannerError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Convert to a structured error payload
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "retryable": self.is_retryable()
            }
        })
    }
}

/// The only way itinerary assembly can fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("no usable activities or restaurants for {destination}")]
    NoUsableContent { destination: String },
}

/// Soft failure of a single external data source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("{source_name} timed out after {}ms", .after.as_millis())]
    Timeout {
        source_name: &'static str,
        after: Duration,
    },

    #[error("{source_name} request failed: {message}")]
    Http {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name} returned HTTP {status}")]
    Status {
        source_name: &'static str,
        status: u16,
    },

    #[error("{source_name} response could not be parsed: {message}")]
    Parse {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name} has no data for {query}")]
    NotFound {
        source_name: &'static str,
        query: String,
    },
}

impl SourceError {
    pub fn source_name(&self) -> &'static str {
        match self {
            SourceError::Timeout { source_name, .. }
            | SourceError::Http { source_name, .. }
            | SourceError::Status { source_name, .. }
            | SourceError::Parse { source_name, .. }
            | SourceError::NotFound { source_name, .. } => source_name,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SourceError::Timeout { .. })
    }
}

/// Primary cache store failure. Absorbed by the cache and never returned to callers.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Connection(err.to_string())
    }
}
