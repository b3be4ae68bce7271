//! JSON output types for CLI commands

use serde::{Deserialize, Serialize};

use crate::error::ArchitectumError;

/// Current JSON output schema version
pub const ARCHITECTUM_JSON_SCHEMA_VERSION: &str = "1.0.0";

/// Wrapper for all JSON responses
///
/// Every JSON response includes schema_version and execution_id for
/// parsing stability and traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    /// Schema version for parsing stability
    pub schema_version: String,
    /// Unique execution ID for this run
    pub execution_id: String,
    pub tool: String,
    pub timestamp: String,
    /// Response data
    pub data: T,
    /// Whether the response is partial (cancelled sync, failed files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
}

impl<T> JsonResponse<T> {
    pub fn new(data: T, execution_id: &str) -> Self {
        JsonResponse {
            schema_version: ARCHITECTUM_JSON_SCHEMA_VERSION.to_string(),
            execution_id: execution_id.to_string(),
            tool: "architectum".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            data,
            partial: None,
        }
    }

    /// Mark the response as partial
    pub fn with_partial(mut self, partial: bool) -> Self {
        self.partial = Some(partial);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Taxonomy kind, e.g. `validation`
    pub kind: String,
    /// Stable code, e.g. `ARC-VAL-001`
    pub code: String,
    pub message: String,
}

/// `{ "error": { "kind", "code", "message" } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl From<&ArchitectumError> for ErrorResponse {
    fn from(err: &ArchitectumError) -> Self {
        let kind = err.kind();
        ErrorResponse {
            error: ErrorBody {
                kind: kind.as_str().to_string(),
                code: kind.code().to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Generate a unique execution ID for this run
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Output JSON to stdout
pub fn output_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    println!("{}", json);
    Ok(())
}
