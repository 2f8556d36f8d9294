use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_db_name() -> String {
    "default".to_string()
}

/// Lifecycle state of one submission. Transitions exactly once from
/// `Pending` to a terminal state and never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// The lifecycle record tracking one query's asynchronous execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

impl Task {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            cached: false,
            execution_time: None,
        }
    }
}

// --- Query endpoints ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Option<serde_json::Map<String, Value>>,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    /// Custom cache TTL in seconds; zero or negative means "do not cache".
    #[serde(default)]
    pub cache_ttl: Option<i64>,
    /// Skip the cache lookup and overwrite any cached entry.
    #[serde(default)]
    pub force_refresh: bool,
}

// --- Dialect tool endpoints ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertQueryRequest {
    pub origin_dialect: String,
    pub target_dialect: String,
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertQueryResponse {
    pub converted_query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeQueryRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeQueryResponse {
    pub optimized_query: String,
}

// --- Extension endpoints ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadExtensionRequest {
    pub extension_name: String,
    pub db_name: String,
    #[serde(default)]
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub name: String,
    pub path: String,
    pub loaded_in_dbs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionListResponse {
    pub extensions: Vec<ExtensionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbExtensionsResponse {
    pub db_name: String,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "SELECT 1"}"#).unwrap();
        assert_eq!(req.db_name, "default");
        assert!(req.params.is_none());
        assert!(req.cache_ttl.is_none());
        assert!(!req.force_refresh);
    }

    #[test]
    fn test_task_status_serialization() {
        let task = Task::pending("abc");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "pending");
        // Pending tasks carry no result/error fields at all
        assert!(json.get("result").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
    }
}
