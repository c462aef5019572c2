use serde::{Deserialize, Serialize};

/// Reply to `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
}

/// Reply to `GET /files`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesResponse {
    pub files: Vec<String>,
}

/// Reply to `GET /columns?file=<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsResponse {
    pub columns: Vec<String>,
}

/// Body of `POST /partition`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRequest {
    pub file: String,
    #[serde(rename = "numGroups")]
    pub num_groups: u64,
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Reply to `POST /partition`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl PartitionResponse {
    pub fn completed(log: String) -> Self {
        PartitionResponse {
            success: true,
            message: Some("Partitioning completed.".to_string()),
            log: Some(log),
        }
    }

    pub fn failed(message: String) -> Self {
        PartitionResponse {
            success: false,
            message: Some(message),
            log: None,
        }
    }

    /// Text shown in the log area: the job log when there is one, the message otherwise.
    pub fn display_text(&self) -> &str {
        self.log
            .as_deref()
            .filter(|log| !log.is_empty())
            .or(self.message.as_deref())
            .unwrap_or("")
    }
}
