use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Kind of section change being classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Added => "Added",
            ChangeKind::Modified => "Modified",
            ChangeKind::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single change handed to the classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub kind: ChangeKind,

    /// Raw section text for additions, rendered unified diff for modifications
    pub content: String,
}

/// The classifier's verdict on one change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeClassification {
    /// One-sentence summary of the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<String>,

    /// New Requirement, Clarification, Deletion, Minor Edit, ...
    pub change_type: String,

    /// Likely impact on regulated practice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_impact: Option<String>,
}

impl ChangeClassification {
    /// Fixed record used for deleted sections, which are never sent to the backend
    pub fn deleted() -> Self {
        Self {
            change_summary: None,
            change_type: ChangeKind::Deleted.label().to_string(),
            potential_impact: None,
        }
    }
}

/// Backend that can describe a regulatory change in natural language
#[async_trait::async_trait]
pub trait ChangeClassifier: Send + Sync {
    /// Classify one change
    async fn classify(&self, request: ClassificationRequest) -> Result<ChangeClassification>;

    /// Get the provider name (e.g., "Ollama", "OpenAI")
    fn provider_name(&self) -> &str;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Models the backend exposes; an error means the backend is unreachable
    async fn list_models(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deleted_record_serializes_minimal() {
        let json = serde_json::to_value(ChangeClassification::deleted()).unwrap();
        assert_eq!(json, serde_json::json!({ "change_type": "Deleted" }));
    }

    #[test]
    fn test_parses_backend_shape() {
        let parsed: ChangeClassification = serde_json::from_str(
            r#"{"change_summary": "Adds a limit.", "change_type": "New Requirement", "potential_impact": "Sites must track counts."}"#,
        )
        .unwrap();
        assert_eq!(parsed.change_type, "New Requirement");
        assert_eq!(parsed.change_summary.as_deref(), Some("Adds a limit."));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ChangeKind::Added.to_string(), "Added");
        assert_eq!(ChangeKind::Modified.label(), "Modified");
    }
}
