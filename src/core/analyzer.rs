use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::differ::ChangeSet;
use super::llm::{BackendMonitor, ChangeClassification, ChangeClassifier, ChangeKind, ClassificationRequest};
use super::segmenter::heading_of;
use crate::config::AnalysisConfig;
use crate::error::RegdiffError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    BackendUnavailable,
    MalformedResponse,
    Other,
}

impl From<&RegdiffError> for FailureReason {
    fn from(error: &RegdiffError) -> Self {
        match error {
            RegdiffError::BackendUnavailable(_) => FailureReason::BackendUnavailable,
            RegdiffError::MalformedResponse(_) => FailureReason::MalformedResponse,
            _ => FailureReason::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationFailure {
    pub reason: FailureReason,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClassificationOutcome {
    Classified(ChangeClassification),
    Failed(ClassificationFailure),
}

/// One report entry: which section changed and what the classifier made of it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedChange {
    /// Heading line of the affected section
    pub section: String,

    #[serde(flatten)]
    pub outcome: ClassificationOutcome,
}

impl ClassifiedChange {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ClassificationOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub added: Vec<ClassifiedChange>,
    pub modified: Vec<ClassifiedChange>,
    pub deleted: Vec<ClassifiedChange>,
}

impl AnalysisReport {
    pub fn failures(&self) -> usize {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.deleted)
            .filter(|c| c.is_failure())
            .count()
    }
}

/// Turns a change set into a classified report
pub struct ChangeAnalyzer {
    classifier: Option<Arc<dyn ChangeClassifier>>,
    monitor: Arc<BackendMonitor>,
    max_concurrent_requests: usize,
}

impl ChangeAnalyzer {
    pub fn new(
        classifier: Option<Arc<dyn ChangeClassifier>>,
        monitor: Arc<BackendMonitor>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            classifier,
            monitor,
            max_concurrent_requests: config.max_concurrent_requests.max(1),
        }
    }

    /// Classify every change. Added sections are sent as raw text, modified
    /// sections as their unified diff; deletions get a fixed record.
    pub async fn analyze(&self, changes: &ChangeSet) -> AnalysisReport {
        let classifier = if self.monitor.is_connected().await {
            self.classifier.as_deref()
        } else {
            warn!("⚠️ Classification backend not connected, skipping LLM analysis");
            None
        };
        let permits = Semaphore::new(self.max_concurrent_requests);

        info!(
            "🔍 Classifying {} added and {} modified sections",
            changes.added.len(),
            changes.modified.len()
        );

        let added = join_all(changes.added.iter().map(|text| {
            let request = ClassificationRequest {
                kind: ChangeKind::Added,
                content: text.clone(),
            };
            classify_one(classifier, &permits, heading_of(text), request)
        }))
        .await;

        let modified = join_all(changes.modified.iter().map(|change| {
            let request = ClassificationRequest {
                kind: ChangeKind::Modified,
                content: change.diff.render(),
            };
            classify_one(classifier, &permits, heading_of(&change.new), request)
        }))
        .await;

        let deleted = changes
            .deleted
            .iter()
            .map(|text| ClassifiedChange {
                section: heading_of(text).to_string(),
                outcome: ClassificationOutcome::Classified(ChangeClassification::deleted()),
            })
            .collect();

        let report = AnalysisReport {
            generated_at: Utc::now(),
            added,
            modified,
            deleted,
        };
        info!("📊 Analysis complete with {} failed classifications", report.failures());
        report
    }
}

async fn classify_one(
    classifier: Option<&dyn ChangeClassifier>,
    permits: &Semaphore,
    section: &str,
    request: ClassificationRequest,
) -> ClassifiedChange {
    let outcome = match classifier {
        None => ClassificationOutcome::Failed(ClassificationFailure {
            reason: FailureReason::BackendUnavailable,
            error: "Classification backend not connected".to_string(),
        }),
        Some(classifier) => {
            let _permit = permits.acquire().await.ok();
            match classifier.classify(request).await {
                Ok(classification) => ClassificationOutcome::Classified(classification),
                Err(e) => {
                    warn!("Classification of '{}' failed: {}", section, e);
                    ClassificationOutcome::Failed(ClassificationFailure {
                        reason: FailureReason::from(&e),
                        error: e.to_string(),
                    })
                }
            }
        }
    };

    ClassifiedChange {
        section: section.to_string(),
        outcome,
    }
}
