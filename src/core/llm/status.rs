use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::classifier::ChangeClassifier;

/// Last known reachability of the classification backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    pub connected: bool,
    pub error: Option<String>,
    pub models: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl BackendStatus {
    fn disconnected(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            error: Some(error.into()),
            models: vec![],
            checked_at: Utc::now(),
        }
    }
}

/// Tracks backend health for whoever it is handed to.
///
/// Built once at startup and shared; `refresh` re-probes the backend on demand.
pub struct BackendMonitor {
    classifier: Option<Arc<dyn ChangeClassifier>>,
    status: RwLock<BackendStatus>,
}

impl BackendMonitor {
    pub fn new(classifier: Option<Arc<dyn ChangeClassifier>>) -> Self {
        Self {
            classifier,
            status: RwLock::new(BackendStatus::disconnected("Backend not checked yet")),
        }
    }

    /// Probe the backend and store the result
    pub async fn refresh(&self) -> BackendStatus {
        let status = match &self.classifier {
            None => BackendStatus::disconnected("LLM integration disabled"),
            Some(classifier) => match classifier.list_models().await {
                Ok(models) => {
                    info!(
                        "✅ {} backend reachable, {} models available",
                        classifier.provider_name(),
                        models.len()
                    );
                    BackendStatus {
                        connected: true,
                        error: None,
                        models,
                        checked_at: Utc::now(),
                    }
                }
                Err(e) => {
                    warn!("⚠️ {} backend unreachable: {}", classifier.provider_name(), e);
                    BackendStatus::disconnected(e.to_string())
                }
            },
        };

        *self.status.write().await = status.clone();
        status
    }

    pub async fn current(&self) -> BackendStatus {
        self.status.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.status.read().await.connected
    }
}
