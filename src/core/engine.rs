use anyhow::Result;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RegdiffError;
use super::{
    create_classifier, heading_of, AnalysisReport, BackendMonitor, ChangeAnalyzer, ChangeClassifier,
    ChangeSet, ContentDiffer, JobHandle, JobId, JobQueue, JobStatus,
};

/// Main orchestration engine for regdiff
pub struct Engine {
    config: Config,
    differ: Arc<ContentDiffer>,
    monitor: Arc<BackendMonitor>,
    analyzer: Arc<ChangeAnalyzer>,
    jobs: JobQueue<Arc<AnalysisReport>>,
}

impl Engine {
    /// Create a new engine from the configuration file (or defaults)
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        // Initialize the classifier if enabled
        let classifier: Option<Arc<dyn ChangeClassifier>> = if config.llm.enabled {
            match create_classifier(&config) {
                Ok(classifier) => {
                    info!("✅ LLM classification enabled: {} ({})", classifier.provider_name(), classifier.model_name());
                    Some(Arc::from(classifier))
                }
                Err(e) => {
                    warn!("⚠️ Failed to initialize LLM classifier: {}", e);
                    warn!("Continuing without LLM classification");
                    None
                }
            }
        } else {
            debug!("LLM classification disabled");
            None
        };

        Self::with_classifier(config, classifier).await
    }

    /// Build an engine around an already constructed classifier
    pub async fn with_classifier(config: Config, classifier: Option<Arc<dyn ChangeClassifier>>) -> Result<Self> {
        let differ = Arc::new(ContentDiffer::new(&config)?);

        let monitor = Arc::new(BackendMonitor::new(classifier.clone()));
        monitor.refresh().await;

        let analyzer = Arc::new(ChangeAnalyzer::new(classifier, Arc::clone(&monitor), &config.analysis));
        let jobs = JobQueue::new(config.analysis.workers, config.analysis.retained_jobs);

        Ok(Self {
            config,
            differ,
            monitor,
            analyzer,
            jobs,
        })
    }

    /// Section-level diff of two revisions
    pub fn compare_documents(&self, old_text: &str, new_text: &str) -> ChangeSet {
        self.differ.diff(old_text, new_text)
    }

    /// Queue a diff-then-classify job. Fails straight away when the backend is down.
    pub async fn submit_analysis(
        &self,
        old_text: String,
        new_text: String,
    ) -> std::result::Result<JobHandle<Arc<AnalysisReport>>, RegdiffError> {
        if !self.monitor.is_connected().await {
            let status = self.monitor.current().await;
            return Err(RegdiffError::BackendUnavailable(
                status.error.unwrap_or_else(|| "backend not connected".to_string()),
            ));
        }

        let differ = Arc::clone(&self.differ);
        let analyzer = Arc::clone(&self.analyzer);
        let handle = self
            .jobs
            .submit(async move {
                let changes = tokio::task::spawn_blocking(move || differ.diff(&old_text, &new_text))
                    .await
                    .map_err(|e| RegdiffError::Job(format!("Diff task failed: {}", e)))?;
                Ok(Arc::new(analyzer.analyze(&changes).await))
            })
            .await;

        Ok(handle)
    }

    pub async fn job_status(&self, id: JobId) -> Option<JobStatus<Arc<AnalysisReport>>> {
        self.jobs.status(id).await
    }

    // CLI interface methods

    pub async fn compare(&self, old: &Path, new: &Path, format: &str) -> Result<()> {
        let old_text = read_document(old)?;
        let new_text = read_document(new)?;

        info!("🔍 Comparing {} -> {}", old.display(), new.display());
        let changes = self.compare_documents(&old_text, &new_text);
        if changes.is_empty() {
            info!("✅ No section changes found");
        } else {
            info!("📊 {} section changes found", changes.total_changes());
        }

        match format {
            "json" => println!("{}", serde_json::to_string_pretty(&changes)?),
            "text" => print!("{}", render_text_summary(&changes)),
            _ => return Err(RegdiffError::Config(format!("Unsupported format: {}", format)).into()),
        }
        Ok(())
    }

    pub async fn analyze(&self, old: &Path, new: &Path, output: Option<PathBuf>) -> Result<()> {
        let old_text = read_document(old)?;
        let new_text = read_document(new)?;

        let handle = self.submit_analysis(old_text, new_text).await?;
        let id = handle.id();
        info!("🚀 Analysis job {} submitted ({} workers)", id, self.jobs.workers());
        if matches!(handle.status(), JobStatus::Queued) {
            debug!("Job {} waiting for a free worker", id);
        }

        let report = handle.wait().await?;
        self.jobs.forget(id).await;
        let rendered = serde_json::to_string_pretty(report.as_ref())?;

        match output {
            Some(path) => {
                std::fs::write(&path, rendered)?;
                info!("📝 Report written to {}", path.display());
            }
            None => println!("{}", rendered),
        }

        if report.failures() > 0 {
            warn!("{} changes could not be classified", report.failures());
        }
        Ok(())
    }

    pub async fn health(&self) -> Result<()> {
        let status = self.monitor.refresh().await;
        let body = json!({
            "service": "running",
            "llm": {
                "enabled": self.config.llm.enabled,
                "provider": self.config.llm.provider,
                "model": self.config.llm.model,
            },
            "backend": status,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    }

    pub async fn init(&self, path: Option<PathBuf>, force: bool) -> Result<()> {
        let target_dir = match path {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let config_path = target_dir.join("regdiff.toml");
        info!("Initializing regdiff in: {}", target_dir.display());

        if config_path.exists() && !force {
            return Err(RegdiffError::Config(format!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            ))
            .into());
        }

        std::fs::create_dir_all(&target_dir)?;
        Config::default().save(&config_path)?;
        info!("✅ Wrote {}", config_path.display());
        Ok(())
    }
}

/// Read an uploaded document, which must exist and be valid UTF-8
pub fn read_document(path: &Path) -> std::result::Result<String, RegdiffError> {
    let bytes = std::fs::read(path).map_err(|e| {
        RegdiffError::InputValidation(format!("Cannot read {}: {}", path.display(), e))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        RegdiffError::InputValidation(format!("{} is not valid UTF-8: {}", path.display(), e))
    })
}

/// Human readable rendering of a change set
pub fn render_text_summary(changes: &ChangeSet) -> String {
    let mut out = format!(
        "Sections: {} added, {} deleted, {} modified\n",
        changes.added.len(),
        changes.deleted.len(),
        changes.modified.len()
    );

    for text in &changes.added {
        out.push_str(&format!("+ Added: {}\n", heading_of(text)));
    }
    for text in &changes.deleted {
        out.push_str(&format!("- Deleted: {}\n", heading_of(text)));
    }
    for change in &changes.modified {
        out.push_str(&format!(
            "~ Modified: {} (+{}/-{})\n",
            heading_of(&change.new),
            change.diff.insertions(),
            change.diff.deletions()
        ));
        for line in change.diff.render_lines() {
            out.push_str(&format!("    {}\n", line));
        }
    }
    out
}
