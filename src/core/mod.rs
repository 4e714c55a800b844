mod analyzer;
mod differ;
mod engine;
mod fingerprint;
mod jobs;
mod line_diff;
mod llm;
mod segmenter;

pub use analyzer::{AnalysisReport, ChangeAnalyzer};
pub use differ::{ChangeSet, ContentDiffer};
pub use jobs::{JobHandle, JobId, JobQueue, JobStatus};
pub use llm::{create_classifier, BackendMonitor, ChangeClassifier};
pub use segmenter::heading_of;

// Export the main engine
pub use engine::Engine;
