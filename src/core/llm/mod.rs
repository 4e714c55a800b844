//! LLM integration for classifying section changes
//!
//! This module provides a trait-based architecture for plugging different
//! LLM backends into change analysis, plus an explicitly owned monitor that
//! tracks whether the configured backend is reachable.

mod classifier;
mod prompt;
mod providers;
mod status;

pub use classifier::{ChangeClassification, ChangeClassifier, ChangeKind, ClassificationRequest};
pub use providers::create_classifier;
pub use status::BackendMonitor;
