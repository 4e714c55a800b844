use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use super::fingerprint::{fingerprint, Fingerprint};
use crate::config::SegmentationConfig;
use crate::error::{RegdiffError, Result};

/// A heading-delimited unit of document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Trimmed section content
    pub text: String,

    /// Identity of this section across revisions
    pub fingerprint: Fingerprint,
}

impl Section {
    fn new(text: String) -> Self {
        let fingerprint = fingerprint(&text);
        Self { text, fingerprint }
    }

    /// The first line of the section, usually its heading
    pub fn heading(&self) -> &str {
        heading_of(&self.text)
    }
}

/// First line of a block of section text
pub fn heading_of(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Splits documents into sections at heading marker lines
#[derive(Debug, Clone)]
pub struct Segmenter {
    heading_regex: Regex,
}

impl Segmenter {
    pub fn new(config: &SegmentationConfig) -> Result<Self> {
        if config.heading_markers.is_empty() {
            return Err(RegdiffError::Config("No heading markers configured".to_string()));
        }

        let alternatives: Vec<String> = config
            .heading_markers
            .iter()
            .map(|marker| regex::escape(marker))
            .collect();
        let pattern = format!("^(?:{})", alternatives.join("|"));
        let heading_regex = Regex::new(&pattern)
            .map_err(|e| RegdiffError::Config(format!("Invalid heading markers: {}", e)))?;

        Ok(Self { heading_regex })
    }

    pub fn is_heading(&self, line: &str) -> bool {
        self.heading_regex.is_match(line.trim())
    }

    /// Split a document into sections in document order.
    ///
    /// A heading line only opens a new section when something has already been
    /// buffered, so a heading on the first line does not flush an empty section.
    /// Buffers that trim down to nothing are dropped.
    pub fn segment(&self, document: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in document.split('\n') {
            if self.is_heading(line) && !current.is_empty() {
                flush(&current, &mut sections);
                current.clear();
            }
            current.push(line);
        }
        flush(&current, &mut sections);

        for section in &sections {
            trace!("Section '{}' ({})", section.heading(), section.fingerprint.short());
        }
        debug!("Segmented document into {} sections", sections.len());
        sections
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(&SegmentationConfig::default()).expect("default heading markers are valid")
    }
}

fn flush(lines: &[&str], sections: &mut Vec<Section>) {
    let text = lines.join("\n");
    let text = text.trim();
    if !text.is_empty() {
        sections.push(Section::new(text.to_string()));
    }
}
