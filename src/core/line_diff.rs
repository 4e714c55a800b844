//! Line-level unified diff for modified sections.
//!
//! `diffy` produces the hunks. They are copied into a serializable model and
//! rendered the way `diff -u` presents them, minus the file headers.

use diffy::DiffOptions;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Insert,
    Delete,
}

impl LineKind {
    fn prefix(self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Insert => '+',
            LineKind::Delete => '-',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// One-based first line of the hunk in the old text
    pub old_start: usize,
    pub old_len: usize,

    /// One-based first line of the hunk in the new text
    pub new_start: usize,
    pub new_len: usize,

    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// `@@ -a,b +c,d @@` header
    pub fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@",
            format_range(self.old_start, self.old_len),
            format_range(self.new_start, self.new_len)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    pub hunks: Vec<DiffHunk>,
}

impl LineDiff {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    pub fn insertions(&self) -> usize {
        self.count(LineKind::Insert)
    }

    pub fn deletions(&self) -> usize {
        self.count(LineKind::Delete)
    }

    fn count(&self, kind: LineKind) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .filter(|l| l.kind == kind)
            .count()
    }

    /// Hunk headers followed by prefixed lines
    pub fn render_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for hunk in &self.hunks {
            out.push(hunk.header());
            for line in &hunk.lines {
                out.push(format!("{}{}", line.kind.prefix(), line.content));
            }
        }
        out
    }

    pub fn render(&self) -> String {
        self.render_lines().join("\n")
    }
}

// Single lines omit the length, as in `diff -u`
fn format_range(start: usize, len: usize) -> String {
    if len == 1 {
        format!("{}", start)
    } else {
        format!("{},{}", start, len)
    }
}

// Terminate the last line so an unterminated final line still matches its terminated twin
fn terminated(text: &str) -> Cow<'_, str> {
    if text.is_empty() || text.ends_with('\n') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{}\n", text))
    }
}

fn diff_line(line: &diffy::Line<'_, str>) -> DiffLine {
    let (kind, content) = match line {
        diffy::Line::Context(text) => (LineKind::Context, text),
        diffy::Line::Insert(text) => (LineKind::Insert, text),
        diffy::Line::Delete(text) => (LineKind::Delete, text),
    };
    DiffLine {
        kind,
        content: content.trim_end_matches(['\r', '\n']).to_string(),
    }
}

/// Diff two blocks of text line by line, keeping `context` unchanged lines around each change
pub fn line_diff(old: &str, new: &str, context: usize) -> LineDiff {
    let old = terminated(old);
    let new = terminated(new);
    let patch = DiffOptions::new()
        .set_context_len(context)
        .create_patch(&old, &new);

    let hunks = patch
        .hunks()
        .iter()
        .map(|hunk| {
            let (old_range, new_range) = (hunk.old_range(), hunk.new_range());
            DiffHunk {
                old_start: old_range.start(),
                old_len: old_range.len(),
                new_start: new_range.start(),
                new_len: new_range.len(),
                lines: hunk.lines().iter().map(diff_line).collect(),
            }
        })
        .collect();

    LineDiff { hunks }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_has_no_hunks() {
        let diff = line_diff("a\nb\nc", "a\nb\nc", 3);
        assert!(diff.is_empty());
        assert!(diff.render().is_empty());
    }

    #[test]
    fn test_replaced_line() {
        let diff = line_diff("1. Scope\nOld wording.", "1. Scope\nNew wording.", 3);
        assert_eq!(
            diff.render_lines(),
            vec!["@@ -1,2 +1,2 @@", " 1. Scope", "-Old wording.", "+New wording."]
        );
        assert_eq!(diff.insertions(), 1);
        assert_eq!(diff.deletions(), 1);
    }

    #[test]
    fn test_distant_changes_split_into_hunks() {
        let old: Vec<String> = (0..10).map(|i| format!("a{}", i)).collect();
        let mut new = old.clone();
        new[0] = "b0".to_string();
        new[9] = "b9".to_string();

        let diff = line_diff(&old.join("\n"), &new.join("\n"), 1);
        assert_eq!(diff.hunks.len(), 2);
        assert_eq!(diff.hunks[0].header(), "@@ -1,2 +1,2 @@");
        assert_eq!(diff.hunks[1].header(), "@@ -9,2 +9,2 @@");
        assert_eq!(diff.hunks[1].lines[0].content, "a8");
    }

    #[test]
    fn test_nearby_changes_share_a_hunk() {
        let diff = line_diff("a\nb\nc\nd\ne", "A\nb\nc\nd\nE", 3);
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(diff.hunks[0].header(), "@@ -1,5 +1,5 @@");
    }

    #[test]
    fn test_pure_insertion_into_empty() {
        let diff = line_diff("", "only line", 3);
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!(diff.hunks[0].old_len, 0);
        assert_eq!((diff.hunks[0].new_start, diff.hunks[0].new_len), (1, 1));
        assert_eq!(diff.render_lines()[1..], ["+only line"]);
    }

    #[test]
    fn test_appended_lines_keep_context() {
        let diff = line_diff("x\ny", "x\ny\nz", 3);
        assert_eq!(diff.render_lines(), vec!["@@ -1,2 +1,3 @@", " x", " y", "+z"]);
    }

    #[test]
    fn test_deleted_line_in_middle() {
        let diff = line_diff("keep\ndrop\nkeep too", "keep\nkeep too", 0);
        assert_eq!(diff.hunks.len(), 1);
        assert_eq!((diff.hunks[0].old_start, diff.hunks[0].old_len), (2, 1));
        assert_eq!(diff.hunks[0].new_len, 0);
        assert_eq!(diff.render_lines()[1..], ["-drop"]);
    }

    #[test]
    fn test_missing_final_newline_is_not_a_change() {
        assert!(line_diff("a\nb", "a\nb\n", 3).is_empty());

        let diff = line_diff("a\r\nb", "a\r\nc", 3);
        assert_eq!(diff.render_lines(), vec!["@@ -1,2 +1,2 @@", " a", "-b", "+c"]);
    }

    #[test]
    fn test_context_lines_are_configurable() {
        let old = "1\n2\n3\n4\n5\n6\n7";
        let new = "1\n2\n3\nfour\n5\n6\n7";
        assert_eq!(line_diff(old, new, 0).render_lines(), vec!["@@ -4 +4 @@", "-4", "+four"]);
        assert_eq!(line_diff(old, new, 1).hunks[0].header(), "@@ -3,3 +3,3 @@");
        assert_eq!(line_diff(old, new, 3).hunks[0].lines.len(), 8);
    }
}
