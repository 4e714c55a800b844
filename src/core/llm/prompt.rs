use tera::{Context, Tera};

use super::classifier::ClassificationRequest;
use crate::error::Result;

const TEMPLATE_NAME: &str = "classify_change.txt";

const CLASSIFY_TEMPLATE: &str = r#"
Analyze this regulatory change and return JSON with:
- 'change_summary' (1-sentence summary)
- 'change_type' (New Requirement/Clarification/Deletion/Minor Edit)
- 'potential_impact' (1-2 sentences on possible GMP impact)

Change Type: {{ change_type }}
Change Content: {{ content }}
"#;

/// Renders classification prompts
pub struct PromptBuilder {
    tera: Tera,
    max_content_chars: usize,
}

impl PromptBuilder {
    pub fn new(max_content_chars: usize) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, CLASSIFY_TEMPLATE)?;
        Ok(Self { tera, max_content_chars })
    }

    pub fn build(&self, request: &ClassificationRequest) -> Result<String> {
        let mut context = Context::new();
        context.insert("change_type", request.kind.label());
        context.insert("content", truncate_chars(&request.content, self.max_content_chars));
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

/// Cut `text` to at most `max` characters without splitting a code point
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::ChangeKind;

    #[test]
    fn test_prompt_contains_label_and_content() {
        let builder = PromptBuilder::new(2000).unwrap();
        let prompt = builder
            .build(&ClassificationRequest {
                kind: ChangeKind::Added,
                content: "2. Limits\nNo more than <ten> & \"quoted\".".to_string(),
            })
            .unwrap();

        assert!(prompt.contains("Change Type: Added"));
        assert!(prompt.contains("No more than <ten> & \"quoted\"."));
        assert!(prompt.contains("'change_summary'"));
    }

    #[test]
    fn test_content_is_truncated() {
        let builder = PromptBuilder::new(5).unwrap();
        let prompt = builder
            .build(&ClassificationRequest {
                kind: ChangeKind::Modified,
                content: "abcdefghij".to_string(),
            })
            .unwrap();
        assert!(prompt.contains("Change Content: abcde\n"));
        assert!(!prompt.contains("abcdef"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("Größe", 3), "Grö");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 0), "");
    }
}
