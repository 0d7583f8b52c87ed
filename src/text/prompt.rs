//! Prompt assembly with a hard character budget on injected context.

use crate::log_debug;

/// Builds task prompts, truncating any injected document context to a
/// fixed character budget so the prompt stays inside the model's
/// context window.
pub struct PromptAssembler {
    max_context_chars: usize,
}

impl PromptAssembler {
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// Prompt asking the model to emit one `label: value` line per
    /// requested label from a dictated transcript.
    pub fn dictation_prompt(&self, labels: &[String], transcript: &str) -> String {
        let label_list = labels.join(", ");
        let line_shape = labels
            .iter()
            .map(|label| format!("{label}: ..."))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Extract {label_list} from the following dictation and answer \
             with exactly one line per field, in the form:\n{line_shape}\n\n\
             Dictation:\n{transcript}"
        )
    }

    /// Prompt answering a question against a document, with the
    /// document bounded to the context budget.
    pub fn question_prompt(&self, document: &str, question: &str) -> String {
        let context = self.bounded_context(document);
        format!(
            "You are a helpful assistant. Use the provided document context \
             to answer the question.\n\nContext:\n{context}\n\n\
             Question: {question}\n\nAnswer:"
        )
    }

    /// First `max_context_chars` characters of `document`. Character
    /// based, not byte based, so the cut never splits a code point.
    pub fn bounded_context(&self, document: &str) -> String {
        if document.chars().count() <= self.max_context_chars {
            return document.to_string();
        }
        log_debug!(
            "prompt",
            "truncating context to {} chars",
            self.max_context_chars
        );
        document.chars().take(self.max_context_chars).collect()
    }
}
