use serde::{Deserialize, Serialize};

/// Hard cap on characters embedded as context into a prompt.
pub const MAX_CONTEXT_CHARS: usize = 6_000;

/// Hard cap on extracted document text handed to the core by the
/// document-text collaborator.
pub const MAX_DOCUMENT_CHARS: usize = 800_000;

const DEFAULT_MODEL_PATH: &str = "/data/local/tmp/llm/model.bundle";

// Configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// Fixed system instruction applied to every conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Ordered field labels the dictation flow extracts.
    #[serde(default = "default_field_labels")]
    pub field_labels: Vec<String>,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
    /// Optional deadline for a single generation, in milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_model_path() -> String {
    DEFAULT_MODEL_PATH.to_string()
}

fn default_system_prompt() -> String {
    "You are a text summarizer. Share plain text without any formatting, \
     suitable for direct display to the user."
        .to_string()
}

fn default_field_labels() -> Vec<String> {
    vec!["name".to_string(), "email".to_string(), "address".to_string()]
}

fn default_max_context_chars() -> usize {
    MAX_CONTEXT_CHARS
}

fn default_max_document_chars() -> usize {
    MAX_DOCUMENT_CHARS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            system_prompt: default_system_prompt(),
            field_labels: default_field_labels(),
            max_context_chars: default_max_context_chars(),
            max_document_chars: default_max_document_chars(),
            deadline_ms: None,
        }
    }
}
