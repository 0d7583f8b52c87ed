//! Model runtime boundary.
//!
//! Everything the core consumes from the underlying model SDK sits
//! behind these traits, so the runtime can be injected per session and
//! the closed fragment vocabulary is decided once, at this boundary,
//! by the classifier.

pub mod classifier;
pub mod scripted;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::error::LoadError;

/// One opaque unit of a streamed model response, as the runtime hands
/// it over: the runtime type name of the fragment and its text payload,
/// if the shape carried one. Response shapes are not contractually
/// guaranteed; the classifier tolerates anything here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    pub type_name: String,
    pub text: Option<String>,
}

impl RawFragment {
    pub fn text_chunk(text: impl Into<String>) -> Self {
        Self {
            type_name: "MessageResponse.Chunk".to_string(),
            text: Some(text.into()),
        }
    }

    pub fn reasoning_chunk(text: impl Into<String>) -> Self {
        Self {
            type_name: "MessageResponse.ReasoningChunk".to_string(),
            text: Some(text.into()),
        }
    }
}

/// Closed local vocabulary for streamed fragments. `ReasoningChunk`
/// carries internal deliberation and is never part of user-facing
/// output; `Other` covers every shape the core does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFragment {
    TextChunk(String),
    ReasoningChunk(String),
    Other,
}

/// Terminal error signalled by the model stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuntimeError(pub String);

/// Loads model bundles. Loading is long-running and must suspend
/// rather than block the caller's thread.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Arc<dyn ModelInstance>, LoadError>;
}

/// A loaded model able to open conversations under a fixed system
/// instruction.
pub trait ModelInstance: Send + Sync {
    fn create_conversation(&self, system_prompt: &str) -> Box<dyn Conversation>;
}

/// One conversation against a loaded model. `generate` returns the raw
/// fragment stream for a single request: fragments arrive in producer
/// order, the stream ends on success, and an `Err` item is terminal.
pub trait Conversation: Send {
    fn generate(&mut self, prompt: &str) -> BoxStream<'static, Result<RawFragment, RuntimeError>>;
}
