// Streaming inference session core: owns the loaded-model lifecycle,
// runs one streaming generation at a time per conversation, classifies
// and accumulates response fragments, and renders/extracts the result.
// Everything UI-facing (speech capture, document extraction, screens)
// is an external collaborator behind the `runtime` and `tasks` seams.

pub mod config;
pub mod error;
pub mod logger;
pub mod runtime;
pub mod session;
pub mod tasks;
pub mod text;

pub use config::SessionConfig;
pub use error::{LoadError, SessionError};
pub use runtime::{RawFragment, ResponseFragment};
pub use session::generation::{
    GenerationController, GenerationEvent, GenerationOptions, GenerationStream, TerminalStatus,
};
pub use session::manager::{ConversationHandle, ModelSessionManager, SessionState};
pub use text::extract::{ExtractedFields, FieldExtractor};
pub use text::markdown::{render_markdown, RunStyle, StyledRun};
pub use text::prompt::PromptAssembler;
