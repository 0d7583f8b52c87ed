//! End-to-end task flows wiring prompt assembly, streaming generation
//! and output post-processing together. Each flow drains its stream to
//! the terminal status; a `Failed` terminal is surfaced as an error, a
//! cancelled flow returns whatever was delivered before the cancel.

use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::{log_error, log_info};
use crate::session::generation::{GenerationController, GenerationOptions, TerminalStatus};
use crate::text::extract::{ExtractedFields, FieldExtractor};
use crate::text::markdown::{render_markdown, StyledRun};
use crate::text::prompt::PromptAssembler;

/// A finished free-text task: the raw accumulated text plus its styled
/// rendering for display.
#[derive(Debug, Clone)]
pub struct StreamedAnswer {
    pub status: TerminalStatus,
    pub text: String,
    pub runs: Vec<StyledRun>,
}

fn options_from(config: &SessionConfig) -> GenerationOptions {
    GenerationOptions {
        deadline: config.deadline_ms.map(Duration::from_millis),
    }
}

fn check_terminal(status: &TerminalStatus) -> Result<(), SessionError> {
    match status {
        TerminalStatus::Failed(message) => {
            log_error!("tasks", "generation failed: {message}");
            Err(SessionError::GenerationFailure(message.clone()))
        }
        TerminalStatus::Completed | TerminalStatus::Cancelled => Ok(()),
    }
}

/// Dictation-to-form: prompt for `label: value` lines from the
/// transcript, then extract the configured fields from the response.
pub async fn fill_form(
    controller: &GenerationController,
    config: &SessionConfig,
    transcript: &str,
) -> Result<ExtractedFields, SessionError> {
    let assembler = PromptAssembler::new(config.max_context_chars);
    let prompt = assembler.dictation_prompt(
        &config.field_labels,
        &assembler.bounded_context(transcript),
    );

    let mut stream = controller.generate(&prompt, options_from(config)).await;
    let (status, text) = stream.collect_to_end().await;
    check_terminal(&status)?;

    let fields = FieldExtractor::new(config.field_labels.clone()).extract(&text);
    log_info!("tasks", "form fill {status:?}, {} labels", config.field_labels.len());
    Ok(fields)
}

/// Question answering over a document. The document is capped at the
/// session's document budget before the context budget applies.
pub async fn answer_question(
    controller: &GenerationController,
    config: &SessionConfig,
    document: &str,
    question: &str,
) -> Result<StreamedAnswer, SessionError> {
    let document: String = document.chars().take(config.max_document_chars).collect();
    let assembler = PromptAssembler::new(config.max_context_chars);
    let prompt = assembler.question_prompt(&document, question);

    let mut stream = controller.generate(&prompt, options_from(config)).await;
    let (status, text) = stream.collect_to_end().await;
    check_terminal(&status)?;

    log_info!("tasks", "question answered {status:?}, {} chars", text.len());
    Ok(StreamedAnswer {
        runs: render_markdown(&text),
        status,
        text,
    })
}

/// Summarization: the bounded input is the whole prompt; the summarizer
/// behavior comes from the conversation's system instruction.
pub async fn summarize(
    controller: &GenerationController,
    config: &SessionConfig,
    input: &str,
) -> Result<StreamedAnswer, SessionError> {
    let assembler = PromptAssembler::new(config.max_context_chars);
    let prompt = assembler.bounded_context(input);

    let mut stream = controller.generate(&prompt, options_from(config)).await;
    let (status, text) = stream.collect_to_end().await;
    check_terminal(&status)?;

    log_info!("tasks", "summary {status:?}, {} chars", text.len());
    Ok(StreamedAnswer {
        runs: render_markdown(&text),
        status,
        text,
    })
}
