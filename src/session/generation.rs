//! Single-flight streaming generation with deterministic cancellation.
//!
//! One driver task per request pulls raw fragments from the runtime
//! stream, classifies them, and forwards events to the caller-facing
//! `GenerationStream`. Starting a new request cancels the previous one
//! and waits for its driver to stop before the new stream can emit
//! anything, so a superseded caller never sees another fragment.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::runtime::{classifier, Conversation, ResponseFragment};
use crate::session::manager::ConversationHandle;
use crate::text::markdown::{render_markdown, StyledRun};
use crate::{log_debug, log_info};

/// How a generation ended. Cancellation is terminal but silent: it is
/// not an error and carries no message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum TerminalStatus {
    Completed,
    Failed(String),
    Cancelled,
}

/// Options for one generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    /// Optional wall-clock deadline for the whole request. Exceeding it
    /// is a `Failed` terminal; the single-flight contract is unchanged.
    pub deadline: Option<Duration>,
}

/// Events delivered to the caller, in stream order: zero or more
/// fragments, then exactly one `Finished`.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    Fragment(ResponseFragment),
    Finished(TerminalStatus),
}

/// Side effect run exactly once when a request finishes, on every exit
/// path (completion, failure, cancellation).
pub type OnFinish = Arc<dyn Fn(&TerminalStatus) + Send + Sync>;

/// Bookkeeping for one outstanding streaming call.
struct GenerationRequest {
    id: Uuid,
    prompt: String,
    started_at: DateTime<Utc>,
}

struct ActiveGeneration {
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

/// Runs exactly one streaming generation at a time on a conversation.
/// A new `generate` call supersedes any request still in flight
/// (last-writer-wins, not queued).
pub struct GenerationController {
    conversation: Arc<Mutex<Box<dyn Conversation>>>,
    active: Mutex<Option<ActiveGeneration>>,
    busy_tx: watch::Sender<bool>,
    busy_rx: watch::Receiver<bool>,
    on_finish: Option<OnFinish>,
}

impl GenerationController {
    pub fn new(handle: &ConversationHandle) -> Self {
        let (busy_tx, busy_rx) = watch::channel(false);
        Self {
            conversation: handle.conversation(),
            active: Mutex::new(None),
            busy_tx,
            busy_rx,
            on_finish: None,
        }
    }

    /// Register a side effect (busy-indicator teardown and the like)
    /// that runs exactly once per request.
    pub fn on_finish(mut self, hook: impl Fn(&TerminalStatus) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(hook));
        self
    }

    /// Busy/idle signal: `true` from the moment a request starts until
    /// its driver has finished, on every exit path.
    pub fn busy(&self) -> watch::Receiver<bool> {
        self.busy_rx.clone()
    }

    pub fn is_generating(&self) -> bool {
        *self.busy_rx.borrow()
    }

    /// Start a streaming generation.
    ///
    /// Any generation already in flight on this conversation is
    /// cancelled first, and its driver has observably stopped before
    /// this returns, so the new stream cannot emit a fragment while the
    /// old one is still live.
    pub async fn generate(&self, prompt: &str, options: GenerationOptions) -> GenerationStream {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            log_info!("generation", "superseding request in flight");
            previous.cancel.cancel();
            let _ = previous.driver.await;
        }

        let request = GenerationRequest {
            id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            started_at: Utc::now(),
        };
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let _ = self.busy_tx.send(true);
        log_debug!(
            "generation",
            "request {} started at {} ({} prompt chars)",
            request.id,
            request.started_at,
            request.prompt.len()
        );

        let driver = Driver {
            conversation: Arc::clone(&self.conversation),
            request,
            options,
            cancel: cancel.clone(),
            events: event_tx,
            busy_tx: self.busy_tx.clone(),
            on_finish: self.on_finish.clone(),
        };
        let driver = tokio::spawn(driver.run());

        *active = Some(ActiveGeneration {
            cancel: cancel.clone(),
            driver,
        });

        GenerationStream {
            events: event_rx,
            cancel,
            accumulated: String::new(),
            terminal: None,
        }
    }

    /// Cancel whatever is in flight, if anything. Safe to call when
    /// idle.
    pub async fn cancel_active(&self) {
        let active = self.active.lock().await;
        if let Some(ref current) = *active {
            current.cancel.cancel();
        }
    }
}

struct Driver {
    conversation: Arc<Mutex<Box<dyn Conversation>>>,
    request: GenerationRequest,
    options: GenerationOptions,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<GenerationEvent>,
    busy_tx: watch::Sender<bool>,
    on_finish: Option<OnFinish>,
}

impl Driver {
    async fn run(self) {
        let status = self.pump().await;

        // Terminal event, busy transition and on-finish hook fire once
        // per request, whatever the exit path was.
        let _ = self.events.send(GenerationEvent::Finished(status.clone()));
        let _ = self.busy_tx.send(false);
        if let Some(hook) = &self.on_finish {
            hook(&status);
        }
        log_info!("generation", "request {} finished: {status:?}", self.request.id);
    }

    async fn pump(&self) -> TerminalStatus {
        let mut conversation = self.conversation.lock().await;
        let mut stream = conversation.generate(&self.request.prompt);

        let deadline = self.options.deadline;
        let timeout = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timeout);

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return TerminalStatus::Cancelled,
                _ = &mut timeout => {
                    return TerminalStatus::Failed("generation deadline exceeded".to_string());
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(raw)) => {
                    let fragment = classifier::classify(&raw);
                    if self
                        .events
                        .send(GenerationEvent::Fragment(fragment))
                        .is_err()
                    {
                        // Caller dropped the stream; nothing left to
                        // deliver to.
                        return TerminalStatus::Cancelled;
                    }
                }
                Some(Err(e)) => return TerminalStatus::Failed(e.to_string()),
                None => return TerminalStatus::Completed,
            }
        }
    }
}

/// Caller-facing stream for one request.
///
/// Yields classified fragments in arrival order, then exactly one
/// terminal status. Cancellation is authoritative at this boundary:
/// once `cancel` is called (or the stream is dropped), no further
/// fragments are delivered even if the producer had already buffered
/// more.
pub struct GenerationStream {
    events: mpsc::UnboundedReceiver<GenerationEvent>,
    cancel: CancellationToken,
    accumulated: String,
    terminal: Option<TerminalStatus>,
}

impl GenerationStream {
    /// Next event: fragments in order, then exactly one `Finished`.
    /// Returns `None` once the terminal event has been delivered.
    pub async fn next_event(&mut self) -> Option<GenerationEvent> {
        if self.terminal.is_some() {
            return None;
        }

        let event = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        };

        match event {
            Some(GenerationEvent::Fragment(fragment)) => {
                if let ResponseFragment::TextChunk(text) = &fragment {
                    self.accumulated.push_str(text);
                }
                Some(GenerationEvent::Fragment(fragment))
            }
            Some(GenerationEvent::Finished(status)) => {
                self.terminal = Some(status.clone());
                Some(GenerationEvent::Finished(status))
            }
            // Cancelled, or the driver went away without a terminal
            // event; either way the request is over and silent.
            None => {
                self.terminal = Some(TerminalStatus::Cancelled);
                Some(GenerationEvent::Finished(TerminalStatus::Cancelled))
            }
        }
    }

    /// Cancel this request. Not an error: the stream ends with
    /// `Cancelled` and no further fragments.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Text accumulated from the `TextChunk` fragments delivered so
    /// far. Reasoning and unknown fragments are never part of this.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Styled rendering of the text accumulated so far, recomputed from
    /// scratch on each call. Stateless, so an increment can be displayed
    /// after every fragment without tracking diffs.
    pub fn styled_runs(&self) -> Vec<StyledRun> {
        render_markdown(&self.accumulated)
    }

    /// Terminal status, once the stream has finished.
    pub fn terminal(&self) -> Option<&TerminalStatus> {
        self.terminal.as_ref()
    }

    /// Drain the stream, returning the terminal status and the full
    /// accumulated text.
    pub async fn collect_to_end(&mut self) -> (TerminalStatus, String) {
        while let Some(event) = self.next_event().await {
            if let GenerationEvent::Finished(status) = event {
                return (status, self.accumulated.clone());
            }
        }
        (
            self.terminal.clone().unwrap_or(TerminalStatus::Cancelled),
            self.accumulated.clone(),
        )
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        // Dropping the consumer cancels the request.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::scripted::{Script, ScriptedRuntime};
    use crate::session::manager::ModelSessionManager;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn controller_for(script: Script) -> (Arc<ScriptedRuntime>, GenerationController) {
        let runtime = Arc::new(ScriptedRuntime::new(script));
        let manager = ModelSessionManager::new(runtime.clone());
        manager
            .ensure_loaded(&PathBuf::from("/tmp/models/test.bundle"))
            .await
            .expect("load");
        let handle = manager.create_conversation("sys").expect("conversation");
        (runtime, GenerationController::new(&handle))
    }

    #[tokio::test]
    async fn completed_stream_accumulates_text_in_order() {
        let (_, controller) =
            controller_for(Script::new().chunk("Hello").chunk(", ").chunk("world")).await;

        let mut stream = controller
            .generate("greet", GenerationOptions::default())
            .await;
        let (status, text) = stream.collect_to_end().await;

        assert_eq!(status, TerminalStatus::Completed);
        assert_eq!(text, "Hello, world");
        assert_eq!(stream.terminal(), Some(&TerminalStatus::Completed));
    }

    #[tokio::test]
    async fn reasoning_and_unknown_fragments_are_delivered_but_not_accumulated() {
        let script = Script::new()
            .reasoning("let me think")
            .chunk("answer")
            .fragment(crate::runtime::RawFragment {
                type_name: "MessageResponse.Complete".to_string(),
                text: None,
            });
        let (_, controller) = controller_for(script).await;

        let mut stream = controller.generate("q", GenerationOptions::default()).await;
        let mut reasoning_seen = 0;
        let mut other_seen = 0;
        while let Some(event) = stream.next_event().await {
            match event {
                GenerationEvent::Fragment(ResponseFragment::ReasoningChunk(_)) => {
                    reasoning_seen += 1;
                }
                GenerationEvent::Fragment(ResponseFragment::Other) => other_seen += 1,
                _ => {}
            }
        }

        assert_eq!(reasoning_seen, 1);
        assert_eq!(other_seen, 1);
        assert_eq!(stream.accumulated(), "answer");
    }

    #[tokio::test]
    async fn stream_error_surfaces_as_failed_terminal() {
        let (_, controller) =
            controller_for(Script::new().chunk("partial").error("engine fault")).await;

        let mut stream = controller.generate("q", GenerationOptions::default()).await;
        let (status, text) = stream.collect_to_end().await;

        assert_eq!(status, TerminalStatus::Failed("engine fault".to_string()));
        assert_eq!(text, "partial");
    }

    #[tokio::test]
    async fn cancel_before_first_fragment_yields_silent_cancelled() {
        let script = Script::new().chunk_after(Duration::from_secs(5), "never delivered");
        let (_, controller) = controller_for(script).await;

        let mut stream = controller.generate("q", GenerationOptions::default()).await;
        stream.cancel();
        let (status, text) = stream.collect_to_end().await;

        assert_eq!(status, TerminalStatus::Cancelled);
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn new_request_supersedes_the_one_in_flight() {
        let script = Script::new()
            .chunk("head ")
            .chunk_after(Duration::from_millis(200), "tail");
        let (runtime, controller) = controller_for(script).await;

        let mut first = controller.generate("one", GenerationOptions::default()).await;
        // Pull the leading fragment so the first request is demonstrably live.
        let event = first.next_event().await;
        assert!(matches!(
            event,
            Some(GenerationEvent::Fragment(ResponseFragment::TextChunk(_)))
        ));

        let mut second = controller.generate("two", GenerationOptions::default()).await;

        // The superseded stream ends with Cancelled and never sees the tail.
        let (first_status, first_text) = first.collect_to_end().await;
        assert_eq!(first_status, TerminalStatus::Cancelled);
        assert_eq!(first_text, "head ");

        let (second_status, second_text) = second.collect_to_end().await;
        assert_eq!(second_status, TerminalStatus::Completed);
        assert_eq!(second_text, "head tail");
        assert_eq!(runtime.prompts(), vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn on_finish_runs_exactly_once_and_busy_clears() {
        let finishes = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&finishes);

        let (_, controller) = controller_for(Script::new().chunk("done")).await;
        let controller = controller.on_finish(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        });

        let mut busy = controller.busy();
        let mut stream = controller.generate("q", GenerationOptions::default()).await;
        assert!(controller.is_generating());

        let (status, _) = stream.collect_to_end().await;
        assert_eq!(status, TerminalStatus::Completed);

        busy.wait_for(|b| !*b).await.expect("busy channel");
        assert_eq!(finishes.load(Ordering::SeqCst), 1);
        assert!(!controller.is_generating());
    }

    #[tokio::test]
    async fn on_finish_runs_once_for_cancelled_requests_too() {
        let finishes = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&finishes);

        let script = Script::new().chunk_after(Duration::from_secs(5), "never");
        let (_, controller) = controller_for(script).await;
        let controller = controller.on_finish(move |status| {
            assert_eq!(status, &TerminalStatus::Cancelled);
            observed.fetch_add(1, Ordering::SeqCst);
        });

        let mut busy = controller.busy();
        let stream = controller.generate("q", GenerationOptions::default()).await;
        controller.cancel_active().await;
        drop(stream);

        busy.wait_for(|b| !*b).await.expect("busy channel");
        assert_eq!(finishes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_expiry_is_a_failed_terminal() {
        let script = Script::new()
            .chunk("prefix")
            .chunk_after(Duration::from_secs(5), "late");
        let (_, controller) = controller_for(script).await;

        let options = GenerationOptions {
            deadline: Some(Duration::from_millis(50)),
        };
        let mut stream = controller.generate("q", options).await;
        let (status, text) = stream.collect_to_end().await;

        assert_eq!(
            status,
            TerminalStatus::Failed("generation deadline exceeded".to_string())
        );
        assert_eq!(text, "prefix");
    }

    #[tokio::test]
    async fn styled_runs_track_the_accumulated_prefix() {
        let script = Script::new().chunk("plain **bo").chunk("ld** end");
        let (_, controller) = controller_for(script).await;

        let mut stream = controller.generate("q", GenerationOptions::default()).await;

        stream.next_event().await;
        // Mid-stream the unmatched delimiter stays literal.
        assert_eq!(
            stream.styled_runs(),
            vec![crate::text::markdown::StyledRun {
                style: crate::text::markdown::RunStyle::Plain,
                text: "plain **bo".to_string(),
            }]
        );

        stream.collect_to_end().await;
        let runs = stream.styled_runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].style, crate::text::markdown::RunStyle::Bold);
        assert_eq!(runs[1].text, "bold");
    }

    #[test]
    fn terminal_status_serializes_tagged() {
        let completed = serde_json::to_value(TerminalStatus::Completed).expect("json");
        assert_eq!(completed["status"], "completed");

        let failed =
            serde_json::to_value(TerminalStatus::Failed("boom".to_string())).expect("json");
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["message"], "boom");
    }
}
