//! Model session lifecycle: guarantees the model is loaded before any
//! generation is attempted and serializes concurrent load attempts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::LoadError;
use crate::runtime::{Conversation, ModelInstance, ModelRuntime};
use crate::{log_info, log_warn};

/// Lifecycle state of the process-wide model session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// The loaded-model resource. At most one per manager; mutated only by
/// `ensure_loaded` under the load lock.
struct ModelSession {
    state: SessionState,
    load_path: Option<PathBuf>,
    model: Option<Arc<dyn ModelInstance>>,
}

pub struct ModelSessionManager {
    runtime: Arc<dyn ModelRuntime>,
    /// Serializes load attempts; held across the await of a load so a
    /// second caller suspends until the in-flight load resolves.
    load_serial: tokio::sync::Mutex<()>,
    session: std::sync::Mutex<ModelSession>,
}

impl ModelSessionManager {
    pub fn new(runtime: Arc<dyn ModelRuntime>) -> Self {
        Self {
            runtime,
            load_serial: tokio::sync::Mutex::new(()),
            session: std::sync::Mutex::new(ModelSession {
                state: SessionState::Unloaded,
                load_path: None,
                model: None,
            }),
        }
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, ModelSession> {
        // Handle poisoned mutex by recovering from panic
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lock_session().state
    }

    /// Path the session was last asked to load from.
    pub fn load_path(&self) -> Option<PathBuf> {
        self.lock_session().load_path.clone()
    }

    /// Load the model if it is not already loaded.
    ///
    /// Idempotent when `Ready` (no reload). A caller arriving while a
    /// load is in flight suspends until that load resolves and never
    /// starts a second one. `Unloaded` and `Failed` both transition
    /// through `Loading`; a failure is reported to the caller and the
    /// manager stays retryable.
    pub async fn ensure_loaded(&self, path: &Path) -> Result<(), LoadError> {
        let _serial = self.load_serial.lock().await;

        if self.lock_session().state == SessionState::Ready {
            return Ok(());
        }

        {
            let mut session = self.lock_session();
            session.state = SessionState::Loading;
            session.load_path = Some(path.to_path_buf());
            session.model = None;
        }
        log_info!("session", "loading model bundle from {}", path.display());

        match self.runtime.load(path).await {
            Ok(model) => {
                let mut session = self.lock_session();
                session.model = Some(model);
                session.state = SessionState::Ready;
                log_info!("session", "model ready: {}", path.display());
                Ok(())
            }
            Err(e) => {
                let mut session = self.lock_session();
                session.state = SessionState::Failed;
                session.model = None;
                log_warn!("session", "model load failed: {e}");
                Err(e)
            }
        }
    }

    /// Open a conversation under a fixed system instruction. `None`
    /// unless the session is `Ready`; never panics.
    pub fn create_conversation(&self, system_prompt: &str) -> Option<ConversationHandle> {
        let session = self.lock_session();
        if session.state != SessionState::Ready {
            return None;
        }
        let model = session.model.as_ref()?;
        Some(ConversationHandle::new(model.create_conversation(system_prompt)))
    }
}

/// Capability to issue generation requests against a ready session.
/// One per logical conversation; not persisted.
pub struct ConversationHandle {
    conversation: Arc<tokio::sync::Mutex<Box<dyn Conversation>>>,
}

impl ConversationHandle {
    fn new(conversation: Box<dyn Conversation>) -> Self {
        Self {
            conversation: Arc::new(tokio::sync::Mutex::new(conversation)),
        }
    }

    pub(crate) fn conversation(&self) -> Arc<tokio::sync::Mutex<Box<dyn Conversation>>> {
        Arc::clone(&self.conversation)
    }
}
