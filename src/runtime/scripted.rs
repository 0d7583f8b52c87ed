//! Deterministic in-process implementation of the model runtime
//! boundary, used by the tests and the demo binary. Every conversation
//! replays the configured script; loads can be delayed or made to fail
//! a fixed number of times to exercise retry paths.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::{Conversation, ModelInstance, ModelRuntime, RawFragment, RuntimeError};
use crate::error::LoadError;

/// One scripted stream event, optionally preceded by a delay.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: Result<RawFragment, RuntimeError>,
}

/// The fragment sequence replayed by every conversation the runtime
/// creates. An error step is terminal, as it is on a real stream.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: ScriptStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn chunk(self, text: &str) -> Self {
        self.chunk_after(Duration::ZERO, text)
    }

    pub fn chunk_after(self, delay: Duration, text: &str) -> Self {
        self.step(ScriptStep {
            delay,
            event: Ok(RawFragment::text_chunk(text)),
        })
    }

    pub fn reasoning(self, text: &str) -> Self {
        self.step(ScriptStep {
            delay: Duration::ZERO,
            event: Ok(RawFragment::reasoning_chunk(text)),
        })
    }

    pub fn fragment(self, fragment: RawFragment) -> Self {
        self.step(ScriptStep {
            delay: Duration::ZERO,
            event: Ok(fragment),
        })
    }

    pub fn error(self, message: &str) -> Self {
        self.error_after(Duration::ZERO, message)
    }

    pub fn error_after(self, delay: Duration, message: &str) -> Self {
        self.step(ScriptStep {
            delay,
            event: Err(RuntimeError(message.to_string())),
        })
    }
}

pub struct ScriptedRuntime {
    script: Arc<Mutex<Script>>,
    prompts: Arc<Mutex<Vec<String>>>,
    load_delay: Duration,
    remaining_load_failures: AtomicUsize,
    load_calls: AtomicUsize,
}

impl ScriptedRuntime {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            prompts: Arc::new(Mutex::new(Vec::new())),
            load_delay: Duration::ZERO,
            remaining_load_failures: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
        }
    }

    /// The first `failures` load attempts fail, then loads succeed.
    pub fn with_load_failures(script: Script, failures: usize) -> Self {
        let runtime = Self::new(script);
        runtime.remaining_load_failures.store(failures, Ordering::SeqCst);
        runtime
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Replace the script replayed by conversations created from now on.
    pub fn set_script(&self, script: Script) {
        let mut guard = self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = script;
    }

    /// How many times `load` has been called, successful or not.
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Every prompt any conversation has been asked to generate from,
    /// in submission order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ModelRuntime for ScriptedRuntime {
    async fn load(&self, path: &Path) -> Result<Arc<dyn ModelInstance>, LoadError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }

        let should_fail = self
            .remaining_load_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(LoadError(format!("no loadable bundle at {}", path.display())));
        }

        Ok(Arc::new(ScriptedModel {
            script: Arc::clone(&self.script),
            prompts: Arc::clone(&self.prompts),
        }))
    }
}

struct ScriptedModel {
    script: Arc<Mutex<Script>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ModelInstance for ScriptedModel {
    fn create_conversation(&self, _system_prompt: &str) -> Box<dyn Conversation> {
        let script = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        Box::new(ScriptedConversation {
            script,
            prompts: Arc::clone(&self.prompts),
        })
    }
}

struct ScriptedConversation {
    script: Script,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Conversation for ScriptedConversation {
    fn generate(&mut self, prompt: &str) -> BoxStream<'static, Result<RawFragment, RuntimeError>> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let steps = self.script.steps.clone();
        Box::pin(stream! {
            for step in steps {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                let terminal = step.event.is_err();
                yield step.event;
                if terminal {
                    break;
                }
            }
        })
    }
}
