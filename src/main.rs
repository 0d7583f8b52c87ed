// Demo driver for the session core: loads a scripted model runtime,
// streams a summary to stdout as fragments arrive, then runs the
// dictation-to-form flow and prints the extracted fields as JSON.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use pocket_llm::runtime::scripted::{Script, ScriptedRuntime};
use pocket_llm::tasks;
use pocket_llm::{
    GenerationController, GenerationEvent, GenerationOptions, ModelSessionManager,
    ResponseFragment, SessionConfig,
};

fn summary_script() -> Script {
    Script::new()
        .chunk_after(Duration::from_millis(40), "**Pocket LLM** keeps one ")
        .chunk_after(Duration::from_millis(40), "generation in flight per ")
        .chunk_after(Duration::from_millis(40), "conversation and streams ")
        .chunk_after(Duration::from_millis(40), "fragments as they arrive.")
}

fn dictation_script() -> Script {
    Script::new()
        .reasoning("picking the fields out of the dictation")
        .chunk("name: Alice Chen\n")
        .chunk("email: alice@example.com\n")
        .chunk("address: 1 Main St, Springfield")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SessionConfig::default();
    let runtime = Arc::new(ScriptedRuntime::new(summary_script()));
    let manager = ModelSessionManager::new(runtime.clone());

    manager
        .ensure_loaded(Path::new(&config.model_path))
        .await
        .with_context(|| format!("loading model from {}", config.model_path))?;

    let handle = manager
        .create_conversation(&config.system_prompt)
        .context("session not ready")?;
    let controller = GenerationController::new(&handle);

    println!("== streaming summary ==");
    let mut stream = controller
        .generate("Summarize what this demo does.", GenerationOptions::default())
        .await;
    while let Some(event) = stream.next_event().await {
        match event {
            GenerationEvent::Fragment(ResponseFragment::TextChunk(text)) => {
                print!("{text}");
            }
            GenerationEvent::Fragment(_) => {}
            GenerationEvent::Finished(status) => {
                println!("\n[{}]", serde_json::to_string(&status)?);
            }
        }
    }

    println!("\n== dictation to form ==");
    runtime.set_script(dictation_script());
    let handle = manager
        .create_conversation(&config.system_prompt)
        .context("session not ready")?;
    let controller = GenerationController::new(&handle);

    let transcript = "hi, this is Alice Chen, my email is alice@example.com \
                      and I live at 1 Main St in Springfield";
    let fields = tasks::fill_form(&controller, &config, transcript).await?;
    println!("{}", serde_json::to_string_pretty(&fields)?);

    Ok(())
}
