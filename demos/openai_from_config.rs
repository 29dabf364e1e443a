//! Example: a real OpenAI-compatible endpoint configured from a YAML file.
//!
//! Run with: `OPENAI_API_KEY=sk-... cargo run --example openai_from_config`
//!
//! Reads `demos/ai-manager.yaml`; `AI_MANAGER_*` variables override it.

use ai_manager::{AiManager, AudioInput, ChatOutcome, ManagerConfig, PromptData};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_manager=debug".into()),
        )
        .init();

    let config = ManagerConfig::load("demos/ai-manager.yaml")?;
    if config.openai.api_key.is_none() {
        anyhow::bail!("set OPENAI_API_KEY or openai.api_key in the config file");
    }
    let manager = AiManager::from_config(config)?;
    println!("prompts with schemas: {:?}", manager.schema_prompts());

    let data = PromptData::new()
        .insert("topic", "borrow checking")
        .insert("count", "3");
    match manager.chat("quiz", &data, None, true).await {
        ChatOutcome::Structured(value) => println!("{:#}", value),
        ChatOutcome::Failed(failure) => println!("quiz failed: {}", failure),
        other => println!("{:?}", other),
    }

    let greeting = manager
        .chat("greeting", &PromptData::new().insert("name", "Ferris"), None, false)
        .await;
    let Some(text) = greeting.text() else {
        anyhow::bail!("no greeting returned");
    };
    println!("{}", text);

    let path = manager.generate_speech(text, None, None, None).await?;
    println!("speech written to {}", path.display());

    let transcript = manager.transcribe_audio(AudioInput::Path(path)).await?;
    println!("round trip: {}", transcript);
    Ok(())
}
