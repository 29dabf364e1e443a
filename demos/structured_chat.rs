//! Example: the structured chat retry loop against a scripted backend.
//!
//! Run with: `cargo run --example structured_chat`

use ai_manager::prompt::PromptTemplate;
use ai_manager::{
    AiManager, ChatOutcome, Event, FnEventHandler, MockBackend, PromptData, PromptLibrary,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_manager=info".into()),
        )
        .init();

    // First reply is chatter, second is wrapped JSON.
    let mock = MockBackend::new(vec![
        "Sure! I'd be happy to help with that.".into(),
        "Here's the JSON:\n```json\n{\"title\": \"Inception\", \"rating\": 9.2}\n```".into(),
    ]);

    let prompts = PromptLibrary::new().with_prompt(
        "review",
        PromptTemplate::SystemUser {
            system: "You are a film critic.".into(),
            user: "Review the movie {movie}.".into(),
        },
    );

    let manager = AiManager::builder()
        .backend(Arc::new(mock))
        .prompts(prompts)
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            if let Event::AttemptFailed { attempt, reason, .. } = event {
                println!("attempt {} rejected: {}", attempt, reason);
            }
        })))
        .build()?;

    manager.add_schema(
        "review",
        json!({
            "type": "object",
            "required": ["title", "rating"],
            "properties": {
                "title": { "type": "string" },
                "rating": { "type": "number", "minimum": 0, "maximum": 10 }
            }
        }),
    )?;

    let data = PromptData::new().insert("movie", "Inception");
    match manager.chat("review", &data, None, true).await {
        ChatOutcome::Structured(value) => println!("review: {:#}", value),
        ChatOutcome::Failed(failure) => {
            println!("failed ({}): {}", failure.kind, failure.error);
            println!("{}", serde_json::to_string_pretty(&failure)?);
        }
        other => println!("unexpected outcome: {:?}", other),
    }

    Ok(())
}
