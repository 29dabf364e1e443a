//! The validation-retry loop for structured chat replies.
//!
//! [`StructuredChat::run`] asks the model for data shaped like a registered
//! schema, then sanitizes, parses and checks each reply. It re-asks with the
//! identical prompt until a reply is usable or the retry budget is spent.
//!
//! ```text
//! schema? ─► prompt? ─► substitute ─► augment ─┐
//!                                              ▼
//!        ┌──── retry ◄── invalid ◄── check ◄── complete ◄──┐
//!        └─────────────────────────────────────────────────┘
//! ```
//!
//! Setup problems (missing schema, prompt or data keys) fail before any
//! completion request is made.

use crate::error::AiError;
use crate::events::{emit, Event};
use crate::output_parser::parse_structured;
use crate::prompt::{augment_with_schema, substitute};
use crate::prompt_library::PromptLibrary;
use crate::retry::RetryConfig;
use crate::schema::{SchemaEntry, SchemaStore};
use crate::transport::Transport;
use crate::types::{ChatFailure, FailureKind, PromptData};
use crate::validation::ValidationResult;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

/// One validated chat call over borrowed collaborators.
pub struct StructuredChat<'a> {
    pub transport: &'a Transport,
    pub prompts: &'a PromptLibrary,
    pub schemas: &'a SchemaStore,
    pub retry: &'a RetryConfig,
}

impl StructuredChat<'_> {
    /// Run the loop for `prompt_name` and return the first valid data.
    #[instrument(skip(self, data), fields(max_retries = self.retry.max_retries))]
    pub async fn run(
        &self,
        prompt_name: &str,
        data: &PromptData,
        model: &str,
    ) -> Result<Value, ChatFailure> {
        // One snapshot for the whole call; later registrations do not affect retries.
        let schemas = self.schemas.snapshot();
        let Some(entry) = schemas.get(prompt_name) else {
            warn!("no schema registered for prompt");
            return Err(ChatFailure::before_call(
                FailureKind::NoSchema,
                format!("no schema found for prompt '{}'", prompt_name),
                prompt_name,
            ));
        };
        let Some(schema_content) = entry.prompt_content() else {
            error!("schema has no content to show the model");
            return Err(ChatFailure::before_call(
                FailureKind::SchemaContentMissing,
                format!("schema '{}' has no content", prompt_name),
                prompt_name,
            ));
        };
        let Some(template) = self.prompts.resolve(prompt_name) else {
            error!("prompt not found");
            return Err(ChatFailure::before_call(
                FailureKind::PromptNotFound,
                format!("prompt '{}' not found", prompt_name),
                prompt_name,
            ));
        };
        let base_prompt = substitute(template.user_text(), data).map_err(|missing| {
            error!(keys = ?missing.0, "prompt data is missing placeholder values");
            ChatFailure::before_call(
                FailureKind::MissingKeys(missing.keys()),
                missing.to_string(),
                prompt_name,
            )
        })?;

        let augmented = augment_with_schema(
            &base_prompt,
            &schema_content,
            self.retry.schema_template.as_deref(),
        );
        let messages = template.messages_with_user(augmented);

        let handler = &self.transport.event_handler;
        let max_attempts = self.retry.max_attempts();
        let mut last_response: Option<String> = None;
        let mut last_result: Option<ValidationResult> = None;

        for attempt in 1..=max_attempts {
            let final_attempt = attempt == max_attempts;
            emit(
                handler,
                Event::AttemptStart {
                    prompt: prompt_name.to_string(),
                    attempt,
                },
            );
            debug!(attempt, "requesting structured reply");

            let reply = match self.transport.complete(&messages, model).await {
                Ok(reply) => reply,
                Err(fault) => {
                    warn!(attempt, error = %fault, "completion failed");
                    self.attempt_failed(prompt_name, attempt, fault.to_string());
                    if final_attempt {
                        return Err(self.give_up(
                            FailureKind::RuntimeFault,
                            fault_message(attempt, &fault),
                            attempt,
                            last_response,
                            last_result,
                            prompt_name,
                        ));
                    }
                    continue;
                }
            };

            if reply.is_empty() {
                error!(attempt, "model returned an empty response");
                self.attempt_failed(prompt_name, attempt, "empty response".to_string());
                continue;
            }

            match self.check_reply(&reply, entry) {
                ValidationResult {
                    valid: true,
                    data: Some(data),
                    format,
                    ..
                } => {
                    info!(attempt, %format, "structured reply accepted");
                    emit(
                        handler,
                        Event::ValidationEnd {
                            prompt: prompt_name.to_string(),
                            attempts: attempt,
                            success: true,
                        },
                    );
                    return Ok(data);
                }
                rejected => {
                    warn!(attempt, errors = ?rejected.errors, "structured reply rejected");
                    self.attempt_failed(prompt_name, attempt, rejected.errors.join("; "));
                    if final_attempt {
                        return Err(self.give_up(
                            FailureKind::ParseFailure,
                            format!("validation failed after {} attempts", attempt),
                            attempt,
                            Some(reply),
                            Some(rejected),
                            prompt_name,
                        ));
                    }
                    last_response = Some(reply);
                    last_result = Some(rejected);
                }
            }
        }

        // Reached only when the final attempt came back empty.
        Err(self.give_up(
            FailureKind::EmptyResponse,
            format!("empty response on final attempt ({} attempts)", max_attempts),
            max_attempts,
            last_response,
            last_result,
            prompt_name,
        ))
    }

    /// Parse a reply, then apply the formal schema and the semantic validator.
    fn check_reply(&self, reply: &str, entry: &SchemaEntry) -> ValidationResult {
        let parsed = parse_structured(reply);
        let Some(data) = parsed.data.as_ref().filter(|_| parsed.valid) else {
            return parsed;
        };

        if let Some(schema) = entry.as_formal() {
            let verdict = schema.validate(data);
            if !verdict.valid {
                return parsed.rejected(verdict.error_messages());
            }
        }

        if let Some(validator) = &self.retry.validator {
            if let Err(reason) = validator(&parsed.sanitized_response, data) {
                return parsed.rejected(vec![reason]);
            }
        }

        parsed
    }

    fn attempt_failed(&self, prompt_name: &str, attempt: u32, reason: String) {
        emit(
            &self.transport.event_handler,
            Event::AttemptFailed {
                prompt: prompt_name.to_string(),
                attempt,
                reason,
            },
        );
    }

    fn give_up(
        &self,
        kind: FailureKind,
        error: String,
        attempts: u32,
        last_response: Option<String>,
        validation_result: Option<ValidationResult>,
        prompt_name: &str,
    ) -> ChatFailure {
        error!(attempts, %kind, "structured chat gave up");
        emit(
            &self.transport.event_handler,
            Event::ValidationEnd {
                prompt: prompt_name.to_string(),
                attempts,
                success: false,
            },
        );
        ChatFailure {
            kind,
            error,
            attempts: Some(attempts),
            last_response,
            validation_result,
            prompt_name: prompt_name.to_string(),
        }
    }
}

fn fault_message(attempts: u32, fault: &AiError) -> String {
    format!("completion failed after {} attempts: {}", attempts, fault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockReply, Role};
    use crate::events::{EventHandler, FnEventHandler};
    use crate::prompt::PromptTemplate;
    use crate::validation::Format;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const PROFILE_EXAMPLE: &str = r#"{"name": "...", "age": 0}"#;
    const GOOD: &str = r#"{"name": "Ada", "age": 36}"#;

    struct Harness {
        transport: Transport,
        prompts: PromptLibrary,
        schemas: SchemaStore,
        retry: RetryConfig,
        mock: Arc<MockBackend>,
    }

    impl Harness {
        fn new(script: Vec<MockReply>, max_retries: u32) -> Self {
            Self::with_handler(script, max_retries, None)
        }

        fn with_handler(
            script: Vec<MockReply>,
            max_retries: u32,
            handler: Option<Arc<dyn EventHandler>>,
        ) -> Self {
            let mock = Arc::new(MockBackend::scripted(script));
            let transport = Transport::builder("http://unused")
                .backend(mock.clone())
                .event_handler(handler)
                .build()
                .unwrap();
            let prompts = PromptLibrary::new()
                .with_prompt(
                    "profile",
                    PromptTemplate::SystemUser {
                        system: "You are terse.".into(),
                        user: "Describe {person}".into(),
                    },
                )
                .with_prompt("greet", PromptTemplate::Plain("Say hello to {name}".into()))
                .with_prompt("person", PromptTemplate::Plain("Describe {who}".into()));
            let schemas = SchemaStore::new();
            schemas.register_example("profile", PROFILE_EXAMPLE);
            schemas
                .register_schema(
                    "person",
                    json!({
                        "type": "object",
                        "properties": {"name": {"type": "string"}},
                        "required": ["name"]
                    }),
                )
                .unwrap();
            Self {
                transport,
                prompts,
                schemas,
                retry: RetryConfig::new(max_retries),
                mock,
            }
        }

        async fn run(&self, prompt: &str, data: &PromptData) -> Result<Value, ChatFailure> {
            StructuredChat {
                transport: &self.transport,
                prompts: &self.prompts,
                schemas: &self.schemas,
                retry: &self.retry,
            }
            .run(prompt, data, "gpt-test")
            .await
        }
    }

    fn text(s: &str) -> MockReply {
        MockReply::Text(s.to_string())
    }

    fn ada() -> PromptData {
        PromptData::new().insert("person", "Ada Lovelace")
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let h = Harness::new(vec![text(GOOD)], 3);
        let data = h.run("profile", &ada()).await.unwrap();
        assert_eq!(data, json!({"name": "Ada", "age": 36}));
        assert_eq!(h.mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_early_success_stops_retrying() {
        let h = Harness::new(
            vec![text("nope"), text("still prose"), text(GOOD), text("unused")],
            3,
        );
        let data = h.run("profile", &ada()).await.unwrap();
        assert_eq!(data["name"], "Ada");
        assert_eq!(h.mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_bound_exhausted() {
        let h = Harness::new(vec![text("not json or yaml")], 2);
        let failure = h.run("profile", &ada()).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::ParseFailure);
        assert_eq!(failure.attempts, Some(3));
        assert_eq!(failure.prompt_name, "profile");
        assert_eq!(failure.last_response.as_deref(), Some("not json or yaml"));
        let result = failure.validation_result.unwrap();
        assert!(!result.valid);
        assert!(result.errors[0].starts_with("JSON error:"));
        assert!(result.errors[1].starts_with("YAML error:"));
        assert_eq!(h.mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let h = Harness::new(vec![text("prose")], 0);
        let failure = h.run("profile", &ada()).await.unwrap_err();
        assert_eq!(failure.attempts, Some(1));
        assert_eq!(h.mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_keys_fail_before_any_call() {
        let h = Harness::new(vec![text(GOOD)], 3);
        let failure = h.run("profile", &PromptData::new()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::MissingKeys(vec!["person".into()]));
        assert!(failure.attempts.is_none());
        assert_eq!(h.mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_schema() {
        let h = Harness::new(vec![text(GOOD)], 3);
        let failure = h
            .run("greet", &PromptData::new().insert("name", "Alice"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::NoSchema);

        let failure = h.run("unknown", &PromptData::new()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NoSchema);
        assert_eq!(h.mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_prompt_not_found() {
        let h = Harness::new(vec![text(GOOD)], 3);
        h.schemas.register_example("orphan", "a: 1");
        let failure = h.run("orphan", &PromptData::new()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::PromptNotFound);
        assert_eq!(h.mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_schema_content_missing() {
        let h = Harness::new(vec![text(GOOD)], 3);
        h.schemas.register_example("profile", "   ");
        let failure = h.run("profile", &ada()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::SchemaContentMissing);
        assert_eq!(h.mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_only_user_part_is_augmented_and_retries_are_identical() {
        let h = Harness::new(vec![text("prose"), text(GOOD)], 3);
        h.run("profile", &ada()).await.unwrap();

        let requests = h.mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[0].model, "gpt-test");

        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are terse.");
        assert_eq!(messages[1].role, Role::User);
        assert!(messages[1]
            .content
            .starts_with("Describe Ada Lovelace\n\nPlease respond with structured data"));
        assert!(messages[1].content.contains(PROFILE_EXAMPLE));
    }

    #[tokio::test]
    async fn test_custom_schema_template() {
        let mut h = Harness::new(vec![text(GOOD)], 0);
        h.retry = RetryConfig::new(0).with_schema_template("{base_prompt}\n###\n{schema_example}");
        h.run("profile", &ada()).await.unwrap();

        let user = &h.mock.requests()[0].messages[1].content;
        assert_eq!(user, &format!("Describe Ada Lovelace\n###\n{}", PROFILE_EXAMPLE));
    }

    #[tokio::test]
    async fn test_fault_on_final_attempt_is_runtime_fault() {
        let h = Harness::new(vec![MockReply::Fault("connection reset".into())], 1);
        let failure = h.run("profile", &ada()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::RuntimeFault);
        assert_eq!(failure.attempts, Some(2));
        assert!(failure.error.contains("connection reset"));
        assert_eq!(h.mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_fault_is_absorbed_when_attempts_remain() {
        let h = Harness::new(vec![MockReply::Fault("timeout".into()), text(GOOD)], 1);
        let data = h.run("profile", &ada()).await.unwrap();
        assert_eq!(data["age"], 36);
    }

    #[tokio::test]
    async fn test_empty_responses_exhaust_budget() {
        let h = Harness::new(vec![text("   ")], 1);
        let failure = h.run("profile", &ada()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::EmptyResponse);
        assert_eq!(failure.attempts, Some(2));
        assert!(failure.last_response.is_none());
        assert_eq!(h.mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_final_attempt_keeps_earlier_reply() {
        let h = Harness::new(vec![text("prose"), text("")], 1);
        let failure = h.run("profile", &ada()).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::EmptyResponse);
        assert_eq!(failure.last_response.as_deref(), Some("prose"));
        assert!(failure.validation_result.is_some());
    }

    #[tokio::test]
    async fn test_yaml_reply_accepted() {
        let h = Harness::new(vec![text("```yaml\nname: Ada\nage: 36\n```")], 0);
        let data = h.run("profile", &ada()).await.unwrap();
        assert_eq!(data, json!({"name": "Ada", "age": 36}));
    }

    #[tokio::test]
    async fn test_formal_schema_violation_triggers_retry() {
        let h = Harness::new(vec![text(r#"{"name": 7}"#), text(r#"{"name": "Ada"}"#)], 2);
        let data = h
            .run("person", &PromptData::new().insert("who", "Ada"))
            .await
            .unwrap();
        assert_eq!(data, json!({"name": "Ada"}));
        assert_eq!(h.mock.calls(), 2);

        let user = &h.mock.requests()[0].messages[0].content;
        assert!(user.contains("\"required\""));
    }

    #[tokio::test]
    async fn test_formal_schema_violation_reported() {
        let h = Harness::new(vec![text(r#"{"name": 7}"#)], 0);
        let failure = h
            .run("person", &PromptData::new().insert("who", "Ada"))
            .await
            .unwrap_err();
        let result = failure.validation_result.unwrap();
        assert_eq!(result.format, Format::Json);
        assert_eq!(result.data, Some(json!({"name": 7})));
        assert!(result.errors[0].starts_with("at /name:"));
    }

    #[tokio::test]
    async fn test_semantic_validator_rejects() {
        let mut h = Harness::new(vec![text(r#"{"name": "Ada"}"#), text(GOOD)], 2);
        h.retry = RetryConfig::new(2).requiring_keys(&["age"]);
        let data = h.run("profile", &ada()).await.unwrap();
        assert_eq!(data["age"], 36);
        assert_eq!(h.mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |e: Event| {
            sink.lock().unwrap().push(e);
        }));
        let h = Harness::with_handler(vec![text("prose"), text(GOOD)], 3, Some(handler));
        h.run("profile", &ada()).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Event::AttemptStart { attempt: 1, .. }));
        assert!(matches!(events[1], Event::AttemptFailed { attempt: 1, .. }));
        assert!(matches!(events[2], Event::AttemptStart { attempt: 2, .. }));
        assert!(matches!(
            events[3],
            Event::ValidationEnd { attempts: 2, success: true, .. }
        ));
    }
}
