//! End-to-end integration tests for the crabot consultation core.
//!
//! These tests drive the `Consultant` the way the terminal shell does:
//! user text in, streamed reply out, session exports and reports on disk.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crabot_agent::{Consultant, KnowledgeLoader, REPORT_SECTIONS};
use crabot_config::AppConfig;
use crabot_core::error::{Error, ProviderError, ReportError, SessionError};
use crabot_core::message::{ERROR_MARKER, Message, Role};
use crabot_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};
use crabot_core::session::{Session, WELCOME_MESSAGE};
use crabot_providers::OpenAiCompatProvider;

// ── Mock Provider ────────────────────────────────────────────────────────

type Outcome = Result<Vec<&'static str>, ProviderError>;

/// A mock provider that plays scripted outcomes in sequence and records
/// every request. Falls back to a short canned reply when the script ends.
struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Outcome>>,
    requests: Mutex<Vec<ProviderRequest>>,
    credential: bool,
}

impl ScriptedProvider {
    fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
            credential: true,
        }
    }

    fn keyless() -> Self {
        Self {
            credential: false,
            ..Self::new(vec![])
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }

    fn next(&self, request: ProviderRequest) -> Outcome {
        self.requests.lock().unwrap().push(request);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(vec!["Understood. ", "Tell me more."]))
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let parts = self.next(request)?;
        Ok(ProviderResponse {
            message: Message::assistant(parts.concat()),
            usage: None,
            model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let parts = self.next(request)?;
        let (tx, rx) = tokio::sync::mpsc::channel(parts.len() + 1);
        for part in parts {
            tx.send(Ok(StreamChunk::text(part))).await.unwrap();
        }
        tx.send(Ok(StreamChunk::done())).await.unwrap();
        Ok(rx)
    }
}

fn consultant_with(provider: Arc<ScriptedProvider>, config: &AppConfig) -> Consultant {
    Consultant::with_provider(
        config,
        provider,
        KnowledgeLoader::preloaded("Springfield has 4 stations and 2 nursing homes."),
    )
}

fn consultant(provider: Arc<ScriptedProvider>) -> Consultant {
    consultant_with(provider, &AppConfig::default())
}

// ═════════════════════════════════════════════════════════════════════════
//  Transcript order, reset
// ═════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_turns_are_recorded_in_order() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(vec!["Welcome, Chief."]),
        Ok(vec!["What is your response area?"]),
    ]));
    let consultant = consultant(provider);
    let mut session = Session::create();

    consultant
        .respond(&mut session, "I'm Chief Smith from Springfield FD")
        .await
        .unwrap();
    consultant
        .respond(&mut session, "We're a combination department")
        .await
        .unwrap();

    let turns: Vec<_> = session
        .transcript()
        .iter()
        .map(|t| (t.role, t.content.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (Role::Assistant, WELCOME_MESSAGE),
            (Role::User, "I'm Chief Smith from Springfield FD"),
            (Role::Assistant, "Welcome, Chief."),
            (Role::User, "We're a combination department"),
            (Role::Assistant, "What is your response area?"),
        ]
    );
}

#[tokio::test]
async fn e2e_reset_returns_welcome_only() {
    let consultant = consultant(Arc::new(ScriptedProvider::new(vec![])));
    let mut session = Session::create();
    session.set_profile("name", "Chief Smith");
    for i in 0..4 {
        consultant
            .respond(&mut session, &format!("answer {i}"))
            .await
            .unwrap();
    }
    let old_id = session.id().clone();

    let session = session.reset();

    assert_eq!(session.transcript().len(), 1);
    assert_eq!(
        session.transcript().first().unwrap(),
        &Message::assistant(WELCOME_MESSAGE)
    );
    assert!(session.profile().is_empty());
    assert_ne!(session.id(), &old_id);
}

// ═════════════════════════════════════════════════════════════════════════
//  Request window, streaming
// ═════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_window_is_system_plus_last_twenty() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let consultant = consultant(provider.clone());
    let mut session = Session::create();

    for i in 0..15 {
        consultant
            .respond(&mut session, &format!("detail {i}"))
            .await
            .unwrap();
    }

    // 15th call: transcript held 1 + 14*2 + 1 = 30 turns when sent
    let request = provider.request(14);
    assert_eq!(request.messages.len(), 21);
    assert_eq!(request.messages[0].role, Role::System);
    assert_eq!(request.messages[0].content, consultant.system_instruction());
    assert_eq!(&request.messages[1..], &session.transcript().as_slice()[10..30]);

    // early calls send everything
    assert_eq!(provider.request(0).messages.len(), 3);
}

#[tokio::test]
async fn e2e_streamed_chunks_commit_concatenation() {
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![
        "Older ", "housing ", "stock ", "raises ", "fire ", "risk.",
    ])]));
    let consultant = consultant(provider);
    let mut session = Session::create();

    let mut stream = consultant
        .start_turn(&mut session, "Why does housing age matter?")
        .await
        .unwrap();
    let mut rendered = String::new();
    let mut fragments = 0;
    while let Some(chunk) = stream.next_chunk().await {
        rendered.push_str(&chunk);
        fragments += 1;
    }
    let reply = stream.finish().await;

    assert_eq!(fragments, 6);
    assert_eq!(rendered, "Older housing stock raises fire risk.");
    assert_eq!(reply.text, rendered);
    assert_eq!(
        session.transcript().last().unwrap(),
        &Message::assistant("Older housing stock raises fire risk.")
    );
}

// ═════════════════════════════════════════════════════════════════════════
//  Failures
// ═════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_missing_credential_zero_calls() {
    let provider = Arc::new(ScriptedProvider::keyless());
    let consultant = consultant(provider.clone());
    let mut session = Session::create();

    let err = consultant.respond(&mut session, "hello").await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::MissingCredential)));

    let err = consultant.generate_report(&session).await.unwrap_err();
    assert_eq!(
        err,
        ReportError::GenerationFailed(ProviderError::MissingCredential)
    );

    assert_eq!(provider.calls(), 0);
    assert_eq!(session.transcript().len(), 1);
}

#[tokio::test]
async fn e2e_transport_failure_on_third_call() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(vec!["one"]),
        Ok(vec!["two"]),
        Err(ProviderError::Network("connection refused".into())),
    ]));
    let consultant = consultant(provider.clone());
    let mut session = Session::create();

    consultant.respond(&mut session, "a").await.unwrap();
    consultant.respond(&mut session, "b").await.unwrap();
    let before = session.transcript().len();
    let reply = consultant.respond(&mut session, "c").await.unwrap();

    assert_eq!(session.transcript().len(), before + 2);
    let last = session.transcript().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.error);
    assert!(last.content.starts_with(ERROR_MARKER));
    assert_eq!(last.content, reply.text);
    assert_eq!(provider.calls(), 3);

    // the session keeps working afterwards
    let reply = consultant.respond(&mut session, "d").await.unwrap();
    assert!(!reply.is_error());
}

#[tokio::test]
async fn e2e_blank_input_is_invalid_turn() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let consultant = consultant(provider.clone());
    let mut session = Session::create();

    let err = consultant.respond(&mut session, "  ").await.unwrap_err();
    assert!(matches!(err, Error::Session(SessionError::InvalidTurn(_))));
    assert_eq!(provider.calls(), 0);
}

// ═════════════════════════════════════════════════════════════════════════
//  Knowledge
// ═════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_missing_knowledge_uses_fallback_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.knowledge.path = dir.path().join("knowledge_base.md");
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let consultant = Consultant::with_provider(
        &config,
        provider.clone(),
        KnowledgeLoader::new(&config.knowledge.path),
    );

    assert!(consultant.knowledge().contains("OFIRMS"));
    assert!(consultant.knowledge().contains("SVI"));

    let mut session = Session::create();
    consultant.respond(&mut session, "hi").await.unwrap();
    let system = &provider.request(0).messages[0].content;
    assert!(system.contains("REFERENCE KNOWLEDGE"));
    assert!(system.contains("OFIRMS"));
}

#[tokio::test]
async fn e2e_knowledge_document_reaches_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("knowledge_base.md");
    std::fs::write(&path, "Hydrant flow tests are overdue in the east district.").unwrap();
    let mut config = AppConfig::default();
    config.knowledge.path = path.clone();
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let consultant =
        Consultant::with_provider(&config, provider.clone(), KnowledgeLoader::new(&path));

    let mut session = Session::create();
    consultant.respond(&mut session, "hi").await.unwrap();

    let system = &provider.request(0).messages[0].content;
    assert!(system.contains("Hydrant flow tests are overdue"));
}

// ═════════════════════════════════════════════════════════════════════════
//  Reports and exports
// ═════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn e2e_full_consultation_report_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.export.dir = dir.path().to_path_buf();

    let mut outcomes: Vec<Outcome> = (0..5).map(|_| Ok(vec!["Noted."])).collect();
    outcomes.push(Ok(vec!["# CRA Report\n\n## Executive Summary\nSpringfield..."]));
    let provider = Arc::new(ScriptedProvider::new(outcomes));
    let consultant = consultant_with(provider.clone(), &config);

    let mut session = Session::create();
    session.set_profile("name", "Chief Smith");
    assert!(!consultant.export_ready(&session));

    for answer in [
        "I'm Chief Smith from Springfield FD",
        "We run 4 stations",
        "Population is about 60,000",
        "Two nursing homes near the river",
        "Our OFIRMS data goes back to 2015",
    ] {
        consultant.respond(&mut session, answer).await.unwrap();
        if session.transcript().len() <= 10 {
            assert!(!consultant.report_ready(&session));
        }
    }
    assert_eq!(session.transcript().len(), 11);
    assert!(consultant.export_ready(&session));
    assert!(consultant.report_ready(&session));

    // Report: one call, transcript untouched
    let before = session.transcript().clone();
    let report = consultant.generate_report(&session).await.unwrap();
    assert_eq!(session.transcript(), &before);
    assert_eq!(provider.calls(), 6);
    assert!(report.markdown.starts_with("# CRA Report"));

    let report_request = provider.request(5);
    assert!(!report_request.stream);
    assert!(report_request.max_tokens.is_none());
    let prompt = &report_request.messages[1].content;
    assert!(prompt.contains("USER: We run 4 stations"));
    for section in REPORT_SECTIONS {
        assert!(prompt.contains(section));
    }

    // Exports
    let report_path = consultant.export_report(&report).unwrap();
    assert_eq!(
        report_path.file_name().unwrap().to_str().unwrap(),
        format!("CRA_Report_{}.md", session.id())
    );
    assert_eq!(std::fs::read_to_string(&report_path).unwrap(), report.markdown);

    let session_path = consultant.export_session(&session).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&session_path).unwrap()).unwrap();
    assert_eq!(json["session_id"], session.id().as_str());
    assert_eq!(json["message_count"], 11);
    assert_eq!(json["user_info"]["name"], "Chief Smith");
    assert_eq!(json["messages"][0]["role"], "assistant");
    assert_eq!(json["messages"][1]["content"], "I'm Chief Smith from Springfield FD");
    assert!(json["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn e2e_report_failure_leaves_session_alone() {
    let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::ApiError {
        status_code: 503,
        message: "overloaded".into(),
    })]));
    let consultant = consultant(provider);
    let session = Session::create();

    let err = consultant.generate_report(&session).await.unwrap_err();
    assert!(err.to_string().contains("overloaded"));
    assert_eq!(session.transcript().len(), 1);
}

// ═════════════════════════════════════════════════════════════════════════
//  Real provider over HTTP
// ═════════════════════════════════════════════════════════════════════════

mod http {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(lines: &[&str]) -> String {
        lines.iter().map(|l| format!("data: {l}\n\n")).collect()
    }

    #[tokio::test]
    async fn e2e_streaming_over_http() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"{"choices":[{"delta":{"content":"Which "},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"county?"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "stream": true,
                "max_tokens": 1000,
                "model": "gpt-4"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = Arc::new(OpenAiCompatProvider::new("openai", server.uri(), "sk-test"));
        let consultant = Consultant::with_provider(
            &AppConfig::default(),
            provider,
            KnowledgeLoader::preloaded("notes"),
        );
        let mut session = Session::create();

        let reply = consultant
            .respond(&mut session, "We're in rural Ohio")
            .await
            .unwrap();

        assert_eq!(reply.text, "Which county?");
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn e2e_rejected_key_becomes_error_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let provider = Arc::new(OpenAiCompatProvider::new("openai", server.uri(), "sk-bad"));
        let consultant = Consultant::with_provider(
            &AppConfig::default(),
            provider,
            KnowledgeLoader::preloaded("notes"),
        );
        let mut session = Session::create();

        let reply = consultant.respond(&mut session, "hello").await.unwrap();

        assert!(matches!(
            reply.failure,
            Some(ProviderError::AuthenticationFailed(_))
        ));
        let last = session.transcript().last().unwrap();
        assert!(last.error);
        assert!(last.content.contains("Incorrect API key provided"));
        assert!(last.content.ends_with("Please check your API key and try again."));
    }
}
