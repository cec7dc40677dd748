//! The turn pipeline: one user message in, one assistant turn committed.
//!
//! Each turn follows the same cycle:
//!
//! 1. **Check** that the provider holds a credential and the text is non-empty
//! 2. **Append** the user turn to the session transcript
//! 3. **Build** the request: system instruction + the last N transcript turns
//! 4. **Stream** the reply, handing fragments to the caller as they arrive
//! 5. **Commit** the full reply, or an error-marked turn if anything failed
//!
//! A [`ReplyStream`] mutably borrows its session until the reply is
//! committed, so only one reply per session can be in flight.

use std::sync::Arc;
use std::time::Duration;

use crabot_core::error::{ProviderError, SessionError};
use crabot_core::message::{Message, Transcript};
use crabot_core::provider::{ChunkReceiver, Provider, ProviderRequest, Usage};
use crabot_core::session::Session;
use tracing::{debug, info, warn};

pub const DEFAULT_WINDOW: usize = 20;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Sends consultation turns to the model and records the replies.
pub struct TurnPipeline {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Sampling temperature
    temperature: f32,

    /// Cap on generated tokens per reply
    max_tokens: u32,

    /// How many trailing transcript turns go into each request
    window: usize,

    /// Limit on opening the stream and on each wait for a fragment
    timeout: Duration,
}

impl TurnPipeline {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            window: DEFAULT_WINDOW,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Number of trailing turns sent with each request. Clamped to at least one.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_credential(&self) -> bool {
        self.provider.has_credential()
    }

    /// The request for the next reply: the system instruction followed by
    /// the last `window` turns of `transcript`.
    pub fn build_request(&self, system: &str, transcript: &Transcript) -> ProviderRequest {
        let recent = transcript.window(self.window);
        let mut messages = Vec::with_capacity(recent.len() + 1);
        messages.push(Message::system(system));
        messages.extend(recent.iter().cloned());

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            stream: true,
        }
    }

    /// Record `user_text` and open the reply stream.
    ///
    /// Fails without touching the session when the provider has no
    /// credential or the text is blank. Any later failure (open, transport,
    /// timeout) is not an `Err` here: it surfaces as an error-marked turn
    /// when the stream is committed.
    pub async fn start<'s>(
        &self,
        session: &'s mut Session,
        system: &str,
        user_text: &str,
    ) -> crabot_core::Result<ReplyStream<'s>> {
        if !self.provider.has_credential() {
            warn!(provider = self.provider.name(), "No API key configured");
            return Err(ProviderError::MissingCredential.into());
        }
        if user_text.trim().is_empty() {
            return Err(SessionError::InvalidTurn("message is empty".into()).into());
        }

        session.append(Message::user(user_text))?;
        let request = self.build_request(system, session.transcript());

        info!(
            session_id = %session.id(),
            model = %self.model,
            messages = request.messages.len(),
            "Sending turn"
        );

        let state = match tokio::time::timeout(self.timeout, self.provider.stream(request)).await {
            Ok(Ok(rx)) => StreamState::Streaming(rx),
            Ok(Err(e)) => StreamState::Failed(e),
            Err(_) => StreamState::Failed(ProviderError::Timeout(self.timeout.as_secs())),
        };

        Ok(ReplyStream {
            session,
            state,
            buffer: String::new(),
            usage: None,
            timeout: self.timeout,
            committed: false,
        })
    }

    /// Run a whole turn without rendering fragments.
    pub async fn respond(
        &self,
        session: &mut Session,
        system: &str,
        user_text: &str,
    ) -> crabot_core::Result<Reply> {
        let stream = self.start(session, system, user_text).await?;
        Ok(stream.finish().await)
    }
}

enum StreamState {
    Streaming(ChunkReceiver),
    Complete,
    Failed(ProviderError),
}

/// A reply in flight. Drain it with [`next_chunk`](Self::next_chunk), then
/// [`finish`](Self::finish) to commit.
///
/// Dropping it before `finish` commits an error-marked "interrupted" turn;
/// partial content is never recorded.
pub struct ReplyStream<'s> {
    session: &'s mut Session,
    state: StreamState,
    buffer: String,
    usage: Option<Usage>,
    timeout: Duration,
    committed: bool,
}

impl ReplyStream<'_> {
    /// The next text fragment, or `None` once the reply has ended
    /// (successfully or not).
    pub async fn next_chunk(&mut self) -> Option<String> {
        loop {
            let StreamState::Streaming(rx) = &mut self.state else {
                return None;
            };

            match tokio::time::timeout(self.timeout, rx.recv()).await {
                Ok(Some(Ok(chunk))) => {
                    if chunk.usage.is_some() {
                        self.usage = chunk.usage;
                    }
                    if chunk.done {
                        self.state = StreamState::Complete;
                    }
                    if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                        self.buffer.push_str(&text);
                        return Some(text);
                    }
                }
                Ok(Some(Err(e))) => {
                    self.state = StreamState::Failed(e);
                }
                Ok(None) => {
                    self.state = StreamState::Failed(ProviderError::StreamInterrupted(
                        "stream closed before completion".into(),
                    ));
                }
                Err(_) => {
                    self.state = StreamState::Failed(ProviderError::Timeout(self.timeout.as_secs()));
                }
            }
        }
    }

    /// Text received so far. Not recorded unless the reply completes.
    pub fn partial(&self) -> &str {
        &self.buffer
    }

    /// Drain whatever is left and commit the assistant turn.
    pub async fn finish(mut self) -> Reply {
        while self.next_chunk().await.is_some() {}
        self.commit()
    }

    fn commit(&mut self) -> Reply {
        self.committed = true;

        let state = std::mem::replace(&mut self.state, StreamState::Complete);
        let failure = match state {
            StreamState::Complete => None,
            StreamState::Failed(e) => Some(e),
            StreamState::Streaming(_) => Some(ProviderError::StreamInterrupted(
                "reply interrupted before completion".into(),
            )),
        };

        let message = match &failure {
            None => Message::assistant(std::mem::take(&mut self.buffer)),
            Some(e) => {
                warn!(
                    session_id = %self.session.id(),
                    error = %e,
                    discarded_chars = self.buffer.chars().count(),
                    "Turn failed"
                );
                Message::error_reply(e)
            }
        };
        let text = message.content.clone();

        if let Err(e) = self.session.append(message) {
            warn!(error = %e, "Could not record assistant turn");
        }
        debug!(
            session_id = %self.session.id(),
            turns = self.session.transcript().len(),
            "Turn committed"
        );

        Reply {
            text,
            failure,
            usage: self.usage.take(),
        }
    }
}

impl Drop for ReplyStream<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.commit();
        }
    }
}

/// The committed outcome of one turn.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Content of the committed assistant turn.
    pub text: String,

    /// Why the turn failed, if it did. The text is then the error message.
    pub failure: Option<ProviderError>,

    /// Token usage reported by the provider, if any.
    pub usage: Option<Usage>,
}

impl Reply {
    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }
}
