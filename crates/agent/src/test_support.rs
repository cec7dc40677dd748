//! Scripted mock provider shared by the agent unit tests.

use crabot_core::error::ProviderError;
use crabot_core::message::Message;
use crabot_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// What the mock does on one call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these fragments, then the completion signal.
    Chunks(Vec<String>),
    /// Return this text from `complete`, or as a single fragment when streamed.
    Text(String),
    /// Fail before any fragment is produced.
    Fail(ProviderError),
    /// Stream these fragments, then deliver the error.
    FailMidStream(Vec<String>, ProviderError),
    /// Stream these fragments, then close without the completion signal.
    Cut(Vec<String>),
    /// Open the stream and never send anything.
    Stall,
}

impl Script {
    pub fn chunks(parts: &[&str]) -> Self {
        Self::Chunks(parts.iter().map(|p| p.to_string()).collect())
    }

    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A provider that plays back scripted outcomes, one per call, and records
/// every request it receives.
///
/// When the script runs out it answers with `"ok"`.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
    credential: bool,
    stalled: Mutex<Vec<mpsc::Sender<Result<StreamChunk, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            credential: true,
            stalled: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `"ok"`.
    pub fn always_ok() -> Self {
        Self::new(vec![])
    }

    /// A provider whose credential is missing.
    pub fn without_credential() -> Self {
        Self {
            credential: false,
            ..Self::new(vec![])
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ProviderRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }

    fn next_script(&self, request: ProviderRequest) -> Script {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::text("ok"))
    }
}

fn usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let text = match self.next_script(request) {
            Script::Text(text) => text,
            Script::Chunks(parts) => parts.concat(),
            Script::Fail(e) | Script::FailMidStream(_, e) => return Err(e),
            Script::Cut(_) => {
                return Err(ProviderError::StreamInterrupted("connection closed".into()));
            }
            Script::Stall => std::future::pending().await,
        };
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(usage()),
            model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (parts, tail) = match self.next_script(request) {
            Script::Chunks(parts) => (parts, Ok(())),
            Script::Cut(parts) => {
                let (tx, rx) = mpsc::channel(parts.len().max(1));
                for part in parts {
                    tx.try_send(Ok(StreamChunk::text(part))).unwrap();
                }
                return Ok(rx);
            }
            Script::Text(text) => (vec![text], Ok(())),
            Script::Fail(e) => return Err(e),
            Script::FailMidStream(parts, e) => (parts, Err(e)),
            Script::Stall => {
                let (tx, rx) = mpsc::channel(1);
                self.stalled.lock().unwrap().push(tx);
                return Ok(rx);
            }
        };

        let (tx, rx) = mpsc::channel(parts.len() + 1);
        for part in parts {
            tx.try_send(Ok(StreamChunk::text(part))).unwrap();
        }
        let last = match tail {
            Ok(()) => Ok(StreamChunk {
                usage: Some(usage()),
                ..StreamChunk::done()
            }),
            Err(e) => Err(e),
        };
        tx.try_send(last).unwrap();
        Ok(rx)
    }
}
