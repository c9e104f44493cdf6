#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use tokio::sync::mpsc;

use super::StreamAggregator;
use super::StreamOutcome;
use crate::domain::models::ApiError;
use crate::domain::models::Message;
use crate::domain::models::StreamEvent;
use crate::infrastructure::api::HistoryLoader;
use crate::infrastructure::api::StreamClient;
use crate::infrastructure::api::StreamHandle;

const DEFAULT_SESSION_ID: &str = "default";

/// Lifecycle of one send. Every send passes through `Sending` before
/// `Streaming`; `Idle` is the only state that accepts a new send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Sending,
    Streaming,
}

struct ActiveStream {
    aggregator: StreamAggregator,
    handle: Option<StreamHandle>,
    rx: Option<mpsc::UnboundedReceiver<StreamEvent>>,
}

/// Owns the message list for one session and drives sends through the
/// stream aggregator. All state mutation happens on the single logical task
/// calling into it, so each reconciliation step is atomic with respect to
/// reads.
pub struct SessionController {
    session_id: String,
    messages: Vec<Message>,
    last_error: Option<ApiError>,
    phase: SendPhase,
    active: Option<ActiveStream>,
    history: HistoryLoader,
    stream: StreamClient,
}

impl SessionController {
    pub fn new(history: HistoryLoader, stream: StreamClient, session_id: &str) -> SessionController {
        let mut id = session_id.trim().to_string();
        if id.is_empty() {
            id = DEFAULT_SESSION_ID.to_string();
        }

        return SessionController {
            session_id: id,
            messages: vec![],
            last_error: None,
            phase: SendPhase::Idle,
            active: None,
            history,
            stream,
        };
    }

    pub fn session_id(&self) -> &str {
        return &self.session_id;
    }

    pub fn messages(&self) -> &[Message] {
        return &self.messages;
    }

    pub fn is_loading(&self) -> bool {
        return self.phase != SendPhase::Idle;
    }

    pub fn phase(&self) -> SendPhase {
        return self.phase;
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        return self.last_error.as_ref();
    }

    /// Fetches the session's prior log. Failure is non-fatal: the session
    /// starts empty with `last_error` set instead of blocking.
    pub async fn load_history(&mut self) {
        match self.history.load(&self.session_id).await {
            Ok(loaded) => self.apply_history(loaded),
            Err(err) => {
                tracing::warn!(error = %err, session_id = self.session_id.as_str(), "Session starts empty");
                self.last_error = Some(err);
            }
        }
    }

    /// Loaded records go ahead of anything locally pending. Server-persisted
    /// messages all carry ids, so replacing the id-bearing prefix wholesale
    /// can never duplicate them.
    fn apply_history(&mut self, loaded: Vec<Message>) {
        let pending = self
            .messages
            .drain(..)
            .filter(|message| {
                return message.id.is_none();
            })
            .collect::<Vec<Message>>();

        self.messages = loaded;
        self.messages.extend(pending);
    }

    /// Validates and records a send without opening a channel: appends the
    /// user's message optimistically and arms a fresh aggregator. Returns
    /// false (a no-op) when the trimmed text is empty or a stream is already
    /// active.
    pub fn begin_send(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        if self.phase != SendPhase::Idle {
            tracing::warn!(session_id = self.session_id.as_str(), "Send rejected, a reply is still in flight");
            return false;
        }

        self.last_error = None;
        self.messages.push(Message::user(trimmed));
        self.active = Some(ActiveStream {
            aggregator: StreamAggregator::new(),
            handle: None,
            rx: None,
        });
        self.phase = SendPhase::Sending;

        return true;
    }

    /// Appends the user message and opens the live channel for the reply.
    pub fn send_message(&mut self, text: &str) -> bool {
        if !self.begin_send(text) {
            return false;
        }

        let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();
        let handle = self.stream.open(text.trim(), &self.session_id, tx);
        if let Some(active) = self.active.as_mut() {
            active.handle = Some(handle);
            active.rx = Some(rx);
        }

        return true;
    }

    /// Waits for the next channel event of the active stream. Returns None
    /// when no stream is active or the channel has closed.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        let rx = self.active.as_mut().and_then(|active| {
            return active.rx.as_mut();
        });

        match rx {
            Some(rx) => return rx.recv().await,
            None => return None,
        }
    }

    /// Applies one stream event. Terminal events settle the reply and return
    /// the controller to `Idle`; events arriving with no active stream are
    /// dropped.
    pub fn handle_event(&mut self, event: StreamEvent) {
        let mut active = match self.active.take() {
            Some(active) => active,
            None => return,
        };

        if self.phase == SendPhase::Sending && matches!(event, StreamEvent::Fragment(_)) {
            self.phase = SendPhase::Streaming;
        }

        match active.aggregator.apply(event, &mut self.messages) {
            StreamOutcome::Accumulating => {
                self.active = Some(active);
            }
            StreamOutcome::Finalized => {
                self.phase = SendPhase::Idle;
            }
            StreamOutcome::Failed(err) => {
                self.last_error = Some(err);
                self.phase = SendPhase::Idle;
            }
        }
    }

    /// Tears down the active stream, if any. The channel is closed, no
    /// further events mutate state, and already-applied partial content is
    /// retained. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Some(handle) = active.handle.take() {
                handle.cancel();
            }
            active.aggregator.release(&mut self.messages);
        }

        self.phase = SendPhase::Idle;
    }

    /// Non-streaming send: POST the message and append the whole reply at
    /// once. Same validation rules as `send_message`.
    pub async fn send_plain(&mut self, text: &str) -> Result<(), ApiError> {
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() || self.phase != SendPhase::Idle {
            return Ok(());
        }

        self.last_error = None;
        self.messages.push(Message::user(&trimmed));
        self.phase = SendPhase::Sending;

        let res = self.stream.send_plain(&trimmed, &self.session_id).await;
        self.phase = SendPhase::Idle;

        match res {
            Ok(content) => {
                self.messages.push(Message::assistant(&content));
                return Ok(());
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                return Err(err);
            }
        }
    }
}
