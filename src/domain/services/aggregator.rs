#[cfg(test)]
#[path = "aggregator_test.rs"]
mod tests;

use uuid::Uuid;

use crate::domain::models::ApiError;
use crate::domain::models::Message;
use crate::domain::models::StreamEvent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Accumulating,
    Finalized,
    Failed(ApiError),
}

/// Accumulates one reply's fragments and reconciles them into the message
/// list, exactly once per event and once on completion.
///
/// A correlation token minted at construction identifies the provisional
/// assistant message this stream owns. Every reconciliation matches on that
/// token, so concurrent reads, replays of the same accumulated value, or
/// messages added by other code can never be confused with the live reply.
pub struct StreamAggregator {
    token: String,
    accumulated: String,
    outcome: StreamOutcome,
    settled: bool,
}

impl StreamAggregator {
    pub fn new() -> StreamAggregator {
        return StreamAggregator {
            token: Uuid::new_v4().to_string(),
            accumulated: "".to_string(),
            outcome: StreamOutcome::Accumulating,
            settled: false,
        };
    }

    pub fn token(&self) -> &str {
        return &self.token;
    }

    pub fn is_settled(&self) -> bool {
        return self.settled;
    }

    /// Applies one channel event to the message list. Once the stream has
    /// settled, further events are ignored.
    pub fn apply(&mut self, event: StreamEvent, messages: &mut Vec<Message>) -> StreamOutcome {
        if self.settled {
            return self.outcome.clone();
        }

        match event {
            StreamEvent::Fragment(fragment) => {
                self.accumulated += &fragment;
                self.reconcile(messages);
            }
            StreamEvent::Done => {
                self.settled = true;
                self.outcome = StreamOutcome::Finalized;
                // The token doubles as the finalize id. It only needs to be
                // locally unique, not a server id.
                let token = self.token.to_string();
                if let Some(current) = self.current_message(messages) {
                    current.finalize(&token);
                }
            }
            StreamEvent::Failed(err) => {
                self.settled = true;
                self.outcome = StreamOutcome::Failed(err);
                // Partial output stays visible. No rollback.
                if let Some(current) = self.current_message(messages) {
                    current.release();
                }
            }
        }

        return self.outcome.clone();
    }

    /// Settles the stream without a completion signal, freezing whatever
    /// content has been applied so far. Used on cancellation and teardown.
    pub fn release(&mut self, messages: &mut Vec<Message>) {
        if self.settled {
            return;
        }

        self.settled = true;
        self.outcome = StreamOutcome::Finalized;
        if let Some(current) = self.current_message(messages) {
            current.release();
        }
    }

    /// Idempotent: the provisional message's content is replaced with the
    /// full accumulated value, never appended to, so replaying the same
    /// value leaves the model unchanged.
    fn reconcile(&self, messages: &mut Vec<Message>) {
        let token = self.token.to_string();
        if let Some(current) = find_by_token(&token, messages) {
            current.set_content(&self.accumulated);
            return;
        }

        messages.push(Message::provisional(&token, &self.accumulated));
    }

    fn current_message<'a>(&self, messages: &'a mut Vec<Message>) -> Option<&'a mut Message> {
        return find_by_token(&self.token, messages);
    }
}

fn find_by_token<'a>(token: &str, messages: &'a mut Vec<Message>) -> Option<&'a mut Message> {
    return messages.iter_mut().rev().find(|message| {
        return message.local_id.as_deref() == Some(token);
    });
}
