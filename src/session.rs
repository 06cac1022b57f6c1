//! Conversation state and its transitions.
//!
//! The session is an explicit value updated only through transition
//! functions - each one consumes the old state and returns the next, so
//! every mutation of the message list goes through a single place. The
//! `App` owns the current value and swaps it on each event.

use serde::{Deserialize, Serialize};

use crate::reveal::Reveal;

/// A chat message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Default)]
enum Phase {
    #[default]
    Idle,
    /// A request task is in flight.
    Waiting,
    /// A response arrived and is being revealed word by word.
    Revealing(Reveal),
}

/// Outcome of a submit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    Accepted,
    /// Draft was empty or whitespace-only; nothing happened.
    Blank,
    /// A request or reveal is still active; nothing happened.
    Busy,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    messages: Vec<ChatMessage>,
    phase: Phase,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// True while a request is in flight or a reveal is running. New
    /// submissions are always gated on this.
    pub fn is_busy(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.phase, Phase::Waiting)
    }

    pub fn is_revealing(&self) -> bool {
        matches!(self.phase, Phase::Revealing(_))
    }

    /// Try to submit a draft. Accepted drafts are appended as a user turn
    /// (trimmed) and the session enters `Waiting`; the caller is expected
    /// to dispatch the actual request.
    #[must_use]
    pub fn submit(mut self, draft: &str) -> (Self, Submit) {
        if self.is_busy() {
            return (self, Submit::Busy);
        }
        let text = draft.trim();
        if text.is_empty() {
            return (self, Submit::Blank);
        }
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: text.to_string(),
        });
        self.phase = Phase::Waiting;
        (self, Submit::Accepted)
    }

    /// A response arrived: append an empty assistant turn and start
    /// revealing into it. Ignored unless a request was in flight.
    #[must_use]
    pub fn request_succeeded(mut self, response: &str) -> Self {
        if !matches!(self.phase, Phase::Waiting) {
            return self;
        }
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: String::new(),
        });
        self.phase = Phase::Revealing(Reveal::new(response));
        self
    }

    /// The request failed: surface a single synthetic assistant turn with
    /// the error text and re-enable input. Ignored unless a request was in
    /// flight.
    #[must_use]
    pub fn request_failed(mut self, error: &str) -> Self {
        if !matches!(self.phase, Phase::Waiting) {
            return self;
        }
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: format!("Error: {error}"),
        });
        self.phase = Phase::Idle;
        self
    }

    /// One reveal timer tick: show one more word in the last message. The
    /// tick that shows the final word (or the first tick of an empty
    /// response) also tears the reveal down. Ignored when not revealing.
    #[must_use]
    pub fn reveal_tick(mut self) -> Self {
        self.phase = match std::mem::take(&mut self.phase) {
            Phase::Revealing(mut reveal) => {
                if reveal.is_done() {
                    Phase::Idle
                } else {
                    reveal.advance();
                    if let Some(last) = self.messages.last_mut() {
                        last.content = reveal.revealed();
                    }
                    if reveal.is_done() {
                        Phase::Idle
                    } else {
                        Phase::Revealing(reveal)
                    }
                }
            }
            other => other,
        };
        self
    }

    /// Cancel an active reveal, keeping whatever was already shown as the
    /// final message content. A stop with no reveal active is a no-op.
    #[must_use]
    pub fn stop_reveal(mut self) -> Self {
        if let Phase::Revealing(_) = self.phase {
            self.phase = Phase::Idle;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_content(session: &Session) -> &str {
        &session.messages().last().unwrap().content
    }

    #[test]
    fn test_blank_submit_is_rejected() {
        let session = Session::new();
        let (session, outcome) = session.submit("");
        assert_eq!(outcome, Submit::Blank);
        let (session, outcome) = session.submit("   \t ");
        assert_eq!(outcome, Submit::Blank);
        assert!(session.messages().is_empty());
        assert!(!session.is_busy());
    }

    #[test]
    fn test_submit_appends_trimmed_user_turn_and_waits() {
        let (session, outcome) = Session::new().submit("  hello there  ");
        assert_eq!(outcome, Submit::Accepted);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, ChatRole::User);
        assert_eq!(session.messages()[0].content, "hello there");
        assert!(session.is_waiting());
    }

    #[test]
    fn test_submit_while_waiting_is_rejected() {
        let (session, _) = Session::new().submit("first");
        let (session, outcome) = session.submit("second");
        assert_eq!(outcome, Submit::Busy);
        assert_eq!(session.messages().len(), 1);
        assert!(session.is_waiting());
    }

    #[test]
    fn test_submit_while_revealing_leaves_reveal_untouched() {
        let (session, _) = Session::new().submit("question");
        let session = session.request_succeeded("two words").reveal_tick();
        assert_eq!(last_content(&session), "two");

        let (session, outcome) = session.submit("another");
        assert_eq!(outcome, Submit::Busy);
        assert_eq!(session.messages().len(), 2);
        assert_eq!(last_content(&session), "two");
        assert!(session.is_revealing());

        // the reveal continues where it was
        let session = session.reveal_tick();
        assert_eq!(last_content(&session), "two words");
        assert!(!session.is_busy());
    }

    #[test]
    fn test_reveal_runs_one_word_per_tick_then_auto_stops() {
        let (session, _) = Session::new().submit("how are you");
        let mut session = session.request_succeeded("I am fine today");
        assert!(session.is_revealing());
        assert_eq!(last_content(&session), "");

        let expected = ["I", "I am", "I am fine", "I am fine today"];
        for text in expected {
            session = session.reveal_tick();
            assert_eq!(last_content(&session), text);
        }
        // the fourth tick showed the last word and tore the reveal down
        assert!(!session.is_busy());
    }

    #[test]
    fn test_reveal_normalizes_internal_whitespace() {
        let (session, _) = Session::new().submit("q");
        let mut session = session.request_succeeded("I   am\n\nfine\ttoday");
        for _ in 0..4 {
            session = session.reveal_tick();
        }
        assert_eq!(last_content(&session), "I am fine today");
        assert!(!session.is_busy());
    }

    #[test]
    fn test_empty_response_tears_down_on_first_tick() {
        let (session, _) = Session::new().submit("q");
        let session = session.request_succeeded("");
        assert!(session.is_revealing());
        assert_eq!(last_content(&session), "");

        let session = session.reveal_tick();
        assert!(!session.is_busy());
        assert_eq!(last_content(&session), "");
    }

    #[test]
    fn test_stop_keeps_partial_text_and_no_further_ticks_apply() {
        let (session, _) = Session::new().submit("q");
        let session = session
            .request_succeeded("one two three four")
            .reveal_tick()
            .reveal_tick();
        assert_eq!(last_content(&session), "one two");

        let session = session.stop_reveal();
        assert!(!session.is_busy());
        assert_eq!(last_content(&session), "one two");

        // a stale tick after the stop changes nothing
        let session = session.reveal_tick();
        assert_eq!(last_content(&session), "one two");
    }

    #[test]
    fn test_stop_when_idle_is_a_noop() {
        let session = Session::new().stop_reveal();
        assert!(session.messages().is_empty());
        assert!(!session.is_busy());

        let (session, _) = session.submit("q");
        let session = session.stop_reveal();
        // stop does not cancel an in-flight request, only a reveal
        assert!(session.is_waiting());
    }

    #[test]
    fn test_request_failed_resets_busy_and_appends_one_error_turn() {
        let (session, _) = Session::new().submit("q");
        let session = session.request_failed("connection refused");
        assert!(!session.is_busy());
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].role, ChatRole::Assistant);
        assert_eq!(session.messages()[1].content, "Error: connection refused");

        // input is usable again
        let (session, outcome) = session.submit("retry");
        assert_eq!(outcome, Submit::Accepted);
        assert_eq!(session.messages().len(), 3);
    }

    #[test]
    fn test_request_transitions_ignored_when_not_waiting() {
        let session = Session::new().request_succeeded("surprise");
        assert!(session.messages().is_empty());
        assert!(!session.is_busy());

        let session = session.request_failed("late error");
        assert!(session.messages().is_empty());
    }
}
