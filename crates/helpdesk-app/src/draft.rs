use std::sync::Mutex;

#[derive(Debug, Default)]
struct DraftState {
    text: String,
    suggestion: Option<String>,
}

/// Text being composed plus an optional assistant suggestion held aside.
/// The suggestion only reaches the draft through `accept_suggestion`.
#[derive(Debug, Default)]
pub struct DraftBuffer {
    state: Mutex<DraftState>,
}

impl DraftBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.state.lock().expect("draft buffer lock").text.clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.state.lock().expect("draft buffer lock").text = text.into();
    }

    pub fn is_blank(&self) -> bool {
        self.state
            .lock()
            .expect("draft buffer lock")
            .text
            .trim()
            .is_empty()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("draft buffer lock");
        state.text.clear();
        state.suggestion = None;
    }

    /// Clears the buffer only if it still holds `sent`. Text edited after
    /// `sent` was read is kept. Returns `true` when the buffer was cleared.
    pub fn clear_if_unchanged(&self, sent: &str) -> bool {
        let mut state = self.state.lock().expect("draft buffer lock");
        if state.text != sent {
            return false;
        }
        state.text.clear();
        state.suggestion = None;
        true
    }

    pub fn suggestion(&self) -> Option<String> {
        self.state
            .lock()
            .expect("draft buffer lock")
            .suggestion
            .clone()
    }

    pub fn offer_suggestion(&self, suggestion: impl Into<String>) {
        self.state.lock().expect("draft buffer lock").suggestion = Some(suggestion.into());
    }

    /// Replaces the draft with the pending suggestion. Returns `false` when
    /// there was nothing to accept.
    pub fn accept_suggestion(&self) -> bool {
        let mut state = self.state.lock().expect("draft buffer lock");
        match state.suggestion.take() {
            Some(suggestion) => {
                state.text = suggestion;
                true
            }
            None => false,
        }
    }

    pub fn discard_suggestion(&self) -> bool {
        self.state
            .lock()
            .expect("draft buffer lock")
            .suggestion
            .take()
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::DraftBuffer;

    #[test]
    fn suggestion_never_replaces_draft_until_accepted() {
        let draft = DraftBuffer::new();
        draft.set_text("pls fix login");
        draft.offer_suggestion("Could you please help me with a login problem?");

        assert_eq!(draft.text(), "pls fix login");
        assert!(draft.accept_suggestion());
        assert_eq!(draft.text(), "Could you please help me with a login problem?");
        assert_eq!(draft.suggestion(), None);
        assert!(!draft.accept_suggestion());
    }

    #[test]
    fn discard_keeps_original_text() {
        let draft = DraftBuffer::new();
        draft.set_text("original");
        draft.offer_suggestion("rewritten");

        assert!(draft.discard_suggestion());
        assert_eq!(draft.text(), "original");
        assert!(!draft.discard_suggestion());
    }

    #[test]
    fn clear_if_unchanged_keeps_newer_edits() {
        let draft = DraftBuffer::new();
        draft.set_text("first answer");
        let sent = draft.text();
        draft.set_text("follow-up typed meanwhile");

        assert!(!draft.clear_if_unchanged(&sent));
        assert_eq!(draft.text(), "follow-up typed meanwhile");

        let sent = draft.text();
        assert!(draft.clear_if_unchanged(&sent));
        assert!(draft.is_blank());
    }

    #[test]
    fn clear_drops_text_and_pending_suggestion() {
        let draft = DraftBuffer::new();
        draft.set_text("  ");
        assert!(draft.is_blank());
        draft.set_text("hello");
        draft.offer_suggestion("Hello!");
        draft.clear();
        assert!(draft.is_blank());
        assert_eq!(draft.suggestion(), None);
    }
}
