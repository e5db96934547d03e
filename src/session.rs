use std::fmt;

/// Who produced a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "You"),
            Role::Assistant => write!(f, "AI"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Per-session state passed into every pipeline call.
///
/// History is append-only. It is shown to the user and, when the engine runs
/// in conversational mode, sent to the model with each new question.
#[derive(Debug, Default)]
pub struct Session {
    current_collection: Option<String>,
    history: Vec<ChatTurn>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// Start a session already pointed at a collection
    pub fn with_collection(collection: impl Into<String>) -> Self {
        Session {
            current_collection: Some(collection.into()),
            history: Vec::new(),
        }
    }

    pub fn current_collection(&self) -> Option<&str> {
        self.current_collection.as_deref()
    }

    pub fn select_collection(&mut self, collection: impl Into<String>) {
        self.current_collection = Some(collection.into());
    }

    pub fn deselect_collection(&mut self) {
        self.current_collection = None;
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(ChatTurn {
            role,
            content: content.into(),
        });
    }

    /// End of session: forget the selection and the history
    pub fn clear(&mut self) {
        self.current_collection = None;
        self.history.clear();
    }
}
