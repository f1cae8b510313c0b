use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Opaque stage payload as produced by the backend.
pub type StagePayload = Value;

const UNTITLED: &str = "New Conversation";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub created_at: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message_count: usize,
}

impl ConversationSummary {
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => UNTITLED,
        }
    }
}

/// Response body of the create call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatedConversation {
    pub id: String,
    pub created_at: String,
}

impl From<CreatedConversation> for ConversationSummary {
    fn from(created: CreatedConversation) -> Self {
        Self {
            id: created.id,
            created_at: created.created_at,
            title: None,
            message_count: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Arc<Message>>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    pub fn trailing_assistant(&self) -> Option<&AssistantMessage> {
        match self.messages.last().map(Arc::as_ref) {
            Some(Message::Assistant(message)) => Some(message),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User(UserMessage),
    Assistant(AssistantMessage),
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User(UserMessage {
            content: content.into(),
        })
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Message::User(_))
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Message::Assistant(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub stage1: Option<StagePayload>,
    #[serde(default)]
    pub stage2: Option<StagePayload>,
    #[serde(default)]
    pub stage3: Option<StagePayload>,
    /// Ranking side payload delivered together with stage 2.
    #[serde(default)]
    pub metadata: Option<StagePayload>,
    #[serde(default)]
    pub loading: StageLoading,
}

impl AssistantMessage {
    /// Empty placeholder appended before an exchange starts streaming.
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.any()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLoading {
    #[serde(default)]
    pub stage1: bool,
    #[serde(default)]
    pub stage2: bool,
    #[serde(default)]
    pub stage3: bool,
}

impl StageLoading {
    pub fn any(&self) -> bool {
        self.stage1 || self.stage2 || self.stage3
    }
}
