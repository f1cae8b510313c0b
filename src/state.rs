//! Immutable application snapshot published to the host.

use crate::types::{Conversation, ConversationSummary};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Registry, most recent first.
    pub conversations: Arc<[ConversationSummary]>,
    pub selected: Option<String>,
    /// Loaded detail of the selected conversation.
    pub active: Option<Arc<Conversation>>,
    pub connection: ConnectionState,
    pub creating: bool,
    /// Conversation id to the id of the exchange streaming into it.
    pub in_flight: Arc<HashMap<String, u64>>,
}

impl Snapshot {
    pub fn with_selection(selected: Option<String>) -> Self {
        Self {
            selected,
            ..Self::default()
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.iter().any(|summary| summary.id == id)
    }

    pub fn selected_summary(&self) -> Option<&ConversationSummary> {
        let selected = self.selected.as_deref()?;
        self.conversations.iter().find(|summary| summary.id == selected)
    }

    /// Detail of the selected conversation, if it is loaded.
    pub fn active_for_selection(&self) -> Option<&Arc<Conversation>> {
        let selected = self.selected.as_deref()?;
        self.active.as_ref().filter(|active| active.id == selected)
    }

    /// Whether an exchange is streaming into the selected conversation.
    pub fn is_sending(&self) -> bool {
        self.selected
            .as_deref()
            .is_some_and(|id| self.in_flight.contains_key(id))
    }
}
