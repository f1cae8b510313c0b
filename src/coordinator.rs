//! Optimistic message coordinator
//!
//! An exchange appends `[User, Assistant]` to the active transcript before the
//! backend answers. The user entry's `Arc` identifies the pair afterwards: the
//! exchange only touches the transcript while that pair is still trailing.

use crate::state::Snapshot;
use crate::types::{AssistantMessage, Conversation, Message};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendRejected {
    #[error("no conversation is selected")]
    NoSelection,

    #[error("conversation {0} is not the selected conversation")]
    NotSelected(String),

    #[error("conversation {0} has not finished loading")]
    NotLoaded(String),

    #[error("a message is already being answered in conversation {0}")]
    InFlight(String),
}

/// Handle for one in-flight exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub conversation_id: String,
    pub id: u64,
    user: Arc<Message>,
}

impl Exchange {
    fn owns(&self, snapshot: &Snapshot) -> Option<Arc<Conversation>> {
        if snapshot.in_flight.get(&self.conversation_id) != Some(&self.id) {
            return None;
        }
        let active = snapshot.active.as_ref()?;
        if active.id != self.conversation_id {
            return None;
        }
        let len = active.messages.len();
        if len < 2
            || !Arc::ptr_eq(&active.messages[len - 2], &self.user)
            || !active.messages[len - 1].is_assistant()
        {
            return None;
        }
        Some(Arc::clone(active))
    }

    /// The exchange's assistant message, if the snapshot still shows it.
    pub fn assistant<'a>(&self, snapshot: &'a Snapshot) -> Option<&'a AssistantMessage> {
        self.owns(snapshot)?;
        snapshot.active.as_deref()?.trailing_assistant()
    }
}

/// Appends the user message and an empty assistant placeholder.
pub fn begin(
    snapshot: &Snapshot,
    conversation_id: &str,
    content: &str,
    exchange_id: u64,
) -> Result<(Snapshot, Exchange), SendRejected> {
    match snapshot.selected.as_deref() {
        None => return Err(SendRejected::NoSelection),
        Some(selected) if selected != conversation_id => {
            return Err(SendRejected::NotSelected(conversation_id.to_string()));
        }
        Some(_) => {}
    }
    let active = snapshot
        .active_for_selection()
        .ok_or_else(|| SendRejected::NotLoaded(conversation_id.to_string()))?;
    if snapshot.in_flight.contains_key(conversation_id) {
        return Err(SendRejected::InFlight(conversation_id.to_string()));
    }

    let user = Arc::new(Message::user(content));
    let mut conversation = Conversation::clone(active);
    conversation.messages.push(Arc::clone(&user));
    conversation
        .messages
        .push(Arc::new(Message::Assistant(AssistantMessage::placeholder())));

    let mut in_flight: HashMap<String, u64> = (*snapshot.in_flight).clone();
    in_flight.insert(conversation_id.to_string(), exchange_id);

    let next = Snapshot {
        active: Some(Arc::new(conversation)),
        in_flight: Arc::new(in_flight),
        ..snapshot.clone()
    };
    let exchange = Exchange {
        conversation_id: conversation_id.to_string(),
        id: exchange_id,
        user,
    };
    Ok((next, exchange))
}

/// Replaces the trailing assistant message with `message`.
pub fn advance(snapshot: &Snapshot, exchange: &Exchange, message: AssistantMessage) -> Option<Snapshot> {
    let active = exchange.owns(snapshot)?;
    let mut conversation = Conversation::clone(&active);
    if let Some(last) = conversation.messages.last_mut() {
        *last = Arc::new(Message::Assistant(message));
    }
    Some(Snapshot {
        active: Some(Arc::new(conversation)),
        ..snapshot.clone()
    })
}

/// Removes the optimistic pair, if it is still trailing, and ends the exchange.
pub fn rollback(snapshot: &Snapshot, exchange: &Exchange) -> Snapshot {
    let active = match exchange.owns(snapshot) {
        Some(active) => {
            let mut conversation = Conversation::clone(&active);
            conversation.messages.truncate(conversation.messages.len() - 2);
            Some(Arc::new(conversation))
        }
        None => snapshot.active.clone(),
    };
    Snapshot {
        active,
        ..finish(snapshot, exchange)
    }
}

/// Ends the exchange, keeping whatever it wrote.
pub fn finish(snapshot: &Snapshot, exchange: &Exchange) -> Snapshot {
    if snapshot.in_flight.get(&exchange.conversation_id) != Some(&exchange.id) {
        return snapshot.clone();
    }
    let mut in_flight: HashMap<String, u64> = (*snapshot.in_flight).clone();
    in_flight.remove(&exchange.conversation_id);
    Snapshot {
        in_flight: Arc::new(in_flight),
        ..snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationSummary;
    use serde_json::json;

    fn loaded(id: &str, history: usize) -> Snapshot {
        let mut conversation = Conversation::new(id);
        for n in 0..history {
            conversation
                .messages
                .push(Arc::new(Message::user(format!("earlier {n}"))));
        }
        Snapshot {
            conversations: vec![ConversationSummary {
                id: id.to_string(),
                created_at: "t".to_string(),
                title: None,
                message_count: history,
            }]
            .into(),
            selected: Some(id.to_string()),
            active: Some(Arc::new(conversation)),
            ..Snapshot::default()
        }
    }

    fn transcript_len(snapshot: &Snapshot) -> usize {
        snapshot.active.as_ref().map_or(0, |active| active.messages.len())
    }

    #[test]
    fn begin_appends_user_and_placeholder() {
        let snapshot = loaded("c1", 2);
        let (next, exchange) = begin(&snapshot, "c1", "hello", 1).unwrap();
        let active = next.active.as_ref().unwrap();
        assert_eq!(active.messages.len(), 4);
        assert_eq!(*active.messages[2], Message::user("hello"));
        assert_eq!(
            exchange.assistant(&next),
            Some(&AssistantMessage::placeholder())
        );
        assert!(next.is_sending());
        assert_eq!(transcript_len(&snapshot), 2);
    }

    #[test]
    fn begin_checks_preconditions() {
        let snapshot = loaded("c1", 0);
        assert_eq!(
            begin(&Snapshot::default(), "c1", "x", 1).unwrap_err(),
            SendRejected::NoSelection
        );
        assert_eq!(
            begin(&snapshot, "c2", "x", 1).unwrap_err(),
            SendRejected::NotSelected("c2".into())
        );
        let unloaded = Snapshot {
            active: None,
            ..snapshot.clone()
        };
        assert_eq!(
            begin(&unloaded, "c1", "x", 1).unwrap_err(),
            SendRejected::NotLoaded("c1".into())
        );
        let (busy, _) = begin(&snapshot, "c1", "x", 1).unwrap();
        assert_eq!(
            begin(&busy, "c1", "y", 2).unwrap_err(),
            SendRejected::InFlight("c1".into())
        );
    }

    #[test]
    fn rollback_restores_length() {
        let snapshot = loaded("c1", 3);
        let (next, exchange) = begin(&snapshot, "c1", "hello", 7).unwrap();
        let mut progressed = AssistantMessage::placeholder();
        progressed.loading.stage1 = true;
        let next = advance(&next, &exchange, progressed).unwrap();
        let rolled = rollback(&next, &exchange);
        assert_eq!(transcript_len(&rolled), 3);
        assert!(!rolled.is_sending());
    }

    #[test]
    fn advance_does_not_touch_previous_snapshot() {
        let snapshot = loaded("c1", 0);
        let (before, exchange) = begin(&snapshot, "c1", "hello", 1).unwrap();
        let mut message = AssistantMessage::placeholder();
        message.stage1 = Some(json!({"text": "a"}));
        let after = advance(&before, &exchange, message.clone()).unwrap();
        assert_eq!(exchange.assistant(&after), Some(&message));
        assert_eq!(
            exchange.assistant(&before),
            Some(&AssistantMessage::placeholder())
        );
    }

    #[test]
    fn stale_exchange_cannot_write() {
        let snapshot = loaded("c1", 0);
        let (next, exchange) = begin(&snapshot, "c1", "hello", 1).unwrap();
        let reloaded = Snapshot {
            active: Some(Arc::new(Conversation::new("c1"))),
            ..next.clone()
        };
        assert!(advance(&reloaded, &exchange, AssistantMessage::placeholder()).is_none());
        let rolled = rollback(&reloaded, &exchange);
        assert_eq!(transcript_len(&rolled), 0);

        let switched = Snapshot {
            selected: Some("c2".into()),
            active: Some(Arc::new(Conversation::new("c2"))),
            ..next
        };
        assert!(exchange.assistant(&switched).is_none());
    }

    #[test]
    fn finish_keeps_transcript() {
        let snapshot = loaded("c1", 1);
        let (next, exchange) = begin(&snapshot, "c1", "hello", 1).unwrap();
        let done = finish(&next, &exchange);
        assert_eq!(transcript_len(&done), 3);
        assert!(!done.is_sending());
    }
}
