//! Conversation registry transitions
//!
//! Pure functions from one snapshot to the next. The controller performs the
//! network calls and commits what these return.

use crate::state::Snapshot;
use crate::types::ConversationSummary;
use std::sync::Arc;

/// Picks the selection after a listing: keep the current one if it still
/// exists, else the remembered one, else the first entry.
pub fn reconcile_selection(
    current: Option<&str>,
    remembered: Option<&str>,
    conversations: &[ConversationSummary],
) -> Option<String> {
    let present = |id: &str| conversations.iter().any(|summary| summary.id == id);

    current
        .filter(|id| present(*id))
        .or_else(|| remembered.filter(|id| present(*id)))
        .map(str::to_string)
        .or_else(|| conversations.first().map(|summary| summary.id.clone()))
}

pub fn listed(
    snapshot: &Snapshot,
    conversations: Vec<ConversationSummary>,
    remembered: Option<&str>,
) -> Snapshot {
    let selected = reconcile_selection(snapshot.selected.as_deref(), remembered, &conversations);
    let active = match (&snapshot.active, &selected) {
        (Some(active), Some(id)) if active.id == *id => Some(Arc::clone(active)),
        _ => None,
    };
    Snapshot {
        conversations: conversations.into(),
        selected,
        active,
        ..snapshot.clone()
    }
}

pub fn created(snapshot: &Snapshot, summary: ConversationSummary) -> Snapshot {
    let selected = Some(summary.id.clone());
    let conversations: Vec<ConversationSummary> = std::iter::once(summary)
        .chain(snapshot.conversations.iter().cloned())
        .collect();
    Snapshot {
        conversations: conversations.into(),
        selected,
        active: None,
        ..snapshot.clone()
    }
}

/// Returns `None` when `id` is already selected.
pub fn selected(snapshot: &Snapshot, id: &str) -> Option<Snapshot> {
    if snapshot.selected.as_deref() == Some(id) {
        return None;
    }
    Some(Snapshot {
        selected: Some(id.to_string()),
        active: None,
        ..snapshot.clone()
    })
}

pub fn deleted(snapshot: &Snapshot, id: &str) -> Snapshot {
    let conversations: Vec<ConversationSummary> = snapshot
        .conversations
        .iter()
        .filter(|summary| summary.id != id)
        .cloned()
        .collect();

    let selected = if snapshot.selected.as_deref() == Some(id) {
        conversations.first().map(|summary| summary.id.clone())
    } else {
        snapshot.selected.clone()
    };
    let active = snapshot
        .active
        .as_ref()
        .filter(|active| active.id != id && selected.as_deref() == Some(active.id.as_str()))
        .cloned();

    Snapshot {
        conversations: conversations.into(),
        selected,
        active,
        ..snapshot.clone()
    }
}

#[cfg(test)]
mod proptests;
