//! Plain-text rendering for the terminal host.

use council::event::Stage;
use council::state::{ConnectionState, Snapshot};
use council::types::{AssistantMessage, StagePayload};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    New,
    List,
    Select(String),
    Delete(String),
    Retry,
    Quit,
    Help,
    Send(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Send(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name, arg) {
            ("new", _) => Command::New,
            ("list", _) => Command::List,
            ("retry", _) => Command::Retry,
            ("quit" | "exit", _) => Command::Quit,
            ("select", id) if !id.is_empty() => Command::Select(id.to_string()),
            ("delete", id) if !id.is_empty() => Command::Delete(id.to_string()),
            _ => Command::Help,
        }
    }
}

pub const HELP: &str = "commands: /new, /list, /select <id>, /delete <id>, /retry, /quit; anything else is sent to the council";

pub fn registry(snapshot: &Snapshot) -> String {
    match snapshot.connection {
        ConnectionState::Connecting => return "Connecting to Council...".to_string(),
        ConnectionState::Disconnected if snapshot.conversations.is_empty() => {
            return "Not connected. Use /retry once the backend is up.".to_string();
        }
        _ => {}
    }
    if snapshot.conversations.is_empty() {
        return "No conversations yet".to_string();
    }

    snapshot
        .conversations
        .iter()
        .map(|summary| {
            let marker = if snapshot.selected.as_deref() == Some(summary.id.as_str()) {
                '*'
            } else {
                ' '
            };
            format!(
                "{marker} {}  {} ({} messages)",
                summary.id,
                summary.display_title(),
                summary.message_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tracks the trailing assistant message and reports what changed.
#[derive(Default)]
pub struct Progress {
    last: Option<AssistantMessage>,
}

impl Progress {
    pub fn observe(&mut self, snapshot: &Snapshot) -> Vec<String> {
        let current = snapshot
            .active_for_selection()
            .and_then(|active| active.trailing_assistant())
            .cloned();
        let Some(current) = current else {
            self.last = None;
            return Vec::new();
        };

        let previous = self.last.replace(current.clone()).unwrap_or_default();
        let mut lines = Vec::new();
        for stage in Stage::ALL {
            let (was_loading, was_set) = stage_state(&previous, stage);
            let (loading, payload) = (loading(&current, stage), payload(&current, stage));
            if loading && !was_loading {
                lines.push(format!("[{stage}] running..."));
            }
            if let Some(payload) = payload
                && !was_set
            {
                lines.push(format!("[{stage}] {}", summarize(stage, payload)));
            }
        }
        lines
    }
}

fn stage_state(message: &AssistantMessage, stage: Stage) -> (bool, bool) {
    (loading(message, stage), payload(message, stage).is_some())
}

fn loading(message: &AssistantMessage, stage: Stage) -> bool {
    match stage {
        Stage::One => message.loading.stage1,
        Stage::Two => message.loading.stage2,
        Stage::Three => message.loading.stage3,
    }
}

fn payload(message: &AssistantMessage, stage: Stage) -> Option<&StagePayload> {
    match stage {
        Stage::One => message.stage1.as_ref(),
        Stage::Two => message.stage2.as_ref(),
        Stage::Three => message.stage3.as_ref(),
    }
}

fn summarize(stage: Stage, payload: &StagePayload) -> String {
    match (stage, payload) {
        (Stage::Three, value) => final_answer(value),
        (_, StagePayload::Array(items)) => format!("{} responses", items.len()),
        (_, value) => value.to_string(),
    }
}

/// The chairman's text, or the raw payload when it has no `response` field.
pub fn final_answer(stage3: &StagePayload) -> String {
    stage3
        .get("response")
        .and_then(|response| response.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| stage3.to_string())
}
