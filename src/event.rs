//! Typed events pushed by the backend while an exchange streams.

use crate::types::StagePayload;
use serde::Deserialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    One,
    Two,
    Three,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::One, Stage::Two, Stage::Three];

    pub fn index(self) -> usize {
        match self {
            Stage::One => 0,
            Stage::Two => 1,
            Stage::Three => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage{}", self.index() + 1)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    StageStart(Stage),
    StageComplete {
        stage: Stage,
        data: StagePayload,
        metadata: Option<StagePayload>,
    },
    TitleComplete {
        title: Option<String>,
    },
    Complete,
    Error {
        message: String,
    },
    /// Any event type this client does not know about.
    Unknown {
        event_type: String,
    },
}

/// Body fields an event may carry, depending on its type.
#[derive(Debug, Default, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub data: Option<StagePayload>,
    #[serde(default)]
    pub metadata: Option<StagePayload>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(flatten)]
    body: EventBody,
}

impl StreamEvent {
    /// Builds an event from its type tag and body.
    pub fn from_parts(event_type: &str, body: EventBody) -> Self {
        let complete = |stage: Stage, body: EventBody, with_metadata: bool| {
            StreamEvent::StageComplete {
                stage,
                data: body.data.unwrap_or_default(),
                metadata: if with_metadata { body.metadata } else { None },
            }
        };

        match event_type {
            "stage1_start" => StreamEvent::StageStart(Stage::One),
            "stage2_start" => StreamEvent::StageStart(Stage::Two),
            "stage3_start" => StreamEvent::StageStart(Stage::Three),
            "stage1_complete" => complete(Stage::One, body, false),
            "stage2_complete" => complete(Stage::Two, body, true),
            "stage3_complete" => complete(Stage::Three, body, false),
            "title_complete" => StreamEvent::TitleComplete {
                title: body
                    .data
                    .as_ref()
                    .and_then(|data| data.get("title"))
                    .and_then(|title| title.as_str())
                    .map(str::to_string),
            },
            "complete" => StreamEvent::Complete,
            "error" => StreamEvent::Error {
                message: body.message.unwrap_or_else(|| "unknown error".to_string()),
            },
            other => StreamEvent::Unknown {
                event_type: other.to_string(),
            },
        }
    }

    /// Parses one SSE `data:` payload of the form `{"type": ..., ...}`.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let wire: WireEvent = serde_json::from_str(payload)?;
        Ok(Self::from_parts(&wire.event_type, wire.body))
    }

    pub fn event_type(&self) -> String {
        match self {
            StreamEvent::StageStart(stage) => format!("{stage}_start"),
            StreamEvent::StageComplete { stage, .. } => format!("{stage}_complete"),
            StreamEvent::TitleComplete { .. } => "title_complete".to_string(),
            StreamEvent::Complete => "complete".to_string(),
            StreamEvent::Error { .. } => "error".to_string(),
            StreamEvent::Unknown { event_type } => event_type.clone(),
        }
    }
}
