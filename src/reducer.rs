//! Streaming event reducer
//!
//! One `ExchangeReducer` follows one exchange. It tracks every stage as
//! `Idle -> Loading -> Complete` plus a terminal status for the exchange,
//! and turns each event into a replacement for the trailing assistant message.
//! It never mutates the message it is given.

use crate::event::{Stage, StreamEvent};
use crate::types::AssistantMessage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StagePhase {
    #[default]
    Idle,
    Loading,
    Complete,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExchangeStatus {
    #[default]
    Streaming,
    Done,
    Errored(String),
    /// The transport closed without a terminal event.
    Interrupted,
}

impl ExchangeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExchangeStatus::Streaming)
    }
}

/// Side effects requested by a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    RefreshRegistry,
}

/// Result of applying one event.
#[derive(Debug, Default, PartialEq)]
pub struct Step {
    /// Replacement for the trailing assistant message, if it changed.
    pub message: Option<AssistantMessage>,
    pub effects: Vec<Effect>,
}

impl Step {
    fn unchanged() -> Self {
        Self::default()
    }

    fn replace(message: AssistantMessage) -> Self {
        Self {
            message: Some(message),
            effects: Vec::new(),
        }
    }

    fn effect(effect: Effect) -> Self {
        Self {
            message: None,
            effects: vec![effect],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ExchangeReducer {
    phases: [StagePhase; 3],
    status: ExchangeStatus,
}

impl ExchangeReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, stage: Stage) -> StagePhase {
        self.phases[stage.index()]
    }

    pub fn status(&self) -> &ExchangeStatus {
        &self.status
    }

    pub fn apply(&mut self, current: &AssistantMessage, event: StreamEvent) -> Step {
        if self.status.is_terminal() {
            tracing::debug!(
                event = %event.event_type(),
                status = ?self.status,
                "ignoring event after exchange ended"
            );
            return Step::unchanged();
        }

        match event {
            StreamEvent::StageStart(stage) => {
                if self.phase(stage) != StagePhase::Idle {
                    tracing::warn!(%stage, phase = ?self.phase(stage), "duplicate stage start ignored");
                    return Step::unchanged();
                }
                self.phases[stage.index()] = StagePhase::Loading;
                Step::replace(with_loading(current, stage, true))
            }

            StreamEvent::StageComplete {
                stage,
                data,
                metadata,
            } => {
                if self.phase(stage) != StagePhase::Loading {
                    tracing::warn!(%stage, phase = ?self.phase(stage), "stage completion without start ignored");
                    return Step::unchanged();
                }
                self.phases[stage.index()] = StagePhase::Complete;
                let mut next = with_loading(current, stage, false);
                match stage {
                    Stage::One => next.stage1 = Some(data),
                    Stage::Two => {
                        next.stage2 = Some(data);
                        next.metadata = metadata;
                    }
                    Stage::Three => next.stage3 = Some(data),
                }
                Step::replace(next)
            }

            StreamEvent::TitleComplete { title } => {
                tracing::info!(title = title.as_deref().unwrap_or_default(), "conversation titled");
                Step::effect(Effect::RefreshRegistry)
            }

            StreamEvent::Complete => {
                self.status = ExchangeStatus::Done;
                let mut step = self.settle(current);
                step.effects.push(Effect::RefreshRegistry);
                step
            }

            StreamEvent::Error { message } => {
                tracing::error!(%message, "stream error");
                self.status = ExchangeStatus::Errored(message);
                self.settle(current)
            }

            StreamEvent::Unknown { event_type } => {
                tracing::info!(%event_type, "unknown event type");
                Step::unchanged()
            }
        }
    }

    /// Ends an exchange whose stream closed without `complete` or `error`.
    pub fn close(&mut self, current: &AssistantMessage) -> Step {
        if self.status.is_terminal() {
            return Step::unchanged();
        }
        tracing::warn!("stream closed before completion");
        self.status = ExchangeStatus::Interrupted;
        self.settle(current)
    }

    fn settle(&mut self, current: &AssistantMessage) -> Step {
        for phase in self.phases.iter_mut() {
            if *phase == StagePhase::Loading {
                *phase = StagePhase::Idle;
            }
        }
        if !current.is_loading() {
            return Step::unchanged();
        }
        let mut next = current.clone();
        next.loading = Default::default();
        Step::replace(next)
    }
}

fn with_loading(current: &AssistantMessage, stage: Stage, loading: bool) -> AssistantMessage {
    let mut next = current.clone();
    match stage {
        Stage::One => next.loading.stage1 = loading,
        Stage::Two => next.loading.stage2 = loading,
        Stage::Three => next.loading.stage3 = loading,
    }
    next
}

#[cfg(test)]
mod proptests;
