//! Client controller
//!
//! Owns the published [`Snapshot`] and sequences every backend call against
//! it. All state changes go through [`Controller::update`], which swaps in a
//! snapshot computed by one of the pure transition modules and writes the
//! selection back to the durable slot whenever it changed.

use crate::api::{ApiError, Backend, EventStream};
use crate::bootstrap::{self, BootstrapOutcome, RetryPolicy};
use crate::coordinator::{self, Exchange, SendRejected};
use crate::reducer::{Effect, ExchangeReducer, ExchangeStatus};
use crate::registry;
use crate::state::{ConnectionState, Snapshot};
use crate::store::{KeyValueStore, SelectionSlot};
use crate::types::ConversationSummary;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Rejected(#[from] SendRejected),

    #[error("a conversation is already being created")]
    CreateInFlight,

    #[error("conversation {0} is not in the registry")]
    UnknownConversation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// How an exchange that opened successfully came to an end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Completed,
    /// The backend reported a stream-level error.
    Errored(String),
    /// The stream closed without a terminal event.
    Interrupted,
    /// The user moved to another conversation before the stream finished.
    Abandoned,
}

pub struct Controller {
    backend: Arc<dyn Backend>,
    selection: SelectionSlot,
    retry: RetryPolicy,
    state: watch::Sender<Snapshot>,
    bootstrapping: AtomicBool,
    next_exchange: AtomicU64,
}

struct BootstrapGuard<'a>(&'a AtomicBool);

impl Drop for BootstrapGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Controller {
    /// The remembered conversation becomes the initial selection.
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn KeyValueStore>, retry: RetryPolicy) -> Self {
        let selection = SelectionSlot::new(store);
        let (state, _) = watch::channel(Snapshot::with_selection(selection.load()));
        Self {
            backend,
            selection,
            retry,
            state,
            bootstrapping: AtomicBool::new(false),
            next_exchange: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    fn update<T, E>(
        &self,
        transition: impl FnOnce(&Snapshot) -> Result<(Snapshot, T), E>,
    ) -> Result<T, E> {
        let mut outcome = None;
        self.state.send_if_modified(|current| match transition(current) {
            Ok((next, value)) => {
                if next.selected != current.selected {
                    if let Err(err) = self.selection.save(next.selected.as_deref()) {
                        tracing::warn!(%err, "failed to remember selected conversation");
                    }
                }
                *current = next;
                outcome = Some(Ok(value));
                true
            }
            Err(err) => {
                outcome = Some(Err(err));
                false
            }
        });
        outcome.expect("send_if_modified always runs the transition")
    }

    /// Applies `transition` if it yields a new snapshot. Returns whether it did.
    fn commit(&self, transition: impl FnOnce(&Snapshot) -> Option<Snapshot>) -> bool {
        self.update(|current| transition(current).map(|next| (next, ())).ok_or(()))
            .is_ok()
    }

    // ============================================
    // Connection
    // ============================================

    /// Lists conversations until the backend answers or the retry budget runs
    /// out. Returns `false` right away if another bootstrap is running.
    pub async fn bootstrap(&self) -> bool {
        if self.bootstrapping.swap(true, Ordering::AcqRel) {
            tracing::warn!("bootstrap already running");
            return false;
        }
        let _guard = BootstrapGuard(&self.bootstrapping);

        self.commit(|s| {
            Some(Snapshot {
                connection: ConnectionState::Connecting,
                ..s.clone()
            })
        });

        let outcome = bootstrap::retry_within_budget(self.retry, || self.apply_listing()).await;
        match outcome {
            BootstrapOutcome::Connected { attempts, elapsed } => {
                tracing::info!(attempts, ?elapsed, "connected to council backend");
            }
            BootstrapOutcome::TimedOut { attempts } => {
                tracing::warn!(attempts, budget = ?self.retry.budget, "council backend unreachable");
                self.commit(|s| {
                    Some(Snapshot {
                        connection: ConnectionState::Disconnected,
                        ..s.clone()
                    })
                });
                return false;
            }
        }

        self.load_selected().await;
        true
    }

    // ============================================
    // Registry
    // ============================================

    /// Re-lists conversations and reconciles the selection. Failures are
    /// logged and reported as `false`.
    pub async fn refresh(&self) -> bool {
        if !self.apply_listing().await {
            return false;
        }
        self.load_selected().await;
        true
    }

    async fn apply_listing(&self) -> bool {
        match self.backend.list_conversations().await {
            Ok(conversations) => {
                let remembered = self.selection.load();
                self.commit(|s| {
                    Some(Snapshot {
                        connection: ConnectionState::Connected,
                        ..registry::listed(s, conversations, remembered.as_deref())
                    })
                });
                true
            }
            Err(err) => {
                tracing::warn!(%err, "failed to load conversations");
                false
            }
        }
    }

    /// Fetches the selected conversation's detail unless it is already loaded.
    async fn load_selected(&self) {
        let snapshot = self.snapshot();
        let Some(id) = snapshot.selected.clone() else {
            return;
        };
        if snapshot.active_for_selection().is_some() {
            return;
        }

        match self.backend.get_conversation(&id).await {
            Ok(conversation) => {
                let installed = self.commit(|s| {
                    let wanted = s.selected.as_deref() == Some(id.as_str())
                        && s.active_for_selection().is_none();
                    wanted.then(|| Snapshot {
                        active: Some(Arc::new(conversation)),
                        ..s.clone()
                    })
                });
                if !installed {
                    tracing::debug!(conversation = %id, "discarding stale conversation load");
                }
            }
            Err(err) => {
                tracing::warn!(conversation = %id, %err, "failed to load conversation");
            }
        }
    }

    /// Creates a conversation, prepends it and selects it. Only one creation
    /// may be in flight.
    pub async fn create(&self) -> Result<ConversationSummary, ControllerError> {
        let claimed = self.commit(|s| {
            (!s.creating).then(|| Snapshot {
                creating: true,
                ..s.clone()
            })
        });
        if !claimed {
            return Err(ControllerError::CreateInFlight);
        }

        match self.backend.create_conversation().await {
            Ok(created) => {
                let summary = ConversationSummary::from(created);
                tracing::info!(conversation = %summary.id, "created conversation");
                self.commit(|s| {
                    Some(Snapshot {
                        creating: false,
                        ..registry::created(s, summary.clone())
                    })
                });
                self.load_selected().await;
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(%err, "failed to create conversation");
                self.commit(|s| {
                    Some(Snapshot {
                        creating: false,
                        ..s.clone()
                    })
                });
                Err(err.into())
            }
        }
    }

    /// Selects `id` and loads its detail. Selecting the current conversation
    /// does nothing.
    pub async fn select(&self, id: &str) -> Result<(), ControllerError> {
        if !self.snapshot().contains(id) {
            return Err(ControllerError::UnknownConversation(id.to_string()));
        }
        if self.commit(|s| registry::selected(s, id)) {
            self.load_selected().await;
        }
        Ok(())
    }

    /// Deletes `id` once `confirm` agrees. Returns `Ok(false)` if it declined.
    pub async fn delete<F>(&self, id: &str, confirm: F) -> Result<bool, ControllerError>
    where
        F: FnOnce(&ConversationSummary) -> bool,
    {
        let summary = self
            .snapshot()
            .conversations
            .iter()
            .find(|summary| summary.id == id)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownConversation(id.to_string()))?;
        if !confirm(&summary) {
            return Ok(false);
        }

        if let Err(err) = self.backend.delete_conversation(id).await {
            tracing::error!(conversation = %id, %err, "failed to delete conversation");
            return Err(err.into());
        }
        tracing::info!(conversation = %id, "deleted conversation");
        self.commit(|s| Some(registry::deleted(s, id)));
        self.load_selected().await;
        Ok(true)
    }

    // ============================================
    // Exchanges
    // ============================================

    /// Sends `content` to the selected conversation and streams the answer
    /// into its transcript.
    ///
    /// The user message and an assistant placeholder are appended first. A
    /// transport failure removes both again and is returned as an error; a
    /// stream-level `error` event keeps whatever stages already arrived.
    pub async fn send(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<ExchangeOutcome, ControllerError> {
        let exchange_id = self.next_exchange.fetch_add(1, Ordering::Relaxed);
        // Subscribe first so a selection change while the stream opens is seen.
        let snapshots = self.state.subscribe();
        let exchange = self.update(|s| coordinator::begin(s, conversation_id, content, exchange_id))?;
        tracing::info!(conversation = %conversation_id, exchange = exchange.id, "sending message");

        let stream = match self.backend.send_message_stream(conversation_id, content).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(conversation = %conversation_id, %err, "failed to send message");
                self.commit(|s| Some(coordinator::rollback(s, &exchange)));
                return Err(err.into());
            }
        };

        self.consume(exchange, stream, snapshots).await
    }

    async fn consume(
        &self,
        exchange: Exchange,
        mut stream: EventStream,
        mut snapshots: watch::Receiver<Snapshot>,
    ) -> Result<ExchangeOutcome, ControllerError> {
        let mut reducer = ExchangeReducer::new();
        let mut refreshed = false;

        let outcome = loop {
            let next = tokio::select! {
                biased;
                changed = snapshots.changed() => {
                    let moved = changed.is_err()
                        || snapshots.borrow_and_update().selected.as_deref()
                            != Some(exchange.conversation_id.as_str());
                    if moved {
                        tracing::info!(exchange = exchange.id, "conversation changed, abandoning stream");
                        break ExchangeOutcome::Abandoned;
                    }
                    continue;
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    let current = self.snapshot();
                    let Some(message) = exchange.assistant(&current) else {
                        tracing::debug!(exchange = exchange.id, event = %event.event_type(), "exchange no longer visible");
                        break ExchangeOutcome::Abandoned;
                    };
                    let step = reducer.apply(message, event);
                    if let Some(message) = step.message {
                        self.commit(|s| coordinator::advance(s, &exchange, message));
                    }
                    for effect in step.effects {
                        match effect {
                            Effect::RefreshRegistry => {
                                self.refresh().await;
                                refreshed = matches!(reducer.status(), ExchangeStatus::Done);
                            }
                        }
                    }
                    match reducer.status() {
                        ExchangeStatus::Streaming => {}
                        ExchangeStatus::Done => break ExchangeOutcome::Completed,
                        ExchangeStatus::Errored(message) => break ExchangeOutcome::Errored(message.clone()),
                        ExchangeStatus::Interrupted => break ExchangeOutcome::Interrupted,
                    }
                }
                Some(Err(err)) => {
                    tracing::error!(exchange = exchange.id, %err, "stream transport failed");
                    self.commit(|s| Some(coordinator::rollback(s, &exchange)));
                    return Err(err.into());
                }
                None => {
                    let current = self.snapshot();
                    if let Some(message) = exchange.assistant(&current)
                        && let Some(settled) = reducer.close(message).message
                    {
                        self.commit(|s| coordinator::advance(s, &exchange, settled));
                    }
                    break ExchangeOutcome::Interrupted;
                }
            }
        };

        self.commit(|s| Some(coordinator::finish(s, &exchange)));
        if !refreshed {
            self.refresh().await;
        }
        tracing::info!(exchange = exchange.id, outcome = ?outcome, "exchange finished");
        Ok(outcome)
    }
}
