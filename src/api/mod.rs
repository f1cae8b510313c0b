/// Backend collaborator for the council client
///
/// The controller only talks to the backend through the [`Backend`] trait so
/// that tests can script responses and event streams.
///
/// # Architecture
///
/// - `http` - reqwest implementation of the council REST + SSE surface
/// - `sse` - incremental Server-Sent Events frame decoder
mod http;
mod sse;

pub use http::{DEFAULT_API_BASE, HttpBackend};
pub use sse::SseDecoder;

use crate::event::StreamEvent;
use crate::types::{Conversation, ConversationSummary, CreatedConversation};
use async_trait::async_trait;
use futures::stream::BoxStream;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl ApiError {
    pub fn other(message: impl Into<String>) -> Self {
        ApiError::Other(message.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Ordered events of one exchange. An `Err` item is a transport failure.
pub type EventStream = BoxStream<'static, ApiResult<StreamEvent>>;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_conversations(&self) -> ApiResult<Vec<ConversationSummary>>;

    async fn create_conversation(&self) -> ApiResult<CreatedConversation>;

    async fn delete_conversation(&self, id: &str) -> ApiResult<()>;

    async fn get_conversation(&self, id: &str) -> ApiResult<Conversation>;

    /// Opens one streaming exchange. Resolves once the response headers are in;
    /// the returned stream ends when the transport closes.
    async fn send_message_stream(&self, conversation_id: &str, content: &str)
    -> ApiResult<EventStream>;
}
