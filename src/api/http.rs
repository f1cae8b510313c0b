use super::{ApiError, ApiResult, Backend, EventStream, SseDecoder};
use crate::event::StreamEvent;
use crate::types::{Conversation, ConversationSummary, CreatedConversation};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;

pub const DEFAULT_API_BASE: &str = "http://localhost:8001";

pub struct HttpBackend {
    client: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/conversations{}", self.base, path)
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
}

async fn checked(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let body = checked(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_conversations(&self) -> ApiResult<Vec<ConversationSummary>> {
        let response = self.client.get(self.url("")).send().await?;
        decode(response).await
    }

    async fn create_conversation(&self) -> ApiResult<CreatedConversation> {
        let response = self
            .client
            .post(self.url(""))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_conversation(&self, id: &str) -> ApiResult<()> {
        let response = self.client.delete(self.url(&format!("/{id}"))).send().await?;
        checked(response).await?;
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> ApiResult<Conversation> {
        let response = self.client.get(self.url(&format!("/{id}"))).send().await?;
        decode(response).await
    }

    async fn send_message_stream(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> ApiResult<EventStream> {
        let response = self
            .client
            .post(self.url(&format!("/{conversation_id}/message/stream")))
            .header("accept", "text/event-stream")
            .json(&SendMessageRequest { content })
            .send()
            .await?;
        let response = checked(response).await?;
        Ok(event_stream(response.bytes_stream()))
    }
}

/// Turns a raw SSE body into typed events. Decode failures end the stream
/// with an error, like a dropped connection would.
pub(crate) fn event_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let state = StreamState {
        bytes: bytes.boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                let item = StreamEvent::from_json(&payload).map_err(ApiError::from);
                if item.is_err() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.pending.extend(state.decoder.push(chunk.as_ref()));
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err.into()), state));
                }
                None => {
                    state.finished = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

struct StreamState<B, E> {
    bytes: BoxStream<'static, Result<B, E>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}
