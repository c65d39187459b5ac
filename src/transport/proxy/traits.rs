use crate::error::ProxyError;
use futures_util::Stream;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

/// Trimmed, non-blank lines of one proxy response body.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, ProxyError>> + Send + 'static>>;

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub prompt: String,
    /// Resume the session's previous conversation instead of starting fresh.
    #[serde(rename = "continue")]
    pub continue_session: bool,
}

impl ChatRequest {
    pub fn new(session_id: &str, prompt: &str, continue_session: bool) -> Self {
        Self {
            session_id: session_id.trim().to_string(),
            prompt: prompt.trim().to_string(),
            continue_session,
        }
    }

    /// Mode label used in logs.
    pub fn mode(&self) -> &'static str {
        if self.continue_session { "continue" } else { "fresh" }
    }
}

pub trait ProxyClient: Send + Sync {
    fn chat_stream<'a>(
        &'a self,
        request: ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LineStream, ProxyError>> + Send + 'a>>;
}
