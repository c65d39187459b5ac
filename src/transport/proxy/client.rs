use super::line_buffer::LineBuffer;
use super::traits::{ChatRequest, LineStream, ProxyClient};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::utils::text::truncate_with_ellipsis;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 2000;
const DEFAULT_ERROR_MESSAGE: &str = "proxy request failed";

/// reqwest client for the CLI-driving proxy.
#[derive(Debug, Clone)]
pub struct HttpProxyClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpProxyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ProxyError::MissingBaseUrl);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProxyError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }

    async fn open_chat(&self, request: &ChatRequest) -> Result<reqwest::Response, ProxyError> {
        let response = self
            .client
            .post(self.chat_url())
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = body.trim();
            let body = if body.is_empty() {
                DEFAULT_ERROR_MESSAGE.to_string()
            } else {
                truncate_with_ellipsis(body, MAX_ERROR_BODY_CHARS)
            };
            return Err(ProxyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl ProxyClient for HttpProxyClient {
    fn chat_stream<'a>(
        &'a self,
        request: ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LineStream, ProxyError>> + Send + 'a>> {
        Box::pin(async move {
            use futures_util::StreamExt;

            let response = self.open_chat(&request).await?;
            let mut byte_stream = response.bytes_stream();

            let stream = async_stream::try_stream! {
                let mut buffer = LineBuffer::new();
                while let Some(chunk_result) = byte_stream.next().await {
                    let chunk = chunk_result.map_err(|e| ProxyError::Stream(e.to_string()))?;
                    buffer.push_chunk(&chunk);
                    while let Some(line) = buffer.next_line() {
                        yield line;
                    }
                }
                if let Some(line) = buffer.finish() {
                    yield line;
                }
            };

            Ok(Box::pin(stream) as LineStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect(stream: LineStream) -> Vec<String> {
        stream.map(|line| line.unwrap()).collect().await
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = HttpProxyClient::new("  ", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ProxyError::MissingBaseUrl));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client =
            HttpProxyClient::new("http://127.0.0.1:8787/ ", Duration::from_secs(1)).unwrap();
        assert_eq!(client.chat_url(), "http://127.0.0.1:8787/chat");
    }

    #[tokio::test]
    async fn posts_request_and_streams_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "session_id": "chat-42",
                "prompt": "list files",
                "continue": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"type\":\"a\"}\n\n  {\"type\":\"b\"}  \n{\"type\":\"c\"}"),
            )
            .mount(&server)
            .await;

        let client = HttpProxyClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let stream = client
            .chat_stream(ChatRequest::new(" chat-42 ", " list files\n", true))
            .await
            .unwrap();
        assert_eq!(
            collect(stream).await,
            vec!["{\"type\":\"a\"}", "{\"type\":\"b\"}", "{\"type\":\"c\"}"]
        );
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(502).set_body_string("  upstream busy \n"))
            .mount(&server)
            .await;

        let client = HttpProxyClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = client
            .chat_stream(ChatRequest::new("s", "p", false))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "status=502: upstream busy");
    }

    #[tokio::test]
    async fn empty_error_body_gets_default_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpProxyClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = client
            .chat_stream(ChatRequest::new("s", "p", false))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "status=500: proxy request failed");
    }

    #[test]
    fn request_mode_labels() {
        assert_eq!(ChatRequest::new("s", "p", false).mode(), "fresh");
        assert_eq!(ChatRequest::new("s", "p", true).mode(), "continue");
    }
}
