use std::future::Future;
use std::pin::Pin;

/// A prompt typed into a channel.
///
/// `sender` identifies who typed it; `session_id` is the relay session the
/// channel is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub sender: String,
    pub session_id: String,
    pub content: String,
    pub timestamp: u64,
}

/// Destination for relayed text, optionally also a source of prompts.
pub trait Channel: Send + Sync {
    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Deliver one message to `recipient`
    fn send<'a>(
        &'a self,
        message: &'a str,
        recipient: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    /// Read prompts until the input ends or the receiver goes away
    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<ChannelMessage>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    fn max_message_length(&self) -> usize {
        usize::MAX
    }

    fn send_chunked<'a>(
        &'a self,
        message: &'a str,
        recipient: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let chunks = super::chunker::chunk_message(message, self.max_message_length());
            for chunk in chunks {
                self.send(&chunk, recipient).await?;
            }
            Ok(())
        })
    }
}
