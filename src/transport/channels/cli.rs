use super::traits::{Channel, ChannelMessage};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{self, AsyncBufReadExt, BufReader};

/// Terminal channel: relayed text goes to stdout, prompts come from stdin.
pub struct CliChannel {
    session_id: String,
}

impl CliChannel {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    /// Messages for a session other than the bound one are labelled, so a
    /// daemon multiplexing many sessions onto one terminal stays readable.
    fn send<'a>(
        &'a self,
        message: &'a str,
        recipient: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if recipient.is_empty() || recipient == self.session_id {
                println!("{message}\n");
            } else {
                println!("[{recipient}]\n{message}\n");
            }
            Ok(())
        })
    }

    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<ChannelMessage>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let reader = BufReader::new(io::stdin());
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" || line == "/exit" {
                    break;
                }

                let msg = ChannelMessage {
                    sender: "user".to_string(),
                    session_id: self.session_id.clone(),
                    content: line,
                    timestamp: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs(),
                };

                if tx.send(msg).await.is_err() {
                    break;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_channel_name() {
        assert_eq!(CliChannel::new("s1").name(), "cli");
    }

    #[test]
    fn cli_channel_keeps_session() {
        assert_eq!(CliChannel::new("chat-42").session_id(), "chat-42");
    }

    #[tokio::test]
    async fn cli_channel_send_does_not_panic() {
        let ch = CliChannel::new("s1");
        assert!(ch.send("hello", "s1").await.is_ok());
        assert!(ch.send_chunked("", "s1").await.is_ok());
    }
}
