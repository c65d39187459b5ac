//! Glue between the proxy line stream, the turn parser and a channel.

use crate::commands::{Command, HELP_TEXT, parse_command};
use crate::core::stream::{PROXY_ERROR_PREFIX, StreamParser};
use crate::platform::scheduler::{JobDefinition, JobRunner};
use crate::transport::channels::{Channel, ChannelMessage};
use crate::transport::proxy::{ChatRequest, ProxyClient};
use crate::utils::text::{sanitize_line, truncate_with_ellipsis};
use anyhow::Result;
use futures_util::StreamExt;
use std::collections::HashSet;
use std::future::Future;
use std::io::BufRead;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub const EMPTY_RESPONSE: &str = "(empty response)";
pub const SESSION_CLEARED: &str = "session cleared.";
const UNPARSEABLE_PREFIX: &str = "unparseable proxy output";
const MAX_EXCERPT_CHARS: usize = 1200;

/// Counts for one relayed prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Non-blank lines received from the proxy.
    pub lines: usize,
    /// Messages handed to the channel.
    pub messages: usize,
}

/// Callout shown in place of a line the parser could not decode.
pub fn unparseable_line_notice(line: &str) -> String {
    format!(
        "> {UNPARSEABLE_PREFIX}: {}",
        truncate_with_ellipsis(&sanitize_line(line), MAX_EXCERPT_CHARS)
    )
}

/// Relays prompts for any number of sessions. Tracks which sessions have an
/// ongoing conversation on the proxy side.
pub struct SessionRelay {
    proxy: Arc<dyn ProxyClient>,
    continued: Mutex<HashSet<String>>,
}

impl SessionRelay {
    pub fn new(proxy: Arc<dyn ProxyClient>) -> Self {
        Self {
            proxy,
            continued: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_continued(&self, session_id: &str) -> bool {
        self.continued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(session_id)
    }

    fn set_continued(&self, session_id: &str, continued: bool) {
        let mut sessions = self.continued.lock().unwrap_or_else(PoisonError::into_inner);
        if continued {
            sessions.insert(session_id.to_string());
        } else {
            sessions.remove(session_id);
        }
    }

    pub fn clear(&self, session_id: &str) {
        self.set_continued(session_id, false);
        tracing::info!(session = session_id, "session cleared");
    }

    /// Send `prompt` to the proxy and deliver every parsed message to
    /// `channel` in order. Undecodable lines become a notice and the stream
    /// keeps going. The session counts as continued only after the stream
    /// completed.
    pub async fn relay_prompt(
        &self,
        session_id: &str,
        prompt: &str,
        channel: &dyn Channel,
    ) -> Result<RelaySummary> {
        let request = ChatRequest::new(session_id, prompt, self.is_continued(session_id));
        let mode = request.mode();
        let started = Instant::now();
        tracing::info!(
            session = session_id,
            mode,
            prompt_len = request.prompt.len(),
            "proxy request start"
        );

        let outcome = self.stream_into(session_id, request, channel).await;
        let elapsed_ms = started.elapsed().as_millis();
        match &outcome {
            Ok(summary) => {
                self.set_continued(session_id, true);
                tracing::info!(
                    session = session_id,
                    mode,
                    elapsed_ms,
                    chunks = summary.lines,
                    messages = summary.messages,
                    "proxy request success"
                );
            }
            Err(error) => {
                tracing::warn!(
                    session = session_id,
                    mode,
                    elapsed_ms,
                    error = %format!("{error:#}"),
                    "proxy request failed"
                );
            }
        }
        outcome
    }

    async fn stream_into(
        &self,
        session_id: &str,
        request: ChatRequest,
        channel: &dyn Channel,
    ) -> Result<RelaySummary> {
        let mut lines = self.proxy.chat_stream(request).await?;
        let mut parser = StreamParser::new();
        let mut summary = RelaySummary::default();

        while let Some(line) = lines.next().await {
            let line = line?;
            summary.lines += 1;
            let messages = match parser.feed_line(&line) {
                Ok(messages) => messages,
                Err(error) => {
                    tracing::warn!(session = session_id, %error, "proxy line parse failed");
                    vec![unparseable_line_notice(&line)]
                }
            };
            summary.messages += deliver(channel, session_id, messages).await?;
        }

        summary.messages += deliver(channel, session_id, parser.flush()).await?;
        Ok(summary)
    }

    /// Interactive entry point: slash commands are answered locally, anything
    /// else is relayed. Proxy failures are reported to the user instead of
    /// being returned.
    pub async fn handle_message(
        &self,
        session_id: &str,
        content: &str,
        channel: &dyn Channel,
    ) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }

        match parse_command(content) {
            Some(Command::Clear) => {
                self.clear(session_id);
                return channel.send(SESSION_CLEARED, session_id).await;
            }
            Some(Command::Help) => return channel.send(HELP_TEXT, session_id).await,
            None => {}
        }

        match self.relay_prompt(session_id, content, channel).await {
            Ok(summary) if summary.lines == 0 || summary.messages == 0 => {
                channel.send(EMPTY_RESPONSE, session_id).await
            }
            Ok(_) => Ok(()),
            Err(error) => {
                let notice = format!("{PROXY_ERROR_PREFIX}: {error:#}");
                channel.send(&notice, session_id).await
            }
        }
    }

    /// Read prompts from `channel` until its input closes.
    pub async fn run_interactive(&self, channel: Arc<dyn Channel>) -> Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ChannelMessage>(16);
        let listener = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.listen(tx).await })
        };

        while let Some(msg) = rx.recv().await {
            if let Err(error) = self
                .handle_message(&msg.session_id, &msg.content, channel.as_ref())
                .await
            {
                tracing::warn!(session = %msg.session_id, %error, "channel delivery failed");
            }
        }

        listener.await??;
        Ok(())
    }
}

/// Run a captured line stream through a fresh parser, as the relay would,
/// and return every message it produces. Undecodable lines yield the same
/// notice the relay shows.
pub fn replay_lines<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut parser = StreamParser::new();
    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parser.feed_line(line) {
            Ok(messages) => out.extend(messages),
            Err(error) => {
                tracing::debug!(%error, "replayed line parse failed");
                out.push(unparseable_line_notice(line));
            }
        }
    }
    out.extend(parser.flush());
    Ok(out
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect())
}

async fn deliver(channel: &dyn Channel, session_id: &str, messages: Vec<String>) -> Result<usize> {
    let mut sent = 0;
    for message in messages {
        let message = message.trim();
        if message.is_empty() {
            continue;
        }
        channel.send_chunked(message, session_id).await?;
        sent += 1;
    }
    Ok(sent)
}

/// Runs scheduled jobs through the relay, delivering their output to one
/// channel addressed by the job's session.
pub struct RelayJobRunner {
    relay: Arc<SessionRelay>,
    channel: Arc<dyn Channel>,
}

impl RelayJobRunner {
    pub fn new(relay: Arc<SessionRelay>, channel: Arc<dyn Channel>) -> Self {
        Self { relay, channel }
    }
}

impl JobRunner for RelayJobRunner {
    fn run<'a>(
        &'a self,
        job: &'a JobDefinition,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    anyhow::bail!("shutdown before job {} finished", job.key)
                }
                outcome = self.relay.relay_prompt(
                    &job.key.session_id,
                    &job.prompt,
                    self.channel.as_ref(),
                ) => outcome.map(|_| ()),
            }
        })
    }
}
