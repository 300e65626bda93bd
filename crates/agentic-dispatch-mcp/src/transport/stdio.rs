//! Stdio transport: newline-delimited JSON-RPC over any async byte stream.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use agentic_dispatch::CapabilityCategory;

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcMessage, McpError, McpResult, RequestId};

use super::framing;
use super::sequencer::{ResponseOrder, Sequencer};

/// Stdio transport for desktop MCP clients.
///
/// Every request runs in its own task, so a slow handler never holds up the
/// next line. Notifications are applied inline, in arrival order.
pub struct StdioTransport {
    handler: Arc<ProtocolHandler>,
    order: ResponseOrder,
}

/// Write side shared by the reader loop and request tasks.
#[derive(Clone)]
struct Outbound {
    tx: mpsc::UnboundedSender<Value>,
    sequencer: Option<Arc<Mutex<Sequencer>>>,
}

impl Outbound {
    fn new(tx: mpsc::UnboundedSender<Value>, order: ResponseOrder) -> Self {
        let sequencer = match order {
            ResponseOrder::Arrival => Some(Arc::new(Mutex::new(Sequencer::new()))),
            ResponseOrder::Unordered => None,
        };
        Self { tx, sequencer }
    }

    async fn reserve(&self) -> Option<u64> {
        match &self.sequencer {
            Some(sequencer) => Some(sequencer.lock().await.reserve()),
            None => None,
        }
    }

    async fn deliver(&self, slot: Option<u64>, response: Option<Value>) {
        match (&self.sequencer, slot) {
            (Some(sequencer), Some(slot)) => {
                // Send under the lock so releases from different tasks cannot interleave.
                let mut sequencer = sequencer.lock().await;
                for value in sequencer.complete(slot, response) {
                    self.send(value);
                }
            }
            _ => {
                if let Some(value) = response {
                    self.send(value);
                }
            }
        }
    }

    fn send(&self, value: Value) {
        if self.tx.send(value).is_err() {
            tracing::debug!("Writer closed, dropping outbound message");
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(value) = rx.recv().await {
        let framed = framing::frame_message(&value)?;
        writer.write_all(framed.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

fn list_changed_method(category: CapabilityCategory) -> &'static str {
    match category {
        CapabilityCategory::Tool => "notifications/tools/list_changed",
        CapabilityCategory::Resource => "notifications/resources/list_changed",
        CapabilityCategory::Prompt => "notifications/prompts/list_changed",
    }
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            order: ResponseOrder::default(),
        }
    }

    pub fn with_order(mut self, order: ResponseOrder) -> Self {
        self.order = order;
        self
    }

    pub fn handler(&self) -> &Arc<ProtocolHandler> {
        &self.handler
    }

    /// Run the transport loop on the process's stdin and stdout.
    pub async fn run(&self) -> McpResult<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` hits EOF or the writer fails.
    ///
    /// On exit the dispatcher is shut down, in-flight requests are drained
    /// (each bounded by its grace period) and their responses flushed.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> McpResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Outbound::new(tx, self.order);
        let mut writer_task = tokio::spawn(write_loop(writer, rx));
        let forwarder = self.spawn_change_forwarder(outbound.clone());

        let mut requests = JoinSet::new();
        let mut lines = BufReader::new(reader).lines();
        let mut writer_result = None;
        let mut read_error = None;

        tracing::info!(order = ?self.order, "Stdio transport started");

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.accept(&line, &outbound, &mut requests).await,
                    Ok(None) => {
                        tracing::info!("EOF on input, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Read error: {e}");
                        read_error = Some(e);
                        break;
                    }
                },
                Some(joined) = requests.join_next(), if !requests.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Request task failed: {e}");
                    }
                }
                joined = &mut writer_task => {
                    tracing::warn!("Writer stopped, shutting down");
                    writer_result = Some(joined);
                    break;
                }
            }
        }

        self.handler.dispatcher().shutdown();
        while let Some(joined) = requests.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Request task failed: {e}");
            }
        }
        if let Some(forwarder) = forwarder {
            forwarder.abort();
            let _ = forwarder.await;
        }
        drop(outbound);

        let writer_result = match writer_result {
            Some(joined) => joined,
            None => writer_task.await,
        };
        tracing::info!("Stdio transport stopped");

        if let Some(e) = read_error {
            return Err(McpError::Io(e));
        }
        writer_result.map_err(|e| McpError::Transport(e.to_string()))?
    }

    async fn accept(&self, line: &str, outbound: &Outbound, requests: &mut JoinSet<()>) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        match framing::parse_message(trimmed) {
            Ok(JsonRpcMessage::Request(request)) => {
                // Tracked before spawning so a cancel on the next line finds it.
                let ticket = self.handler.track(&request);
                let slot = outbound.reserve().await;
                let handler = Arc::clone(&self.handler);
                let outbound = outbound.clone();
                requests.spawn(async move {
                    let response = handler.handle_tracked(request, ticket).await;
                    outbound.deliver(slot, Some(response)).await;
                });
            }
            Ok(other) => {
                let response = self.handler.handle_message(other).await;
                outbound.deliver(None, response).await;
            }
            Err(e) => {
                tracing::warn!(code = e.code(), "Rejected inbound message: {e}");
                let slot = outbound.reserve().await;
                let response = serde_json::to_value(e.to_json_rpc_error(RequestId::Null)).ok();
                outbound.deliver(slot, response).await;
            }
        }
    }

    /// Forward registry changes as `notifications/*/list_changed` for every
    /// category advertised with `listChanged`.
    fn spawn_change_forwarder(&self, outbound: Outbound) -> Option<JoinHandle<()>> {
        let dispatcher = self.handler.dispatcher();
        let capabilities = dispatcher.capabilities();
        if !CapabilityCategory::ALL
            .iter()
            .any(|&category| capabilities.list_changed(category))
        {
            return None;
        }

        let mut changes = dispatcher.subscribe_changes();
        Some(tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(category) if capabilities.list_changed(category) => {
                        match framing::notification(list_changed_method(category), None) {
                            Ok(value) => outbound.send(value),
                            Err(e) => tracing::warn!("Failed to build notification: {e}"),
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Registry change notifications lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}
