//! Newline-delimited JSON-RPC loop.
//!
//! One reader drives dispatch. `tools/call` work runs on tasks tracked by
//! a [`TaskTracker`]; every response goes through an mpsc channel to a
//! single writer task, so frames from concurrent calls never interleave.
//! On end of input the loop stops reading, waits for in-flight calls,
//! flushes and returns.

use std::io;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

use crate::protocol::{
    self, CallToolParams, InitializeParams, Request, Response, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::tools::ToolRegistry;

type ResponseTx = mpsc::UnboundedSender<Response>;

#[derive(Debug, Clone)]
pub struct McpServer {
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools: Arc::new(tools),
        }
    }

    /// Serve until `reader` reaches end of input.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let tracker = TaskTracker::new();

        let mut lines = BufReader::new(reader).lines();
        let read_result = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        self.dispatch(line, &tx, &tracker);
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read from input");
                    break Err(e);
                }
            }
        };

        tracing::info!(in_flight = tracker.len(), "Input closed, draining tool calls");
        tracker.close();
        tracker.wait().await;

        drop(tx);
        let write_result = writer_task.await.map_err(io::Error::other)?;

        read_result.and(write_result)
    }

    fn dispatch(&self, line: &str, tx: &ResponseTx, tracker: &TaskTracker) {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable message");
                send(tx, Response::failure(Value::Null, PARSE_ERROR, format!("Parse error: {e}")));
                return;
            }
        };

        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request");
                send(
                    tx,
                    Response::failure(Value::Null, INVALID_REQUEST, format!("Invalid request: {e}")),
                );
                return;
            }
        };

        tracing::debug!(method = %request.method, id = ?request.id, "Received message");

        let Some(id) = request.id else {
            if !request.method.starts_with(protocol::NOTIFICATION_PREFIX) {
                tracing::debug!(method = %request.method, "Ignoring unknown notification");
            }
            return;
        };

        match request.method.as_str() {
            protocol::METHOD_INITIALIZE => {
                let params: InitializeParams =
                    serde_json::from_value(request.params).unwrap_or_default();
                tracing::info!(
                    client_version = params.protocol_version.as_deref().unwrap_or("unspecified"),
                    "Client initialized session",
                );
                send(tx, Response::success(id, protocol::initialize_result(&params)));
            }
            protocol::METHOD_PING => {
                send(tx, Response::success(id, serde_json::json!({})));
            }
            protocol::METHOD_TOOLS_LIST => {
                send(
                    tx,
                    Response::success(id, serde_json::json!({ "tools": self.tools.list() })),
                );
            }
            protocol::METHOD_TOOLS_CALL => {
                let params: CallToolParams = match serde_json::from_value(request.params) {
                    Ok(params) => params,
                    Err(e) => {
                        send(
                            tx,
                            Response::failure(id, INVALID_PARAMS, format!("Invalid params: {e}")),
                        );
                        return;
                    }
                };

                let tools = Arc::clone(&self.tools);
                let tx = tx.clone();
                tracker.spawn(async move {
                    tracing::info!(tool = %params.name, "Tool call started");
                    let result = tools.call(&params.name, params.arguments).await;
                    tracing::info!(tool = %params.name, is_error = result.is_error, "Tool call finished");
                    send(&tx, Response::success(id, result));
                });
            }
            other => {
                send(
                    tx,
                    Response::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
                );
            }
        }
    }
}

fn send(tx: &ResponseTx, response: Response) {
    if tx.send(response).is_err() {
        tracing::warn!("Response dropped: writer has stopped");
    }
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Response>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut frame = serde_json::to_vec(&response).map_err(io::Error::other)?;
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}
