// ABOUTME: JSON-RPC-over-stdio client for a single LSP server process. Pipelines
// ABOUTME: requests with correlation ids so responses may arrive out of order.
use anyhow::{anyhow, Result};
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

pub fn encode_lsp_message(body: &str) -> Vec<u8> {
    format!("Content-Length: {}\r\n\r\n{}", body.as_bytes().len(), body).into_bytes()
}

pub fn decode_one_lsp_message(buffer: &[u8]) -> Result<Option<(String, usize)>> {
    let buf_str = match std::str::from_utf8(buffer) {
        Ok(s) => s,
        Err(_) => return Ok(None),
    };
    let Some(header_end) = buf_str.find("\r\n\r\n") else {
        return Ok(None);
    };
    let headers = &buf_str[..header_end];
    let mut content_length: Option<usize> = None;
    for line in headers.split("\r\n") {
        let lower = line.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("content-length:") {
            content_length = rest.trim().parse::<usize>().ok();
        }
    }
    let Some(content_length) = content_length else {
        return Ok(None);
    };
    let body_start = header_end + 4;
    let body_end = body_start + content_length;
    if buffer.len() < body_end {
        return Ok(None);
    }
    let body = std::str::from_utf8(&buffer[body_start..body_end])?.to_string();
    Ok(Some((body, body_end)))
}

enum OutboundMessage {
    Request { id: u64, method: String, params: JsonValue },
    Notify { method: String, params: JsonValue },
}

/// Handle to one running LSP server. Cheap to clone; the actual process and
/// reader/writer tasks are owned by the background tasks spawned in `start`.
#[derive(Clone)]
pub struct LspClient {
    tx: mpsc::Sender<OutboundMessage>,
    pending: Arc<DashMap<u64, oneshot::Sender<Result<JsonValue>>>>,
    next_id: Arc<AtomicU64>,
    request_timeout: Duration,
}

impl LspClient {
    pub async fn start(
        command: &str,
        args: &[String],
        root_uri: &str,
        request_timeout: Duration,
    ) -> Result<Self> {
        let start = Instant::now();
        info!("starting LSP server: {} (rootUri={})", command, root_uri);

        let mut child: Child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("missing stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("missing stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("missing stderr"))?;

        let (tx, mut rx) = mpsc::channel::<OutboundMessage>(100);
        let pending = Arc::new(DashMap::<u64, oneshot::Sender<Result<JsonValue>>>::new());
        let pending_reader = pending.clone();

        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let json = match msg {
                    OutboundMessage::Request { id, method, params } => {
                        serde_json::json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
                    }
                    OutboundMessage::Notify { method, params } => {
                        serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params })
                    }
                };
                let Ok(body) = serde_json::to_string(&json) else { continue };
                let framed = encode_lsp_message(&body);
                if let Err(err) = stdin.write_all(&framed).await {
                    error!("LSP stdin write failed: {err}");
                    break;
                }
                if let Err(err) = stdin.flush().await {
                    error!("LSP stdin flush failed: {err}");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                let mut header_buf = String::new();
                let mut content_length: Option<usize> = None;
                loop {
                    header_buf.clear();
                    match reader.read_line(&mut header_buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(_) => {}
                    }
                    let line = header_buf.trim();
                    if line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if let Some(rest) = lower.strip_prefix("content-length:") {
                        content_length = rest.trim().parse::<usize>().ok();
                    }
                }
                let Some(len) = content_length else { continue };
                let mut body_buf = vec![0u8; len];
                if reader.read_exact(&mut body_buf).await.is_err() {
                    break;
                }
                let Ok(body_str) = std::str::from_utf8(&body_buf) else { continue };
                let Ok(json) = serde_json::from_str::<JsonValue>(body_str) else { continue };
                if let Some(id) = json.get("id").and_then(|id| id.as_u64()) {
                    if let Some((_, tx)) = pending_reader.remove(&id) {
                        if let Some(error) = json.get("error") {
                            let _ = tx.send(Err(anyhow!("LSP error: {error}")));
                        } else {
                            let result = json.get("result").cloned().unwrap_or(JsonValue::Null);
                            let _ = tx.send(Ok(result));
                        }
                    }
                }
            }
        });

        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut line = String::new();
            while let Ok(n) = reader.read_line(&mut line).await {
                if n == 0 {
                    break;
                }
                warn!("lsp stderr: {}", line.trim());
                line.clear();
            }
        });

        let client = Self {
            tx,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            request_timeout,
        };

        let init_params = serde_json::json!({
            "processId": std::process::id(),
            "rootUri": root_uri,
            "capabilities": {
                "textDocument": {
                    "definition": {},
                    "references": {},
                    "documentSymbol": {}
                },
                "workspace": {}
            }
        });
        client.request("initialize", init_params).await?;
        client.notify("initialized", serde_json::json!({})).await?;

        info!("LSP server initialized in {:.1?}", start.elapsed());
        Ok(client)
    }

    pub async fn request(&self, method: &str, params: JsonValue) -> Result<JsonValue> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        self.tx
            .send(OutboundMessage::Request { id, method: method.to_string(), params })
            .await
            .map_err(|_| anyhow!("LSP server channel closed"))?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(received) => received.map_err(|_| anyhow!("LSP response channel closed"))?,
            Err(_) => {
                self.pending.remove(&id);
                Err(anyhow!("LSP request timed out: {method}"))
            }
        }
    }

    pub async fn notify(&self, method: &str, params: JsonValue) -> Result<()> {
        self.tx
            .send(OutboundMessage::Notify { method: method.to_string(), params })
            .await
            .map_err(|_| anyhow!("LSP server channel closed"))
    }

    pub async fn shutdown(&self) -> Result<()> {
        let _ = self.request("shutdown", JsonValue::Null).await;
        self.notify("exit", JsonValue::Null).await
    }
}

pub fn root_uri_for(root_path: &Path) -> Result<String> {
    let canonical = std::fs::canonicalize(root_path).unwrap_or_else(|_| root_path.to_path_buf());
    url::Url::from_directory_path(&canonical)
        .map(|u| u.to_string())
        .map_err(|_| anyhow!("failed to build root URI for {}", canonical.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsp_message_round_trips_through_framing() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let encoded = encode_lsp_message(body);
        let decoded = decode_one_lsp_message(&encoded).unwrap().unwrap();
        assert_eq!(decoded.0, body);
        assert_eq!(decoded.1, encoded.len());
    }

    #[test]
    fn incomplete_message_decodes_to_none() {
        let body = r#"{"jsonrpc":"2.0","id":1}"#;
        let encoded = encode_lsp_message(body);
        let truncated = &encoded[..encoded.len() - 2];
        assert!(decode_one_lsp_message(truncated).unwrap().is_none());
    }
}
