//! Line-delimited JSON control channel between `shipmapctl` and `shipmapd`.

use std::sync::Arc;

use anyhow::{Context, Result};
use refresh::{LastRefresh, RefreshState};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/shipmap.sock";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum AdminRequest {
    Status,
    Pause,
    Resume,
    /// Export now, outside the schedule.
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AdminStatus {
    pub run_id: String,
    pub refresh_state: RefreshState,
    pub last_refresh: Option<LastRefresh>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum AdminResponse {
    Status(AdminStatus),
    Ack,
    Error(String),
}

/// Serves one request per connection until the listener fails.
pub async fn run_server<F>(socket_path: &str, handler: F) -> Result<()>
where
    F: Fn(AdminRequest) -> Result<AdminResponse> + Send + Sync + 'static,
{
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind admin socket {socket_path}"))?;
    let handler = Arc::new(handler);
    info!(socket = socket_path, "admin ipc listening");
    loop {
        let (stream, _) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_stream(stream, handler).await {
                warn!(error = ?err, "admin ipc handler error");
            }
        });
    }
}

async fn handle_stream<F>(stream: UnixStream, handler: Arc<F>) -> Result<()>
where
    F: Fn(AdminRequest) -> Result<AdminResponse> + Send + Sync + 'static,
{
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    let resp = match serde_json::from_str::<AdminRequest>(buf.trim()) {
        Ok(req) => handler(req).unwrap_or_else(|err| AdminResponse::Error(format!("{err:#}"))),
        Err(err) => AdminResponse::Error(format!("malformed request: {err}")),
    };
    let line = serde_json::to_string(&resp)? + "\n";
    write_half.write_all(line.as_bytes()).await?;
    Ok(())
}

pub async fn send_request(socket_path: &str, req: &AdminRequest) -> Result<AdminResponse> {
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("failed to connect to {socket_path}"))?;
    let line = serde_json::to_string(req)? + "\n";
    stream.write_all(line.as_bytes()).await?;
    let (read_half, _) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let _ = reader.read_line(&mut buf).await?;
    let resp: AdminResponse =
        serde_json::from_str(buf.trim()).context("malformed admin response")?;
    Ok(resp)
}
