//! Length-prefixed JSON-RPC client for game automation SDKs
//!
//! Frames are a 4-byte little-endian body length followed by a UTF-8 JSON-RPC
//! 2.0 message.

use crate::config::{secs, TIMING_CONFIG};
use crate::error::{DeviceError, Result};
use crate::session::GameSession;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde_json::{json, Value};
use std::any::Any;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Port the SDK's RPC server listens on by default
pub const DEFAULT_RPC_PORT: u16 = 15004;

/// Frames larger than this are treated as a corrupt stream
const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Width requested from the SDK's screenshot call
const SCREENSHOT_WIDTH: u32 = 720;

/// Split `host[:port]`, defaulting the port
pub fn parse_address(address: &str) -> (String, u16) {
    if let Some((host, port)) = address.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return (host.to_string(), port);
        }
    }
    (address.to_string(), DEFAULT_RPC_PORT)
}

pub(crate) async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len())
        .map_err(|_| DeviceError::Protocol(format!("frame too large: {} bytes", body.len())))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).await?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(DeviceError::Protocol(format!("frame length {} exceeds limit", len)));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Send `request` and read frames until the one answering `id`
async fn exchange(stream: &mut TcpStream, request: &Value, id: &str) -> Result<Value> {
    write_frame(stream, &serde_json::to_vec(request)?).await?;
    loop {
        let body = read_frame(stream).await?;
        let response: Value = serde_json::from_slice(&body)?;
        if response.get("id").and_then(Value::as_str) == Some(id) {
            return Ok(response);
        }
        warn!("dropping game RPC frame for another request: {}", response);
    }
}

/// Connection to a game SDK's RPC server
#[derive(Debug)]
pub struct GameClient {
    address: String,
    /// `None` once an interrupted call left the stream mid-frame
    stream: Mutex<Option<TcpStream>>,
    call_timeout: Duration,
}

impl GameClient {
    /// Connect to `host[:port]`
    pub async fn connect(address: &str) -> Result<Self> {
        let (host, port) = parse_address(address);
        let address = format!("{}:{}", host, port);
        let timeout = secs(TIMING_CONFIG.game.connect_timeout);

        let stream = tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| {
                DeviceError::Timeout(format!("game RPC connect to {} after {:?}", address, timeout))
            })?
            .map_err(|e| DeviceError::ConnectionFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        info!("game RPC connected to {}", address);
        Ok(Self {
            address,
            stream: Mutex::new(Some(stream)),
            call_timeout: secs(TIMING_CONFIG.game.call_timeout),
        })
    }

    /// Override the per-call timeout taken from `TIMING_CONFIG`
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Invoke `method` and return its `result`
    ///
    /// Calls are serialized over the single connection. A call that fails
    /// mid-exchange (timeout, I/O error, cancellation) closes the connection
    /// and later calls fail with `ConnectionFailed`; reconnect the device to
    /// recover.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = Uuid::new_v4().to_string();
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let mut slot = self.stream.lock().await;
        let mut stream = slot.take().ok_or_else(|| DeviceError::ConnectionFailed {
            address: self.address.clone(),
            reason: "connection closed after an interrupted call".to_string(),
        })?;

        let response =
            match tokio::time::timeout(self.call_timeout, exchange(&mut stream, &request, &id))
                .await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!("game RPC {} to {} failed, closing: {}", method, self.address, e);
                    return Err(e);
                }
                Err(_) => {
                    warn!("game RPC {} to {} timed out, closing", method, self.address);
                    return Err(DeviceError::Timeout(format!(
                        "game RPC {} after {:?}",
                        method, self.call_timeout
                    )));
                }
            };
        *slot = Some(stream);

        debug!("game RPC {} answered", method);
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(DeviceError::Protocol(format!("game RPC {} failed: {}", method, error)));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// Screenshot results come back as `[data, format]` or a bare base64 string
fn decode_screenshot(result: &Value) -> Result<DynamicImage> {
    let encoded = match result {
        Value::String(s) => s.as_str(),
        Value::Array(items) => items.first().and_then(Value::as_str).ok_or_else(|| {
            DeviceError::Protocol("screenshot result has no image data".to_string())
        })?,
        other => {
            return Err(DeviceError::Protocol(format!(
                "unexpected screenshot result: {}",
                other
            )))
        }
    };
    let bytes = general_purpose::STANDARD.decode(encoded)?;
    Ok(image::load_from_memory(&bytes)?)
}

#[async_trait]
impl GameSession for GameClient {
    async fn screenshot(&self) -> Result<DynamicImage> {
        let result = self.call("Screenshot", json!([SCREENSHOT_WIDTH])).await?;
        decode_screenshot(&result)
    }

    async fn dump_hierarchy(&self) -> Result<Value> {
        // Only visible nodes, like the SDK's own inspector
        self.call("Dump", json!([true])).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
